#![deny(unused)]
//! Observability for the advice gateway.
//!
//! This crate provides:
//! - Structured logging and optional OTLP trace export
//! - Prometheus metrics for requests, upstream calls and outcomes

pub mod metrics;
pub mod tracing_layer;

pub use metrics::{
    setup_metrics_recorder, track_action, track_advice_outcome, track_enhancement,
    track_request, track_tokens, track_upstream_call,
};
pub use tracing_layer::configure_tracing;
