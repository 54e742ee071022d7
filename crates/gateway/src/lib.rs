#![deny(unused)]
//! HTTP entry point for the advice gateway.
//!
//! This crate provides the request pipeline (validation, permission
//! branching, advice delegation, enhancement), a tool-call adapter over it,
//! and the axum server exposing both.

pub mod actions;
pub mod server;
pub mod service;

pub use server::{AppState, GatewayConfig, GatewayServer};
pub use service::{AdviceGateway, GatewaySettings};
