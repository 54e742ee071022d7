#![deny(unused)]
//! Core types, traits, and error definitions for the advice gateway.
//!
//! This crate provides the building blocks shared by the upstream clients,
//! the model gateway and the HTTP gateway.

pub mod config;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result, UpstreamService};
pub use traits::*;
pub use types::*;
