#![deny(unused)]
//! HTTP clients for the gateway's external collaborators.
//!
//! This crate provides:
//! - Permission directory client (profiles, grants, agent subscription)
//! - Advice service client with response decoding
//! - Bounded timeouts and configurable retries for transient failures

pub mod advice;
pub mod directory;

mod call;

pub use advice::{extract_advice, HttpAdviceService};
pub use directory::HttpPermissionDirectory;
