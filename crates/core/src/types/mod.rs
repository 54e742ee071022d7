//! Core type definitions for the advice gateway.

pub mod action;
pub mod gateway_contract;
pub mod permission;
pub mod request;

pub use action::*;
pub use gateway_contract::*;
pub use permission::*;
pub use request::*;
