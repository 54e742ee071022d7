//! Core traits for the advice gateway.
//!
//! One trait per external collaborator:
//! - `directory`: permission directory (PermissionDirectory)
//! - `advice`: advice-generation service (AdviceService)
//! - `llm`: text enhancement model (LlmClient)

pub mod advice;
pub mod directory;
pub mod llm;

pub use advice::*;
pub use directory::*;
pub use llm::*;
