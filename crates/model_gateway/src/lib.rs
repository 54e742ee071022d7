#![deny(unused)]
//! Text enhancement for the advice gateway.
//!
//! This crate provides:
//! - Rig LLM client adapter (OpenAI, Anthropic)
//! - Local markdown stripping and TL;DR summaries
//! - The enhancement step with its fallback / strict failure policy

pub mod enhancer;
pub mod format;
pub mod rig_client;

pub use enhancer::{AdviceEnhancer, EnhancedAdvice, EnhancementSource};
pub use format::{AdviceFormatter, TLDR_PREFIX};
pub use rig_client::{RigConfig, RigLlmClient};

use std::sync::Arc;

use advice_core::config::EnhancementConfig;
use advice_core::LlmClient;

/// Create the configured LLM client.
///
/// Fails when the provider's API key is not in the environment.
pub fn create_client(config: &EnhancementConfig) -> advice_core::Result<Arc<dyn LlmClient>> {
    let client = RigLlmClient::from_env(RigConfig::from_enhancement(config))?;
    tracing::info!(provider = ?config.provider, model = %config.model, "LLM client configured");
    Ok(Arc::new(client))
}
