#![deny(unused)]
//! Advice Gateway
//!
//! Checks a user's agent grants with the permission directory, fetches advice
//! from the advice service, and returns it rewritten as a TL;DR-led plain text
//! answer.

use std::sync::Arc;

use advice_core::config::{AppConfig, FailurePolicy};
use advice_gateway::{AdviceGateway, GatewayConfig, GatewayServer, GatewaySettings};
use advice_model_gateway::AdviceEnhancer;
use advice_upstream::{HttpAdviceService, HttpPermissionDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // Initialize tracing
    advice_governance::configure_tracing(&config.logging)?;

    tracing::info!("Starting Advice Gateway v{}", env!("CARGO_PKG_VERSION"));

    // =========================================================================
    // Upstream collaborators
    // =========================================================================
    let directory = Arc::new(HttpPermissionDirectory::new(&config.permission)?);
    tracing::info!(
        base_url = %config.permission.base(),
        agent_name = %config.permission.agent_name,
        verify_profile = config.permission.verify_profile,
        "Permission directory configured"
    );

    let advice = Arc::new(HttpAdviceService::new(&config.advice)?);
    tracing::info!(
        url = %config.advice.url,
        timeout_sec = config.advice.timeout_secs,
        "Advice service configured"
    );

    // =========================================================================
    // Enhancement
    // =========================================================================
    let enhancer = build_enhancer(&config)?;
    tracing::info!(model_backed = enhancer.uses_model(), "Enhancer ready");

    // =========================================================================
    // Gateway
    // =========================================================================
    let gateway = Arc::new(AdviceGateway::new(
        directory,
        advice,
        Arc::new(enhancer),
        GatewaySettings::from_config(&config),
    ));

    let metrics_handle = advice_governance::setup_metrics_recorder()?;

    let server = GatewayServer::new(GatewayConfig::from(&config.server), gateway)
        .with_metrics(metrics_handle);

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Advice Gateway ready"
    );

    server.run().await?;

    Ok(())
}

/// Model-backed enhancer when possible.
///
/// A missing API key degrades to local formatting under the fallback policy
/// and stops startup under the strict one.
fn build_enhancer(config: &AppConfig) -> anyhow::Result<AdviceEnhancer> {
    let enhancement = &config.enhancement;
    if !enhancement.enabled {
        tracing::info!("Enhancement disabled, advice will be formatted locally");
        return Ok(AdviceEnhancer::local_only());
    }

    match advice_model_gateway::create_client(enhancement) {
        Ok(llm) => {
            tracing::info!(
                policy = ?enhancement.failure_policy,
                timeout_sec = enhancement.timeout_secs,
                "Enhancement enabled"
            );
            Ok(AdviceEnhancer::from_config(enhancement, Some(llm)))
        }
        Err(e) if enhancement.failure_policy == FailurePolicy::Fallback => {
            tracing::warn!(error = %e, "LLM client unavailable, advice will be formatted locally");
            Ok(AdviceEnhancer::local_only())
        }
        Err(e) => Err(e.into()),
    }
}
