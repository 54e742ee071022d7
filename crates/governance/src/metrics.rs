//! Metrics implementation using Prometheus.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use advice_core::{Error, Result, UpstreamService};

/// Initialize Prometheus recorder and return the handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new();

    let handle = builder
        .install_recorder()
        .map_err(|e| Error::governance(format!("Failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Helper to track HTTP request metrics (latency, count).
pub fn track_request(method: &str, path: &str, status: u16, latency_sec: f64) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(latency_sec);
}

/// Track one call to an external collaborator.
///
/// `outcome` is the HTTP status for answered calls, or `"timeout"` /
/// `"transport_error"`.
pub fn track_upstream_call(service: UpstreamService, outcome: &str, latency_sec: f64) {
    metrics::counter!(
        "upstream_calls_total",
        "service" => service.as_str(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!("upstream_call_duration_seconds", "service" => service.as_str())
        .record(latency_sec);
}

/// Track the final code of an advice request (`"SUCCESS"` or an error code).
pub fn track_advice_outcome(code: &str) {
    metrics::counter!("advice_outcomes_total", "code" => code.to_string()).increment(1);
}

/// Track a tool call by operation and outcome (`SUCCESS` / `ERROR`).
pub fn track_action(action: &str, status: &str) {
    metrics::counter!(
        "action_calls_total",
        "action" => action.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Track how the advice text was formatted (`model`, `local`, `fallback`).
pub fn track_enhancement(source: &str) {
    metrics::counter!("enhancement_results_total", "source" => source.to_string()).increment(1);
    if source == "fallback" {
        metrics::counter!("enhancement_fallbacks_total").increment(1);
    }
}

/// Helper to track token usage.
pub fn track_tokens(model: &str, prompt: u64, completion: u64) {
    metrics::counter!(
        "llm_token_usage_total",
        "model" => model.to_string(),
        "type" => "prompt"
    )
    .increment(prompt);
    metrics::counter!(
        "llm_token_usage_total",
        "model" => model.to_string(),
        "type" => "completion"
    )
    .increment(completion);
}
