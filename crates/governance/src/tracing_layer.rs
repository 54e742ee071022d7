//! Logging and distributed tracing configuration.

use advice_core::config::LoggingConfig;
use advice_core::{Error, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Configure stdout logging (plain or JSON) plus OpenTelemetry export when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
///
/// `RUST_LOG` takes precedence over `logging.level`.
pub fn configure_tracing(logging: &LoggingConfig) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .map_err(|e| Error::governance(format!("Invalid log filter '{}': {}", logging.level, e)))?;

    let json_layer = logging
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_current_span(true));
    let plain_layer = (!logging.json).then(tracing_subscriber::fmt::layer);

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
    let otel_layer = match &endpoint {
        Some(endpoint) => {
            let provider = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint.clone()),
                )
                .with_trace_config(
                    sdktrace::config().with_resource(Resource::new(vec![KeyValue::new(
                        "service.name",
                        "advice-gateway",
                    )])),
                )
                .install_batch(runtime::Tokio)
                .map_err(|e| Error::governance(format!("Failed to install OTLP pipeline: {}", e)))?;
            let tracer = provider.tracer("advice-gateway");
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(otel_layer)
        .with(env_filter)
        .with(json_layer)
        .with(plain_layer)
        .try_init()
        .map_err(|e| Error::governance(format!("Failed to install tracing subscriber: {}", e)))?;

    if let Some(endpoint) = endpoint {
        tracing::info!(endpoint = %endpoint, "OpenTelemetry tracing enabled");
    }

    Ok(())
}
