//! Axum-based HTTP server for the gateway.

use axum::{
    body::Bytes,
    extract::{MatchedPath, Path, Request, State},
    http::{header, HeaderName, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use advice_core::config::ServerConfig;
use advice_core::{
    ActionInvocation, ActionResult, AdvicePayload, AdviceResponse, ApiEnvelope, ApiErrorBody,
    Error, Result, SubscriptionPayload, SubscriptionResponse,
};
use advice_governance::{track_advice_outcome, track_request};

use crate::service::AdviceGateway;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Enable CORS.
    pub enable_cors: bool,
    /// Enable request tracing.
    pub enable_tracing: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_cors: true,
            enable_tracing: true,
        }
    }
}

impl From<&ServerConfig> for GatewayConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            ..Default::default()
        }
    }
}

/// Shared application state.
pub struct AppState {
    pub gateway: Arc<AdviceGateway>,
}

/// Gateway server.
pub struct GatewayServer {
    config: GatewayConfig,
    state: Arc<AppState>,
    metrics_handle: Option<PrometheusHandle>,
}

impl GatewayServer {
    /// Create a new gateway server.
    pub fn new(config: GatewayConfig, gateway: Arc<AdviceGateway>) -> Self {
        Self {
            config,
            state: Arc::new(AppState { gateway }),
            metrics_handle: None,
        }
    }

    /// Set metrics handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/advice", post(advice_handler))
            .route("/subscribe/:user_id", post(subscribe_handler))
            .route("/actions", post(action_handler))
            .route("/v1/system/schema/advice", get(schema_handler))
            .route_layer(middleware::from_fn(track_metrics))
            .with_state(self.state.clone());

        if let Some(handle) = &self.metrics_handle {
            let handle = handle.clone();
            router = router.route("/metrics", get(move || async move { handle.render() }));
        }

        if self.config.enable_cors {
            router = router.layer(cors_layer());
        }

        if self.config.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Run the server.
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::gateway(format!("Failed to bind: {}", e)))?;

        tracing::info!(addr = %addr, "Gateway server starting");

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::gateway(format!("Server error: {}", e)))?;

        Ok(())
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::OPTIONS, Method::POST, Method::GET])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-amz-date"),
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-amz-security-token"),
        ])
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status.
    pub status: String,
    /// Version.
    pub version: String,
}

/// Serve an envelope with the status its outcome maps to.
fn respond<T: Serialize>(envelope: ApiEnvelope<T>) -> Response {
    let status =
        StatusCode::from_u16(envelope.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope)).into_response()
}

/// Decode a JSON request body, answering malformed input the way the
/// handlers' own validation does.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> std::result::Result<T, ApiErrorBody> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiErrorBody::invalid_request("Request body is required"));
    }
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|_| ApiErrorBody::invalid_request("Invalid JSON in request body"))?;
    serde_json::from_value(value)
        .map_err(|e| ApiErrorBody::invalid_request(format!("Invalid request body: {}", e)))
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /advice`.
async fn advice_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let payload = match parse_body::<AdvicePayload>(&body) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::warn!(message = %error.message, "Rejected advice body");
            track_advice_outcome(error.code.as_str());
            return respond(AdviceResponse::error(error));
        }
    };
    respond(state.gateway.handle_advice_request(payload).await)
}

/// `POST /subscribe/:user_id`.
async fn subscribe_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    body: Bytes,
) -> Response {
    match parse_body::<SubscriptionPayload>(&body) {
        Ok(payload) => respond(state.gateway.handle_subscription(&user_id, payload).await),
        Err(error) => {
            tracing::warn!(
                user_id = %user_id,
                message = %error.message,
                "Rejected subscription body"
            );
            respond(SubscriptionResponse::error(error.with_user(user_id)))
        }
    }
}

/// `POST /actions`. Dispatched calls answer 200 with the outcome in `status`.
async fn action_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match parse_body::<ActionInvocation>(&body) {
        Ok(invocation) => Json(state.gateway.handle_action(invocation).await).into_response(),
        Err(error) => {
            tracing::warn!(message = %error.message, "Rejected tool call body");
            let result = ActionResult::error(
                "",
                serde_json::json!({ "error": error.message, "code": error.code }),
            );
            (StatusCode::BAD_REQUEST, Json(result)).into_response()
        }
    }
}

/// JSON schemas for the advice request body and response envelope.
async fn schema_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "request": schemars::schema_for!(AdvicePayload),
        "response": schemars::schema_for!(AdviceResponse),
    }))
}

/// Record count and latency per matched route.
async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    track_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
