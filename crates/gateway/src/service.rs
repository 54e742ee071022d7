//! The advice gateway: validation, permission branching, delegation,
//! enhancement and envelope shaping.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use advice_core::config::AppConfig;
use advice_core::{
    AdviceData, AdvicePayload, AdviceRequest, AdviceResponse, AdviceService, ApiEnvelope,
    ApiErrorBody, ApiErrorCode, Error, GrantOutcome, PermissionDirectory, PermissionStatus,
    Result, SubscriptionData, SubscriptionInfo, SubscriptionPayload, SubscriptionRequest,
    SubscriptionResponse,
};
use advice_governance::{track_advice_outcome, track_enhancement, track_tokens};
use advice_model_gateway::AdviceEnhancer;

/// Behaviour switches for the gateway.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Agent a user must be granted to receive advice.
    pub agent_name: String,
    /// Directory base URL, quoted in subscription instructions.
    pub permission_base_url: String,
    /// Ask `/profiles/{user_id}` before `/permissions/{user_id}`.
    pub verify_profile: bool,
    /// Offer self-service subscription to unpermitted users.
    pub self_service: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl GatewaySettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            agent_name: config.permission.agent_name.clone(),
            permission_base_url: config.permission.base().to_string(),
            verify_profile: config.permission.verify_profile,
            self_service: config.subscription.self_service,
        }
    }
}

/// Request handler behind `POST /advice` and `POST /subscribe/{user_id}`.
pub struct AdviceGateway {
    pub(crate) directory: Arc<dyn PermissionDirectory>,
    advice: Arc<dyn AdviceService>,
    enhancer: Arc<AdviceEnhancer>,
    pub(crate) settings: GatewaySettings,
}

impl AdviceGateway {
    pub fn new(
        directory: Arc<dyn PermissionDirectory>,
        advice: Arc<dyn AdviceService>,
        enhancer: Arc<AdviceEnhancer>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            directory,
            advice,
            enhancer,
            settings,
        }
    }

    // =========================================================================
    // Permission Check
    // =========================================================================

    /// Classify a user against the configured agent.
    ///
    /// Directory failures are returned as errors, never as a status.
    pub async fn check_permission(&self, user_id: &str) -> Result<PermissionStatus> {
        if self.settings.verify_profile && !self.directory.profile_exists(user_id).await? {
            return Ok(PermissionStatus::ProfileNotFound);
        }

        let status = match self.directory.lookup_permissions(user_id).await? {
            Some(record) if record.permits(&self.settings.agent_name) => {
                PermissionStatus::Granted(record)
            }
            Some(record) => PermissionStatus::NotPermitted(Some(record)),
            // With the profile confirmed, no record just means no grants yet.
            None if self.settings.verify_profile => PermissionStatus::NotPermitted(None),
            None => PermissionStatus::ProfileNotFound,
        };
        Ok(status)
    }

    // =========================================================================
    // Advice
    // =========================================================================

    /// Serve one advice request end to end.
    pub async fn handle_advice_request(&self, payload: AdvicePayload) -> AdviceResponse {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "advice_request",
            request_id = %request_id,
            user_id = tracing::field::Empty
        );

        let envelope: AdviceResponse = self
            .advise(payload, request_id)
            .instrument(span)
            .await
            .into();

        match &envelope {
            ApiEnvelope::Success { .. } => track_advice_outcome("SUCCESS"),
            ApiEnvelope::Error { error } => track_advice_outcome(error.code.as_str()),
        }
        envelope
    }

    async fn advise(
        &self,
        payload: AdvicePayload,
        request_id: String,
    ) -> std::result::Result<AdviceData, ApiErrorBody> {
        let request = AdviceRequest::try_from(payload).map_err(|e| {
            tracing::warn!(error = %e, "Rejected advice request");
            ApiErrorBody::invalid_request(request_error_message(e))
        })?;
        tracing::Span::current().record("user_id", request.user_id());

        let user_id = request.user_id();
        let agent_name = &self.settings.agent_name;
        tracing::info!(
            agent_name = %agent_name,
            question_len = request.question().len(),
            has_context = request.context().is_some(),
            "Processing advice request"
        );

        let status = self.check_permission(user_id).await.map_err(|e| {
            tracing::error!(error = %e, "Permission check failed");
            ApiErrorBody::new(
                ApiErrorCode::ServiceError,
                "Unable to verify permissions. Please try again later.",
                true,
            )
            .with_user(user_id)
            .with_details(upstream_details(&e))
        })?;

        match status {
            PermissionStatus::Granted(_) => {
                tracing::info!(agent_name = %agent_name, "Permission granted");
            }
            PermissionStatus::ProfileNotFound => {
                tracing::warn!("User profile not found");
                return Err(ApiErrorBody::new(
                    ApiErrorCode::ProfileNotFound,
                    "User profile not found. Please contact an administrator or support to create \
                     your profile.",
                    false,
                )
                .with_user(user_id)
                .with_action(false, None)
                .with_support_message(
                    "Contact your system administrator or support team to set up your user \
                     profile before using this service.",
                ));
            }
            PermissionStatus::NotPermitted(_) if self.settings.self_service => {
                tracing::info!(
                    agent_name = %agent_name,
                    "User not subscribed, offering subscription"
                );
                return Err(ApiErrorBody::new(
                    ApiErrorCode::SubscriptionRequired,
                    format!("You are not subscribed to the {} service.", agent_name),
                    false,
                )
                .with_user(user_id)
                .with_agent(agent_name.as_str())
                .with_action(
                    true,
                    Some(format!("Would you like to subscribe to the {} service?", agent_name)),
                )
                .with_subscription_info(SubscriptionInfo::for_user(
                    &self.settings.permission_base_url,
                    user_id,
                    agent_name,
                )));
            }
            PermissionStatus::NotPermitted(_) => {
                tracing::info!(agent_name = %agent_name, "User not permitted");
                return Err(ApiErrorBody::new(
                    ApiErrorCode::AccessDenied,
                    format!(
                        "You do not have access to the {} service. \
                         Please contact an administrator.",
                        agent_name
                    ),
                    false,
                )
                .with_user(user_id)
                .with_agent(agent_name.as_str())
                .with_action(false, None));
            }
        }

        let raw = self.advice.get_advice(&request).await.map_err(|e| {
            tracing::error!(error = %e, "Advice service call failed");
            ApiErrorBody::new(
                ApiErrorCode::ServiceError,
                "Unable to get advice. Please try again later.",
                e.is_transient(),
            )
            .with_user(user_id)
            .with_details(upstream_details(&e))
        })?;

        let enhanced = self.enhancer.enhance(&raw, &request).await.map_err(|e| {
            tracing::error!(error = %e, "Advice enhancement failed");
            ApiErrorBody::new(
                ApiErrorCode::ServiceUnavailable,
                "Advice formatting is temporarily unavailable. Please try again later.",
                true,
            )
            .with_user(user_id)
            .with_details(upstream_details(&e))
        })?;

        track_enhancement(enhanced.source.as_str());
        if let (Some(model), Some(usage)) = (&enhanced.model, &enhanced.usage) {
            track_tokens(model, usage.prompt_tokens, usage.completion_tokens);
        }
        tracing::info!(
            source = %enhanced.source,
            advice_len = enhanced.text.len(),
            "Advice ready"
        );

        Ok(AdviceData {
            advice: enhanced.text,
            user_id: user_id.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            request_id,
        })
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Grant `agent_name` to `user_id` on the caller's behalf.
    pub async fn handle_subscription(
        &self,
        user_id: &str,
        payload: SubscriptionPayload,
    ) -> SubscriptionResponse {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "subscription_request",
            request_id = %request_id,
            user_id = %user_id
        );
        self.subscribe(user_id, payload).instrument(span).await.into()
    }

    async fn subscribe(
        &self,
        user_id: &str,
        payload: SubscriptionPayload,
    ) -> std::result::Result<SubscriptionData, ApiErrorBody> {
        let request = SubscriptionRequest::from_parts(user_id, payload).map_err(|e| {
            tracing::warn!(error = %e, "Rejected subscription request");
            ApiErrorBody::invalid_request(request_error_message(e))
        })?;
        let SubscriptionRequest {
            user_id,
            agent_name,
        } = request;

        let error = |code: ApiErrorCode, message: String, retryable: bool| {
            ApiErrorBody::new(code, message, retryable)
                .with_user(user_id.as_str())
                .with_agent(agent_name.as_str())
        };

        if !self.settings.self_service {
            return Err(error(
                ApiErrorCode::AccessDenied,
                "Self-service subscription is disabled. Please contact an administrator.".into(),
                false,
            ));
        }

        tracing::info!(agent_name = %agent_name, "Processing subscription request");

        match self.directory.profile_exists(&user_id).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(error(
                    ApiErrorCode::ProfileNotFound,
                    format!(
                        "User profile {} not found. \
                         Please contact an administrator to create your profile.",
                        user_id
                    ),
                    false,
                ));
            }
            Err(e) => {
                return Err(subscription_failure(
                    &e,
                    ApiErrorCode::ProfileCheckFailed,
                    "Unable to verify user profile. Please try again later.".into(),
                    &error,
                ));
            }
        }

        let already = |message: String| SubscriptionData {
            message,
            user_id: user_id.clone(),
            agent_name: agent_name.clone(),
            already_subscribed: true,
            timestamp: Utc::now().to_rfc3339(),
        };

        match self.directory.lookup_permissions(&user_id).await {
            Ok(Some(record)) if record.permits(&agent_name) => {
                tracing::info!(agent_name = %agent_name, "User already subscribed");
                return Ok(already(format!(
                    "User {} is already subscribed to {}",
                    user_id, agent_name
                )));
            }
            Ok(_) => {}
            Err(e) if e.is_timeout() => {
                return Err(subscription_failure(
                    &e,
                    ApiErrorCode::SubscriptionFailed,
                    String::new(),
                    &error,
                ));
            }
            // The grant below is authoritative; a lookup failure only costs
            // the early "already subscribed" answer.
            Err(e) => tracing::warn!(error = %e, "Could not read current permissions"),
        }

        match self.directory.grant_agent(&user_id, &agent_name).await {
            Ok(GrantOutcome::Granted) => {
                tracing::info!(agent_name = %agent_name, "Subscription granted");
                Ok(SubscriptionData {
                    message: format!("Successfully subscribed user {} to {}", user_id, agent_name),
                    user_id: user_id.clone(),
                    agent_name: agent_name.clone(),
                    already_subscribed: false,
                    timestamp: Utc::now().to_rfc3339(),
                })
            }
            Ok(GrantOutcome::AlreadyGranted) => Ok(already(format!(
                "User {} is already subscribed to {}",
                user_id, agent_name
            ))),
            Ok(GrantOutcome::InvalidAgent) => Err(error(
                ApiErrorCode::InvalidAgent,
                format!("Invalid agent name \"{}\" or request format", agent_name),
                false,
            )),
            Err(e) => Err(subscription_failure(
                &e,
                ApiErrorCode::SubscriptionFailed,
                format!("Failed to subscribe to {}. Please try again later.", agent_name),
                &error,
            )),
        }
    }
}

/// Map a directory error during subscription onto its error code.
///
/// Timeouts are `TIMEOUT`, answered calls use `answered_code`, and transport
/// failures are `INTERNAL_ERROR`.
fn subscription_failure(
    e: &Error,
    answered_code: ApiErrorCode,
    answered_message: String,
    error: &impl Fn(ApiErrorCode, String, bool) -> ApiErrorBody,
) -> ApiErrorBody {
    tracing::error!(error = %e, "Subscription directory call failed");
    let body = if e.is_timeout() {
        error(
            ApiErrorCode::Timeout,
            "Request timed out. Please try again later.".into(),
            true,
        )
    } else if e.upstream_http_status().is_some() {
        error(answered_code, answered_message, e.is_transient())
    } else {
        error(
            ApiErrorCode::InternalError,
            "An internal error occurred during subscription. Please try again later.".into(),
            true,
        )
    };
    body.with_details(upstream_details(e))
}

fn request_error_message(e: Error) -> String {
    match e {
        Error::InvalidRequest(message) => message,
        other => other.to_string(),
    }
}

pub(crate) fn upstream_details(e: &Error) -> serde_json::Value {
    json!({
        "upstream": e.service().map(|s| s.as_str()),
        "status": e.upstream_http_status(),
        "timeout": e.is_timeout(),
    })
}
