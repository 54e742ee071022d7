use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::permission::SubscriptionInfo;

/// Standard response envelope: `{"status": "success", "data": ...}` or
/// `{"status": "error", "error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ApiEnvelope<T> {
    Success { data: T },
    Error { error: ApiErrorBody },
}

impl<T> ApiEnvelope<T> {
    pub fn success(data: T) -> Self {
        Self::Success { data }
    }

    pub fn error(error: ApiErrorBody) -> Self {
        Self::Error { error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// HTTP status the envelope is served with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Success { .. } => 200,
            Self::Error { error } => error.code.http_status(),
        }
    }
}

impl<T> From<Result<T, ApiErrorBody>> for ApiEnvelope<T> {
    fn from(result: Result<T, ApiErrorBody>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(error) => Self::error(error),
        }
    }
}

/// Payload of a successful advice request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdviceData {
    pub advice: String,
    pub user_id: String,
    /// RFC 3339 UTC time the response was produced.
    pub timestamp: String,
    pub request_id: String,
}

/// Envelope returned by `handle_advice_request`.
pub type AdviceResponse = ApiEnvelope<AdviceData>;

/// Payload of a successful subscription request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubscriptionData {
    pub message: String,
    pub user_id: String,
    pub agent_name: String,
    pub already_subscribed: bool,
    pub timestamp: String,
}

/// Envelope returned by `handle_subscription`.
pub type SubscriptionResponse = ApiEnvelope<SubscriptionData>;

/// Stable API error code catalog for clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    InvalidRequest,
    ProfileNotFound,
    AccessDenied,
    SubscriptionRequired,
    ServiceError,
    ServiceUnavailable,
    // Subscription flow
    ProfileCheckFailed,
    InvalidAgent,
    SubscriptionFailed,
    Timeout,
    InternalError,
}

impl ApiErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::ProfileNotFound => "PROFILE_NOT_FOUND",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::SubscriptionRequired => "SUBSCRIPTION_REQUIRED",
            Self::ServiceError => "SERVICE_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::ProfileCheckFailed => "PROFILE_CHECK_FAILED",
            Self::InvalidAgent => "INVALID_AGENT",
            Self::SubscriptionFailed => "SUBSCRIPTION_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest | Self::InvalidAgent => 400,
            Self::ProfileNotFound | Self::AccessDenied | Self::SubscriptionRequired => 403,
            Self::ServiceError => 502,
            Self::ServiceUnavailable => 503,
            Self::ProfileCheckFailed
            | Self::SubscriptionFailed
            | Self::Timeout
            | Self::InternalError => 500,
        }
    }
}

/// Standardized typed API error body.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiErrorBody {
    pub code: ApiErrorCode,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_info: Option<SubscriptionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiErrorBody {
    pub fn new(code: ApiErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
            user_id: None,
            agent_name: None,
            action_available: None,
            action_message: None,
            support_message: None,
            subscription_info: None,
            details: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidRequest, message, false)
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_agent(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    /// Mark whether the caller can resolve the error themselves.
    pub fn with_action(mut self, available: bool, message: Option<String>) -> Self {
        self.action_available = Some(available);
        self.action_message = message;
        self
    }

    pub fn with_support_message(mut self, message: impl Into<String>) -> Self {
        self.support_message = Some(message.into());
        self
    }

    pub fn with_subscription_info(mut self, info: SubscriptionInfo) -> Self {
        self.subscription_info = Some(info);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
