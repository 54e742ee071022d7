use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Inbound Payloads
// =============================================================================

/// Raw `POST /advice` body, before validation.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct AdvicePayload {
    /// Requesting user.
    pub user_id: Option<String>,
    /// Question to answer.
    pub question: Option<String>,
    /// Optional background for the question.
    pub context: Option<String>,
}

/// Raw `POST /subscribe/{user_id}` body.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SubscriptionPayload {
    /// Agent the user wants access to.
    pub agent_name: Option<String>,
}

// =============================================================================
// Validated Requests
// =============================================================================

/// A validated advice request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdviceRequest {
    user_id: String,
    question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl AdviceRequest {
    /// Build a request, rejecting an empty `user_id` or `question`.
    pub fn new(user_id: impl Into<String>, question: impl Into<String>) -> Result<Self> {
        let user_id = required("user_id", Some(user_id.into()))?;
        let question = required("question", Some(question.into()))?;
        Ok(Self {
            user_id,
            question,
            context: None,
        })
    }

    /// Attach context. Blank context is treated as absent.
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = non_blank(context);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

impl TryFrom<AdvicePayload> for AdviceRequest {
    type Error = Error;

    fn try_from(payload: AdvicePayload) -> Result<Self> {
        let user_id = required("user_id", payload.user_id)?;
        let question = required("question", payload.question)?;
        Ok(Self {
            user_id,
            question,
            context: non_blank(payload.context),
        })
    }
}

/// A validated subscription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub user_id: String,
    pub agent_name: String,
}

impl SubscriptionRequest {
    pub fn from_parts(user_id: &str, payload: SubscriptionPayload) -> Result<Self> {
        let user_id = required("user_id", Some(user_id.to_string()))?;
        let agent_name = required("agent_name", payload.agent_name)?;
        Ok(Self {
            user_id,
            agent_name,
        })
    }
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    non_blank(value).ok_or_else(|| Error::invalid_request(format!("{} is required", field)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
