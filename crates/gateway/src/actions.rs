//! Tool-call adapter: lets an agent runtime drive the gateway through
//! named operations instead of the REST routes.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use advice_core::{
    ActionInvocation, ActionResult, ActionStatus, AdvicePayload, ApiEnvelope, ApiErrorBody,
    ApiErrorCode, PermissionStatus, SubscriptionPayload,
};
use advice_governance::track_action;

use crate::service::{upstream_details, AdviceGateway};

const GET_ADVICE: &str = "getAdvice";
const SUBSCRIBE: &str = "subscribeToAgent";
const CHECK_USER: &str = "checkUser";
const CHECK_PERMISSIONS: &str = "checkPermissions";

type Arguments = BTreeMap<String, String>;

impl AdviceGateway {
    /// Run one tool call and wrap its outcome as `{status, result}`.
    pub async fn handle_action(&self, invocation: ActionInvocation) -> ActionResult {
        let action = invocation.operation().to_string();
        let args = invocation.arguments();
        tracing::info!(action = %action, arguments = args.len(), "Dispatching tool call");

        let outcome = match action.as_str() {
            GET_ADVICE => self.advice_action(args).await,
            SUBSCRIBE => self.subscribe_action(args).await,
            CHECK_USER => self.check_user_action(args).await,
            CHECK_PERMISSIONS => self.check_permissions_action(args).await,
            other => {
                tracing::warn!(action = %other, "Unknown tool call");
                track_action("unknown", "ERROR");
                return ActionResult::error(
                    action.clone(),
                    json!({
                        "error": format!("Unknown action: {}", other),
                        "code": ApiErrorCode::InvalidRequest,
                    }),
                );
            }
        };

        let result = match outcome {
            Ok(result) => ActionResult::success(action, result),
            Err(result) => ActionResult::error(action, result),
        };
        track_action(
            &result.action,
            match result.status {
                ActionStatus::Success => "SUCCESS",
                ActionStatus::Error => "ERROR",
            },
        );
        result
    }

    async fn advice_action(&self, mut args: Arguments) -> Result<Value, Value> {
        let payload = AdvicePayload {
            user_id: args.remove("user_id"),
            question: args.remove("question"),
            context: args.remove("context"),
        };
        match self.handle_advice_request(payload).await {
            ApiEnvelope::Success { data } => Ok(json!({
                "advice": data.advice,
                "user_id": data.user_id,
                "request_id": data.request_id,
            })),
            ApiEnvelope::Error { error } => Err(error_result(&error)),
        }
    }

    async fn subscribe_action(&self, mut args: Arguments) -> Result<Value, Value> {
        let user_id = args.remove("user_id").unwrap_or_default();
        let agent_name = args
            .remove("agent_name")
            .unwrap_or_else(|| self.settings.agent_name.clone());
        let payload = SubscriptionPayload {
            agent_name: Some(agent_name),
        };
        match self.handle_subscription(&user_id, payload).await {
            ApiEnvelope::Success { data } => Ok(json!({
                "message": data.message,
                "user_id": data.user_id,
                "agent_name": data.agent_name,
                "already_subscribed": data.already_subscribed,
            })),
            ApiEnvelope::Error { error } => Err(error_result(&error)),
        }
    }

    async fn check_user_action(&self, args: Arguments) -> Result<Value, Value> {
        let user_id = required_user(&args)?;
        match self.directory.profile_exists(user_id).await {
            Ok(exists) => Ok(json!({ "user_id": user_id, "user_exists": exists })),
            Err(e) => {
                tracing::error!(error = %e, "Profile lookup failed");
                Err(json!({
                    "error": format!("Failed to check user profile: {}", e),
                    "code": ApiErrorCode::ServiceError,
                    "user_id": user_id,
                    "details": upstream_details(&e),
                }))
            }
        }
    }

    async fn check_permissions_action(&self, args: Arguments) -> Result<Value, Value> {
        let user_id = required_user(&args)?;
        let agent_name = self.settings.agent_name.as_str();
        let status = self.check_permission(user_id).await.map_err(|e| {
            tracing::error!(error = %e, "Permission lookup failed");
            json!({
                "error": format!("Failed to check user permissions: {}", e),
                "code": ApiErrorCode::ServiceError,
                "user_id": user_id,
                "details": upstream_details(&e),
            })
        })?;

        let (user_exists, record) = match status {
            PermissionStatus::Granted(record) => (true, Some(record)),
            PermissionStatus::NotPermitted(record) => (true, record),
            PermissionStatus::ProfileNotFound => (false, None),
        };
        let permitted_agents: Vec<String> = record
            .map(|r| r.permitted_agents.into_iter().collect())
            .unwrap_or_default();
        Ok(json!({
            "user_id": user_id,
            "user_exists": user_exists,
            "agent_name": agent_name,
            "permitted": permitted_agents.iter().any(|a| a == agent_name),
            "permitted_agents": permitted_agents,
        }))
    }
}

fn required_user(args: &Arguments) -> Result<&str, Value> {
    args.get("user_id")
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            json!({
                "error": "user_id is required",
                "code": ApiErrorCode::InvalidRequest,
            })
        })
}

/// Flatten an API error into the fields an agent can act on.
fn error_result(error: &ApiErrorBody) -> Value {
    json!({
        "error": error.message,
        "code": error.code,
        "retryable": error.retryable,
        "user_id": error.user_id,
        "agent_name": error.agent_name,
        "action_message": error.action_message,
        "support_message": error.support_message,
        "subscription_info": error.subscription_info,
    })
}
