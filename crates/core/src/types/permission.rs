use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// A user's agent grants as reported by the permission directory.
///
/// The gateway only reads these; it never caches or persists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub user_id: String,
    pub permitted_agents: BTreeSet<String>,
}

impl PermissionRecord {
    pub fn new<I, S>(user_id: impl Into<String>, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id: user_id.into(),
            permitted_agents: agents.into_iter().map(Into::into).collect(),
        }
    }

    pub fn permits(&self, agent_name: &str) -> bool {
        self.permitted_agents.contains(agent_name)
    }
}

/// Outcome of checking a user against the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionStatus {
    /// The user may use the agent.
    Granted(PermissionRecord),
    /// The profile exists but the agent is not granted. The record is absent
    /// when the directory holds no permissions for the user yet.
    NotPermitted(Option<PermissionRecord>),
    /// The directory does not know the user.
    ProfileNotFound,
}

/// Result of asking the directory to grant an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Granted,
    AlreadyGranted,
    /// The directory rejected the agent name or request shape.
    InvalidAgent,
}

/// Self-service instructions for requesting an agent grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubscriptionInfo {
    pub instructions: String,
    pub method: String,
    pub url: String,
    pub body: serde_json::Value,
}

impl SubscriptionInfo {
    /// Instructions pointing at `POST {base}/permissions/{user_id}/agents`.
    pub fn for_user(permission_base_url: &str, user_id: &str, agent_name: &str) -> Self {
        let url = grant_url(permission_base_url, user_id);
        Self {
            instructions: format!(
                "Send a POST request to {} with body {{\"agent_name\": \"{}\"}} \
                 to subscribe to the {} service.",
                url, agent_name, agent_name
            ),
            method: "POST".to_string(),
            url,
            body: serde_json::json!({ "agent_name": agent_name }),
        }
    }
}

/// Grant endpoint with the user id percent-encoded as one path segment.
fn grant_url(permission_base_url: &str, user_id: &str) -> String {
    let segments = ["permissions", user_id, "agents"];
    let Ok(mut url) = Url::parse(permission_base_url) else {
        return format!(
            "{}/{}",
            permission_base_url.trim_end_matches('/'),
            segments.join("/")
        );
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    String::from(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permits_checks_membership() {
        let record = PermissionRecord::new("john", ["advice-agent", "travel-agent"]);
        assert!(record.permits("advice-agent"));
        assert!(!record.permits("tax-agent"));
    }

    #[test]
    fn subscription_info_targets_grant_endpoint() {
        let info =
            SubscriptionInfo::for_user("https://dir.example.com/dev/", "new_user", "advice-agent");
        assert_eq!(info.url, "https://dir.example.com/dev/permissions/new_user/agents");
        assert_eq!(info.method, "POST");
        assert_eq!(info.body["agent_name"], "advice-agent");
        assert!(info.instructions.contains(&info.url));
    }

    #[test]
    fn subscription_url_encodes_user_id() {
        let info =
            SubscriptionInfo::for_user("https://dir.example.com/dev", "jo hn/x", "advice-agent");
        assert_eq!(
            info.url,
            "https://dir.example.com/dev/permissions/jo%20hn%2Fx/agents"
        );
    }
}
