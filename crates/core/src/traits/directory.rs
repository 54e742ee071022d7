//! Permission directory traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{GrantOutcome, PermissionRecord};

/// Read/grant access to the external permission directory.
#[async_trait]
pub trait PermissionDirectory: Send + Sync {
    /// Whether the directory holds a profile for the user.
    async fn profile_exists(&self, user_id: &str) -> Result<bool>;

    /// The user's agent grants, `None` when the directory has none on record.
    async fn lookup_permissions(&self, user_id: &str) -> Result<Option<PermissionRecord>>;

    /// Grant an agent to the user.
    async fn grant_agent(&self, user_id: &str, agent_name: &str) -> Result<GrantOutcome>;
}
