//! HTTP client for the permission directory.
//!
//! Endpoints:
//! - `GET  /profiles/{user_id}`            200 known, 404 unknown
//! - `GET  /permissions/{user_id}`         `data.permitted_agents`, 404 none on record
//! - `POST /permissions/{user_id}/agents`  `{"agent_name": "..."}`

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use advice_core::config::PermissionConfig;
use advice_core::{
    Error, GrantOutcome, PermissionDirectory, PermissionRecord, Result, UpstreamService,
};

use crate::call::{excerpt, execute, with_retries, UpstreamReply};

const SERVICE: UpstreamService = UpstreamService::PermissionDirectory;

#[derive(Debug, Deserialize)]
struct PermissionsDocument {
    #[serde(default)]
    data: PermissionsData,
}

#[derive(Debug, Default, Deserialize)]
struct PermissionsData {
    #[serde(default)]
    permitted_agents: Vec<String>,
}

/// reqwest-backed [`PermissionDirectory`].
#[derive(Debug, Clone)]
pub struct HttpPermissionDirectory {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    subscribe_timeout: Duration,
    max_retries: u32,
}

impl HttpPermissionDirectory {
    /// Create a client with its own connection pool.
    pub fn new(config: &PermissionConfig) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a client sharing an existing connection pool.
    pub fn with_client(client: reqwest::Client, config: &PermissionConfig) -> Result<Self> {
        let base_url = Url::parse(config.base())
            .map_err(|e| Error::config(format!("Invalid permission base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config("Permission base URL cannot be a base"));
        }
        Ok(Self {
            client,
            base_url,
            timeout: config.timeout(),
            subscribe_timeout: config.subscribe_timeout(),
            max_retries: config.max_retries,
        })
    }

    /// Build `{base}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config("Permission base URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, segments: &[&str]) -> Result<UpstreamReply> {
        let url = self.endpoint(segments)?;
        tracing::info!(upstream = %SERVICE, url = %url, "Querying permission directory");
        with_retries(SERVICE, self.max_retries, || {
            execute(SERVICE, self.client.get(url.clone()).timeout(self.timeout))
        })
        .await
    }
}

#[async_trait]
impl PermissionDirectory for HttpPermissionDirectory {
    async fn profile_exists(&self, user_id: &str) -> Result<bool> {
        let reply = self.get(&["profiles", user_id]).await?;
        match reply.status {
            200 => Ok(true),
            404 => {
                tracing::warn!(user_id = %user_id, "User profile not found");
                Ok(false)
            }
            status => Err(Error::upstream_status(
                SERVICE,
                status,
                format!("profile check returned status {}", status),
            )),
        }
    }

    async fn lookup_permissions(&self, user_id: &str) -> Result<Option<PermissionRecord>> {
        let reply = self.get(&["permissions", user_id]).await?;
        match reply.status {
            200 => {
                let document: PermissionsDocument = serde_json::from_str(&reply.body).map_err(|e| {
                    Error::upstream(SERVICE, format!("undecodable permissions document: {}", e))
                })?;
                Ok(Some(PermissionRecord::new(user_id, document.data.permitted_agents)))
            }
            404 => {
                tracing::info!(user_id = %user_id, "No permissions on record");
                Ok(None)
            }
            status => Err(Error::upstream_status(
                SERVICE,
                status,
                format!("permission check returned status {}", status),
            )),
        }
    }

    async fn grant_agent(&self, user_id: &str, agent_name: &str) -> Result<GrantOutcome> {
        let url = self.endpoint(&["permissions", user_id, "agents"])?;
        tracing::info!(upstream = %SERVICE, url = %url, agent_name = %agent_name, "Granting agent");

        // Grants are not idempotent on every directory; never retried.
        let reply = execute(
            SERVICE,
            self.client
                .post(url)
                .json(&serde_json::json!({ "agent_name": agent_name }))
                .timeout(self.subscribe_timeout),
        )
        .await?;

        match reply.status {
            200 | 201 | 204 => Ok(GrantOutcome::Granted),
            409 => Ok(GrantOutcome::AlreadyGranted),
            400 => Ok(GrantOutcome::InvalidAgent),
            status => Err(Error::upstream_status(
                SERVICE,
                status,
                format!("grant returned status {}: {}", status, excerpt(&reply.body)),
            )),
        }
    }
}
