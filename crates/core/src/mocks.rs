//! Mock implementations of core traits for testing.
//!
//! These mocks count their calls so tests can assert which collaborators a
//! request reached.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::{
    error::UpstreamService,
    traits::{AdviceService, ChatMessage, LlmClient, LlmResponse, LlmUsage, PermissionDirectory},
    types::{AdviceRequest, GrantOutcome, PermissionRecord},
    Error, Result,
};

// =============================================================================
// Mock LLM Client
// =============================================================================

/// Scripted mock LLM that returns predefined responses.
pub struct MockLlm {
    responses: Vec<String>,
    failure: Option<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
    call_count: AtomicUsize,
}

impl MockLlm {
    /// Create a new mock LLM cycling through a queue of responses.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            failure: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn constant(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Create a mock whose every call fails with a provider error.
    pub fn failing(message: &str) -> Self {
        let mut mock = Self::new(Vec::new());
        mock.failure = Some(message.to_string());
        mock
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of calls made to this mock.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Prompts received so far, flattened to text.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        let prompt = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(prompt);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(Error::ModelProvider(message.clone()));
        }

        let idx = (count - 1) % self.responses.len().max(1);
        let content = self.responses.get(idx).cloned().unwrap_or_default();

        Ok(LlmResponse {
            content,
            finish_reason: "stop".to_string(),
            usage: LlmUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            },
        })
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}

// =============================================================================
// Mock Permission Directory
// =============================================================================

/// In-memory permission directory.
#[derive(Default)]
pub struct InMemoryPermissionDirectory {
    profiles: Mutex<HashSet<String>>,
    grants: Mutex<HashMap<String, PermissionRecord>>,
    unavailable: bool,
    calls: AtomicUsize,
}

impl InMemoryPermissionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory whose every call fails like an unreachable service.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Add a profile with no permissions on record.
    pub fn with_profile(self, user_id: &str) -> Self {
        self.profiles.lock().unwrap().insert(user_id.to_string());
        self
    }

    /// Add a profile holding the given agent grants.
    pub fn with_user(self, user_id: &str, agents: &[&str]) -> Self {
        self.profiles.lock().unwrap().insert(user_id.to_string());
        self.grants.lock().unwrap().insert(
            user_id.to_string(),
            PermissionRecord::new(user_id, agents.iter().copied()),
        );
        self
    }

    /// Number of directory calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(Error::upstream(
                UpstreamService::PermissionDirectory,
                "connection refused",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionDirectory for InMemoryPermissionDirectory {
    async fn profile_exists(&self, user_id: &str) -> Result<bool> {
        self.enter()?;
        Ok(self.profiles.lock().unwrap().contains(user_id))
    }

    async fn lookup_permissions(&self, user_id: &str) -> Result<Option<PermissionRecord>> {
        self.enter()?;
        Ok(self.grants.lock().unwrap().get(user_id).cloned())
    }

    async fn grant_agent(&self, user_id: &str, agent_name: &str) -> Result<GrantOutcome> {
        self.enter()?;
        let mut grants = self.grants.lock().unwrap();
        let record = grants
            .entry(user_id.to_string())
            .or_insert_with(|| PermissionRecord::new(user_id, Vec::<String>::new()));
        if record.permitted_agents.insert(agent_name.to_string()) {
            Ok(GrantOutcome::Granted)
        } else {
            Ok(GrantOutcome::AlreadyGranted)
        }
    }
}

// =============================================================================
// Mock Advice Service
// =============================================================================

/// Advice service that records the requests it receives.
pub struct RecordingAdviceService {
    response: std::result::Result<String, u16>,
    requests: Mutex<Vec<AdviceRequest>>,
}

impl RecordingAdviceService {
    /// Always answer with `advice`.
    pub fn answering(advice: &str) -> Self {
        Self {
            response: Ok(advice.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always fail with the given upstream HTTP status.
    pub fn failing_with(status: u16) -> Self {
        Self {
            response: Err(status),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<AdviceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AdviceService for RecordingAdviceService {
    async fn get_advice(&self, request: &AdviceRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.response {
            Ok(advice) => Ok(advice.clone()),
            Err(status) => Err(Error::upstream_status(
                UpstreamService::AdviceService,
                *status,
                format!("advice service returned status {}", status),
            )),
        }
    }
}
