//! Rig LLM client adapter.
//!
//! Wraps Rig's Agent for integration with our LlmClient trait.

use async_trait::async_trait;

use advice_core::config::{EnhancementConfig, LlmProvider};
use advice_core::{ChatMessage, Error, LlmClient, LlmResponse, LlmUsage, Result};

// Import required Rig traits
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;

/// Configuration for Rig client.
#[derive(Debug, Clone)]
pub struct RigConfig {
    /// Provider to use.
    pub provider: LlmProvider,
    /// Model name.
    pub model: String,
    /// Temperature (0.0 - 1.0).
    pub temperature: Option<f32>,
    /// Max tokens.
    pub max_tokens: Option<u32>,
}

impl RigConfig {
    /// Build from the enhancement section of the app config.
    pub fn from_enhancement(config: &EnhancementConfig) -> Self {
        Self {
            provider: config.provider,
            model: config.model.clone(),
            temperature: Some(config.temperature),
            max_tokens: Some(config.max_tokens),
        }
    }

    /// Environment variable holding the provider's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self.provider {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Rig-based LLM client.
pub struct RigLlmClient {
    config: RigConfig,
}

impl RigLlmClient {
    /// Create a new Rig client with the given configuration.
    pub fn new(config: RigConfig) -> Self {
        Self { config }
    }

    /// Create a client, failing early when the provider's API key is missing.
    pub fn from_env(config: RigConfig) -> Result<Self> {
        let var = config.api_key_var();
        if std::env::var(var).is_err() {
            return Err(Error::ModelProvider(format!("{} not set", var)));
        }
        Ok(Self::new(config))
    }

    /// Split messages into a preamble (system turns) and a prompt (everything else).
    fn build_prompt(&self, messages: &[ChatMessage]) -> (Option<String>, String) {
        let mut system = Vec::new();
        let mut prompt = String::new();

        for msg in messages {
            match msg.role.as_str() {
                "system" => system.push(msg.content.as_str()),
                "user" => prompt.push_str(&format!("{}\n\n", msg.content)),
                "assistant" => prompt.push_str(&format!("Assistant: {}\n\n", msg.content)),
                _ => prompt.push_str(&format!("{}: {}\n\n", msg.role, msg.content)),
            }
        }

        let preamble = (!system.is_empty()).then(|| system.join("\n\n"));
        (preamble, prompt.trim_end().to_string())
    }

    /// Call OpenAI via Rig.
    async fn call_openai(&self, preamble: Option<&str>, prompt: &str) -> Result<String> {
        use rig::providers::openai;

        // Check env var first to avoid panic
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(Error::ModelProvider("OPENAI_API_KEY not set".to_string()));
        }

        let client = openai::Client::from_env();
        let mut agent_builder = client.agent(&self.config.model);

        if let Some(system) = preamble {
            agent_builder = agent_builder.preamble(system);
        }
        if let Some(temperature) = self.config.temperature {
            agent_builder = agent_builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = self.config.max_tokens {
            agent_builder = agent_builder.max_tokens(u64::from(max_tokens));
        }

        agent_builder
            .build()
            .prompt(prompt)
            .await
            .map_err(|e| Error::ModelProvider(format!("OpenAI error: {}", e)))
    }

    /// Call Anthropic via Rig.
    async fn call_anthropic(&self, preamble: Option<&str>, prompt: &str) -> Result<String> {
        use rig::providers::anthropic;

        // Check env var first to avoid panic
        if std::env::var("ANTHROPIC_API_KEY").is_err() {
            return Err(Error::ModelProvider("ANTHROPIC_API_KEY not set".to_string()));
        }

        let client = anthropic::Client::from_env();
        let mut agent_builder = client.agent(&self.config.model);

        if let Some(system) = preamble {
            agent_builder = agent_builder.preamble(system);
        }
        if let Some(temperature) = self.config.temperature {
            agent_builder = agent_builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = self.config.max_tokens {
            agent_builder = agent_builder.max_tokens(u64::from(max_tokens));
        }

        agent_builder
            .build()
            .prompt(prompt)
            .await
            .map_err(|e| Error::ModelProvider(format!("Anthropic error: {}", e)))
    }

    async fn call(&self, preamble: Option<&str>, prompt: &str) -> Result<LlmResponse> {
        tracing::debug!(
            provider = ?self.config.provider,
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Calling LLM"
        );

        let response = match self.config.provider {
            LlmProvider::OpenAI => self.call_openai(preamble, prompt).await?,
            LlmProvider::Anthropic => self.call_anthropic(preamble, prompt).await?,
        };

        // Rig's prompt API does not surface usage; estimate at ~4 chars per token.
        let prompt_chars = prompt.len() + preamble.map_or(0, str::len);
        Ok(LlmResponse {
            usage: LlmUsage {
                prompt_tokens: (prompt_chars / 4) as u64,
                completion_tokens: (response.len() / 4) as u64,
                total_tokens: ((prompt_chars + response.len()) / 4) as u64,
            },
            content: response,
            finish_reason: "stop".to_string(),
        })
    }
}

#[async_trait]
impl LlmClient for RigLlmClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        let (preamble, prompt) = self.build_prompt(messages);
        self.call(preamble.as_deref(), &prompt).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
