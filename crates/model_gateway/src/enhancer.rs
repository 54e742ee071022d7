//! Advice enhancement: LLM rewrite with a configurable failure policy.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use advice_core::config::{EnhancementConfig, FailurePolicy};
use advice_core::{
    AdviceRequest, ChatMessage, Error, LlmClient, LlmUsage, Result, UpstreamService,
};

use crate::format::AdviceFormatter;

const SYSTEM_PROMPT: &str = "You are a text formatter. Your job is to reformat the provided \
advice content ONLY. Do not add any new information, recommendations, or data.";

const INSTRUCTIONS: &str = "INSTRUCTIONS:
1. Create a TL;DR summary using ONLY the key points already mentioned in the content
2. Convert the rest into clean paragraph format using ONLY the existing information
3. DO NOT add any new advice, recommendations, or data
4. DO NOT make up any information that isn't in the original content
5. Simply reformat what's already there

REQUIRED FORMAT:

TL;DR: [Summarize only the existing key recommendations in 2-3 sentences]

[Convert the existing detailed advice into flowing paragraphs. Remove markdown formatting \
but keep all the same information, prices, data, and recommendations that were already \
provided. Just present it as readable paragraphs instead of bullet points and headers.]

CRITICAL: Use only the information provided in the raw advice content. Do not add anything new.";

/// Where the final advice text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhancementSource {
    /// The model's rewrite, normalized.
    Model,
    /// Local formatting; enhancement is disabled.
    Local,
    /// Local formatting after a model failure.
    Fallback,
}

impl EnhancementSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Local => "local",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for EnhancementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the enhancement step.
#[derive(Debug, Clone)]
pub struct EnhancedAdvice {
    pub text: String,
    pub source: EnhancementSource,
    /// Model that answered, for token accounting.
    pub model: Option<String>,
    /// Token usage, when a model answered.
    pub usage: Option<LlmUsage>,
}

impl EnhancedAdvice {
    fn formatted(text: String, source: EnhancementSource) -> Self {
        Self {
            text,
            source,
            model: None,
            usage: None,
        }
    }
}

/// Rewrites raw advice into the TL;DR / plain-paragraph shape.
pub struct AdviceEnhancer {
    llm: Option<Arc<dyn LlmClient>>,
    policy: FailurePolicy,
    timeout: Duration,
    formatter: AdviceFormatter,
}

impl AdviceEnhancer {
    /// Enhancer backed by a model.
    pub fn new(llm: Arc<dyn LlmClient>, policy: FailurePolicy, timeout: Duration) -> Self {
        Self {
            llm: Some(llm),
            policy,
            timeout,
            formatter: AdviceFormatter::new(),
        }
    }

    /// Enhancer that only formats locally.
    pub fn local_only() -> Self {
        Self {
            llm: None,
            policy: FailurePolicy::Fallback,
            timeout: Duration::ZERO,
            formatter: AdviceFormatter::new(),
        }
    }

    /// Build from config; a disabled section yields a local-only enhancer.
    pub fn from_config(config: &EnhancementConfig, llm: Option<Arc<dyn LlmClient>>) -> Self {
        match llm {
            Some(llm) if config.enabled => Self::new(llm, config.failure_policy, config.timeout()),
            _ => Self::local_only(),
        }
    }

    /// Whether a model is consulted.
    pub fn uses_model(&self) -> bool {
        self.llm.is_some()
    }

    /// Produce the final advice text.
    ///
    /// Under [`FailurePolicy::Strict`] a model failure or timeout is returned
    /// as an error; under [`FailurePolicy::Fallback`] the raw advice is
    /// formatted locally instead.
    pub async fn enhance(&self, raw: &str, request: &AdviceRequest) -> Result<EnhancedAdvice> {
        let Some(llm) = &self.llm else {
            return Ok(EnhancedAdvice::formatted(
                self.formatter.format_locally(raw),
                EnhancementSource::Local,
            ));
        };

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(raw, request)),
        ];

        let outcome = match tokio::time::timeout(self.timeout, llm.chat(&messages)).await {
            Ok(Ok(response)) if response.content.trim().is_empty() => Err(Error::ModelProvider(
                "model returned an empty rewrite".to_string(),
            )),
            Ok(result) => result,
            Err(_) => Err(Error::timeout(
                UpstreamService::Enhancement,
                format!("no answer within {}s", self.timeout.as_secs()),
            )),
        };

        match outcome {
            Ok(response) => {
                let text = self.normalize(&response.content);
                tracing::info!(
                    model = %llm.model_name(),
                    tokens = response.usage.total_tokens,
                    "Enhanced advice"
                );
                Ok(EnhancedAdvice {
                    text,
                    source: EnhancementSource::Model,
                    model: Some(llm.model_name().to_string()),
                    usage: Some(response.usage),
                })
            }
            Err(e) => match self.policy {
                FailurePolicy::Strict => {
                    tracing::error!(model = %llm.model_name(), error = %e, "Enhancement failed");
                    Err(e)
                }
                FailurePolicy::Fallback => {
                    tracing::warn!(
                        model = %llm.model_name(),
                        error = %e,
                        "Enhancement failed, falling back to local formatting"
                    );
                    Ok(EnhancedAdvice::formatted(
                        self.formatter.format_locally(raw),
                        EnhancementSource::Fallback,
                    ))
                }
            },
        }
    }

    /// Strip any markup the model left and make sure the summary leads.
    ///
    /// A short preamble before the model's own `TL;DR` paragraph is dropped;
    /// output without one gets a locally built summary.
    fn normalize(&self, content: &str) -> String {
        let plain = if self.formatter.has_markup(content) {
            self.formatter.strip_markup(content)
        } else {
            content.trim().to_string()
        };
        self.formatter
            .lead_with_tldr(&plain)
            .unwrap_or_else(|| self.formatter.prefix_summary(&plain))
    }
}

fn build_prompt(raw: &str, request: &AdviceRequest) -> String {
    let mut prompt = format!("Original Question: {}", request.question());
    if let Some(context) = request.context() {
        prompt.push_str(&format!("\nUser Context: {}", context));
    }
    prompt.push_str(&format!("\n\nRaw Advice Content:\n{}\n\n{}", raw, INSTRUCTIONS));
    prompt
}
