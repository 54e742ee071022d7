//! Layered service configuration.
//!
//! Sources, lowest to highest precedence: `config/default`, `config/{ADVICE_ENV}`,
//! `config/local` (all optional) and `APP__*` environment variables, e.g.
//! `APP__PERMISSION__BASE_URL=https://directory.internal`.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Agent identifier the gateway checks permissions for.
pub const DEFAULT_AGENT_NAME: &str = "advice-agent";

/// Upper bound for `max_retries` on either upstream.
pub const MAX_RETRIES: u32 = 5;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub permission: PermissionConfig,
    pub advice: AdviceConfig,
    pub enhancement: EnhancementConfig,
    pub subscription: SubscriptionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PermissionConfig {
    pub base_url: String,
    pub agent_name: String,
    pub timeout_secs: u64,
    pub subscribe_timeout_secs: u64,
    /// Look up `/profiles/{user_id}` before reading permissions.
    pub verify_profile: bool,
    pub max_retries: u32,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".into(),
            agent_name: DEFAULT_AGENT_NAME.into(),
            timeout_secs: 10,
            subscribe_timeout_secs: 15,
            verify_profile: true,
            max_retries: 0,
        }
    }
}

impl PermissionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_secs(self.subscribe_timeout_secs)
    }

    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdviceConfig {
    pub url: String,
    /// Advice generation is long-running; minutes are normal.
    pub timeout_secs: u64,
    pub length: String,
    pub temperature: f32,
    pub max_retries: u32,
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/advise".into(),
            timeout_secs: 300,
            length: "long".into(),
            temperature: 0.5,
            max_retries: 0,
        }
    }
}

impl AdviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// LLM provider used for the enhancement step.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Anthropic,
}

/// What to do when the enhancement call fails.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Return the raw advice, reformatted locally.
    #[default]
    Fallback,
    /// Fail the request with `SERVICE_UNAVAILABLE`.
    Strict,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EnhancementConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: LlmProvider::OpenAI,
            model: "gpt-4o-mini".into(),
            temperature: 0.3,
            max_tokens: 800,
            timeout_secs: 60,
            failure_policy: FailurePolicy::Fallback,
        }
    }
}

impl EnhancementConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Offer self-service grant instructions to unpermitted users.
    pub self_service: bool,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { self_service: true }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,advice_gateway=debug".into(),
            json: false,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ADVICE_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map APP__SERVER__PORT=3000 to server.port
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate().map_err(ConfigError::Message)?;
        Ok(config)
    }

    /// Reject configurations the gateway cannot serve requests with.
    pub fn validate(&self) -> Result<(), String> {
        url::Url::parse(&self.permission.base_url)
            .map_err(|e| format!("permission.base_url is not a valid URL: {}", e))?;
        url::Url::parse(&self.advice.url)
            .map_err(|e| format!("advice.url is not a valid URL: {}", e))?;

        if self.permission.agent_name.trim().is_empty() {
            return Err("permission.agent_name must not be empty".into());
        }
        if self.permission.timeout_secs == 0 || self.advice.timeout_secs == 0 {
            return Err("upstream timeouts must be greater than zero".into());
        }
        if self.permission.max_retries > MAX_RETRIES || self.advice.max_retries > MAX_RETRIES {
            return Err(format!("upstream max_retries must be at most {}", MAX_RETRIES));
        }
        if self.enhancement.enabled && self.enhancement.model.trim().is_empty() {
            return Err("enhancement.model must not be empty when enhancement is enabled".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.permission.agent_name, DEFAULT_AGENT_NAME);
        assert_eq!(config.enhancement.failure_policy, FailurePolicy::Fallback);
        assert_eq!(config.advice.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn rejects_bad_urls_and_empty_agent() {
        let mut config = AppConfig::default();
        config.permission.base_url = "not a url".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.permission.agent_name = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unbounded_retries() {
        let mut config = AppConfig::default();
        config.advice.max_retries = MAX_RETRIES;
        assert!(config.validate().is_ok());

        config.permission.max_retries = 40;
        assert!(config.validate().is_err());
    }

    #[test]
    fn base_strips_trailing_slash() {
        let config = PermissionConfig {
            base_url: "https://directory.example.com/dev/".into(),
            ..Default::default()
        };
        assert_eq!(config.base(), "https://directory.example.com/dev");
    }

    #[test]
    fn partial_sources_fill_from_defaults() {
        let raw = Config::builder()
            .set_override("enhancement.failure_policy", "strict")
            .unwrap()
            .set_override("permission.verify_profile", false)
            .unwrap()
            .build()
            .unwrap();
        let config: AppConfig = raw.try_deserialize().unwrap();

        assert_eq!(config.enhancement.failure_policy, FailurePolicy::Strict);
        assert!(!config.permission.verify_profile);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.advice.length, "long");
    }
}
