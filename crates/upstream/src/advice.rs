//! HTTP client for the external advice service.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use advice_core::config::AdviceConfig;
use advice_core::{AdviceRequest, AdviceService, Error, Result, UpstreamService};

use crate::call::{excerpt, execute, with_retries};

const SERVICE: UpstreamService = UpstreamService::AdviceService;

/// Shortest advice text accepted as an answer.
const MIN_ADVICE_CHARS: usize = 10;

/// Keys tried, in order, for the advice text in a JSON answer.
const ADVICE_KEYS: [&str; 3] = ["advice", "response", "answer"];

#[derive(Debug, Serialize)]
struct AdviceCall<'a> {
    user_id: &'a str,
    question: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
    length: &'a str,
    temperature: f32,
}

/// reqwest-backed [`AdviceService`].
#[derive(Debug, Clone)]
pub struct HttpAdviceService {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
    length: String,
    temperature: f32,
    max_retries: u32,
}

impl HttpAdviceService {
    /// Create a client with its own connection pool.
    pub fn new(config: &AdviceConfig) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a client sharing an existing connection pool.
    pub fn with_client(client: reqwest::Client, config: &AdviceConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| Error::config(format!("Invalid advice service URL: {}", e)))?;
        Ok(Self {
            client,
            url,
            timeout: config.timeout(),
            length: config.length.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl AdviceService for HttpAdviceService {
    async fn get_advice(&self, request: &AdviceRequest) -> Result<String> {
        let payload = AdviceCall {
            user_id: request.user_id(),
            question: request.question(),
            context: request.context(),
            length: &self.length,
            temperature: self.temperature,
        };

        tracing::info!(
            upstream = %SERVICE,
            url = %self.url,
            timeout_sec = self.timeout.as_secs(),
            "Calling external advice service"
        );

        let reply = with_retries(SERVICE, self.max_retries, || {
            execute(
                SERVICE,
                self.client
                    .post(self.url.clone())
                    .json(&payload)
                    .timeout(self.timeout),
            )
        })
        .await?;

        if !reply.is_success() {
            return Err(Error::upstream_status(
                SERVICE,
                reply.status,
                format!(
                    "advice service returned status {}: {}",
                    reply.status,
                    excerpt(&reply.body)
                ),
            ));
        }

        let advice = extract_advice(&reply.body)?;
        tracing::info!(upstream = %SERVICE, advice_len = advice.len(), "Received advice");
        Ok(advice)
    }
}

/// Pull the advice text out of a response body.
///
/// JSON objects carrying an `error` key are failures; otherwise the first of
/// `advice`, `response`, `answer` wins. Non-JSON bodies are plain-text advice.
pub fn extract_advice(body: &str) -> Result<String> {
    let advice = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => {
            if let Some(error) = map.get("error") {
                return Err(Error::upstream(
                    SERVICE,
                    format!("advice service reported an error: {}", error),
                ));
            }
            ADVICE_KEYS
                .iter()
                .find_map(|key| map.get(*key))
                .map(value_text)
                .unwrap_or_else(|| Value::Object(map.clone()).to_string())
        }
        Ok(other) => value_text(&other),
        Err(_) => body.to_string(),
    };

    let advice = advice.trim().to_string();
    if advice.chars().count() < MIN_ADVICE_CHARS {
        return Err(Error::upstream(
            SERVICE,
            "advice service returned empty or invalid advice",
        ));
    }
    Ok(advice)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_known_keys_in_order() {
        let body = r#"{"response": "Second choice text", "advice": "Spend less than you earn."}"#;
        assert_eq!(extract_advice(body).unwrap(), "Spend less than you earn.");

        let body = r#"{"answer": "Diversify across index funds."}"#;
        assert_eq!(extract_advice(body).unwrap(), "Diversify across index funds.");
    }

    #[test]
    fn plain_text_body_is_advice() {
        let body = "  Pay off high-interest debt first.  ";
        assert_eq!(extract_advice(body).unwrap(), "Pay off high-interest debt first.");
    }

    #[test]
    fn json_string_body_is_unwrapped() {
        assert_eq!(
            extract_advice(r#""Keep an emergency fund.""#).unwrap(),
            "Keep an emergency fund."
        );
    }

    #[test]
    fn error_key_is_a_failure() {
        let err = extract_advice(r#"{"error": "model overloaded"}"#).unwrap_err();
        assert_eq!(err.service(), Some(UpstreamService::AdviceService));
    }

    #[test]
    fn short_advice_is_rejected() {
        assert!(extract_advice(r#"{"advice": "ok"}"#).is_err());
        assert!(extract_advice("   ").is_err());
    }
}
