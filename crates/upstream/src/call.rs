//! Shared request execution: timeouts, error mapping, metrics and retries.

use std::future::Future;
use std::time::{Duration, Instant};

use advice_core::{Error, Result, UpstreamService};
use advice_governance::track_upstream_call;

/// Pause before the first retry; doubled for each further attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Longest upstream body excerpt carried in error messages.
const BODY_EXCERPT_CHARS: usize = 200;

/// An answered upstream call with a status below 500.
#[derive(Debug)]
pub(crate) struct UpstreamReply {
    pub status: u16,
    pub body: String,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Send a request and read its body.
///
/// Transport failures, timeouts and 5xx answers become errors; every other
/// status is returned for the caller to interpret.
pub(crate) async fn execute(
    service: UpstreamService,
    request: reqwest::RequestBuilder,
) -> Result<UpstreamReply> {
    let start = Instant::now();
    let result = async {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok::<_, reqwest::Error>(UpstreamReply { status, body })
    }
    .await;
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(reply) => {
            track_upstream_call(service, &reply.status.to_string(), elapsed);
            tracing::debug!(
                upstream = %service,
                status = reply.status,
                elapsed_sec = elapsed,
                "Upstream replied"
            );
            if reply.status >= 500 {
                return Err(Error::upstream_status(
                    service,
                    reply.status,
                    format!("returned status {}: {}", reply.status, excerpt(&reply.body)),
                ));
            }
            Ok(reply)
        }
        Err(e) => {
            let err = transport_error(service, e);
            let outcome = if err.is_timeout() { "timeout" } else { "transport_error" };
            track_upstream_call(service, outcome, elapsed);
            tracing::warn!(
                upstream = %service,
                error = %err,
                elapsed_sec = elapsed,
                "Upstream call failed"
            );
            Err(err)
        }
    }
}

/// Map a reqwest failure onto the gateway's error type.
pub(crate) fn transport_error(service: UpstreamService, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::timeout(service, e.to_string())
    } else {
        Error::upstream(service, e.to_string())
    }
}

/// Run `op`, retrying transient failures up to `max_retries` extra times.
pub(crate) async fn with_retries<T, F, Fut>(
    service: UpstreamService,
    max_retries: u32,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries && e.is_transient() => {
                attempt += 1;
                let delay = backoff(attempt);
                tracing::warn!(
                    upstream = %service,
                    attempt,
                    max_retries,
                    error = %e,
                    "Transient upstream failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Delay before retry number `attempt` (1-based), doubling from the base.
fn backoff(attempt: u32) -> Duration {
    RETRY_BACKOFF.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// First characters of an upstream body, for error messages.
pub(crate) fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
    cut.push_str("...");
    cut
}
