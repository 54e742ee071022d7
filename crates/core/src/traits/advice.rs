//! Advice service traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::AdviceRequest;

/// External service that answers a question with free-text advice.
#[async_trait]
pub trait AdviceService: Send + Sync {
    /// Produce raw advice for the request.
    async fn get_advice(&self, request: &AdviceRequest) -> Result<String>;
}
