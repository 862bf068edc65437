//! Inference backend trait

use crate::error::TellerResult;
use async_trait::async_trait;
use serde::Serialize;

/// Result of one streamed completion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub content: String,
    /// Seconds from dispatch to the first content-bearing chunk
    pub ttft_seconds: f64,
    /// Seconds from dispatch to end of stream
    pub total_seconds: f64,
}

impl Completion {
    pub fn new(content: impl Into<String>, ttft_seconds: f64) -> Self {
        Self {
            content: content.into(),
            ttft_seconds,
            total_seconds: ttft_seconds,
        }
    }
}

/// A remote model that turns one prompt into one completion
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Send `prompt` as a single user message and collect the streamed reply
    async fn complete(&self, prompt: &str) -> TellerResult<Completion>;
}
