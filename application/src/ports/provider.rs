//! Provider chat port
//!
//! Defines the interface for communicating with language-model providers.
//! Transport clients themselves live outside the core; implementations
//! (adapters) are injected at wiring time.

use async_trait::async_trait;
use conclave_domain::Message;
use thiserror::Error;

/// Errors that can occur during a provider call
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Timeout")]
    Timeout,

    #[error("Other error: {0}")]
    Other(String),
}

/// Token usage reported alongside a reply
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A completed provider reply
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub usage: ChatUsage,
}

/// Capability for one chat round-trip against a model.
///
/// Implementations must be safe to call concurrently; the hedged request
/// manager races two of them during a hedge.
#[async_trait]
pub trait ProviderChat: Send + Sync {
    /// Send the conversation and system prompt, await the reply.
    async fn chat(
        &self,
        messages: &[Message],
        system_prompt: &str,
    ) -> Result<ChatReply, ProviderError>;
}
