//! Agent response envelopes

use serde::{Deserialize, Serialize};

/// Token usage reported by a provider for a single call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.input += other.input;
        self.output += other.output;
        self.total += other.total;
    }
}

/// Envelope paired with each Round 1 or Round 3 agent call.
///
/// Created by the orchestrator when a call resolves or fails; never
/// mutated after. A substituted provider reports the substitute's
/// provider/model here, so cost accounting follows the call that
/// actually served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_id: String,
    pub model: String,
    pub provider: String,
    pub content: String,
    pub tokens: TokenUsage,
    pub duration_ms: u64,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn success(
        agent_id: impl Into<String>,
        model: impl Into<String>,
        provider: impl Into<String>,
        content: impl Into<String>,
        tokens: TokenUsage,
        duration_ms: u64,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            model: model.into(),
            provider: provider.into(),
            content: content.into(),
            tokens,
            duration_ms,
            timestamp: timestamp.into(),
            error: None,
        }
    }

    pub fn failure(
        agent_id: impl Into<String>,
        model: impl Into<String>,
        provider: impl Into<String>,
        error: impl Into<String>,
        duration_ms: u64,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            model: model.into(),
            provider: provider.into(),
            content: String::new(),
            tokens: TokenUsage::default(),
            duration_ms,
            timestamp: timestamp.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
