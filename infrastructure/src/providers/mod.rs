//! Offline provider adapter.
//!
//! Real transports live outside this workspace - consumers implement
//! [`ProviderChat`] over their own clients. [`CannedProvider`] serves
//! schema-valid replies offline so `--dry-run` consultations and smoke
//! tests exercise the whole pipeline without network access.

use async_trait::async_trait;
use conclave_application::{
    ChatReply, ChatUsage, HealthMap, ProviderChat, ProviderError, ProviderRegistry, ProviderTier,
};
use conclave_domain::{Agent, Message};
use std::sync::Arc;

/// Provider that answers every round with a plausible, schema-valid reply.
pub struct CannedProvider {
    voice: String,
}

impl CannedProvider {
    pub fn new(voice: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            voice: voice.into(),
        })
    }

    /// The prompt's schema block identifies the round being asked for.
    fn reply_for(&self, prompt: &str) -> String {
        if prompt.contains("\"recommendation\"") {
            format!(
                r#"{{"_analysis": "offline dry run", "recommendation": "Dry-run recommendation from {}", "confidence": 0.75, "evidence": ["dry run"], "dissent": []}}"#,
                self.voice
            )
        } else if prompt.contains("\"consensus_points\"") {
            r#"{"consensus_points": [{"point": "Dry-run consensus", "supporting_agents": [], "confidence": 0.75}], "tensions": [], "priority_order": []}"#
                .to_string()
        } else if prompt.contains("\"challenges\"") {
            format!(
                r#"{{"challenges": [{{"challenger": "{}", "target": "Consensus", "challenge": "dry-run challenge", "evidence": []}}], "rebuttals": [], "unresolved": []}}"#,
                self.voice
            )
        } else {
            format!(
                r#"{{"position": "Dry-run position from {}", "key_points": ["offline"], "rationale": "canned reply", "confidence": 0.7}}"#,
                self.voice
            )
        }
    }
}

#[async_trait]
impl ProviderChat for CannedProvider {
    async fn chat(
        &self,
        messages: &[Message],
        _system_prompt: &str,
    ) -> Result<ChatReply, ProviderError> {
        let prompt = messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(ChatReply {
            text: self.reply_for(prompt),
            usage: ChatUsage {
                input_tokens: (prompt.len() / 4) as u64,
                output_tokens: 300,
            },
        })
    }
}

/// Registry serving the panel's and judge's provider handles offline.
pub fn canned_registry(panel: &[Agent], judge: &Agent) -> (Arc<ProviderRegistry>, Arc<HealthMap>) {
    let mut registry = ProviderRegistry::new();
    for agent in panel.iter().chain(std::iter::once(judge)) {
        if registry.get(&agent.provider).is_none() {
            registry.register(
                agent.provider.clone(),
                ProviderTier::Tier1,
                None,
                CannedProvider::new(agent.name.clone()),
            );
        }
    }
    (Arc::new(registry), Arc::new(HealthMap::new()))
}
