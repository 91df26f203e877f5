//! Expert agent identities
//!
//! An [`Agent`] is a named expert persona bound to a specific model and
//! provider. The panel is fixed at construction time; agents never mutate.

use serde::{Deserialize, Serialize};

/// Identifier of an agent within the panel (its display name)
pub type AgentId = String;

/// A named expert persona with a fixed system prompt (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Display name, unique within the panel (e.g., "SecExpert")
    pub name: String,
    /// One-line description of the expert's leaning
    pub role: String,
    /// Model identifier (e.g., "claude-sonnet-4.5")
    pub model: String,
    /// Provider handle the hedged request manager resolves (e.g., "anthropic")
    pub provider: String,
    /// System prompt establishing the persona
    pub system_prompt: String,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        model: impl Into<String>,
        provider: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            model: model.into(),
            provider: provider.into(),
            system_prompt: system_prompt.into(),
        }
    }

    /// The default three-expert panel: security, architecture, pragmatism.
    pub fn default_panel() -> Vec<Agent> {
        vec![
            Agent::new(
                "SecExpert",
                "Security-leaning reviewer focused on threat surface and failure modes",
                "claude-sonnet-4.5",
                "anthropic",
                "You are a senior security engineer. Evaluate every proposal for \
                 attack surface, blast radius, and failure modes before anything else.",
            ),
            Agent::new(
                "Architect",
                "Architecture-leaning reviewer focused on long-term structure",
                "gpt-4o",
                "openai",
                "You are a principal software architect. Evaluate proposals for \
                 coupling, evolvability, and operational complexity over a 3-year horizon.",
            ),
            Agent::new(
                "Pragmatist",
                "Pragmatism-leaning reviewer focused on shipping and simplicity",
                "gemini-2.5-pro",
                "google",
                "You are a pragmatic staff engineer. Favor the simplest approach \
                 that ships this quarter and can be maintained by a small team.",
            ),
        ]
    }

    /// The designated arbiter used for Synthesis, Cross-Exam synthesis and
    /// Verdict rounds.
    pub fn default_judge() -> Agent {
        Agent::new(
            "Judge",
            "Arbiter synthesizing the panel's positions into a decision",
            "gpt-4o",
            "openai",
            "You are an impartial arbiter. Weigh well-reasoned arguments \
             regardless of source and commit to clear, structured output.",
        )
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.model)
    }
}
