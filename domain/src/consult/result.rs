//! Consultation result - built incrementally, sealed at completion or abort

use crate::agent::Agent;
use crate::consult::artifact::{
    CrossExamArtifact, Dissent, IndependentArtifact, SynthesisArtifact, VerdictArtifact,
};
use crate::consult::response::{AgentResponse, TokenUsage};
use crate::consult::state::{AbortReason, ConsultState};
use crate::mode::PromptVersions;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: &str = "1.0";

/// Terminal status of a consultation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultStatus {
    Complete,
    Partial,
    Aborted,
}

/// Raw provider responses grouped by round
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundResponses {
    #[serde(default)]
    pub round1: Vec<AgentResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round2: Option<AgentResponse>,
    #[serde(default)]
    pub round3: Vec<AgentResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round3_synthesis: Option<AgentResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round4: Option<AgentResponse>,
}

/// Extracted artifacts grouped by round
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundArtifacts {
    #[serde(default)]
    pub round1: Vec<IndependentArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round2: Option<SynthesisArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round3: Option<CrossExamArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round4: Option<VerdictArtifact>,
}

/// Aggregate token and dollar spend
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub tokens: TokenUsage,
    pub usd: f64,
}

/// One agent's contribution as surfaced to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perspective {
    pub agent: String,
    pub position: String,
    pub confidence: f64,
}

/// The single structured decision artifact a consultation produces.
///
/// Owned exclusively by the orchestrator while in progress; the formatter
/// collaborators only ever see the sealed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationResult {
    pub schema_version: String,
    pub consultation_id: String,
    pub question: String,
    #[serde(default)]
    pub context: String,
    pub mode: String,
    pub agents: Vec<Agent>,
    pub state: ConsultState,
    pub rounds_requested: u8,
    pub rounds_completed: u8,
    pub responses: RoundResponses,
    pub artifacts: RoundArtifacts,
    #[serde(default)]
    pub consensus: String,
    pub confidence: f64,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub dissent: Vec<Dissent>,
    #[serde(default)]
    pub perspectives: Vec<Perspective>,
    pub cost: CostReport,
    pub estimated_cost: f64,
    pub actual_cost: f64,
    pub cost_exceeded: bool,
    pub duration_ms: u64,
    pub prompt_versions: PromptVersions,
    pub status: ConsultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_termination_savings_usd: Option<f64>,
}

impl ConsultationResult {
    pub fn new(
        consultation_id: impl Into<String>,
        question: impl Into<String>,
        context: impl Into<String>,
        mode: impl Into<String>,
        agents: Vec<Agent>,
        rounds_requested: u8,
        estimated_cost: f64,
        prompt_versions: PromptVersions,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            consultation_id: consultation_id.into(),
            question: question.into(),
            context: context.into(),
            mode: mode.into(),
            agents,
            state: ConsultState::Estimating,
            rounds_requested,
            rounds_completed: 0,
            responses: RoundResponses::default(),
            artifacts: RoundArtifacts::default(),
            consensus: String::new(),
            confidence: 0.0,
            recommendation: String::new(),
            concerns: Vec::new(),
            dissent: Vec::new(),
            perspectives: Vec::new(),
            cost: CostReport::default(),
            estimated_cost,
            actual_cost: 0.0,
            cost_exceeded: false,
            duration_ms: 0,
            prompt_versions,
            status: ConsultStatus::Aborted,
            abort_reason: None,
            resume_token: None,
            signature: None,
            early_termination_savings_usd: None,
        }
    }

    /// Derive user-facing perspectives from the Round 1 artifacts.
    pub fn derive_perspectives(&mut self) {
        self.perspectives = self
            .artifacts
            .round1
            .iter()
            .map(|a| Perspective {
                agent: a.agent_id.clone(),
                position: a.position.clone(),
                confidence: a.confidence,
            })
            .collect();
    }

    /// Seal as complete.
    pub fn seal_complete(&mut self, duration_ms: u64) {
        self.state = ConsultState::Complete;
        self.status = ConsultStatus::Complete;
        self.duration_ms = duration_ms;
    }

    /// Seal as aborted; the partial manager turns this into the signed
    /// partial record. A consultation that aborted before any round
    /// completed is `Aborted`; one carrying round data is `Partial`.
    pub fn seal_aborted(&mut self, reason: AbortReason, duration_ms: u64) {
        self.state = ConsultState::Aborted;
        self.status = if self.rounds_completed == 0 {
            ConsultStatus::Aborted
        } else {
            ConsultStatus::Partial
        };
        self.abort_reason = Some(reason.wire_str().to_string());
        self.duration_ms = duration_ms;
    }

    /// Round names with a completed artifact, in round order.
    pub fn completed_round_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if !self.artifacts.round1.is_empty() {
            names.push("independent");
        }
        if self.artifacts.round2.is_some() {
            names.push("synthesis");
        }
        if self.artifacts.round3.is_some() {
            names.push("cross_exam");
        }
        if self.artifacts.round4.is_some() {
            names.push("verdict");
        }
        names
    }

    /// Complement of [`Self::completed_round_names`] over the requested rounds.
    pub fn incomplete_round_names(&self) -> Vec<&'static str> {
        let completed = self.completed_round_names();
        ["independent", "synthesis", "cross_exam", "verdict"]
            .into_iter()
            .take(self.rounds_requested as usize)
            .filter(|n| !completed.contains(n))
            .collect()
    }

    /// Agents that produced a successful Round 1 artifact.
    pub fn successful_agents(&self) -> Vec<String> {
        self.artifacts
            .round1
            .iter()
            .map(|a| a.agent_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::PromptVersions;

    fn result() -> ConsultationResult {
        ConsultationResult::new(
            "c-1",
            "Which auth scheme?",
            "",
            "converge",
            Agent::default_panel(),
            4,
            0.12,
            PromptVersions::default(),
        )
    }

    #[test]
    fn test_round_names_empty() {
        let r = result();
        assert!(r.completed_round_names().is_empty());
        assert_eq!(
            r.incomplete_round_names(),
            vec!["independent", "synthesis", "cross_exam", "verdict"]
        );
    }

    #[test]
    fn test_round_names_after_synthesis() {
        let mut r = result();
        r.artifacts.round1.push(IndependentArtifact {
            agent_id: "SecExpert".into(),
            round: 1,
            position: "Use OAuth".into(),
            key_points: vec![],
            rationale: String::new(),
            confidence: 0.9,
            prose_excerpt: String::new(),
            created_at: "t".into(),
        });
        r.artifacts.round2 = Some(SynthesisArtifact {
            round: 2,
            consensus_points: vec![],
            tensions: vec![],
            priority_order: vec![],
        });
        assert_eq!(r.completed_round_names(), vec!["independent", "synthesis"]);
        assert_eq!(r.incomplete_round_names(), vec!["cross_exam", "verdict"]);
    }

    #[test]
    fn test_incomplete_respects_rounds_requested() {
        let mut r = result();
        r.rounds_requested = 1;
        assert_eq!(r.incomplete_round_names(), vec!["independent"]);
    }

    #[test]
    fn test_seal_aborted_maps_wire_reason() {
        let mut r = result();
        r.seal_aborted(AbortReason::CostExceeded, 1234);
        // Nothing completed: a clean abort, not a partial
        assert_eq!(r.status, ConsultStatus::Aborted);
        assert_eq!(r.abort_reason.as_deref(), Some("cost_exceeded_estimate"));
        assert_eq!(r.duration_ms, 1234);

        let mut r = result();
        r.rounds_completed = 2;
        r.seal_aborted(AbortReason::CostExceeded, 1234);
        assert_eq!(r.status, ConsultStatus::Partial);
    }

    #[test]
    fn test_derive_perspectives() {
        let mut r = result();
        r.artifacts.round1.push(IndependentArtifact {
            agent_id: "Architect".into(),
            round: 1,
            position: "Prefer sessions".into(),
            key_points: vec![],
            rationale: String::new(),
            confidence: 0.7,
            prose_excerpt: String::new(),
            created_at: "t".into(),
        });
        r.derive_perspectives();
        assert_eq!(r.perspectives.len(), 1);
        assert_eq!(r.perspectives[0].agent, "Architect");
    }
}
