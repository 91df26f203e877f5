//! Typed round artifacts
//!
//! Each debate round produces a structured record extracted from free-form
//! model output. Artifacts serialize as snake_case JSON, matching both the
//! schemas the prompts request from the models and the on-disk result files.

use crate::agent::AgentId;
use serde::{Deserialize, Serialize};

/// Round 1: one agent's independent position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndependentArtifact {
    pub agent_id: AgentId,
    pub round: u8,
    /// Short statement of the agent's stance. Blank position ⇒ failed artifact.
    pub position: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub rationale: String,
    /// Clamped to [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub prose_excerpt: String,
    pub created_at: String,
}

impl IndependentArtifact {
    /// An artifact with an empty position is treated as a failed extraction.
    pub fn is_failed(&self) -> bool {
        self.position.trim().is_empty()
    }
}

/// One point of agreement identified by the judge in Round 2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusPoint {
    pub point: String,
    #[serde(default)]
    pub supporting_agents: Vec<AgentId>,
    pub confidence: f64,
}

/// A viewpoint held by one agent inside a tension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewpoint {
    pub agent_id: AgentId,
    pub viewpoint: String,
}

/// An unresolved disagreement between agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tension {
    pub topic: String,
    #[serde(default)]
    pub viewpoints: Vec<Viewpoint>,
}

/// Round 2: the judge's synthesis across all Round 1 artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisArtifact {
    pub round: u8,
    #[serde(default)]
    pub consensus_points: Vec<ConsensusPoint>,
    #[serde(default)]
    pub tensions: Vec<Tension>,
    #[serde(default)]
    pub priority_order: Vec<String>,
}

impl SynthesisArtifact {
    /// The maximum confidence among consensus points; drives early
    /// termination in converge mode. Zero when no consensus emerged.
    pub fn consensus_confidence(&self) -> f64 {
        self.consensus_points
            .iter()
            .map(|p| p.confidence)
            .fold(0.0, f64::max)
    }

    /// The highest-confidence consensus point, if any.
    pub fn top_consensus(&self) -> Option<&ConsensusPoint> {
        self.consensus_points
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    /// Drop references to agents outside the given set of successful
    /// Round 1 participants. Models sometimes invent supporter names.
    pub fn retain_known_agents(&mut self, known: &[AgentId]) {
        for point in &mut self.consensus_points {
            point.supporting_agents.retain(|id| known.contains(id));
        }
        for tension in &mut self.tensions {
            tension.viewpoints.retain(|v| known.contains(&v.agent_id));
        }
    }
}

/// A challenge raised during cross-examination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub challenger: AgentId,
    /// An agent name, or the literal "Consensus"
    pub target: String,
    pub challenge: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// A rebuttal to a challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rebuttal {
    pub agent: AgentId,
    pub rebuttal: String,
}

/// Round 3: the judge's digest of the cross-examination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossExamArtifact {
    pub round: u8,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
    #[serde(default)]
    pub rebuttals: Vec<Rebuttal>,
    #[serde(default)]
    pub unresolved: Vec<String>,
}

impl CrossExamArtifact {
    /// The tolerated-failure artifact: a judge failure in Round 3 degrades
    /// to an empty cross-exam instead of aborting the consultation.
    pub fn empty() -> Self {
        Self {
            round: 3,
            challenges: Vec::new(),
            rebuttals: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty() && self.rebuttals.is_empty() && self.unresolved.is_empty()
    }
}

/// Severity of a dissenting concern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

/// A recorded dissent against the final recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dissent {
    pub agent: AgentId,
    pub concern: String,
    pub severity: Severity,
}

/// Round 4: the judge's verdict
///
/// In converge mode `recommendation` is exactly one decision; in explore
/// mode it may enumerate a menu of labelled options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictArtifact {
    pub round: u8,
    pub recommendation: String,
    /// Clamped to [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub dissent: Vec<Dissent>,
}
