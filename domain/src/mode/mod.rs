//! Debate mode strategies.
//!
//! A [`ModeStrategy`] is a capability set, not an inheritance tree: it
//! produces the per-round prompts and decides early termination. Two
//! concrete strategies exist - [`ConvergeMode`] drives toward one decisive
//! recommendation, [`ExploreMode`] widens the option space. The orchestrator
//! receives its strategy as a constructor parameter.

mod converge;
mod explore;

pub use converge::ConvergeMode;
pub use explore::ExploreMode;

use crate::agent::Agent;
use crate::consult::artifact::{CrossExamArtifact, IndependentArtifact, SynthesisArtifact};
use crate::core::question::Question;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The two debate styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateMode {
    /// Divergent: generate and preserve a breadth of options
    Explore,
    /// Decisive: drive the panel to one recommendation
    #[default]
    Converge,
}

impl DebateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebateMode::Explore => "explore",
            DebateMode::Converge => "converge",
        }
    }

    /// Build the strategy value for this mode.
    pub fn strategy(&self) -> Arc<dyn ModeStrategy> {
        match self {
            DebateMode::Explore => Arc::new(ExploreMode::new()),
            DebateMode::Converge => Arc::new(ConvergeMode::default()),
        }
    }
}

impl std::fmt::Display for DebateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DebateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "explore" | "e" => Ok(DebateMode::Explore),
            "converge" | "c" => Ok(DebateMode::Converge),
            _ => Err(format!("Invalid mode: {} (expected explore|converge)", s)),
        }
    }
}

/// Prompt version strings reported in the final result so logs are
/// reproducible across prompt revisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptVersions {
    pub independent: String,
    pub synthesis: String,
    pub cross_exam: String,
    pub verdict: String,
}

/// Strategy capability set driving the four debate rounds.
pub trait ModeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn prompt_versions(&self) -> PromptVersions;

    /// Round 1: the agent's independent position.
    fn independent_prompt(&self, question: &Question, agent: &Agent) -> String;

    /// Round 2: the judge's synthesis over all successful Round 1 artifacts.
    fn synthesis_prompt(&self, question: &Question, artifacts: &[IndependentArtifact]) -> String;

    /// Round 3 (per agent): cross-examination parameterised by the agent's
    /// own Round 1 artifact and the Round 2 synthesis.
    fn cross_exam_prompt(
        &self,
        question: &Question,
        own: &IndependentArtifact,
        synthesis: &SynthesisArtifact,
    ) -> String;

    /// Round 3 (judge): digest the agents' cross-exam responses.
    fn cross_exam_synthesis_prompt(
        &self,
        question: &Question,
        responses: &[(String, String)],
    ) -> String;

    /// Round 4: the verdict.
    fn verdict_prompt(
        &self,
        question: &Question,
        synthesis: &SynthesisArtifact,
        cross_exam: &CrossExamArtifact,
    ) -> String;

    /// Whether the debate may stop after `round` given the current
    /// consensus confidence.
    fn should_terminate_early(&self, confidence: f64, round: u8) -> bool;
}

/// The fixed suffix appended to every round prompt: a JSON-only
/// instruction plus the explicit schema for that round.
pub(crate) fn json_only(schema: &str) -> String {
    format!(
        "\nRespond with JSON only - a single JSON object, no surrounding prose, \
         no markdown fences.\nSchema:\n{}\n",
        schema
    )
}

/// Render the question (and its context, when present) as a prompt header.
pub(crate) fn question_block(question: &Question) -> String {
    if question.has_context() {
        format!(
            "Question: {}\n\nContext:\n{}\n",
            question.content(),
            question.context()
        )
    } else {
        format!("Question: {}\n", question.content())
    }
}

/// Render Round 1 artifacts as a labelled section for judge prompts.
pub(crate) fn positions_block(artifacts: &[IndependentArtifact]) -> String {
    let mut block = String::new();
    for artifact in artifacts {
        block.push_str(&format!(
            "\n--- {} (confidence {:.2}) ---\nPosition: {}\nKey points: {}\nRationale: {}\n",
            artifact.agent_id,
            artifact.confidence,
            artifact.position,
            artifact.key_points.join("; "),
            artifact.rationale,
        ));
    }
    block
}

/// Render the synthesis artifact as a section for later-round prompts.
pub(crate) fn synthesis_block(synthesis: &SynthesisArtifact) -> String {
    serde_json::to_string_pretty(synthesis).unwrap_or_else(|_| "{}".to_string())
}
