//! Converge ("decisive") mode
//!
//! Frames Round 1 as taking a strong position, Round 2 as surfacing
//! disagreements, Round 3 as challenging weak arguments, and Round 4 as
//! issuing ONE definitive recommendation. May terminate the debate early
//! once the panel's consensus confidence clears the threshold.

use super::{json_only, positions_block, question_block, synthesis_block, ModeStrategy,
            PromptVersions};
use crate::agent::Agent;
use crate::consult::artifact::{CrossExamArtifact, IndependentArtifact, SynthesisArtifact};
use crate::core::question::Question;

const INDEPENDENT_SCHEMA: &str = r#"{
  "position": "one-sentence statement of your stance",
  "key_points": ["supporting point", "..."],
  "rationale": "a paragraph of reasoning",
  "confidence": 0.0
}"#;

const SYNTHESIS_SCHEMA: &str = r#"{
  "consensus_points": [
    {"point": "statement all or most agents back",
     "supporting_agents": ["AgentName"],
     "confidence": 0.0}
  ],
  "tensions": [
    {"topic": "the disagreement",
     "viewpoints": [{"agent_id": "AgentName", "viewpoint": "their stance"}]}
  ],
  "priority_order": ["most important topic first"]
}"#;

const CROSS_EXAM_SCHEMA: &str = r#"{
  "challenges": [
    {"challenger": "your name",
     "target": "AgentName or Consensus",
     "challenge": "the specific weakness",
     "evidence": ["supporting fact"]}
  ],
  "rebuttals": [{"agent": "your name", "rebuttal": "defense of your position"}],
  "unresolved": ["question still open"]
}"#;

// The scratchpad comes first so the model reasons before committing.
const VERDICT_SCHEMA: &str = r#"{
  "_analysis": "scratchpad: weigh the strongest arguments BEFORE deciding",
  "recommendation": "exactly ONE definitive decision",
  "confidence": 0.0,
  "evidence": ["decisive argument"],
  "dissent": [{"agent": "AgentName", "concern": "their objection", "severity": "low|medium|high"}]
}"#;

/// Default consensus-confidence threshold for early termination.
pub const DEFAULT_EARLY_TERMINATION_THRESHOLD: f64 = 0.95;

/// The decisive strategy.
#[derive(Debug, Clone)]
pub struct ConvergeMode {
    early_termination_threshold: f64,
}

impl ConvergeMode {
    pub fn new(early_termination_threshold: f64) -> Self {
        Self {
            early_termination_threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.early_termination_threshold
    }
}

impl Default for ConvergeMode {
    fn default() -> Self {
        Self::new(DEFAULT_EARLY_TERMINATION_THRESHOLD)
    }
}

impl ModeStrategy for ConvergeMode {
    fn name(&self) -> &'static str {
        "converge"
    }

    fn prompt_versions(&self) -> PromptVersions {
        PromptVersions {
            independent: "converge.independent.v2".into(),
            synthesis: "converge.synthesis.v2".into(),
            cross_exam: "converge.cross_exam.v2".into(),
            verdict: "converge.verdict.v3".into(),
        }
    }

    fn independent_prompt(&self, question: &Question, agent: &Agent) -> String {
        format!(
            "{q}\nAs {name} ({role}), take a STRONG position on this question. \
             Commit to a single stance and defend it; do not hedge across options. \
             State your confidence honestly.\n{schema}",
            q = question_block(question),
            name = agent.name,
            role = agent.role,
            schema = json_only(INDEPENDENT_SCHEMA),
        )
    }

    fn synthesis_prompt(&self, question: &Question, artifacts: &[IndependentArtifact]) -> String {
        format!(
            "{q}\nThe expert panel answered independently:\n{positions}\n\
             Find the disagreements and conflicts between these positions. \
             Identify what the panel genuinely agrees on, name every tension \
             explicitly, and rank the open topics by how much they matter to \
             the final decision.\n{schema}",
            q = question_block(question),
            positions = positions_block(artifacts),
            schema = json_only(SYNTHESIS_SCHEMA),
        )
    }

    fn cross_exam_prompt(
        &self,
        question: &Question,
        own: &IndependentArtifact,
        synthesis: &SynthesisArtifact,
    ) -> String {
        format!(
            "{q}\nYour original position was:\n{own}\n\nThe moderator's synthesis \
             of the whole panel:\n{synth}\n\nChallenge the weak arguments. Attack \
             the flimsiest reasoning in the synthesis or in other agents' \
             positions, with evidence. Defend your own position only where it was \
             genuinely mischaracterised.\n{schema}",
            q = question_block(question),
            own = serde_json::to_string_pretty(own).unwrap_or_default(),
            synth = synthesis_block(synthesis),
            schema = json_only(CROSS_EXAM_SCHEMA),
        )
    }

    fn cross_exam_synthesis_prompt(
        &self,
        question: &Question,
        responses: &[(String, String)],
    ) -> String {
        let mut body = String::new();
        for (agent, content) in responses {
            body.push_str(&format!("\n--- {} ---\n{}\n", agent, content));
        }
        format!(
            "{q}\nThe panel cross-examined each other:\n{body}\n\
             Consolidate the exchange into one record: every challenge raised, \
             every rebuttal offered, and what remains unresolved.\n{schema}",
            q = question_block(question),
            body = body,
            schema = json_only(CROSS_EXAM_SCHEMA),
        )
    }

    fn verdict_prompt(
        &self,
        question: &Question,
        synthesis: &SynthesisArtifact,
        cross_exam: &CrossExamArtifact,
    ) -> String {
        format!(
            "{q}\nSynthesis of the panel:\n{synth}\n\nCross-examination record:\n{exam}\n\n\
             Issue ONE definitive recommendation. Fill the _analysis scratchpad \
             first, weighing the surviving arguments, then commit to exactly one \
             decision. Record every dissenting concern with its severity.\n{schema}",
            q = question_block(question),
            synth = synthesis_block(synthesis),
            exam = serde_json::to_string_pretty(cross_exam).unwrap_or_default(),
            schema = json_only(VERDICT_SCHEMA),
        )
    }

    fn should_terminate_early(&self, confidence: f64, round: u8) -> bool {
        round >= 2 && confidence >= self.early_termination_threshold
    }
}
