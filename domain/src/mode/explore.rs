//! Explore ("divergent") mode
//!
//! Frames Round 1 as generating diverse perspectives, Round 2 as finding
//! common themes while preserving unique insights, Round 3 as building on
//! ideas and bridging differences, and Round 4 as presenting a menu of
//! options with trade-offs. Never terminates early.

use super::{json_only, positions_block, question_block, synthesis_block, ModeStrategy,
            PromptVersions};
use crate::agent::Agent;
use crate::consult::artifact::{CrossExamArtifact, IndependentArtifact, SynthesisArtifact};
use crate::core::question::Question;

const INDEPENDENT_SCHEMA: &str = r#"{
  "position": "your distinct perspective on the question",
  "key_points": ["idea worth keeping", "..."],
  "rationale": "a paragraph of reasoning",
  "confidence": 0.0
}"#;

const SYNTHESIS_SCHEMA: &str = r#"{
  "consensus_points": [
    {"point": "shared theme",
     "supporting_agents": ["AgentName"],
     "confidence": 0.0}
  ],
  "tensions": [
    {"topic": "a genuinely different angle worth preserving",
     "viewpoints": [{"agent_id": "AgentName", "viewpoint": "their unique insight"}]}
  ],
  "priority_order": ["theme to explore first"]
}"#;

const CROSS_EXAM_SCHEMA: &str = r#"{
  "challenges": [
    {"challenger": "your name",
     "target": "AgentName or Consensus",
     "challenge": "a gap or an unexplored combination",
     "evidence": ["supporting thought"]}
  ],
  "rebuttals": [{"agent": "your name", "rebuttal": "how your idea extends theirs"}],
  "unresolved": ["direction still worth investigating"]
}"#;

const VERDICT_SCHEMA: &str = r#"{
  "recommendation": "a menu of labelled options, each with its trade-offs",
  "confidence": 0.0,
  "evidence": ["insight that shaped the menu"],
  "dissent": [{"agent": "AgentName", "concern": "caveat on an option", "severity": "low|medium|high"}]
}"#;

/// The divergent strategy.
#[derive(Debug, Clone, Default)]
pub struct ExploreMode;

impl ExploreMode {
    pub fn new() -> Self {
        Self
    }
}

impl ModeStrategy for ExploreMode {
    fn name(&self) -> &'static str {
        "explore"
    }

    fn prompt_versions(&self) -> PromptVersions {
        PromptVersions {
            independent: "explore.independent.v2".into(),
            synthesis: "explore.synthesis.v2".into(),
            cross_exam: "explore.cross_exam.v2".into(),
            verdict: "explore.verdict.v2".into(),
        }
    }

    fn independent_prompt(&self, question: &Question, agent: &Agent) -> String {
        format!(
            "{q}\nAs {name} ({role}), generate a genuinely distinct perspective on \
             this question. Favor breadth over safety: an unusual but defensible \
             angle is worth more than restating the obvious.\n{schema}",
            q = question_block(question),
            name = agent.name,
            role = agent.role,
            schema = json_only(INDEPENDENT_SCHEMA),
        )
    }

    fn synthesis_prompt(&self, question: &Question, artifacts: &[IndependentArtifact]) -> String {
        format!(
            "{q}\nThe expert panel answered independently:\n{positions}\n\
             Find the common themes AND preserve the unique insights. Do not \
             flatten disagreement into consensus - a perspective only one agent \
             holds still belongs in the record if it is interesting.\n{schema}",
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
            "{q}\nYour original perspective was:\n{own}\n\nThe moderator's synthesis \
             of the whole panel:\n{synth}\n\nBuild on the other agents' ideas and \
             bridge the differences. Where two perspectives could combine into \
             something better, say how. Raise gaps as challenges, not attacks.\n{schema}",
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
            "{q}\nThe panel built on each other's ideas:\n{body}\n\
             Consolidate the exchange: the bridges proposed, the combinations \
             suggested, and the directions still unexplored.\n{schema}",
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
             Present a menu of options with trade-offs. Label each option, state \
             when it is the right choice and what it costs. Do NOT collapse the \
             menu into a single winner.\n{schema}",
            q = question_block(question),
            synth = synthesis_block(synthesis),
            exam = serde_json::to_string_pretty(cross_exam).unwrap_or_default(),
            schema = json_only(VERDICT_SCHEMA),
        )
    }

    fn should_terminate_early(&self, _confidence: f64, _round: u8) -> bool {
        false
    }
}
