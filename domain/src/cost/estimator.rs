//! Pre-flight cost projection and in-flight spend accounting.
//!
//! The estimate is input-bounded: it assumes the question is sent once per
//! agent and each agent produces [`TOKENS_PER_ROUND`] output tokens per
//! round. Actual spend is summed from provider-reported usage at each
//! response's own model price.

use crate::agent::Agent;
use crate::consult::response::AgentResponse;
use crate::cost::pricing::ModelPricing;
use serde::{Deserialize, Serialize};

/// Assumed output tokens per agent per round.
pub const TOKENS_PER_ROUND: u64 = 2000;

/// Pre-flight projection for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEstimate {
    pub agent: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub usd: f64,
}

/// Pre-flight projection for the whole consultation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub question_tokens: u64,
    pub input_tokens_total: u64,
    pub output_tokens_total: u64,
    pub usd: f64,
    pub per_agent: Vec<AgentEstimate>,
}

/// Rough token count for a prompt string (4 chars ≈ 1 token).
pub fn approximate_tokens(text: &str) -> u64 {
    text.len().div_ceil(4) as u64
}

/// Project the cost of consulting `agents` for `rounds` rounds.
///
/// Negative round counts cannot occur at the type level; a zero-round
/// request estimates input cost only.
pub fn estimate(question: &str, agents: &[Agent], rounds: u8) -> CostEstimate {
    let question_tokens = approximate_tokens(question);
    let output_per_agent = rounds as u64 * TOKENS_PER_ROUND;

    let per_agent: Vec<AgentEstimate> = agents
        .iter()
        .map(|agent| {
            let price = ModelPricing::for_model(&agent.model);
            AgentEstimate {
                agent: agent.name.clone(),
                model: agent.model.clone(),
                input_tokens: question_tokens,
                output_tokens: output_per_agent,
                usd: price.cost(question_tokens, output_per_agent),
            }
        })
        .collect();

    CostEstimate {
        question_tokens,
        input_tokens_total: question_tokens * agents.len() as u64,
        output_tokens_total: output_per_agent * agents.len() as u64,
        usd: per_agent.iter().map(|a| a.usd).sum(),
        per_agent,
    }
}

/// USD saved by skipping `rounds_skipped` rounds, assuming each skipped
/// round would have cost [`TOKENS_PER_ROUND`] tokens per agent at the sum
/// of that agent's input and output price.
pub fn early_termination_savings(agents: &[Agent], rounds_skipped: u8) -> f64 {
    let tokens = (rounds_skipped as u64 * TOKENS_PER_ROUND) as f64 / 1000.0;
    agents
        .iter()
        .map(|agent| {
            let price = ModelPricing::for_model(&agent.model);
            tokens * (price.input + price.output)
        })
        .sum()
}

/// Sum the realized USD spend across response envelopes, pricing each at
/// its own model (substituted providers bill at the substitute's model).
pub fn actual_cost(responses: &[&AgentResponse]) -> f64 {
    responses
        .iter()
        .map(|r| ModelPricing::for_model(&r.model).cost(r.tokens.input, r.tokens.output))
        .sum()
}
