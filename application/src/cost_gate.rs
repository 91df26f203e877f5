//! Cost gate: admission control for estimated spend.
//!
//! Estimates at or under the auto-approve threshold pass silently; anything
//! above it prompts the user (or auto-approves with a notice when running
//! non-interactively). Choosing "always" persists a new threshold through
//! the config store and approves the current run.

use crate::ports::config_store::ConfigStore;
use crate::ports::consent::{ConsentDecision, ConsentPort};
use conclave_domain::{Agent, ConsultError, CostEstimate};
use std::sync::Arc;
use tracing::{info, warn};

/// Environment flag marking a non-interactive host (MCP server, CI).
pub const NON_INTERACTIVE_ENV: &str = "LLM_CONCLAVE_MCP";

/// True when consent and fallback prompts must be suppressed.
pub fn non_interactive() -> bool {
    std::env::var(NON_INTERACTIVE_ENV)
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Final admission decision for a consultation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Approved,
    Denied,
}

/// Admission control over the pre-flight estimate.
pub struct CostGate {
    consent: Arc<dyn ConsentPort>,
    config: Arc<dyn ConfigStore>,
}

impl CostGate {
    pub fn new(consent: Arc<dyn ConsentPort>, config: Arc<dyn ConfigStore>) -> Self {
        Self { consent, config }
    }

    /// Whether the estimate requires a prompt. Strict greater-than: a cost
    /// exactly at the threshold does not prompt.
    pub fn should_prompt(estimate: &CostEstimate, always_allow_under: f64) -> bool {
        estimate.usd > always_allow_under
    }

    /// Run the admission check for this consultation.
    pub async fn check(
        &self,
        estimate: &CostEstimate,
        agents: &[Agent],
        rounds: u8,
    ) -> Result<Admission, ConsultError> {
        let threshold = self.config.always_allow_under();

        if !Self::should_prompt(estimate, threshold) {
            info!(
                usd = estimate.usd,
                threshold, "Estimated cost under threshold, auto-approved"
            );
            return Ok(Admission::Approved);
        }

        if non_interactive() {
            info!(
                usd = estimate.usd,
                "Non-interactive mode: auto-approving estimated cost"
            );
            return Ok(Admission::Approved);
        }

        match self.consent.request_consent(estimate, agents, rounds).await {
            ConsentDecision::Approved => Ok(Admission::Approved),
            ConsentDecision::Denied => Ok(Admission::Denied),
            ConsentDecision::Always(new_threshold) => {
                if !(new_threshold.is_finite() && new_threshold > 0.0) {
                    return Err(ConsultError::Validation(format!(
                        "auto-approve threshold must be a positive number, got {}",
                        new_threshold
                    )));
                }
                if let Err(e) = self.config.save_always_allow_under(new_threshold) {
                    // The user already approved this run; a failed persist
                    // only loses the new default.
                    warn!("Could not persist auto-approve threshold: {}", e);
                }
                Ok(Admission::Approved)
            }
        }
    }
}
