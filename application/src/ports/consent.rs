//! User-decision ports: cost consent and hedge fallback confirmation.

use async_trait::async_trait;
use conclave_domain::{Agent, CostEstimate};

/// Outcome of a cost-consent prompt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsentDecision {
    Approved,
    Denied,
    /// Approve this run and raise the auto-approve threshold to the given
    /// USD amount for future runs.
    Always(f64),
}

/// Outcome of a hedge-fallback prompt after a primary provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackDecision {
    /// Attempt the backup provider
    Yes,
    /// Skip the backup; degrade this agent gracefully
    No,
    /// Abort the consultation
    Fail,
}

/// Port for asking the user whether an estimated spend is acceptable.
#[async_trait]
pub trait ConsentPort: Send + Sync {
    async fn request_consent(
        &self,
        estimate: &CostEstimate,
        agents: &[Agent],
        rounds: u8,
    ) -> ConsentDecision;
}

/// Port for confirming a provider fallback after a primary failure.
#[async_trait]
pub trait FallbackPort: Send + Sync {
    async fn confirm_fallback(
        &self,
        agent: &Agent,
        primary: &str,
        backup: Option<&str>,
        error: &str,
    ) -> FallbackDecision;
}

/// Consent port that always approves. Used in non-interactive contexts and
/// tests; the cost gate logs the auto-approval notice.
pub struct AutoApprove;

#[async_trait]
impl ConsentPort for AutoApprove {
    async fn request_consent(
        &self,
        _estimate: &CostEstimate,
        _agents: &[Agent],
        _rounds: u8,
    ) -> ConsentDecision {
        ConsentDecision::Approved
    }
}

/// Fallback port that always retries on the backup.
pub struct AutoFallback;

#[async_trait]
impl FallbackPort for AutoFallback {
    async fn confirm_fallback(
        &self,
        _agent: &Agent,
        _primary: &str,
        _backup: Option<&str>,
        _error: &str,
    ) -> FallbackDecision {
        FallbackDecision::Yes
    }
}
