//! Domain error types

use thiserror::Error;

/// Errors distinguished by the consultation core.
///
/// Propagation policy differs per kind: transport and extraction failures on
/// an agent call are recovered locally into the agent's response envelope,
/// while the same failures on a Synthesis or Verdict judge call are fatal.
#[derive(Error, Debug)]
pub enum ConsultError {
    #[error("Provider call failed: {0}")]
    Transport(String),

    #[error("No valid artifact in model output for round {round}: {detail}")]
    Extraction { round: u8, detail: String },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Consultation denied by cost gate")]
    AdmissionDenied,

    #[error("In-flight cost {actual_usd:.4} USD exceeded {limit_usd:.4} USD")]
    CostExceeded { actual_usd: f64, limit_usd: f64 },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Consultation cancelled")]
    Cancelled,
}

impl ConsultError {
    /// Check if this error represents a user cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConsultError::Cancelled | ConsultError::AdmissionDenied)
    }

    /// Fatal errors force a partial-result write before re-raising.
    /// Denied admission exits cleanly with no side effects.
    pub fn wants_partial_write(&self) -> bool {
        !matches!(
            self,
            ConsultError::AdmissionDenied | ConsultError::Validation(_)
        )
    }
}
