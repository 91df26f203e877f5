//! Durable storage port for checkpoints, partial records and final results.

use conclave_domain::{ConsultError, ConsultationResult};
use serde_json::Value;

/// Port for the consultation's durable artifacts.
///
/// Implementations guarantee:
/// - `save_checkpoint` is idempotent per `(consultation_id, round)`;
/// - `append_partial` is a single append call (one JSONL line);
/// - `write_final` replaces atomically (temp file + rename).
pub trait RunStore: Send + Sync {
    fn save_checkpoint(
        &self,
        consultation_id: &str,
        round: u8,
        doc: &Value,
    ) -> Result<(), ConsultError>;

    fn append_partial(&self, consultation_id: &str, line: &str) -> Result<(), ConsultError>;

    fn write_final(&self, result: &ConsultationResult) -> Result<(), ConsultError>;
}

/// Discarding store for tests and dry runs.
pub struct NullRunStore;

impl RunStore for NullRunStore {
    fn save_checkpoint(&self, _id: &str, _round: u8, _doc: &Value) -> Result<(), ConsultError> {
        Ok(())
    }

    fn append_partial(&self, _id: &str, _line: &str) -> Result<(), ConsultError> {
        Ok(())
    }

    fn write_final(&self, _result: &ConsultationResult) -> Result<(), ConsultError> {
        Ok(())
    }
}
