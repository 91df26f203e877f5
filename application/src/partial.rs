//! Partial-result persistence.
//!
//! When a consultation aborts before `Complete`, the in-progress result is
//! serialized to a snake_case JSON line, tagged with the abort reason and a
//! fresh resume token, signed with HMAC-SHA256, and appended to
//! `<logdir>/consult-<id>-partial.jsonl`. After each successful round an
//! idempotent checkpoint snapshot is written.
//!
//! Persistence failures here are logged and swallowed: the consultation has
//! already failed for another reason, and losing the partial record is a
//! best-effort concession.

use crate::ports::run_store::RunStore;
use crate::ports::signer::Signer;
use conclave_domain::ConsultationResult;
use rand::RngCore;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// Generate a 128-bit hex resume token.
pub fn generate_resume_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Writes signed partial records and per-round checkpoints.
pub struct PartialResultManager {
    store: Arc<dyn RunStore>,
    signer: Arc<dyn Signer>,
}

impl PartialResultManager {
    pub fn new(store: Arc<dyn RunStore>, signer: Arc<dyn Signer>) -> Self {
        Self { store, signer }
    }

    /// Build the signed partial document for an aborted result.
    ///
    /// The signature covers the document minus its own `signature` field;
    /// serde_json's sorted-key object serialization makes the byte stream
    /// deterministic, so re-verification is stable.
    pub fn build_partial_document(&self, result: &mut ConsultationResult) -> Value {
        if result.resume_token.is_none() {
            result.resume_token = Some(generate_resume_token());
        }

        let mut doc = serde_json::to_value(&*result).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut doc {
            map.insert("status".into(), json!("partial"));
            map.insert(
                "completed_round_names".into(),
                json!(result.completed_round_names()),
            );
            map.insert(
                "incomplete_round_names".into(),
                json!(result.incomplete_round_names()),
            );
            map.insert("partial_agents".into(), json!(result.successful_agents()));
            map.remove("signature");
        }

        let bytes = serde_json::to_vec(&doc).unwrap_or_default();
        let signature = self.signer.sign(&bytes);
        if let Value::Object(map) = &mut doc {
            map.insert("signature".into(), json!(signature.clone()));
        }
        result.signature = Some(signature);
        doc
    }

    /// Append the signed partial line. Errors are logged and swallowed.
    pub fn write_partial(&self, result: &mut ConsultationResult) {
        let doc = self.build_partial_document(result);
        let Ok(line) = serde_json::to_string(&doc) else {
            warn!("Could not serialize partial result");
            return;
        };
        if let Err(e) = self.store.append_partial(&result.consultation_id, &line) {
            warn!(
                consultation_id = %result.consultation_id,
                "Could not write partial result: {}", e
            );
        }
    }

    /// Write the post-round checkpoint. Idempotent at the store level;
    /// errors are logged and swallowed (checkpoints are non-critical).
    pub fn save_checkpoint(&self, result: &ConsultationResult, round: u8) {
        let doc = json!({
            "checkpoint_id": format!("{}-round{}", result.consultation_id, round),
            "consultation_id": result.consultation_id,
            "round": round,
            "state": result.state,
            "result": serde_json::to_value(result).unwrap_or_else(|_| json!({})),
            "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "resume_token": generate_resume_token(),
        });
        if let Err(e) = self
            .store
            .save_checkpoint(&result.consultation_id, round, &doc)
        {
            warn!(
                consultation_id = %result.consultation_id,
                round, "Could not write checkpoint: {}", e
            );
        }
    }
}

/// Verify a partial JSONL line against its embedded signature.
pub fn verify_partial_line(line: &str, signer: &dyn Signer) -> bool {
    let Ok(mut doc) = serde_json::from_str::<Value>(line) else {
        return false;
    };
    let Some(signature) = doc
        .as_object_mut()
        .and_then(|map| map.remove("signature"))
        .and_then(|v| v.as_str().map(str::to_string))
    else {
        return false;
    };
    let bytes = serde_json::to_vec(&doc).unwrap_or_default();
    signer.verify(&bytes, &signature)
}
