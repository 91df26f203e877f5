//! Filesystem run store: checkpoints, partial JSONL, final results.
//!
//! Single-object files (checkpoints, final results) are written atomically
//! via temp-file + rename, with temp cleanup on failure. The partial JSONL
//! stream uses one `write` call per line, relying on the OS single-write
//! guarantee up to `PIPE_BUF` for line integrity.

use conclave_application::RunStore;
use conclave_domain::{ConsultError, ConsultationResult};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Run store rooted at a log directory.
pub struct FsRunStore {
    log_dir: PathBuf,
}

impl FsRunStore {
    /// Create the store, ensuring the log directory exists.
    pub fn new(log_dir: impl Into<PathBuf>) -> Result<Self, ConsultError> {
        let log_dir = log_dir.into();
        fs::create_dir_all(&log_dir)
            .map_err(|e| ConsultError::Persistence(format!("create {:?}: {}", log_dir, e)))?;
        Ok(Self { log_dir })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    fn checkpoint_path(&self, consultation_id: &str, round: u8) -> PathBuf {
        self.log_dir
            .join(format!("{}-round{}.checkpoint.json", consultation_id, round))
    }

    fn partial_path(&self, consultation_id: &str) -> PathBuf {
        self.log_dir
            .join(format!("consult-{}-partial.jsonl", consultation_id))
    }

    fn final_path(&self, consultation_id: &str) -> PathBuf {
        self.log_dir.join(format!("consult-{}.json", consultation_id))
    }
}

/// Write `content` to `path` through a sibling temp file and rename.
/// The temp file is unlinked on any failure.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), ConsultError> {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let tmp = path.with_extension(format!("tmp.{}", timestamp));

    let write_then_rename = (|| {
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = write_then_rename {
        let _ = fs::remove_file(&tmp);
        return Err(ConsultError::Persistence(format!(
            "atomic write {:?}: {}",
            path, e
        )));
    }
    Ok(())
}

impl RunStore for FsRunStore {
    /// Idempotent: a checkpoint that already exists is left untouched.
    fn save_checkpoint(
        &self,
        consultation_id: &str,
        round: u8,
        doc: &Value,
    ) -> Result<(), ConsultError> {
        let path = self.checkpoint_path(consultation_id, round);
        if path.exists() {
            debug!(?path, "Checkpoint already present, skipping");
            return Ok(());
        }
        let content = serde_json::to_vec_pretty(doc)
            .map_err(|e| ConsultError::Persistence(e.to_string()))?;
        atomic_write(&path, &content)
    }

    fn append_partial(&self, consultation_id: &str, line: &str) -> Result<(), ConsultError> {
        let path = self.partial_path(consultation_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ConsultError::Persistence(format!("open {:?}: {}", path, e)))?;
        // One write call for the whole line
        let record = format!("{}\n", line);
        file.write_all(record.as_bytes())
            .map_err(|e| ConsultError::Persistence(format!("append {:?}: {}", path, e)))
    }

    fn write_final(&self, result: &ConsultationResult) -> Result<(), ConsultError> {
        let path = self.final_path(&result.consultation_id);
        let content = serde_json::to_vec_pretty(result)
            .map_err(|e| ConsultError::Persistence(e.to_string()))?;
        atomic_write(&path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::{AbortReason, Agent, PromptVersions};
    use serde_json::json;

    fn result(id: &str) -> ConsultationResult {
        ConsultationResult::new(
            id,
            "Which auth scheme?",
            "",
            "converge",
            Agent::default_panel(),
            4,
            0.2,
            PromptVersions::default(),
        )
    }

    #[test]
    fn test_checkpoint_write_and_idempotence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRunStore::new(dir.path()).unwrap();

        let doc = json!({"checkpoint_id": "c-1-round1", "round": 1});
        store.save_checkpoint("c-1", 1, &doc).unwrap();

        let path = dir.path().join("c-1-round1.checkpoint.json");
        let first = fs::read_to_string(&path).unwrap();

        // Second save with different content is a no-op
        let other = json!({"checkpoint_id": "c-1-round1", "round": 1, "changed": true});
        store.save_checkpoint("c-1", 1, &other).unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_partial_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRunStore::new(dir.path()).unwrap();

        store.append_partial("c-2", r#"{"status":"partial","n":1}"#).unwrap();
        store.append_partial("c-2", r#"{"status":"partial","n":2}"#).unwrap();

        let content =
            fs::read_to_string(dir.path().join("consult-c-2-partial.jsonl")).unwrap();
        let lines: Vec<&str> = content.trim().lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let v: Value = serde_json::from_str(line).unwrap();
            assert_eq!(v["status"], "partial");
        }
    }

    #[test]
    fn test_final_written_atomically_and_reparseable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRunStore::new(dir.path()).unwrap();

        let mut r = result("c-3");
        r.seal_aborted(AbortReason::Timeout, 12);
        store.write_final(&r).unwrap();

        let path = dir.path().join("consult-c-3.json");
        let v: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["consultation_id"], "c-3");
        assert_eq!(v["schema_version"], "1.0");

        // No temp files left behind
        let stray: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(stray.is_empty());
    }
}
