//! Atomic JSON config store for the cost gate threshold.
//!
//! The config file is a single JSON object at an OS-standard path. Saving
//! merges the threshold into whatever already exists (corrupted content is
//! treated as empty), writes to `<path>.tmp.<timestamp>` and renames over
//! the destination; the temp file is unlinked on any failure. No in-process
//! lock is held - atomic rename is the whole discipline.

use conclave_application::{ConfigStore, DEFAULT_ALWAYS_ALLOW_UNDER};
use conclave_domain::ConsultError;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// JSON config store at a fixed path.
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The OS-standard location: `<config_dir>/conclave/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("conclave").join("config.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config object; missing or corrupted files become empty.
    fn read_object(&self) -> Map<String, Value> {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!(path = ?self.path, "Corrupted config file, treating as empty");
                Map::new()
            }
        }
    }
}

impl ConfigStore for JsonConfigStore {
    fn always_allow_under(&self) -> f64 {
        self.read_object()
            .get("consult")
            .and_then(|c| c.get("alwaysAllowUnder"))
            .and_then(|v| v.as_f64())
            .unwrap_or(DEFAULT_ALWAYS_ALLOW_UNDER)
    }

    fn save_always_allow_under(&self, threshold: f64) -> Result<(), ConsultError> {
        let mut root = self.read_object();
        let consult = root
            .entry("consult".to_string())
            .or_insert_with(|| json!({}));
        match consult {
            Value::Object(section) => {
                section.insert("alwaysAllowUnder".to_string(), json!(threshold));
            }
            other => {
                // A scalar where a section belongs gets replaced
                *other = json!({"alwaysAllowUnder": threshold});
            }
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConsultError::Persistence(format!("create {:?}: {}", parent, e)))?;
        }

        let timestamp = chrono::Utc::now().timestamp_millis();
        let tmp = self.path.with_extension(format!("tmp.{}", timestamp));
        let content = serde_json::to_vec_pretty(&Value::Object(root))
            .map_err(|e| ConsultError::Persistence(e.to_string()))?;

        let outcome = (|| {
            fs::write(&tmp, &content)?;
            fs::rename(&tmp, &self.path)
        })();

        if let Err(e) = outcome {
            let _ = fs::remove_file(&tmp);
            return Err(ConsultError::Persistence(format!(
                "save config {:?}: {}",
                self.path, e
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path().join("config.json"));
        assert_eq!(store.always_allow_under(), DEFAULT_ALWAYS_ALLOW_UNDER);
    }

    #[test]
    fn test_save_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = JsonConfigStore::new(&path);

        store.save_always_allow_under(1.25).unwrap();
        assert_eq!(store.always_allow_under(), 1.25);

        // A fresh store instance reads the same value
        let reread = JsonConfigStore::new(&path);
        assert_eq!(reread.always_allow_under(), 1.25);
    }

    #[test]
    fn test_save_preserves_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"theme": "dark", "consult": {"alwaysAllowUnder": 0.5, "mode": "explore"}}"#,
        )
        .unwrap();

        let store = JsonConfigStore::new(&path);
        store.save_always_allow_under(2.0).unwrap();

        let v: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["theme"], "dark");
        assert_eq!(v["consult"]["mode"], "explore");
        assert_eq!(v["consult"]["alwaysAllowUnder"], 2.0);
    }

    #[test]
    fn test_corrupted_config_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json at all").unwrap();

        let store = JsonConfigStore::new(&path);
        assert_eq!(store.always_allow_under(), DEFAULT_ALWAYS_ALLOW_UNDER);

        store.save_always_allow_under(0.75).unwrap();
        assert_eq!(store.always_allow_under(), 0.75);
    }

    #[test]
    fn test_no_temp_files_left() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = JsonConfigStore::new(&path);
        store.save_always_allow_under(0.9).unwrap();

        let stray: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(stray.is_empty());
    }
}
