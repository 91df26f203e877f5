//! Persistent configuration port for the cost gate.

use conclave_domain::ConsultError;

/// Default auto-approve threshold in USD.
pub const DEFAULT_ALWAYS_ALLOW_UNDER: f64 = 0.50;

/// Port over the global config file.
///
/// Implementations must persist atomically (temp file + rename) and treat
/// a corrupted existing file as empty, preserving unrelated keys on save.
pub trait ConfigStore: Send + Sync {
    /// Current auto-approve threshold; the default when unset.
    fn always_allow_under(&self) -> f64;

    /// Persist a new threshold.
    fn save_always_allow_under(&self, threshold: f64) -> Result<(), ConsultError>;
}

/// In-memory store used in tests and `--no-config` runs.
pub struct MemoryConfigStore {
    threshold: std::sync::RwLock<f64>,
}

impl MemoryConfigStore {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: std::sync::RwLock::new(threshold),
        }
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new(DEFAULT_ALWAYS_ALLOW_UNDER)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn always_allow_under(&self) -> f64 {
        *self.threshold.read().expect("config lock poisoned")
    }

    fn save_always_allow_under(&self, threshold: f64) -> Result<(), ConsultError> {
        *self.threshold.write().expect("config lock poisoned") = threshold;
        Ok(())
    }
}
