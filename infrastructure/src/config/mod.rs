//! Configuration loading with multi-source merging.

pub mod store;

pub use store::JsonConfigStore;

use figment::{
    providers::{Env, Format, Json, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[consult]` section of the config file
///
/// The cost gate's `alwaysAllowUnder` threshold is not mirrored here: the
/// gate reads and atomically rewrites it through [`JsonConfigStore`], which
/// owns that key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsultSection {
    /// Default debate mode
    pub mode: String,
    pub max_rounds: u8,
    pub confidence_threshold: f64,
    /// Seconds before a slow primary provider is hedged
    pub hedge_deadline_secs: u64,
    /// Judge model id
    pub judge_model: String,
}

impl Default for ConsultSection {
    fn default() -> Self {
        Self {
            mode: "converge".to_string(),
            max_rounds: 4,
            confidence_threshold: 0.90,
            hedge_deadline_secs: 10,
            judge_model: "gpt-4o".to_string(),
        }
    }
}

/// `[output]` section of the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Directory for checkpoints, partials and result files
    pub log_dir: Option<PathBuf>,
}

/// The whole config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub consult: ConsultSection,
    pub output: OutputSection,
}

impl FileConfig {
    /// Resolve the log directory, defaulting under the OS data dir.
    pub fn log_dir(&self) -> PathBuf {
        self.output.log_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("conclave")
                .join("logs")
        })
    }
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Environment (`CONCLAVE_*`, e.g. `CONCLAVE_CONSULT__MODE=explore`)
    /// 2. Explicit config path (if provided)
    /// 3. Global: `<config_dir>/conclave/config.json`
    /// 4. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = JsonConfigStore::default_path()
            && global_path.exists()
        {
            figment = figment.merge(Json::file(&global_path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Json::file(path));
        }

        figment = figment.merge(Env::prefixed("CONCLAVE_").split("__"));

        figment.extract().map_err(Box::new)
    }

    /// Load only default configuration (for `--no-config`)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }
}
