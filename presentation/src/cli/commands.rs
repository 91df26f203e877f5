//! CLI command definitions

use clap::{Parser, ValueEnum};

/// Output format for consultation results
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Full formatted output with all rounds
    Full,
    /// Only the final recommendation
    Verdict,
    /// JSON output
    Json,
}

/// CLI arguments for conclave
#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(author, version, about = "Expert panel - Multiple LLMs debate and deliver a verdict")]
#[command(long_about = r#"
Conclave convenes a panel of expert LLMs to debate a question across four
structured rounds:

1. Independent: every expert takes a position in parallel
2. Synthesis: a judge maps the consensus and the tensions
3. Cross-Exam: experts challenge each other's reasoning
4. Verdict: the judge issues the final recommendation with dissent on record

Example:
  conclave "Should we adopt OAuth 2.0 for the partner API?"
  conclave --mode explore "How should we store telemetry data?"
  conclave --quick "Is this migration plan sound?" --context-file notes.md
"#)]
pub struct Cli {
    /// The question to put before the panel
    pub question: String,

    /// Inline context accompanying the question
    #[arg(short, long, value_name = "TEXT")]
    pub context: Option<String>,

    /// File whose contents become the context
    #[arg(long, value_name = "PATH")]
    pub context_file: Option<std::path::PathBuf>,

    /// Debate mode
    #[arg(long, value_name = "MODE", default_value = "converge")]
    pub mode: String,

    /// Number of debate rounds (1-4)
    #[arg(long, value_name = "N")]
    pub max_rounds: Option<u8>,

    /// Early-termination confidence floor (0.0-1.0)
    #[arg(long, value_name = "FLOAT")]
    pub confidence_threshold: Option<f64>,

    /// Single-round consultation (equivalent to --max-rounds 1)
    #[arg(long)]
    pub quick: bool,

    /// Consult without loading project context
    #[arg(long)]
    pub greenfield: bool,

    /// Keep going when in-flight spend exceeds 1.5x the estimate
    #[arg(long)]
    pub allow_cost_overruns: bool,

    /// Run the whole pipeline against offline canned providers
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "full")]
    pub output: OutputFormat,

    /// Directory for checkpoints, partials and result files
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<std::path::PathBuf>,

    /// Explicit config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<std::path::PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Rounds after applying `--quick`.
    pub fn effective_max_rounds(&self, config_default: u8) -> u8 {
        if self.quick {
            1
        } else {
            self.max_rounds.unwrap_or(config_default)
        }
    }
}
