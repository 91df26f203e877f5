//! Presentation layer for conclave
//!
//! The clap CLI surface, interactive consent and fallback prompts, result
//! formatters, and the event-bus progress reporter.

pub mod cli;
pub mod output;
pub mod progress;
pub mod prompts;

pub use cli::commands::{Cli, OutputFormat};
pub use output::formatter::ConsoleFormatter;
pub use progress::reporter::ProgressReporter;
pub use prompts::{InteractiveConsent, InteractiveFallback};
