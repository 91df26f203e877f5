//! CLI entrypoint for conclave
//!
//! Wires all layers together with dependency injection and maps the
//! consultation outcome to exit codes: 0 on success and on user
//! cancellation, 1 on any other abort.

use anyhow::{bail, Context, Result};
use clap::Parser;
use conclave_application::{
    ConfigStore, ConsultOptions, ConsultOrchestrator, CostGate, HedgedRequestManager,
    PartialResultManager, RunConsultError, RunStore, Signer,
};
use conclave_domain::{Agent, ConsultStatus, DebateMode, Question};
use conclave_infrastructure::{
    canned_registry, scrub, ConfigLoader, FsRunStore, HmacSigner, JsonConfigStore,
};
use conclave_presentation::{
    Cli, ConsoleFormatter, InteractiveConsent, InteractiveFallback, OutputFormat,
    ProgressReporter,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting conclave");

    let config = ConfigLoader::load(cli.config.as_ref())
        .map_err(|e| anyhow::anyhow!("config error: {}", e))?;

    let mode: DebateMode = cli
        .mode
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let max_rounds = cli.effective_max_rounds(config.consult.max_rounds);
    let confidence_threshold = cli
        .confidence_threshold
        .unwrap_or(config.consult.confidence_threshold);

    // Context: inline flag, or a file; scrubbed before the core sees it.
    let raw_context = match (&cli.context, &cli.context_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading context file {:?}", path))?,
        (None, None) => String::new(),
    };
    let (context, scrub_report) = scrub(&raw_context);
    if !scrub_report.is_empty() && !cli.quiet {
        println!(
            "Scrubbed {} sensitive item(s) from context: {:?}",
            scrub_report.total(),
            scrub_report.findings
        );
    }

    let Some(question) = Question::try_new(cli.question.clone()) else {
        bail!("Question is required and cannot be empty.");
    };
    let question = if context.is_empty() {
        question
    } else {
        question.with_context(context)
    };

    // === Dependency Injection ===
    let panel = Agent::default_panel();
    let mut judge = Agent::default_judge();
    judge.model = config.consult.judge_model.clone();

    let log_dir = cli.log_dir.clone().unwrap_or_else(|| config.log_dir());
    let run_store: Arc<dyn RunStore> =
        Arc::new(FsRunStore::new(log_dir.clone()).context("creating log directory")?);
    let signer: Arc<dyn Signer> = Arc::new(HmacSigner::from_env());

    let config_store: Arc<dyn ConfigStore> = {
        let path = cli
            .config
            .clone()
            .or_else(JsonConfigStore::default_path)
            .unwrap_or_else(|| std::path::PathBuf::from("conclave.config.json"));
        Arc::new(JsonConfigStore::new(path))
    };

    let (registry, health) = if cli.dry_run {
        canned_registry(&panel, &judge)
    } else {
        // Transport clients are external collaborators implementing
        // ProviderChat; this binary only ships the offline adapter.
        bail!(
            "No provider transports are wired into this binary. \
             Run with --dry-run, or embed the conclave crates and register \
             your own ProviderChat implementations."
        );
    };

    let hedge = Arc::new(HedgedRequestManager::new(
        registry,
        health,
        Arc::new(InteractiveFallback::new()),
        Duration::from_secs(config.consult.hedge_deadline_secs),
    ));
    let gate = CostGate::new(
        Arc::new(InteractiveConsent::new()),
        Arc::clone(&config_store),
    );
    let partials = PartialResultManager::new(Arc::clone(&run_store), Arc::clone(&signer));

    let orchestrator = ConsultOrchestrator::new(
        panel,
        judge,
        mode.strategy(),
        hedge,
        gate,
        partials,
        Arc::clone(&run_store),
    );

    if !cli.quiet {
        ProgressReporter::new().attach();
    }

    // Ctrl-C sets the cooperative cancel flag; the orchestrator notices at
    // the next round boundary and writes a partial.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling consultation");
                cancel.cancel();
            }
        });
    }

    let options = ConsultOptions {
        max_rounds,
        verbose: cli.verbose > 0,
        mode,
        confidence_threshold,
        allow_cost_overruns: cli.allow_cost_overruns,
        greenfield: cli.greenfield,
        scrubbing_report: (!scrub_report.is_empty())
            .then(|| serde_json::to_value(&scrub_report).unwrap_or_default()),
        cancel,
        ..Default::default()
    };

    match orchestrator.consult(question, options).await {
        Ok(result) => {
            let output = match cli.output {
                OutputFormat::Full => ConsoleFormatter::format(&result),
                OutputFormat::Verdict => ConsoleFormatter::format_verdict_only(&result),
                OutputFormat::Json => ConsoleFormatter::format_json(&result),
            };
            println!("{}", output);

            if result.status == ConsultStatus::Complete {
                let md_path = log_dir.join(format!("consult-{}.md", result.consultation_id));
                if let Err(e) =
                    std::fs::write(&md_path, ConsoleFormatter::render_markdown(&result))
                {
                    warn!("Could not write markdown result {:?}: {}", md_path, e);
                }
            }
            // User cancellation exits 0, like success.
            Ok(())
        }
        Err(err) => {
            eprintln!("Consultation failed: {}", err);
            let code = match &err {
                RunConsultError::Domain(e) if e.is_cancelled() => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    }
}
