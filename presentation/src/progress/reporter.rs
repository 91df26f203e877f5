//! Live progress reporting driven by the event bus.
//!
//! Subscribes to the consultation lifecycle topics and renders one spinner
//! per thinking agent. Handlers run synchronously on the orchestrator's
//! thread, so they only touch indicatif state and return.

use colored::Colorize;
use conclave_application::{topics, ConsultEvent, EventBus};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Reports progress during a consultation with per-agent spinners.
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg}")
            .expect("static template")
    }

    fn round_name(round: u64) -> &'static str {
        match round {
            1 => "Round 1: Independent",
            2 => "Round 2: Synthesis",
            3 => "Round 3: Cross-Exam",
            4 => "Round 4: Verdict",
            _ => "Round",
        }
    }

    fn on_thinking(&self, event: &ConsultEvent) {
        let agent = event.payload["agent"].as_str().unwrap_or("agent").to_string();
        let round = event.payload["round"].as_u64().unwrap_or(0);

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::spinner_style());
        bar.set_prefix(agent.clone());
        bar.set_message(format!("thinking ({})", Self::round_name(round)));
        bar.enable_steady_tick(Duration::from_millis(100));
        self.bars.lock().expect("bars lock").insert(agent, bar);
    }

    fn on_completed(&self, event: &ConsultEvent) {
        let agent = event.payload["agent"].as_str().unwrap_or("agent");
        let success = event.payload["success"].as_bool().unwrap_or(false);
        let tokens = event.payload["tokens"].as_u64().unwrap_or(0);
        let duration_ms = event.payload["duration_ms"].as_u64().unwrap_or(0);

        if let Some(bar) = self.bars.lock().expect("bars lock").remove(agent) {
            let mark = if success {
                "ok".green().to_string()
            } else {
                "failed".red().to_string()
            };
            bar.finish_with_message(format!("{} ({} tok, {} ms)", mark, tokens, duration_ms));
        }
    }

    fn on_substituted(&self, event: &ConsultEvent) {
        let agent = event.payload["agent"].as_str().unwrap_or("agent");
        let substitute = event.payload["substitute"].as_str().unwrap_or("?");
        self.multi.suspend(|| {
            println!(
                "{} {} rerouted to {}",
                "~".yellow().bold(),
                agent,
                substitute.cyan()
            );
        });
    }

    fn on_round_completed(&self, event: &ConsultEvent) {
        let round = event.payload["round"].as_u64().unwrap_or(0);
        let cost = event.payload["cost_usd"].as_f64().unwrap_or(0.0);
        self.multi.suspend(|| {
            println!(
                "{} {} complete (${:.4} so far)",
                "✓".green().bold(),
                Self::round_name(round),
                cost
            );
        });
    }

    /// Register this reporter on the global event bus. The subscriptions
    /// live for the process lifetime, matching the bus itself.
    pub fn attach(self: &Arc<Self>) {
        let bus = EventBus::global();

        let me = Arc::clone(self);
        bus.subscribe(topics::AGENT_THINKING, Arc::new(move |e| me.on_thinking(e)));

        let me = Arc::clone(self);
        bus.subscribe(topics::AGENT_COMPLETED, Arc::new(move |e| me.on_completed(e)));

        let me = Arc::clone(self);
        bus.subscribe(
            topics::PROVIDER_SUBSTITUTED,
            Arc::new(move |e| me.on_substituted(e)),
        );

        let me = Arc::clone(self);
        bus.subscribe(
            topics::ROUND_COMPLETED,
            Arc::new(move |e| me.on_round_completed(e)),
        );
    }
}
