//! Interactive terminal prompts for the cost gate and hedge fallback.
//!
//! Both prompts read one line from stdin. They run inside async contexts,
//! so the blocking read happens on a blocking worker thread. Hosts running
//! non-interactively never reach these prompts - the cost gate and hedge
//! manager auto-approve first.

use async_trait::async_trait;
use colored::Colorize;
use conclave_application::{ConsentDecision, ConsentPort, FallbackDecision, FallbackPort};
use conclave_domain::{Agent, CostEstimate};
use std::io::{self, Write};

fn read_line_blocking(prompt: String) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().read_line(&mut line);
    line.trim().to_string()
}

async fn read_line(prompt: String) -> String {
    tokio::task::spawn_blocking(move || read_line_blocking(prompt))
        .await
        .unwrap_or_default()
}

/// Terminal consent prompt for estimated spend.
pub struct InteractiveConsent;

impl InteractiveConsent {
    pub fn new() -> Self {
        Self
    }

    fn display_estimate(estimate: &CostEstimate, agents: &[Agent], rounds: u8) {
        println!();
        println!(
            "{}",
            "═══════════════════════════════════════════════════════════════"
                .yellow()
                .bold()
        );
        println!("{}", "  Estimated consultation cost".yellow().bold());
        println!(
            "{}",
            "═══════════════════════════════════════════════════════════════"
                .yellow()
                .bold()
        );
        println!();
        println!(
            "  {} agents x {} rounds  ~{} input + {} output tokens",
            agents.len(),
            rounds,
            estimate.input_tokens_total,
            estimate.output_tokens_total
        );
        for per_agent in &estimate.per_agent {
            println!(
                "    {} ({})  ${:.4}",
                per_agent.agent.cyan(),
                per_agent.model.dimmed(),
                per_agent.usd
            );
        }
        println!();
        println!("  Total: {}", format!("${:.4}", estimate.usd).bold());
        println!();
    }
}

impl Default for InteractiveConsent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsentPort for InteractiveConsent {
    async fn request_consent(
        &self,
        estimate: &CostEstimate,
        agents: &[Agent],
        rounds: u8,
    ) -> ConsentDecision {
        Self::display_estimate(estimate, agents, rounds);
        loop {
            let answer = read_line(format!(
                "Proceed? [{}]es / [{}]o / [{}]lways allow under a new threshold: ",
                "y".green().bold(),
                "n".red().bold(),
                "a".cyan().bold()
            ))
            .await;

            match answer.to_lowercase().as_str() {
                "y" | "yes" => return ConsentDecision::Approved,
                "n" | "no" | "" => return ConsentDecision::Denied,
                "a" | "always" => {
                    let raw =
                        read_line("New auto-approve threshold in USD (e.g. 1.50): ".into()).await;
                    match raw.parse::<f64>() {
                        Ok(threshold) if threshold > 0.0 => {
                            return ConsentDecision::Always(threshold);
                        }
                        _ => println!("{}", "Please enter a positive number.".red()),
                    }
                }
                _ => println!("{}", "Please answer y, n or a.".red()),
            }
        }
    }
}

/// Terminal prompt confirming a provider fallback after a primary failure.
pub struct InteractiveFallback;

impl InteractiveFallback {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InteractiveFallback {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FallbackPort for InteractiveFallback {
    async fn confirm_fallback(
        &self,
        agent: &Agent,
        primary: &str,
        backup: Option<&str>,
        error: &str,
    ) -> FallbackDecision {
        println!();
        println!(
            "{} {} via {} failed: {}",
            "!".red().bold(),
            agent.name.bold(),
            primary,
            error.dimmed()
        );
        let Some(backup) = backup else {
            println!("  No healthy backup provider available.");
            return FallbackDecision::No;
        };

        loop {
            let answer = read_line(format!(
                "Retry on {}? [{}]es / [{}]o (skip this agent) / [{}]ail the consultation: ",
                backup.cyan(),
                "y".green().bold(),
                "n".yellow().bold(),
                "f".red().bold()
            ))
            .await;

            match answer.to_lowercase().as_str() {
                "y" | "yes" | "" => return FallbackDecision::Yes,
                "n" | "no" => return FallbackDecision::No,
                "f" | "fail" => return FallbackDecision::Fail,
                _ => println!("{}", "Please answer y, n or f.".red()),
            }
        }
    }
}
