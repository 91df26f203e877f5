//! Result formatters: console, JSON, and the markdown result file.

use colored::Colorize;
use conclave_domain::{ConsultStatus, ConsultationResult, Severity};

/// Formats sealed consultation results for display and logging.
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Full console output with every round summarised.
    pub fn format(result: &ConsultationResult) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "\n{}\n",
            "═══ Consultation Result ═══".bold().cyan()
        ));
        out.push_str(&format!("Question: {}\n", result.question));
        out.push_str(&format!(
            "Mode: {}   Rounds: {}/{}   Status: {:?}\n",
            result.mode, result.rounds_completed, result.rounds_requested, result.status
        ));
        out.push('\n');

        if !result.perspectives.is_empty() {
            out.push_str(&format!("{}\n", "Perspectives".bold()));
            for p in &result.perspectives {
                out.push_str(&format!(
                    "  {} ({:.0}%): {}\n",
                    p.agent.cyan(),
                    p.confidence * 100.0,
                    p.position
                ));
            }
            out.push('\n');
        }

        if !result.concerns.is_empty() {
            out.push_str(&format!("{}\n", "Unresolved concerns".bold()));
            for concern in &result.concerns {
                out.push_str(&format!("  - {}\n", concern));
            }
            out.push('\n');
        }

        if !result.dissent.is_empty() {
            out.push_str(&format!("{}\n", "Dissent".bold()));
            for d in &result.dissent {
                let severity = match d.severity {
                    Severity::High => d.severity.as_str().red().to_string(),
                    Severity::Medium => d.severity.as_str().yellow().to_string(),
                    Severity::Low => d.severity.as_str().dimmed().to_string(),
                };
                out.push_str(&format!("  {} [{}]: {}\n", d.agent.cyan(), severity, d.concern));
            }
            out.push('\n');
        }

        out.push_str(&Self::format_verdict_only(result));
        out.push_str(&format!(
            "\n{}  tokens: {}  estimated: ${:.4}  actual: ${:.4}{}\n",
            "Cost".bold(),
            result.cost.tokens.total,
            result.estimated_cost,
            result.actual_cost,
            if result.cost_exceeded {
                "  (over budget)".red().to_string()
            } else {
                String::new()
            }
        ));
        if let Some(savings) = result.early_termination_savings_usd {
            out.push_str(&format!(
                "Early termination saved ~${:.4}\n",
                savings
            ));
        }
        out
    }

    /// Only the recommendation and its confidence.
    pub fn format_verdict_only(result: &ConsultationResult) -> String {
        match result.status {
            ConsultStatus::Complete => format!(
                "{} ({:.0}% confidence)\n{}\n",
                "Recommendation".bold().green(),
                result.confidence * 100.0,
                result.recommendation
            ),
            _ => format!(
                "{}: {}\n",
                "Consultation did not complete".bold().red(),
                result.abort_reason.as_deref().unwrap_or("unknown")
            ),
        }
    }

    /// Machine-readable snake_case JSON.
    pub fn format_json(result: &ConsultationResult) -> String {
        serde_json::to_string_pretty(result)
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }

    /// Markdown document written next to the JSON result file.
    pub fn render_markdown(result: &ConsultationResult) -> String {
        let mut md = String::new();
        md.push_str(&format!("# Consultation {}\n\n", result.consultation_id));
        md.push_str(&format!("**Question:** {}\n\n", result.question));
        md.push_str(&format!(
            "**Mode:** {} · **Rounds:** {}/{} · **Confidence:** {:.2}\n\n",
            result.mode, result.rounds_completed, result.rounds_requested, result.confidence
        ));

        md.push_str("## Recommendation\n\n");
        md.push_str(&format!("{}\n\n", result.recommendation));

        if !result.perspectives.is_empty() {
            md.push_str("## Perspectives\n\n");
            for p in &result.perspectives {
                md.push_str(&format!(
                    "- **{}** ({:.2}): {}\n",
                    p.agent, p.confidence, p.position
                ));
            }
            md.push('\n');
        }

        if !result.concerns.is_empty() {
            md.push_str("## Unresolved concerns\n\n");
            for concern in &result.concerns {
                md.push_str(&format!("- {}\n", concern));
            }
            md.push('\n');
        }

        if !result.dissent.is_empty() {
            md.push_str("## Dissent\n\n");
            for d in &result.dissent {
                md.push_str(&format!(
                    "- **{}** ({}): {}\n",
                    d.agent,
                    d.severity.as_str(),
                    d.concern
                ));
            }
            md.push('\n');
        }

        md.push_str("## Cost\n\n");
        md.push_str(&format!(
            "| | tokens | USD |\n|---|---|---|\n| estimated | - | {:.4} |\n| actual | {} | {:.4} |\n",
            result.estimated_cost, result.cost.tokens.total, result.actual_cost
        ));
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::{Agent, Perspective, PromptVersions};

    fn completed_result() -> ConsultationResult {
        let mut result = ConsultationResult::new(
            "c-9",
            "Which auth scheme?",
            "",
            "converge",
            Agent::default_panel(),
            4,
            0.25,
            PromptVersions::default(),
        );
        result.rounds_completed = 4;
        result.recommendation = "Use OAuth 2.0 with JWT".into();
        result.consensus = result.recommendation.clone();
        result.confidence = 0.92;
        result.concerns = vec!["token rotation policy".into()];
        result.perspectives = vec![Perspective {
            agent: "SecExpert".into(),
            position: "Use OAuth 2.0".into(),
            confidence: 0.9,
        }];
        result.seal_complete(1200);
        result
    }

    #[test]
    fn test_full_format_mentions_everything() {
        let text = ConsoleFormatter::format(&completed_result());
        assert!(text.contains("Which auth scheme?"));
        assert!(text.contains("Use OAuth 2.0 with JWT"));
        assert!(text.contains("token rotation policy"));
        assert!(text.contains("SecExpert"));
    }

    #[test]
    fn test_json_round_trips() {
        let json = ConsoleFormatter::format_json(&completed_result());
        let parsed: ConsultationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.consultation_id, "c-9");
        assert_eq!(parsed.schema_version, "1.0");
    }

    #[test]
    fn test_markdown_sections() {
        let md = ConsoleFormatter::render_markdown(&completed_result());
        assert!(md.starts_with("# Consultation c-9"));
        assert!(md.contains("## Recommendation"));
        assert!(md.contains("## Unresolved concerns"));
        assert!(md.contains("## Cost"));
    }

    #[test]
    fn test_aborted_result_names_reason() {
        let mut result = completed_result();
        result.status = ConsultStatus::Aborted;
        result.abort_reason = Some("cost_exceeded_estimate".into());
        let text = ConsoleFormatter::format_verdict_only(&result);
        assert!(text.contains("cost_exceeded_estimate"));
    }
}
