//! Run Consult use case
//!
//! Drives the four-round debate: independent positions → synthesis →
//! cross-examination → verdict. Owns the state machine, the in-progress
//! result, concurrency inside rounds, cost tracking, error policy, and
//! result assembly.

use crate::cost_gate::{Admission, CostGate};
use crate::events::{topics, ConsultEvent, EventBus};
use crate::hedge::{HedgeError, HedgedRequestManager};
use crate::partial::PartialResultManager;
use crate::ports::run_store::RunStore;
use conclave_domain::consult::extract;
use conclave_domain::{
    actual_cost, early_termination_savings, estimate, AbortReason, Agent, AgentResponse,
    ConsultError, ConsultState, ConsultationResult, CrossExamArtifact, DebateMode,
    IndependentArtifact, Message, ModeStrategy, Question, StateMachine, TokenUsage,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that can occur while running a consultation
#[derive(Error, Debug)]
pub enum RunConsultError {
    #[error("All agents failed in the independent round")]
    AllAgentsFailed,

    #[error("Synthesis round failed: {0}")]
    SynthesisFailed(String),

    #[error("Verdict round failed: {0}")]
    VerdictFailed(String),

    #[error("In-flight cost {actual:.4} USD exceeded limit {limit:.4} USD")]
    CostExceeded { actual: f64, limit: f64 },

    #[error(transparent)]
    Hedge(#[from] HedgeError),

    #[error(transparent)]
    Domain(#[from] ConsultError),
}

/// Options recognised by [`ConsultOrchestrator::consult`]
#[derive(Debug, Clone)]
pub struct ConsultOptions {
    /// 1..=4; `--quick` forces 1
    pub max_rounds: u8,
    pub verbose: bool,
    pub mode: DebateMode,
    /// Orchestrator-level early-termination floor
    pub confidence_threshold: f64,
    pub project_path: Option<String>,
    /// Greenfield consultations carry no loaded project context
    pub greenfield: bool,
    /// Pre-scrubbed context gathered by collaborators
    pub loaded_context: Option<String>,
    /// Scrubber report attached for the record
    pub scrubbing_report: Option<Value>,
    pub allow_cost_overruns: bool,
    /// In-flight spend limit as a multiple of the estimate
    pub cost_overrun_factor: f64,
    /// Cooperative cancel flag checked at round boundaries
    pub cancel: CancellationToken,
}

impl Default for ConsultOptions {
    fn default() -> Self {
        Self {
            max_rounds: 4,
            verbose: false,
            mode: DebateMode::Converge,
            confidence_threshold: 0.90,
            project_path: None,
            greenfield: false,
            loaded_context: None,
            scrubbing_report: None,
            allow_cost_overruns: false,
            cost_overrun_factor: 1.5,
            cancel: CancellationToken::new(),
        }
    }
}

/// Use case for running one consultation.
///
/// One orchestrator instance drives one consultation at a time; rounds
/// execute strictly sequentially, with parallel fan-out only inside
/// Rounds 1 and 3.
pub struct ConsultOrchestrator {
    panel: Vec<Agent>,
    judge: Agent,
    strategy: Arc<dyn ModeStrategy>,
    hedge: Arc<HedgedRequestManager>,
    gate: CostGate,
    partials: PartialResultManager,
    run_store: Arc<dyn RunStore>,
}

impl ConsultOrchestrator {
    pub fn new(
        panel: Vec<Agent>,
        judge: Agent,
        strategy: Arc<dyn ModeStrategy>,
        hedge: Arc<HedgedRequestManager>,
        gate: CostGate,
        partials: PartialResultManager,
        run_store: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            panel,
            judge,
            strategy,
            hedge,
            gate,
            partials,
            run_store,
        }
    }

    /// Run the consultation to completion or abort.
    ///
    /// Returns `Ok` with a sealed result on success AND on user
    /// cancellation / consent denial (callers distinguish via
    /// `result.status`); returns `Err` on fatal paths, after persisting a
    /// partial record.
    pub async fn consult(
        &self,
        question: Question,
        options: ConsultOptions,
    ) -> Result<ConsultationResult, RunConsultError> {
        validate(&self.panel, &options)?;

        let question = attach_context(question, &options);
        let consultation_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let mut sm = StateMachine::new();

        info!(
            consultation_id = %consultation_id,
            mode = %options.mode,
            agents = self.panel.len(),
            "Starting consultation"
        );
        emit(
            topics::CONSULTATION_STARTED,
            &consultation_id,
            json!({
                "question": question.content(),
                "mode": options.mode.as_str(),
                "agents": self.panel.iter().map(|a| a.name.clone()).collect::<Vec<_>>(),
            }),
        );

        // 1. Estimate
        let cost_estimate = estimate(question.content(), &self.panel, options.max_rounds);
        emit(
            topics::COST_ESTIMATED,
            &consultation_id,
            json!({
                "usd": cost_estimate.usd,
                "input_tokens": cost_estimate.input_tokens_total,
                "output_tokens": cost_estimate.output_tokens_total,
            }),
        );

        let mut result = ConsultationResult::new(
            consultation_id.clone(),
            question.content(),
            question.context(),
            options.mode.as_str(),
            self.panel.clone(),
            options.max_rounds,
            cost_estimate.usd,
            self.strategy.prompt_versions(),
        );

        // 2. Consent
        self.advance(&mut sm, &mut result, ConsultState::AwaitingConsent)?;
        let admission = self
            .gate
            .check(&cost_estimate, &self.panel, options.max_rounds)
            .await?;
        emit(
            topics::USER_CONSENT,
            &consultation_id,
            json!({"approved": admission == Admission::Approved}),
        );
        if admission == Admission::Denied {
            // Denial exits cleanly: no agent calls, no partial file.
            let _ = sm.abort(AbortReason::UserCancelled);
            result.seal_aborted(AbortReason::UserCancelled, elapsed_ms(started));
            self.emit_aborted(&result);
            return Ok(result);
        }

        // 3. Round 1 - Independent
        if let Some(r) = self.check_cancelled(&options.cancel, &mut sm, &mut result, started) {
            return Ok(r);
        }
        self.advance(&mut sm, &mut result, ConsultState::Independent)?;

        let round1 = match self.round_independent(&consultation_id, &question).await {
            Ok(responses) => responses,
            Err(hedge_err) => {
                self.abort(&mut sm, &mut result, AbortReason::Error, started, true);
                return Err(hedge_err.into());
            }
        };

        let created_at = now_rfc3339();
        let mut artifacts = Vec::new();
        for response in &round1 {
            if !response.is_success() {
                continue;
            }
            match extract::extract_independent(&response.content, &response.agent_id, &created_at)
            {
                Some(artifact) => {
                    emit(
                        topics::ROUND_ARTIFACT,
                        &consultation_id,
                        json!({"round": 1, "agent": artifact.agent_id}),
                    );
                    artifacts.push(artifact);
                }
                None => {
                    warn!(agent = %response.agent_id, "Round 1 extraction failed");
                }
            }
        }
        result.responses.round1 = round1;
        result.artifacts.round1 = artifacts;

        if result.artifacts.round1.is_empty() {
            self.abort(&mut sm, &mut result, AbortReason::AllAgentsFailed, started, true);
            return Err(RunConsultError::AllAgentsFailed);
        }

        result.rounds_completed = 1;
        self.finish_round(&mut result, 1);
        if let Err(e) = self.enforce_costs(&mut sm, &mut result, &options, started) {
            return Err(e);
        }

        if options.max_rounds == 1 {
            return Ok(self.assemble_truncated(sm, result, started));
        }

        // 4. Round 2 - Synthesis
        if let Some(r) = self.check_cancelled(&options.cancel, &mut sm, &mut result, started) {
            return Ok(r);
        }
        self.advance(&mut sm, &mut result, ConsultState::Synthesis)?;

        let synthesis_prompt = self
            .strategy
            .synthesis_prompt(&question, &result.artifacts.round1);
        let judge_response = match self.judge_call(&consultation_id, synthesis_prompt, 2).await {
            Ok(response) => response,
            Err(hedge_err) => {
                self.abort(&mut sm, &mut result, AbortReason::Error, started, true);
                return Err(hedge_err.into());
            }
        };

        let synthesis = if judge_response.is_success() {
            extract::extract_synthesis(&judge_response.content)
        } else {
            None
        };
        let detail = judge_response
            .error
            .clone()
            .unwrap_or_else(|| "no valid synthesis artifact in judge output".into());
        result.responses.round2 = Some(judge_response);

        let Some(mut synthesis) = synthesis else {
            // Without a synthesis, a verdict is impossible.
            self.abort(&mut sm, &mut result, AbortReason::SynthesisFailed, started, true);
            return Err(RunConsultError::SynthesisFailed(detail));
        };
        synthesis.retain_known_agents(&result.successful_agents());
        emit(
            topics::ROUND_ARTIFACT,
            &consultation_id,
            json!({"round": 2, "consensus_points": synthesis.consensus_points.len()}),
        );
        result.artifacts.round2 = Some(synthesis);
        result.rounds_completed = 2;
        self.finish_round(&mut result, 2);
        self.enforce_costs(&mut sm, &mut result, &options, started)?;

        // Early termination test
        let consensus_confidence = result
            .artifacts
            .round2
            .as_ref()
            .map(|s| s.consensus_confidence())
            .unwrap_or(0.0);
        if self.strategy.should_terminate_early(consensus_confidence, 2)
            && consensus_confidence >= options.confidence_threshold
        {
            let skipped = options.max_rounds.saturating_sub(2);
            let savings = early_termination_savings(&self.panel, skipped);
            info!(
                confidence = consensus_confidence,
                savings_usd = savings,
                "Early termination: consensus is strong enough"
            );
            result.early_termination_savings_usd = Some(savings);
            return Ok(self.assemble_truncated(sm, result, started));
        }

        if options.max_rounds == 2 {
            return Ok(self.assemble_truncated(sm, result, started));
        }

        // 5. Round 3 - Cross-Examination
        if let Some(r) = self.check_cancelled(&options.cancel, &mut sm, &mut result, started) {
            return Ok(r);
        }
        self.advance(&mut sm, &mut result, ConsultState::CrossExam)?;

        let round3 = match self.round_cross_exam(&consultation_id, &question, &result).await {
            Ok(responses) => responses,
            Err(hedge_err) => {
                self.abort(&mut sm, &mut result, AbortReason::Error, started, true);
                return Err(hedge_err.into());
            }
        };

        let exam_inputs: Vec<(String, String)> = round3
            .iter()
            .filter(|r| r.is_success())
            .map(|r| (r.agent_id.clone(), r.content.clone()))
            .collect();
        result.responses.round3 = round3;

        let cross_exam = if exam_inputs.is_empty() {
            debug!("All agents failed cross-examination; continuing with an empty record");
            CrossExamArtifact::empty()
        } else {
            let prompt = self
                .strategy
                .cross_exam_synthesis_prompt(&question, &exam_inputs);
            match self.judge_call(&consultation_id, prompt, 3).await {
                Ok(response) => {
                    let artifact = if response.is_success() {
                        extract::extract_cross_exam(&response.content)
                    } else {
                        None
                    };
                    result.responses.round3_synthesis = Some(response);
                    // A judge failure in Round 3 is tolerated.
                    artifact.unwrap_or_else(CrossExamArtifact::empty)
                }
                Err(hedge_err) => {
                    self.abort(&mut sm, &mut result, AbortReason::Error, started, true);
                    return Err(hedge_err.into());
                }
            }
        };
        emit(
            topics::ROUND_ARTIFACT,
            &consultation_id,
            json!({"round": 3, "challenges": cross_exam.challenges.len()}),
        );
        result.artifacts.round3 = Some(cross_exam);
        result.rounds_completed = 3;
        self.finish_round(&mut result, 3);
        self.enforce_costs(&mut sm, &mut result, &options, started)?;

        if options.max_rounds == 3 {
            return Ok(self.assemble_truncated(sm, result, started));
        }

        // 6. Round 4 - Verdict
        if let Some(r) = self.check_cancelled(&options.cancel, &mut sm, &mut result, started) {
            return Ok(r);
        }
        self.advance(&mut sm, &mut result, ConsultState::Verdict)?;

        let verdict_prompt = self.strategy.verdict_prompt(
            &question,
            result.artifacts.round2.as_ref().expect("synthesis exists"),
            result
                .artifacts
                .round3
                .as_ref()
                .expect("cross-exam exists"),
        );
        let judge_response = match self.judge_call(&consultation_id, verdict_prompt, 4).await {
            Ok(response) => response,
            Err(hedge_err) => {
                self.abort(&mut sm, &mut result, AbortReason::Error, started, true);
                return Err(hedge_err.into());
            }
        };

        let verdict = if judge_response.is_success() {
            extract::extract_verdict(&judge_response.content)
        } else {
            None
        };
        let detail = judge_response
            .error
            .clone()
            .unwrap_or_else(|| "no valid verdict artifact in judge output".into());
        result.responses.round4 = Some(judge_response);

        let Some(verdict) = verdict else {
            // A consultation without a verdict is not complete.
            self.abort(&mut sm, &mut result, AbortReason::Error, started, true);
            return Err(RunConsultError::VerdictFailed(detail));
        };
        emit(
            topics::ROUND_ARTIFACT,
            &consultation_id,
            json!({"round": 4, "confidence": verdict.confidence}),
        );
        result.artifacts.round4 = Some(verdict);
        result.rounds_completed = 4;
        self.finish_round(&mut result, 4);
        self.enforce_costs(&mut sm, &mut result, &options, started)?;

        // 7. Complete
        self.advance(&mut sm, &mut result, ConsultState::Complete)?;
        self.assemble_verdict(&mut result);
        result.seal_complete(elapsed_ms(started));
        if let Err(e) = self.run_store.write_final(&result) {
            warn!("Could not write final result file: {}", e);
        }
        emit(
            topics::CONSULTATION_COMPLETED,
            &result.consultation_id,
            json!({
                "confidence": result.confidence,
                "rounds_completed": result.rounds_completed,
                "cost_usd": result.actual_cost,
            }),
        );
        Ok(result)
    }

    /// Fan out Round 1 across the panel. Output order is stable by panel
    /// position regardless of resolution order, so downstream prompts are
    /// deterministic given the same responses.
    async fn round_independent(
        &self,
        consultation_id: &str,
        question: &Question,
    ) -> Result<Vec<AgentResponse>, HedgeError> {
        let mut join_set: JoinSet<(usize, Result<AgentResponse, HedgeError>)> = JoinSet::new();

        for (idx, agent) in self.panel.iter().enumerate() {
            let prompt = self.strategy.independent_prompt(question, agent);
            self.spawn_agent_call(&mut join_set, consultation_id, agent, idx, prompt, 1);
        }

        self.join_round(join_set, consultation_id, self.panel.clone(), 1)
            .await
    }

    /// Fan out Round 3 across agents that produced a Round 1 artifact.
    async fn round_cross_exam(
        &self,
        consultation_id: &str,
        question: &Question,
        result: &ConsultationResult,
    ) -> Result<Vec<AgentResponse>, HedgeError> {
        let synthesis = result.artifacts.round2.as_ref().expect("synthesis exists");
        let participants: Vec<(&Agent, &IndependentArtifact)> = result
            .artifacts
            .round1
            .iter()
            .filter_map(|artifact| {
                self.panel
                    .iter()
                    .find(|a| a.name == artifact.agent_id)
                    .map(|agent| (agent, artifact))
            })
            .collect();

        let round_agents: Vec<Agent> = participants.iter().map(|(a, _)| (*a).clone()).collect();
        let mut join_set: JoinSet<(usize, Result<AgentResponse, HedgeError>)> = JoinSet::new();
        for (idx, (agent, own)) in participants.into_iter().enumerate() {
            let prompt = self.strategy.cross_exam_prompt(question, own, synthesis);
            self.spawn_agent_call(&mut join_set, consultation_id, agent, idx, prompt, 3);
        }

        self.join_round(join_set, consultation_id, round_agents, 3)
            .await
    }

    fn spawn_agent_call(
        &self,
        join_set: &mut JoinSet<(usize, Result<AgentResponse, HedgeError>)>,
        consultation_id: &str,
        agent: &Agent,
        idx: usize,
        prompt: String,
        round: u8,
    ) {
        emit(
            topics::AGENT_THINKING,
            consultation_id,
            json!({"agent": agent.name, "round": round}),
        );
        let hedge = Arc::clone(&self.hedge);
        let agent = agent.clone();
        let consultation_id = consultation_id.to_string();
        join_set.spawn(async move {
            let response = hedge
                .execute(&consultation_id, &agent, vec![Message::user(prompt)])
                .await;
            (idx, response)
        });
    }

    /// Join-all barrier over one round's fan-out. A `HedgeError` (user
    /// chose to fail the consultation) cancels the round's siblings.
    async fn join_round(
        &self,
        mut join_set: JoinSet<(usize, Result<AgentResponse, HedgeError>)>,
        consultation_id: &str,
        round_agents: Vec<Agent>,
        round: u8,
    ) -> Result<Vec<AgentResponse>, HedgeError> {
        let mut slots: Vec<Option<AgentResponse>> =
            (0..round_agents.len()).map(|_| None).collect();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, Ok(response))) => {
                    emit(
                        topics::AGENT_COMPLETED,
                        consultation_id,
                        json!({
                            "agent": response.agent_id,
                            "round": round,
                            "success": response.is_success(),
                            "tokens": response.tokens.total,
                            "duration_ms": response.duration_ms,
                        }),
                    );
                    slots[idx] = Some(response);
                }
                Ok((_, Err(hedge_err))) => {
                    join_set.abort_all();
                    return Err(hedge_err);
                }
                Err(join_err) => {
                    warn!("Agent task join error: {}", join_err);
                }
            }
        }

        let timestamp = now_rfc3339();
        Ok(slots
            .into_iter()
            .zip(round_agents)
            .map(|(slot, agent)| {
                slot.unwrap_or_else(|| {
                    AgentResponse::failure(
                        &agent.name,
                        &agent.model,
                        &agent.provider,
                        "agent task did not complete",
                        0,
                        timestamp.clone(),
                    )
                })
            })
            .collect())
    }

    /// Single-flight judge call (Rounds 2, 3-synthesis, 4).
    async fn judge_call(
        &self,
        consultation_id: &str,
        prompt: String,
        round: u8,
    ) -> Result<AgentResponse, HedgeError> {
        emit(
            topics::AGENT_THINKING,
            consultation_id,
            json!({"agent": self.judge.name, "round": round}),
        );
        let response = self
            .hedge
            .execute(consultation_id, &self.judge, vec![Message::user(prompt)])
            .await?;
        emit(
            topics::AGENT_COMPLETED,
            consultation_id,
            json!({
                "agent": response.agent_id,
                "round": round,
                "success": response.is_success(),
                "tokens": response.tokens.total,
                "duration_ms": response.duration_ms,
            }),
        );
        Ok(response)
    }

    fn advance(
        &self,
        sm: &mut StateMachine,
        result: &mut ConsultationResult,
        state: ConsultState,
    ) -> Result<(), ConsultError> {
        sm.transition(state)?;
        result.state = state;
        Ok(())
    }

    fn abort(
        &self,
        sm: &mut StateMachine,
        result: &mut ConsultationResult,
        reason: AbortReason,
        started: Instant,
        write_partial: bool,
    ) {
        let _ = sm.abort(reason);
        self.update_costs(result);
        result.seal_aborted(reason, elapsed_ms(started));
        if write_partial {
            self.partials.write_partial(result);
        }
        self.emit_aborted(result);
    }

    fn emit_aborted(&self, result: &ConsultationResult) {
        emit(
            topics::CONSULTATION_ABORTED,
            &result.consultation_id,
            json!({
                "reason": result.abort_reason,
                "rounds_completed": result.rounds_completed,
            }),
        );
    }

    /// Cooperative cancellation, checked at round boundaries. A cancelled
    /// consultation aborts with a partial record and is returned sealed.
    fn check_cancelled(
        &self,
        cancel: &CancellationToken,
        sm: &mut StateMachine,
        result: &mut ConsultationResult,
        started: Instant,
    ) -> Option<ConsultationResult> {
        if cancel.is_cancelled() {
            info!(consultation_id = %result.consultation_id, "Consultation cancelled by user");
            self.abort(sm, result, AbortReason::UserCancelled, started, true);
            Some(result.clone())
        } else {
            None
        }
    }

    /// Post-round bookkeeping: cost totals, checkpoint, round event.
    fn finish_round(&self, result: &mut ConsultationResult, round: u8) {
        self.update_costs(result);
        self.partials.save_checkpoint(result, round);
        emit(
            topics::ROUND_COMPLETED,
            &result.consultation_id,
            json!({"round": round, "cost_usd": result.actual_cost}),
        );
    }

    fn update_costs(&self, result: &mut ConsultationResult) {
        let mut refs: Vec<&AgentResponse> = result.responses.round1.iter().collect();
        refs.extend(result.responses.round2.as_ref());
        refs.extend(result.responses.round3.iter());
        refs.extend(result.responses.round3_synthesis.as_ref());
        refs.extend(result.responses.round4.as_ref());

        let mut tokens = TokenUsage::default();
        for r in &refs {
            tokens.add(r.tokens);
        }
        result.cost.tokens = tokens;
        result.actual_cost = actual_cost(&refs);
        result.cost.usd = result.actual_cost;
    }

    /// In-flight cost enforcement against the pre-flight estimate.
    fn enforce_costs(
        &self,
        sm: &mut StateMachine,
        result: &mut ConsultationResult,
        options: &ConsultOptions,
        started: Instant,
    ) -> Result<(), RunConsultError> {
        let limit = result.estimated_cost * options.cost_overrun_factor;
        if result.actual_cost > limit {
            result.cost_exceeded = true;
            if !options.allow_cost_overruns {
                let actual = result.actual_cost;
                self.abort(sm, result, AbortReason::CostExceeded, started, true);
                return Err(RunConsultError::CostExceeded { actual, limit });
            }
            warn!(
                actual = result.actual_cost,
                limit, "Cost overrun allowed by option"
            );
        }
        Ok(())
    }

    /// Assemble a result that stops before the verdict: best-effort
    /// consensus from the synthesis (or the top-confidence Round 1
    /// position when only Round 1 ran).
    fn assemble_truncated(
        &self,
        mut sm: StateMachine,
        mut result: ConsultationResult,
        started: Instant,
    ) -> ConsultationResult {
        if let Some(synthesis) = &result.artifacts.round2 {
            if let Some(top) = synthesis.top_consensus() {
                result.consensus = top.point.clone();
                result.confidence = top.confidence;
            }
        } else if let Some(best) = result
            .artifacts
            .round1
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        {
            result.consensus = best.position.clone();
            result.confidence = best.confidence;
        }
        result.recommendation = result.consensus.clone();
        if let Some(cross_exam) = &result.artifacts.round3 {
            result.concerns = cross_exam.unresolved.clone();
        }
        result.derive_perspectives();
        self.update_costs(&mut result);

        let _ = sm.transition(ConsultState::Complete);
        result.seal_complete(elapsed_ms(started));
        if let Err(e) = self.run_store.write_final(&result) {
            warn!("Could not write final result file: {}", e);
        }
        emit(
            topics::CONSULTATION_COMPLETED,
            &result.consultation_id,
            json!({
                "confidence": result.confidence,
                "rounds_completed": result.rounds_completed,
                "cost_usd": result.actual_cost,
                "early_terminated": result.early_termination_savings_usd.is_some(),
            }),
        );
        result
    }

    /// Assemble the full-verdict result fields.
    fn assemble_verdict(&self, result: &mut ConsultationResult) {
        let verdict = result.artifacts.round4.clone().expect("verdict exists");
        result.consensus = verdict.recommendation.clone();
        result.recommendation = verdict.recommendation;
        result.confidence = verdict.confidence;
        result.dissent = verdict.dissent;
        if let Some(cross_exam) = &result.artifacts.round3 {
            result.concerns = cross_exam.unresolved.clone();
        }
        result.derive_perspectives();
        self.update_costs(result);
    }
}

fn validate(panel: &[Agent], options: &ConsultOptions) -> Result<(), ConsultError> {
    if panel.is_empty() {
        return Err(ConsultError::Validation("panel has no agents".into()));
    }
    if !(1..=4).contains(&options.max_rounds) {
        return Err(ConsultError::Validation(format!(
            "max_rounds must be 1..=4, got {}",
            options.max_rounds
        )));
    }
    if !(0.0..=1.0).contains(&options.confidence_threshold) {
        return Err(ConsultError::Validation(format!(
            "confidence_threshold must be within [0, 1], got {}",
            options.confidence_threshold
        )));
    }
    Ok(())
}

fn attach_context(question: Question, options: &ConsultOptions) -> Question {
    match (&options.loaded_context, options.greenfield) {
        (Some(loaded), false) if !loaded.trim().is_empty() => {
            let merged = if question.has_context() {
                format!("{}\n\n{}", question.context(), loaded)
            } else {
                loaded.clone()
            };
            Question::new(question.content().to_string()).with_context(merged)
        }
        _ => question,
    }
}

fn emit(topic: &str, consultation_id: &str, payload: Value) {
    EventBus::global().emit(topic, &ConsultEvent::new(consultation_id, payload));
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
