//! Hedged request manager.
//!
//! Executes one agent call with latency hedging and tiered fallback: the
//! primary provider dispatches at t=0, a healthy backup joins the race if
//! the primary has not answered by the hedge deadline, and the first
//! success wins with the loser cancelled. A primary *failure* consults the
//! fallback policy (automatic when non-interactive) before trying the
//! backup. Degradation is graceful: a call that cannot be served returns an
//! empty-content response carrying the error, and the round continues.

use crate::cost_gate::non_interactive;
use crate::events::{topics, ConsultEvent, EventBus};
use crate::ports::consent::{FallbackDecision, FallbackPort};
use crate::ports::provider::{ChatReply, ProviderChat, ProviderError};
use conclave_domain::{Agent, AgentResponse, Message, TokenUsage};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default hedge deadline: backup dispatches if the primary is silent this long.
pub const DEFAULT_HEDGE_DEADLINE: Duration = Duration::from_secs(10);

/// Overall call timeout is the hedge deadline times this multiple.
pub const CALL_TIMEOUT_MULTIPLE: u32 = 3;

/// Consecutive failures before a provider is considered unhealthy.
const UNHEALTHY_AFTER: u64 = 3;

/// Latency/quality tier of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProviderTier {
    Tier1,
    Tier2,
    Tier3,
}

/// One registered provider handle
pub struct ProviderEntry {
    pub name: String,
    pub tier: ProviderTier,
    /// Model the handle serves when it substitutes for another provider;
    /// `None` means it serves whatever model the agent requested.
    pub model: Option<String>,
    pub chat: Arc<dyn ProviderChat>,
}

/// Statically partitioned provider registry.
///
/// Registration order is the tie-break inside a tier, so backup selection
/// is deterministic.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        tier: ProviderTier,
        model: Option<String>,
        chat: Arc<dyn ProviderChat>,
    ) {
        self.entries.push(ProviderEntry {
            name: name.into(),
            tier,
            model,
            chat,
        });
    }

    pub fn get(&self, name: &str) -> Option<&ProviderEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    fn in_tier(&self, tier: ProviderTier) -> impl Iterator<Item = &ProviderEntry> {
        self.entries.iter().filter(move |e| e.tier == tier)
    }
}

/// Per-provider health record
#[derive(Debug, Clone, Copy)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub successes: u64,
    pub failures: u64,
    consecutive_failures: u64,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            healthy: true,
            successes: 0,
            failures: 0,
            consecutive_failures: 0,
        }
    }
}

/// Shared provider health map. Updates are atomic per-key: every mutation
/// happens under one write-lock acquisition.
#[derive(Default)]
pub struct HealthMap {
    inner: RwLock<HashMap<String, ProviderHealth>>,
}

impl HealthMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_healthy(&self, provider: &str) -> bool {
        self.inner
            .read()
            .expect("health map poisoned")
            .get(provider)
            .map(|h| h.healthy)
            .unwrap_or(true)
    }

    pub fn record_success(&self, provider: &str) {
        let mut map = self.inner.write().expect("health map poisoned");
        let entry = map.entry(provider.to_string()).or_default();
        entry.successes += 1;
        entry.consecutive_failures = 0;
        entry.healthy = true;
    }

    pub fn record_failure(&self, provider: &str) {
        let mut map = self.inner.write().expect("health map poisoned");
        let entry = map.entry(provider.to_string()).or_default();
        entry.failures += 1;
        entry.consecutive_failures += 1;
        if entry.consecutive_failures >= UNHEALTHY_AFTER {
            entry.healthy = false;
        }
    }

    pub fn set_healthy(&self, provider: &str, healthy: bool) {
        let mut map = self.inner.write().expect("health map poisoned");
        map.entry(provider.to_string()).or_default().healthy = healthy;
    }

    pub fn snapshot(&self, provider: &str) -> ProviderHealth {
        self.inner
            .read()
            .expect("health map poisoned")
            .get(provider)
            .copied()
            .unwrap_or_default()
    }
}

/// Raised only when the user explicitly chose `Fail` at the fallback prompt.
#[derive(Error, Debug)]
pub enum HedgeError {
    #[error("Consultation aborted at user request after {provider} failed: {error}")]
    UserAbort { provider: String, error: String },
}

enum RaceLoss {
    /// Serve an empty-content response carrying this error
    Degrade(String),
    /// Abort the whole consultation
    UserAbort(String),
}

/// Executes single agent calls with hedging and fallback.
pub struct HedgedRequestManager {
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthMap>,
    fallback: Arc<dyn FallbackPort>,
    hedge_deadline: Duration,
}

impl HedgedRequestManager {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        health: Arc<HealthMap>,
        fallback: Arc<dyn FallbackPort>,
        hedge_deadline: Duration,
    ) -> Self {
        Self {
            registry,
            health,
            fallback,
            hedge_deadline,
        }
    }

    pub fn health(&self) -> &HealthMap {
        &self.health
    }

    /// Any healthy provider in the primary's tier (excluding the primary),
    /// then Tier2, then Tier3. `None` when everything is unhealthy.
    pub fn backup_provider(&self, primary: &str) -> Option<&ProviderEntry> {
        let primary_tier = self.registry.get(primary)?.tier;

        let mut order = vec![primary_tier, ProviderTier::Tier2, ProviderTier::Tier3];
        order.dedup();

        for tier in order {
            if let Some(entry) = self
                .registry
                .in_tier(tier)
                .find(|e| e.name != primary && self.health.is_healthy(&e.name))
            {
                return Some(entry);
            }
        }
        None
    }

    /// Execute one agent call.
    ///
    /// Always resolves to a response envelope - success, or failure with
    /// the error captured - except when the user chose `Fail` at the
    /// fallback prompt, which aborts the consultation.
    pub async fn execute(
        &self,
        consultation_id: &str,
        agent: &Agent,
        messages: Vec<Message>,
    ) -> Result<AgentResponse, HedgeError> {
        let started = Instant::now();
        let timestamp = now_rfc3339();

        if self.registry.get(&agent.provider).is_none() {
            warn!(provider = %agent.provider, "Unknown provider handle");
            return Ok(AgentResponse::failure(
                &agent.name,
                &agent.model,
                &agent.provider,
                format!("unknown provider: {}", agent.provider),
                elapsed_ms(started),
                timestamp,
            ));
        }

        let total_timeout = self.hedge_deadline * CALL_TIMEOUT_MULTIPLE;
        let raced = tokio::time::timeout(
            total_timeout,
            self.race(consultation_id, agent, &messages),
        )
        .await;

        match raced {
            Ok(Ok(win)) => Ok(AgentResponse::success(
                &agent.name,
                win.model,
                win.provider,
                win.reply.text,
                TokenUsage::new(win.reply.usage.input_tokens, win.reply.usage.output_tokens),
                elapsed_ms(started),
                timestamp,
            )),
            Ok(Err(RaceLoss::Degrade(error))) => Ok(AgentResponse::failure(
                &agent.name,
                &agent.model,
                &agent.provider,
                error,
                elapsed_ms(started),
                timestamp,
            )),
            Ok(Err(RaceLoss::UserAbort(error))) => Err(HedgeError::UserAbort {
                provider: agent.provider.clone(),
                error,
            }),
            Err(_) => {
                self.health.record_failure(&agent.provider);
                Ok(AgentResponse::failure(
                    &agent.name,
                    &agent.model,
                    &agent.provider,
                    format!("timed out after {:?}", total_timeout),
                    elapsed_ms(started),
                    timestamp,
                ))
            }
        }
    }

    async fn race(
        &self,
        consultation_id: &str,
        agent: &Agent,
        messages: &[Message],
    ) -> Result<RaceWin, RaceLoss> {
        let primary = self.registry.get(&agent.provider).expect("checked by caller");
        let mut primary_task = spawn_chat(primary, agent, messages);

        // Phase 1: primary alone until the hedge deadline.
        let primary_result = tokio::select! {
            joined = &mut primary_task => Some(flatten_join(joined)),
            _ = tokio::time::sleep(self.hedge_deadline) => None,
        };

        match primary_result {
            Some(Ok(reply)) => {
                self.health.record_success(&agent.provider);
                return Ok(RaceWin::primary(agent, reply));
            }
            Some(Err(error)) => {
                self.health.record_failure(&agent.provider);
                return self
                    .fall_back(consultation_id, agent, messages, error.to_string())
                    .await;
            }
            None => {}
        }

        // Phase 2: the primary is slow. Arm a backup if one is healthy.
        let Some(backup) = self.backup_provider(&agent.provider) else {
            debug!(agent = %agent.name, "No healthy backup; waiting out the primary");
            return match flatten_join(primary_task.await) {
                Ok(reply) => {
                    self.health.record_success(&agent.provider);
                    Ok(RaceWin::primary(agent, reply))
                }
                Err(error) => {
                    self.health.record_failure(&agent.provider);
                    self.fall_back(consultation_id, agent, messages, error.to_string())
                        .await
                }
            };
        };

        let backup_name = backup.name.clone();
        let backup_model = backup
            .model
            .clone()
            .unwrap_or_else(|| agent.model.clone());
        let mut backup_task = spawn_chat(backup, agent, messages);

        info!(agent = %agent.name, backup = %backup_name, "Hedging slow primary");

        // First success wins; the loser is cancelled so connections do not leak.
        let win = tokio::select! {
            joined = &mut primary_task => {
                match flatten_join(joined) {
                    Ok(reply) => {
                        backup_task.abort();
                        self.health.record_success(&agent.provider);
                        Ok(RaceWin::primary(agent, reply))
                    }
                    Err(error) => {
                        self.health.record_failure(&agent.provider);
                        match flatten_join(backup_task.await) {
                            Ok(reply) => {
                                self.health.record_success(&backup_name);
                                self.emit_substitution(
                                    consultation_id, agent, &backup_name, "latency",
                                );
                                Ok(RaceWin {
                                    provider: backup_name.clone(),
                                    model: backup_model.clone(),
                                    reply,
                                })
                            }
                            Err(backup_error) => {
                                self.health.record_failure(&backup_name);
                                Err(RaceLoss::Degrade(format!(
                                    "primary failed: {}; backup failed: {}",
                                    error, backup_error
                                )))
                            }
                        }
                    }
                }
            }
            joined = &mut backup_task => {
                match flatten_join(joined) {
                    Ok(reply) => {
                        primary_task.abort();
                        self.health.record_success(&backup_name);
                        self.emit_substitution(consultation_id, agent, &backup_name, "latency");
                        Ok(RaceWin {
                            provider: backup_name.clone(),
                            model: backup_model.clone(),
                            reply,
                        })
                    }
                    Err(backup_error) => {
                        self.health.record_failure(&backup_name);
                        match flatten_join(primary_task.await) {
                            Ok(reply) => {
                                self.health.record_success(&agent.provider);
                                Ok(RaceWin::primary(agent, reply))
                            }
                            Err(error) => {
                                self.health.record_failure(&agent.provider);
                                Err(RaceLoss::Degrade(format!(
                                    "primary failed: {}; backup failed: {}",
                                    error, backup_error
                                )))
                            }
                        }
                    }
                }
            }
        };
        win
    }

    /// Primary failed before producing a result: consult the fallback
    /// policy, then attempt the backup or degrade.
    async fn fall_back(
        &self,
        consultation_id: &str,
        agent: &Agent,
        messages: &[Message],
        error: String,
    ) -> Result<RaceWin, RaceLoss> {
        let backup = self.backup_provider(&agent.provider);
        let backup_name = backup.map(|b| b.name.clone());

        let decision = if non_interactive() {
            info!(agent = %agent.name, "Non-interactive mode: attempting backup automatically");
            FallbackDecision::Yes
        } else {
            self.fallback
                .confirm_fallback(agent, &agent.provider, backup_name.as_deref(), &error)
                .await
        };

        match decision {
            FallbackDecision::Fail => Err(RaceLoss::UserAbort(error)),
            FallbackDecision::No => Err(RaceLoss::Degrade(error)),
            FallbackDecision::Yes => {
                let Some(backup) = backup else {
                    return Err(RaceLoss::Degrade(error));
                };
                let backup_model = backup
                    .model
                    .clone()
                    .unwrap_or_else(|| agent.model.clone());
                let backup_name = backup.name.clone();
                match flatten_join(spawn_chat(backup, agent, messages).await) {
                    Ok(reply) => {
                        self.health.record_success(&backup_name);
                        self.emit_substitution(
                            consultation_id,
                            agent,
                            &backup_name,
                            "primary_error",
                        );
                        Ok(RaceWin {
                            provider: backup_name,
                            model: backup_model,
                            reply,
                        })
                    }
                    Err(backup_error) => {
                        self.health.record_failure(&backup_name);
                        Err(RaceLoss::Degrade(format!(
                            "primary failed: {}; backup failed: {}",
                            error, backup_error
                        )))
                    }
                }
            }
        }
    }

    fn emit_substitution(
        &self,
        consultation_id: &str,
        agent: &Agent,
        substitute: &str,
        reason: &str,
    ) {
        EventBus::global().emit(
            topics::PROVIDER_SUBSTITUTED,
            &ConsultEvent::new(
                consultation_id,
                json!({
                    "agent": agent.name,
                    "primary": agent.provider,
                    "substitute": substitute,
                    "reason": reason,
                }),
            ),
        );
    }
}

struct RaceWin {
    provider: String,
    model: String,
    reply: ChatReply,
}

impl RaceWin {
    fn primary(agent: &Agent, reply: ChatReply) -> Self {
        Self {
            provider: agent.provider.clone(),
            model: agent.model.clone(),
            reply,
        }
    }
}

fn spawn_chat(
    entry: &ProviderEntry,
    agent: &Agent,
    messages: &[Message],
) -> tokio::task::JoinHandle<Result<ChatReply, ProviderError>> {
    let chat = Arc::clone(&entry.chat);
    let messages = messages.to_vec();
    let system = agent.system_prompt.clone();
    tokio::spawn(async move { chat.chat(&messages, &system).await })
}

fn flatten_join(
    joined: Result<Result<ChatReply, ProviderError>, tokio::task::JoinError>,
) -> Result<ChatReply, ProviderError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(ProviderError::Other("cancelled".into())),
        Err(e) => Err(ProviderError::Other(format!("task panicked: {}", e))),
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
