//! End-to-end consultation flows against scripted providers.

use async_trait::async_trait;
use conclave_application::{
    verify_partial_line, ChatReply, ChatUsage, ConfigStore, ConsentDecision, ConsentPort,
    ConsultOptions, ConsultOrchestrator, CostGate, FallbackDecision, FallbackPort, HealthMap,
    HedgedRequestManager, MemoryConfigStore, PartialResultManager, ProviderChat, ProviderError,
    ProviderRegistry, ProviderTier, RunConsultError, RunStore, Signer,
};
use conclave_domain::{
    Agent, ConsultError, ConsultStatus, ConsultationResult, CostEstimate, DebateMode, Message,
    Question,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// Provider returning scripted replies in call order.
struct SeqProvider {
    replies: Mutex<VecDeque<Result<ChatReply, ProviderError>>>,
    calls: AtomicUsize,
}

impl SeqProvider {
    fn new(replies: Vec<Result<ChatReply, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderChat for SeqProvider {
    async fn chat(
        &self,
        _messages: &[Message],
        _system: &str,
    ) -> Result<ChatReply, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Other("no scripted reply left".into())))
    }
}

fn ok(text: &str) -> Result<ChatReply, ProviderError> {
    ok_with_usage(text, 500, 800)
}

fn ok_with_usage(text: &str, input: u64, output: u64) -> Result<ChatReply, ProviderError> {
    Ok(ChatReply {
        text: text.to_string(),
        usage: ChatUsage {
            input_tokens: input,
            output_tokens: output,
        },
    })
}

fn transport_err() -> Result<ChatReply, ProviderError> {
    Err(ProviderError::Connection("connection reset by peer".into()))
}

struct FixedConsent(ConsentDecision);

#[async_trait]
impl ConsentPort for FixedConsent {
    async fn request_consent(
        &self,
        _estimate: &CostEstimate,
        _agents: &[Agent],
        _rounds: u8,
    ) -> ConsentDecision {
        self.0
    }
}

struct NeverFallback;

#[async_trait]
impl FallbackPort for NeverFallback {
    async fn confirm_fallback(
        &self,
        _agent: &Agent,
        _primary: &str,
        _backup: Option<&str>,
        _error: &str,
    ) -> FallbackDecision {
        FallbackDecision::No
    }
}

/// Store capturing partial lines and checkpoint keys for assertions.
#[derive(Default)]
struct CapturingStore {
    partials: Mutex<Vec<String>>,
    checkpoints: Mutex<Vec<(String, u8)>>,
    finals: Mutex<Vec<String>>,
}

impl RunStore for CapturingStore {
    fn save_checkpoint(&self, id: &str, round: u8, _doc: &Value) -> Result<(), ConsultError> {
        let mut seen = self.checkpoints.lock().unwrap();
        let key = (id.to_string(), round);
        if !seen.contains(&key) {
            seen.push(key);
        }
        Ok(())
    }

    fn append_partial(&self, _id: &str, line: &str) -> Result<(), ConsultError> {
        self.partials.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn write_final(&self, result: &ConsultationResult) -> Result<(), ConsultError> {
        self.finals
            .lock()
            .unwrap()
            .push(result.consultation_id.clone());
        Ok(())
    }
}

struct TestSigner;

impl Signer for TestSigner {
    fn sign(&self, bytes: &[u8]) -> String {
        format!("{:08x}", bytes.iter().map(|b| *b as u32).sum::<u32>())
    }

    fn verify(&self, bytes: &[u8], signature: &str) -> bool {
        self.sign(bytes) == signature
    }
}

// ---------------------------------------------------------------------------
// Panel and scripted replies
// ---------------------------------------------------------------------------

fn panel() -> Vec<Agent> {
    vec![
        Agent::new("SecExpert", "security", "claude-sonnet-4.5", "mock-sec", "sec"),
        Agent::new("Architect", "architecture", "gpt-4o", "mock-arch", "arch"),
        Agent::new("Pragmatist", "pragmatism", "gemini-2.5-pro", "mock-prag", "prag"),
    ]
}

fn judge() -> Agent {
    Agent::new("Judge", "arbiter", "gpt-4o", "mock-judge", "judge")
}

fn position_json(position: &str, confidence: f64) -> String {
    format!(
        r#"{{"position": "{}", "key_points": ["standard"], "rationale": "well understood", "confidence": {}}}"#,
        position, confidence
    )
}

fn synthesis_json(confidence: f64) -> String {
    format!(
        r#"{{"consensus_points": [{{"point": "Use OAuth 2.0", "supporting_agents": ["SecExpert", "Architect", "Pragmatist"], "confidence": {}}}], "tensions": [], "priority_order": []}}"#,
        confidence
    )
}

fn cross_exam_judge_json() -> String {
    r#"{"challenges": [{"challenger": "SecExpert", "target": "Consensus", "challenge": "rotation cadence unspecified", "evidence": []}], "rebuttals": [], "unresolved": ["token rotation policy"]}"#.to_string()
}

fn verdict_json() -> String {
    r#"{"_analysis": "all agents aligned", "recommendation": "Use OAuth 2.0 with JWT", "confidence": 0.92, "evidence": ["standard"], "dissent": []}"#.to_string()
}

struct Fixture {
    orchestrator: ConsultOrchestrator,
    store: Arc<CapturingStore>,
    judge_provider: Arc<SeqProvider>,
}

fn fixture(
    agent_scripts: Vec<Vec<Result<ChatReply, ProviderError>>>,
    judge_script: Vec<Result<ChatReply, ProviderError>>,
    consent: ConsentDecision,
    allow_under: f64,
) -> Fixture {
    let mut registry = ProviderRegistry::new();
    let providers = ["mock-sec", "mock-arch", "mock-prag"];
    for (name, script) in providers.iter().zip(agent_scripts) {
        registry.register(*name, ProviderTier::Tier1, None, SeqProvider::new(script));
    }
    let judge_provider = SeqProvider::new(judge_script);
    registry.register(
        "mock-judge",
        ProviderTier::Tier2,
        None,
        Arc::clone(&judge_provider) as Arc<dyn ProviderChat>,
    );

    let hedge = Arc::new(HedgedRequestManager::new(
        Arc::new(registry),
        Arc::new(HealthMap::new()),
        Arc::new(NeverFallback),
        Duration::from_secs(5),
    ));

    let config: Arc<dyn ConfigStore> = Arc::new(MemoryConfigStore::new(allow_under));
    let gate = CostGate::new(Arc::new(FixedConsent(consent)), config);

    let store = Arc::new(CapturingStore::default());
    let partials = PartialResultManager::new(
        Arc::clone(&store) as Arc<dyn RunStore>,
        Arc::new(TestSigner),
    );

    let orchestrator = ConsultOrchestrator::new(
        panel(),
        judge(),
        DebateMode::Converge.strategy(),
        hedge,
        gate,
        partials,
        Arc::clone(&store) as Arc<dyn RunStore>,
    );

    Fixture {
        orchestrator,
        store,
        judge_provider,
    }
}

fn happy_agent_scripts() -> Vec<Vec<Result<ChatReply, ProviderError>>> {
    // Each agent answers Round 1 and Round 3
    vec![
        vec![ok(&position_json("Use OAuth 2.0", 0.9)), ok("challenge text sec")],
        vec![ok(&position_json("Use OAuth 2.0", 0.85)), ok("challenge text arch")],
        vec![ok(&position_json("Use OAuth 2.0", 0.8)), ok("challenge text prag")],
    ]
}

fn happy_judge_script(synthesis_confidence: f64) -> Vec<Result<ChatReply, ProviderError>> {
    vec![
        ok(&synthesis_json(synthesis_confidence)),
        ok(&cross_exam_judge_json()),
        ok(&verdict_json()),
    ]
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_converge_completes_four_rounds() {
    let fx = fixture(
        happy_agent_scripts(),
        happy_judge_script(0.9),
        ConsentDecision::Approved,
        100.0,
    );

    let result = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), ConsultOptions::default())
        .await
        .unwrap();

    assert_eq!(result.status, ConsultStatus::Complete);
    assert_eq!(result.rounds_completed, 4);
    assert_eq!(result.recommendation, "Use OAuth 2.0 with JWT");
    assert_eq!(result.consensus, "Use OAuth 2.0 with JWT");
    assert!((result.confidence - 0.92).abs() < 1e-9);
    assert_eq!(result.concerns, vec!["token rotation policy"]);
    assert_eq!(result.perspectives.len(), 3);
    assert!(result.dissent.is_empty());
    assert!(result.actual_cost > 0.0);
    assert!(!result.cost_exceeded);
    assert_eq!(result.prompt_versions.verdict, "converge.verdict.v3");

    // One checkpoint per round, a final file, no partial
    let checkpoints = fx.store.checkpoints.lock().unwrap();
    assert_eq!(checkpoints.len(), 4);
    assert_eq!(fx.store.finals.lock().unwrap().len(), 1);
    assert!(fx.store.partials.lock().unwrap().is_empty());
}

#[tokio::test]
async fn one_agent_failure_is_isolated() {
    let mut scripts = happy_agent_scripts();
    scripts[1] = vec![transport_err()];
    let fx = fixture(
        scripts,
        happy_judge_script(0.9),
        ConsentDecision::Approved,
        100.0,
    );

    let result = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), ConsultOptions::default())
        .await
        .unwrap();

    assert_eq!(result.status, ConsultStatus::Complete);
    // The failed agent's envelope carries the error, no artifact
    let failed = &result.responses.round1[1];
    assert_eq!(failed.agent_id, "Architect");
    assert!(failed.error.as_deref().unwrap().contains("connection reset"));
    assert_eq!(result.artifacts.round1.len(), 2);
    // Round 3 ran only over the two surviving agents
    assert_eq!(result.responses.round3.len(), 2);
    assert_eq!(result.rounds_completed, 4);
}

#[tokio::test]
async fn all_agents_failing_aborts_before_synthesis() {
    let fx = fixture(
        vec![vec![transport_err()], vec![transport_err()], vec![transport_err()]],
        happy_judge_script(0.9),
        ConsentDecision::Approved,
        100.0,
    );

    let err = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), ConsultOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RunConsultError::AllAgentsFailed));
    // The judge was never consulted
    assert_eq!(fx.judge_provider.calls(), 0);

    // A signed partial line with abort_reason "error"
    let partials = fx.store.partials.lock().unwrap();
    assert_eq!(partials.len(), 1);
    let doc: Value = serde_json::from_str(&partials[0]).unwrap();
    assert_eq!(doc["status"], "partial");
    assert_eq!(doc["abort_reason"], "error");
    assert_eq!(doc["schema_version"], "1.0");
    assert!(verify_partial_line(&partials[0], &TestSigner));
}

#[tokio::test]
async fn cost_gate_denial_makes_no_calls_and_no_partial() {
    let fx = fixture(
        happy_agent_scripts(),
        happy_judge_script(0.9),
        ConsentDecision::Denied,
        0.01, // force a prompt
    );

    let result = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), ConsultOptions::default())
        .await
        .unwrap();

    assert_eq!(result.status, ConsultStatus::Aborted);
    assert_eq!(result.abort_reason.as_deref(), Some("user_pulse_cancel"));
    assert_eq!(result.rounds_completed, 0);
    assert_eq!(fx.judge_provider.calls(), 0);
    assert!(fx.store.partials.lock().unwrap().is_empty());
    assert!(fx.store.checkpoints.lock().unwrap().is_empty());
}

#[tokio::test]
async fn early_termination_skips_cross_exam_and_verdict() {
    let fx = fixture(
        happy_agent_scripts(),
        happy_judge_script(0.97),
        ConsentDecision::Approved,
        100.0,
    );

    let result = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), ConsultOptions::default())
        .await
        .unwrap();

    assert_eq!(result.status, ConsultStatus::Complete);
    assert_eq!(result.rounds_completed, 2);
    assert_eq!(result.consensus, "Use OAuth 2.0");
    assert!((result.confidence - 0.97).abs() < 1e-9);
    assert!(result.early_termination_savings_usd.unwrap() > 0.0);
    // Only the synthesis judge call happened
    assert_eq!(fx.judge_provider.calls(), 1);
    assert!(result.responses.round3.is_empty());
    assert!(result.artifacts.round4.is_none());
}

#[tokio::test]
async fn in_flight_cost_overrun_aborts_before_verdict() {
    // Round 3 replies carry enormous token usage
    let scripts = vec![
        vec![
            ok(&position_json("Use OAuth 2.0", 0.9)),
            ok_with_usage("challenge sec", 200_000, 200_000),
        ],
        vec![
            ok(&position_json("Use OAuth 2.0", 0.85)),
            ok_with_usage("challenge arch", 200_000, 200_000),
        ],
        vec![
            ok(&position_json("Use OAuth 2.0", 0.8)),
            ok_with_usage("challenge prag", 200_000, 200_000),
        ],
    ];
    let fx = fixture(
        scripts,
        happy_judge_script(0.9),
        ConsentDecision::Approved,
        100.0,
    );

    let err = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), ConsultOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RunConsultError::CostExceeded { .. }));
    // Verdict never started: synthesis + cross-exam judge calls only
    assert_eq!(fx.judge_provider.calls(), 2);

    let partials = fx.store.partials.lock().unwrap();
    assert_eq!(partials.len(), 1);
    let doc: Value = serde_json::from_str(&partials[0]).unwrap();
    assert_eq!(doc["abort_reason"], "cost_exceeded_estimate");
    assert_eq!(doc["status"], "partial");
}

#[tokio::test]
async fn cost_overruns_allowed_by_option() {
    let scripts = vec![
        vec![
            ok_with_usage(&position_json("Use OAuth 2.0", 0.9), 200_000, 200_000),
            ok("challenge sec"),
        ],
        vec![ok(&position_json("Use OAuth 2.0", 0.85)), ok("challenge arch")],
        vec![ok(&position_json("Use OAuth 2.0", 0.8)), ok("challenge prag")],
    ];
    let fx = fixture(
        scripts,
        happy_judge_script(0.9),
        ConsentDecision::Approved,
        100.0,
    );

    let options = ConsultOptions {
        allow_cost_overruns: true,
        ..Default::default()
    };
    let result = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), options)
        .await
        .unwrap();

    assert_eq!(result.status, ConsultStatus::Complete);
    assert!(result.cost_exceeded);
    assert_eq!(result.rounds_completed, 4);
}

#[tokio::test]
async fn quick_mode_runs_only_round_one() {
    let fx = fixture(
        happy_agent_scripts(),
        happy_judge_script(0.9),
        ConsentDecision::Approved,
        100.0,
    );

    let options = ConsultOptions {
        max_rounds: 1,
        ..Default::default()
    };
    let result = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), options)
        .await
        .unwrap();

    assert_eq!(result.status, ConsultStatus::Complete);
    assert_eq!(result.rounds_completed, 1);
    assert!(result.responses.round2.is_none());
    assert!(result.responses.round3.is_empty());
    assert!(result.responses.round4.is_none());
    // Best-effort consensus from the top-confidence Round 1 artifact
    assert_eq!(result.consensus, "Use OAuth 2.0");
    assert!((result.confidence - 0.9).abs() < 1e-9);
    assert_eq!(fx.judge_provider.calls(), 0);
}

#[tokio::test]
async fn synthesis_judge_failure_is_fatal() {
    let fx = fixture(
        happy_agent_scripts(),
        vec![transport_err()],
        ConsentDecision::Approved,
        100.0,
    );

    let err = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), ConsultOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RunConsultError::SynthesisFailed(_)));
    let partials = fx.store.partials.lock().unwrap();
    assert_eq!(partials.len(), 1);
    let doc: Value = serde_json::from_str(&partials[0]).unwrap();
    assert_eq!(doc["abort_reason"], "error");
}

#[tokio::test]
async fn cross_exam_judge_failure_is_tolerated() {
    let fx = fixture(
        happy_agent_scripts(),
        vec![
            ok(&synthesis_json(0.9)),
            transport_err(), // round 3 judge fails
            ok(&verdict_json()),
        ],
        ConsentDecision::Approved,
        100.0,
    );

    let result = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), ConsultOptions::default())
        .await
        .unwrap();

    assert_eq!(result.status, ConsultStatus::Complete);
    assert_eq!(result.rounds_completed, 4);
    // The cross-exam artifact degraded to empty; concerns stayed empty
    assert!(result.artifacts.round3.as_ref().unwrap().is_empty());
    assert!(result.concerns.is_empty());
    assert_eq!(result.recommendation, "Use OAuth 2.0 with JWT");
}

#[tokio::test]
async fn verdict_extraction_failure_is_fatal() {
    let fx = fixture(
        happy_agent_scripts(),
        vec![
            ok(&synthesis_json(0.9)),
            ok(&cross_exam_judge_json()),
            ok("I cannot decide, sorry."),
        ],
        ConsentDecision::Approved,
        100.0,
    );

    let err = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), ConsultOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RunConsultError::VerdictFailed(_)));
    assert_eq!(fx.store.partials.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn cancellation_before_round_one_writes_partial() {
    let fx = fixture(
        happy_agent_scripts(),
        happy_judge_script(0.9),
        ConsentDecision::Approved,
        100.0,
    );

    let options = ConsultOptions::default();
    options.cancel.cancel();
    let result = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), options)
        .await
        .unwrap();

    assert_eq!(result.abort_reason.as_deref(), Some("user_pulse_cancel"));
    assert_eq!(result.rounds_completed, 0);
    assert_eq!(fx.store.partials.lock().unwrap().len(), 1);
    assert_eq!(fx.judge_provider.calls(), 0);
}

#[tokio::test]
async fn invalid_options_surface_validation_errors() {
    let fx = fixture(
        happy_agent_scripts(),
        happy_judge_script(0.9),
        ConsentDecision::Approved,
        100.0,
    );

    let options = ConsultOptions {
        confidence_threshold: 1.5,
        ..Default::default()
    };
    let err = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), options)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RunConsultError::Domain(ConsultError::Validation(_))
    ));

    let options = ConsultOptions {
        max_rounds: 0,
        ..Default::default()
    };
    let err = fx
        .orchestrator
        .consult(Question::new("Should we adopt OAuth 2.0?"), options)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RunConsultError::Domain(ConsultError::Validation(_))
    ));
}
