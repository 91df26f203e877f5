//! Application layer for conclave
//!
//! Ports to external collaborators, the process-wide event bus, admission
//! control, the hedged request manager, partial-result persistence, and
//! the consult orchestrator use case.

pub mod cost_gate;
pub mod events;
pub mod hedge;
pub mod partial;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use cost_gate::{non_interactive, Admission, CostGate, NON_INTERACTIVE_ENV};
pub use events::{topics, ConsultEvent, EventBus};
pub use hedge::{
    HealthMap, HedgeError, HedgedRequestManager, ProviderEntry, ProviderRegistry, ProviderTier,
    DEFAULT_HEDGE_DEADLINE,
};
pub use partial::{generate_resume_token, verify_partial_line, PartialResultManager};
pub use ports::{
    config_store::{ConfigStore, MemoryConfigStore, DEFAULT_ALWAYS_ALLOW_UNDER},
    consent::{AutoApprove, AutoFallback, ConsentDecision, ConsentPort, FallbackDecision,
              FallbackPort},
    provider::{ChatReply, ChatUsage, ProviderChat, ProviderError},
    run_store::{NullRunStore, RunStore},
    signer::{NullSigner, Signer},
};
pub use use_cases::run_consult::{ConsultOptions, ConsultOrchestrator, RunConsultError};
