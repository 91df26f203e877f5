//! Domain layer for conclave
//!
//! This crate contains the core business logic of the consultation
//! pipeline: the round state machine, typed artifacts and their extraction,
//! the cost model, and the two debate mode strategies. It has no
//! dependencies on infrastructure or presentation concerns.

pub mod agent;
pub mod consult;
pub mod core;
pub mod cost;
pub mod mode;

// Re-export commonly used types
pub use agent::{Agent, AgentId};
pub use consult::{
    artifact::{
        Challenge, ConsensusPoint, CrossExamArtifact, Dissent, IndependentArtifact, Rebuttal,
        Severity, SynthesisArtifact, Tension, VerdictArtifact, Viewpoint,
    },
    response::{AgentResponse, TokenUsage},
    result::{
        ConsultStatus, ConsultationResult, CostReport, Perspective, RoundArtifacts,
        RoundResponses, SCHEMA_VERSION,
    },
    state::{AbortReason, ConsultState, StateMachine},
};
pub use core::{
    error::ConsultError,
    message::{Message, Role},
    question::Question,
};
pub use cost::{
    estimator::{actual_cost, early_termination_savings, estimate, CostEstimate, TOKENS_PER_ROUND},
    pricing::ModelPricing,
};
pub use mode::{ConvergeMode, DebateMode, ExploreMode, ModeStrategy, PromptVersions};
