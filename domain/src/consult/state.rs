//! Consultation state machine
//!
//! Legal transitions form a single forward path; `Aborted` is a universal
//! sink reachable from any non-terminal state and carries its cause.

use crate::core::error::ConsultError;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a consultation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultState {
    Estimating,
    AwaitingConsent,
    Independent,
    Synthesis,
    CrossExam,
    Verdict,
    Complete,
    Aborted,
}

impl ConsultState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultState::Estimating => "estimating",
            ConsultState::AwaitingConsent => "awaiting_consent",
            ConsultState::Independent => "independent",
            ConsultState::Synthesis => "synthesis",
            ConsultState::CrossExam => "cross_exam",
            ConsultState::Verdict => "verdict",
            ConsultState::Complete => "complete",
            ConsultState::Aborted => "aborted",
        }
    }

    /// Position on the forward path; `Aborted` has none.
    fn ordinal(&self) -> Option<u8> {
        match self {
            ConsultState::Estimating => Some(0),
            ConsultState::AwaitingConsent => Some(1),
            ConsultState::Independent => Some(2),
            ConsultState::Synthesis => Some(3),
            ConsultState::CrossExam => Some(4),
            ConsultState::Verdict => Some(5),
            ConsultState::Complete => Some(6),
            ConsultState::Aborted => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConsultState::Complete | ConsultState::Aborted)
    }
}

impl std::fmt::Display for ConsultState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cause recorded when a consultation enters `Aborted`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    AllAgentsFailed,
    SynthesisFailed,
    CostExceeded,
    UserCancelled,
    Timeout,
    Error,
}

impl AbortReason {
    /// Wire string used in partial-result files.
    pub fn wire_str(&self) -> &'static str {
        match self {
            AbortReason::UserCancelled => "user_pulse_cancel",
            AbortReason::Timeout => "timeout",
            AbortReason::CostExceeded => "cost_exceeded_estimate",
            AbortReason::AllAgentsFailed | AbortReason::SynthesisFailed | AbortReason::Error => {
                "error"
            }
        }
    }
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AbortReason::AllAgentsFailed => "all-agents-failed",
            AbortReason::SynthesisFailed => "synthesis-failed",
            AbortReason::CostExceeded => "cost-exceeded",
            AbortReason::UserCancelled => "user-cancelled",
            AbortReason::Timeout => "timeout",
            AbortReason::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Enforces monotone forward transitions through the consultation states.
///
/// The machine starts in `Estimating`. Skipping states is allowed only
/// forward (early termination jumps Synthesis → Complete); moving backward
/// or leaving a terminal state fails with `InvalidTransition`.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: ConsultState,
    abort_reason: Option<AbortReason>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: ConsultState::Estimating,
            abort_reason: None,
        }
    }

    pub fn state(&self) -> ConsultState {
        self.state
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort_reason
    }

    /// Advance to `next`. Legal moves are the immediate successor on the
    /// forward path, plus the early-exit edges into `Complete` from the
    /// round states (early termination, truncated `max_rounds`). `Aborted`
    /// must be entered through [`StateMachine::abort`].
    pub fn transition(&mut self, next: ConsultState) -> Result<(), ConsultError> {
        let invalid = || ConsultError::InvalidTransition {
            from: self.state.to_string(),
            to: next.to_string(),
        };

        if self.state.is_terminal() || next == ConsultState::Aborted {
            return Err(invalid());
        }

        let early_exit = next == ConsultState::Complete
            && matches!(
                self.state,
                ConsultState::Independent | ConsultState::Synthesis | ConsultState::CrossExam
            );

        match (self.state.ordinal(), next.ordinal()) {
            (Some(from), Some(to)) if to == from + 1 || early_exit => {
                self.state = next;
                Ok(())
            }
            _ => Err(invalid()),
        }
    }

    /// Enter the `Aborted` sink, recording the cause. Frozen afterwards.
    pub fn abort(&mut self, reason: AbortReason) -> Result<(), ConsultError> {
        if self.state.is_terminal() {
            return Err(ConsultError::InvalidTransition {
                from: self.state.to_string(),
                to: ConsultState::Aborted.to_string(),
            });
        }
        self.state = ConsultState::Aborted;
        self.abort_reason = Some(reason);
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_forward_path() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.state(), ConsultState::Estimating);
        for next in [
            ConsultState::AwaitingConsent,
            ConsultState::Independent,
            ConsultState::Synthesis,
            ConsultState::CrossExam,
            ConsultState::Verdict,
            ConsultState::Complete,
        ] {
            sm.transition(next).unwrap();
            assert_eq!(sm.state(), next);
        }
    }

    #[test]
    fn test_backward_transition_rejected() {
        let mut sm = StateMachine::new();
        sm.transition(ConsultState::AwaitingConsent).unwrap();
        sm.transition(ConsultState::Independent).unwrap();
        let err = sm.transition(ConsultState::AwaitingConsent).unwrap_err();
        assert!(matches!(err, ConsultError::InvalidTransition { .. }));
        assert_eq!(sm.state(), ConsultState::Independent);
    }

    #[test]
    fn test_early_termination_jump_is_forward() {
        let mut sm = StateMachine::new();
        sm.transition(ConsultState::AwaitingConsent).unwrap();
        sm.transition(ConsultState::Independent).unwrap();
        sm.transition(ConsultState::Synthesis).unwrap();
        // Converge early termination skips CrossExam and Verdict
        sm.transition(ConsultState::Complete).unwrap();
        assert_eq!(sm.state(), ConsultState::Complete);
    }

    #[test]
    fn test_skipping_consent_rejected() {
        let mut sm = StateMachine::new();
        let err = sm.transition(ConsultState::Independent).unwrap_err();
        assert!(matches!(err, ConsultError::InvalidTransition { .. }));
        assert_eq!(sm.state(), ConsultState::Estimating);
    }

    #[test]
    fn test_complete_not_reachable_before_rounds() {
        let mut sm = StateMachine::new();
        sm.transition(ConsultState::AwaitingConsent).unwrap();
        assert!(sm.transition(ConsultState::Complete).is_err());
    }

    #[test]
    fn test_abort_from_any_state_carries_reason() {
        let mut sm = StateMachine::new();
        sm.abort(AbortReason::UserCancelled).unwrap();
        assert_eq!(sm.state(), ConsultState::Aborted);
        assert_eq!(sm.abort_reason(), Some(AbortReason::UserCancelled));
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        let mut sm = StateMachine::new();
        sm.abort(AbortReason::Error).unwrap();
        assert!(sm.transition(ConsultState::Independent).is_err());
        assert!(sm.abort(AbortReason::Timeout).is_err());
        // The original reason survives
        assert_eq!(sm.abort_reason(), Some(AbortReason::Error));

        let mut sm = StateMachine::new();
        sm.transition(ConsultState::AwaitingConsent).unwrap();
        sm.transition(ConsultState::Independent).unwrap();
        sm.transition(ConsultState::Synthesis).unwrap();
        sm.transition(ConsultState::Complete).unwrap();
        assert!(sm.transition(ConsultState::Aborted).is_err());
        assert!(sm.abort(AbortReason::Error).is_err());
    }

    #[test]
    fn test_wire_strings() {
        assert_eq!(AbortReason::UserCancelled.wire_str(), "user_pulse_cancel");
        assert_eq!(AbortReason::CostExceeded.wire_str(), "cost_exceeded_estimate");
        assert_eq!(AbortReason::Timeout.wire_str(), "timeout");
        assert_eq!(AbortReason::AllAgentsFailed.wire_str(), "error");
        assert_eq!(AbortReason::SynthesisFailed.wire_str(), "error");
    }
}
