//! Job state machine.
//!
//! ```text
//! Idle -> Resolving -> Staging -> Compressing -> Finalizing -> Succeeded
//!
//! Resolving, Staging, Compressing and Finalizing can end in Failed.
//! Resolving and Staging move to Cancelled on a cancel request; Compressing
//! forwards the request to the engine and waits for it to report.
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Resolving,
    Staging,
    Compressing,
    Finalizing,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns true while a job occupies the controller.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle) && !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Staging => "staging",
            Self::Compressing => "compressing",
            Self::Finalizing => "finalizing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Submit,
    Resolved,
    ResolutionFailed,
    Allocated,
    StagingFailed,
    EngineStarted,
    EngineProgress,
    EngineSucceeded,
    EngineFailed,
    EngineCancelled,
    Finalized,
    FinalizeFailed,
    Cancel,
}

/// Result of applying a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state changed.
    Moved { from: JobState, to: JobState },
    /// Valid in this state, but the state stays as it is.
    Unchanged,
    /// The trigger has no effect here (terminal state or late cancel).
    Ignored,
    /// The cancel request must be forwarded to the engine.
    CancelForwarded,
}

/// A trigger that makes no sense in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid transition: {trigger:?} while {state}")]
pub struct InvalidTransition {
    pub state: JobState,
    pub trigger: Trigger,
}

/// Pure transition table for one job.
#[derive(Debug, Clone, Default)]
pub struct JobStateMachine {
    state: JobState,
}

impl JobStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Applies `trigger`, updating the state if it moves.
    pub fn apply(&mut self, trigger: Trigger) -> Result<Transition, InvalidTransition> {
        use JobState::*;
        use Trigger::*;

        let from = self.state;
        if from.is_terminal() {
            return Ok(Transition::Ignored);
        }

        let to = match (from, trigger) {
            (Idle, Cancel) | (Finalizing, Cancel) => return Ok(Transition::Ignored),
            (Compressing, Cancel) => return Ok(Transition::CancelForwarded),
            (Resolving | Staging, Cancel) => Cancelled,

            (Idle, Submit) => Resolving,
            (Resolving, Resolved) => Staging,
            (Resolving, ResolutionFailed) => Failed,
            (Staging, Allocated) => Compressing,
            (Staging, StagingFailed) => Failed,
            (Compressing, EngineStarted | EngineProgress) => return Ok(Transition::Unchanged),
            (Compressing, EngineSucceeded) => Finalizing,
            (Compressing, EngineFailed) => Failed,
            (Compressing, EngineCancelled) => Cancelled,
            (Finalizing, Finalized) => Succeeded,
            (Finalizing, FinalizeFailed) => Failed,

            _ => return Err(InvalidTransition { state: from, trigger }),
        };

        self.state = to;
        Ok(Transition::Moved { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_in(path: &[Trigger]) -> JobStateMachine {
        let mut machine = JobStateMachine::new();
        for trigger in path {
            machine.apply(*trigger).unwrap();
        }
        machine
    }

    const TO_COMPRESSING: &[Trigger] = &[Trigger::Submit, Trigger::Resolved, Trigger::Allocated];

    #[test]
    fn test_happy_path() {
        let mut machine = machine_in(TO_COMPRESSING);
        assert_eq!(machine.state(), JobState::Compressing);
        assert_eq!(
            machine.apply(Trigger::EngineStarted).unwrap(),
            Transition::Unchanged
        );
        assert_eq!(
            machine.apply(Trigger::EngineSucceeded).unwrap(),
            Transition::Moved {
                from: JobState::Compressing,
                to: JobState::Finalizing
            }
        );
        machine.apply(Trigger::Finalized).unwrap();
        assert_eq!(machine.state(), JobState::Succeeded);
    }

    #[test]
    fn test_failures() {
        let mut machine = machine_in(&[Trigger::Submit]);
        machine.apply(Trigger::ResolutionFailed).unwrap();
        assert_eq!(machine.state(), JobState::Failed);

        let mut machine = machine_in(&[Trigger::Submit, Trigger::Resolved]);
        machine.apply(Trigger::StagingFailed).unwrap();
        assert_eq!(machine.state(), JobState::Failed);

        let mut machine = machine_in(TO_COMPRESSING);
        machine.apply(Trigger::EngineFailed).unwrap();
        assert_eq!(machine.state(), JobState::Failed);

        let mut machine = machine_in(TO_COMPRESSING);
        machine.apply(Trigger::EngineSucceeded).unwrap();
        machine.apply(Trigger::FinalizeFailed).unwrap();
        assert_eq!(machine.state(), JobState::Failed);
    }

    #[test]
    fn test_cancel_by_state() {
        assert_eq!(
            JobStateMachine::new().apply(Trigger::Cancel).unwrap(),
            Transition::Ignored
        );

        let mut machine = machine_in(&[Trigger::Submit]);
        machine.apply(Trigger::Cancel).unwrap();
        assert_eq!(machine.state(), JobState::Cancelled);

        let mut machine = machine_in(&[Trigger::Submit, Trigger::Resolved]);
        machine.apply(Trigger::Cancel).unwrap();
        assert_eq!(machine.state(), JobState::Cancelled);

        let mut machine = machine_in(TO_COMPRESSING);
        assert_eq!(
            machine.apply(Trigger::Cancel).unwrap(),
            Transition::CancelForwarded
        );
        assert_eq!(machine.state(), JobState::Compressing);
        machine.apply(Trigger::EngineCancelled).unwrap();
        assert_eq!(machine.state(), JobState::Cancelled);

        let mut machine = machine_in(&[
            Trigger::Submit,
            Trigger::Resolved,
            Trigger::Allocated,
            Trigger::EngineSucceeded,
        ]);
        assert_eq!(machine.apply(Trigger::Cancel).unwrap(), Transition::Ignored);
        assert_eq!(machine.state(), JobState::Finalizing);
    }

    #[test]
    fn test_terminal_states_ignore_everything() {
        let mut machine = machine_in(&[Trigger::Submit, Trigger::ResolutionFailed]);
        for trigger in [
            Trigger::Submit,
            Trigger::Cancel,
            Trigger::EngineSucceeded,
            Trigger::Finalized,
        ] {
            assert_eq!(machine.apply(trigger).unwrap(), Transition::Ignored);
            assert_eq!(machine.state(), JobState::Failed);
        }
    }

    #[test]
    fn test_invalid_transitions() {
        let mut machine = JobStateMachine::new();
        assert_eq!(
            machine.apply(Trigger::Allocated),
            Err(InvalidTransition {
                state: JobState::Idle,
                trigger: Trigger::Allocated
            })
        );

        let mut machine = machine_in(&[Trigger::Submit]);
        assert!(machine.apply(Trigger::Submit).is_err());
        assert!(machine.apply(Trigger::EngineProgress).is_err());
        assert_eq!(machine.state(), JobState::Resolving);
    }

    #[test]
    fn test_state_flags() {
        assert!(!JobState::Idle.is_active());
        assert!(JobState::Compressing.is_active());
        assert!(JobState::Cancelled.is_terminal());
        assert_eq!(JobState::Finalizing.to_string(), "finalizing");
    }
}
