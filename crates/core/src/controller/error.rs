//! Error types for the job controller.

use thiserror::Error;
use uuid::Uuid;

use super::state::InvalidTransition;
use crate::stager::StagingError;

/// Errors returned by controller operations.
///
/// Job-level failures are not errors here: they end the job in the `Failed`
/// state and are reported through the snapshot and UI events.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A job is already active.
    #[error("A job is already running: {active_job_id}")]
    AlreadyRunning { active_job_id: Uuid },

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    /// Recovery of orphaned destinations failed.
    #[error("Recovery failed: {0}")]
    Recovery(#[from] StagingError),
}
