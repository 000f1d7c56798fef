//! Job snapshot types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::state::JobState;
use crate::engine::{EngineOptions, QualityConfig};
use crate::source::{ResolvedInput, SourceReference};
use crate::stager::Destination;

/// Stage a job failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Resolution,
    Staging,
    Engine,
    Finalize,
    /// The job task itself died.
    Internal,
}

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    /// Error message; engine messages are passed through verbatim.
    pub message: String,
}

/// Read-only view of a job, cloned after every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub source: SourceReference,
    pub quality: QualityConfig,
    pub options: EngineOptions,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_input: Option<ResolvedInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
    /// Input size reported when the engine started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    /// Last forwarded progress percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
}

impl JobSnapshot {
    pub(crate) fn new(
        job_id: Uuid,
        source: SourceReference,
        quality: QualityConfig,
        options: EngineOptions,
    ) -> Self {
        Self {
            job_id,
            source,
            quality,
            options,
            state: JobState::Idle,
            resolved_input: None,
            destination: None,
            original_size: None,
            progress: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            output_size: None,
            elapsed_ms: None,
            failure: None,
        }
    }
}

/// A job accepted by the controller.
#[derive(Debug)]
pub struct SubmittedJob {
    pub job_id: Uuid,
    pub(crate) completion: oneshot::Receiver<JobSnapshot>,
}

impl SubmittedJob {
    /// Waits for the job to reach a terminal state and returns its final snapshot.
    ///
    /// Returns `None` if the job task was dropped before finishing, e.g. on
    /// runtime shutdown.
    pub async fn wait(self) -> Option<JobSnapshot> {
        self.completion.await.ok()
    }
}
