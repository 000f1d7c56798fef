//! Events for the presentation layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::JobSnapshot;

/// Advisory event for the presentation layer.
///
/// Events are sent with `try_send`; a slow consumer loses events rather than
/// stalling the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    StateChanged {
        job_id: Uuid,
        snapshot: JobSnapshot,
    },
    OriginalSize {
        job_id: Uuid,
        bytes: u64,
        text: String,
    },
    Progress {
        job_id: Uuid,
        percent: u8,
    },
    FinalSize {
        job_id: Uuid,
        bytes: u64,
        text: String,
    },
    ElapsedTime {
        job_id: Uuid,
        millis: u64,
        text: String,
    },
    Failure {
        job_id: Uuid,
        message: String,
    },
    Cancelled {
        job_id: Uuid,
    },
    HideProgress {
        job_id: Uuid,
    },
}

impl UiEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            Self::StateChanged { job_id, .. }
            | Self::OriginalSize { job_id, .. }
            | Self::Progress { job_id, .. }
            | Self::FinalSize { job_id, .. }
            | Self::ElapsedTime { job_id, .. }
            | Self::Failure { job_id, .. }
            | Self::Cancelled { job_id }
            | Self::HideProgress { job_id } => *job_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_tagged() {
        let job_id = Uuid::new_v4();
        let json = serde_json::to_value(UiEvent::Progress {
            job_id,
            percent: 55,
        })
        .unwrap();

        assert_eq!(json["event"], "progress");
        assert_eq!(json["percent"], 55);
        assert_eq!(json["job_id"], job_id.to_string());
    }

    #[test]
    fn test_job_id_accessor() {
        let job_id = Uuid::new_v4();
        assert_eq!(UiEvent::HideProgress { job_id }.job_id(), job_id);
    }
}
