//! Listener contract between the engine and the job controller.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::types::EngineEvent;

/// Callbacks an engine invokes while running one transcode.
///
/// Callbacks may arrive on any thread. After one of `on_success`, `on_failure`
/// or `on_cancelled` the engine must not call the listener again.
pub trait CompressionListener: Send + Sync {
    fn on_start(&self);
    /// Raw progress in percent; values outside `[0, 100]` are tolerated.
    fn on_progress(&self, percent: f32);
    fn on_success(&self);
    fn on_failure(&self, message: String);
    fn on_cancelled(&self);
}

/// Per-job listener that forwards callbacks to the job task.
///
/// Dropping every clone of the listener closes the channel, which the job task
/// treats as an engine failure if no terminal callback arrived first.
#[derive(Debug)]
pub struct JobListener {
    job_id: Uuid,
    input_path: PathBuf,
    fallback_size: u64,
    started_at: OnceLock<Instant>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl JobListener {
    pub fn new(
        job_id: Uuid,
        input_path: PathBuf,
        fallback_size: u64,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            job_id,
            input_path,
            fallback_size,
            started_at: OnceLock::new(),
            events,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// When the engine first reported start.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at.get().copied()
    }

    fn send(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            debug!(job_id = %self.job_id, "Job task is gone, dropping engine event");
        }
    }
}

impl CompressionListener for JobListener {
    fn on_start(&self) {
        let now = Instant::now();
        if self.started_at.set(now).is_err() {
            debug!(job_id = %self.job_id, "Ignoring repeated start callback");
            return;
        }

        let original_size = std::fs::metadata(&self.input_path)
            .map(|m| m.len())
            .unwrap_or(self.fallback_size);
        self.send(EngineEvent::Started {
            at: now,
            original_size,
        });
    }

    fn on_progress(&self, percent: f32) {
        self.send(EngineEvent::Progress(percent));
    }

    fn on_success(&self) {
        self.send(EngineEvent::Succeeded);
    }

    fn on_failure(&self, message: String) {
        self.send(EngineEvent::Failed(message));
    }

    fn on_cancelled(&self) {
        self.send(EngineEvent::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_start_reports_input_size_once() {
        let mut file = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &[0u8; 1234]).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = JobListener::new(Uuid::new_v4(), file.path().to_path_buf(), 1, tx);

        listener.on_start();
        listener.on_start();

        match rx.try_recv().unwrap() {
            EngineEvent::Started { original_size, .. } => assert_eq!(original_size, 1234),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
        assert!(listener.started_at().is_some());
    }

    #[test]
    fn test_start_falls_back_to_resolved_size() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = JobListener::new(Uuid::new_v4(), PathBuf::from("/nonexistent/x.mp4"), 99, tx);

        listener.on_start();

        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::Started {
                original_size: 99,
                ..
            }
        ));
    }

    #[test]
    fn test_callbacks_forwarded_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = JobListener::new(Uuid::new_v4(), PathBuf::from("x"), 0, tx);

        listener.on_progress(12.5);
        listener.on_failure("codec exploded".to_string());

        assert_eq!(rx.try_recv().unwrap(), EngineEvent::Progress(12.5));
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Failed("codec exploded".to_string())
        );
    }

    #[test]
    fn test_dropped_listener_closes_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = JobListener::new(Uuid::new_v4(), PathBuf::from("x"), 0, tx);
        drop(listener);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = JobListener::new(Uuid::new_v4(), PathBuf::from("x"), 0, tx);
        drop(rx);
        listener.on_success();
    }
}
