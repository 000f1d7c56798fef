//! Job controller implementation.
//!
//! One job runs at a time, on its own task. `submit` and `cancel` are
//! synchronous and may be called from any thread: `submit` installs the job
//! slot and spawns the task, `cancel` only trips the job's token. Everything
//! else, including every state change, happens on the job task.
//!
//! A supervisor awaits each job task. If the task panics, the supervisor rolls
//! back the last known destination, reports the job as failed and frees the
//! slot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::ControllerConfig;
use super::error::ControllerError;
use super::events::UiEvent;
use super::format::{format_elapsed, format_size};
use super::state::{JobState, JobStateMachine, Transition, Trigger};
use super::types::{FailureKind, JobFailure, JobSnapshot, SubmittedJob};
use crate::engine::{
    EngineEvent, EngineOptions, EngineRequest, JobListener, QualityConfig, TranscodeEngine,
};
use crate::metrics;
use crate::progress::ProgressGate;
use crate::source::{ResolutionError, ResolvedInput, SourceReference, SourceResolver};
use crate::stager::{Destination, DestinationStager};

/// The job occupying the controller.
struct ActiveJob {
    id: Uuid,
    snapshot: JobSnapshot,
    cancel: CancellationToken,
}

type Slot = Arc<Mutex<Option<ActiveJob>>>;

fn lock_slot(slot: &Slot) -> MutexGuard<'_, Option<ActiveJob>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives one job at a time through resolve, stage, compress and finalize.
pub struct JobController {
    config: ControllerConfig,
    resolver: Arc<dyn SourceResolver>,
    stager: Arc<dyn DestinationStager>,
    engine: Arc<dyn TranscodeEngine>,
    runtime: Handle,
    slot: Slot,
    ui_tx: mpsc::Sender<UiEvent>,
}

impl JobController {
    /// Creates a controller whose jobs run on `runtime`.
    ///
    /// Returns the receiving end of the UI event channel.
    pub fn new(
        config: ControllerConfig,
        resolver: Arc<dyn SourceResolver>,
        stager: Arc<dyn DestinationStager>,
        engine: Arc<dyn TranscodeEngine>,
        runtime: Handle,
    ) -> (Self, mpsc::Receiver<UiEvent>) {
        let (ui_tx, ui_rx) = mpsc::channel(config.ui_buffer.max(1));

        info!(
            resolver = resolver.name(),
            stager = stager.name(),
            engine = engine.name(),
            "Job controller ready"
        );

        let controller = Self {
            config,
            resolver,
            stager,
            engine,
            runtime,
            slot: Arc::new(Mutex::new(None)),
            ui_tx,
        };
        (controller, ui_rx)
    }

    /// Starts a job for `source`.
    ///
    /// Fails with [`ControllerError::AlreadyRunning`] if a job is active; the
    /// active job is not affected.
    pub fn submit(
        &self,
        source: SourceReference,
        quality: QualityConfig,
        options: EngineOptions,
    ) -> Result<SubmittedJob, ControllerError> {
        let mut slot = lock_slot(&self.slot);

        if let Some(active) = slot.as_ref() {
            metrics::JOBS_REJECTED.inc();
            warn!(active_job_id = %active.id, source = %source, "Rejecting submit, a job is already running");
            return Err(ControllerError::AlreadyRunning {
                active_job_id: active.id,
            });
        }

        let job_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let mut machine = JobStateMachine::new();
        machine.apply(Trigger::Submit)?;

        let mut snapshot = JobSnapshot::new(job_id, source, quality, options);
        snapshot.state = machine.state();

        *slot = Some(ActiveJob {
            id: job_id,
            snapshot: snapshot.clone(),
            cancel: cancel.clone(),
        });
        drop(slot);

        metrics::JOBS_SUBMITTED.inc();
        info!(job_id = %job_id, source = %snapshot.source, "Job submitted");

        let (done_tx, done_rx) = oneshot::channel();
        let supervisor = Supervisor {
            job_id,
            stager: Arc::clone(&self.stager),
            slot: Arc::clone(&self.slot),
            ui_tx: self.ui_tx.clone(),
        };
        let run = JobRun {
            config: self.config.clone(),
            resolver: Arc::clone(&self.resolver),
            stager: Arc::clone(&self.stager),
            engine: Arc::clone(&self.engine),
            slot: Arc::clone(&self.slot),
            ui_tx: self.ui_tx.clone(),
            cancel,
            machine,
            snapshot,
            submitted: Instant::now(),
            abandoned_engine: None,
        };
        let task = self.runtime.spawn(run.execute());
        self.runtime.spawn(supervisor.watch(task, done_tx));

        Ok(SubmittedJob {
            job_id,
            completion: done_rx,
        })
    }

    /// Requests cancellation of the active job.
    ///
    /// Returns false if no job is active. Safe to call repeatedly.
    pub fn cancel(&self) -> bool {
        let slot = lock_slot(&self.slot);
        match slot.as_ref() {
            Some(active) => {
                if !active.cancel.is_cancelled() {
                    info!(job_id = %active.id, state = %active.snapshot.state, "Cancellation requested");
                }
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Snapshot of the active job, if any.
    pub fn snapshot(&self) -> Option<JobSnapshot> {
        lock_slot(&self.slot).as_ref().map(|a| a.snapshot.clone())
    }

    /// State of the active job, or `Idle`.
    pub fn state(&self) -> JobState {
        lock_slot(&self.slot)
            .as_ref()
            .map(|a| a.snapshot.state)
            .unwrap_or(JobState::Idle)
    }

    /// Purges destinations orphaned by an earlier process.
    ///
    /// Refused while a job is active.
    pub async fn recover(&self) -> Result<usize, ControllerError> {
        if let Some(active) = lock_slot(&self.slot).as_ref() {
            return Err(ControllerError::AlreadyRunning {
                active_job_id: active.id,
            });
        }
        Ok(self.stager.recover().await?)
    }
}

/// Rolls back `destination` and records the outcome.
async fn rollback_destination(stager: &dyn DestinationStager, job_id: Uuid, destination: &Destination) {
    let result = match stager.rollback(destination).await {
        Ok(true) => {
            info!(job_id = %job_id, path = %destination.path.display(), "Rolled back destination");
            "deleted"
        }
        Ok(false) => {
            debug!(job_id = %job_id, path = %destination.path.display(), "Destination already gone");
            "absent"
        }
        Err(e) => {
            error!(job_id = %job_id, path = %destination.path.display(), error = %e, "Rollback failed");
            "error"
        }
    };
    metrics::ROLLBACKS
        .with_label_values(&[stager.name(), result])
        .inc();
}

/// Watches a job task and cleans up after it if it dies.
struct Supervisor {
    job_id: Uuid,
    stager: Arc<dyn DestinationStager>,
    slot: Slot,
    ui_tx: mpsc::Sender<UiEvent>,
}

impl Supervisor {
    async fn watch(self, task: JoinHandle<JobSnapshot>, done: oneshot::Sender<JobSnapshot>) {
        let snapshot = match task.await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => self.recover_from(e).await,
        };

        if let Some(snapshot) = snapshot {
            let _ = done.send(snapshot);
        }
    }

    async fn recover_from(&self, err: JoinError) -> Option<JobSnapshot> {
        let job_id = self.job_id;
        let mut snapshot = lock_slot(&self.slot)
            .as_ref()
            .filter(|a| a.id == job_id)
            .map(|a| a.snapshot.clone())?;

        error!(job_id = %job_id, state = %snapshot.state, error = %err, "Job task died");

        if let Some(destination) = &snapshot.destination {
            rollback_destination(self.stager.as_ref(), job_id, destination).await;
        }

        let message = format!("job task aborted: {}", err);
        snapshot.state = JobState::Failed;
        snapshot.finished_at = Some(Utc::now());
        snapshot.failure = Some(JobFailure {
            kind: FailureKind::Internal,
            message: message.clone(),
        });

        for event in [
            UiEvent::StateChanged {
                job_id,
                snapshot: snapshot.clone(),
            },
            UiEvent::Failure { job_id, message },
        ] {
            if let Err(e) = self.ui_tx.try_send(event) {
                debug!(job_id = %job_id, "Dropping UI event: {}", e);
            }
        }

        metrics::JOBS_FINISHED
            .with_label_values(&[JobState::Failed.as_str()])
            .inc();

        let mut slot = lock_slot(&self.slot);
        if slot.as_ref().is_some_and(|a| a.id == job_id) {
            *slot = None;
        }
        Some(snapshot)
    }
}

/// State owned by one job task.
struct JobRun {
    config: ControllerConfig,
    resolver: Arc<dyn SourceResolver>,
    stager: Arc<dyn DestinationStager>,
    engine: Arc<dyn TranscodeEngine>,
    slot: Slot,
    ui_tx: mpsc::Sender<UiEvent>,
    cancel: CancellationToken,
    machine: JobStateMachine,
    snapshot: JobSnapshot,
    submitted: Instant,
    /// Events of an engine that outlived the cancel grace period.
    abandoned_engine: Option<mpsc::UnboundedReceiver<EngineEvent>>,
}

impl JobRun {
    fn job_id(&self) -> Uuid {
        self.snapshot.job_id
    }

    async fn execute(mut self) -> JobSnapshot {
        self.publish();

        if let Some(input) = self.resolve().await {
            if let Some(destination) = self.allocate(&input).await {
                if let Some(started) = self.compress(&input, destination).await {
                    self.finalize(started).await;
                }
            }
        }

        self.finish().await
    }

    async fn resolve(&mut self) -> Option<ResolvedInput> {
        let result = self
            .resolver
            .resolve(&self.snapshot.source, &self.cancel)
            .await;

        match result {
            Ok(_) | Err(ResolutionError::Cancelled) if self.cancel.is_cancelled() => {
                self.apply(Trigger::Cancel);
                None
            }
            Ok(input) => {
                debug!(job_id = %self.job_id(), path = %input.path.display(), size_bytes = input.size_bytes, "Source resolved");
                self.snapshot.resolved_input = Some(input.clone());
                self.apply(Trigger::Resolved);
                Some(input)
            }
            Err(e) => {
                self.fail(Trigger::ResolutionFailed, FailureKind::Resolution, e.to_string());
                None
            }
        }
    }

    async fn allocate(&mut self, input: &ResolvedInput) -> Option<Destination> {
        let result = self
            .stager
            .allocate(&self.snapshot.quality, input, &self.cancel)
            .await;

        match result {
            Ok(destination) => {
                self.snapshot.destination = Some(destination.clone());
                if self.cancel.is_cancelled() {
                    self.apply(Trigger::Cancel);
                    return None;
                }
                self.apply(Trigger::Allocated);
                Some(destination)
            }
            Err(e) if e.is_cancelled() => {
                self.apply(Trigger::Cancel);
                None
            }
            Err(e) => {
                self.fail(Trigger::StagingFailed, FailureKind::Staging, e.to_string());
                None
            }
        }
    }

    /// Runs the engine until it reports an outcome.
    ///
    /// Returns the instant compression started if the engine succeeded.
    async fn compress(&mut self, input: &ResolvedInput, destination: Destination) -> Option<Instant> {
        let job_id = self.job_id();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let listener = Arc::new(JobListener::new(
            job_id,
            input.path.clone(),
            input.size_bytes,
            events_tx,
        ));

        let request = EngineRequest {
            input_path: input.path.clone(),
            output_path: destination.path.clone(),
            quality: self.snapshot.quality,
            options: self.snapshot.options,
        };

        let mut started = Instant::now();
        let handle = self.engine.start(request, listener);
        info!(job_id = %job_id, engine_job = %handle.id, "Engine started");

        let cancel = self.cancel.clone();
        let mut gate = ProgressGate::new();
        let mut cancel_forwarded = false;
        let grace = tokio::time::sleep(self.config.cancel_grace());
        tokio::pin!(grace);

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled(), if !cancel_forwarded => {
                    cancel_forwarded = true;
                    if self.apply(Trigger::Cancel) == Some(Transition::CancelForwarded) {
                        self.engine.cancel(&handle);
                        grace
                            .as_mut()
                            .reset(tokio::time::Instant::now() + self.config.cancel_grace());
                    }
                    continue;
                }
                _ = &mut grace, if cancel_forwarded => {
                    warn!(job_id = %job_id, grace_ms = self.config.cancel_grace_ms, "Engine did not acknowledge cancellation, abandoning it");
                    self.apply(Trigger::EngineCancelled);
                    self.abandoned_engine = Some(events_rx);
                    return None;
                }
                event = events_rx.recv() => event,
            };

            match event {
                Some(EngineEvent::Started { at, original_size }) => {
                    started = at;
                    self.snapshot.started_at = Some(Utc::now());
                    self.snapshot.original_size = Some(original_size);
                    self.apply(Trigger::EngineStarted);
                    self.emit(UiEvent::OriginalSize {
                        job_id,
                        bytes: original_size,
                        text: format_size(original_size),
                    });
                }
                Some(EngineEvent::Progress(percent)) => {
                    if let Some(sample) = gate.offer(percent) {
                        self.snapshot.progress = Some(sample.percent);
                        self.apply(Trigger::EngineProgress);
                        self.emit(UiEvent::Progress {
                            job_id,
                            percent: sample.percent,
                        });
                    }
                }
                Some(EngineEvent::Succeeded) if cancel.is_cancelled() => {
                    info!(job_id = %job_id, "Engine succeeded after cancellation was requested, discarding output");
                    self.apply(Trigger::EngineCancelled);
                    return None;
                }
                Some(EngineEvent::Succeeded) => {
                    self.apply(Trigger::EngineSucceeded);
                    return Some(started);
                }
                Some(EngineEvent::Failed(message)) => {
                    self.fail(Trigger::EngineFailed, FailureKind::Engine, message);
                    return None;
                }
                Some(EngineEvent::Cancelled) => {
                    self.apply(Trigger::EngineCancelled);
                    return None;
                }
                None => {
                    self.fail(
                        Trigger::EngineFailed,
                        FailureKind::Engine,
                        "engine stopped without reporting an outcome".to_string(),
                    );
                    return None;
                }
            }
        }
    }

    async fn finalize(&mut self, started: Instant) {
        let job_id = self.job_id();
        let Some(mut destination) = self.snapshot.destination.clone() else {
            self.fail(
                Trigger::FinalizeFailed,
                FailureKind::Finalize,
                "no destination to finalize".to_string(),
            );
            return;
        };

        let output_size = match tokio::fs::metadata(&destination.path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                self.fail(
                    Trigger::FinalizeFailed,
                    FailureKind::Finalize,
                    format!("cannot read output {}: {}", destination.path.display(), e),
                );
                return;
            }
        };

        if let Err(e) = self.stager.finalize(&mut destination).await {
            self.fail(Trigger::FinalizeFailed, FailureKind::Finalize, e.to_string());
            return;
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;

        self.snapshot.destination = Some(destination);
        self.snapshot.output_size = Some(output_size);
        self.snapshot.elapsed_ms = Some(elapsed_ms);
        self.snapshot.progress = self.snapshot.progress.or(Some(100));
        self.apply(Trigger::Finalized);

        self.emit(UiEvent::FinalSize {
            job_id,
            bytes: output_size,
            text: format_size(output_size),
        });
        self.emit(UiEvent::ElapsedTime {
            job_id,
            millis: elapsed_ms,
            text: format_elapsed(elapsed_ms),
        });

        let ui_tx = self.ui_tx.clone();
        let delay = self.config.ui_hide_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = ui_tx.try_send(UiEvent::HideProgress { job_id });
        });
    }

    /// Rolls back if needed, reports the outcome and frees the controller.
    async fn finish(mut self) -> JobSnapshot {
        let job_id = self.job_id();
        let state = self.machine.state();

        if !state.is_terminal() {
            // Only reachable through an invalid transition, which was logged.
            error!(job_id = %job_id, state = %state, "Job task ended in a non-terminal state");
        }

        if state != JobState::Succeeded {
            if let Some(destination) = self.snapshot.destination.clone() {
                rollback_destination(self.stager.as_ref(), job_id, &destination).await;
                if let Some(events) = self.abandoned_engine.take() {
                    self.roll_back_when_engine_stops(events, destination);
                }
            }
        }

        if state == JobState::Cancelled {
            self.emit(UiEvent::Cancelled { job_id });
        }

        metrics::JOBS_FINISHED
            .with_label_values(&[state.as_str()])
            .inc();
        metrics::JOB_DURATION
            .with_label_values(&[state.as_str()])
            .observe(self.submitted.elapsed().as_secs_f64());

        self.snapshot.finished_at = Some(Utc::now());

        {
            let mut slot = lock_slot(&self.slot);
            if slot.as_ref().is_some_and(|a| a.id == job_id) {
                *slot = None;
            }
        }

        info!(job_id = %job_id, state = %state, "Job finished");
        self.snapshot
    }

    /// Rolls `destination` back again once an abandoned engine stops.
    ///
    /// The engine may still write its output after the first rollback.
    fn roll_back_when_engine_stops(
        &self,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
        destination: Destination,
    ) {
        let job_id = self.job_id();
        let stager = Arc::clone(&self.stager);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if event.is_terminal() {
                    debug!(job_id = %job_id, ?event, "Abandoned engine finished");
                    break;
                }
            }
            rollback_destination(stager.as_ref(), job_id, &destination).await;
        });
    }

    /// Applies a trigger and publishes the new snapshot.
    ///
    /// Invalid transitions are logged and leave the state as it was.
    fn apply(&mut self, trigger: Trigger) -> Option<Transition> {
        match self.machine.apply(trigger) {
            Ok(transition) => {
                self.snapshot.state = self.machine.state();
                match transition {
                    Transition::Moved { from, to } => {
                        debug!(job_id = %self.job_id(), %from, %to, "Job state changed");
                        self.publish();
                    }
                    Transition::Unchanged => self.sync_slot(),
                    Transition::Ignored | Transition::CancelForwarded => {}
                }
                Some(transition)
            }
            Err(e) => {
                error!(job_id = %self.job_id(), error = %e, "Rejected job transition");
                None
            }
        }
    }

    fn fail(&mut self, trigger: Trigger, kind: FailureKind, message: String) {
        warn!(job_id = %self.job_id(), ?kind, message = %message, "Job failed");
        self.snapshot.failure = Some(JobFailure {
            kind,
            message: message.clone(),
        });
        if self.apply(trigger).is_some() {
            self.emit(UiEvent::Failure {
                job_id: self.job_id(),
                message,
            });
        }
    }

    fn sync_slot(&self) {
        let mut slot = lock_slot(&self.slot);
        if let Some(active) = slot.as_mut().filter(|a| a.id == self.snapshot.job_id) {
            active.snapshot = self.snapshot.clone();
        }
    }

    fn publish(&self) {
        self.sync_slot();
        self.emit(UiEvent::StateChanged {
            job_id: self.job_id(),
            snapshot: self.snapshot.clone(),
        });
    }

    fn emit(&self, event: UiEvent) {
        if let Err(e) = self.ui_tx.try_send(event) {
            debug!(job_id = %self.job_id(), "Dropping UI event: {}", e);
        }
    }
}
