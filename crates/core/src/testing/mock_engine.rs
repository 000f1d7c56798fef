//! Mock transcode engine for testing.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::{CompressionListener, EngineJobHandle, EngineRequest, TranscodeEngine};

/// One scripted engine action.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineStep {
    /// Calls `on_start`.
    Start,
    /// Calls `on_progress` with a raw percentage.
    Progress(f32),
    /// Sleeps, waking early on cancellation.
    Pause(Duration),
    /// Blocks until cancellation is requested.
    WaitForCancel,
    /// Writes `output_bytes` to the output path, then calls `on_success`.
    Succeed { output_bytes: u64 },
    /// Removes the output path, then calls `on_success`.
    SucceedWithoutOutput,
    /// Calls `on_failure`.
    Fail(String),
    /// Stops without a terminal callback, dropping the listener.
    DropListener,
}

/// Mock implementation of the TranscodeEngine trait.
///
/// Runs a script of [`EngineStep`]s on a plain thread, so callbacks arrive off
/// the async runtime the way a real engine's would. Between steps a pending
/// cancellation is answered with `on_cancelled`, unless the engine was told to
/// ignore cancellations.
///
/// # Example
///
/// ```rust,ignore
/// use squeezer_core::testing::{EngineStep, MockEngine};
///
/// let engine = MockEngine::new();
/// engine.set_script(vec![
///     EngineStep::Start,
///     EngineStep::Progress(50.0),
///     EngineStep::Succeed { output_bytes: 1024 },
/// ]);
/// ```
#[derive(Debug)]
pub struct MockEngine {
    script: Arc<Mutex<Vec<EngineStep>>>,
    ignore_cancel: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<EngineRequest>>>,
    cancel_calls: Arc<AtomicUsize>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a mock engine that reports start, a few progress steps and success.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(vec![
                EngineStep::Start,
                EngineStep::Progress(25.0),
                EngineStep::Progress(50.0),
                EngineStep::Progress(75.0),
                EngineStep::Progress(100.0),
                EngineStep::Succeed { output_bytes: 1024 },
            ])),
            ignore_cancel: Arc::new(AtomicBool::new(false)),
            requests: Arc::new(Mutex::new(Vec::new())),
            cancel_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the script used by subsequent `start` calls.
    pub fn set_script(&self, steps: Vec<EngineStep>) {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) = steps;
    }

    /// Make the engine act as if it never saw cancellation requests.
    pub fn set_ignore_cancel(&self, ignore: bool) {
        self.ignore_cancel.store(ignore, Ordering::SeqCst);
    }

    /// Get all requests passed to `start`.
    pub fn recorded_requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of `start` calls.
    pub fn start_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of `cancel` calls.
    pub fn cancel_count(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    fn run_script(
        steps: Vec<EngineStep>,
        ignore_cancel: bool,
        token: CancellationToken,
        output_path: PathBuf,
        listener: Arc<dyn CompressionListener>,
    ) {
        let cancelled = || !ignore_cancel && token.is_cancelled();

        for step in steps {
            if cancelled() {
                listener.on_cancelled();
                return;
            }

            match step {
                EngineStep::Start => listener.on_start(),
                EngineStep::Progress(percent) => listener.on_progress(percent),
                EngineStep::Pause(duration) => {
                    let deadline = std::time::Instant::now() + duration;
                    while std::time::Instant::now() < deadline && !cancelled() {
                        std::thread::sleep(Duration::from_millis(2));
                    }
                }
                EngineStep::WaitForCancel => {
                    while !token.is_cancelled() {
                        std::thread::sleep(Duration::from_millis(2));
                    }
                }
                EngineStep::Succeed { output_bytes } => {
                    let written = OpenOptions::new()
                        .write(true)
                        .create(true)
                        .truncate(true)
                        .open(&output_path)
                        .and_then(|file| file.set_len(output_bytes));
                    match written {
                        Ok(()) => listener.on_success(),
                        Err(e) => listener.on_failure(format!("mock engine write failed: {}", e)),
                    }
                    return;
                }
                EngineStep::SucceedWithoutOutput => {
                    let _ = std::fs::remove_file(&output_path);
                    listener.on_success();
                    return;
                }
                EngineStep::Fail(message) => {
                    listener.on_failure(message);
                    return;
                }
                EngineStep::DropListener => return,
            }
        }

        if cancelled() {
            listener.on_cancelled();
        }
    }
}

impl TranscodeEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn start(
        &self,
        request: EngineRequest,
        listener: Arc<dyn CompressionListener>,
    ) -> EngineJobHandle {
        let handle = EngineJobHandle::new();
        let steps = self.script.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let ignore_cancel = self.ignore_cancel.load(Ordering::SeqCst);
        let token = handle.token().clone();
        let output_path = request.output_path.clone();

        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(request);

        std::thread::spawn(move || {
            Self::run_script(steps, ignore_cancel, token, output_path, listener);
        });

        handle
    }

    fn cancel(&self, handle: &EngineJobHandle) {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        handle.token().cancel();
    }
}
