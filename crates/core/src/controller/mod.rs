//! Job controller: the state machine that owns a compression job's lifecycle.
//!
//! The controller composes a [`SourceResolver`](crate::source::SourceResolver),
//! a [`DestinationStager`](crate::stager::DestinationStager) and a
//! [`TranscodeEngine`](crate::engine::TranscodeEngine):
//!
//! 1. resolve the source reference to a readable file
//! 2. allocate a destination with the configured storage strategy
//! 3. run the engine, forwarding quantized progress
//! 4. finalize the destination on success, or roll it back
//!
//! Observers get read-only [`JobSnapshot`]s and [`UiEvent`]s on a bounded
//! channel.
//!
//! # Example
//!
//! ```ignore
//! use squeezer_core::controller::{ControllerConfig, JobController};
//!
//! let (controller, mut events) = JobController::new(
//!     ControllerConfig::default(),
//!     resolver,
//!     stager,
//!     engine,
//!     tokio::runtime::Handle::current(),
//! );
//!
//! let job = controller.submit(source, QualityConfig::default(), EngineOptions::default())?;
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! let snapshot = job.wait().await;
//! ```

mod config;
mod error;
mod events;
mod format;
mod runner;
mod state;
mod types;

pub use config::ControllerConfig;
pub use error::ControllerError;
pub use events::UiEvent;
pub use format::{format_elapsed, format_size};
pub use runner::JobController;
pub use state::{InvalidTransition, JobState, JobStateMachine, Transition, Trigger};
pub use types::{FailureKind, JobFailure, JobSnapshot, SubmittedJob};
