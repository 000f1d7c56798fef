//! Transcode engine contract.
//!
//! The engine is an external collaborator. The controller hands it an
//! [`EngineRequest`] and a [`CompressionListener`]; the engine reports back
//! through the listener from whatever thread it likes and can be cancelled
//! through the returned [`EngineJobHandle`].
//!
//! [`JobListener`] is the controller's listener: it converts callbacks into
//! [`EngineEvent`]s on a channel owned by the job task.
//!
//! [`FfmpegEngine`] is a thin adapter over the `ffmpeg`/`ffprobe` binaries.
//!
//! # Example
//!
//! ```ignore
//! use squeezer_core::engine::{EngineConfig, FfmpegEngine, TranscodeEngine};
//!
//! let engine = FfmpegEngine::new(EngineConfig::default(), tokio::runtime::Handle::current());
//! let handle = engine.start(request, listener);
//! // later
//! engine.cancel(&handle);
//! ```

mod config;
mod error;
mod ffmpeg;
mod listener;
mod traits;
mod types;

pub use config::EngineConfig;
pub use error::EngineError;
pub use ffmpeg::{FfmpegEngine, MediaProbe, TranscodePlan};
pub use listener::{CompressionListener, JobListener};
pub use traits::TranscodeEngine;
pub use types::{
    EngineEvent, EngineJobHandle, EngineOptions, EngineRequest, QualityConfig, TargetQuality,
};
