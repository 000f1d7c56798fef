//! Error types for the ffmpeg engine adapter.
//!
//! These never leave the adapter as values: they are rendered into the
//! message passed to `on_failure`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running ffmpeg.
#[derive(Debug, Error)]
pub enum EngineError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Failed to probe the input.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// The source is already below the minimum bitrate.
    #[error("The provided bitrate ({bitrate_bps} bps) is smaller than what is needed for compression ({min_bps} bps)")]
    BitrateTooLow { bitrate_bps: u64, min_bps: u64 },

    /// FFmpeg exited unsuccessfully.
    #[error("Transcode failed: {reason}")]
    TranscodeFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Transcode timed out.
    #[error("Transcode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Job was cancelled.
    #[error("Transcode cancelled")]
    Cancelled,
}

impl EngineError {
    /// Creates a new transcode failed error with stderr output.
    pub fn transcode_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::TranscodeFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Message reported to the listener, including captured stderr if any.
    pub fn failure_message(&self) -> String {
        match self {
            Self::TranscodeFailed {
                stderr: Some(stderr),
                ..
            } => format!("{}\n{}", self, stderr.trim_end()),
            _ => self.to_string(),
        }
    }
}
