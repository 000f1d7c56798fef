//! Types for the transcode engine contract.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Requested output quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl TargetQuality {
    /// Fraction of the source bitrate kept in the output.
    pub fn bitrate_factor(&self) -> f64 {
        match self {
            Self::Low => 0.1,
            Self::Medium => 0.2,
            Self::High => 0.3,
        }
    }
}

impl std::str::FromStr for TargetQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown quality '{}'", other)),
        }
    }
}

/// Quality parameters for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub target_quality: TargetQuality,

    /// Refuse sources whose bitrate is already below the engine minimum.
    #[serde(default = "default_true")]
    pub min_bitrate_enabled: bool,

    #[serde(default)]
    pub keep_original_resolution: bool,
}

fn default_true() -> bool {
    true
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            target_quality: TargetQuality::Medium,
            min_bitrate_enabled: true,
            keep_original_resolution: false,
        }
    }
}

impl QualityConfig {
    pub fn with_target_quality(mut self, quality: TargetQuality) -> Self {
        self.target_quality = quality;
        self
    }

    pub fn with_min_bitrate(mut self, enabled: bool) -> Self {
        self.min_bitrate_enabled = enabled;
        self
    }

    pub fn with_original_resolution(mut self, keep: bool) -> Self {
        self.keep_original_resolution = keep;
        self
    }
}

/// Output container options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Move the index to the front of the file for progressive playback.
    #[serde(default)]
    pub streamable: bool,
    #[serde(default)]
    pub disable_audio: bool,
}

/// Everything the engine needs to run one transcode.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub quality: QualityConfig,
    pub options: EngineOptions,
}

/// Handle for a running transcode, used to cancel it.
#[derive(Debug, Clone)]
pub struct EngineJobHandle {
    pub id: Uuid,
    cancel: CancellationToken,
}

impl EngineJobHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token the engine watches for cancellation.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for EngineJobHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener callbacks converted into messages for the job task.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Started { at: Instant, original_size: u64 },
    Progress(f32),
    Succeeded,
    Failed(String),
    Cancelled,
}

impl EngineEvent {
    /// Whether the engine is done with the job after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_defaults() {
        let quality = QualityConfig::default();
        assert_eq!(quality.target_quality, TargetQuality::Medium);
        assert!(quality.min_bitrate_enabled);
        assert!(!quality.keep_original_resolution);
    }

    #[test]
    fn test_bitrate_factors() {
        assert_eq!(TargetQuality::Low.bitrate_factor(), 0.1);
        assert_eq!(TargetQuality::Medium.bitrate_factor(), 0.2);
        assert_eq!(TargetQuality::High.bitrate_factor(), 0.3);
    }

    #[test]
    fn test_quality_from_str() {
        assert_eq!("HIGH".parse::<TargetQuality>().unwrap(), TargetQuality::High);
        assert!("ultra".parse::<TargetQuality>().is_err());
    }

    #[test]
    fn test_quality_deserialize_partial() {
        let quality: QualityConfig = serde_json::from_str(r#"{"target_quality":"low"}"#).unwrap();
        assert_eq!(quality.target_quality, TargetQuality::Low);
        assert!(quality.min_bitrate_enabled);
    }

    #[test]
    fn test_handle_cancel() {
        let handle = EngineJobHandle::new();
        assert!(!handle.is_cancelled());
        handle.token().cancel();
        assert!(handle.clone().is_cancelled());
    }
}
