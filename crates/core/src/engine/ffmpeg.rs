//! FFmpeg-backed transcode engine.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::runtime::Handle;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::EngineConfig;
use super::error::EngineError;
use super::listener::CompressionListener;
use super::traits::TranscodeEngine;
use super::types::{EngineJobHandle, EngineRequest, QualityConfig};

static PROGRESS_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"out_time_ms=(\d+)").unwrap());

/// What ffprobe told us about the input.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbe {
    pub duration_secs: f64,
    pub bitrate_bps: u64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

/// Encoder settings derived from the probe and the job's quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodePlan {
    pub video_bitrate_bps: u64,
    pub width: u32,
    pub height: u32,
}

/// Engine that shells out to ffmpeg and ffprobe.
pub struct FfmpegEngine {
    config: Arc<EngineConfig>,
    runtime: Handle,
}

impl FfmpegEngine {
    /// Creates an engine that runs transcodes on `runtime`.
    pub fn new(config: EngineConfig, runtime: Handle) -> Self {
        Self {
            config: Arc::new(config),
            runtime,
        }
    }

    /// Checks that ffmpeg and ffprobe can be launched.
    pub async fn validate(&self) -> Result<(), EngineError> {
        Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EngineError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                },
                _ => EngineError::Io(e),
            })?;

        Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EngineError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                },
                _ => EngineError::Io(e),
            })?;

        Ok(())
    }

    /// Derives encoder settings for `probe`.
    pub fn plan(
        probe: &MediaProbe,
        quality: &QualityConfig,
        min_bitrate_bps: u64,
    ) -> Result<TranscodePlan, EngineError> {
        if quality.min_bitrate_enabled && probe.bitrate_bps < min_bitrate_bps {
            return Err(EngineError::BitrateTooLow {
                bitrate_bps: probe.bitrate_bps,
                min_bps: min_bitrate_bps,
            });
        }

        let video_bitrate_bps =
            (probe.bitrate_bps as f64 * quality.target_quality.bitrate_factor()).round() as u64;

        let (width, height) = if quality.keep_original_resolution {
            (probe.width, probe.height)
        } else {
            Self::scaled_dimensions(probe.width, probe.height)
        };

        Ok(TranscodePlan {
            video_bitrate_bps,
            width,
            height,
        })
    }

    /// Downscales by a factor chosen from the larger dimension, keeping both even.
    fn scaled_dimensions(width: u32, height: u32) -> (u32, u32) {
        let factor = match width.max(height) {
            d if d >= 1920 => 0.5,
            d if d >= 1280 => 0.75,
            d if d >= 960 => 0.95,
            _ => 0.9,
        };
        let even = |v: u32| {
            let scaled = (v as f64 * factor).round() as u32;
            (scaled - scaled % 2).max(2)
        };
        (even(width), even(height))
    }

    /// Builds the ffmpeg command line for one transcode.
    pub fn build_args(
        config: &EngineConfig,
        request: &EngineRequest,
        plan: &TranscodePlan,
        has_audio: bool,
    ) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            request.input_path.to_string_lossy().to_string(),
            "-vf".to_string(),
            format!("scale={}:{}", plan.width, plan.height),
            "-c:v".to_string(),
            "libx264".to_string(),
        ];

        // Unknown source bitrate: leave the rate to the encoder.
        if plan.video_bitrate_bps > 0 {
            args.extend(["-b:v".to_string(), plan.video_bitrate_bps.to_string()]);
        }

        if request.options.disable_audio || !has_audio {
            args.push("-an".to_string());
        } else {
            args.extend(["-c:a".to_string(), "aac".to_string()]);
        }

        if request.options.streamable {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        // Log level and progress
        args.extend([
            "-loglevel".to_string(),
            config.log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);

        args.extend(config.extra_args.iter().cloned());

        args.extend([
            "-f".to_string(),
            "mp4".to_string(),
            request.output_path.to_string_lossy().to_string(),
        ]);

        args
    }

    /// Parses ffprobe JSON output.
    fn parse_probe_output(output: &str) -> Result<MediaProbe, EngineError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
            size: Option<String>,
            bit_rate: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            bit_rate: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
        }

        let probe: ProbeOutput = serde_json::from_str(output)
            .map_err(|e| EngineError::probe_failed(format!("invalid ffprobe output: {}", e)))?;

        let video = probe
            .streams
            .iter()
            .find(|s| s.codec_type == "video")
            .ok_or_else(|| EngineError::probe_failed("no video stream"))?;

        let (width, height) = match (video.width, video.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(EngineError::probe_failed("video stream has no dimensions")),
        };

        let duration_secs = probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let parse_u64 = |v: Option<&String>| v.and_then(|s| s.parse::<u64>().ok());
        let bitrate_bps = parse_u64(probe.format.bit_rate.as_ref())
            .or_else(|| parse_u64(video.bit_rate.as_ref()))
            .or_else(|| {
                let size = parse_u64(probe.format.size.as_ref())?;
                (duration_secs > 0.0).then(|| (size as f64 * 8.0 / duration_secs) as u64)
            })
            .unwrap_or(0);

        Ok(MediaProbe {
            duration_secs,
            bitrate_bps,
            width,
            height,
            has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
        })
    }

    async fn probe(config: &EngineConfig, path: &Path) -> Result<MediaProbe, EngineError> {
        let output = Command::new(&config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::FfprobeNotFound {
                        path: config.ffprobe_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(EngineError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Self::parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Runs one transcode to completion and reports the outcome to the listener.
    async fn run(
        config: Arc<EngineConfig>,
        request: EngineRequest,
        listener: Arc<dyn CompressionListener>,
        cancel: CancellationToken,
    ) {
        listener.on_start();

        match Self::transcode(&config, &request, listener.as_ref(), &cancel).await {
            Ok(()) => {
                info!(output = %request.output_path.display(), "Transcode finished");
                listener.on_success();
            }
            Err(EngineError::Cancelled) => {
                info!(output = %request.output_path.display(), "Transcode cancelled");
                listener.on_cancelled();
            }
            Err(e) => {
                warn!(error = %e, "Transcode failed");
                listener.on_failure(e.failure_message());
            }
        }
    }

    async fn transcode(
        config: &EngineConfig,
        request: &EngineRequest,
        listener: &dyn CompressionListener,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        let probe = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            probe = Self::probe(config, &request.input_path) => probe?,
        };
        debug!(?probe, "Probed input");

        let plan = Self::plan(&probe, &request.quality, config.min_bitrate_bps)?;
        let args = Self::build_args(config, request, &plan, probe.has_audio);
        debug!(?args, "Launching ffmpeg");

        let mut child = Command::new(&config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::FfmpegNotFound {
                        path: config.ffmpeg_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Io(std::io::Error::other("ffmpeg stderr not captured")))?;

        let timeout_duration = Duration::from_secs(config.timeout_secs);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            read = timeout(timeout_duration, Self::read_progress(stderr, probe.duration_secs, listener)) => Some(read),
        };

        let error_output = match outcome {
            None => {
                let _ = child.kill().await;
                return Err(EngineError::Cancelled);
            }
            Some(Err(_)) => {
                // Kill the process on timeout
                let _ = child.kill().await;
                return Err(EngineError::Timeout {
                    timeout_secs: config.timeout_secs,
                });
            }
            Some(Ok(Err(e))) => {
                let _ = child.kill().await;
                return Err(EngineError::Io(e));
            }
            Some(Ok(Ok(error_output))) => error_output,
        };

        let status = child.wait().await?;
        if !status.success() {
            return Err(EngineError::transcode_failed(
                format!("ffmpeg exited with code: {:?}", status.code()),
                (!error_output.is_empty()).then_some(error_output),
            ));
        }

        Ok(())
    }

    /// Forwards `-progress` output as percentages until ffmpeg closes stderr.
    ///
    /// Returns the error lines seen along the way.
    async fn read_progress(
        stderr: ChildStderr,
        duration_secs: f64,
        listener: &dyn CompressionListener,
    ) -> std::io::Result<String> {
        let mut reader = BufReader::new(stderr).lines();
        let mut error_output = String::new();

        while let Some(line) = reader.next_line().await? {
            if line.contains("Error") || line.contains("error") {
                error_output.push_str(&line);
                error_output.push('\n');
            }

            if line == "progress=end" {
                listener.on_progress(100.0);
                continue;
            }

            if let Some(micros) = PROGRESS_TIME
                .captures(&line)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
            {
                if duration_secs > 0.0 {
                    let seconds = micros / 1_000_000.0;
                    listener.on_progress((seconds / duration_secs * 100.0).min(100.0) as f32);
                }
            }
        }

        Ok(error_output)
    }
}

impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn start(
        &self,
        request: EngineRequest,
        listener: Arc<dyn CompressionListener>,
    ) -> EngineJobHandle {
        let handle = EngineJobHandle::new();
        info!(
            engine_job = %handle.id,
            input = %request.input_path.display(),
            output = %request.output_path.display(),
            "Starting ffmpeg transcode"
        );

        self.runtime.spawn(Self::run(
            Arc::clone(&self.config),
            request,
            listener,
            handle.token().clone(),
        ));
        handle
    }

    fn cancel(&self, handle: &EngineJobHandle) {
        debug!(engine_job = %handle.id, "Cancelling ffmpeg transcode");
        handle.token().cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineOptions, TargetQuality};
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn probe(width: u32, height: u32, bitrate_bps: u64) -> MediaProbe {
        MediaProbe {
            duration_secs: 10.0,
            bitrate_bps,
            width,
            height,
            has_audio: true,
        }
    }

    fn request(options: EngineOptions) -> EngineRequest {
        EngineRequest {
            input_path: PathBuf::from("/in/clip.mov"),
            output_path: PathBuf::from("/out/1_clip.mov"),
            quality: QualityConfig::default(),
            options,
        }
    }

    #[test]
    fn test_plan_scales_and_reduces_bitrate() {
        let plan = FfmpegEngine::plan(
            &probe(1920, 1080, 10_000_000),
            &QualityConfig::default(),
            2_000_000,
        )
        .unwrap();

        assert_eq!(plan.video_bitrate_bps, 2_000_000);
        assert_eq!((plan.width, plan.height), (960, 540));
    }

    #[test]
    fn test_plan_scale_factors() {
        assert_eq!(FfmpegEngine::scaled_dimensions(1280, 720), (960, 540));
        assert_eq!(FfmpegEngine::scaled_dimensions(960, 540), (912, 512));
        assert_eq!(FfmpegEngine::scaled_dimensions(640, 360), (576, 324));
        assert_eq!(FfmpegEngine::scaled_dimensions(1080, 1920), (540, 960));
    }

    #[test]
    fn test_plan_keeps_resolution() {
        let quality = QualityConfig::default()
            .with_original_resolution(true)
            .with_target_quality(TargetQuality::High);
        let plan = FfmpegEngine::plan(&probe(1921, 1081, 10_000_000), &quality, 0).unwrap();

        assert_eq!((plan.width, plan.height), (1921, 1081));
        assert_eq!(plan.video_bitrate_bps, 3_000_000);
    }

    #[test]
    fn test_plan_rejects_low_bitrate() {
        let result = FfmpegEngine::plan(
            &probe(1280, 720, 1_500_000),
            &QualityConfig::default(),
            2_000_000,
        );
        assert!(matches!(result, Err(EngineError::BitrateTooLow { .. })));

        let relaxed = QualityConfig::default().with_min_bitrate(false);
        assert!(FfmpegEngine::plan(&probe(1280, 720, 1_500_000), &relaxed, 2_000_000).is_ok());
    }

    #[test]
    fn test_build_args_defaults() {
        let config = EngineConfig::default();
        let plan = TranscodePlan {
            video_bitrate_bps: 2_000_000,
            width: 960,
            height: 540,
        };
        let args =
            FfmpegEngine::build_args(&config, &request(EngineOptions::default()), &plan, true);

        assert_eq!(args[0], "-y");
        assert!(args.windows(2).any(|w| w == ["-vf", "scale=960:540"]));
        assert!(args.windows(2).any(|w| w == ["-b:v", "2000000"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert!(!args.contains(&"-movflags".to_string()));
        assert_eq!(args.last().unwrap(), "/out/1_clip.mov");
    }

    #[test]
    fn test_build_args_options() {
        let config = EngineConfig {
            extra_args: vec!["-preset".to_string(), "fast".to_string()],
            ..Default::default()
        };
        let plan = TranscodePlan {
            video_bitrate_bps: 1,
            width: 2,
            height: 2,
        };
        let options = EngineOptions {
            streamable: true,
            disable_audio: true,
        };
        let args = FfmpegEngine::build_args(&config, &request(options), &plan, true);

        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
        assert!(args.windows(2).any(|w| w == ["-movflags", "+faststart"]));
        assert!(args.windows(2).any(|w| w == ["-preset", "fast"]));
    }

    #[test]
    fn test_build_args_omit_bitrate_when_unknown() {
        let plan = TranscodePlan {
            video_bitrate_bps: 0,
            width: 640,
            height: 360,
        };
        let args = FfmpegEngine::build_args(
            &EngineConfig::default(),
            &request(EngineOptions::default()),
            &plan,
            true,
        );

        assert!(!args.contains(&"-b:v".to_string()));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "format": {"duration": "12.5", "size": "5000000", "bit_rate": "3200000"},
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080},
                {"codec_type": "audio"}
            ]
        }"#;
        let probe = FfmpegEngine::parse_probe_output(json).unwrap();
        assert_eq!(probe.bitrate_bps, 3_200_000);
        assert_eq!((probe.width, probe.height), (1920, 1080));
        assert!(probe.has_audio);
        assert_eq!(probe.duration_secs, 12.5);
    }

    #[test]
    fn test_parse_probe_bitrate_fallback() {
        let json = r#"{
            "format": {"duration": "10", "size": "5000000"},
            "streams": [{"codec_type": "video", "width": 640, "height": 480}]
        }"#;
        let probe = FfmpegEngine::parse_probe_output(json).unwrap();
        assert_eq!(probe.bitrate_bps, 4_000_000);
        assert!(!probe.has_audio);
    }

    #[test]
    fn test_parse_probe_requires_video() {
        let json = r#"{"format": {}, "streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(
            FfmpegEngine::parse_probe_output(json),
            Err(EngineError::ProbeFailed { .. })
        ));
    }

    #[derive(Default)]
    struct RecordingListener {
        calls: Mutex<Vec<String>>,
    }

    impl CompressionListener for RecordingListener {
        fn on_start(&self) {
            self.calls.lock().unwrap().push("start".to_string());
        }
        fn on_progress(&self, percent: f32) {
            self.calls.lock().unwrap().push(format!("progress:{}", percent));
        }
        fn on_success(&self) {
            self.calls.lock().unwrap().push("success".to_string());
        }
        fn on_failure(&self, message: String) {
            self.calls.lock().unwrap().push(format!("failure:{}", message));
        }
        fn on_cancelled(&self) {
            self.calls.lock().unwrap().push("cancelled".to_string());
        }
    }

    #[tokio::test]
    async fn test_missing_ffprobe_reports_failure() {
        let config = EngineConfig::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
        );
        let listener = Arc::new(RecordingListener::default());

        FfmpegEngine::run(
            Arc::new(config),
            request(EngineOptions::default()),
            listener.clone(),
            CancellationToken::new(),
        )
        .await;

        let calls = listener.calls.lock().unwrap().clone();
        assert_eq!(calls[0], "start");
        assert!(calls[1].starts_with("failure:FFprobe not found"));
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_probe_reports_cancelled() {
        let listener = Arc::new(RecordingListener::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        FfmpegEngine::run(
            Arc::new(EngineConfig::default()),
            request(EngineOptions::default()),
            listener.clone(),
            cancel,
        )
        .await;

        let calls = listener.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["start".to_string(), "cancelled".to_string()]);
    }

    #[tokio::test]
    async fn test_start_and_cancel_through_trait() {
        let engine = FfmpegEngine::new(EngineConfig::default(), Handle::current());
        let listener = Arc::new(RecordingListener::default());
        let handle = engine.start(request(EngineOptions::default()), listener.clone());
        engine.cancel(&handle);
        assert!(handle.is_cancelled());
        assert_eq!(engine.name(), "ffmpeg");
    }
}
