mod metrics;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::runtime::Handle;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use squeezer_core::{
    create_stager, load_config, validate_config, Config, EngineOptions, FfmpegEngine,
    JobController, JobState, MediaSourceResolver, MediaStore, QualityConfig, SourceReference,
    SqliteMediaStore, TargetQuality, UiEvent,
};
use squeezer_core::source::ContentIndex;

use render::{render_event, render_record, EventFormat};

/// Default config location when `--config` and `SQUEEZER_CONFIG` are absent.
const DEFAULT_CONFIG: &str = "squeezer.toml";

#[derive(Debug, Parser)]
#[command(name = "squeeze", version, about = "Compress one video at a time")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "SQUEEZER_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Print Prometheus metrics before exiting
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compress a video
    Compress(CompressArgs),
    /// List compressed videos in the media index
    List {
        /// Show pending records instead of visible ones
        #[arg(long)]
        pending: bool,
    },
    /// Delete outputs left pending by an interrupted run
    Recover,
}

#[derive(Debug, Args)]
struct CompressArgs {
    /// Path, file:// URL or content:// reference of the video
    source: String,

    /// Target quality (low, medium, high)
    #[arg(long)]
    quality: Option<TargetQuality>,

    /// Keep the source resolution
    #[arg(long)]
    keep_resolution: bool,

    /// Do not refuse low-bitrate sources
    #[arg(long)]
    no_min_bitrate: bool,

    /// Move the moov atom to the front of the output
    #[arg(long)]
    streamable: bool,

    /// Drop the audio track
    #[arg(long)]
    disable_audio: bool,

    /// Print UI events as JSON lines
    #[arg(long)]
    json: bool,
}

impl CompressArgs {
    fn quality(&self, defaults: QualityConfig) -> QualityConfig {
        let mut quality = defaults;
        if let Some(target) = self.quality {
            quality = quality.with_target_quality(target);
        }
        if self.keep_resolution {
            quality = quality.with_original_resolution(true);
        }
        if self.no_min_bitrate {
            quality = quality.with_min_bitrate(false);
        }
        quality
    }

    fn options(&self) -> EngineOptions {
        EngineOptions {
            streamable: self.streamable,
            disable_audio: self.disable_audio,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let result = run(&cli).await;

    if cli.metrics {
        print!("{}", metrics::encode_metrics());
    }

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    let config = read_config(cli.config.as_deref())?;
    validate_config(&config).context("Configuration validation failed")?;

    match &cli.command {
        Command::Compress(args) => compress(&config, args).await,
        Command::List { pending } => list(&config, *pending),
        Command::Recover => recover(&config).await,
    }
}

fn read_config(path: Option<&std::path::Path>) -> Result<Config> {
    let path = path.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    if !path.exists() && path == PathBuf::from(DEFAULT_CONFIG) {
        info!("No configuration file at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    info!("Loading configuration from {:?}", path);
    load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
}

fn open_media_store(config: &Config) -> Result<Option<Arc<SqliteMediaStore>>> {
    let Some(index) = &config.storage.media_index else {
        return Ok(None);
    };

    let store = SqliteMediaStore::new(&index.database, &index.root)
        .with_context(|| format!("Failed to open media index at {:?}", index.database))?;
    info!("Media index opened at {:?}", index.database);
    Ok(Some(Arc::new(store)))
}

fn build_controller(
    config: &Config,
    engine: Arc<FfmpegEngine>,
) -> Result<(JobController, tokio::sync::mpsc::Receiver<UiEvent>)> {
    let store = open_media_store(config)?;

    let stager = create_stager(
        &config.storage,
        store.clone().map(|s| s as Arc<dyn MediaStore>),
    )
    .context("Failed to create destination stager")?;
    info!("Using {} storage", stager.name());

    let mut resolver = MediaSourceResolver::new();
    if let Some(store) = store {
        resolver = resolver.with_index(store);
    }

    Ok(JobController::new(
        config.controller.clone(),
        Arc::new(resolver),
        stager,
        engine,
        Handle::current(),
    ))
}

/// Builds the controller and purges outputs a crashed run left pending.
async fn start_controller(
    config: &Config,
    engine: Arc<FfmpegEngine>,
) -> Result<(JobController, tokio::sync::mpsc::Receiver<UiEvent>)> {
    let (controller, ui_rx) = build_controller(config, engine)?;

    let purged = controller
        .recover()
        .await
        .context("Failed to recover pending outputs")?;
    if purged > 0 {
        info!(purged, "Purged pending outputs from an earlier run");
    }
    Ok((controller, ui_rx))
}

async fn compress(config: &Config, args: &CompressArgs) -> Result<ExitCode> {
    let engine = Arc::new(FfmpegEngine::new(config.engine.clone(), Handle::current()));
    if let Err(e) = engine.validate().await {
        warn!("Transcode engine unavailable: {}", e);
    }

    let (controller, mut ui_rx) = start_controller(config, engine).await?;
    let format = if args.json {
        EventFormat::Json
    } else {
        EventFormat::Text
    };

    let job = controller
        .submit(
            SourceReference::new(args.source.as_str()),
            args.quality(config.quality),
            args.options(),
        )
        .context("Failed to submit job")?;
    info!(job_id = %job.job_id, "Compressing {}", args.source);

    let completion = job.wait();
    tokio::pin!(completion);
    let mut interrupted = false;

    let snapshot = loop {
        tokio::select! {
            snapshot = &mut completion => break snapshot,
            Some(event) = ui_rx.recv() => print_event(&event, format),
            _ = signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                info!("Interrupt received, cancelling");
                controller.cancel();
            }
        }
    };

    while let Ok(event) = ui_rx.try_recv() {
        print_event(&event, format);
    }

    let Some(snapshot) = snapshot else {
        bail!("Job task ended without reporting an outcome");
    };

    Ok(match snapshot.state {
        JobState::Succeeded => {
            if let Some(destination) = &snapshot.destination {
                println!("Saved to {}", destination.path.display());
            }
            ExitCode::SUCCESS
        }
        JobState::Cancelled => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    })
}

fn print_event(event: &UiEvent, format: EventFormat) {
    if let Some(line) = render_event(event, format) {
        println!("{}", line);
    }
}

fn list(config: &Config, pending: bool) -> Result<ExitCode> {
    let Some(store) = open_media_store(config)? else {
        bail!("No media index configured, set [storage.media_index]");
    };

    let records = if pending {
        store.list_pending()
    } else {
        store.list_visible()
    }
    .context("Failed to list media records")?;

    for record in &records {
        println!("{}", render_record(record, store.authority()));
    }
    info!("{} record(s)", records.len());
    Ok(ExitCode::SUCCESS)
}

async fn recover(config: &Config) -> Result<ExitCode> {
    let engine = Arc::new(FfmpegEngine::new(config.engine.clone(), Handle::current()));
    let (controller, _ui_rx) = build_controller(config, engine)?;

    let purged = controller
        .recover()
        .await
        .context("Failed to recover pending outputs")?;
    println!("Removed {} pending output(s)", purged);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_flags_override_config_quality() {
        let cli = Cli::try_parse_from([
            "squeeze",
            "compress",
            "/videos/a.mp4",
            "--quality",
            "high",
            "--keep-resolution",
            "--no-min-bitrate",
            "--streamable",
        ])
        .unwrap();

        let Command::Compress(args) = cli.command else {
            panic!("expected compress");
        };
        let quality = args.quality(QualityConfig::default());
        assert_eq!(quality.target_quality, TargetQuality::High);
        assert!(quality.keep_original_resolution);
        assert!(!quality.min_bitrate_enabled);
        assert!(args.options().streamable);
        assert!(!args.options().disable_audio);
    }

    #[test]
    fn test_compress_defaults_come_from_config() {
        let cli = Cli::try_parse_from(["squeeze", "compress", "/videos/a.mp4"]).unwrap();
        let Command::Compress(args) = cli.command else {
            panic!("expected compress");
        };

        let defaults = QualityConfig::default().with_target_quality(TargetQuality::Low);
        assert_eq!(args.quality(defaults), defaults);
    }

    #[test]
    fn test_unknown_quality_rejected() {
        let result = Cli::try_parse_from(["squeeze", "compress", "a.mp4", "--quality", "ultra"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("missing.toml");
        let result = read_config(Some(missing.as_path()));
        assert!(result.is_err());
    }

    #[test]
    fn test_list_requires_media_index() {
        assert!(list(&Config::default(), false).is_err());
    }

    #[tokio::test]
    async fn test_startup_purges_pending_records() {
        use squeezer_core::media_store::NewRecord;
        use squeezer_core::stager::StorageConfig;

        let temp = tempfile::TempDir::new().unwrap();
        let database = temp.path().join("media.db");
        let root = temp.path().join("media");
        let store = SqliteMediaStore::new(&database, &root).unwrap();
        let orphan = store
            .insert_pending_record(&NewRecord {
                display_name: "1700000000000_orphan.mp4".to_string(),
                mime_type: "video/mp4".to_string(),
                relative_path: "Movies".to_string(),
            })
            .unwrap();
        drop(store);

        let mut config = Config::default();
        config.storage = StorageConfig::default().with_media_index(database.clone(), root.clone());
        let engine = Arc::new(FfmpegEngine::new(config.engine.clone(), Handle::current()));

        let (controller, _ui_rx) = start_controller(&config, engine).await.unwrap();

        assert_eq!(controller.state(), JobState::Idle);
        assert!(!orphan.data_path.exists());
        let store = SqliteMediaStore::new(&database, &root).unwrap();
        assert!(store.list_pending().unwrap().is_empty());
    }

    #[test]
    fn test_list_reads_configured_index() {
        let temp = tempfile::TempDir::new().unwrap();
        let toml = format!(
            "[storage.media_index]\ndatabase = {:?}\nroot = {:?}\n",
            temp.path().join("media.db"),
            temp.path().join("media"),
        );
        let config = squeezer_core::load_config_from_str(&toml).unwrap();

        assert!(list(&config, true).is_ok());
    }
}
