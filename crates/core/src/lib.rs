pub mod config;
pub mod controller;
pub mod engine;
pub mod media_store;
pub mod metrics;
pub mod progress;
pub mod source;
pub mod stager;
pub mod testing;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use controller::{
    ControllerConfig, ControllerError, FailureKind, JobController, JobFailure, JobSnapshot,
    JobState, SubmittedJob, UiEvent,
};
pub use engine::{
    CompressionListener, EngineConfig, EngineError, EngineOptions, FfmpegEngine, QualityConfig,
    TargetQuality, TranscodeEngine,
};
pub use media_store::{MediaStore, MediaStoreError, SqliteMediaStore};
pub use progress::{ProgressGate, ProgressSample};
pub use source::{MediaSourceResolver, ResolutionError, ResolvedInput, SourceReference, SourceResolver};
pub use stager::{
    create_stager, Destination, DestinationStager, StagingError, StorageConfig, StorageKind,
    StorageStrategy, Visibility,
};
