use serde::{Deserialize, Serialize};

use crate::controller::ControllerConfig;
use crate::engine::{EngineConfig, QualityConfig};
use crate::stager::StorageConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Quality used when the caller does not pick one.
    #[serde(default)]
    pub quality: QualityConfig,
}
