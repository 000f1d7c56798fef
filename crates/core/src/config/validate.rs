use std::path::Path;

use super::{types::Config, ConfigError};
use crate::stager::StorageStrategy;

/// Validate configuration
/// Currently validates:
/// - Copy buffer and UI event buffer are non-zero
/// - `staged_record` storage has a media index to stage into
/// - Relative media folder is relative and does not escape the index root
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.storage.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "storage.buffer_size cannot be 0".to_string(),
        ));
    }

    if config.storage.strategy == StorageStrategy::StagedRecord
        && config.storage.media_index.is_none()
    {
        return Err(ConfigError::ValidationError(
            "storage.strategy = \"staged_record\" requires [storage.media_index]".to_string(),
        ));
    }

    let relative_path = &config.storage.relative_path;
    if Path::new(relative_path).has_root() || relative_path.starts_with(['/', '\\']) {
        return Err(ConfigError::ValidationError(format!(
            "storage.relative_path must be relative, got {:?}",
            relative_path
        )));
    }

    if relative_path.split(['/', '\\']).any(|part| part == "..") {
        return Err(ConfigError::ValidationError(
            "storage.relative_path cannot contain '..'".to_string(),
        ));
    }

    if config.controller.ui_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "controller.ui_buffer cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stager::MediaIndexConfig;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_buffer_fails() {
        let mut config = Config::default();
        config.storage.buffer_size = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_staged_record_requires_index() {
        let mut config = Config::default();
        config.storage.strategy = StorageStrategy::StagedRecord;
        assert!(validate_config(&config).is_err());

        config.storage.media_index = Some(MediaIndexConfig {
            database: PathBuf::from("media.db"),
            root: PathBuf::from("media"),
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_relative_path_escape_fails() {
        let mut config = Config::default();
        config.storage.relative_path = "Movies/../../etc".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_absolute_relative_path_fails() {
        let mut config = Config::default();
        config.storage.relative_path = "/var/media".to_string();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(msg)) if msg.contains("must be relative")));
    }

    #[test]
    fn test_validate_zero_ui_buffer_fails() {
        let mut config = Config::default();
        config.controller.ui_buffer = 0;
        assert!(validate_config(&config).is_err());
    }
}
