use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Engine binary path is not empty
/// - Large input threshold is not 0
/// - Fetch connect timeout is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.engine.ffmpeg_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.ffmpeg_path cannot be empty".to_string(),
        ));
    }

    if config.limits.large_input_threshold_mb == 0 {
        return Err(ConfigError::ValidationError(
            "limits.large_input_threshold_mb cannot be 0".to_string(),
        ));
    }

    if config.fetch.connect_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "fetch.connect_timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_ffmpeg_path_fails() {
        let mut config = Config::default();
        config.engine.ffmpeg_path = PathBuf::new();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_threshold_fails() {
        let mut config = Config::default();
        config.limits.large_input_threshold_mb = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_connect_timeout_fails() {
        let mut config = Config::default();
        config.fetch.connect_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
