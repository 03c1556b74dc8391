use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::EngineConfig;
use crate::fetcher::FetchConfig;
use crate::transcoder::Bitrate;
use crate::validate::DEFAULT_LARGE_INPUT_THRESHOLD_MB;

/// Root configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Input limits
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Inputs above this size (in MB) get a memory warning. Not a hard limit.
    #[serde(default = "default_large_input_threshold")]
    pub large_input_threshold_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            large_input_threshold_mb: default_large_input_threshold(),
        }
    }
}

fn default_large_input_threshold() -> u64 {
    DEFAULT_LARGE_INPUT_THRESHOLD_MB
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Bitrate used when none is given on the command line.
    #[serde(default)]
    pub default_bitrate: Bitrate,
    /// Directory produced files are saved into.
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_bitrate: Bitrate::default(),
            directory: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.limits.large_input_threshold_mb, 300);
        assert_eq!(config.output.default_bitrate, Bitrate::Kbps192);
        assert_eq!(config.output.directory, PathBuf::from("."));
        assert_eq!(config.fetch.connect_timeout_secs, 30);
        assert_eq!(config.engine.log_level, "info");
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_bitrate_outside_choices_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[output]\ndefault_bitrate = 100\n");
        assert!(result.is_err());
    }
}
