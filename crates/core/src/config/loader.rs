use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

const ENV_PREFIX: &str = "AUDORA_";

fn env() -> Env {
    // AUDORA_OUTPUT__DEFAULT_BITRATE -> output.default_bitrate
    Env::prefixed(ENV_PREFIX).split("__")
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(env())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from defaults and environment variables only
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(env())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
