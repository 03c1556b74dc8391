//! Configuration for the HTTP fetcher.

use serde::{Deserialize, Serialize};

/// Configuration for [`HttpFetcher`](super::HttpFetcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Connection establishment timeout in seconds. Reading the body is unbounded.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("audora/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.connect_timeout_secs, 30);
        assert!(config.user_agent.starts_with("audora/"));
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: FetchConfig = toml::from_str("connect_timeout_secs = 5").unwrap();
        assert_eq!(config.connect_timeout_secs, 5);
        assert!(config.user_agent.starts_with("audora/"));
    }
}
