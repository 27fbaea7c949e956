//! Environment-based configuration
//!
//! Loaded once at startup, after `dotenvy` has pulled in any `.env` file.

use gh_contrib_client::DEFAULT_API_URL;
use std::env;
use std::path::PathBuf;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `BIND_ADDR`: listen address.
    pub bind_addr: String,
    /// `GITHUB_TOKEN`: optional personal token for the upstream API.
    pub github_token: Option<String>,
    /// `GITHUB_API_URL`: upstream API root.
    pub api_url: String,
    /// `DATA_DIR`: directory holding the cache snapshot files.
    pub data_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            github_token: lookup("GITHUB_TOKEN").filter(|token| !token.is_empty()),
            api_url: lookup("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(config.github_token.is_none());
    }

    #[test]
    fn explicit_values_win_and_blank_tokens_are_ignored() {
        let vars: HashMap<&str, &str> = [
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("GITHUB_TOKEN", ""),
            ("GITHUB_API_URL", "https://ghe.example.com/api/v3"),
            ("DATA_DIR", "/var/lib/gh-contrib"),
        ]
        .into();
        let config = ServerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.github_token.is_none());
        assert_eq!(config.api_url, "https://ghe.example.com/api/v3");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/gh-contrib"));
    }
}
