use std::net::SocketAddr;
use std::path::PathBuf;

use url::Url;

use crate::fetch::{FetchConfig, DEFAULT_ORIGIN};

const ORIGIN_VAR: &str = "PROBLEM_FETCH_ORIGIN";
const BIND_VAR: &str = "PROBLEM_FETCH_BIND";
const CACHE_VAR: &str = "PROBLEM_FETCH_CACHE";
const INSECURE_VAR: &str = "PROBLEM_FETCH_INSECURE_SSL";
const DEFAULT_BIND: &str = "0.0.0.0:8000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("PROBLEM_FETCH_ORIGIN is not a valid URL: {0}")]
    InvalidOrigin(String),
    #[error("PROBLEM_FETCH_ORIGIN must use http or https")]
    UnsupportedScheme,
    #[error("PROBLEM_FETCH_BIND is not a socket address: {0}")]
    InvalidBind(String),
}

/// Settings for the HTTP service binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    /// JSON file for the persistent cache; `None` keeps results in memory.
    pub cache_path: Option<PathBuf>,
    pub fetch: FetchConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let origin_raw = lookup(ORIGIN_VAR).unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let origin = Url::parse(&origin_raw)
            .map_err(|_| ConfigError::InvalidOrigin(origin_raw.clone()))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme);
        }

        let bind_raw = lookup(BIND_VAR).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_raw.clone()))?;

        let cache_path = lookup(CACHE_VAR)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let mut fetch = FetchConfig::new(origin);
        fetch.accept_invalid_certs = lookup(INSECURE_VAR).as_deref() == Some("1");

        Ok(Self {
            bind,
            cache_path,
            fetch,
        })
    }
}
