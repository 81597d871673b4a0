use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Per-connection limits and timeouts.
///
/// A timeout of `0` disables the corresponding timer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub response_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub keep_alive_timeout_ms: u64,
    pub max_request_body_length: u64,
    pub max_requests_per_connection: u32,
    pub max_path_length: usize,
    pub max_header_size: usize,
    pub persistent_connections: bool,
    /// Scheme reported by `Request::url`.
    pub protocol: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 15_000,
            request_timeout_ms: 5_000,
            keep_alive_timeout_ms: 5_000,
            max_request_body_length: 10 * 1024 * 1024,
            max_requests_per_connection: 1000,
            max_path_length: 8 * 1024,
            max_header_size: 16 * 1024,
            persistent_connections: true,
            protocol: "http".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_millis(self.keep_alive_timeout_ms)
    }

    /// Requests one connection may carry before it is closed.
    pub fn request_limit(&self) -> u32 {
        if self.persistent_connections {
            self.max_requests_per_connection
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN.to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Loads the YAML file named by `EXPRESSWAY_CONFIG`, if set, then
    /// applies the `LISTEN` override.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("EXPRESSWAY_CONFIG") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {}", path))?;
                Self::from_yaml(&raw).with_context(|| format!("parsing config file {}", path))?
            }
            Err(_) => Self::default(),
        };

        if let Ok(listen) = std::env::var("LISTEN") {
            cfg.listen_addr = listen;
        }

        Ok(cfg)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }
}
