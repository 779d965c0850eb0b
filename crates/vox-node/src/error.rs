//! Node runtime errors.

use std::net::SocketAddr;

use thiserror::Error;

/// Fatal startup failures. Everything past startup is handled in place:
/// a lost peer is dropped, a bad message is logged, a failed dial retries.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value}")]
    EnvOverride { var: &'static str, value: String },
}
