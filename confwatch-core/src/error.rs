//! Error types for confwatch-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::WatchKey;

/// Failures talking to the remote registry.
///
/// Every variant names the operation that failed so one-shot callers can
/// surface the message verbatim.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection refused, DNS failure, timeout and the like.
    #[error("{operation}: transport error: {source}")]
    Transport {
        operation: String,
        #[source]
        source: Box<ureq::Transport>,
    },

    /// The registry answered with a non-success status. `body` is the remote text as received.
    #[error("{operation} failed (HTTP {status}): {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// HTTP 200 but the registry reported the request as not applied.
    #[error("{operation} rejected by registry: {body}")]
    Rejected { operation: String, body: String },

    /// The configuration entry does not exist.
    #[error("configuration {key} not found")]
    NotFound { key: WatchKey },

    /// Reading the response body failed.
    #[error("{operation}: failed to read response: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// The response body was not the JSON shape expected for this operation.
    #[error("{operation}: unexpected response JSON: {source}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// The registry is unreachable for a reason reported by the gateway itself.
    #[error("{operation}: registry unavailable: {reason}")]
    Unavailable { operation: String, reason: String },
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }
}

/// Errors loading or saving the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SettingsError {
    SettingsError::Io {
        path: path.into(),
        source,
    }
}
