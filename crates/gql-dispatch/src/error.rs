use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A `(line, column)` position reported by the server for a syntax error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// Every failure an action can observe.
///
/// The type is `Clone` because a failed batch rejects each of its member
/// actions with the same error. Non-cloneable sources are held in an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("invalid action kind: {0}")]
    InvalidActionKind(String),

    #[error("action has no request payload")]
    MissingPayload,

    #[error("GraphQL syntax error ({} location(s))", .locations.len())]
    Syntax { locations: Vec<SourceLocation> },

    #[error("{message}")]
    Protocol { message: String },

    #[error("{} unattributed GraphQL errors", .0.len())]
    Multi(Vec<Value>),

    #[error("batch response has no entry for action {index}")]
    MissingBatchEntry { index: usize },

    #[error("network interface error calling {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Arc<reqwest::Error>,
    },

    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("unknown HTTP status {status}")]
    UnknownHttp { status: u16 },

    #[error("failed to decode response body: {0}")]
    Decode(#[source] Arc<serde_json::Error>),

    #[error("action executor is closed")]
    ExecutorClosed,

    #[error("action was dropped before it settled")]
    Abandoned,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    #[error("invalid YAML: {0}")]
    Yaml(#[source] Arc<serde_yaml::Error>),
}

impl DispatchError {
    /// `true` for failures raised before the request reached the server's
    /// GraphQL layer (connection, status, body decoding).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DispatchError::Network { .. }
                | DispatchError::Http { .. }
                | DispatchError::UnknownHttp { .. }
                | DispatchError::Decode(_)
        )
    }
}

impl From<std::io::Error> for DispatchError {
    fn from(e: std::io::Error) -> Self {
        DispatchError::Io(Arc::new(e))
    }
}

impl From<serde_yaml::Error> for DispatchError {
    fn from(e: serde_yaml::Error) -> Self {
        DispatchError::Yaml(Arc::new(e))
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(e: serde_json::Error) -> Self {
        DispatchError::Decode(Arc::new(e))
    }
}
