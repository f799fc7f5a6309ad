use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DispatchError, Result};

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Settings for a [`GraphQlClient`](crate::GraphQlClient) and its HTTP transport.
///
/// ```yaml
/// url: https://mail.example.com/api/graphql
/// batch_window_ms: 1
/// timeout_secs: 30
/// headers:
///   Authorization: Bearer abc123
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// The single GraphQL endpoint every request is POSTed to.
    #[serde(default)]
    pub url: String,
    /// How long the scheduler waits after the first submission so that
    /// queries issued in the same burst land in one batch.
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,
    /// Per-request timeout applied by the HTTP transport. None = no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Extra headers sent with every request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

fn default_batch_window_ms() -> u64 {
    1
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        ClientConfig {
            url: url.into(),
            batch_window_ms: default_batch_window_ms(),
            timeout_secs: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: ClientConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(DispatchError::Config("Missing base url".into()));
        }
        if self.timeout_secs == Some(0) {
            return Err(DispatchError::Config(
                "timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
