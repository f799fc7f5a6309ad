pub mod batch;
pub mod request;

use anyhow::Context;
use gql_dispatch::ClientConfig;
use serde_json::Value;
use std::path::Path;

/// Build the client config.
///
/// Priority:
/// 1. `--url` flag / `GQL_DISPATCH_URL` env var (passed in as `url`)
/// 2. `url` from the `--config` file
///
/// Everything except the url comes from the config file when one is given,
/// and from defaults otherwise.
pub fn resolve_config(url: Option<String>, config: Option<&Path>) -> anyhow::Result<ClientConfig> {
    let mut cfg = match config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => ClientConfig::new(""),
    };
    if let Some(url) = url {
        cfg.url = url;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Parse `--variables` as a JSON value.
pub fn parse_variables(raw: Option<&str>) -> anyhow::Result<Option<Value>> {
    raw.map(|s| serde_json::from_str(s).context("--variables is not valid JSON"))
        .transpose()
}
