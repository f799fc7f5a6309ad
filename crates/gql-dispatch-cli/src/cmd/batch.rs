use crate::output::print_json;
use anyhow::{Context, Result};
use gql_dispatch::{Action, ClientConfig, DispatchError, GraphQlClient, Request};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

/// One request in a batch file.
///
/// ```yaml
/// - kind: query
///   query: "query { username }"
/// - kind: mutation
///   query: "mutation ($id: ID!) { touch(id: $id) }"
///   variables: { id: 7 }
/// ```
#[derive(Debug, Deserialize)]
struct BatchEntry {
    kind: String,
    #[serde(flatten)]
    request: Request,
    #[serde(default)]
    collision_key: Option<String>,
}

pub fn run(config: &ClientConfig, file: &Path) -> Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read '{}'", file.display()))?;
    let entries: Vec<BatchEntry> = serde_yaml::from_str(&data)
        .with_context(|| format!("'{}' is not a list of requests", file.display()))?;

    // Validate everything before anything is sent.
    let actions = entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| to_action(entry).with_context(|| format!("batch entry {i}")))
        .collect::<Result<Vec<_>>>()?;

    let rt = tokio::runtime::Runtime::new()?;
    let results = rt.block_on(async {
        let client = GraphQlClient::new(config)?;
        // Submit the whole burst before awaiting anything so the scheduler
        // sees consecutive queries together.
        let futures: Vec<_> = actions.into_iter().map(|a| client.execute(a)).collect();
        let mut results = Vec::with_capacity(futures.len());
        for future in futures {
            results.push(match future.await {
                Ok(value) => json!({ "ok": value }),
                Err(e) => json!({ "error": error_json(&e) }),
            });
        }
        Ok::<_, DispatchError>(results)
    })?;

    print_json(&results)
}

fn to_action(entry: BatchEntry) -> Result<Action> {
    let mut action = Action::parse(&entry.kind, Some(entry.request))?;
    if let Some(key) = entry.collision_key {
        action = action.with_collision_key(key);
    }
    Ok(action)
}

/// The error message, plus the server's details for syntax errors and
/// unattributed error lists.
fn error_json(error: &DispatchError) -> Value {
    let mut out = json!({ "message": error.to_string() });
    match error {
        DispatchError::Syntax { locations } => out["locations"] = json!(locations),
        DispatchError::Multi(errors) => out["errors"] = json!(errors),
        _ => {}
    }
    out
}
