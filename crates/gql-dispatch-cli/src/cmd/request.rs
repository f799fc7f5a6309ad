use crate::cmd::parse_variables;
use crate::output::print_json;
use anyhow::{Context, Result};
use gql_dispatch::{ClientConfig, GraphQlClient, Upload};

pub fn query(config: &ClientConfig, query: &str, variables: Option<&str>) -> Result<()> {
    let variables = parse_variables(variables)?;

    let rt = tokio::runtime::Runtime::new()?;
    let value = rt
        .block_on(async {
            let client = GraphQlClient::new(config)?;
            client.query(query, variables)?.await
        })
        .context("query failed")?;

    print_json(&value)
}

pub fn mutate(
    config: &ClientConfig,
    query: &str,
    variables: Option<&str>,
    uploads: &[String],
) -> Result<()> {
    let variables = parse_variables(variables)?;
    let uploads = uploads
        .iter()
        .map(|spec| read_upload(spec))
        .collect::<Result<Vec<_>>>()?;

    let rt = tokio::runtime::Runtime::new()?;
    let value = rt
        .block_on(async {
            let client = GraphQlClient::new(config)?;
            client.mutate(query, variables, uploads)?.await
        })
        .context("mutation failed")?;

    print_json(&value)
}

/// Parse `NAME=PATH` and read the file.
fn read_upload(spec: &str) -> Result<Upload> {
    let (name, path) = spec
        .split_once('=')
        .filter(|(name, path)| !name.is_empty() && !path.is_empty())
        .with_context(|| format!("upload '{spec}' must be NAME=PATH"))?;
    let payload =
        std::fs::read(path).with_context(|| format!("failed to read upload '{path}'"))?;
    Ok(Upload::new(name, payload))
}
