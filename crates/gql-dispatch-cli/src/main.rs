mod cmd;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gqlq",
    about = "Send GraphQL queries and mutations; bursts of queries are batched into one request",
    version,
    propagate_version = true
)]
struct Cli {
    /// GraphQL endpoint (overrides `url` from the config file)
    #[arg(long, global = true, env = "GQL_DISPATCH_URL")]
    url: Option<String>,

    /// Client config file (YAML)
    #[arg(long, global = true, env = "GQL_DISPATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single query
    Query {
        /// GraphQL document
        query: String,

        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,
    },

    /// Run a single mutation, optionally with file uploads
    Mutate {
        /// GraphQL document
        query: String,

        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,

        /// Attach a file as a multipart upload part
        #[arg(long = "upload", value_name = "NAME=PATH")]
        uploads: Vec<String>,
    },

    /// Submit every request listed in a YAML file in one burst
    Batch {
        /// YAML list of `{kind, query, variables?, collision_key?}`
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = cmd::resolve_config(cli.url, cli.config.as_deref()).and_then(|config| {
        match cli.command {
            Commands::Query { query, variables } => {
                cmd::request::query(&config, &query, variables.as_deref())
            }
            Commands::Mutate {
                query,
                variables,
                uploads,
            } => cmd::request::mutate(&config, &query, variables.as_deref(), &uploads),
            Commands::Batch { file } => cmd::batch::run(&config, &file),
        }
    });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
