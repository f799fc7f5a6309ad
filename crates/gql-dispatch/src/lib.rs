//! `gql-dispatch`: client-side dispatcher for a GraphQL endpoint.
//!
//! Callers submit queries and mutations one at a time and get back a future
//! per request. Behind that, queries issued in the same burst are coalesced
//! into one batched HTTP call, while mutations are sent strictly one by one in
//! arrival order.
//!
//! # Architecture
//!
//! ```text
//! GraphQlClient::query / mutate
//!     │
//!     ▼
//! Action          ← request payload + one-shot result cell
//!     │              caller keeps an ActionFuture
//!     ▼
//! ActionExecutor  ← scheduler task owning the ActionQueue
//!     │              query runs → send_batch, mutations → send_one
//!     ▼
//! Transport       ← HttpTransport: JSON / multipart / JSON-array POST
//!     │
//!     ▼
//! interpret       ← attaches per-field errors, classifies the rest
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use gql_dispatch::{ClientConfig, GraphQlClient};
//!
//! let client = GraphQlClient::new(&ClientConfig::new("https://example.com/api/graphql"))?;
//! let user = client.query("query { username }", None)?;
//! let age = client.query("query { age }", None)?;
//! println!("{} {}", user.await?, age.await?);
//! ```

pub mod action;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod interpret;
pub mod queue;
pub mod transport;


pub use action::{Action, ActionFuture, ActionKind, Request, Upload};
pub use client::GraphQlClient;
pub use config::ClientConfig;
pub use error::{DispatchError, SourceLocation};
pub use executor::ActionExecutor;
pub use queue::ActionQueue;
pub use transport::{HttpTransport, Transport};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, DispatchError>;
