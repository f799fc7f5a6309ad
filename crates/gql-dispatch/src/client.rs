use serde_json::Value;

use crate::action::{Action, ActionFuture, Request, Upload};
use crate::config::ClientConfig;
use crate::executor::ActionExecutor;
use crate::transport::{HttpTransport, Transport};
use crate::Result;

/// Entry point for callers: builds actions and hands them to one executor.
///
/// ```rust,ignore
/// use gql_dispatch::{ClientConfig, GraphQlClient};
///
/// let client = GraphQlClient::new(&ClientConfig::new("https://example.com/api/graphql"))?;
/// // Issued back to back, these two queries travel in one batched request.
/// let folders = client.query("query { getMailFolders { name } }", None)?;
/// let prefs = client.query("query { getPreferences { foo } }", None)?;
/// let (folders, prefs) = tokio::join!(folders, prefs);
/// ```
#[derive(Debug)]
pub struct GraphQlClient {
    executor: ActionExecutor,
}

impl GraphQlClient {
    /// Client backed by an [`HttpTransport`] for `config.url`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(transport, config))
    }

    /// Client backed by any transport; `config` only supplies scheduling
    /// settings here.
    pub fn with_transport<T: Transport>(transport: T, config: &ClientConfig) -> Self {
        GraphQlClient {
            executor: ActionExecutor::with_batch_window(transport, config.batch_window()),
        }
    }

    pub fn query(&self, query: impl Into<String>, variables: Option<Value>) -> Result<ActionFuture> {
        let action = Action::query(request(query, variables))?;
        Ok(self.execute(action))
    }

    pub fn mutate(
        &self,
        query: impl Into<String>,
        variables: Option<Value>,
        uploads: Vec<Upload>,
    ) -> Result<ActionFuture> {
        let action = Action::mutation(request(query, variables))?.with_uploads(uploads);
        Ok(self.execute(action))
    }

    pub fn execute(&self, action: Action) -> ActionFuture {
        self.executor.execute(action)
    }
}

fn request(query: impl Into<String>, variables: Option<Value>) -> Request {
    Request {
        query: query.into(),
        variables,
    }
}
