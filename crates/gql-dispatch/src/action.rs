use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::{DispatchError, Result};

// ─── ActionKind ───────────────────────────────────────────────────────────

/// Whether an action reads (query) or writes (mutation).
///
/// The scheduler batches consecutive queries and dispatches every mutation
/// on its own, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Query,
    Mutation,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Query => "query",
            ActionKind::Mutation => "mutation",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = DispatchError;

    /// Accepts `query` / `mutation` in any case, and the wire names
    /// `GRAPHQL_QUERY` / `GRAPHQL_MUTATION`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" | "graphql_query" => Ok(ActionKind::Query),
            "mutation" | "graphql_mutation" => Ok(ActionKind::Mutation),
            _ => Err(DispatchError::InvalidActionKind(s.to_string())),
        }
    }
}

// ─── Request payload ──────────────────────────────────────────────────────

/// The body of one GraphQL request: document text plus variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Request {
            query: query.into(),
            variables: None,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

impl From<&str> for Request {
    fn from(query: &str) -> Self {
        Request::new(query)
    }
}

impl From<String> for Request {
    fn from(query: String) -> Self {
        Request::new(query)
    }
}

/// A named binary attachment sent alongside a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub payload: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Upload {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

// ─── ActionFuture ─────────────────────────────────────────────────────────

/// Read-only handle on an action's eventual outcome.
///
/// Cloning yields the same underlying handle; every clone observes the same
/// value once the action settles.
#[derive(Clone)]
pub struct ActionFuture {
    inner: Shared<BoxFuture<'static, Result<Value>>>,
}

impl ActionFuture {
    /// `true` if both handles observe the same action.
    pub fn ptr_eq(&self, other: &ActionFuture) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// The outcome if the action has already settled. Never waits.
    pub fn peek(&self) -> Option<Result<Value>> {
        self.inner.clone().now_or_never()
    }
}

impl fmt::Debug for ActionFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionFuture")
            .field("settled", &self.peek().is_some())
            .finish()
    }
}

impl Future for ActionFuture {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

/// One-shot result cell: the sender half is owned by the action, the
/// receiver half is shared out as an [`ActionFuture`].
struct Deferred {
    tx: Option<oneshot::Sender<Result<Value>>>,
    future: ActionFuture,
}

impl Deferred {
    fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        let inner = rx
            .map(|outcome| outcome.unwrap_or(Err(DispatchError::Abandoned)))
            .boxed()
            .shared();
        Deferred {
            tx: Some(tx),
            future: ActionFuture { inner },
        }
    }

    fn settle(&mut self, outcome: Result<Value>) -> bool {
        match self.tx.take() {
            // The caller may have dropped every handle; that is not our concern.
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

// ─── Action ───────────────────────────────────────────────────────────────

/// One pending query or mutation together with its deferred result.
pub struct Action {
    kind: ActionKind,
    request: Request,
    collision_key: Option<String>,
    uploads: Vec<Upload>,
    result: Deferred,
}

impl Action {
    /// Build an action, rejecting an absent or blank request.
    pub fn new(kind: ActionKind, request: Option<Request>) -> Result<Self> {
        let request = request.ok_or(DispatchError::MissingPayload)?;
        if request.query.trim().is_empty() {
            return Err(DispatchError::MissingPayload);
        }
        Ok(Action {
            kind,
            request,
            collision_key: None,
            uploads: Vec::new(),
            result: Deferred::new(),
        })
    }

    /// Build an action from a textual kind such as `"query"` or
    /// `"GRAPHQL_MUTATION"`.
    pub fn parse(kind: &str, request: Option<Request>) -> Result<Self> {
        Action::new(kind.parse()?, request)
    }

    pub fn query(request: impl Into<Request>) -> Result<Self> {
        Action::new(ActionKind::Query, Some(request.into()))
    }

    pub fn mutation(request: impl Into<Request>) -> Result<Self> {
        Action::new(ActionKind::Mutation, Some(request.into()))
    }

    pub fn with_collision_key(mut self, key: impl Into<String>) -> Self {
        self.collision_key = Some(key.into());
        self
    }

    /// Attach uploads. Queries never carry uploads, so they are discarded
    /// for a query action.
    pub fn with_uploads(mut self, uploads: Vec<Upload>) -> Self {
        match self.kind {
            ActionKind::Mutation => self.uploads = uploads,
            ActionKind::Query if !uploads.is_empty() => {
                tracing::debug!(count = uploads.len(), "discarding uploads on a query action");
            }
            ActionKind::Query => {}
        }
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn is_query(&self) -> bool {
        self.kind == ActionKind::Query
    }

    pub fn is_mutation(&self) -> bool {
        self.kind == ActionKind::Mutation
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn collision_key(&self) -> Option<&str> {
        self.collision_key.as_deref()
    }

    pub fn uploads(&self) -> &[Upload] {
        &self.uploads
    }

    /// The caller's handle on this action's outcome. Always the same handle.
    pub fn future(&self) -> ActionFuture {
        self.result.future.clone()
    }

    /// Settle with a value. Returns `false` if the action had already settled.
    pub fn resolve(&mut self, value: Value) -> bool {
        self.result.settle(Ok(value))
    }

    /// Settle with an error. Returns `false` if the action had already settled.
    pub fn reject(&mut self, reason: DispatchError) -> bool {
        self.result.settle(Err(reason))
    }

    /// Settle with whichever outcome the transport produced.
    pub fn settle(&mut self, outcome: Result<Value>) -> bool {
        self.result.settle(outcome)
    }

    pub fn is_settled(&self) -> bool {
        self.result.tx.is_none()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("kind", &self.kind)
            .field("request", &self.request)
            .field("collision_key", &self.collision_key)
            .field("uploads", &self.uploads.len())
            .field("settled", &self.is_settled())
            .finish()
    }
}
