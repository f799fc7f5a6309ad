use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::debug;

use crate::action::Action;
use crate::config::ClientConfig;
use crate::interpret::{interpret_batch, interpret_body};
use crate::{DispatchError, Result};

// ─── Transport trait ──────────────────────────────────────────────────────

/// Sends actions to the server. The executor decides which method is used.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send one action on its own.
    async fn send_one(&self, action: &Action) -> Result<Value>;

    /// Send several queries in one request. Element `i` of the result
    /// belongs to `actions[i]`; an `Err` from the call itself fails them all.
    async fn send_batch(&self, actions: &[Action]) -> Result<Vec<Result<Value>>>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_one(&self, action: &Action) -> Result<Value> {
        (**self).send_one(action).await
    }

    async fn send_batch(&self, actions: &[Action]) -> Result<Vec<Result<Value>>> {
        (**self).send_batch(actions).await
    }
}

// ─── HttpTransport ────────────────────────────────────────────────────────

/// Callback receiving the headers of every successful HTTP response.
pub type SuccessHook = Arc<dyn Fn(&HeaderMap) + Send + Sync>;

/// [`Transport`] that POSTs to a single GraphQL endpoint.
///
/// - plain requests are sent as a JSON object;
/// - mutations with uploads as `multipart/form-data` with the JSON request in
///   a `request` part and one part per upload;
/// - batches as a JSON array of request objects.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    on_success: Option<SuccessHook>,
}

enum Body {
    Json(Value),
    Multipart(Form),
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| DispatchError::Config(format!("failed to build HTTP client: {e}")))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| DispatchError::Config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                DispatchError::Config(format!("invalid value for header '{name}': {e}"))
            })?;
            headers.insert(name, value);
        }

        Ok(HttpTransport {
            client,
            url: config.url.clone(),
            headers,
            on_success: None,
        })
    }

    /// Register a callback that sees the headers of every successful response.
    pub fn on_success(mut self, hook: impl Fn(&HeaderMap) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(hook));
        self
    }

    fn body_for(action: &Action) -> Result<Body> {
        let request = serde_json::to_value(action.request())?;
        if action.is_query() || action.uploads().is_empty() {
            return Ok(Body::Json(request));
        }

        let mut form = Form::new().text("request", request.to_string());
        for upload in action.uploads() {
            form = form.part(
                upload.name.clone(),
                Part::bytes(upload.payload.clone()).file_name(upload.name.clone()),
            );
        }
        Ok(Body::Multipart(form))
    }

    /// POST `body` and decode the JSON response.
    async fn post(&self, body: Body) -> Result<Value> {
        let request = self.client.post(&self.url).headers(self.headers.clone());
        let request = match body {
            Body::Json(value) => request.json(&value),
            Body::Multipart(form) => request.multipart(form),
        };

        let response = request.send().await.map_err(|e| DispatchError::Network {
            url: self.url.clone(),
            source: Arc::new(e),
        })?;

        let status = response.status();
        if !(200..=399).contains(&status.as_u16()) {
            return Err(match status.canonical_reason() {
                Some(reason) => DispatchError::Http {
                    status: status.as_u16(),
                    reason: reason.to_string(),
                },
                None => DispatchError::UnknownHttp {
                    status: status.as_u16(),
                },
            });
        }

        if let Some(hook) = &self.on_success {
            hook(response.headers());
        }

        let bytes = response.bytes().await.map_err(|e| DispatchError::Network {
            url: self.url.clone(),
            source: Arc::new(e),
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url)
            .field("headers", &self.headers.len())
            .field("on_success", &self.on_success.is_some())
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_one(&self, action: &Action) -> Result<Value> {
        debug!(kind = %action.kind(), uploads = action.uploads().len(), "POST single request");
        let body = Self::body_for(action)?;
        interpret_body(self.post(body).await?)
    }

    async fn send_batch(&self, actions: &[Action]) -> Result<Vec<Result<Value>>> {
        debug!(size = actions.len(), "POST batched request");
        let requests = actions
            .iter()
            .map(|a| serde_json::to_value(a.request()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let body = self.post(Body::Json(Value::Array(requests))).await?;
        Ok(interpret_batch(body)?.into_iter().map(Ok).collect())
    }
}
