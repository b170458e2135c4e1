//! Typed collaborator ports (§6.2, §6.3): the engine depends on these
//! traits, never on a concrete database or HTTP client, so it can run
//! against in-memory test doubles.
//!
//! Grounded on `ports/src/workflow.rs`'s `WorkflowRepo` shape: a plain
//! async trait over `serde_json::Value`, object-safe, `Send + Sync`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use relay_error::RelayError;
use serde_json::Value;

/// The opaque persistence collaborator (§6.2): execution history and the
/// `database` connector's queries both go through this, never through a
/// concrete SQL driver.
#[async_trait]
pub trait DataPort: Send + Sync {
    async fn query(&self, collection: &str, filter: Value) -> Result<Vec<Value>, RelayError>;
    async fn insert(&self, collection: &str, record: Value) -> Result<(), RelayError>;
}

/// In-memory `DataPort` double: rows per collection, `filter` ignored
/// beyond an optional `{"eq": {field, value}}` shape used by tests.
#[derive(Default)]
pub struct InMemoryDataPort {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryDataPort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn seed(self, collection: impl Into<String>, rows: Vec<Value>) -> Self {
        self.collections.write().insert(collection.into(), rows);
        self
    }
}

#[async_trait]
impl DataPort for InMemoryDataPort {
    async fn query(&self, collection: &str, filter: Value) -> Result<Vec<Value>, RelayError> {
        let rows = self.collections.read().get(collection).cloned().unwrap_or_default();
        let Some(eq) = filter.get("eq") else {
            return Ok(rows);
        };
        let field = eq.get("field").and_then(Value::as_str).unwrap_or_default();
        let value = eq.get("value").cloned().unwrap_or(Value::Null);
        Ok(rows
            .into_iter()
            .filter(|row| row.get(field) == Some(&value))
            .collect())
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<(), RelayError> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(record);
        Ok(())
    }
}

/// Outbound HTTP (§6.3). One method, so the `http-request` adapter and the
/// `webhook` adapter share a single transport abstraction.
#[derive(Debug, Clone)]
pub struct HttpRequestSpec {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpResponseSpec {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

#[async_trait]
pub trait HttpPort: Send + Sync {
    async fn request(&self, spec: HttpRequestSpec) -> Result<HttpResponseSpec, RelayError>;
}

/// Production `HttpPort` backed by `reqwest`.
pub struct ReqwestHttpPort {
    client: reqwest::Client,
}

impl ReqwestHttpPort {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestHttpPort {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpPort for ReqwestHttpPort {
    async fn request(&self, spec: HttpRequestSpec) -> Result<HttpResponseSpec, RelayError> {
        let method = reqwest::Method::from_bytes(spec.method.to_uppercase().as_bytes())
            .map_err(|e| RelayError::validation(format!("invalid HTTP method: {e}")))?;

        let mut builder = self.client.request(method, &spec.url).timeout(spec.timeout);
        for (key, value) in &spec.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &spec.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RelayError::transport(format!("HTTP request failed: {e}")))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response
            .json::<Value>()
            .await
            .unwrap_or(Value::Null);

        Ok(HttpResponseSpec { status, headers, body })
    }
}

/// `HttpPort` test double: returns queued canned responses, FIFO, and
/// records every request it was asked to make.
#[derive(Default)]
pub struct MockHttpPort {
    responses: RwLock<Vec<HttpResponseSpec>>,
    requests: RwLock<Vec<HttpRequestSpec>>,
}

impl MockHttpPort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_response(&self, response: HttpResponseSpec) {
        self.responses.write().push(response);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequestSpec> {
        self.requests.read().clone()
    }
}

#[async_trait]
impl HttpPort for MockHttpPort {
    async fn request(&self, spec: HttpRequestSpec) -> Result<HttpResponseSpec, RelayError> {
        self.requests.write().push(spec);
        let mut responses = self.responses.write();
        if responses.is_empty() {
            return Err(RelayError::transport("no mock response queued"));
        }
        Ok(responses.remove(0))
    }
}
