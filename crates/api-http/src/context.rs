//! Request Context
//!
//! Transport-independent view of one inbound request.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use metarepo_core::{AppError, Result};
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Header value, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Deserialize the request body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(AppError::from)
    }
}
