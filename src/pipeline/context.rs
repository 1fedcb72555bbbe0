//! Per-request context handed to stages and handlers

use crate::error::{PipelineError, Rejection, Result};
use axum::extract::Query;
use axum::http::{header, HeaderMap, Method, Uri};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::OnceLock;
use uuid::Uuid;

/// Immutable view of an inbound request.
///
/// The JSON body is parsed lazily and at most once, so a content-type
/// rejection never pays for parsing.
#[derive(Debug)]
pub struct RequestContext {
    request_id: Uuid,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    raw_body: Bytes,
    path_params: HashMap<String, String>,
    peer_addr: Option<SocketAddr>,
    parsed_body: OnceLock<std::result::Result<Value, String>>,
}

impl RequestContext {
    /// Create a context from the request parts
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, raw_body: Bytes) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            method,
            uri,
            headers,
            raw_body,
            path_params: HashMap::new(),
            peer_addr: None,
            parsed_body: OnceLock::new(),
        }
    }

    /// Attach the remote socket address
    pub fn with_peer_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.peer_addr = addr;
        self
    }

    /// Attach matched route parameters
    pub fn with_path_params(mut self, params: HashMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, `None` when absent or not visible ASCII
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE)
    }

    pub fn if_none_match(&self) -> Option<&str> {
        self.header(header::IF_NONE_MATCH)
    }

    pub fn raw_body(&self) -> &Bytes {
        &self.raw_body
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Deserialize the query string, `None` when it does not fit `T`
    pub fn query<T: DeserializeOwned>(&self) -> Option<T> {
        Query::<T>::try_from_uri(&self.uri).ok().map(|Query(q)| q)
    }

    /// Parsed JSON body; the error carries the parser message
    pub fn json_body(&self) -> std::result::Result<&Value, &str> {
        self.parsed_body
            .get_or_init(|| serde_json::from_slice(&self.raw_body).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(String::as_str)
    }

    /// Deserialize the JSON body into `T`
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self
            .json_body()
            .map_err(|e| PipelineError::Rejected(Rejection::MalformedBody(e.to_string())))?;
        Ok(serde_json::from_value(value.clone())?)
    }
}
