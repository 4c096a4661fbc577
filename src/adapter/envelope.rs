//! Request envelope carried through the pipeline.
//!
//! # Responsibilities
//! - Hold method, raw URL, headers, body and the parsed URL
//! - Own the metadata side-channel read by the renderer
//! - Drain the body at most once, chunk by chunk
//!
//! # Design Decisions
//! - Headers live in an `http::HeaderMap` so lookups are case-insensitive
//! - Query keys are unique; inserting an existing key overwrites it
//! - Metadata exposes setters only; nothing is ever removed

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::adapter::error::{AdapterError, AdapterResult};

/// A query value: either a single string or a repeated key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl QueryValue {
    /// The first value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            QueryValue::One(v) => Some(v.as_str()),
            QueryValue::Many(vs) => vs.first().map(String::as_str),
        }
    }

    /// True when any contained value includes `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        match self {
            QueryValue::One(v) => v.contains(needle),
            QueryValue::Many(vs) => vs.iter().any(|v| v.contains(needle)),
        }
    }

    /// Values as a slice-like list.
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::One(v) => vec![v.as_str()],
            QueryValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::One(v.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        QueryValue::One(v)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(vs: Vec<String>) -> Self {
        QueryValue::Many(vs)
    }
}

/// Query mapping. Ordered so that snapshots and output are deterministic.
pub type Query = BTreeMap<String, QueryValue>;

/// Route parameters share the query value representation.
pub type Params = BTreeMap<String, QueryValue>;

/// Parse a raw query string, folding repeated keys into `Many`.
pub fn parse_query(raw: &str) -> Query {
    let mut query = Query::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        let key = key.into_owned();
        let value = value.into_owned();
        match query.remove(&key) {
            None => {
                query.insert(key, QueryValue::One(value));
            }
            Some(QueryValue::One(prev)) => {
                query.insert(key, QueryValue::Many(vec![prev, value]));
            }
            Some(QueryValue::Many(mut prev)) => {
                prev.push(value);
                query.insert(key, QueryValue::Many(prev));
            }
        }
    }
    query
}

/// Serialize a query mapping back into `a=1&b=2` form.
pub fn format_query(query: &Query) -> String {
    let mut out = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in query {
        for v in value.values() {
            out.append_pair(key, v);
        }
    }
    out.finish()
}

/// The pathname and query the pipeline works on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedUrl {
    pub pathname: Option<String>,
    pub query: Query,
}

impl ParsedUrl {
    /// Split a request target such as `/a/b?x=1` into pathname and query.
    pub fn from_target(target: &str) -> Self {
        let without_fragment = target.split('#').next().unwrap_or_default();
        let (path, query) = match without_fragment.split_once('?') {
            Some((p, q)) => (p, parse_query(q)),
            None => (without_fragment, Query::new()),
        };
        Self {
            pathname: Some(path.to_string()),
            query,
        }
    }
}

/// Metadata attached to the request for the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    rewrote_url: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    is_rsc_request: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    is_prefetch_rsc_request: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    postponed: Option<String>,
}

impl RequestMeta {
    pub fn rewrote_url(&self) -> Option<&str> {
        self.rewrote_url.as_deref()
    }

    pub fn is_rsc_request(&self) -> bool {
        self.is_rsc_request
    }

    pub fn is_prefetch_rsc_request(&self) -> bool {
        self.is_prefetch_rsc_request
    }

    pub fn postponed(&self) -> Option<&str> {
        self.postponed.as_deref()
    }

    pub fn set_rewrote_url(&mut self, url: impl Into<String>) {
        self.rewrote_url = Some(url.into());
    }

    pub fn mark_rsc_request(&mut self) {
        self.is_rsc_request = true;
    }

    pub fn mark_prefetch_rsc_request(&mut self) {
        self.is_prefetch_rsc_request = true;
    }

    pub fn set_postponed(&mut self, state: String) {
        self.postponed = Some(state);
    }
}

/// Mutable carrier of a single inbound request.
///
/// Owned exclusively by one `adapt` call; stages borrow it mutably and
/// never retain it.
#[derive(Debug)]
pub struct RequestEnvelope {
    pub method: Method,
    pub url: Option<String>,
    pub headers: HeaderMap,
    pub parsed_url: ParsedUrl,
    body: Option<Body>,
    meta: RequestMeta,
}

impl RequestEnvelope {
    /// Create an envelope from a method and request target (`/path?query`).
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        let target = target.into();
        let parsed_url = ParsedUrl::from_target(&target);
        Self {
            method,
            url: Some(target),
            headers: HeaderMap::new(),
            parsed_url,
            body: None,
            meta: RequestMeta::default(),
        }
    }

    /// Builder-style header insertion. Invalid names or values are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Builder-style body attachment.
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// A header value if present and valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Force a header to `"1"`.
    pub fn mark_header(&mut self, name: &'static str) {
        self.headers
            .insert(HeaderName::from_static(name), HeaderValue::from_static("1"));
    }

    /// The parsed pathname; its absence breaks the pipeline contract.
    pub fn pathname(&self) -> AdapterResult<&str> {
        self.parsed_url
            .pathname
            .as_deref()
            .ok_or(AdapterError::Invariant("parsed pathname is missing"))
    }

    pub fn set_pathname(&mut self, pathname: impl Into<String>) {
        self.parsed_url.pathname = Some(pathname.into());
    }

    pub fn query(&self) -> &Query {
        &self.parsed_url.query
    }

    pub fn query_mut(&mut self) -> &mut Query {
        &mut self.parsed_url.query
    }

    pub fn meta(&self) -> &RequestMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut RequestMeta {
        &mut self.meta
    }

    /// Drain the body and decode it as UTF-8.
    ///
    /// Chunks are pulled one at a time so the transport keeps control of
    /// backpressure. A transport failure mid-stream is returned as an error
    /// rather than a truncated string. A body already consumed yields `""`.
    pub async fn read_body_utf8(&mut self) -> AdapterResult<String> {
        let Some(body) = self.body.take() else {
            return Ok(String::new());
        };
        let mut stream = body.into_data_stream();
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(AdapterError::BodyRead)?;
            buf.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Replace the path component of a request target, keeping query and fragment.
pub fn replace_target_pathname(target: &str, pathname: &str) -> String {
    let split_at = target.find(['?', '#']).unwrap_or(target.len());
    format!("{}{}", pathname, &target[split_at..])
}
