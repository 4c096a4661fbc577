//! Renderer seam.
//!
//! Rendering pages is out of this crate's scope. The server hands every
//! normalized envelope to a `Renderer`; the bundled `JsonRenderer` echoes
//! what the pipeline produced, which is what a downstream renderer would
//! consume.

use std::fmt::Debug;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::adapter::rsc::{NEXT_ROUTER_PREFETCH_HEADER, RSC_HEADER};
use crate::adapter::{AdapterError, Query, RequestEnvelope, RequestMeta};
use crate::http::response::error_response;

/// Produces the response for an adapted request.
pub trait Renderer: Send + Sync + Debug {
    fn render(&self, env: &RequestEnvelope) -> Response;

    /// Render a pipeline failure. `env` holds whatever state the pipeline
    /// reached before aborting.
    fn render_error(&self, _env: &RequestEnvelope, err: &AdapterError) -> Response {
        error_response(err)
    }
}

/// Snapshot of a normalized request.
#[derive(Debug, Serialize)]
pub struct Rendered<'a> {
    pub method: &'a str,
    pub url: Option<&'a str>,
    pub pathname: Option<&'a str>,
    pub query: &'a Query,
    pub meta: &'a RequestMeta,
    pub rsc: Option<&'a str>,
    pub prefetch: Option<&'a str>,
}

impl<'a> Rendered<'a> {
    pub fn from_envelope(env: &'a RequestEnvelope) -> Self {
        Self {
            method: env.method.as_str(),
            url: env.url.as_deref(),
            pathname: env.parsed_url.pathname.as_deref(),
            query: env.query(),
            meta: env.meta(),
            rsc: env.header(RSC_HEADER),
            prefetch: env.header(NEXT_ROUTER_PREFETCH_HEADER),
        }
    }
}

/// Replies 200 with the `Rendered` snapshot as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, env: &RequestEnvelope) -> Response {
        (StatusCode::OK, Json(Rendered::from_envelope(env))).into_response()
    }
}
