//! Request handling and transformation.
//!
//! # Responsibilities
//! - Turn an inbound axum request into a `RequestEnvelope`
//! - Extract the correlation ID set by the request-id middleware
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (middleware)
//! - The body is attached unread; only the postponed stage drains it
//! - Headers move into the envelope untouched, trusted proxy headers included

use axum::body::Body;
use axum::http::{HeaderMap, Request};

use crate::adapter::RequestEnvelope;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Build an envelope from the request target, headers and body.
pub fn envelope_from_request(request: Request<Body>) -> RequestEnvelope {
    let (parts, body) = request.into_parts();
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let mut env = RequestEnvelope::new(parts.method, target).with_body(body);
    env.headers = parts.headers;
    env
}

/// The request ID, or `"unknown"` when the middleware did not run.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[tokio::test]
    async fn test_envelope_from_request() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("http://localhost/blog/a?x=1")
            .header("X-Matched-Path", "/blog/[slug]")
            .body(Body::from("state"))
            .unwrap();

        let mut env = envelope_from_request(request);
        assert_eq!(env.method, Method::POST);
        assert_eq!(env.url.as_deref(), Some("/blog/a?x=1"));
        assert_eq!(env.pathname().unwrap(), "/blog/a");
        assert_eq!(env.header("x-matched-path"), Some("/blog/[slug]"));
        assert_eq!(env.read_body_utf8().await.unwrap(), "state");
    }

    #[test]
    fn test_request_id_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        headers.insert(X_REQUEST_ID, "abc".parse().unwrap());
        assert_eq!(request_id(&headers), "abc");
    }
}
