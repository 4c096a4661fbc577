//! Error responses.
//!
//! # Responsibilities
//! - Map every `AdapterError` to a status code
//! - Render a JSON error body the downstream error page can consume
//!
//! # Design Decisions
//! - Invocation failures keep the relayed status; anything unusable becomes 500
//! - Client-side faults (undecodable input, aborted body) are 400
//! - Invariant violations mean the trusted proxy misbehaved: 500

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::adapter::{AdapterError, Query};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a Query>,
}

/// Stable machine-readable error kind.
pub fn error_kind(err: &AdapterError) -> &'static str {
    match err {
        AdapterError::Invariant(_) => "invariant",
        AdapterError::Invocation(_) => "invocation_error",
        AdapterError::BodyRead(_) => "body_read",
        AdapterError::Decode(_) => "decode",
    }
}

pub fn status_for(err: &AdapterError) -> StatusCode {
    match err {
        AdapterError::Invocation(e) => e
            .status_code
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        AdapterError::Decode(_) | AdapterError::BodyRead(_) => StatusCode::BAD_REQUEST,
        AdapterError::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error response for `err`.
pub fn error_response(err: &AdapterError) -> Response {
    let (cause, query) = match err {
        AdapterError::Invocation(e) => (
            e.cause.as_ref().map(|c| c.message.as_str()),
            Some(&e.query),
        ),
        _ => (None, None),
    };
    let body = ErrorBody {
        error: error_kind(err),
        message: err.to_string(),
        cause,
        query,
    };
    (status_for(err), Json(body)).into_response()
}

impl IntoResponse for AdapterError {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{InvocationCause, InvocationError};

    fn invocation(status_code: Option<u16>) -> AdapterError {
        AdapterError::Invocation(InvocationError {
            status_code,
            cause: Some(InvocationCause {
                message: "boom".into(),
            }),
            query: Query::new(),
        })
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&invocation(Some(503))), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_for(&invocation(None)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&invocation(Some(42))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&AdapterError::Decode("%zz".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AdapterError::Invariant("x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_invocation_body_carries_cause() {
        let response = invocation(Some(500)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "invocation_error");
        assert_eq!(json["cause"], "boom");
        assert!(json["query"].is_object());
    }
}
