//! Adapter error definitions.

use thiserror::Error;

use crate::adapter::envelope::Query;

/// Cause relayed from an upstream invocation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationCause {
    pub message: String,
}

/// Terminal signal raised when the request is an already-failed dispatch.
///
/// This is not a bug in the pipeline: the caller renders it as an error page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("upstream invocation failed (status {})", display_status(.status_code))]
pub struct InvocationError {
    /// `None` when `x-invoke-status` was not a number.
    pub status_code: Option<u16>,
    pub cause: Option<InvocationCause>,
    /// Query mapping at the moment the failure was detected.
    pub query: Query,
}

fn display_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "NaN".to_string(),
    }
}

/// Errors that abort `adapt`.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A field the trusted proxy guarantees was missing.
    #[error("invariant violated: {0}")]
    Invariant(&'static str),

    /// Upstream invocation already failed.
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// The transport aborted while the body was drained.
    #[error("failed to read request body")]
    BodyRead(#[source] axum::Error),

    /// A path or parameter could not be percent-decoded.
    #[error("failed to decode {0}")]
    Decode(String),
}

/// Result type for pipeline stages.
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InvocationError {
            status_code: Some(500),
            cause: None,
            query: Query::new(),
        };
        assert_eq!(err.to_string(), "upstream invocation failed (status 500)");

        let err = InvocationError {
            status_code: None,
            cause: None,
            query: Query::new(),
        };
        assert!(err.to_string().contains("NaN"));

        let err = AdapterError::Invariant("x-matched-path header is missing");
        assert_eq!(
            err.to_string(),
            "invariant violated: x-matched-path header is missing"
        );
    }
}
