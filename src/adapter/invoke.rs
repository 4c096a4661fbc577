//! Invocation pre-check.
//!
//! # Responsibilities
//! - Detect an already-failed internal dispatch (`x-invoke-status`)
//! - Relay it as an `InvocationError` carrying status, cause and query
//! - Apply an internal `x-invoke-path` override otherwise
//!
//! # Design Decisions
//! - Malformed header content degrades (NaN status, empty cause message),
//!   it never becomes a parse failure
//! - Reads: headers, query, pathname. Writes: query, pathname, `rewroteURL`

use serde_json::Value;

use crate::adapter::envelope::{Query, QueryValue, RequestEnvelope};
use crate::adapter::error::{AdapterResult, InvocationCause, InvocationError};

pub const INVOKE_PATH_HEADER: &str = "x-invoke-path";
pub const INVOKE_QUERY_HEADER: &str = "x-invoke-query";
pub const INVOKE_STATUS_HEADER: &str = "x-invoke-status";
pub const INVOKE_ERROR_HEADER: &str = "x-invoke-error";

/// Run the pre-check. Returns `Err(Invocation)` when the dispatch already failed.
pub fn precheck(env: &mut RequestEnvelope) -> AdapterResult<()> {
    if let Some(status) = env.headers.get(INVOKE_STATUS_HEADER) {
        let status_code = status
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<u16>().ok());

        env.query_mut().retain(|key, _| is_internal_key(key));
        merge_invoke_query(env);

        let cause = env
            .headers
            .get(INVOKE_ERROR_HEADER)
            .map(|raw| parse_cause(&String::from_utf8_lossy(raw.as_bytes())));

        return Err(InvocationError {
            status_code,
            cause,
            query: env.query().clone(),
        }
        .into());
    }

    if let Some(invoke_path) = env.header(INVOKE_PATH_HEADER).map(str::to_string) {
        merge_invoke_query(env);
        if env.parsed_url.pathname.as_deref() != Some(invoke_path.as_str()) {
            env.meta_mut().set_rewrote_url(invoke_path.clone());
        }
        tracing::debug!(invoke_path = %invoke_path, "Applied invoke path override");
        env.set_pathname(invoke_path);
    }
    Ok(())
}

/// Keys belonging to the internal routing namespace.
fn is_internal_key(key: &str) -> bool {
    key.starts_with("__next") || key.starts_with("_next")
}

/// Merge the URL-encoded JSON object from `x-invoke-query` into the query.
fn merge_invoke_query(env: &mut RequestEnvelope) {
    let Some(raw) = env.header(INVOKE_QUERY_HEADER) else {
        return;
    };
    match decode_invoke_query(raw) {
        Some(extra) => env.query_mut().extend(extra),
        None => tracing::warn!(header = INVOKE_QUERY_HEADER, "Ignoring malformed invoke query"),
    }
}

fn decode_invoke_query(raw: &str) -> Option<Query> {
    let decoded = urlencoding::decode(raw).ok()?;
    let Value::Object(map) = serde_json::from_str::<Value>(&decoded).ok()? else {
        return None;
    };
    Some(
        map.into_iter()
            .map(|(key, value)| (key, json_to_query_value(value)))
            .collect(),
    )
}

fn json_to_query_value(value: Value) -> QueryValue {
    match value {
        Value::String(s) => QueryValue::One(s),
        Value::Array(items) => QueryValue::Many(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        ),
        other => QueryValue::One(other.to_string()),
    }
}

/// Extract `{ "message": ... }` from the `x-invoke-error` header.
fn parse_cause(raw: &str) -> InvocationCause {
    let message = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => match map.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        },
        Ok(_) => String::new(),
        Err(e) => {
            tracing::debug!(error = %e, "Malformed invoke error cause");
            String::new()
        }
    };
    InvocationCause { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::error::AdapterError;
    use axum::http::Method;

    fn invocation(env: &mut RequestEnvelope) -> InvocationError {
        match precheck(env) {
            Err(AdapterError::Invocation(e)) => e,
            other => panic!("expected invocation error, got {other:?}"),
        }
    }

    #[test]
    fn test_status_and_cause() {
        let mut env = RequestEnvelope::new(Method::GET, "/page?user=1&__nextLocale=en")
            .with_header("x-invoke-status", "500")
            .with_header("x-invoke-error", r#"{"message":"boom"}"#);
        let err = invocation(&mut env);
        assert_eq!(err.status_code, Some(500));
        assert_eq!(err.cause.unwrap().message, "boom");
        assert!(err.query.contains_key("__nextLocale"));
        assert!(!err.query.contains_key("user"));
    }

    #[test]
    fn test_malformed_cause_and_status() {
        let mut env = RequestEnvelope::new(Method::GET, "/page")
            .with_header("x-invoke-status", "abc")
            .with_header("x-invoke-error", "not json");
        let err = invocation(&mut env);
        assert_eq!(err.status_code, None);
        assert_eq!(err.cause.unwrap().message, "");
    }

    #[test]
    fn test_missing_cause_header() {
        let mut env =
            RequestEnvelope::new(Method::GET, "/page").with_header("x-invoke-status", "404");
        let err = invocation(&mut env);
        assert_eq!(err.status_code, Some(404));
        assert!(err.cause.is_none());
    }

    #[test]
    fn test_invoke_query_is_merged() {
        let encoded = urlencoding::encode(r#"{"slug":"a","tags":["x","y"]}"#).into_owned();
        let mut env = RequestEnvelope::new(Method::GET, "/page?_nextBubble=1")
            .with_header("x-invoke-status", "500")
            .with_header("x-invoke-query", &encoded);
        let err = invocation(&mut env);
        assert_eq!(err.query.get("slug"), Some(&QueryValue::One("a".into())));
        assert_eq!(
            err.query.get("tags"),
            Some(&QueryValue::Many(vec!["x".into(), "y".into()]))
        );
        assert!(err.query.contains_key("_nextBubble"));
    }

    #[test]
    fn test_invoke_path_records_rewrite_only_when_changed() {
        let mut env =
            RequestEnvelope::new(Method::GET, "/a").with_header("x-invoke-path", "/b");
        precheck(&mut env).unwrap();
        assert_eq!(env.pathname().unwrap(), "/b");
        assert_eq!(env.meta().rewrote_url(), Some("/b"));

        let mut env =
            RequestEnvelope::new(Method::GET, "/a").with_header("x-invoke-path", "/a");
        precheck(&mut env).unwrap();
        assert_eq!(env.meta().rewrote_url(), None);
    }

    #[test]
    fn test_no_invoke_headers_is_noop() {
        let mut env = RequestEnvelope::new(Method::GET, "/a?x=1");
        precheck(&mut env).unwrap();
        assert_eq!(env.pathname().unwrap(), "/a");
        assert!(env.query().contains_key("x"));
    }
}
