//! Matched-path extraction and postponed body consumption.
//!
//! # Responsibilities
//! - Read the proxy's `x-matched-path` and the raw URL pathname separately
//! - Mark data requests; drain the resume state of postponed POSTs
//! - Normalize both pathnames through the shape chain
//!
//! # Design Decisions
//! - Both values are parsed as standalone URLs so their query strings never mix
//! - `x-now-route-matches`, when present, outranks postponed normalization
//! - Reads: headers, url, method, body. Writes: query, metadata

use axum::http::Method;
use url::Url;

use crate::adapter::envelope::RequestEnvelope;
use crate::adapter::error::{AdapterError, AdapterResult};
use crate::adapter::DATA_REQ_KEY;
use crate::routing::{Normalizers, Shape};

pub const MATCHED_PATH_HEADER: &str = "x-matched-path";
pub const ROUTE_MATCHES_HEADER: &str = "x-now-route-matches";

/// Pathnames the later stages work from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPaths {
    /// Shape of the matched path, `None` for a plain page.
    pub shape: Option<Shape>,
    /// Shape-normalized `x-matched-path`.
    pub matched_path: String,
    /// Shape-normalized pathname of the raw URL, base path removed.
    pub url_pathname: String,
}

/// Extract and normalize the matched and URL pathnames.
pub async fn extract_matched_path(
    env: &mut RequestEnvelope,
    normalizers: &Normalizers,
) -> AdapterResult<MatchedPaths> {
    let raw_matched = env
        .header(MATCHED_PATH_HEADER)
        .ok_or(AdapterError::Invariant("x-matched-path header is missing"))?;
    let matched_path = standalone_pathname(raw_matched)?;
    env.pathname()?;

    let raw_url = env.url.as_deref().unwrap_or("/");
    let mut url_pathname = normalizers.strip_base_path(&standalone_pathname(raw_url)?);

    let shapes = &normalizers.shapes;
    if shapes.matches(Shape::Data, &matched_path) {
        env.query_mut().insert(DATA_REQ_KEY.to_string(), "1".into());
    } else if shapes.matches(Shape::Postponed, &matched_path) && env.method == Method::POST {
        let postponed = env.read_body_utf8().await?;
        tracing::debug!(bytes = postponed.len(), "Read postponed resume state");
        env.meta_mut().set_postponed(postponed);

        if env.header(ROUTE_MATCHES_HEADER).is_none() {
            if let Some(normalizer) = shapes.normalizer(Shape::Postponed) {
                url_pathname = normalizer.normalize(&matched_path, true);
            }
        }
    }

    let (shape, matched_path) = shapes.resolve(&matched_path);
    let (_, url_pathname) = shapes.resolve(&url_pathname);
    tracing::debug!(
        shape = shape.map(|s| s.as_str()).unwrap_or("page"),
        matched_path = %matched_path,
        url_pathname = %url_pathname,
        "Extracted matched path"
    );

    Ok(MatchedPaths {
        shape,
        matched_path,
        url_pathname,
    })
}

/// Pathname of `raw` parsed as a URL relative to `http://localhost`.
fn standalone_pathname(raw: &str) -> AdapterResult<String> {
    let base = Url::parse("http://localhost")
        .map_err(|e| AdapterError::Decode(format!("base url: {e}")))?;
    let url = base
        .join(raw)
        .map_err(|e| AdapterError::Decode(format!("url {raw:?}: {e}")))?;
    Ok(url.path().to_string())
}
