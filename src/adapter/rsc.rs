//! Fragment (RSC) request tagging.
//!
//! # Responsibilities
//! - Recognize prefetch-fragment and fragment pathnames
//! - Normalize them and mark the request via headers and metadata
//! - Drop fragment headers a client sent on a non-fragment pathname
//!
//! # Design Decisions
//! - The pathname, not client headers, decides fragment semantics
//! - Reads: pathname, url. Writes: pathname, url, headers, query, metadata

use crate::adapter::envelope::{replace_target_pathname, RequestEnvelope};
use crate::adapter::error::{AdapterError, AdapterResult};
use crate::adapter::DATA_REQ_KEY;
use crate::routing::{Shape, ShapeChain};

pub const RSC_HEADER: &str = "rsc";
pub const NEXT_ROUTER_PREFETCH_HEADER: &str = "next-router-prefetch";
pub const NEXT_ROUTER_STATE_TREE_HEADER: &str = "next-router-state-tree";

/// Headers carrying fragment semantics.
pub const FRAGMENT_HEADERS: [&str; 3] = [
    RSC_HEADER,
    NEXT_ROUTER_STATE_TREE_HEADER,
    NEXT_ROUTER_PREFETCH_HEADER,
];

/// Tag fragment requests. Returns the fragment shape that matched, if any.
pub fn attach_rsc_request_metadata(
    env: &mut RequestEnvelope,
    shapes: &ShapeChain,
    app_enabled: bool,
) -> AdapterResult<Option<Shape>> {
    let pathname = env.pathname()?;
    if pathname.is_empty() {
        return Err(AdapterError::Invariant("parsed pathname is empty"));
    }
    if !app_enabled {
        return Ok(None);
    }

    let matched = [Shape::PrefetchFragment, Shape::Fragment]
        .into_iter()
        .find(|shape| shapes.matches(*shape, pathname));

    let Some(shape) = matched else {
        for name in FRAGMENT_HEADERS {
            env.headers.remove(name);
        }
        return Ok(None);
    };

    let normalized = match shapes.normalizer(shape) {
        Some(normalizer) => normalizer.normalize(pathname, true),
        None => pathname.to_string(),
    };

    env.mark_header(RSC_HEADER);
    env.meta_mut().mark_rsc_request();
    if shape == Shape::PrefetchFragment {
        env.mark_header(NEXT_ROUTER_PREFETCH_HEADER);
        env.meta_mut().mark_prefetch_rsc_request();
    }

    env.query_mut().insert(DATA_REQ_KEY.to_string(), "1".into());
    if let Some(url) = env.url.as_deref() {
        env.url = Some(replace_target_pathname(url, &normalized));
    }
    tracing::debug!(shape = %shape, pathname = %normalized, "Tagged fragment request");
    env.set_pathname(normalized);
    Ok(Some(shape))
}
