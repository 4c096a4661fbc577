//! Rewrite and query reconciliation.
//!
//! # Responsibilities
//! - Run the manifest rewrites against a locale-prefixed pathname
//! - Record `rewroteURL` when a rewrite changed the pathname
//! - Rename internal query synonyms and remove them before hand-off
//! - Strip routing artifacts from the raw URL
//!
//! # Design Decisions
//! - Rewrite sources are written with a locale prefix, so the default locale
//!   is prepended when the pathname carries none
//! - Route param keys stay visible until interpolation, then are deleted
//! - Reads: pathname, query, url. Writes: pathname, query, url, metadata

use std::collections::BTreeSet;

use crate::adapter::dynamic::ResolvedRoute;
use crate::adapter::envelope::{QueryValue, RequestEnvelope};
use crate::adapter::error::AdapterResult;
use crate::adapter::locale::LocaleDecision;
use crate::route::{normalize_next_query_param, RouteUtils};
use crate::routing::PathnameNormalizer;

/// What the rewrite step changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub did_rewrite: bool,
    /// Keys the rewrite rules introduced.
    pub rewrite_param_keys: BTreeSet<String>,
    /// Canonical keys renamed from internal synonyms; removed in `finalize`.
    pub route_param_keys: BTreeSet<String>,
}

/// Apply rewrites and rename internal query synonyms.
pub fn apply_rewrites(
    env: &mut RequestEnvelope,
    utils: &RouteUtils<'_>,
    locale_route: Option<&dyn PathnameNormalizer>,
    locale: Option<&LocaleDecision>,
) -> AdapterResult<RewriteOutcome> {
    if let (Some(locale_route), Some(decision)) = (locale_route, locale) {
        let pathname = env.pathname()?;
        if !locale_route.matches(pathname) {
            let prefixed = match pathname {
                "/" => format!("/{}", decision.default_locale),
                other => format!("/{}{}", decision.default_locale, other),
            };
            env.set_pathname(prefixed);
        }
    }

    let before = env.pathname()?.to_string();
    let rewrite_params = utils.handle_rewrites(env)?;
    let after = env.pathname()?;

    let did_rewrite = before != after;
    if did_rewrite {
        let after = after.to_string();
        tracing::debug!(from = %before, to = %after, "Rewrote request");
        env.meta_mut().set_rewrote_url(after);
    }

    let mut renamed: Vec<(String, String, QueryValue)> = Vec::new();
    for (key, value) in env.query() {
        normalize_next_query_param(key, |canonical| {
            renamed.push((key.clone(), canonical.to_string(), value.clone()));
        });
    }
    let mut route_param_keys = BTreeSet::new();
    for (internal, canonical, value) in renamed {
        env.query_mut().remove(&internal);
        env.query_mut().insert(canonical.clone(), value);
        route_param_keys.insert(canonical);
    }

    Ok(RewriteOutcome {
        did_rewrite,
        rewrite_param_keys: rewrite_params.into_keys().collect(),
        route_param_keys,
    })
}

/// Strip URL artifacts, drop route param keys and settle the pathname.
pub fn finalize(
    env: &mut RequestEnvelope,
    utils: &RouteUtils<'_>,
    route: &ResolvedRoute,
    outcome: &RewriteOutcome,
) {
    if route.page_is_dynamic || outcome.did_rewrite {
        let mut keep_out = outcome.rewrite_param_keys.clone();
        if let Some(re) = utils.default_route_regex() {
            keep_out.extend(re.groups().iter().map(|g| g.name.clone()));
        }
        utils.normalize_vercel_url(env, true, &keep_out);
    }

    for key in &outcome.route_param_keys {
        env.query_mut().remove(key);
    }
    env.set_pathname(route.matched_path.clone());
}
