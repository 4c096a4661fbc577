//! Dynamic route resolution.
//!
//! # Responsibilities
//! - Decide whether the matched path is a dynamic route
//! - Resolve the canonical definition through the route matcher
//! - Recover parameter values from the best available source
//! - Interpolate them into the matched path and the raw URL
//!
//! # Design Decisions
//! - Parameter sources are an ordered list of attempts with a tri-state
//!   result; the first `Valid` wins
//! - A syntactically dynamic path whose match carries no params is treated
//!   as static for every later stage
//! - Reads: query, headers, url. Writes: query (locale override), url

use std::fmt;

use crate::adapter::envelope::{Params, RequestEnvelope};
use crate::adapter::error::AdapterResult;
use crate::adapter::locale::LocaleDecision;
use crate::adapter::matched_path::ROUTE_MATCHES_HEADER;
use crate::route::pattern::{denormalize_page_path, is_dynamic_route};
use crate::route::{RouteMatcher, RouteUtils};

/// The route a request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Denormalized matched path; interpolated once params are known.
    pub matched_path: String,
    /// Canonical definition pathname (the page).
    pub src_pathname: String,
    pub page_is_dynamic: bool,
}

/// Resolve the definition serving `matched_path`.
pub fn lookup_route(
    matched_path: &str,
    matcher: &dyn RouteMatcher,
    locale: Option<&LocaleDecision>,
) -> AdapterResult<ResolvedRoute> {
    let matched_path = denormalize_page_path(matched_path);
    let mut src_pathname = matched_path.clone();
    let mut page_is_dynamic = is_dynamic_route(&src_pathname);

    if page_is_dynamic {
        let analysis = locale.map(|l| &l.analysis);
        if let Some(found) = matcher.match_route(&src_pathname, analysis)? {
            src_pathname = found.definition.pathname;
            page_is_dynamic = found.params.is_some();
        }
    }

    tracing::debug!(
        src_pathname = %src_pathname,
        dynamic = page_is_dynamic,
        "Resolved route definition"
    );

    Ok(ResolvedRoute {
        matched_path,
        src_pathname,
        page_is_dynamic,
    })
}

/// Where a parameter set may come from, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    Query,
    UrlPathname,
    RouteMatchesHeader,
    DefaultMatches,
}

impl ParamSource {
    pub const ORDER: [ParamSource; 4] = [
        ParamSource::Query,
        ParamSource::UrlPathname,
        ParamSource::RouteMatchesHeader,
        ParamSource::DefaultMatches,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamSource::Query => "query",
            ParamSource::UrlPathname => "url_pathname",
            ParamSource::RouteMatchesHeader => "route_matches",
            ParamSource::DefaultMatches => "default_matches",
        }
    }
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one parameter source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamsAttempt {
    Valid(Params),
    /// Source not applicable to this request.
    Absent,
    /// Source produced values that failed validation.
    Invalid,
}

/// Inputs shared by every parameter source.
pub struct ParamsContext<'r, 'u> {
    pub route: &'r ResolvedRoute,
    pub url_pathname: &'r str,
    pub utils: &'r RouteUtils<'u>,
}

/// Try each source in order; returns the winning source and its params.
pub fn resolve_params(
    env: &mut RequestEnvelope,
    ctx: &ParamsContext<'_, '_>,
    mut locale: Option<&mut LocaleDecision>,
) -> AdapterResult<Option<(ParamSource, Params)>> {
    for source in ParamSource::ORDER {
        let attempt = attempt(source, env, ctx, locale.as_deref_mut())?;
        tracing::debug!(source = %source, outcome = outcome_label(&attempt), "Param source tried");
        if let ParamsAttempt::Valid(params) = attempt {
            return Ok(Some((source, params)));
        }
    }
    Ok(None)
}

fn outcome_label(attempt: &ParamsAttempt) -> &'static str {
    match attempt {
        ParamsAttempt::Valid(_) => "valid",
        ParamsAttempt::Absent => "absent",
        ParamsAttempt::Invalid => "invalid",
    }
}

fn attempt(
    source: ParamSource,
    env: &mut RequestEnvelope,
    ctx: &ParamsContext<'_, '_>,
    locale: Option<&mut LocaleDecision>,
) -> AdapterResult<ParamsAttempt> {
    let utils = ctx.utils;
    let attempt = match source {
        ParamSource::Query => {
            let result = utils.normalize_dynamic_route_params(env.query(), false);
            if result.has_valid_params {
                ParamsAttempt::Valid(result.params)
            } else {
                ParamsAttempt::Invalid
            }
        }
        ParamSource::UrlPathname => {
            if is_dynamic_route(ctx.url_pathname) {
                return Ok(ParamsAttempt::Absent);
            }
            match utils.dynamic_route_matcher(ctx.url_pathname)? {
                Some(params) => {
                    ParamsAttempt::Valid(utils.normalize_dynamic_route_params(&params, true).params)
                }
                None => ParamsAttempt::Absent,
            }
        }
        ParamSource::RouteMatchesHeader => {
            let Some(header) = env.header(ROUTE_MATCHES_HEADER).map(str::to_string) else {
                return Ok(ParamsAttempt::Absent);
            };
            if !is_dynamic_route(&ctx.route.matched_path) {
                return Ok(ParamsAttempt::Absent);
            }
            let (params, found_locale) = utils.get_params_from_route_matches(&header);
            if let (Some(found), Some(decision)) = (found_locale, locale) {
                decision.override_explicit(env, found);
            }
            let result = utils.normalize_dynamic_route_params(&params, true);
            if result.has_valid_params {
                ParamsAttempt::Valid(result.params)
            } else {
                ParamsAttempt::Invalid
            }
        }
        ParamSource::DefaultMatches => match utils.default_route_matches() {
            Some(defaults) if ctx.url_pathname == ctx.route.src_pathname => {
                ParamsAttempt::Valid(defaults.clone())
            }
            _ => ParamsAttempt::Absent,
        },
    };
    Ok(attempt)
}

/// Substitute `params` into the matched path and the raw URL.
pub fn interpolate(
    env: &mut RequestEnvelope,
    route: &mut ResolvedRoute,
    utils: &RouteUtils<'_>,
    params: &Params,
) {
    route.matched_path = utils.interpolate_dynamic_path(&route.src_pathname, params);
    if let Some(url) = env.url.as_deref() {
        env.url = Some(utils.interpolate_dynamic_path(url, params));
    }
}
