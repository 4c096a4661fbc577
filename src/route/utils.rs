//! Per-page rewrite and parameter utilities.
//!
//! # Responsibilities
//! - Run rewrite rules against the parsed URL
//! - Validate and normalize dynamic parameters from any source
//! - Interpolate parameters back into templated paths
//! - Strip routing artifacts from the raw request URL
//!
//! # Design Decisions
//! - One `RouteUtils` per request, built around the page's cached regex
//! - Default route matches are the page matched against its own template,
//!   so a value containing `[slug]` means "no concrete value"

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::adapter::envelope::{format_query, parse_query, Params, QueryValue, RequestEnvelope};
use crate::adapter::error::AdapterResult;
use crate::i18n::LocaleProvider;
use crate::route::pattern::{
    is_dynamic_route, RouteRegex, NEXT_INTERCEPTION_MARKER_PREFIX, NEXT_QUERY_PARAM_PREFIX,
};
use crate::route::rewrites::{
    check_conditions, prepare_destination, CompiledRewrite, CompiledRewrites, Destination,
};

/// Call `on_match` with the canonical key when `key` is an internal synonym.
pub fn normalize_next_query_param(key: &str, mut on_match: impl FnMut(&str)) {
    for prefix in [NEXT_QUERY_PARAM_PREFIX, NEXT_INTERCEPTION_MARKER_PREFIX] {
        if key != prefix {
            if let Some(canonical) = key.strip_prefix(prefix) {
                on_match(canonical);
            }
        }
    }
}

/// Concurrent cache of compiled page regexes.
#[derive(Debug, Default)]
pub struct RouteRegexCache {
    pages: DashMap<String, Arc<RouteRegex>>,
}

impl RouteRegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled regex for a dynamic page; `None` for static or invalid pages.
    pub fn get(&self, page: &str) -> Option<Arc<RouteRegex>> {
        if !is_dynamic_route(page) {
            return None;
        }
        if let Some(cached) = self.pages.get(page) {
            return Some(cached.value().clone());
        }
        match RouteRegex::new(page) {
            Ok(re) => {
                let re = Arc::new(re);
                self.pages.insert(page.to_string(), re.clone());
                Some(re)
            }
            Err(e) => {
                tracing::warn!(page = %page, error = %e, "Failed to compile page regex");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Outcome of parameter normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamsResult {
    pub has_valid_params: bool,
    pub params: Params,
}

/// Utility bundle scoped to the page a request resolved to.
pub struct RouteUtils<'a> {
    page: &'a str,
    page_is_dynamic: bool,
    base_path: &'a str,
    i18n: Option<&'a dyn LocaleProvider>,
    rewrites: Option<&'a CompiledRewrites>,
    default_route_regex: Option<Arc<RouteRegex>>,
    default_route_matches: Option<Params>,
}

impl<'a> RouteUtils<'a> {
    pub fn new(
        page: &'a str,
        page_is_dynamic: bool,
        base_path: &'a str,
        i18n: Option<&'a dyn LocaleProvider>,
        rewrites: Option<&'a CompiledRewrites>,
        cache: &RouteRegexCache,
    ) -> AdapterResult<Self> {
        let default_route_regex = if page_is_dynamic { cache.get(page) } else { None };
        let default_route_matches = match &default_route_regex {
            Some(re) => re.match_params(page)?,
            None => None,
        };
        Ok(Self {
            page,
            page_is_dynamic,
            base_path,
            i18n,
            rewrites,
            default_route_regex,
            default_route_matches,
        })
    }

    pub fn default_route_regex(&self) -> Option<&RouteRegex> {
        self.default_route_regex.as_deref()
    }

    pub fn default_route_matches(&self) -> Option<&Params> {
        self.default_route_matches.as_ref()
    }

    /// Match `pathname` against the page's own template.
    pub fn dynamic_route_matcher(&self, pathname: &str) -> AdapterResult<Option<Params>> {
        match &self.default_route_regex {
            Some(re) => re.match_params(pathname),
            None => Ok(None),
        }
    }

    /// Apply rewrite rules; returns every param the rules introduced.
    pub fn handle_rewrites(&self, env: &mut RequestEnvelope) -> AdapterResult<Params> {
        let mut rewrite_params = Params::new();
        let Some(rewrites) = self.rewrites else {
            return Ok(rewrite_params);
        };
        let mut fs_pathname = env.pathname()?.to_string();

        for rule in &rewrites.before_files {
            self.check_rewrite(rule, env, &mut fs_pathname, &mut rewrite_params)?;
        }

        if fs_pathname != self.page {
            let mut finished = false;
            for rule in &rewrites.after_files {
                finished = self.check_rewrite(rule, env, &mut fs_pathname, &mut rewrite_params)?;
                if finished {
                    break;
                }
            }
            if !finished && !self.matches_page(&fs_pathname)? {
                for rule in &rewrites.fallback {
                    if self.check_rewrite(rule, env, &mut fs_pathname, &mut rewrite_params)? {
                        break;
                    }
                }
            }
        }
        Ok(rewrite_params)
    }

    /// Evaluate one rule; `true` when evaluation of the list should stop.
    fn check_rewrite(
        &self,
        compiled: &CompiledRewrite,
        env: &mut RequestEnvelope,
        fs_pathname: &mut String,
        rewrite_params: &mut Params,
    ) -> AdapterResult<bool> {
        let rule = &compiled.rule;
        let Some(mut params) = compiled.source.match_path(env.pathname()?) else {
            return Ok(false);
        };
        if (!rule.has.is_empty() || !rule.missing.is_empty())
            && !check_conditions(rule, env, &mut params)
        {
            return Ok(false);
        }

        let (pathname, dest_query) = match prepare_destination(&rule.destination, &params) {
            Destination::External(url) => {
                tracing::debug!(destination = %url, "External rewrite, leaving request as-is");
                return Ok(true);
            }
            Destination::Internal { pathname, query } => (pathname, query),
        };

        for (key, value) in dest_query.iter().chain(params.iter()) {
            rewrite_params.insert(key.clone(), value.clone());
        }
        env.query_mut().extend(dest_query);
        env.set_pathname(pathname.clone());

        *fs_pathname = pathname;
        if !self.base_path.is_empty() {
            if let Some(stripped) = fs_pathname.strip_prefix(self.base_path) {
                *fs_pathname = if stripped.is_empty() { "/".to_string() } else { stripped.to_string() };
            }
        }
        if let Some(i18n) = self.i18n {
            let analysis = i18n.analyze(fs_pathname, None);
            *fs_pathname = analysis.pathname;
        }

        if fs_pathname.as_str() == self.page {
            return Ok(true);
        }
        if self.page_is_dynamic {
            if let Some(dynamic_params) = self.dynamic_route_matcher(fs_pathname)? {
                env.query_mut().extend(dynamic_params);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn matches_page(&self, fs_pathname: &str) -> AdapterResult<bool> {
        let trimmed = remove_trailing_slash(fs_pathname);
        if trimmed == remove_trailing_slash(self.page) {
            return Ok(true);
        }
        Ok(self.dynamic_route_matcher(trimmed)?.is_some())
    }

    /// Validate `query` against the page's groups.
    ///
    /// Params are invalid when a required group is missing or a value still
    /// carries the template text. With `ignore_optional`, missing optional
    /// groups do not invalidate the set.
    pub fn normalize_dynamic_route_params(
        &self,
        query: &Params,
        ignore_optional: bool,
    ) -> ParamsResult {
        let (Some(re), Some(defaults)) = (&self.default_route_regex, &self.default_route_matches)
        else {
            return ParamsResult {
                has_valid_params: false,
                params: query.clone(),
            };
        };

        let mut has_valid_params = true;
        let mut params = Params::new();

        for group in re.groups() {
            let mut value = query.get(&group.name).map(normalize_rsc_value);

            let is_default_value = match (defaults.get(&group.name), &value) {
                (Some(default), Some(value)) => {
                    default.values().iter().any(|d| value.contains(d))
                }
                _ => false,
            };
            if is_default_value || (value.is_none() && !(group.optional && ignore_optional)) {
                has_valid_params = false;
            }

            if group.optional {
                let placeholder = group.template();
                let unset = match &value {
                    None => true,
                    Some(QueryValue::One(v)) => v.is_empty(),
                    Some(QueryValue::Many(vs)) => {
                        vs.is_empty()
                            || (vs.len() == 1 && (vs[0] == "index" || vs[0] == placeholder))
                    }
                };
                if unset {
                    value = None;
                }
            }

            // proxy-supplied values arrive unsplit
            if group.repeat {
                if let Some(QueryValue::One(v)) = &value {
                    value = Some(QueryValue::Many(v.split('/').map(str::to_string).collect()));
                }
            }

            if let Some(value) = value {
                params.insert(group.name.clone(), value);
            }
        }

        ParamsResult {
            has_valid_params,
            params,
        }
    }

    /// Parse the proxy's `x-now-route-matches` header.
    ///
    /// Accepts named (`nxtPslug=a`) or positional (`1=a`) form. Returns the
    /// params and, when the matches led with a configured locale, that locale.
    pub fn get_params_from_route_matches(&self, header: &str) -> (Params, Option<String>) {
        let mut params = Params::new();
        let mut locale = None;
        let Some(re) = &self.default_route_regex else {
            return (params, locale);
        };

        let mut matches = Params::new();
        for (key, value) in parse_query(header) {
            let key = match key.strip_prefix(NEXT_QUERY_PARAM_PREFIX) {
                Some(stripped) if !stripped.is_empty() => stripped.to_string(),
                _ => key,
            };
            matches.insert(key, value);
        }

        let named = re.groups().iter().all(|g| matches.contains_key(&g.name));
        let mut offset = 0;
        if !named {
            if let Some(found) = matches.get("1").and_then(|v| self.find_locale(v.first()?)) {
                locale = Some(found);
                offset = 1;
            }
        }

        for group in re.groups() {
            let value = if named {
                matches.get(&group.name)
            } else {
                matches.get(&(group.pos + offset).to_string())
            };
            let Some(value) = value else {
                continue;
            };
            match self.strip_leading_locale(value) {
                (Some(found), rest) => {
                    locale = Some(found);
                    if let Some(rest) = rest {
                        params.insert(group.name.clone(), rest);
                    }
                }
                (None, _) => {
                    params.insert(group.name.clone(), value.clone());
                }
            }
        }
        (params, locale)
    }

    fn find_locale(&self, candidate: &str) -> Option<String> {
        let i18n = self.i18n?;
        let candidate = candidate.to_lowercase();
        i18n.locales()
            .iter()
            .find(|l| l.to_lowercase() == candidate)
            .cloned()
    }

    /// Split a leading locale segment off a route-match value.
    fn strip_leading_locale(&self, value: &QueryValue) -> (Option<String>, Option<QueryValue>) {
        let mut items: Vec<String> = match value {
            QueryValue::One(v) => v.split('/').map(str::to_string).collect(),
            QueryValue::Many(vs) => vs.clone(),
        };
        let Some(found) = items.first().and_then(|first| self.find_locale(first)) else {
            return (None, Some(value.clone()));
        };
        items.remove(0);
        let rest = match value {
            _ if items.is_empty() => None,
            QueryValue::Many(_) => Some(QueryValue::Many(items)),
            QueryValue::One(_) => Some(QueryValue::One(items.join("/"))),
        };
        (Some(found), rest)
    }

    /// Replace each group's template segment in `path` with its value.
    pub fn interpolate_dynamic_path(&self, path: &str, params: &Params) -> String {
        let Some(re) = &self.default_route_regex else {
            return path.to_string();
        };
        let mut path = path.to_string();
        for group in re.groups() {
            let template = group.template();
            let Some(idx) = path.find(&template) else {
                continue;
            };
            let value = match params.get(&group.name) {
                Some(QueryValue::Many(vs)) => vs
                    .iter()
                    .map(|v| urlencoding::encode(v).into_owned())
                    .collect::<Vec<_>>()
                    .join("/"),
                Some(QueryValue::One(v)) => urlencoding::encode(v).into_owned(),
                None => String::new(),
            };
            path.replace_range(idx..idx + template.len(), &value);
        }
        path
    }

    /// Remove routing artifacts from the raw URL's query.
    ///
    /// Drops `nxtP`- and `nxtI`-prefixed keys plus `param_keys`, whose values now live
    /// in the resolved params.
    pub fn normalize_vercel_url(
        &self,
        env: &mut RequestEnvelope,
        trust_query: bool,
        param_keys: &BTreeSet<String>,
    ) {
        if !(self.page_is_dynamic && trust_query && self.default_route_regex.is_some()) {
            return;
        }
        let Some(url) = env.url.as_deref() else {
            return;
        };
        let (path, query) = match url.split_once('?') {
            Some((p, q)) => (p, parse_query(q)),
            None => return,
        };
        let kept = query
            .into_iter()
            .filter(|(key, _)| {
                let internal = [NEXT_QUERY_PARAM_PREFIX, NEXT_INTERCEPTION_MARKER_PREFIX]
                    .iter()
                    .any(|prefix| key.as_str() != *prefix && key.starts_with(prefix));
                !internal && !param_keys.contains(key)
            })
            .collect();
        let formatted = format_query(&kept);
        let url = if formatted.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{formatted}")
        };
        env.url = Some(url);
    }
}

fn remove_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// Drop a `.rsc` suffix left on proxy-supplied values.
fn normalize_rsc_value(value: &QueryValue) -> QueryValue {
    let strip = |v: &String| -> String {
        match v.find(".rsc") {
            Some(idx) if v[idx + 4..].is_empty() || v[idx + 4..].starts_with('?') => {
                format!("{}{}", &v[..idx], &v[idx + 4..])
            }
            _ => v.clone(),
        }
    };
    match value {
        QueryValue::One(v) => QueryValue::One(strip(v)),
        QueryValue::Many(vs) => QueryValue::Many(vs.iter().map(strip).collect()),
    }
}
