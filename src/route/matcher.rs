//! Route definition lookup.
//!
//! # Responsibilities
//! - Resolve a pathname to the route definition that serves it
//! - Report parameters only for dynamic definitions
//!
//! # Design Decisions
//! - Static definitions win over dynamic ones (exact string compare)
//! - Dynamic definitions are tried from most to least specific
//! - Compiled once at construction; immutable and shared across requests

use std::collections::HashSet;
use std::sync::Arc;

use crate::adapter::envelope::Params;
use crate::adapter::error::AdapterResult;
use crate::i18n::LocaleAnalysis;
use crate::route::pattern::{is_dynamic_route, RouteRegex};

/// The definition a pathname resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefinition {
    pub pathname: String,
}

/// Result of a successful route lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub definition: RouteDefinition,
    /// Present iff the definition is dynamic.
    pub params: Option<Params>,
}

/// Route lookup capability consumed by the pipeline.
pub trait RouteMatcher: Send + Sync + std::fmt::Debug {
    fn match_route(
        &self,
        pathname: &str,
        locale: Option<&LocaleAnalysis>,
    ) -> AdapterResult<Option<RouteMatch>>;
}

/// Route matcher over a fixed list of definitions.
#[derive(Debug, Default)]
pub struct ManifestRouteMatcher {
    static_routes: HashSet<String>,
    dynamic_routes: Vec<Arc<RouteRegex>>,
}

impl ManifestRouteMatcher {
    /// Build from definition pathnames. Definitions that fail to compile are
    /// skipped with a warning; config validation rejects them earlier.
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut static_routes = HashSet::new();
        let mut dynamic_routes = Vec::new();

        for page in pages {
            let page = page.as_ref();
            if !is_dynamic_route(page) {
                static_routes.insert(page.to_string());
                continue;
            }
            match RouteRegex::new(page) {
                Ok(re) => dynamic_routes.push(Arc::new(re)),
                Err(e) => tracing::warn!(page = %page, error = %e, "Skipping uncompilable route"),
            }
        }

        dynamic_routes.sort_by(|a, b| {
            specificity(a.page())
                .cmp(&specificity(b.page()))
                .then_with(|| a.page().cmp(b.page()))
        });

        Self {
            static_routes,
            dynamic_routes,
        }
    }

    pub fn len(&self) -> usize {
        self.static_routes.len() + self.dynamic_routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RouteMatcher for ManifestRouteMatcher {
    fn match_route(
        &self,
        pathname: &str,
        locale: Option<&LocaleAnalysis>,
    ) -> AdapterResult<Option<RouteMatch>> {
        let pathname = strip_explicit_locale(pathname, locale);

        if self.static_routes.contains(pathname) {
            return Ok(Some(RouteMatch {
                definition: RouteDefinition {
                    pathname: pathname.to_string(),
                },
                params: None,
            }));
        }

        for route in &self.dynamic_routes {
            if let Some(params) = route.match_params(pathname)? {
                return Ok(Some(RouteMatch {
                    definition: RouteDefinition {
                        pathname: route.page().to_string(),
                    },
                    params: Some(params),
                }));
            }
        }
        Ok(None)
    }
}

/// Remove `/<locale>` when the locale decision says it was explicit.
fn strip_explicit_locale<'a>(pathname: &'a str, locale: Option<&LocaleAnalysis>) -> &'a str {
    let Some(locale) = locale.filter(|l| !l.inferred_from_default) else {
        return pathname;
    };
    let Some(detected) = locale.detected_locale.as_deref() else {
        return pathname;
    };
    let prefix_len = detected.len() + 1;
    let has_prefix = pathname.starts_with('/')
        && pathname.len() >= prefix_len
        && pathname.is_char_boundary(prefix_len)
        && pathname[1..prefix_len].eq_ignore_ascii_case(detected)
        && matches!(pathname.as_bytes().get(prefix_len), None | Some(b'/'));
    if !has_prefix {
        return pathname;
    }
    match &pathname[prefix_len..] {
        "" => "/",
        rest => rest,
    }
}

/// Segment ranks: static < dynamic < catch-all < optional catch-all.
fn specificity(page: &str) -> Vec<u8> {
    page.split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if segment.starts_with("[[...") {
                3
            } else if segment.starts_with("[...") {
                2
            } else if segment.starts_with('[') {
                1
            } else {
                0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::envelope::QueryValue;

    fn matcher() -> ManifestRouteMatcher {
        ManifestRouteMatcher::new([
            "/",
            "/blog/[slug]",
            "/blog/featured",
            "/[...all]",
            "/shop/[[...rest]]",
        ])
    }

    #[test]
    fn test_static_match_has_no_params() {
        let m = matcher().match_route("/blog/featured", None).unwrap().unwrap();
        assert_eq!(m.definition.pathname, "/blog/featured");
        assert!(m.params.is_none());
    }

    #[test]
    fn test_dynamic_match_prefers_specific_route() {
        let m = matcher().match_route("/blog/hello", None).unwrap().unwrap();
        assert_eq!(m.definition.pathname, "/blog/[slug]");
        assert_eq!(
            m.params.unwrap().get("slug"),
            Some(&QueryValue::One("hello".into()))
        );

        let m = matcher().match_route("/a/b/c", None).unwrap().unwrap();
        assert_eq!(m.definition.pathname, "/[...all]");
    }

    #[test]
    fn test_explicit_locale_is_stripped() {
        let locale = LocaleAnalysis {
            detected_locale: Some("fr".into()),
            inferred_from_default: false,
            pathname: "/blog/hello".into(),
        };
        let m = matcher()
            .match_route("/fr/blog/featured", Some(&locale))
            .unwrap()
            .unwrap();
        assert_eq!(m.definition.pathname, "/blog/featured");

        let inferred = LocaleAnalysis {
            inferred_from_default: true,
            ..locale
        };
        let m = matcher()
            .match_route("/fr/blog/featured", Some(&inferred))
            .unwrap()
            .unwrap();
        assert_eq!(m.definition.pathname, "/[...all]");
    }

    #[test]
    fn test_specificity_order() {
        assert!(specificity("/blog/[slug]") < specificity("/[...all]"));
        assert!(specificity("/[a]/b") < specificity("/[a]/[b]"));
        assert!(specificity("/[...all]") < specificity("/[[...all]]"));
    }
}
