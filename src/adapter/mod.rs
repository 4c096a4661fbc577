//! Request normalization pipeline.
//!
//! # Data Flow
//! ```text
//! RequestEnvelope (raw, proxy-annotated)
//!     → invoke.rs        (failed-dispatch short circuit, invoke path)
//!     → base path strip
//!     → rsc.rs           (fragment tagging)
//!     → matched_path.rs  (x-matched-path, postponed body, shape normalize)
//!     → locale.rs        (one locale decision)
//!     → dynamic.rs       (definition lookup)
//!     → rewrite.rs       (rewrites, internal key renames)
//!     → dynamic.rs       (params + interpolation)
//!     → rewrite.rs       (URL cleanup, key removal, final pathname)
//!     → RequestEnvelope (normalized, handed to the renderer)
//! ```
//!
//! # Design Decisions
//! - Stage order is part of the contract; each stage reads fields the
//!   previous one wrote
//! - The adapter is immutable and shared; all per-request state lives in
//!   the envelope and stack locals
//! - No retries: every stage completes or returns a terminal error

pub mod dynamic;
pub mod envelope;
pub mod error;
pub mod invoke;
pub mod locale;
pub mod matched_path;
pub mod rewrite;
pub mod rsc;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::schema::AdapterConfig;
use crate::i18n::{I18nProvider, LocaleProvider};
use crate::observability::metrics;
use crate::route::{
    FileManifest, ManifestRouteMatcher, ManifestSource, RouteMatcher, RouteRegexCache,
    RouteUtils, StaticManifest,
};
use crate::routing::{Normalizers, PathnameNormalizer};

pub use envelope::{ParsedUrl, Query, QueryValue, RequestEnvelope, RequestMeta};
pub use error::{AdapterError, AdapterResult, InvocationCause, InvocationError};

/// Query marker for data and fragment requests.
pub const DATA_REQ_KEY: &str = "__nextDataReq";
/// Query key carrying the resolved locale.
pub const LOCALE_KEY: &str = "__nextLocale";
/// Query marker present while the locale came from a default.
pub const INFERRED_LOCALE_KEY: &str = "__nextInferredLocaleFromDefault";

/// Normalizes requests for one deployment configuration.
#[derive(Debug)]
pub struct RequestAdapter {
    config: AdapterConfig,
    normalizers: Normalizers,
    locale: Option<locale::LocaleResolver>,
    matcher: Arc<dyn RouteMatcher>,
    manifest: Arc<dyn ManifestSource>,
    regex_cache: RouteRegexCache,
}

impl RequestAdapter {
    /// Assemble an adapter from explicit collaborators.
    pub fn new(
        config: AdapterConfig,
        matcher: Arc<dyn RouteMatcher>,
        manifest: Arc<dyn ManifestSource>,
        i18n: Option<Arc<dyn LocaleProvider>>,
    ) -> Self {
        let normalizers = Normalizers::new(&config, i18n.clone());
        Self {
            config,
            normalizers,
            locale: i18n.map(locale::LocaleResolver::new),
            matcher,
            manifest,
            regex_cache: RouteRegexCache::new(),
        }
    }

    /// Build the bundled collaborators from configuration.
    ///
    /// Rewrites come from `routes.manifest_path` when set, else from the
    /// `[rewrites]` table.
    pub fn from_config(config: AdapterConfig) -> std::io::Result<Self> {
        let matcher: Arc<dyn RouteMatcher> =
            Arc::new(ManifestRouteMatcher::new(&config.routes.pages));
        let manifest: Arc<dyn ManifestSource> = match &config.routes.manifest_path {
            Some(path) => Arc::new(FileManifest::load(
                Path::new(path),
                config.case_sensitive_routes,
            )?),
            None => Arc::new(StaticManifest::new(
                config.rewrites.clone(),
                config.case_sensitive_routes,
            )),
        };
        let i18n = config
            .i18n
            .clone()
            .map(|c| Arc::new(I18nProvider::new(c)) as Arc<dyn LocaleProvider>);
        Ok(Self::new(config, matcher, manifest, i18n))
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Normalize `env` in place.
    ///
    /// On `Err(Invocation)` the envelope holds the query snapshot the error
    /// carries; the caller renders it as an error page.
    pub async fn adapt(&self, env: &mut RequestEnvelope) -> AdapterResult<()> {
        let started = Instant::now();
        let result = self.run(env).await;

        let outcome = match &result {
            Ok(()) => "ok",
            Err(AdapterError::Invocation(e)) => {
                metrics::record_invocation_error(e.status_code);
                "invocation_error"
            }
            Err(AdapterError::Invariant(_)) => "invariant",
            Err(AdapterError::BodyRead(_)) => "body_read",
            Err(AdapterError::Decode(_)) => "decode",
        };
        metrics::record_adapt(outcome, started.elapsed());

        if let Err(e) = &result {
            tracing::debug!(outcome, error = %e, "Adapt aborted");
        }
        result
    }

    async fn run(&self, env: &mut RequestEnvelope) -> AdapterResult<()> {
        invoke::precheck(env)?;

        let stripped = self.normalizers.strip_base_path(env.pathname()?);
        env.set_pathname(stripped);

        rsc::attach_rsc_request_metadata(env, &self.normalizers.shapes, self.config.directories.app)?;

        let paths = matched_path::extract_matched_path(env, &self.normalizers).await?;
        if let Some(shape) = paths.shape {
            metrics::record_shape(shape);
        }

        let mut decision = self
            .locale
            .as_ref()
            .map(|resolver| resolver.resolve(env, &paths.matched_path));

        let mut route =
            dynamic::lookup_route(&paths.matched_path, self.matcher.as_ref(), decision.as_ref())?;

        let manifest = self.manifest.routes_manifest();
        let i18n = self.locale.as_ref().map(|resolver| resolver.provider());
        let page = route.src_pathname.clone();
        let utils = RouteUtils::new(
            &page,
            route.page_is_dynamic,
            &self.config.base_path,
            i18n,
            manifest.as_deref().map(|m| &m.compiled),
            &self.regex_cache,
        )?;

        let locale_route = self
            .normalizers
            .locale
            .as_ref()
            .map(|n| n as &dyn PathnameNormalizer);
        let outcome = rewrite::apply_rewrites(env, &utils, locale_route, decision.as_ref())?;
        if outcome.did_rewrite {
            metrics::record_rewrite();
        }

        if route.page_is_dynamic {
            let url_pathname = match &decision {
                Some(decision) => decision.strip_locale(&paths.url_pathname),
                None => paths.url_pathname.clone(),
            };
            let ctx = dynamic::ParamsContext {
                route: &route,
                url_pathname: &url_pathname,
                utils: &utils,
            };
            match dynamic::resolve_params(env, &ctx, decision.as_mut())? {
                Some((source, params)) => {
                    dynamic::interpolate(env, &mut route, &utils, &params);
                    tracing::debug!(
                        source = %source,
                        matched_path = %route.matched_path,
                        "Interpolated dynamic params"
                    );
                }
                None => tracing::debug!(page = %page, "No parameter source matched"),
            }
        }

        rewrite::finalize(env, &utils, &route, &outcome);

        tracing::debug!(
            pathname = %route.matched_path,
            page = %page,
            dynamic = route.page_is_dynamic,
            rewrote = outcome.did_rewrite,
            "Request adapted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{I18nConfig, RewriteRule};
    use axum::http::Method;

    fn adapter(config: AdapterConfig) -> RequestAdapter {
        RequestAdapter::from_config(config).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_dynamic_route() {
        let mut config = AdapterConfig::default();
        config.routes.pages = vec!["/blog/[slug]".into()];
        let adapter = adapter(config);

        let mut env = RequestEnvelope::new(Method::GET, "/blog/hello-world")
            .with_header("x-matched-path", "/blog/[slug]");
        adapter.adapt(&mut env).await.unwrap();

        assert_eq!(env.pathname().unwrap(), "/blog/hello-world");
        assert_eq!(env.url.as_deref(), Some("/blog/hello-world"));
        assert_eq!(env.meta().rewrote_url(), None);
        assert!(!env.query().contains_key("slug"));
    }

    #[tokio::test]
    async fn test_base_path_and_rewrite() {
        let mut config = AdapterConfig::default();
        config.base_path = "/docs".into();
        config.routes.pages = vec!["/b".into()];
        config.rewrites.before_files = vec![RewriteRule {
            source: "/a".into(),
            destination: "/b".into(),
            has: vec![],
            missing: vec![],
        }];
        let adapter = adapter(config);

        let mut env =
            RequestEnvelope::new(Method::GET, "/docs/a").with_header("x-matched-path", "/b");
        adapter.adapt(&mut env).await.unwrap();
        assert_eq!(env.meta().rewrote_url(), Some("/b"));
        assert_eq!(env.pathname().unwrap(), "/b");
    }

    #[tokio::test]
    async fn test_locale_query_keys() {
        let mut config = AdapterConfig::default();
        config.routes.pages = vec!["/about".into()];
        config.i18n = Some(I18nConfig {
            locales: vec!["en".into(), "fr".into()],
            default_locale: "en".into(),
            domains: vec![],
        });
        let adapter = adapter(config);

        let mut env =
            RequestEnvelope::new(Method::GET, "/about").with_header("x-matched-path", "/about");
        adapter.adapt(&mut env).await.unwrap();
        assert_eq!(env.query().get(LOCALE_KEY).and_then(QueryValue::first), Some("en"));
        assert_eq!(
            env.query().get(INFERRED_LOCALE_KEY).and_then(QueryValue::first),
            Some("1")
        );
    }

    #[tokio::test]
    async fn test_missing_matched_path_aborts() {
        let adapter = adapter(AdapterConfig::default());
        let mut env = RequestEnvelope::new(Method::GET, "/a");
        let err = adapter.adapt(&mut env).await.unwrap_err();
        assert!(matches!(err, AdapterError::Invariant(_)));
    }
}
