//! Locale resolution.
//!
//! # Responsibilities
//! - Pick the default locale (domain mapping, else global config)
//! - Produce one locale decision for every later stage
//! - Mirror the decision into `__nextLocale` / `__nextInferredLocaleFromDefault`
//!
//! # Design Decisions
//! - The inferred marker is present only while the locale came from a default;
//!   any explicit source clears it
//! - Reads: `host` header. Writes: query

use std::sync::Arc;

use axum::http::header::HOST;

use crate::adapter::envelope::RequestEnvelope;
use crate::adapter::{INFERRED_LOCALE_KEY, LOCALE_KEY};
use crate::i18n::{LocaleAnalysis, LocaleProvider};

/// The locale every stage after resolution agrees on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleDecision {
    pub analysis: LocaleAnalysis,
    /// Default locale that applied to this request.
    pub default_locale: String,
}

impl LocaleDecision {
    pub fn detected_locale(&self) -> Option<&str> {
        self.analysis.detected_locale.as_deref()
    }

    pub fn inferred_from_default(&self) -> bool {
        self.analysis.inferred_from_default
    }

    /// `pathname` without a leading segment naming the decided locale.
    ///
    /// Other pathnames, including ones led by a different locale, are
    /// returned unchanged.
    pub fn strip_locale(&self, pathname: &str) -> String {
        let (Some(locale), Some(rest)) = (self.detected_locale(), pathname.strip_prefix('/'))
        else {
            return pathname.to_string();
        };
        let (first, tail) = match rest.split_once('/') {
            Some((first, tail)) => (first, Some(tail)),
            None => (rest, None),
        };
        if !first.eq_ignore_ascii_case(locale) {
            return pathname.to_string();
        }
        match tail {
            Some(tail) => format!("/{tail}"),
            None => "/".to_string(),
        }
    }

    /// Replace the decision with an explicitly supplied locale.
    pub fn override_explicit(&mut self, env: &mut RequestEnvelope, locale: String) {
        tracing::debug!(locale = %locale, "Explicit locale overrides decision");
        env.query_mut()
            .insert(LOCALE_KEY.to_string(), locale.as_str().into());
        env.query_mut().remove(INFERRED_LOCALE_KEY);
        self.analysis.detected_locale = Some(locale);
        self.analysis.inferred_from_default = false;
    }
}

/// Wraps the locale provider for the pipeline.
#[derive(Debug, Clone)]
pub struct LocaleResolver {
    provider: Arc<dyn LocaleProvider>,
}

impl LocaleResolver {
    pub fn new(provider: Arc<dyn LocaleProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &dyn LocaleProvider {
        self.provider.as_ref()
    }

    /// Analyze `pathname` for this request and record the result in the query.
    pub fn resolve(&self, env: &mut RequestEnvelope, pathname: &str) -> LocaleDecision {
        let hostname = env
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(|h| strip_port(h).to_string());
        let default_locale = self
            .provider
            .detect_domain_locale(hostname.as_deref())
            .map(|d| d.default_locale.clone())
            .unwrap_or_else(|| self.provider.default_locale().to_string());

        let analysis = self.provider.analyze(pathname, Some(&default_locale));

        if let Some(locale) = analysis.detected_locale.as_deref() {
            env.query_mut()
                .insert(LOCALE_KEY.to_string(), locale.into());
            if analysis.inferred_from_default {
                env.query_mut()
                    .insert(INFERRED_LOCALE_KEY.to_string(), "1".into());
            } else {
                env.query_mut().remove(INFERRED_LOCALE_KEY);
            }
        }

        tracing::debug!(
            hostname = hostname.as_deref().unwrap_or_default(),
            locale = analysis.detected_locale.as_deref().unwrap_or_default(),
            inferred = analysis.inferred_from_default,
            "Resolved locale"
        );

        LocaleDecision {
            analysis,
            default_locale,
        }
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal
        return host.split_once(']').map(|(h, _)| &host[..=h.len()]).unwrap_or(host);
    }
    host.split(':').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::envelope::QueryValue;
    use crate::config::schema::{DomainLocaleConfig, I18nConfig};
    use crate::i18n::I18nProvider;
    use axum::http::Method;

    fn resolver() -> LocaleResolver {
        LocaleResolver::new(Arc::new(I18nProvider::new(I18nConfig {
            locales: vec!["en".into(), "fr".into(), "nl".into()],
            default_locale: "en".into(),
            domains: vec![DomainLocaleConfig {
                domain: "example.nl".into(),
                default_locale: "nl".into(),
                locales: vec![],
            }],
        })))
    }

    fn query_value<'a>(env: &'a RequestEnvelope, key: &str) -> Option<&'a str> {
        env.query().get(key).and_then(QueryValue::first)
    }

    #[test]
    fn test_strip_decided_locale() {
        let mut env = RequestEnvelope::new(Method::GET, "/fr/blog/a");
        let decision = resolver().resolve(&mut env, "/fr/blog/[slug]");
        assert_eq!(decision.strip_locale("/fr/blog/a"), "/blog/a");
        assert_eq!(decision.strip_locale("/FR/blog/a"), "/blog/a");
        assert_eq!(decision.strip_locale("/fr"), "/");
        assert_eq!(decision.strip_locale("/nl/blog/a"), "/nl/blog/a");
        assert_eq!(decision.strip_locale("/french"), "/french");
    }

    #[test]
    fn test_default_locale_is_inferred() {
        let mut env = RequestEnvelope::new(Method::GET, "/about");
        let decision = resolver().resolve(&mut env, "/about");
        assert_eq!(decision.detected_locale(), Some("en"));
        assert!(decision.inferred_from_default());
        assert_eq!(query_value(&env, LOCALE_KEY), Some("en"));
        assert_eq!(query_value(&env, INFERRED_LOCALE_KEY), Some("1"));
    }

    #[test]
    fn test_explicit_locale_clears_marker() {
        let mut env = RequestEnvelope::new(Method::GET, "/fr/about?__nextInferredLocaleFromDefault=1");
        let decision = resolver().resolve(&mut env, "/fr/about");
        assert_eq!(decision.detected_locale(), Some("fr"));
        assert_eq!(decision.analysis.pathname, "/about");
        assert_eq!(query_value(&env, LOCALE_KEY), Some("fr"));
        assert!(!env.query().contains_key(INFERRED_LOCALE_KEY));
    }

    #[test]
    fn test_domain_default_locale() {
        let mut env =
            RequestEnvelope::new(Method::GET, "/about").with_header("host", "example.nl:8443");
        let decision = resolver().resolve(&mut env, "/about");
        assert_eq!(decision.default_locale, "nl");
        assert_eq!(query_value(&env, LOCALE_KEY), Some("nl"));
    }

    #[test]
    fn test_override_explicit() {
        let mut env = RequestEnvelope::new(Method::GET, "/about");
        let mut decision = resolver().resolve(&mut env, "/about");
        decision.override_explicit(&mut env, "fr".into());
        assert_eq!(query_value(&env, LOCALE_KEY), Some("fr"));
        assert!(!env.query().contains_key(INFERRED_LOCALE_KEY));
        assert!(!decision.inferred_from_default());
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.com:3000"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("[::1]:3000"), "[::1]");
    }
}
