//! Shared builders for integration tests.

use axum::http::Method;
use route_adapter::config::{I18nConfig, RewriteRule};
use route_adapter::{AdapterConfig, RequestAdapter, RequestEnvelope};

/// Configuration serving `pages` with every optional shape enabled.
pub fn config_with_pages(pages: &[&str]) -> AdapterConfig {
    let mut config = AdapterConfig::default();
    config.build_id = "b1".into();
    config.experimental.ppr = true;
    config.routes.pages = pages.iter().map(|p| p.to_string()).collect();
    config
}

#[allow(dead_code)]
pub fn with_locales(mut config: AdapterConfig, locales: &[&str], default_locale: &str) -> AdapterConfig {
    config.i18n = Some(I18nConfig {
        locales: locales.iter().map(|l| l.to_string()).collect(),
        default_locale: default_locale.into(),
        domains: vec![],
    });
    config
}

#[allow(dead_code)]
pub fn rewrite(source: &str, destination: &str) -> RewriteRule {
    RewriteRule {
        source: source.into(),
        destination: destination.into(),
        has: vec![],
        missing: vec![],
    }
}

pub fn adapter(config: AdapterConfig) -> RequestAdapter {
    RequestAdapter::from_config(config).unwrap()
}

/// A GET envelope as the trusted proxy would forward it.
#[allow(dead_code)]
pub fn proxied(target: &str, matched_path: &str) -> RequestEnvelope {
    RequestEnvelope::new(Method::GET, target).with_header("x-matched-path", matched_path)
}
