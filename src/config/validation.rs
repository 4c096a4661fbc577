//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check locale references (default and domain locales are configured)
//! - Check that pages and rewrite sources compile
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AdapterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{AdapterConfig, RewriteRule};
use crate::route::pattern::RouteRegex;
use crate::route::rewrites::SourcePattern;

/// A single semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("build_id must not be empty")]
    EmptyBuildId,

    #[error("base_path {0:?} must start with '/' and must not end with '/'")]
    InvalidBasePath(String),

    #[error("invalid listener.bind_address {0:?}")]
    InvalidBindAddress(String),

    #[error("invalid observability.metrics_address {0:?}")]
    InvalidMetricsAddress(String),

    #[error("timeouts.request_secs must be greater than 0")]
    ZeroTimeout,

    #[error("i18n.locales must not be empty")]
    NoLocales,

    #[error("locale {locale:?} used by {context} is not listed in i18n.locales")]
    UnknownLocale { locale: String, context: String },

    #[error("page {page:?} is invalid: {reason}")]
    InvalidPage { page: String, reason: String },

    #[error("rewrite source {pattern:?} is invalid: {reason}")]
    InvalidRewrite { pattern: String, reason: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AdapterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.build_id.trim().is_empty() {
        errors.push(ValidationError::EmptyBuildId);
    }

    let base_path = &config.base_path;
    if !base_path.is_empty() && (!base_path.starts_with('/') || base_path.ends_with('/')) {
        errors.push(ValidationError::InvalidBasePath(base_path.clone()));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if let Some(i18n) = &config.i18n {
        if i18n.locales.is_empty() {
            errors.push(ValidationError::NoLocales);
        }
        let known = |locale: &str| i18n.locales.iter().any(|l| l.eq_ignore_ascii_case(locale));
        if !known(&i18n.default_locale) {
            errors.push(ValidationError::UnknownLocale {
                locale: i18n.default_locale.clone(),
                context: "i18n.default_locale".to_string(),
            });
        }
        for domain in &i18n.domains {
            if !known(&domain.default_locale) {
                errors.push(ValidationError::UnknownLocale {
                    locale: domain.default_locale.clone(),
                    context: format!("domain {}", domain.domain),
                });
            }
        }
    }

    for page in &config.routes.pages {
        if !page.starts_with('/') {
            errors.push(ValidationError::InvalidPage {
                page: page.clone(),
                reason: "must start with '/'".to_string(),
            });
            continue;
        }
        if let Err(e) = RouteRegex::new(page) {
            errors.push(ValidationError::InvalidPage {
                page: page.clone(),
                reason: e.to_string(),
            });
        }
    }

    let rewrites = &config.rewrites;
    let rules = rewrites
        .before_files
        .iter()
        .chain(&rewrites.after_files)
        .chain(&rewrites.fallback);
    for rule in rules {
        if let Err(reason) = check_rewrite(rule, config.case_sensitive_routes) {
            errors.push(ValidationError::InvalidRewrite {
                pattern: rule.source.clone(),
                reason,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_rewrite(rule: &RewriteRule, case_sensitive: bool) -> Result<(), String> {
    if !rule.source.starts_with('/') {
        return Err("must start with '/'".to_string());
    }
    SourcePattern::compile(&rule.source, case_sensitive)
        .map(|_| ())
        .map_err(|e| e.to_string())
}
