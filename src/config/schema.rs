//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the adapter.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the request adapter.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Build identifier embedded in data request paths.
    pub build_id: String,

    /// Path prefix the application is mounted under ("" for none).
    pub base_path: String,

    /// Whether rewrite sources match case-sensitively.
    pub case_sensitive_routes: bool,

    /// Enabled route trees.
    pub directories: DirectoriesConfig,

    /// Feature switches for optional request shapes.
    pub experimental: ExperimentalConfig,

    /// Locale routing; absent disables locale handling.
    pub i18n: Option<I18nConfig>,

    /// Known route definitions.
    pub routes: RoutesConfig,

    /// Rewrite rules used when no manifest file is configured.
    pub rewrites: RewritesConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            build_id: "development".to_string(),
            base_path: String::new(),
            case_sensitive_routes: false,
            directories: DirectoriesConfig::default(),
            experimental: ExperimentalConfig::default(),
            i18n: None,
            routes: RoutesConfig::default(),
            rewrites: RewritesConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum request body size in bytes (bounds postponed state).
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_body_bytes: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// Enabled route trees.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoriesConfig {
    /// Component tree ("app") routes: enables fragment shapes.
    pub app: bool,

    /// Page tree routes: enables data request shapes.
    pub pages: bool,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            app: true,
            pages: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ExperimentalConfig {
    /// Partial prerendering: enables the postponed resume shape.
    pub ppr: bool,

    /// Server actions: enables the action shape.
    pub server_actions: bool,
}

/// Locale routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct I18nConfig {
    /// All supported locales, in configured casing.
    pub locales: Vec<String>,

    /// Locale used when a request does not carry one.
    pub default_locale: String,

    /// Domain-specific default locales.
    #[serde(default)]
    pub domains: Vec<DomainLocaleConfig>,
}

/// A domain with its own default locale.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DomainLocaleConfig {
    /// Hostname without port.
    pub domain: String,

    /// Default locale for this domain.
    pub default_locale: String,

    /// Additional locales served by this domain.
    #[serde(default)]
    pub locales: Vec<String>,
}

/// Route definition sources.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Route definition pathnames, e.g. "/blog/[slug]".
    pub pages: Vec<String>,

    /// Optional path to a routes-manifest.json; overrides `rewrites`.
    pub manifest_path: Option<String>,
}

/// Ordered rewrite rule lists.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RewritesConfig {
    #[serde(alias = "before_files")]
    pub before_files: Vec<RewriteRule>,
    #[serde(alias = "after_files")]
    pub after_files: Vec<RewriteRule>,
    pub fallback: Vec<RewriteRule>,
}

/// A single rewrite rule.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RewriteRule {
    /// Source pattern, e.g. "/docs/:path*".
    pub source: String,

    /// Destination, e.g. "/documentation/:path*?from=docs".
    pub destination: String,

    /// Conditions that must all hold.
    #[serde(default)]
    pub has: Vec<RouteCondition>,

    /// Conditions that must all fail.
    #[serde(default)]
    pub missing: Vec<RouteCondition>,
}

/// A request condition attached to a rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RouteCondition {
    Header { key: String, value: Option<String> },
    Query { key: String, value: Option<String> },
    Cookie { key: String, value: Option<String> },
    Host { value: String },
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds, including the body drain.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
