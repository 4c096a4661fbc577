//! Locale detection for pathnames and hostnames.

use crate::config::schema::{DomainLocaleConfig, I18nConfig};

/// Outcome of analyzing a pathname for a locale prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleAnalysis {
    /// Locale found in the pathname, else the default passed in (if any).
    pub detected_locale: Option<String>,
    /// True when `detected_locale` came from the default, not the pathname.
    pub inferred_from_default: bool,
    /// Pathname with the locale segment removed.
    pub pathname: String,
}

/// Locale detection capability consumed by the pipeline.
pub trait LocaleProvider: Send + Sync + std::fmt::Debug {
    /// Strip a leading locale segment from `pathname`.
    fn analyze(&self, pathname: &str, default_locale: Option<&str>) -> LocaleAnalysis;

    /// Domain configuration serving `hostname`, if any.
    fn detect_domain_locale(&self, hostname: Option<&str>) -> Option<&DomainLocaleConfig>;

    /// Globally configured default locale.
    fn default_locale(&self) -> &str;

    /// Configured locales in their original casing.
    fn locales(&self) -> &[String];
}

/// Locale provider backed by static configuration.
#[derive(Debug, Clone)]
pub struct I18nProvider {
    config: I18nConfig,
    lower_case_locales: Vec<String>,
    lower_case_domains: Vec<(String, Vec<String>)>,
}

impl I18nProvider {
    pub fn new(config: I18nConfig) -> Self {
        let lower_case_locales = config.locales.iter().map(|l| l.to_lowercase()).collect();
        let lower_case_domains = config
            .domains
            .iter()
            .map(|d| {
                let mut locales: Vec<String> =
                    d.locales.iter().map(|l| l.to_lowercase()).collect();
                locales.push(d.default_locale.to_lowercase());
                (d.domain.to_lowercase(), locales)
            })
            .collect();
        Self {
            config,
            lower_case_locales,
            lower_case_domains,
        }
    }

    /// Domain configuration serving `hostname`, or the domain that serves
    /// `detected_locale` when given.
    pub fn detect_domain_locale_for(
        &self,
        hostname: Option<&str>,
        detected_locale: Option<&str>,
    ) -> Option<&DomainLocaleConfig> {
        let hostname = hostname.map(str::to_lowercase);
        let detected_locale = detected_locale.map(str::to_lowercase);
        if hostname.is_none() && detected_locale.is_none() {
            return None;
        }
        self.lower_case_domains
            .iter()
            .position(|(domain, locales)| {
                hostname.as_deref() == Some(domain.as_str())
                    || detected_locale
                        .as_ref()
                        .is_some_and(|l| locales.iter().any(|dl| dl == l))
            })
            .map(|i| &self.config.domains[i])
    }
}

impl LocaleProvider for I18nProvider {
    fn analyze(&self, pathname: &str, default_locale: Option<&str>) -> LocaleAnalysis {
        let mut analysis = LocaleAnalysis {
            detected_locale: default_locale.map(str::to_string),
            inferred_from_default: default_locale.is_some(),
            pathname: pathname.to_string(),
        };

        let Some(segment) = pathname
            .strip_prefix('/')
            .and_then(|rest| rest.split('/').next())
            .filter(|s| !s.is_empty())
        else {
            return analysis;
        };
        let lowered = segment.to_lowercase();
        let Some(index) = self.lower_case_locales.iter().position(|l| *l == lowered) else {
            return analysis;
        };

        let locale = &self.config.locales[index];
        let rest = &pathname[segment.len() + 1..];
        analysis.detected_locale = Some(locale.clone());
        analysis.inferred_from_default = false;
        analysis.pathname = if rest.is_empty() {
            "/".to_string()
        } else {
            rest.to_string()
        };
        analysis
    }

    fn detect_domain_locale(&self, hostname: Option<&str>) -> Option<&DomainLocaleConfig> {
        hostname?;
        self.detect_domain_locale_for(hostname, None)
    }

    fn default_locale(&self) -> &str {
        &self.config.default_locale
    }

    fn locales(&self) -> &[String] {
        &self.config.locales
    }
}
