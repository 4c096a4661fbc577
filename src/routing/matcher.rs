//! Pathname shape matching logic.
//!
//! # Responsibilities
//! - Recognize one pathname shape each (data, postponed, fragment, ...)
//! - Rewrite a pathname of that shape to its canonical page path
//!
//! # Design Decisions
//! - Normalizers are stateless; configuration is captured at construction
//! - `normalize(_, strict = true)` skips the match check (caller already
//!   matched), `strict = false` returns non-matching paths unchanged
//! - No regex: prefix/suffix checks only

use std::sync::Arc;

use crate::i18n::LocaleProvider;
use crate::route::pattern::denormalize_page_path;

/// Suffix marking a prefetch fragment request.
pub const RSC_PREFETCH_SUFFIX: &str = ".prefetch.rsc";

/// Suffix marking a fragment request.
pub const RSC_SUFFIX: &str = ".rsc";

/// Suffix marking a server action request.
pub const ACTION_SUFFIX: &str = ".action";

/// Prefix of partial-render resume requests.
pub const POSTPONED_PREFIX: &str = "/_next/postponed/resume";

/// Trait for recognizing and canonicalizing a pathname shape.
pub trait PathnameNormalizer: Send + Sync + std::fmt::Debug {
    /// Returns true if the pathname has this shape.
    fn matches(&self, pathname: &str) -> bool;

    /// Rewrite the pathname to its canonical form.
    fn normalize(&self, pathname: &str, strict: bool) -> String;
}

/// Strips a fixed prefix (`/prefix/x` → `/x`).
#[derive(Debug, Clone)]
struct PrefixNormalizer {
    prefix: String,
}

impl PrefixNormalizer {
    fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn matches(&self, pathname: &str) -> bool {
        pathname == self.prefix
            || pathname
                .strip_prefix(&self.prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    fn strip(&self, pathname: &str) -> String {
        match pathname.strip_prefix(&self.prefix) {
            Some("") | None => "/".to_string(),
            Some(rest) => rest.to_string(),
        }
    }
}

/// Strips a fixed suffix (`/x.rsc` → `/x`).
#[derive(Debug, Clone)]
struct SuffixNormalizer {
    suffix: &'static str,
}

impl SuffixNormalizer {
    fn matches(&self, pathname: &str) -> bool {
        pathname.ends_with(self.suffix)
    }

    fn strip(&self, pathname: &str) -> String {
        let stripped = pathname.strip_suffix(self.suffix).unwrap_or(pathname);
        denormalize_page_path(stripped)
    }
}

/// Matches the configured base path.
#[derive(Debug, Clone)]
pub struct BasePathNormalizer {
    inner: PrefixNormalizer,
}

impl BasePathNormalizer {
    /// `None` when no base path is configured.
    pub fn new(base_path: &str) -> Option<Self> {
        if base_path.is_empty() || base_path == "/" {
            return None;
        }
        Some(Self {
            inner: PrefixNormalizer::new(base_path),
        })
    }
}

impl PathnameNormalizer for BasePathNormalizer {
    fn matches(&self, pathname: &str) -> bool {
        self.inner.matches(pathname)
    }

    fn normalize(&self, pathname: &str, strict: bool) -> String {
        if !strict && !self.matches(pathname) {
            return pathname.to_string();
        }
        self.inner.strip(pathname)
    }
}

/// Matches `/_next/data/<build_id>/<page>.json`.
#[derive(Debug, Clone)]
pub struct DataNormalizer {
    prefix: PrefixNormalizer,
    suffix: SuffixNormalizer,
}

impl DataNormalizer {
    pub fn new(build_id: &str) -> Self {
        Self {
            prefix: PrefixNormalizer::new(format!("/_next/data/{build_id}")),
            suffix: SuffixNormalizer { suffix: ".json" },
        }
    }
}

impl PathnameNormalizer for DataNormalizer {
    fn matches(&self, pathname: &str) -> bool {
        self.prefix.matches(pathname) && self.suffix.matches(pathname)
    }

    fn normalize(&self, pathname: &str, strict: bool) -> String {
        if !strict && !self.matches(pathname) {
            return pathname.to_string();
        }
        let without_prefix = self.prefix.strip(pathname);
        self.suffix.strip(&without_prefix)
    }
}

/// Matches partial-render resume requests.
#[derive(Debug, Clone)]
pub struct PostponedNormalizer {
    inner: PrefixNormalizer,
}

impl Default for PostponedNormalizer {
    fn default() -> Self {
        Self {
            inner: PrefixNormalizer::new(POSTPONED_PREFIX),
        }
    }
}

impl PathnameNormalizer for PostponedNormalizer {
    fn matches(&self, pathname: &str) -> bool {
        self.inner.matches(pathname)
    }

    fn normalize(&self, pathname: &str, strict: bool) -> String {
        if !strict && !self.matches(pathname) {
            return pathname.to_string();
        }
        denormalize_page_path(&self.inner.strip(pathname))
    }
}

/// Matches prefetch fragment requests (`/x.prefetch.rsc`).
#[derive(Debug, Clone)]
pub struct PrefetchFragmentNormalizer {
    inner: SuffixNormalizer,
}

impl Default for PrefetchFragmentNormalizer {
    fn default() -> Self {
        Self {
            inner: SuffixNormalizer {
                suffix: RSC_PREFETCH_SUFFIX,
            },
        }
    }
}

impl PrefetchFragmentNormalizer {
    fn root() -> String {
        format!("/__index{RSC_PREFETCH_SUFFIX}")
    }
}

impl PathnameNormalizer for PrefetchFragmentNormalizer {
    fn matches(&self, pathname: &str) -> bool {
        pathname == Self::root() || self.inner.matches(pathname)
    }

    fn normalize(&self, pathname: &str, strict: bool) -> String {
        if pathname == Self::root() {
            return "/".to_string();
        }
        if !strict && !self.matches(pathname) {
            return pathname.to_string();
        }
        self.inner.strip(pathname)
    }
}

/// Matches fragment requests (`/x.rsc`).
#[derive(Debug, Clone)]
pub struct FragmentNormalizer {
    inner: SuffixNormalizer,
}

impl Default for FragmentNormalizer {
    fn default() -> Self {
        Self {
            inner: SuffixNormalizer { suffix: RSC_SUFFIX },
        }
    }
}

impl PathnameNormalizer for FragmentNormalizer {
    fn matches(&self, pathname: &str) -> bool {
        self.inner.matches(pathname)
    }

    fn normalize(&self, pathname: &str, strict: bool) -> String {
        if !strict && !self.matches(pathname) {
            return pathname.to_string();
        }
        self.inner.strip(pathname)
    }
}

/// Matches server action requests (`/x.action`).
#[derive(Debug, Clone)]
pub struct ActionNormalizer {
    inner: SuffixNormalizer,
}

impl Default for ActionNormalizer {
    fn default() -> Self {
        Self {
            inner: SuffixNormalizer {
                suffix: ACTION_SUFFIX,
            },
        }
    }
}

impl PathnameNormalizer for ActionNormalizer {
    fn matches(&self, pathname: &str) -> bool {
        self.inner.matches(pathname)
    }

    fn normalize(&self, pathname: &str, strict: bool) -> String {
        if !strict && !self.matches(pathname) {
            return pathname.to_string();
        }
        self.inner.strip(pathname)
    }
}

/// Matches pathnames led by a configured locale (`/fr/x` → `/x`).
#[derive(Debug, Clone)]
pub struct LocaleRouteNormalizer {
    provider: Arc<dyn LocaleProvider>,
}

impl LocaleRouteNormalizer {
    pub fn new(provider: Arc<dyn LocaleProvider>) -> Self {
        Self { provider }
    }
}

impl PathnameNormalizer for LocaleRouteNormalizer {
    fn matches(&self, pathname: &str) -> bool {
        self.provider.analyze(pathname, None).detected_locale.is_some()
    }

    fn normalize(&self, pathname: &str, _strict: bool) -> String {
        self.provider.analyze(pathname, None).pathname
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::I18nConfig;
    use crate::i18n::I18nProvider;

    #[test]
    fn test_base_path_normalizer() {
        assert!(BasePathNormalizer::new("").is_none());
        let n = BasePathNormalizer::new("/docs").unwrap();
        assert!(n.matches("/docs"));
        assert!(n.matches("/docs/a"));
        assert!(!n.matches("/docsx"));
        assert_eq!(n.normalize("/docs", false), "/");
        assert_eq!(n.normalize("/docs/a", false), "/a");
        assert_eq!(n.normalize("/other", false), "/other");
    }

    #[test]
    fn test_data_normalizer() {
        let n = DataNormalizer::new("b1");
        assert!(n.matches("/_next/data/b1/blog/post.json"));
        assert!(!n.matches("/_next/data/b2/blog/post.json"));
        assert!(!n.matches("/_next/data/b1/blog/post"));
        assert_eq!(n.normalize("/_next/data/b1/blog/post.json", true), "/blog/post");
        assert_eq!(n.normalize("/_next/data/b1/index.json", true), "/");
    }

    #[test]
    fn test_postponed_normalizer() {
        let n = PostponedNormalizer::default();
        assert!(n.matches("/_next/postponed/resume/blog"));
        assert!(!n.matches("/_next/postponed/resumex"));
        assert_eq!(n.normalize("/_next/postponed/resume/blog", true), "/blog");
        assert_eq!(n.normalize("/_next/postponed/resume", true), "/");
        assert_eq!(n.normalize("/_next/postponed/resume/index", true), "/");
    }

    #[test]
    fn test_fragment_normalizers_overlap() {
        let prefetch = PrefetchFragmentNormalizer::default();
        let fragment = FragmentNormalizer::default();

        let path = "/dashboard.prefetch.rsc";
        assert!(prefetch.matches(path));
        assert!(fragment.matches(path));
        assert_eq!(prefetch.normalize(path, true), "/dashboard");
        assert_eq!(fragment.normalize(path, true), "/dashboard.prefetch");

        assert_eq!(prefetch.normalize("/__index.prefetch.rsc", false), "/");
        assert_eq!(fragment.normalize("/index.rsc", true), "/");
    }

    #[test]
    fn test_action_normalizer() {
        let n = ActionNormalizer::default();
        assert!(n.matches("/form.action"));
        assert_eq!(n.normalize("/form.action", true), "/form");
        assert_eq!(n.normalize("/form", false), "/form");
    }

    #[test]
    fn test_locale_route_normalizer() {
        let provider = Arc::new(I18nProvider::new(I18nConfig {
            locales: vec!["en".into(), "de".into()],
            default_locale: "en".into(),
            domains: vec![],
        }));
        let n = LocaleRouteNormalizer::new(provider);
        assert!(n.matches("/de/about"));
        assert!(!n.matches("/about"));
        assert_eq!(n.normalize("/de/about", true), "/about");
    }
}
