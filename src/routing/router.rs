//! Shape resolution chain.
//!
//! # Responsibilities
//! - Hold the enabled shape normalizers in precedence order
//! - Resolve the first shape a pathname matches and its canonical path
//!
//! # Design Decisions
//! - Ordered `Vec`, never a map: `.prefetch.rsc` paths also end in `.rsc`,
//!   so evaluation order is the disambiguation rule
//! - Immutable after construction (thread-safe without locks)
//! - Disabled shapes are absent from the chain, not skipped at runtime

use std::fmt;
use std::sync::Arc;

use crate::config::schema::AdapterConfig;
use crate::i18n::LocaleProvider;
use crate::routing::matcher::{
    ActionNormalizer, BasePathNormalizer, DataNormalizer, FragmentNormalizer,
    LocaleRouteNormalizer, PathnameNormalizer, PostponedNormalizer, PrefetchFragmentNormalizer,
};

/// Structurally distinguishable request pathname category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Data,
    Postponed,
    PrefetchFragment,
    Fragment,
    Action,
}

impl Shape {
    /// Precedence order, highest first.
    pub const PRECEDENCE: [Shape; 5] = [
        Shape::Data,
        Shape::Postponed,
        Shape::PrefetchFragment,
        Shape::Fragment,
        Shape::Action,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Data => "data",
            Shape::Postponed => "postponed",
            Shape::PrefetchFragment => "prefetch_fragment",
            Shape::Fragment => "fragment",
            Shape::Action => "action",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enabled shape normalizers in fixed precedence order.
#[derive(Debug, Clone, Default)]
pub struct ShapeChain {
    entries: Vec<(Shape, Arc<dyn PathnameNormalizer>)>,
}

impl ShapeChain {
    /// Build the chain from the shapes the configuration enables.
    pub fn from_config(config: &AdapterConfig) -> Self {
        let app = config.directories.app;
        let mut entries: Vec<(Shape, Arc<dyn PathnameNormalizer>)> = Vec::new();

        for shape in Shape::PRECEDENCE {
            let normalizer: Arc<dyn PathnameNormalizer> = match shape {
                Shape::Data if config.directories.pages => {
                    Arc::new(DataNormalizer::new(&config.build_id))
                }
                Shape::Postponed if config.experimental.ppr => {
                    Arc::new(PostponedNormalizer::default())
                }
                Shape::PrefetchFragment if app => Arc::new(PrefetchFragmentNormalizer::default()),
                Shape::Fragment if app => Arc::new(FragmentNormalizer::default()),
                Shape::Action if app && config.experimental.server_actions => {
                    Arc::new(ActionNormalizer::default())
                }
                _ => continue,
            };
            entries.push((shape, normalizer));
        }

        Self { entries }
    }

    /// First matching shape and the pathname normalized for it.
    ///
    /// An unmatched pathname is returned unchanged.
    pub fn resolve(&self, pathname: &str) -> (Option<Shape>, String) {
        for (shape, normalizer) in &self.entries {
            if normalizer.matches(pathname) {
                return (Some(*shape), normalizer.normalize(pathname, true));
            }
        }
        (None, pathname.to_string())
    }

    /// The normalizer for `shape`, if that shape is enabled.
    pub fn normalizer(&self, shape: Shape) -> Option<&dyn PathnameNormalizer> {
        self.entries
            .iter()
            .find(|(s, _)| *s == shape)
            .map(|(_, n)| n.as_ref())
    }

    /// True when `shape` is enabled and matches `pathname`.
    pub fn matches(&self, shape: Shape, pathname: &str) -> bool {
        self.normalizer(shape).is_some_and(|n| n.matches(pathname))
    }

    pub fn shapes(&self) -> impl Iterator<Item = Shape> + '_ {
        self.entries.iter().map(|(s, _)| *s)
    }
}

/// Every normalizer an adapter instance owns.
#[derive(Debug, Clone, Default)]
pub struct Normalizers {
    pub base_path: Option<BasePathNormalizer>,
    pub locale: Option<LocaleRouteNormalizer>,
    pub shapes: ShapeChain,
}

impl Normalizers {
    pub fn new(config: &AdapterConfig, i18n: Option<Arc<dyn LocaleProvider>>) -> Self {
        Self {
            base_path: BasePathNormalizer::new(&config.base_path),
            locale: i18n.map(LocaleRouteNormalizer::new),
            shapes: ShapeChain::from_config(config),
        }
    }

    /// Strip the base path when present; other pathnames pass through.
    pub fn strip_base_path(&self, pathname: &str) -> String {
        match &self.base_path {
            Some(n) => n.normalize(pathname, false),
            None => pathname.to_string(),
        }
    }
}
