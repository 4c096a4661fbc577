//! Route resolution collaborators.
//!
//! # Data Flow
//! ```text
//! Route definitions (config pages / manifest)
//!     → pattern.rs (compile "/blog/[slug]" into a matcher with groups)
//!     → matcher.rs (pathname → definition + params)
//!
//! Per request, once the page is known:
//!     → utils.rs (rewrites, param validation, interpolation)
//!     → rewrites.rs (rule sources, conditions, destinations)
//! ```
//!
//! # Design Decisions
//! - Definitions compile once; per-page regexes are cached concurrently
//! - Bracket syntax for definitions, colon syntax for rewrite sources

pub mod matcher;
pub mod pattern;
pub mod rewrites;
pub mod utils;

pub use matcher::{ManifestRouteMatcher, RouteDefinition, RouteMatch, RouteMatcher};
pub use pattern::{denormalize_page_path, is_dynamic_route, RouteRegex};
pub use rewrites::{
    CompiledRewrites, FileManifest, ManifestSource, RoutesManifest, StaticManifest,
};
pub use utils::{normalize_next_query_param, ParamsResult, RouteRegexCache, RouteUtils};
