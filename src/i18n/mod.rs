//! Internationalization subsystem.
//!
//! # Data Flow
//! ```text
//! I18nConfig (locales, default locale, domains)
//!     → provider.rs (compiled once, lower-cased lookup tables)
//!     → analyze(pathname)        → detected locale + stripped pathname
//!     → detect_domain_locale(host) → per-domain default locale
//! ```
//!
//! # Design Decisions
//! - Locale segments match case-insensitively but report configured casing
//! - A default locale is only ever "inferred", never "detected"

pub mod provider;

pub use provider::{I18nProvider, LocaleAnalysis, LocaleProvider};
