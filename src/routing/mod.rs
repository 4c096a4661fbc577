//! Pathname shape subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming pathname
//!     → router.rs (ShapeChain, precedence order)
//!     → matcher.rs (one normalizer per shape)
//!     → Return: (Shape | none, canonical pathname)
//!
//! Chain Compilation (at startup):
//!     AdapterConfig (build id, directories, experimental flags)
//!     → Keep enabled shapes in precedence order
//!     → Freeze as immutable ShapeChain
//! ```
//!
//! # Design Decisions
//! - Shapes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix/suffix matching only)
//! - Deterministic: same input always resolves the same shape
//! - First match wins (Data > Postponed > PrefetchFragment > Fragment > Action)

pub mod matcher;
pub mod router;

pub use matcher::PathnameNormalizer;
pub use router::{Normalizers, Shape, ShapeChain};
