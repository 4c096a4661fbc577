//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, adapter snapshot)
//!     → request.rs (request ID, envelope from the axum request)
//!     → [adapter pipeline normalizes the envelope]
//!     → render.rs (renderer seam)
//!     → response.rs (error mapping)
//!     → Send to client
//! ```

pub mod render;
pub mod request;
pub mod response;
pub mod server;

pub use render::{JsonRenderer, Renderer};
pub use request::{envelope_from_request, X_REQUEST_ID};
pub use server::{AdapterHandle, AdapterServer};
