//! Request normalization and route resolution for a page-rendering server.

pub mod adapter;
pub mod config;
pub mod http;
pub mod i18n;
pub mod observability;
pub mod route;
pub mod routing;

pub use adapter::{AdapterError, RequestAdapter, RequestEnvelope};
pub use config::schema::AdapterConfig;
pub use http::AdapterServer;
