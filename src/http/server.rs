//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all adapter handler
//! - Wire up middleware (tracing, limits, timeout, request ID)
//! - Bind server to listener
//! - Swap in a rebuilt `RequestAdapter` when configuration reloads
//!
//! # Design Decisions
//! - The adapter sits behind `ArcSwap`; each request loads one snapshot
//!   and keeps it until the response is produced
//! - Listener-level settings (timeout, body limit) are fixed at startup;
//!   a reload only replaces the adapter
//! - A reload that fails to build keeps the current adapter

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::adapter::RequestAdapter;
use crate::config::AdapterConfig;
use crate::http::render::{JsonRenderer, Renderer};
use crate::http::request::{envelope_from_request, request_id};
use crate::http::response::error_kind;

/// Shared handle to the live adapter.
pub type AdapterHandle = Arc<ArcSwap<RequestAdapter>>;

#[derive(Clone)]
struct AppState {
    adapter: AdapterHandle,
    renderer: Arc<dyn Renderer>,
}

/// The HTTP front of the request adapter.
pub struct AdapterServer {
    adapter: AdapterHandle,
    router: Router,
}

impl AdapterServer {
    /// Create a server that renders with `JsonRenderer`.
    pub fn new(adapter: RequestAdapter) -> Self {
        Self::with_renderer(adapter, Arc::new(JsonRenderer))
    }

    pub fn with_renderer(adapter: RequestAdapter, renderer: Arc<dyn Renderer>) -> Self {
        let config = adapter.config().clone();
        let adapter: AdapterHandle = Arc::new(ArcSwap::from_pointee(adapter));
        let state = AppState {
            adapter: adapter.clone(),
            renderer,
        };
        let router = Self::build_router(&config, state);
        Self { adapter, router }
    }

    fn build_router(config: &AdapterConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(adapt_handler))
            .route("/", any(adapt_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for serving or for driving with `oneshot` in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Handle to the live adapter.
    pub fn handle(&self) -> AdapterHandle {
        self.adapter.clone()
    }

    /// Rebuild the adapter from `config` and swap it in.
    pub fn reload(&self, config: AdapterConfig) -> io::Result<()> {
        swap_adapter(&self.adapter, config)
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// When `updates` is given, every configuration received on it replaces
    /// the live adapter.
    pub async fn run(
        self,
        listener: TcpListener,
        updates: Option<mpsc::UnboundedReceiver<AdapterConfig>>,
    ) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(mut updates) = updates {
            let handle = self.adapter.clone();
            tokio::spawn(async move {
                while let Some(config) = updates.recv().await {
                    let build_id = config.build_id.clone();
                    match swap_adapter(&handle, config) {
                        Ok(()) => tracing::info!(build_id = %build_id, "Adapter reloaded"),
                        Err(e) => tracing::error!(
                            error = %e,
                            "Failed to rebuild adapter. Keeping current one."
                        ),
                    }
                }
            });
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn swap_adapter(handle: &ArcSwap<RequestAdapter>, config: AdapterConfig) -> io::Result<()> {
    let adapter = RequestAdapter::from_config(config)?;
    handle.store(Arc::new(adapter));
    Ok(())
}

/// Normalizes the request, then renders it.
async fn adapt_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers());
    let adapter = state.adapter.load_full();

    let mut env = envelope_from_request(request);
    match adapter.adapt(&mut env).await {
        Ok(()) => {
            tracing::debug!(
                request_id = %request_id,
                pathname = env.parsed_url.pathname.as_deref().unwrap_or_default(),
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Request normalized"
            );
            state.renderer.render(&env)
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                kind = error_kind(&e),
                error = %e,
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Request normalization failed"
            );
            state.renderer.render_error(&env, &e)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use tower::ServiceExt;

    fn server(pages: &[&str]) -> AdapterServer {
        let mut config = AdapterConfig::default();
        config.routes.pages = pages.iter().map(|p| p.to_string()).collect();
        AdapterServer::new(RequestAdapter::from_config(config).unwrap())
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let response = server(&["/a"])
            .router()
            .oneshot(
                Request::builder()
                    .uri("/a")
                    .header("x-matched-path", "/a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_body_times_out() {
        let stalled = futures_util::stream::pending::<Result<Bytes, io::Error>>();
        let response = server(&["/feed"])
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/_next/postponed/resume/feed")
                    .header("x-matched-path", "/_next/postponed/resume/feed")
                    .body(Body::from_stream(stalled))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_reload_swaps_adapter() {
        let server = server(&[]);
        let mut config = AdapterConfig::default();
        config.build_id = "next".into();
        server.reload(config).unwrap();
        assert_eq!(server.handle().load().config().build_id, "next");
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_adapter() {
        let server = server(&[]);
        let mut config = AdapterConfig::default();
        config.build_id = "broken".into();
        config.routes.manifest_path = Some("/definitely/not/here.json".into());
        assert!(server.reload(config).is_err());
        assert_eq!(server.handle().load().config().build_id, "development");
    }
}
