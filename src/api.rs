//! HTTP server for the games API and the portal pages
//!
//! `/api/*` exposes the game catalog as JSON. Everything else is the
//! server-rendered portal.

use crate::db::{run_blocking, GameStore};
use crate::error::{json_error_response, ApiErrorCode};
use crate::portal::{self, PortalSource};
use crate::registry::GameRegistry;
use crate::views::parse_game_id;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Version information for the server
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Body returned by the health endpoint
pub const HEALTH_STATUS: &str = "Server is healthy and running";

/// Generic body for storage failures; details only go to the log
const STORAGE_ERROR_MESSAGE: &str = "Internal server error";

/// How long open connections may keep running once shutdown starts
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Games API and portal server
pub struct ApiServer {
    bind_addr: SocketAddr,
    store: Arc<dyn GameStore>,
    registry: Arc<GameRegistry>,
    source: PortalSource,
    assets_dir: PathBuf,
    shutdown_grace: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl ApiServer {
    pub fn new(
        bind_addr: SocketAddr,
        store: Arc<dyn GameStore>,
        registry: Arc<GameRegistry>,
        source: PortalSource,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            bind_addr,
            store,
            registry,
            source,
            assets_dir: PathBuf::from("assets"),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            shutdown_rx,
        }
    }

    /// Set the directory served under /assets/ (builder pattern)
    pub fn with_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = dir.into();
        self
    }

    /// Set how long open connections get to finish after shutdown
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Serve on an already bound listener until shutdown, then give open
    /// connections up to the grace period to finish
    pub async fn run_with_listener(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!(addr = %addr, "Backend server is running on http://{}", addr);
        info!("API health check available at http://{}/api/health", addr);

        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let server = Arc::clone(&self);
                            let conn_shutdown = shutdown_rx.clone();
                            connections.spawn(async move {
                                if let Err(e) = server.serve_connection(stream, conn_shutdown).await {
                                    debug!(addr = %addr, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                // Reap finished connections
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        info!("Shutdown channel closed, API server shutting down");
                        break;
                    }
                    if *shutdown_rx.borrow() {
                        info!("API server shutting down");
                        break;
                    }
                }
            }
        }

        drop(listener);
        self.drain(connections).await;

        Ok(())
    }

    /// Wait for open connections, aborting whatever is left after the grace period
    async fn drain(&self, mut connections: JoinSet<()>) {
        if connections.is_empty() {
            return;
        }

        info!(
            open = connections.len(),
            grace_ms = self.shutdown_grace.as_millis() as u64,
            "Waiting for open connections to finish"
        );

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(remaining = connections.len(), "Grace period elapsed, closing remaining connections");
            connections.abort_all();
        }
    }

    async fn serve_connection<S>(
        self: Arc<Self>,
        stream: S,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = TokioIo::new(stream);
        let service = service_fn(move |req| {
            let server = Arc::clone(&self);
            async move { server.handle_request(req).await }
        });

        let builder = AutoBuilder::new(TokioExecutor::new());
        let conn = builder.serve_connection(io, service);
        tokio::pin!(conn);

        // Idle connections close at once; a request in progress gets its
        // response and then the connection closes
        let mut closing = false;
        loop {
            tokio::select! {
                result = conn.as_mut() => {
                    return result.map_err(|e| anyhow::anyhow!("Connection error: {}", e));
                }
                changed = shutdown_rx.changed(), if !closing => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        conn.as_mut().graceful_shutdown();
                        closing = true;
                    }
                }
            }
        }
    }

    async fn handle_request(
        self: Arc<Self>,
        req: Request<hyper::body::Incoming>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        Ok(self.route(req.method(), req.uri().path()).await)
    }

    /// Dispatch a request by method and path
    pub async fn route(&self, method: &Method, path: &str) -> Response<Full<Bytes>> {
        debug!(%method, %path, "Request");

        if path == "/api" || path.starts_with("/api/") {
            let api_path = path.strip_prefix("/api").unwrap_or("");
            return self.route_api(method, api_path).await;
        }

        if method != Method::GET && method != Method::HEAD {
            return portal::not_found_page();
        }

        match path {
            "/" => portal::listing_page(&self.source).await,
            "/portal.css" => portal::serve_css(),
            path if path.starts_with("/game/") => {
                let game_id = path.strip_prefix("/game/").unwrap_or("");
                portal::detail_page(&self.source, &self.registry, game_id).await
            }
            path if path.starts_with("/assets/") => {
                let relative = path.strip_prefix("/assets/").unwrap_or("");
                portal::serve_asset(&self.assets_dir, relative).await
            }
            _ => portal::not_found_page(),
        }
    }

    async fn route_api(&self, method: &Method, path: &str) -> Response<Full<Bytes>> {
        if method == Method::OPTIONS {
            return preflight_response();
        }

        let path = path.trim_end_matches('/');
        match (method, path) {
            (&Method::GET | &Method::HEAD, "/health") => {
                json_response(StatusCode::OK, &HealthResponse { status: HEALTH_STATUS })
            }
            (&Method::GET | &Method::HEAD, "/version") => {
                let version = serde_json::json!({
                    "name": PKG_NAME,
                    "version": VERSION,
                });
                json_response(StatusCode::OK, &version)
            }
            (&Method::GET | &Method::HEAD, "/games") => self.list_games().await,
            (&Method::GET | &Method::HEAD, path) if path.starts_with("/games/") => {
                let segment = path.strip_prefix("/games/").unwrap_or("");
                self.get_game(segment).await
            }
            (_, "/health") | (_, "/version") | (_, "/games") => {
                json_error_response(ApiErrorCode::MethodNotAllowed, "Method not allowed")
            }
            (_, path) if path.starts_with("/games/") => {
                json_error_response(ApiErrorCode::MethodNotAllowed, "Method not allowed")
            }
            _ => json_error_response(ApiErrorCode::NotFound, "Not found"),
        }
    }

    async fn list_games(&self) -> Response<Full<Bytes>> {
        match run_blocking(Arc::clone(&self.store), |s| s.list_games()).await {
            Ok(games) => json_response(StatusCode::OK, &games),
            Err(e) => {
                error!(error = %e, "Failed to list games");
                json_error_response(ApiErrorCode::StorageUnavailable, STORAGE_ERROR_MESSAGE)
            }
        }
    }

    async fn get_game(&self, segment: &str) -> Response<Full<Bytes>> {
        let Some(id) = parse_game_id(segment) else {
            return json_error_response(ApiErrorCode::NotFound, "Game not found");
        };

        match run_blocking(Arc::clone(&self.store), move |s| s.get_game(id)).await {
            Ok(Some(game)) => json_response(StatusCode::OK, &game),
            Ok(None) => json_error_response(ApiErrorCode::NotFound, "Game not found"),
            Err(e) => {
                error!(game_id = id, error = %e, "Failed to fetch game");
                json_error_response(ApiErrorCode::StorageUnavailable, STORAGE_ERROR_MESSAGE)
            }
        }
    }
}

// ==================== Helper Functions ====================

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .body(Full::new(Bytes::from(body)))
            .expect("valid response with StatusCode enum and static headers"),
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            json_error_response(ApiErrorCode::InternalError, "Internal server error")
        }
    }
}

fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(ACCESS_CONTROL_ALLOW_METHODS, "GET,HEAD,PUT,PATCH,POST,DELETE")
        .header(ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type")
        .body(Full::new(Bytes::new()))
        .expect("valid response with StatusCode enum and static headers")
}
