//! HTTP server setup and the relay handler.
//!
//! # Responsibilities
//! - Create the Axum router with the relay handler
//! - Wire up middleware (request ID, tracing)
//! - Serve HTTP/1.1 and HTTP/2 (prior knowledge) on accepted connections
//! - Forward every request to the upstream and stream the answer back
//! - Drain open connections on shutdown

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Method, Response, Uri},
    routing::any,
    Router,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use tokio::net::TcpStream;
use tower::ServiceBuilder;
use tower_http::{request_id::SetRequestIdLayer, trace::TraceLayer};
use tracing::Instrument;

use crate::config::RelayConfig;
use crate::http::client::{RelayError, UpstreamClient};
use crate::http::request::{request_span, UuidRequestId};
use crate::http::response::relay_response;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;

/// Log message emitted once the server accepts traffic.
pub const READY_MESSAGE: &str = "Listening for connections";

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Error type for the server loop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("Failed to read local address: {0}")]
    LocalAddr(std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct RelayState {
    pub client: UpstreamClient,
}

/// HTTP server for the relay.
pub struct RelayServer {
    router: Router,
    tracker: ConnectionTracker,
    shutdown_timeout: Duration,
}

impl RelayServer {
    /// Create a new server, building the upstream client from configuration.
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let client = UpstreamClient::new(&config.upstream)?;
        Ok(Self::with_client(config, client))
    }

    /// Create a new server around an existing upstream client.
    pub fn with_client(config: &RelayConfig, client: UpstreamClient) -> Self {
        let state = RelayState { client };
        Self {
            router: Self::build_router(state),
            tracker: ConnectionTracker::new(),
            shutdown_timeout: Duration::from_secs(config.lifecycle.shutdown_timeout_secs),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: RelayState) -> Router {
        Router::new()
            .route("/", any(relay_handler))
            .route("/{*path}", any(relay_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http().make_span_with(request_span)),
            )
    }

    /// The router serving every connection.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Accept and serve connections until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, shutdown: &Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
        tracing::info!(address = %addr, "{}", READY_MESSAGE);

        let mut stop = shutdown.subscribe();
        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = stop.wait() => break,
            };

            let (stream, peer_addr, permit) = match accepted {
                Ok(connection) => connection,
                Err(ListenerError::Accept(e)) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let guard = self.tracker.track();
            let span = tracing::debug_span!(
                "connection",
                connection_id = %guard.id(),
                peer_addr = %peer_addr,
            );
            tokio::spawn(
                serve_connection(stream, self.router.clone(), shutdown.subscribe(), permit, guard)
                    .instrument(span),
            );
        }

        drop(listener);
        tracing::info!(
            active_connections = self.tracker.active_count(),
            "Shutdown signal received, draining connections"
        );
        if !self.tracker.drain(self.shutdown_timeout).await {
            tracing::warn!(
                active_connections = self.tracker.active_count(),
                timeout_secs = self.shutdown_timeout.as_secs(),
                "Drain timeout elapsed with connections still open"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Serve one inbound connection, HTTP/1.1 or HTTP/2 as the client speaks.
async fn serve_connection(
    stream: TcpStream,
    router: Router,
    mut shutdown: ShutdownSignal,
    _permit: ConnectionPermit,
    _guard: ConnectionGuard,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
    }

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(router));
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(error = %e, "Connection ended with error");
                }
                break;
            }
            _ = shutdown.wait(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

/// Relay handler.
///
/// The inbound method, headers and body are not forwarded: every request
/// turns into one `GET` of the fixed upstream URL.
async fn relay_handler(
    State(state): State<RelayState>,
    method: Method,
    uri: Uri,
) -> Result<Response<Body>, RelayError> {
    let start = Instant::now();
    let transport = state.client.transport();

    tracing::debug!(
        method = %method,
        path = %uri.path(),
        upstream = %state.client.target(),
        transport = %transport,
        "Relaying request"
    );

    match state.client.fetch().await {
        Ok(upstream) => {
            let status = upstream.status();
            metrics::record_relay(transport, status.as_u16(), start);
            tracing::debug!(
                upstream_status = %status,
                upstream_version = ?upstream.version(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Upstream responded"
            );
            Ok(relay_response(upstream))
        }
        Err(e) => {
            metrics::record_upstream_error(transport);
            tracing::error!(
                upstream = %state.client.target(),
                transport = %transport,
                error = ?e,
                "Upstream error"
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn unreachable_upstream_is_internal_server_error() {
        let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_addr = closed.local_addr().unwrap();
        drop(closed);

        let mut config = RelayConfig::default();
        config.upstream.url = format!("http://{closed_addr}");
        config.upstream.connect_timeout_secs = 1;
        let server = RelayServer::new(&config).unwrap();

        let response = server
            .router()
            .oneshot(Request::builder().uri("/any/path").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
