//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Initialize subsystems in dependency order
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener starts last (traffic only when ready)

use std::net::{AddrParseError, SocketAddr};

use crate::config::{validate_config, RelayConfig, ValidationError};
use crate::http::{RelayError, RelayServer, ServerError};
use crate::lifecycle::{signals, Shutdown};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

/// Errors that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Config(Vec<ValidationError>),
    #[error("invalid metrics address: {0}")]
    MetricsAddress(#[from] AddrParseError),
    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error(transparent)]
    Client(#[from] RelayError),
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Validate, start every subsystem and serve until a shutdown signal.
pub async fn run(config: RelayConfig) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match signals::wait_for_shutdown_signal().await {
            Ok(()) => trigger.trigger(),
            Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
        }
    });

    run_until(config, &shutdown).await
}

/// Like [`run`], but stops when `shutdown` is triggered instead of on a signal.
pub async fn run_until(config: RelayConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    validate_config(&config).map_err(StartupError::Config)?;

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = RelayServer::new(&config)?;

    tracing::info!(
        upstream = %config.upstream.url,
        transport = %config.upstream.transport,
        max_connections = config.listener.max_connections,
        "Subsystems initialized"
    );

    let listener = Listener::bind(&config.listener).await?;
    server.run(listener, shutdown).await?;
    Ok(())
}
