//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Build one pooled client at startup, pinned to a single HTTP version
//! - Issue the fixed upstream request and hand back the streaming response
//!
//! # Design Decisions
//! - `http1` never upgrades, `http2` uses prior knowledge (h2c) and never falls back
//! - No retry and no request timeout; only the TCP connect has a deadline

use std::time::Duration;

use axum::http::{Method, Request, Response, Uri, Version};
use http_body_util::Empty;
use hyper::body::{Bytes, Incoming};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};

use crate::config::{TransportMode, UpstreamConfig};

/// Errors raised while talking to the upstream.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The configured upstream URL does not parse.
    #[error("invalid upstream url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },
    /// The outbound request could not be assembled.
    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),
    /// Connecting to or exchanging with the upstream failed.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

/// Pooled client bound to the configured upstream and transport.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Empty<Bytes>>,
    target: Uri,
    transport: TransportMode,
}

impl UpstreamClient {
    /// Build the client from configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, RelayError> {
        let target: Uri = config.url.parse().map_err(|source| RelayError::InvalidUrl {
            url: config.url.clone(),
            source,
        })?;

        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        if config.connect_timeout_secs > 0 {
            connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        }

        let mut builder = Client::builder(TokioExecutor::new());
        builder
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .http2_only(config.transport == TransportMode::Http2);

        tracing::debug!(
            upstream = %target,
            transport = %config.transport,
            "Upstream client built"
        );

        Ok(Self {
            client: builder.build(connector),
            target,
            transport: config.transport,
        })
    }

    /// The fixed upstream URL.
    pub fn target(&self) -> &Uri {
        &self.target
    }

    /// The transport this client was built for.
    pub fn transport(&self) -> TransportMode {
        self.transport
    }

    fn version(&self) -> Version {
        match self.transport {
            TransportMode::Http1 => Version::HTTP_11,
            TransportMode::Http2 => Version::HTTP_2,
        }
    }

    /// Send one `GET` to the upstream and return its response with the body
    /// still streaming.
    pub async fn fetch(&self) -> Result<Response<Incoming>, RelayError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.target.clone())
            .version(self.version())
            .body(Empty::new())?;

        Ok(self.client.request(request).await?)
    }
}
