//! Shared utilities for integration testing.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{Request, Response};
use hyper::body::{Body, Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use upstream_relay::config::{RelayConfig, TransportMode};
use upstream_relay::http::{RelayServer, ServerError};
use upstream_relay::lifecycle::Shutdown;
use upstream_relay::mock_upstream::MockUpstream;
use upstream_relay::net::Listener;

/// A relay running on an ephemeral port.
#[allow(dead_code)]
pub struct RunningRelay {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), ServerError>>,
}

#[allow(dead_code)]
impl RunningRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a mock upstream on an ephemeral port.
pub async fn start_mock_upstream(upstream: MockUpstream) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(upstream.serve(listener));
    addr
}

/// Start an HTTP/1.1 upstream answering every request with `respond()`.
#[allow(dead_code)]
pub async fn start_http1_upstream<F, B>(respond: F) -> SocketAddr
where
    F: Fn() -> Response<B> + Clone + Send + Sync + 'static,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let respond = respond.clone();
            tokio::spawn(async move {
                let service = service_fn(move |_request: Request<Incoming>| {
                    let response = respond();
                    async move { Ok::<_, Infallible>(response) }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });
    addr
}

/// Start a relay forwarding to `upstream_addr` over `transport`.
pub async fn start_relay(upstream_addr: SocketAddr, transport: TransportMode) -> RunningRelay {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.url = format!("http://{upstream_addr}");
    config.upstream.transport = transport;
    config.upstream.connect_timeout_secs = 2;
    config.lifecycle.shutdown_timeout_secs = 2;

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = RelayServer::new(&config).unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    let task = tokio::spawn(async move { server.run(listener, &server_shutdown).await });

    RunningRelay { addr, shutdown, task }
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Plain HTTP/1.1 client without pooling or system proxies.
#[allow(dead_code)]
pub fn http1_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
