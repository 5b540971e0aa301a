use std::net::SocketAddr;

use axum::http::{header, HeaderValue};
use clap::Parser;
use tokio::net::TcpListener;

use upstream_relay::config::{ObservabilityConfig, TransportMode};
use upstream_relay::lifecycle::signals::wait_for_shutdown_signal;
use upstream_relay::mock_upstream::MockUpstream;
use upstream_relay::observability::init_logging;

#[derive(Parser, Debug)]
#[command(name = "mock-upstream", about = "Fixed-payload upstream for the relay")]
struct Args {
    /// Use HTTP/1.1. If false, HTTP/2 (prior knowledge) is used.
    #[arg(long, default_value = "false")]
    http1: bool,
    #[arg(long, default_value = "3111")]
    port: u16,
    /// Size of the response body in bytes.
    #[arg(long, default_value = "1048576")]
    payload_size: usize,
    /// Content-Type of the response.
    #[arg(long, default_value = "application/octet-stream")]
    content_type: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    init_logging(&ObservabilityConfig::default())?;

    let transport = if args.http1 {
        TransportMode::Http1
    } else {
        TransportMode::Http2
    };
    let upstream = MockUpstream::new(transport, MockUpstream::filler_payload(args.payload_size))
        .with_header(header::CONTENT_TYPE, HeaderValue::from_str(&args.content_type)?);

    let addr: SocketAddr = ([127, 0, 0, 1], args.port).into();
    let listener = TcpListener::bind(addr).await?;

    tokio::select! {
        result = upstream.serve(listener) => result?,
        result = wait_for_shutdown_signal() => result?,
    }

    Ok(())
}
