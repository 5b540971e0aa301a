//! Traffic generator driving a relay, over HTTP/1.1 and HTTP/2.

use axum::http::{HeaderName, HeaderValue, Uri};
use upstream_relay::bench::{send_traffic, Sender, Target, TrafficPlan};
use upstream_relay::config::TransportMode;
use upstream_relay::mock_upstream::{MockUpstream, MARKER_HEADER, MARKER_VALUE};

mod common;

fn plan(concurrency: usize, iterations: usize) -> TrafficPlan {
    TrafficPlan {
        uri: Uri::from_static("http://localhost/"),
        concurrency,
        iterations,
        expected_header: Some((MARKER_HEADER, MARKER_VALUE)),
        progress: false,
    }
}

async fn run_against_relay(inbound: TransportMode, upstream_transport: TransportMode) {
    let payload = MockUpstream::filler_payload(64 * 1024);
    let upstream = MockUpstream::new(upstream_transport, payload.clone());
    let upstream_addr = common::start_mock_upstream(upstream.clone()).await;
    let relay = common::start_relay(upstream_addr, upstream_transport).await;

    let io = Target::Tcp(relay.addr).connect().await.unwrap();
    let sender = Sender::handshake(io, inbound).await.unwrap();
    let report = send_traffic(&sender, &plan(4, 20)).await.unwrap();

    assert_eq!(report.requests, 20);
    assert_eq!(report.bytes, 20 * payload.len() as u64);
    // 20 requests plus the warm-up.
    assert_eq!(upstream.served(), 21);

    relay.shutdown.trigger();
}

#[tokio::test]
async fn test_http2_client_through_http2_relay() {
    run_against_relay(TransportMode::Http2, TransportMode::Http2).await;
}

#[tokio::test]
async fn test_http1_client_through_http1_relay() {
    run_against_relay(TransportMode::Http1, TransportMode::Http1).await;
}

#[tokio::test]
async fn test_http2_client_through_http1_relay() {
    run_against_relay(TransportMode::Http2, TransportMode::Http1).await;
}

#[tokio::test]
async fn test_missing_header_fails_the_run() {
    let upstream = MockUpstream::new(TransportMode::Http1, "data");
    let upstream_addr = common::start_mock_upstream(upstream).await;
    let relay = common::start_relay(upstream_addr, TransportMode::Http1).await;

    let io = Target::Tcp(relay.addr).connect().await.unwrap();
    let sender = Sender::handshake(io, TransportMode::Http2).await.unwrap();

    let mut plan = plan(2, 5);
    plan.expected_header = Some((
        HeaderName::from_static("x-not-there"),
        HeaderValue::from_static("1"),
    ));
    let err = send_traffic(&sender, &plan).await.unwrap_err();
    assert!(format!("{err:#}").contains("x-not-there"));

    relay.shutdown.trigger();
}

#[tokio::test]
async fn test_failed_upstream_fails_the_run() {
    let upstream_addr = common::closed_port().await;
    let relay = common::start_relay(upstream_addr, TransportMode::Http1).await;

    let io = Target::Tcp(relay.addr).connect().await.unwrap();
    let sender = Sender::handshake(io, TransportMode::Http1).await.unwrap();

    let err = send_traffic(&sender, &plan(1, 3)).await.unwrap_err();
    assert!(format!("{err:#}").contains("500"));

    relay.shutdown.trigger();
}
