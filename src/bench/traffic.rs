//! Request generation over a single connection.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use axum::http::{header, HeaderName, HeaderValue, Request, Response, Uri};
use futures_util::StreamExt as _;
use http_body_util::{BodyExt as _, Empty};
use hyper::body::{Bytes, Incoming};
use hyper::client::conn::{http1, http2};
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::bench::conn::HyperIo;
use crate::config::TransportMode;

/// Sequence number used for the warm-up request.
const WARM_UP_SEQ: usize = usize::MAX;

/// What to send and what every response must look like.
#[derive(Debug, Clone)]
pub struct TrafficPlan {
    /// Absolute URI put on every request.
    pub uri: Uri,
    /// Requests in flight at most.
    pub concurrency: usize,
    /// Requests after the warm-up.
    pub iterations: usize,
    /// Header every response must carry, if any.
    pub expected_header: Option<(HeaderName, HeaderValue)>,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

/// Totals of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficReport {
    pub requests: usize,
    pub bytes: u64,
    pub elapsed_secs: f64,
    pub requests_per_sec: f64,
}

/// Request sender over one established connection.
pub enum Sender {
    /// HTTP/1.1 carries one exchange at a time, so requests queue on a lock.
    Http1(Arc<Mutex<http1::SendRequest<Empty<Bytes>>>>),
    /// HTTP/2 multiplexes; each request clones the handle.
    Http2(http2::SendRequest<Empty<Bytes>>),
}

impl Sender {
    /// Run the client handshake and spawn the connection driver.
    pub async fn handshake(io: Box<dyn HyperIo>, transport: TransportMode) -> anyhow::Result<Self> {
        match transport {
            TransportMode::Http1 => {
                let (client, driver) = http1::handshake(io).await?;
                tokio::spawn(async move {
                    if let Err(e) = driver.await {
                        tracing::error!(error = ?e, "Connection driver error");
                    }
                });
                Ok(Sender::Http1(Arc::new(Mutex::new(client))))
            }
            TransportMode::Http2 => {
                let (client, driver) = http2::handshake(TokioExecutor::new(), io).await?;
                tokio::spawn(async move {
                    if let Err(e) = driver.await {
                        tracing::error!(error = ?e, "Connection driver error");
                    }
                });
                Ok(Sender::Http2(client))
            }
        }
    }

    /// Send one request, check the response and return its body size.
    pub async fn send_one(&self, plan: &TrafficPlan, seq: usize) -> anyhow::Result<u64> {
        match self {
            Sender::Http1(client) => {
                let host = plan.uri.authority().map_or("localhost", |a| a.as_str());
                let request = Request::builder()
                    .uri(plan.uri.clone())
                    .header(header::HOST, host)
                    .body(Empty::new())?;

                // Held until the body is read: the connection is busy until then.
                let mut client = client.lock().await;
                client.ready().await?;
                let response = client.send_request(request).await.inspect_err(|e| {
                    tracing::error!(seq, error = ?e, "error sending request");
                })?;
                check_response(response, plan, seq).await
            }
            Sender::Http2(client) => {
                let request = Request::builder().uri(plan.uri.clone()).body(Empty::new())?;

                let mut client = client.clone();
                client.ready().await?;
                let response = client.send_request(request).await.inspect_err(|e| {
                    tracing::error!(seq, error = ?e, "error sending request");
                })?;
                check_response(response, plan, seq).await
            }
        }
    }
}

/// Validate status and header, then drain the body.
async fn check_response(
    response: Response<Incoming>,
    plan: &TrafficPlan,
    seq: usize,
) -> anyhow::Result<u64> {
    let (parts, body) = response.into_parts();

    anyhow::ensure!(
        parts.status.is_success(),
        "request {seq}: unexpected status {}",
        parts.status
    );
    if let Some((name, value)) = &plan.expected_header {
        anyhow::ensure!(
            parts.headers.get(name) == Some(value),
            "request {seq}: expected header {name}: {value:?}, got {:?}",
            parts.headers.get(name)
        );
    }

    let mut body = body.into_data_stream();
    let mut size = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.with_context(|| format!("request {seq}: error reading response body"))?;
        size += chunk.len() as u64;
    }
    anyhow::ensure!(size > 0, "request {seq}: empty response body");

    Ok(size)
}

/// Send a warm-up request, then `plan.iterations` requests with at most
/// `plan.concurrency` in flight.
pub async fn send_traffic(sender: &Sender, plan: &TrafficPlan) -> anyhow::Result<TrafficReport> {
    sender
        .send_one(plan, WARM_UP_SEQ)
        .await
        .context("warm-up request failed")?;

    let bar = if plan.progress {
        indicatif::ProgressBar::new(plan.iterations as u64)
    } else {
        indicatif::ProgressBar::hidden()
    };

    let start = Instant::now();
    let requests = (0..plan.iterations).map(|seq| sender.send_one(plan, seq));
    let mut responses = futures_util::stream::iter(requests)
        .buffer_unordered(plan.concurrency.max(1))
        .inspect(|_| bar.inc(1));

    let mut bytes = 0u64;
    while let Some(result) = responses.next().await {
        bytes += result.context("error sending request")?;
    }
    bar.finish();

    let elapsed = start.elapsed().as_secs_f64();
    Ok(TrafficReport {
        requests: plan.iterations,
        bytes,
        elapsed_secs: elapsed,
        requests_per_sec: if elapsed > 0.0 {
            plan.iterations as f64 / elapsed
        } else {
            0.0
        },
    })
}
