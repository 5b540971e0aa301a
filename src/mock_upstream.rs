//! Fixed-payload upstream for exercising the relay.
//!
//! Answers every request with `200 OK`, the [`MARKER_HEADER`] and the same
//! body. Speaks exactly one HTTP version so a relay using the other one fails.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Response};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::{http1, http2};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use tokio::net::TcpListener;

use crate::config::TransportMode;

/// Header set on every mock response.
pub const MARKER_HEADER: HeaderName = HeaderName::from_static("x-mock-upstream");

/// Value of [`MARKER_HEADER`].
pub const MARKER_VALUE: HeaderValue = HeaderValue::from_static("true");

/// Mock upstream server. Clones share the request counter.
#[derive(Debug, Clone)]
pub struct MockUpstream {
    transport: TransportMode,
    payload: Bytes,
    headers: HeaderMap,
    served: Arc<AtomicU64>,
}

impl MockUpstream {
    /// Serve `payload` over `transport` only.
    pub fn new(transport: TransportMode, payload: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(MARKER_HEADER, MARKER_VALUE);
        Self {
            transport,
            payload: payload.into(),
            headers,
            served: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Add a response header. Repeated names are kept as separate values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Deterministic filler of `size` bytes (printable ASCII, newline every 64).
    pub fn filler_payload(size: usize) -> Bytes {
        let alphabet = b"abcdefghijklmnopqrstuvwxyz0123456789";
        let data: Vec<u8> = (0..size)
            .map(|i| {
                if i % 64 == 63 {
                    b'\n'
                } else {
                    alphabet[i % alphabet.len()]
                }
            })
            .collect();
        Bytes::from(data)
    }

    /// Number of requests answered so far.
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::SeqCst)
    }

    fn respond(&self) -> Response<Full<Bytes>> {
        self.served.fetch_add(1, Ordering::SeqCst);
        let mut response = Response::new(Full::new(self.payload.clone()));
        *response.headers_mut() = self.headers.clone();
        response
    }

    /// Accept connections forever, serving each on its own task.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                transport = %self.transport,
                payload_bytes = self.payload.len(),
                "Mock upstream listening"
            );
        }

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let upstream = self.clone();

            tokio::spawn(async move {
                let transport = upstream.transport;
                let service = service_fn(move |_request: Request<Incoming>| {
                    let response = upstream.respond();
                    async move { Ok::<_, Infallible>(response) }
                });

                let result = match transport {
                    TransportMode::Http1 => {
                        http1::Builder::new()
                            .timer(TokioTimer::new())
                            .serve_connection(io, service)
                            .await
                    }
                    TransportMode::Http2 => {
                        http2::Builder::new(TokioExecutor::new())
                            .timer(TokioTimer::new())
                            .serve_connection(io, service)
                            .await
                    }
                };

                if let Err(e) = result {
                    tracing::debug!(error = %e, "Mock upstream connection error");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filler_is_deterministic_and_sized() {
        let a = MockUpstream::filler_payload(200);
        let b = MockUpstream::filler_payload(200);
        assert_eq!(a.len(), 200);
        assert_eq!(a, b);
        assert_eq!(a[63], b'\n');
        assert_eq!(&a[..3], b"abc");
    }

    #[test]
    fn responses_carry_marker_and_count() {
        let upstream = MockUpstream::new(TransportMode::Http1, "ok").with_header(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain"),
        );
        let clone = upstream.clone();

        let response = upstream.respond();
        assert_eq!(response.headers()[MARKER_HEADER], "true");
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(clone.served(), 1);
    }
}
