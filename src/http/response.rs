//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn the upstream response into the response for the caller
//! - Drop hop-by-hop headers, copy every other header verbatim
//! - Map upstream failures to `500 Internal Server Error`
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the entire body
//! - The caller always gets `200 OK`: only headers and body are relayed

use axum::body::{Body, HttpBody};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use axum::BoxError;
use hyper::body::Bytes;

use crate::http::client::RelayError;

/// Headers that only describe a single connection hop.
const HOP_BY_HOP_HEADERS: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in &HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

/// Build the caller's response from the upstream response.
///
/// The status is always `200 OK`; end-to-end headers are kept and the body
/// is streamed through.
pub fn relay_response<B>(upstream: Response<B>) -> Response<Body>
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (parts, body) = upstream.into_parts();
    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::new(body));
    *response.headers_mut() = headers;
    response
}

impl IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}
