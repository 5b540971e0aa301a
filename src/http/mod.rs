//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (HTTP/1.1 or HTTP/2 detection, middleware)
//!     → request.rs (request ID, tracing span)
//!     → client.rs (one GET to the fixed upstream, pinned transport)
//!     → response.rs (drop hop-by-hop headers, stream body)
//!     → Send to client
//! ```

pub mod client;
pub mod request;
pub mod response;
pub mod server;

pub use client::{RelayError, UpstreamClient};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{RelayServer, ServerError, READY_MESSAGE};
