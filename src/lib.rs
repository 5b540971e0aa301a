//! Upstream relay.
//!
//! Listens on one port and answers every request with the response of a
//! fixed upstream, fetched over a transport (HTTP/1.1 or HTTP/2) chosen at
//! startup.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request        ┌─────────┐    ┌──────────┐    ┌──────────────┐
//!     ─────────────────────▶│   net   │───▶│   http   │───▶│   upstream   │──▶ Upstream
//!                           │listener │    │  server  │    │    client    │    (fixed URL)
//!                           └─────────┘    └──────────┘    └──────┬───────┘
//!     Client Response            ┌──────────────┐                 │
//!     ◀──────────────────────────│   response   │◀────────────────┘
//!                                │  (streamed)  │
//!                                └──────────────┘
//!
//!     Cross-cutting: config, observability, lifecycle
//!     Tooling:       mock_upstream, bench
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

// Tooling
pub mod bench;
pub mod mock_upstream;

pub use config::schema::{RelayConfig, TransportMode};
pub use http::RelayServer;
pub use lifecycle::Shutdown;
