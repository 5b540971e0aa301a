//! Traffic generator for measuring the relay.
//!
//! # Data Flow
//! ```text
//! spawn.rs (optional: start the relay, wait for its readiness line)
//!     → conn.rs (one TCP or Unix socket connection)
//!     → traffic.rs (HTTP/1.1 or HTTP/2 handshake, warm-up, N requests)
//!     → TrafficReport
//! ```

pub mod conn;
pub mod spawn;
pub mod traffic;

pub use conn::{HyperIo, Target};
pub use spawn::spawn_relay;
pub use traffic::{send_traffic, Sender, TrafficPlan, TrafficReport};
