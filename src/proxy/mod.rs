//! Proxy transport subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request:
//!     transport.rs (sticky cookie, candidate order)
//!     → body.rs (one lease of the inbound body per attempt)
//!     → upstream.rs (pooled client, connect vs request failure)
//!     → response (+ Set-Cookie when the backend changed)
//!
//! Upgrade request:
//!     transport.rs (sticky cookie, candidate order)
//!     → net::dial_ordered
//!     → upgrade.rs (write head, parse response head)
//!     → response head + raw connection
//! ```
//!
//! # Design Decisions
//! - Only connect failures are retried; a request that may have reached a
//!   backend is never sent to another one
//! - Upgrades skip the pooled client so the socket can be handed back

pub mod body;
pub mod transport;
pub mod upgrade;
pub mod upstream;

pub use body::RetryBody;
pub use transport::ProxyTransport;
pub use upstream::{HyperUpstream, Upstream, UpstreamError};
