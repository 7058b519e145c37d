//! Sticky backend transport for a single-service reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Inbound request
//!         → proxy::transport (read sticky cookie)
//!         → load_balancer::selector (shuffle, promote sticky backend)
//!         → net::dial / proxy::upstream (try candidates in order)
//!         → affinity::cookie (re-issue cookie if the backend changed)
//!     Response (+ raw connection for upgrades)
//! ```
//!
//! The backend list is pulled from a [`load_balancer::BackendSource`] on every
//! dispatch; nothing about the pool is cached between requests.

// Core subsystems
pub mod affinity;
pub mod error;
pub mod load_balancer;
pub mod net;
pub mod proxy;

// Server glue
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::{CancelSignal, Shutdown};
pub use proxy::ProxyTransport;
