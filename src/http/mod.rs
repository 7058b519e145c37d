//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → upgrade.rs when the request asks to switch protocols
//!     → proxy::ProxyTransport (sticky selection, failover)
//!     → Send to client
//! ```

pub mod server;
pub mod upgrade;

pub use server::{AppState, HttpServer};
