//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     ProxyConfig → affinity key → ProxyTransport → background tasks
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger → every CancelSignal observes it
//!
//! Cancellation (cancel.rs):
//!     CancelSignal checked between dial attempts
//!     CancelSignal awaited by the server for graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One watch channel: the latest value is all a late subscriber needs
//! - A signal whose coordinator is gone never fires

pub mod cancel;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use cancel::CancelSignal;
pub use shutdown::Shutdown;
