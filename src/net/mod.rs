//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Ordered candidates
//!     → dial.rs (cancellation check, bounded connect, keep-alive)
//!     → first connected backend wins
//!     → stream.rs (raw connection handed back, with any bytes already
//!                  read past an upgrade response head)
//! ```
//!
//! # Design Decisions
//! - A failure while connecting is always retryable; nothing after connect is
//! - Cancellation is checked between attempts; each attempt has its own timeout
//! - No speculative parallel dialing

pub mod dial;
pub mod stream;

pub use dial::{dial_ordered, Dial, DialError, TcpDialer};
pub use stream::BufferedStream;
