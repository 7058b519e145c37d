//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch starts
//!     → source.rs (fresh snapshot of backend addresses)
//!     → selector.rs (copy, shuffle, promote sticky backend)
//!     → ordered candidate list for the connection layer
//! ```
//!
//! # Design Decisions
//! - No per-backend counters; a uniform shuffle per dispatch spreads load
//! - The sticky backend only moves to the front, it never skips failover
//! - The source's snapshot is never mutated in place

pub mod selector;
pub mod source;

pub use selector::BackendSelector;
pub use source::{BackendSource, StaticBackends};
