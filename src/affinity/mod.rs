//! Session affinity subsystem.
//!
//! # Data Flow
//! ```text
//! Request:
//!     Cookie: _backend=<b64>
//!     → cookie.rs (find cookie, base64 decode)
//!     → codec.rs (open nonce ‖ ciphertext)
//!     → sticky backend address, or no preference
//!
//! Response (effective backend differs from the presented one):
//!     backend address
//!     → codec.rs (seal under a fresh nonce)
//!     → cookie.rs (append Set-Cookie)
//! ```
//!
//! # Design Decisions
//! - Integrity is what matters: a client must not be able to steer itself to
//!   an arbitrary backend
//! - Every decode failure is "no preference", never an error
//! - One key per process; rotating it just resets affinity

pub mod codec;
pub mod cookie;

pub use codec::{AffinityKey, KeyError, StickyCodec, KEY_LEN, NONCE_LEN};
pub use cookie::STICKY_COOKIE;
