//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → main.rs builds the transport from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the backend list (StaticBackends)
//! ```
//!
//! # Design Decisions
//! - Only the backend pool is hot-reloaded; everything else needs a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AffinityConfig, BackendsConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    TimeoutConfig,
};
pub use watcher::ConfigWatcher;
