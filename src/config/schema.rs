//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so a partial file is a valid file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend pool.
    pub backends: BackendsConfig,

    /// Sticky session settings.
    pub affinity: AffinityConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Backend pool. Reloaded on file change.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// Backend addresses as `host:port`.
    pub addresses: Vec<String>,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            addresses: vec!["127.0.0.1:3000".to_string()],
        }
    }
}

/// Sticky session configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AffinityConfig {
    /// Pin clients to a backend with an encrypted cookie.
    pub enabled: bool,

    /// Base64 (standard alphabet) of a 32-byte key. Empty means generate one
    /// at startup, which invalidates cookies across restarts.
    pub key: String,
}

/// Timeout configuration for backend traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connect timeout per backend in milliseconds.
    pub dial_ms: u64,

    /// TCP keep-alive idle time in seconds.
    pub keepalive_secs: u64,

    /// Time to wait for response headers in seconds.
    pub response_header_secs: u64,
}

impl TimeoutConfig {
    pub fn dial(&self) -> Duration {
        Duration::from_millis(self.dial_ms)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn response_header(&self) -> Duration {
        Duration::from_secs(self.response_header_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dial_ms: 1000,
            keepalive_secs: 30,
            response_header_secs: 120,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
