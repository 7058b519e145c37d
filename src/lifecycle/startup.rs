//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve the affinity key (configured or generated)
//! - Build the transport from validated configuration
//! - Start background tasks (config watcher, metrics)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::path::Path;
use std::sync::Arc;

use notify::RecommendedWatcher;

use crate::affinity::{AffinityKey, KeyError};
use crate::config::{AffinityConfig, ConfigWatcher, ProxyConfig};
use crate::load_balancer::StaticBackends;
use crate::observability::metrics;
use crate::proxy::ProxyTransport;

/// Key to seal sticky cookies with, or `None` when affinity is off.
///
/// An empty configured key is replaced by a random one.
pub fn resolve_affinity_key(config: &AffinityConfig) -> Result<Option<AffinityKey>, KeyError> {
    if !config.enabled {
        return Ok(None);
    }
    if config.key.is_empty() {
        tracing::warn!("No affinity key configured, generated one; sticky cookies will not survive a restart");
        return Ok(Some(AffinityKey::generate()));
    }
    AffinityKey::from_base64(&config.key).map(Some)
}

/// Everything the server needs, built from one config.
pub struct Runtime {
    pub transport: Arc<ProxyTransport>,
    pub backends: Arc<StaticBackends>,
}

/// Build the transport and its backend list from `config`.
pub fn build_runtime(config: &ProxyConfig) -> Result<Runtime, KeyError> {
    let backends = Arc::new(StaticBackends::new(config.backends.addresses.clone()));
    let key = resolve_affinity_key(&config.affinity)?;

    let transport = ProxyTransport::new(backends.clone(), &config.timeouts, key);
    tracing::info!(
        backends = config.backends.addresses.len(),
        affinity = transport.affinity_enabled(),
        dial_ms = config.timeouts.dial_ms,
        "Transport ready"
    );

    Ok(Runtime {
        transport: Arc::new(transport),
        backends,
    })
}

/// Start the optional background services.
///
/// The returned watcher, when present, must be kept alive.
pub fn start_background(
    config: &ProxyConfig,
    config_path: Option<&Path>,
    backends: &Arc<StaticBackends>,
) -> Option<RecommendedWatcher> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let path = config_path?;
    match ConfigWatcher::new(path, Arc::clone(backends)).run() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Config watcher not started, backends will not reload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::KEY_LEN;

    #[test]
    fn disabled_affinity_has_no_key() {
        let config = AffinityConfig {
            enabled: false,
            key: AffinityKey::new([1; KEY_LEN]).to_base64(),
        };
        assert_eq!(resolve_affinity_key(&config), Ok(None));
    }

    #[test]
    fn configured_key_is_used() {
        let key = AffinityKey::new([7; KEY_LEN]);
        let config = AffinityConfig {
            enabled: true,
            key: key.to_base64(),
        };
        assert_eq!(resolve_affinity_key(&config), Ok(Some(key)));
    }

    #[test]
    fn empty_key_is_generated() {
        let config = AffinityConfig {
            enabled: true,
            key: String::new(),
        };
        assert!(resolve_affinity_key(&config).unwrap().is_some());
    }

    #[tokio::test]
    async fn runtime_follows_config() {
        let mut config = ProxyConfig::default();
        config.affinity.enabled = true;

        let runtime = build_runtime(&config).unwrap();

        assert!(runtime.transport.affinity_enabled());
        assert_eq!(
            crate::load_balancer::BackendSource::backends(&*runtime.backends),
            config.backends.addresses
        );
    }
}
