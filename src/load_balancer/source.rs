//! Backend address sources.
//!
//! The transport pulls a fresh snapshot on every dispatch and never keeps one
//! around, so a source only has to be cheap and safe to call concurrently.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// Supplier of the current backend addresses (`host:port`).
pub trait BackendSource: Send + Sync {
    fn backends(&self) -> Vec<String>;
}

impl<F> BackendSource for F
where
    F: Fn() -> Vec<String> + Send + Sync,
{
    fn backends(&self) -> Vec<String> {
        self()
    }
}

/// A backend list swapped wholesale on reload.
#[derive(Debug)]
pub struct StaticBackends {
    addrs: ArcSwap<Vec<String>>,
}

impl StaticBackends {
    pub fn new(addrs: Vec<String>) -> Self {
        Self {
            addrs: ArcSwap::from_pointee(addrs),
        }
    }

    /// Replace the whole list. In-flight dispatches keep their snapshot.
    pub fn replace(&self, addrs: Vec<String>) {
        tracing::info!(backend_count = addrs.len(), "Backend list replaced");
        self.addrs.store(Arc::new(addrs));
    }
}

impl BackendSource for StaticBackends {
    fn backends(&self) -> Vec<String> {
        (**self.addrs.load()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_sources() {
        let source: Arc<dyn BackendSource> = Arc::new(|| vec!["10.0.0.1:80".to_string()]);
        assert_eq!(source.backends(), vec!["10.0.0.1:80"]);
    }

    #[test]
    fn static_backends_replace() {
        let source = StaticBackends::new(vec!["10.0.0.1:80".into()]);
        let snapshot = source.backends();

        source.replace(vec!["10.0.0.2:80".into(), "10.0.0.3:80".into()]);

        assert_eq!(snapshot, vec!["10.0.0.1:80"]);
        assert_eq!(source.backends(), vec!["10.0.0.2:80", "10.0.0.3:80"]);
    }
}
