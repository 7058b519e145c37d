//! Cancellation signal threaded through dial loops.

use tokio::sync::watch;

/// Read side of a cancellation.
///
/// Checking is a non-blocking borrow of the latest value, so it is cheap to do
/// between every dial attempt.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    pub(crate) fn from_receiver(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// A signal that is never cancelled.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Wait until cancellation is requested.
    ///
    /// Pends forever if the sending side goes away without cancelling.
    pub async fn cancelled(mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}
