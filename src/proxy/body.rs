//! Inbound request body shared across dial attempts.
//!
//! Each attempt gets a [`BodyLease`]. A lease only takes the body out of the
//! shared slot once the upstream client starts reading it, which happens after
//! a connection exists. An attempt that fails to connect drops its lease
//! untouched and the next attempt finds the body where it was. Whatever is
//! still in the slot is dropped once, with the last handle.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use axum::body::Body;
use bytes::Bytes;
use http_body::{Frame, SizeHint};

type Slot = Arc<Mutex<Option<Body>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<Body>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the inbound body for the duration of one dispatch.
pub struct RetryBody {
    slot: Slot,
}

impl RetryBody {
    pub fn new(body: Body) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(body))),
        }
    }

    /// A body handle for one attempt.
    pub fn lease(&self) -> BodyLease {
        BodyLease {
            slot: Arc::clone(&self.slot),
            body: None,
            started: false,
        }
    }

    /// Whether some attempt has started reading the body.
    pub fn is_taken(&self) -> bool {
        lock(&self.slot).is_none()
    }
}

/// Per-attempt view of a [`RetryBody`].
pub struct BodyLease {
    slot: Slot,
    body: Option<Body>,
    started: bool,
}

impl http_body::Body for BodyLease {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if !this.started {
            this.started = true;
            this.body = lock(&this.slot).take();
            if this.body.is_none() {
                return Poll::Ready(Some(Err(axum::Error::new(
                    "request body already consumed by an earlier attempt",
                ))));
            }
        }

        match this.body.as_mut() {
            Some(body) => Pin::new(body).poll_frame(cx),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        if self.started {
            return self.body.as_ref().map_or(true, |b| b.is_end_stream());
        }
        lock(&self.slot).as_ref().map_or(false, |b| b.is_end_stream())
    }

    fn size_hint(&self) -> SizeHint {
        if self.started {
            return self.body.as_ref().map_or_else(|| SizeHint::with_exact(0), |b| b.size_hint());
        }
        lock(&self.slot)
            .as_ref()
            .map_or_else(SizeHint::default, |b| b.size_hint())
    }
}
