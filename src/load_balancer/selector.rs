//! Randomized backend ordering with sticky promotion.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};

/// Orders candidate backends for one dispatch.
///
/// The random source sits behind a mutex so one selector can serve all
/// concurrent requests.
#[derive(Debug)]
pub struct BackendSelector<R = StdRng> {
    rng: Mutex<R>,
}

impl BackendSelector<StdRng> {
    /// Selector seeded from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for BackendSelector<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> BackendSelector<R> {
    /// Selector driven by the given random source.
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Shuffle a copy of `backends` and move `sticky` to the front if present.
    ///
    /// The promotion is a single swap, so every other position keeps what the
    /// shuffle put there.
    pub fn ordered_backends(&self, backends: &[String], sticky: Option<&str>) -> Vec<String> {
        let mut ordered = backends.to_vec();
        {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            ordered.shuffle(&mut *rng);
        }

        if let Some(sticky) = sticky.filter(|s| !s.is_empty()) {
            swap_to_front(&mut ordered, sticky);
        }
        ordered
    }
}

fn swap_to_front(backends: &mut [String], backend: &str) {
    if let Some(i) = backends.iter().position(|b| b == backend) {
        backends.swap(0, i);
    }
}
