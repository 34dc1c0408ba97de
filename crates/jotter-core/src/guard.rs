//! Exactly-once creation per session generation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Generation;

/// Grants the right to create a note at most once per generation.
///
/// Initialization can run more than once for the same session (re-entrant
/// start calls, quick repeated navigation to the creation token), and only
/// one of those runs may talk to the store.
///
/// The guard is never released: a failed or abandoned creation stays claimed
/// and the caller has to start a new session (a new generation) to try
/// again. Re-arming it would allow duplicate notes under retry.
///
/// Generations only grow, so the guard keeps the highest claimed generation.
/// A claim for a generation older than that is refused as well; such a
/// caller is stale anyway.
#[derive(Debug, Default)]
pub struct CreateOnceGuard {
    claimed: AtomicU64,
}

impl CreateOnceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for exactly one caller per generation.
    pub fn try_begin_create(&self, generation: Generation) -> bool {
        let previous = self.claimed.fetch_max(generation.get(), Ordering::AcqRel);
        previous < generation.get()
    }

    /// Whether creation for `generation` has already been claimed.
    #[cfg(test)]
    fn is_claimed(&self, generation: Generation) -> bool {
        self.claimed.load(Ordering::Acquire) >= generation.get()
    }
}
