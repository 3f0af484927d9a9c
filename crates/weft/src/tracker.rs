//! Tracks work that is about to register loader keys.
//!
//! A field like `tags` reads a slot first and only then knows which keys to
//! ask a loader for. Sibling resolutions doing the same thing finish their
//! slot reads at different times, so a window that only yields to the
//! scheduler closes before the slower siblings register. Loaders built with a
//! [`LookupTracker`] keep their window open until no such work is in flight.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::trace;

/// Count of in-flight lookups of one request.
#[derive(Clone)]
pub struct LookupTracker {
    active: Arc<watch::Sender<usize>>,
}

impl Default for LookupTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupTracker {
    pub fn new() -> Self {
        let (active, _) = watch::channel(0);
        Self {
            active: Arc::new(active),
        }
    }

    /// Marks a lookup as in flight until the guard is dropped. The guard must
    /// be dropped once the lookup's keys are registered and before they are
    /// awaited.
    pub fn enter(&self, what: &'static str) -> LookupGuard {
        self.active.send_modify(|active| *active += 1);
        trace!(what, active = self.active(), "lookup started");
        LookupGuard {
            active: Arc::clone(&self.active),
            what,
        }
    }

    pub fn active(&self) -> usize {
        *self.active.borrow()
    }

    /// Resolves once no lookup is in flight.
    pub async fn settled(&self) {
        let mut active = self.active.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = active.wait_for(|active| *active == 0).await;
    }
}

impl fmt::Debug for LookupTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupTracker")
            .field("active", &self.active())
            .finish()
    }
}

#[must_use = "the lookup ends as soon as the guard is dropped"]
pub struct LookupGuard {
    active: Arc<watch::Sender<usize>>,
    what: &'static str,
}

impl Drop for LookupGuard {
    fn drop(&mut self) {
        self.active.send_modify(|active| *active -= 1);
        trace!(what = self.what, "lookup finished");
    }
}
