use std::fmt;
use std::future::Future;

use tracing::{debug, trace};

use crate::error::{WeftError, WeftResult};

/// Observable state of a [`Slot`].
#[derive(Debug)]
pub enum SlotState<'a, T> {
    Unloaded,
    Loaded(&'a T),
    /// The one load attempt failed; the error is kept for the slot's lifetime.
    Failed(&'a WeftError),
}

/// A lazily populated relationship on an entity.
///
/// The slot moves from unloaded to loaded (or failed) exactly once. Concurrent
/// first accesses share one load: later callers wait on the first caller's
/// result instead of issuing their own read.
pub struct Slot<T> {
    name: &'static str,
    cell: tokio::sync::OnceCell<WeftResult<T>>,
}

impl<T> Slot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: tokio::sync::OnceCell::new(),
        }
    }

    /// A slot that starts out loaded, for entities fetched together with
    /// their relationships.
    pub fn preloaded(name: &'static str, value: T) -> Self {
        Self {
            name,
            cell: tokio::sync::OnceCell::new_with(Some(Ok(value))),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True once a successful load has been stored. Never blocks.
    pub fn loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }

    pub fn state(&self) -> SlotState<'_, T> {
        match self.cell.get() {
            None => SlotState::Unloaded,
            Some(Ok(value)) => SlotState::Loaded(value),
            Some(Err(err)) => SlotState::Failed(err),
        }
    }

    /// The loaded value, or `None` if [`Slot::ensure`] has not succeeded yet.
    pub fn get(&self) -> Option<&T> {
        match self.cell.get() {
            Some(Ok(value)) => Some(value),
            _ => None,
        }
    }

    /// Loads the slot with `load` unless it already holds an outcome.
    ///
    /// `load` must return the complete value for the entity; it runs at most
    /// once per slot. If the loading caller is dropped before `load` finishes,
    /// the next waiter takes over.
    pub async fn ensure<F, Fut>(&self, load: F) -> WeftResult<&T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = WeftResult<T>>,
    {
        if self.cell.initialized() {
            trace!(slot = self.name, "slot already populated");
        }
        let name = self.name;
        let outcome = self
            .cell
            .get_or_init(|| async move {
                let outcome = load().await;
                match &outcome {
                    Ok(_) => debug!(slot = name, "slot loaded"),
                    Err(err) => debug!(slot = name, %err, "slot load failed"),
                }
                outcome
            })
            .await;
        outcome.as_ref().map_err(Clone::clone)
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn ensure_is_idempotent() {
        let slot: Slot<Vec<String>> = Slot::new("performer.aliases");
        let reads = AtomicUsize::new(0);
        assert!(!slot.loaded());

        for _ in 0..3 {
            let aliases = slot
                .ensure(|| async {
                    reads.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["Jay".to_string(), "J.".to_string()])
                })
                .await
                .expect("aliases load");
            assert_eq!(aliases, &["Jay", "J."]);
        }

        assert!(slot.loaded());
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_result_still_counts_as_loaded() {
        let slot: Slot<Vec<i64>> = Slot::new("performer.tag_ids");
        slot.ensure(|| async { Ok(Vec::new()) })
            .await
            .expect("empty load");
        assert!(slot.loaded());
        assert!(matches!(slot.state(), SlotState::Loaded(v) if v.is_empty()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_access_shares_one_read() {
        let slot = Arc::new(Slot::<u32>::new("performer.stash_ids"));
        let reads = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(tokio::sync::Notify::new());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let slot = Arc::clone(&slot);
            let reads = Arc::clone(&reads);
            let gate = Arc::clone(&gate);
            tasks.push(tokio::spawn(async move {
                *slot
                    .ensure(|| async move {
                        reads.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Ok(7)
                    })
                    .await
                    .expect("shared load")
            }));
        }

        while reads.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        for task in tasks {
            assert_eq!(task.await.expect("join"), 7);
        }
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failure_is_kept_for_later_callers() {
        let slot: Slot<Vec<String>> = Slot::new("performer.aliases");
        let first = slot
            .ensure(|| async { Err(WeftError::fetch("disk I/O error")) })
            .await
            .expect_err("first load fails");
        let second = slot
            .ensure(|| async { Ok(vec!["never".to_string()]) })
            .await
            .expect_err("failure is memoized");

        assert_eq!(first, second);
        assert!(!slot.loaded());
        assert!(matches!(slot.state(), SlotState::Failed(_)));
        assert!(slot.get().is_none());
    }

    #[test]
    fn preloaded_slot_needs_no_read() {
        let slot = Slot::preloaded("performer.aliases", vec!["Jay".to_string()]);
        assert!(slot.loaded());
        assert_eq!(slot.get().map(Vec::len), Some(1));
    }
}
