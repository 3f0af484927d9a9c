//! Request-scoped batching loader.
//!
//! Keys registered while a batching window is open are coalesced into one
//! call to [`BatchFn::load_batch`]. Every key gets one watch channel for the
//! lifetime of the loader: the first registration creates it, later ones
//! subscribe to it, so a key is fetched at most once no matter how many
//! callers ask for it or when.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::LoaderConfig;
use crate::error::{WeftError, WeftResult};
use crate::tracker::LookupTracker;

/// The multi-key fetch behind a [`Loader`].
#[async_trait]
pub trait BatchFn: Send + Sync + 'static {
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;
    type Value: Clone + Send + Sync + 'static;

    /// Short name used in logs, e.g. `"tag_by_id"`.
    const KIND: &'static str;

    /// Fetches every key in `keys` (distinct, in registration order).
    ///
    /// Keys missing from the returned map resolve to `Ok(None)` for their
    /// waiters. An `Err` fails every key of the batch with that error.
    async fn load_batch(
        &self,
        keys: &[Self::Key],
    ) -> WeftResult<HashMap<Self::Key, Self::Value>>;
}

/// Outcome of one key: `Ok(None)` means the backend has no such row.
pub type LoadOutcome<V> = WeftResult<Option<V>>;

type Entry<V> = watch::Receiver<Option<LoadOutcome<V>>>;
type Waiter<V> = watch::Sender<Option<LoadOutcome<V>>>;

/// Counters exposed for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub batches: u64,
    pub keys: u64,
    pub in_flight: usize,
}

pub struct Loader<F: BatchFn> {
    inner: Arc<LoaderInner<F>>,
}

struct LoaderInner<F: BatchFn> {
    fetch: F,
    config: LoaderConfig,
    cancel: CancellationToken,
    lookups: Option<LookupTracker>,
    state: Mutex<LoaderState<F::Key, F::Value>>,
    batches: AtomicU64,
    keys: AtomicU64,
    in_flight: AtomicUsize,
}

struct LoaderState<K, V> {
    entries: HashMap<K, Entry<V>>,
    pending: Vec<(K, Waiter<V>)>,
    window_open: bool,
}

impl<F: BatchFn> Clone for Loader<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: BatchFn> Loader<F> {
    pub fn new(fetch: F, config: LoaderConfig, cancel: CancellationToken) -> Self {
        Self::build(fetch, config, cancel, None)
    }

    /// A loader whose window also stays open while `lookups` has work in
    /// flight, so keys derived from slot reads join the same batch.
    pub fn tracking(
        fetch: F,
        config: LoaderConfig,
        cancel: CancellationToken,
        lookups: LookupTracker,
    ) -> Self {
        Self::build(fetch, config, cancel, Some(lookups))
    }

    fn build(
        fetch: F,
        config: LoaderConfig,
        cancel: CancellationToken,
        lookups: Option<LookupTracker>,
    ) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                fetch,
                config,
                cancel,
                lookups,
                state: Mutex::new(LoaderState {
                    entries: HashMap::new(),
                    pending: Vec::new(),
                    window_open: false,
                }),
                batches: AtomicU64::new(0),
                keys: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Resolves one key, sharing any completed or in-flight result for it.
    ///
    /// The key is registered when this is called, not when the returned
    /// future is first polled.
    pub fn load(
        &self,
        key: F::Key,
    ) -> impl Future<Output = LoadOutcome<F::Value>> + use<F> {
        let mut entry = self.register(key);
        async move { wait(&mut entry).await }
    }

    /// Resolves `keys` in input order. Every key is registered before this
    /// returns, so they all land in the same window; duplicates share one
    /// entry.
    pub fn load_all(
        &self,
        keys: &[F::Key],
    ) -> impl Future<Output = Vec<LoadOutcome<F::Value>>> + use<F> {
        let entries: Vec<_> = keys.iter().map(|key| self.register(key.clone())).collect();
        join_all(
            entries
                .into_iter()
                .map(|mut entry| async move { wait(&mut entry).await }),
        )
    }

    /// Dispatches whatever is pending right now instead of waiting for the
    /// window to close.
    pub fn flush(&self) {
        let batch = self.inner.take_pending();
        if !batch.is_empty() {
            self.spawn_dispatch(batch);
        }
    }

    /// Whether `key` already has a completed or in-flight entry.
    pub fn contains(&self, key: &F::Key) -> bool {
        self.inner.state.lock().entries.contains_key(key)
    }

    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            batches: self.inner.batches.load(Ordering::SeqCst),
            keys: self.inner.keys.load(Ordering::SeqCst),
            in_flight: self.inner.in_flight.load(Ordering::SeqCst),
        }
    }

    fn register(&self, key: F::Key) -> Entry<F::Value> {
        let mut state = self.inner.state.lock();
        if let Some(entry) = state.entries.get(&key) {
            trace!(kind = F::KIND, ?key, "joining existing entry");
            return entry.clone();
        }

        let (waiter, entry) = watch::channel(None);
        state.entries.insert(key.clone(), entry.clone());
        if self.inner.cancel.is_cancelled() {
            waiter.send_replace(Some(Err(WeftError::Cancelled)));
            return entry;
        }
        state.pending.push((key, waiter));

        if state.pending.len() >= self.inner.config.max_batch_size {
            let batch = std::mem::take(&mut state.pending);
            drop(state);
            self.spawn_dispatch(batch);
        } else if !state.window_open {
            state.window_open = true;
            drop(state);
            self.spawn_window();
        }
        entry
    }

    fn spawn_window(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _in_flight = InFlight::enter(&inner.in_flight);
            tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => {
                    inner.fail_pending(WeftError::Cancelled);
                    return;
                }
                _ = inner.window() => {}
            }
            let batch = inner.take_pending();
            if !batch.is_empty() {
                inner.dispatch(batch).await;
            }
        });
    }

    fn spawn_dispatch(&self, batch: Vec<(F::Key, Waiter<F::Value>)>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _in_flight = InFlight::enter(&inner.in_flight);
            inner.dispatch(batch).await;
        });
    }
}

impl<F: BatchFn> LoaderInner<F> {
    async fn window(&self) {
        self.config.window().await;
        if let Some(lookups) = &self.lookups {
            if lookups.active() > 0 {
                trace!(kind = F::KIND, active = lookups.active(), "holding window for lookups");
            }
            lookups.settled().await;
        }
    }

    fn take_pending(&self) -> Vec<(F::Key, Waiter<F::Value>)> {
        let mut state = self.state.lock();
        state.window_open = false;
        std::mem::take(&mut state.pending)
    }

    fn fail_pending(&self, err: WeftError) {
        for (_, waiter) in self.take_pending() {
            waiter.send_replace(Some(Err(err.clone())));
        }
    }

    async fn dispatch(&self, batch: Vec<(F::Key, Waiter<F::Value>)>) {
        let keys: Vec<F::Key> = batch.iter().map(|(key, _)| key.clone()).collect();
        let batch_no = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
        self.keys.fetch_add(keys.len() as u64, Ordering::SeqCst);
        debug!(kind = F::KIND, batch = batch_no, keys = keys.len(), "dispatching batch");

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(WeftError::Cancelled),
            result = self.fetch.load_batch(&keys) => result,
        };

        match result {
            Ok(mut found) => {
                let missing = batch
                    .iter()
                    .filter(|(key, _)| !found.contains_key(key))
                    .count();
                if missing > 0 {
                    trace!(kind = F::KIND, batch = batch_no, missing, "keys not found");
                }
                for (key, waiter) in batch {
                    waiter.send_replace(Some(Ok(found.remove(&key))));
                }
            }
            Err(err) => {
                if !err.is_cancelled() {
                    warn!(kind = F::KIND, batch = batch_no, %err, "batch fetch failed");
                }
                for (_, waiter) in batch {
                    waiter.send_replace(Some(Err(err.clone())));
                }
            }
        }
    }
}

async fn wait<V: Clone>(entry: &mut Entry<V>) -> LoadOutcome<V> {
    match entry.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone().unwrap_or(Err(WeftError::Cancelled)),
        // The dispatching task went away without answering.
        Err(_) => Err(WeftError::Cancelled),
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<F: BatchFn> fmt::Debug for Loader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("kind", &F::KIND)
            .field("stats", &self.stats())
            .finish()
    }
}
