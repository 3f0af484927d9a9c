//! Consistent read snapshots around units of work.
//!
//! A [`ReadScope`] is an explicit handle: persistence calls receive it as an
//! argument and pull the backend snapshot out of it. Nesting never opens a
//! second snapshot; [`ReadCoordinator::with_read_scope`] reuses whatever
//! handle the caller already holds.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{WeftError, WeftResult};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Something that can open a consistent point-in-time view of the data.
///
/// The snapshot is released by dropping it.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    type Snapshot: Send + Sync + 'static;

    async fn open_snapshot(&self) -> WeftResult<Self::Snapshot>;
}

/// Handle to an open snapshot. Cheap to clone; all clones share the snapshot.
pub struct ReadScope<S> {
    inner: Arc<ScopeInner<S>>,
}

struct ScopeInner<S> {
    id: u64,
    snapshot: Mutex<Option<Arc<S>>>,
}

impl<S> Clone for ReadScope<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> ReadScope<S> {
    fn new(snapshot: S) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                snapshot: Mutex::new(Some(Arc::new(snapshot))),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_active(&self) -> bool {
        self.inner.snapshot.lock().is_some()
    }

    /// The snapshot every read in this scope must go through.
    ///
    /// Fails once the scope has been released; a released scope is never
    /// silently replaced by a fresh snapshot.
    pub fn snapshot(&self) -> WeftResult<Arc<S>> {
        self.inner.snapshot.lock().clone().ok_or_else(|| {
            WeftError::scope(format!("read scope {} used after release", self.inner.id))
        })
    }

    /// Drops the scope's hold on the snapshot. Reads already running keep
    /// their own reference until they finish.
    pub(crate) fn release(&self) -> bool {
        let released = self.inner.snapshot.lock().take().is_some();
        if released {
            trace!(scope = self.inner.id, "read scope released");
        }
        released
    }
}

impl<S> fmt::Debug for ReadScope<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadScope")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Owns a scope opened by the coordinator and releases it when dropped,
/// whichever way the owning future ends.
#[must_use = "the read scope is released as soon as the guard is dropped"]
pub struct ScopeGuard<S> {
    scope: ReadScope<S>,
}

impl<S> ScopeGuard<S> {
    pub fn scope(&self) -> &ReadScope<S> {
        &self.scope
    }
}

impl<S> Drop for ScopeGuard<S> {
    fn drop(&mut self) {
        self.scope.release();
    }
}

impl<S> fmt::Debug for ScopeGuard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopeGuard").field(&self.scope).finish()
    }
}

/// Opens snapshots for one request and wraps work in them.
pub struct ReadCoordinator<B: SnapshotSource> {
    source: Arc<B>,
    cancel: CancellationToken,
}

impl<B: SnapshotSource> Clone for ReadCoordinator<B> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cancel: self.cancel.clone(),
        }
    }
}

impl<B: SnapshotSource> ReadCoordinator<B> {
    pub fn new(source: Arc<B>, cancel: CancellationToken) -> Self {
        Self { source, cancel }
    }

    /// Opens a fresh snapshot. Suspends while the backend establishes it and
    /// gives up with [`WeftError::Cancelled`] if the request is cancelled first.
    pub async fn open(&self) -> WeftResult<ScopeGuard<B::Snapshot>> {
        if self.cancel.is_cancelled() {
            return Err(WeftError::Cancelled);
        }
        let snapshot = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(WeftError::Cancelled),
            snapshot = self.source.open_snapshot() => snapshot?,
        };
        let scope = ReadScope::new(snapshot);
        debug!(scope = scope.id(), "read scope opened");
        Ok(ScopeGuard { scope })
    }

    /// Runs `work` inside a read scope.
    ///
    /// If `active` is given it is reused as-is. Otherwise a new snapshot is
    /// opened and released after `work` finishes, fails, panics, or is dropped.
    /// Errors from `work` come back untouched.
    pub async fn with_read_scope<T, F, Fut>(
        &self,
        active: Option<&ReadScope<B::Snapshot>>,
        work: F,
    ) -> WeftResult<T>
    where
        F: FnOnce(ReadScope<B::Snapshot>) -> Fut,
        Fut: Future<Output = WeftResult<T>>,
    {
        if let Some(scope) = active {
            trace!(scope = scope.id(), "reusing active read scope");
            return self.cancellable(work(scope.clone())).await;
        }

        let guard = self.open().await?;
        let result = self.cancellable(work(guard.scope().clone())).await;
        drop(guard);
        result
    }

    async fn cancellable<T>(&self, work: impl Future<Output = WeftResult<T>>) -> WeftResult<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(WeftError::Cancelled),
            result = work => result,
        }
    }
}
