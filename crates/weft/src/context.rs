use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::LoaderConfig;
use crate::error::WeftResult;
use crate::registry::{BatchSource, Loaders};
use crate::repo::Repository;
use crate::scope::{ReadCoordinator, ReadScope, ScopeGuard};
use crate::tracker::LookupTracker;

/// Everything a field resolution needs from the surrounding request.
///
/// Built once per request and passed explicitly to every resolver. Clones
/// share the loaders, the cancellation token, and the pinned scope.
pub struct RequestContext<R: Repository> {
    repo: Arc<R>,
    reads: ReadCoordinator<R>,
    loaders: Arc<Loaders<R>>,
    lookups: LookupTracker,
    pinned: Option<Arc<ScopeGuard<R::Snapshot>>>,
    base_url: Arc<str>,
    cancel: CancellationToken,
}

impl<R: Repository> Clone for RequestContext<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            reads: self.reads.clone(),
            loaders: Arc::clone(&self.loaders),
            lookups: self.lookups.clone(),
            pinned: self.pinned.clone(),
            base_url: Arc::clone(&self.base_url),
            cancel: self.cancel.clone(),
        }
    }
}

impl<R: Repository> RequestContext<R> {
    /// A request in which every unit of work opens its own short snapshot.
    pub fn new(repo: Arc<R>, config: &LoaderConfig) -> Self {
        let cancel = CancellationToken::new();
        let reads = ReadCoordinator::new(Arc::clone(&repo), cancel.clone());
        let lookups = LookupTracker::new();
        let loaders = Loaders::new(
            BatchSource::new(Arc::clone(&repo), reads.clone(), None),
            config,
            &cancel,
            &lookups,
        );
        Self {
            repo,
            reads,
            loaders: Arc::new(loaders),
            lookups,
            pinned: None,
            base_url: Arc::from(""),
            cancel,
        }
    }

    /// A request whose field resolutions and batch fetches all read from one
    /// snapshot, opened here and released when the last clone of the context
    /// is dropped or the request is cancelled.
    pub async fn pinned(repo: Arc<R>, config: &LoaderConfig) -> WeftResult<Self> {
        let mut ctx = Self::new(repo, config);
        let guard = ctx.reads.open().await?;
        let scope = guard.scope().clone();
        debug!(scope = scope.id(), "request pinned to one read scope");
        ctx.loaders = Arc::new(Loaders::new(
            BatchSource::new(Arc::clone(&ctx.repo), ctx.reads.clone(), Some(scope)),
            config,
            &ctx.cancel,
            &ctx.lookups,
        ));
        ctx.pinned = Some(Arc::new(guard));
        Ok(ctx)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Arc::from(base_url.into());
        self
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn loaders(&self) -> &Loaders<R> {
        &self.loaders
    }

    /// Lookups that will register loader keys once their slot reads finish.
    /// Loader windows of this request stay open until they settle.
    pub fn lookups(&self) -> &LookupTracker {
        &self.lookups
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The request-wide scope, if this request is pinned.
    pub fn scope(&self) -> Option<&ReadScope<R::Snapshot>> {
        self.pinned.as_deref().map(ScopeGuard::scope)
    }

    /// Runs `work` in the request's scope, or in a fresh one if none is pinned.
    pub async fn read<T, F, Fut>(&self, work: F) -> WeftResult<T>
    where
        F: FnOnce(ReadScope<R::Snapshot>) -> Fut,
        Fut: Future<Output = WeftResult<T>>,
    {
        self.reads.with_read_scope(self.scope(), work).await
    }

    /// Cancels every in-flight scope acquisition, batch fetch, and scoped read
    /// of this request, and releases the pinned snapshot.
    pub fn cancel(&self) {
        debug!("request cancelled");
        self.cancel.cancel();
        if let Some(guard) = &self.pinned {
            guard.scope().release();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl<R: Repository> fmt::Debug for RequestContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("scope", &self.scope())
            .field("base_url", &self.base_url)
            .field("cancelled", &self.is_cancelled())
            .field("loaders", &self.loaders)
            .field("lookups", &self.lookups)
            .finish()
    }
}
