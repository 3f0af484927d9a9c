//! The per-request set of loaders and the batch fetches behind them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use weft_types::{PerformerId, Tag, TagId};

use crate::config::LoaderConfig;
use crate::error::WeftResult;
use crate::loader::{BatchFn, Loader};
use crate::performer::Performer;
use crate::repo::Repository;
use crate::scope::{ReadCoordinator, ReadScope};
use crate::tracker::LookupTracker;

/// What every batch fetch of a request needs: the repository, the request's
/// coordinator, and the request-wide scope if one is pinned.
pub struct BatchSource<R: Repository> {
    repo: Arc<R>,
    reads: ReadCoordinator<R>,
    scope: Option<ReadScope<R::Snapshot>>,
}

impl<R: Repository> Clone for BatchSource<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            reads: self.reads.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<R: Repository> BatchSource<R> {
    pub fn new(
        repo: Arc<R>,
        reads: ReadCoordinator<R>,
        scope: Option<ReadScope<R::Snapshot>>,
    ) -> Self {
        Self { repo, reads, scope }
    }
}

pub struct PerformerById<R: Repository>(BatchSource<R>);

#[async_trait]
impl<R: Repository> BatchFn for PerformerById<R> {
    type Key = PerformerId;
    type Value = Arc<Performer>;
    const KIND: &'static str = "performer_by_id";

    async fn load_batch(
        &self,
        keys: &[PerformerId],
    ) -> WeftResult<HashMap<PerformerId, Arc<Performer>>> {
        let BatchSource { repo, reads, scope } = &self.0;
        let rows = reads
            .with_read_scope(scope.as_ref(), |scope| async move {
                repo.find_performers(&scope, keys).await
            })
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.id, Arc::new(Performer::new(row))))
            .collect())
    }
}

pub struct TagById<R: Repository>(BatchSource<R>);

#[async_trait]
impl<R: Repository> BatchFn for TagById<R> {
    type Key = TagId;
    type Value = Tag;
    const KIND: &'static str = "tag_by_id";

    async fn load_batch(&self, keys: &[TagId]) -> WeftResult<HashMap<TagId, Tag>> {
        let BatchSource { repo, reads, scope } = &self.0;
        let tags = reads
            .with_read_scope(scope.as_ref(), |scope| async move {
                repo.find_tags(&scope, keys).await
            })
            .await?;
        Ok(tags.into_iter().map(|tag| (tag.id, tag)).collect())
    }
}

/// Scene counts batched across sibling performers; a performer absent from
/// the backend's answer has zero scenes.
pub struct SceneCountByPerformer<R: Repository>(BatchSource<R>);

#[async_trait]
impl<R: Repository> BatchFn for SceneCountByPerformer<R> {
    type Key = PerformerId;
    type Value = i64;
    const KIND: &'static str = "scene_count_by_performer";

    async fn load_batch(&self, keys: &[PerformerId]) -> WeftResult<HashMap<PerformerId, i64>> {
        let BatchSource { repo, reads, scope } = &self.0;
        let mut counts = reads
            .with_read_scope(scope.as_ref(), |scope| async move {
                repo.count_scenes_by_performers(&scope, keys).await
            })
            .await?;
        for key in keys {
            counts.entry(*key).or_insert(0);
        }
        Ok(counts)
    }
}

/// One loader per entity kind, created with the request and dropped with it.
pub struct Loaders<R: Repository> {
    pub performer_by_id: Loader<PerformerById<R>>,
    pub tag_by_id: Loader<TagById<R>>,
    pub scene_count_by_performer: Loader<SceneCountByPerformer<R>>,
}

impl<R: Repository> Loaders<R> {
    /// Every loader's window also waits for `lookups` to settle.
    pub fn new(
        source: BatchSource<R>,
        config: &LoaderConfig,
        cancel: &CancellationToken,
        lookups: &LookupTracker,
    ) -> Self {
        Self {
            performer_by_id: Loader::tracking(
                PerformerById(source.clone()),
                config.clone(),
                cancel.clone(),
                lookups.clone(),
            ),
            tag_by_id: Loader::tracking(
                TagById(source.clone()),
                config.clone(),
                cancel.clone(),
                lookups.clone(),
            ),
            scene_count_by_performer: Loader::tracking(
                SceneCountByPerformer(source),
                config.clone(),
                cancel.clone(),
                lookups.clone(),
            ),
        }
    }
}

impl<R: Repository> fmt::Debug for Loaders<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loaders")
            .field("performer_by_id", &self.performer_by_id)
            .field("tag_by_id", &self.tag_by_id)
            .field("scene_count_by_performer", &self.scene_count_by_performer)
            .finish()
    }
}
