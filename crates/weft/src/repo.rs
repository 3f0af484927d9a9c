//! Persistence interfaces the resolvers read through.
//!
//! Every call takes the active [`ReadScope`]; implementations must read through
//! the scope's snapshot and nothing else.

use std::collections::HashMap;

use async_trait::async_trait;
use weft_types::{Movie, PerformerId, PerformerRecord, Scene, StashId, Tag, TagId};

use crate::error::WeftResult;
use crate::scope::{ReadScope, SnapshotSource};

#[async_trait]
pub trait PerformerReader: SnapshotSource {
    async fn find_performer(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        id: PerformerId,
    ) -> WeftResult<Option<PerformerRecord>>;

    /// Rows for the ids that exist, in any order.
    async fn find_performers(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        ids: &[PerformerId],
    ) -> WeftResult<Vec<PerformerRecord>>;

    /// All aliases of one performer, in stored order.
    async fn performer_aliases(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<String>>;

    async fn performer_tag_ids(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<TagId>>;

    async fn performer_stash_ids(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<StashId>>;
}

#[async_trait]
pub trait TagReader: SnapshotSource {
    /// Rows for the ids that exist, in any order.
    async fn find_tags(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        ids: &[TagId],
    ) -> WeftResult<Vec<Tag>>;
}

#[async_trait]
pub trait SceneReader: SnapshotSource {
    async fn count_scenes_by_performer(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        id: PerformerId,
    ) -> WeftResult<i64>;

    /// Scene counts for several performers in one read. Performers without
    /// scenes may be left out of the map.
    async fn count_scenes_by_performers(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        ids: &[PerformerId],
    ) -> WeftResult<HashMap<PerformerId, i64>> {
        let mut counts = HashMap::with_capacity(ids.len());
        for id in ids {
            counts.insert(*id, self.count_scenes_by_performer(scope, *id).await?);
        }
        Ok(counts)
    }

    async fn find_scenes_by_performer(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<Scene>>;
}

#[async_trait]
pub trait MovieReader: SnapshotSource {
    async fn count_movies_by_performer(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        id: PerformerId,
    ) -> WeftResult<i64>;

    async fn find_movies_by_performer(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<Movie>>;
}

#[async_trait]
pub trait ImageReader: SnapshotSource {
    async fn count_images_by_performer(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        id: PerformerId,
    ) -> WeftResult<i64>;
}

#[async_trait]
pub trait GalleryReader: SnapshotSource {
    async fn count_galleries_by_performer(
        &self,
        scope: &ReadScope<Self::Snapshot>,
        id: PerformerId,
    ) -> WeftResult<i64>;
}

/// Everything a performer resolver reads.
pub trait Repository:
    PerformerReader + TagReader + SceneReader + MovieReader + ImageReader + GalleryReader
{
}

impl<R> Repository for R where
    R: PerformerReader + TagReader + SceneReader + MovieReader + ImageReader + GalleryReader
{
}
