use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use weft_types::{Movie, PerformerId, PerformerRecord, Scene, StashId, Tag, TagId};

use crate::error::{WeftError, WeftResult};
use crate::repo::{
    GalleryReader, ImageReader, MovieReader, PerformerReader, SceneReader, TagReader,
};
use crate::scope::{ReadScope, SnapshotSource};

/// In-memory repository that records every read and can be told to fail one.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub performers: Vec<PerformerRecord>,
    pub aliases: HashMap<PerformerId, Vec<String>>,
    pub tag_links: HashMap<PerformerId, Vec<TagId>>,
    pub stash_ids: HashMap<PerformerId, Vec<StashId>>,
    pub tags: Vec<Tag>,
    pub scenes: HashMap<PerformerId, Vec<Scene>>,
    pub movies: HashMap<PerformerId, Vec<Movie>>,
    pub images: HashMap<PerformerId, i64>,
    pub galleries: HashMap<PerformerId, i64>,
    pub(crate) calls: Mutex<Vec<&'static str>>,
    pub(crate) failing: Mutex<HashSet<&'static str>>,
    pub(crate) snapshots_opened: AtomicUsize,
}

pub(crate) struct MemorySnapshot;

impl MemoryStore {
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().insert(op);
    }

    pub fn calls_to(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|call| **call == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn snapshots_opened(&self) -> usize {
        self.snapshots_opened.load(Ordering::SeqCst)
    }

    fn record(&self, scope: &ReadScope<MemorySnapshot>, op: &'static str) -> WeftResult<()> {
        scope.snapshot()?;
        self.calls.lock().push(op);
        if self.failing.lock().contains(op) {
            return Err(WeftError::fetch(format!("{op}: injected failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotSource for MemoryStore {
    type Snapshot = MemorySnapshot;

    async fn open_snapshot(&self) -> WeftResult<MemorySnapshot> {
        self.snapshots_opened.fetch_add(1, Ordering::SeqCst);
        // Opening a real snapshot suspends; callers must not rely on it being
        // ready on the first poll.
        tokio::task::yield_now().await;
        Ok(MemorySnapshot)
    }
}

#[async_trait]
impl PerformerReader for MemoryStore {
    async fn find_performer(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        id: PerformerId,
    ) -> WeftResult<Option<PerformerRecord>> {
        self.record(scope, "find_performer")?;
        Ok(self.performers.iter().find(|p| p.id == id).cloned())
    }

    async fn find_performers(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        ids: &[PerformerId],
    ) -> WeftResult<Vec<PerformerRecord>> {
        self.record(scope, "find_performers")?;
        Ok(self
            .performers
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn performer_aliases(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<String>> {
        self.record(scope, "performer_aliases")?;
        Ok(self.aliases.get(&id).cloned().unwrap_or_default())
    }

    async fn performer_tag_ids(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<TagId>> {
        self.record(scope, "performer_tag_ids")?;
        Ok(self.tag_links.get(&id).cloned().unwrap_or_default())
    }

    async fn performer_stash_ids(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<StashId>> {
        self.record(scope, "performer_stash_ids")?;
        Ok(self.stash_ids.get(&id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl TagReader for MemoryStore {
    async fn find_tags(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        ids: &[TagId],
    ) -> WeftResult<Vec<Tag>> {
        self.record(scope, "find_tags")?;
        // Reverse storage order so callers can't lean on it.
        Ok(self
            .tags
            .iter()
            .rev()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SceneReader for MemoryStore {
    async fn count_scenes_by_performer(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        id: PerformerId,
    ) -> WeftResult<i64> {
        self.record(scope, "count_scenes_by_performer")?;
        Ok(self.scenes.get(&id).map_or(0, |s| s.len() as i64))
    }

    async fn count_scenes_by_performers(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        ids: &[PerformerId],
    ) -> WeftResult<HashMap<PerformerId, i64>> {
        self.record(scope, "count_scenes_by_performers")?;
        Ok(ids
            .iter()
            .filter_map(|id| self.scenes.get(id).map(|s| (*id, s.len() as i64)))
            .collect())
    }

    async fn find_scenes_by_performer(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<Scene>> {
        self.record(scope, "find_scenes_by_performer")?;
        Ok(self.scenes.get(&id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl MovieReader for MemoryStore {
    async fn count_movies_by_performer(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        id: PerformerId,
    ) -> WeftResult<i64> {
        self.record(scope, "count_movies_by_performer")?;
        Ok(self.movies.get(&id).map_or(0, |m| m.len() as i64))
    }

    async fn find_movies_by_performer(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<Movie>> {
        self.record(scope, "find_movies_by_performer")?;
        Ok(self.movies.get(&id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ImageReader for MemoryStore {
    async fn count_images_by_performer(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        id: PerformerId,
    ) -> WeftResult<i64> {
        self.record(scope, "count_images_by_performer")?;
        Ok(self.images.get(&id).copied().unwrap_or(0))
    }
}

#[async_trait]
impl GalleryReader for MemoryStore {
    async fn count_galleries_by_performer(
        &self,
        scope: &ReadScope<MemorySnapshot>,
        id: PerformerId,
    ) -> WeftResult<i64> {
        self.record(scope, "count_galleries_by_performer")?;
        Ok(self.galleries.get(&id).copied().unwrap_or(0))
    }
}
