use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, Row, params, params_from_iter};
use tracing::trace;
use weft::{
    GalleryReader, ImageReader, MovieReader, PerformerReader, ReadScope, SceneReader,
    SnapshotSource, TagReader, WeftError, WeftResult,
};
use weft_types::{Movie, MovieId, PerformerId, PerformerRecord, Scene, SceneId, StashId, Tag, TagId};

use crate::db::Db;
use crate::snapshot::SqliteSnapshot;

const PERFORMER_COLUMNS: &str = "id, name, disambiguation, height_cm, birthdate, death_date, \
                                 rating100, favorite, updated_at";

/// Repository over one SQLite database file.
///
/// Every read runs on the blocking pool against the connection of the scope
/// it was given. The store counts statements per operation and the snapshots
/// currently open, which is what callers assert batching and leaks against.
pub struct SqliteStore {
    db: Arc<Db>,
    open_snapshots: Arc<AtomicUsize>,
    queries: Mutex<HashMap<&'static str, u64>>,
}

impl SqliteStore {
    pub fn new(db: Db) -> Self {
        Self {
            db: Arc::new(db),
            open_snapshots: Arc::new(AtomicUsize::new(0)),
            queries: Mutex::new(HashMap::new()),
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Snapshots begun and not yet rolled back.
    pub fn open_snapshots(&self) -> usize {
        self.open_snapshots.load(Ordering::SeqCst)
    }

    pub fn query_count(&self, op: &str) -> u64 {
        self.queries.lock().get(op).copied().unwrap_or(0)
    }

    pub fn total_queries(&self) -> u64 {
        self.queries.lock().values().sum()
    }

    async fn read<T, F>(&self, scope: &ReadScope<SqliteSnapshot>, op: &'static str, f: F) -> WeftResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let snapshot = scope.snapshot()?;
        *self.queries.lock().entry(op).or_default() += 1;
        trace!(scope = scope.id(), op, "sqlite read");
        tokio::task::spawn_blocking(move || snapshot.with_conn(f))
            .await
            .map_err(|error| WeftError::fetch(format!("join sqlite: {error}")))?
            .map_err(|error| WeftError::fetch(format!("{op}: {error}")))
    }
}

#[async_trait]
impl SnapshotSource for SqliteStore {
    type Snapshot = SqliteSnapshot;

    async fn open_snapshot(&self) -> WeftResult<SqliteSnapshot> {
        let db = Arc::clone(&self.db);
        let open = Arc::clone(&self.open_snapshots);
        tokio::task::spawn_blocking(move || SqliteSnapshot::begin(&db, open))
            .await
            .map_err(|error| WeftError::scope(format!("join sqlite: {error}")))?
            .map_err(WeftError::scope)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn performer_from_row(row: &Row<'_>) -> rusqlite::Result<PerformerRecord> {
    Ok(PerformerRecord {
        id: PerformerId(row.get(0)?),
        name: row.get(1)?,
        disambiguation: row.get(2)?,
        height_cm: row.get(3)?,
        birthdate: row.get(4)?,
        death_date: row.get(5)?,
        rating100: row.get(6)?,
        favorite: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn count_for(conn: &Connection, sql: &str, id: PerformerId) -> rusqlite::Result<i64> {
    conn.query_row(sql, params![id.get()], |row| row.get(0))
}

#[async_trait]
impl PerformerReader for SqliteStore {
    async fn find_performer(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        id: PerformerId,
    ) -> WeftResult<Option<PerformerRecord>> {
        self.read(scope, "find_performer", move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {PERFORMER_COLUMNS} FROM performers WHERE id = ?1"
            ))?;
            let mut rows = stmt.query_map(params![id.get()], performer_from_row)?;
            rows.next().transpose()
        })
        .await
    }

    async fn find_performers(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        ids: &[PerformerId],
    ) -> WeftResult<Vec<PerformerRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        self.read(scope, "find_performers", move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PERFORMER_COLUMNS} FROM performers WHERE id IN ({})",
                placeholders(ids.len())
            ))?;
            stmt.query_map(params_from_iter(ids), performer_from_row)?
                .collect()
        })
        .await
    }

    async fn performer_aliases(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<String>> {
        self.read(scope, "performer_aliases", move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT alias FROM performer_aliases WHERE performer_id = ?1 ORDER BY rowid",
            )?;
            stmt.query_map(params![id.get()], |row| row.get(0))?
                .collect()
        })
        .await
    }

    async fn performer_tag_ids(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<TagId>> {
        self.read(scope, "performer_tag_ids", move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT tag_id FROM performers_tags WHERE performer_id = ?1 ORDER BY rowid",
            )?;
            stmt.query_map(params![id.get()], |row| Ok(TagId(row.get(0)?)))?
                .collect()
        })
        .await
    }

    async fn performer_stash_ids(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<StashId>> {
        self.read(scope, "performer_stash_ids", move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT endpoint, stash_id FROM performer_stash_ids
                 WHERE performer_id = ?1 ORDER BY rowid",
            )?;
            stmt.query_map(params![id.get()], |row| {
                Ok(StashId {
                    endpoint: row.get(0)?,
                    stash_id: row.get(1)?,
                })
            })?
            .collect()
        })
        .await
    }
}

#[async_trait]
impl TagReader for SqliteStore {
    async fn find_tags(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        ids: &[TagId],
    ) -> WeftResult<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        self.read(scope, "find_tags", move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, name FROM tags WHERE id IN ({})",
                placeholders(ids.len())
            ))?;
            stmt.query_map(params_from_iter(ids), |row| {
                Ok(Tag {
                    id: TagId(row.get(0)?),
                    name: row.get(1)?,
                })
            })?
            .collect()
        })
        .await
    }
}

#[async_trait]
impl SceneReader for SqliteStore {
    async fn count_scenes_by_performer(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        id: PerformerId,
    ) -> WeftResult<i64> {
        self.read(scope, "count_scenes_by_performer", move |conn| {
            count_for(
                conn,
                "SELECT COUNT(*) FROM performers_scenes WHERE performer_id = ?1",
                id,
            )
        })
        .await
    }

    async fn count_scenes_by_performers(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        ids: &[PerformerId],
    ) -> WeftResult<HashMap<PerformerId, i64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        self.read(scope, "count_scenes_by_performers", move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT performer_id, COUNT(*) FROM performers_scenes
                 WHERE performer_id IN ({})
                 GROUP BY performer_id",
                placeholders(ids.len())
            ))?;
            stmt.query_map(params_from_iter(ids), |row| {
                Ok((PerformerId(row.get(0)?), row.get(1)?))
            })?
            .collect()
        })
        .await
    }

    async fn find_scenes_by_performer(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<Scene>> {
        self.read(scope, "find_scenes_by_performer", move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT s.id, s.title FROM scenes s
                 JOIN performers_scenes ps ON ps.scene_id = s.id
                 WHERE ps.performer_id = ?1
                 ORDER BY s.id",
            )?;
            stmt.query_map(params![id.get()], |row| {
                Ok(Scene {
                    id: SceneId(row.get(0)?),
                    title: row.get(1)?,
                })
            })?
            .collect()
        })
        .await
    }
}

#[async_trait]
impl MovieReader for SqliteStore {
    async fn count_movies_by_performer(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        id: PerformerId,
    ) -> WeftResult<i64> {
        self.read(scope, "count_movies_by_performer", move |conn| {
            count_for(
                conn,
                "SELECT COUNT(*) FROM performers_movies WHERE performer_id = ?1",
                id,
            )
        })
        .await
    }

    async fn find_movies_by_performer(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        id: PerformerId,
    ) -> WeftResult<Vec<Movie>> {
        self.read(scope, "find_movies_by_performer", move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT m.id, m.name FROM movies m
                 JOIN performers_movies pm ON pm.movie_id = m.id
                 WHERE pm.performer_id = ?1
                 ORDER BY m.name",
            )?;
            stmt.query_map(params![id.get()], |row| {
                Ok(Movie {
                    id: MovieId(row.get(0)?),
                    name: row.get(1)?,
                })
            })?
            .collect()
        })
        .await
    }
}

#[async_trait]
impl ImageReader for SqliteStore {
    async fn count_images_by_performer(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        id: PerformerId,
    ) -> WeftResult<i64> {
        self.read(scope, "count_images_by_performer", move |conn| {
            count_for(
                conn,
                "SELECT COUNT(*) FROM performers_images WHERE performer_id = ?1",
                id,
            )
        })
        .await
    }
}

#[async_trait]
impl GalleryReader for SqliteStore {
    async fn count_galleries_by_performer(
        &self,
        scope: &ReadScope<SqliteSnapshot>,
        id: PerformerId,
    ) -> WeftResult<i64> {
        self.read(scope, "count_galleries_by_performer", move |conn| {
            count_for(
                conn,
                "SELECT COUNT(*) FROM performers_galleries WHERE performer_id = ?1",
                id,
            )
        })
        .await
    }
}
