use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tempfile::TempDir;
use weft_sqlite::{
    Db, SqliteStore, init_sqlite, insert_alias, insert_movie, insert_performer, insert_scene,
    insert_stash_id, insert_tag, link_gallery, link_image, link_movie, link_scene, link_tag,
};
use weft_types::{Movie, MovieId, PerformerId, PerformerRecord, Scene, SceneId, StashId, Tag, TagId};

pub struct Fixture {
    // Held so the database outlives the test body.
    _dir: TempDir,
    pub db: Db,
    pub store: Arc<SqliteStore>,
}

impl Fixture {
    /// Three performers: 1 has two scenes, two aliases, tags [3, 1, 9], the
    /// stash ids of [`ada_stash_ids`], movies 20 "Zephyr" and 21 "Aurora", one
    /// image and one gallery; 2 has tag [1]; 3 has tags [2, 3]. Tag 9 does
    /// not exist.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Db::new(dir.path().join("weft.sqlite"));
        init_sqlite(&db).expect("init sqlite");

        let conn = db.open().expect("open");
        for (id, name) in [(1, "outdoor"), (2, "studio"), (3, "vintage")] {
            insert_tag(
                &conn,
                &Tag {
                    id: TagId(id),
                    name: name.to_string(),
                },
            )
            .expect("tag");
        }
        for (id, name) in [(1, "Ada"), (2, "Bo"), (3, "Cy")] {
            let mut performer = PerformerRecord::new(PerformerId(id), name);
            performer.rating100 = Some(70);
            performer.updated_at = 1_700_000_000;
            insert_performer(&conn, &performer).expect("performer");
        }
        insert_alias(&conn, PerformerId(1), "Countess").expect("alias");
        insert_alias(&conn, PerformerId(1), "A. L.").expect("alias");
        for (performer, tag) in [(1, 3), (1, 1), (1, 9), (2, 1), (3, 2), (3, 3)] {
            link_tag(&conn, PerformerId(performer), TagId(tag)).expect("link tag");
        }
        for scene in [10, 11] {
            add_scene(&conn, PerformerId(1), scene);
        }
        for stash_id in ada_stash_ids() {
            insert_stash_id(&conn, PerformerId(1), &stash_id).expect("stash id");
        }
        for (id, name) in [(20, "Zephyr"), (21, "Aurora")] {
            let movie = Movie {
                id: MovieId(id),
                name: name.to_string(),
            };
            insert_movie(&conn, &movie).expect("movie");
            link_movie(&conn, PerformerId(1), &movie).expect("link movie");
        }
        link_image(&conn, PerformerId(1), 500).expect("image");
        link_gallery(&conn, PerformerId(1), 600).expect("gallery");

        let store = Arc::new(SqliteStore::new(db.clone()));
        Self {
            _dir: dir,
            db,
            store,
        }
    }
}

/// Stash ids of performer 1, in insertion order.
pub fn ada_stash_ids() -> Vec<StashId> {
    vec![
        StashId {
            endpoint: "https://stashdb.org/graphql".to_string(),
            stash_id: "9f1e".to_string(),
        },
        StashId {
            endpoint: "https://fansdb.cc/graphql".to_string(),
            stash_id: "0a2b".to_string(),
        },
    ]
}

pub fn add_scene(conn: &Connection, performer: PerformerId, scene: i64) {
    let scene = Scene {
        id: SceneId(scene),
        title: format!("scene {scene}"),
    };
    insert_scene(conn, &scene).expect("scene");
    link_scene(conn, performer, scene.id).expect("link scene");
}

/// Batch dispatch releases its scope after answering waiters, so a snapshot
/// can outlive the request future by a moment.
pub async fn wait_for_no_open_snapshots(fixture: &Fixture) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while fixture.store.open_snapshots() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("snapshots still open");
}
