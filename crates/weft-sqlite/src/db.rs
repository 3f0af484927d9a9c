use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> Result<Connection, String> {
        let conn =
            Connection::open(&self.path).map_err(|error| format!("open sqlite: {error}"))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|error| format!("set busy timeout: {error}"))?;
        Ok(conn)
    }
}

pub fn init_sqlite(db: &Db) -> Result<(), String> {
    let conn = db.open()?;
    // Read scopes rely on WAL: a reader keeps its snapshot while writers commit.
    let mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .map_err(|error| format!("enable wal: {error}"))?;
    if !mode.eq_ignore_ascii_case("wal") {
        return Err(format!("enable wal: journal mode is {mode}"));
    }
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS performers (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            disambiguation TEXT,
            height_cm INTEGER,
            birthdate TEXT,
            death_date TEXT,
            rating100 INTEGER,
            favorite INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS performer_aliases (
            performer_id INTEGER NOT NULL REFERENCES performers(id) ON DELETE CASCADE,
            alias TEXT NOT NULL,
            PRIMARY KEY (performer_id, alias)
        );

        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS performers_tags (
            performer_id INTEGER NOT NULL REFERENCES performers(id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (performer_id, tag_id)
        );

        CREATE TABLE IF NOT EXISTS performer_stash_ids (
            performer_id INTEGER NOT NULL REFERENCES performers(id) ON DELETE CASCADE,
            endpoint TEXT NOT NULL,
            stash_id TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS scenes (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS performers_scenes (
            performer_id INTEGER NOT NULL REFERENCES performers(id) ON DELETE CASCADE,
            scene_id INTEGER NOT NULL REFERENCES scenes(id) ON DELETE CASCADE,
            PRIMARY KEY (performer_id, scene_id)
        );

        CREATE TABLE IF NOT EXISTS movies (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS performers_movies (
            performer_id INTEGER NOT NULL REFERENCES performers(id) ON DELETE CASCADE,
            movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
            PRIMARY KEY (performer_id, movie_id)
        );

        CREATE TABLE IF NOT EXISTS performers_images (
            performer_id INTEGER NOT NULL REFERENCES performers(id) ON DELETE CASCADE,
            image_id INTEGER NOT NULL,
            PRIMARY KEY (performer_id, image_id)
        );

        CREATE TABLE IF NOT EXISTS performers_galleries (
            performer_id INTEGER NOT NULL REFERENCES performers(id) ON DELETE CASCADE,
            gallery_id INTEGER NOT NULL,
            PRIMARY KEY (performer_id, gallery_id)
        );

        CREATE INDEX IF NOT EXISTS performers_scenes_scene ON performers_scenes(scene_id);
        ",
    )
    .map_err(|error| format!("init schema: {error}"))?;
    Ok(())
}
