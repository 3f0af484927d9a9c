//! Row writers for fixtures and the demo database.

use chrono::NaiveDate;
use rusqlite::{Connection, params};
use tracing::info;
use weft_types::{Movie, MovieId, PerformerId, PerformerRecord, Scene, SceneId, StashId, Tag, TagId};

use crate::db::Db;

pub fn insert_performer(conn: &Connection, performer: &PerformerRecord) -> Result<(), String> {
    conn.execute(
        "INSERT INTO performers
           (id, name, disambiguation, height_cm, birthdate, death_date, rating100, favorite, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            performer.id.get(),
            performer.name,
            performer.disambiguation,
            performer.height_cm,
            performer.birthdate,
            performer.death_date,
            performer.rating100,
            performer.favorite,
            performer.updated_at,
        ],
    )
    .map_err(|error| format!("insert performer {}: {error}", performer.id))?;
    Ok(())
}

pub fn insert_alias(conn: &Connection, performer: PerformerId, alias: &str) -> Result<(), String> {
    conn.execute(
        "INSERT INTO performer_aliases (performer_id, alias) VALUES (?1, ?2)",
        params![performer.get(), alias],
    )
    .map_err(|error| format!("insert alias for performer {performer}: {error}"))?;
    Ok(())
}

pub fn insert_stash_id(
    conn: &Connection,
    performer: PerformerId,
    stash_id: &StashId,
) -> Result<(), String> {
    conn.execute(
        "INSERT INTO performer_stash_ids (performer_id, endpoint, stash_id) VALUES (?1, ?2, ?3)",
        params![performer.get(), stash_id.endpoint, stash_id.stash_id],
    )
    .map_err(|error| format!("insert stash id for performer {performer}: {error}"))?;
    Ok(())
}

pub fn insert_tag(conn: &Connection, tag: &Tag) -> Result<(), String> {
    conn.execute(
        "INSERT INTO tags (id, name) VALUES (?1, ?2)",
        params![tag.id.get(), tag.name],
    )
    .map_err(|error| format!("insert tag {}: {error}", tag.id))?;
    Ok(())
}

pub fn link_tag(conn: &Connection, performer: PerformerId, tag: TagId) -> Result<(), String> {
    conn.execute(
        "INSERT INTO performers_tags (performer_id, tag_id) VALUES (?1, ?2)",
        params![performer.get(), tag.get()],
    )
    .map_err(|error| format!("link tag {tag} to performer {performer}: {error}"))?;
    Ok(())
}

pub fn insert_scene(conn: &Connection, scene: &Scene) -> Result<(), String> {
    conn.execute(
        "INSERT INTO scenes (id, title) VALUES (?1, ?2)",
        params![scene.id.get(), scene.title],
    )
    .map_err(|error| format!("insert scene {}: {error}", scene.id))?;
    Ok(())
}

pub fn link_scene(conn: &Connection, performer: PerformerId, scene: SceneId) -> Result<(), String> {
    conn.execute(
        "INSERT INTO performers_scenes (performer_id, scene_id) VALUES (?1, ?2)",
        params![performer.get(), scene.get()],
    )
    .map_err(|error| format!("link scene {scene} to performer {performer}: {error}"))?;
    Ok(())
}

pub fn insert_movie(conn: &Connection, movie: &Movie) -> Result<(), String> {
    conn.execute(
        "INSERT INTO movies (id, name) VALUES (?1, ?2)",
        params![movie.id.get(), movie.name],
    )
    .map_err(|error| format!("insert movie {}: {error}", movie.id))?;
    Ok(())
}

pub fn link_movie(conn: &Connection, performer: PerformerId, movie: &Movie) -> Result<(), String> {
    conn.execute(
        "INSERT INTO performers_movies (performer_id, movie_id) VALUES (?1, ?2)",
        params![performer.get(), movie.id.get()],
    )
    .map_err(|error| format!("link movie {} to performer {performer}: {error}", movie.id))?;
    Ok(())
}

pub fn link_image(conn: &Connection, performer: PerformerId, image_id: i64) -> Result<(), String> {
    conn.execute(
        "INSERT INTO performers_images (performer_id, image_id) VALUES (?1, ?2)",
        params![performer.get(), image_id],
    )
    .map_err(|error| format!("link image {image_id} to performer {performer}: {error}"))?;
    Ok(())
}

pub fn link_gallery(
    conn: &Connection,
    performer: PerformerId,
    gallery_id: i64,
) -> Result<(), String> {
    conn.execute(
        "INSERT INTO performers_galleries (performer_id, gallery_id) VALUES (?1, ?2)",
        params![performer.get(), gallery_id],
    )
    .map_err(|error| format!("link gallery {gallery_id} to performer {performer}: {error}"))?;
    Ok(())
}

/// Fills an empty database with a handful of performers and their
/// relationships. Returns `false` without writing if performers exist.
pub fn seed_demo(db: &Db) -> Result<bool, String> {
    let mut conn = db.open()?;
    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM performers", [], |row| row.get(0))
        .map_err(|error| format!("count performers: {error}"))?;
    if existing > 0 {
        return Ok(false);
    }

    let tx = conn
        .transaction()
        .map_err(|error| format!("start transaction: {error}"))?;

    let tags = [
        Tag { id: TagId(1), name: "outdoor".into() },
        Tag { id: TagId(2), name: "studio".into() },
        Tag { id: TagId(3), name: "vintage".into() },
        Tag { id: TagId(4), name: "interview".into() },
    ];
    for tag in &tags {
        insert_tag(&tx, tag)?;
    }

    let names = ["Ada Vance", "Bo Lindqvist", "Cyra Moss", "Dev Okafor"];
    for (index, name) in names.iter().enumerate() {
        let id = PerformerId(index as i64 + 1);
        let mut performer = PerformerRecord::new(id, *name);
        performer.height_cm = Some(160 + 5 * index as i32);
        performer.rating100 = Some(40 + 15 * index as i32);
        performer.birthdate = NaiveDate::from_ymd_opt(1985 + index as i32, 3, 14);
        performer.favorite = index % 2 == 0;
        performer.updated_at = 1_700_000_000 + index as i64;
        insert_performer(&tx, &performer)?;

        insert_alias(&tx, id, &format!("{name} (alt)"))?;
        for tag in tags.iter().skip(index % 2).step_by(2) {
            link_tag(&tx, id, tag.id)?;
        }
        insert_stash_id(
            &tx,
            id,
            &StashId {
                endpoint: "https://stashdb.org/graphql".into(),
                stash_id: format!("demo-{id}"),
            },
        )?;
        for scene_no in 0..=index as i64 {
            let scene = Scene {
                id: SceneId(id.get() * 100 + scene_no),
                title: format!("{name}, part {}", scene_no + 1),
            };
            insert_scene(&tx, &scene)?;
            link_scene(&tx, id, scene.id)?;
        }
        for image_no in 0..3 * (index as i64 + 1) {
            link_image(&tx, id, id.get() * 1000 + image_no)?;
        }
        link_gallery(&tx, id, id.get())?;
    }

    let movie = Movie {
        id: MovieId(1),
        name: "Ensemble".into(),
    };
    insert_movie(&tx, &movie)?;
    for id in 1..=2 {
        link_movie(&tx, PerformerId(id), &movie)?;
    }

    tx.commit()
        .map_err(|error| format!("commit seed: {error}"))?;
    info!(performers = names.len(), path = ?db.path(), "seeded demo database");
    Ok(true)
}
