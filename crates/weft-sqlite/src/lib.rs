//! SQLite persistence for `weft`.
//!
//! [`SqliteStore`] implements every reader trait `weft` resolves through. Each
//! read scope is one connection holding an open read transaction, so all
//! reads made under it observe the same committed state even while other
//! connections write. The database runs in WAL mode for that reason.

mod db;
mod seed;
mod snapshot;
mod store;

pub use db::{Db, init_sqlite};
pub use seed::{
    insert_alias, insert_movie, insert_performer, insert_scene, insert_stash_id, insert_tag,
    link_gallery, link_image, link_movie, link_scene, link_tag, seed_demo,
};
pub use snapshot::SqliteSnapshot;
pub use store::SqliteStore;
