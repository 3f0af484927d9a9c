use std::sync::Arc;

use weft::{FieldValue, LoaderConfig, PerformerField, PerformerResolver, RequestContext};
use weft_sqlite::{Db, SqliteStore, init_sqlite, seed_demo};
use weft_types::PerformerId;

fn count(db: &Db, table: &str) -> i64 {
    db.open()
        .expect("open")
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .expect("count")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn demo_seed_fills_an_empty_database_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Db::new(dir.path().join("demo.sqlite"));
    init_sqlite(&db).expect("init sqlite");

    assert_eq!(seed_demo(&db), Ok(true));
    assert_eq!(count(&db, "performers"), 4);
    assert_eq!(count(&db, "tags"), 4);
    assert_eq!(count(&db, "performers_movies"), 2);
    let scenes = count(&db, "scenes");

    assert_eq!(seed_demo(&db), Ok(false));
    assert_eq!(count(&db, "performers"), 4);
    assert_eq!(count(&db, "scenes"), scenes);

    let store = Arc::new(SqliteStore::new(db));
    let ctx = RequestContext::new(store, &LoaderConfig::default());
    let results = PerformerResolver::new(&ctx)
        .resolve_many(&[PerformerId(2)], PerformerField::ALL)
        .await;
    let bo = results[0].as_ref().expect("resolve").as_ref().expect("exists");

    assert_eq!(bo.errors().count(), 0, "{:?}", bo.to_json());
    assert_eq!(bo.value(PerformerField::Name), Some(&FieldValue::Text("Bo Lindqvist".into())));
    assert_eq!(
        bo.value(PerformerField::AliasList),
        Some(&FieldValue::TextList(vec!["Bo Lindqvist (alt)".to_string()]))
    );
    assert_eq!(bo.value(PerformerField::SceneCount), Some(&FieldValue::Int(2)));
    assert_eq!(bo.value(PerformerField::ImageCount), Some(&FieldValue::Int(6)));
    assert_eq!(bo.value(PerformerField::GalleryCount), Some(&FieldValue::Int(1)));
    assert_eq!(bo.value(PerformerField::MovieCount), Some(&FieldValue::Int(1)));
    match bo.value(PerformerField::Tags) {
        Some(FieldValue::Tags(tags)) => {
            let names: Vec<_> = tags.iter().map(|tag| tag.name.as_str()).collect();
            assert_eq!(names, vec!["studio", "interview"]);
        }
        other => panic!("unexpected tags: {other:?}"),
    }
    match bo.value(PerformerField::StashIds) {
        Some(FieldValue::StashIds(ids)) => {
            assert_eq!(ids.len(), 1);
            assert_eq!(ids[0].stash_id, "demo-2");
        }
        other => panic!("unexpected stash ids: {other:?}"),
    }
}
