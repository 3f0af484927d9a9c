mod common;

use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use common::{Fixture, add_scene, wait_for_no_open_snapshots};
use tokio::sync::oneshot;
use weft::{FieldValue, LoaderConfig, PerformerField, PerformerResolver, RequestContext, WeftError};
use weft_types::PerformerId;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pinned_request_does_not_see_later_commits() {
    let fixture = Fixture::new();
    let ctx = RequestContext::pinned(fixture.store.clone(), &LoaderConfig::default())
        .await
        .expect("pin request");
    let resolver = PerformerResolver::new(&ctx);
    let ada = ctx
        .loaders()
        .performer_by_id
        .load(PerformerId(1))
        .await
        .expect("load")
        .expect("exists");

    assert_eq!(resolver.scene_count(&ada).await, Ok(2));

    // Another writer commits a third scene while the request is still open.
    let writer = fixture.db.open().expect("writer");
    add_scene(&writer, PerformerId(1), 12);

    let scenes = resolver.scenes(&ada).await.expect("scenes");
    assert_eq!(scenes.len(), 2);

    let fresh = RequestContext::new(fixture.store.clone(), &LoaderConfig::default());
    let results = PerformerResolver::new(&fresh)
        .resolve_many(&[PerformerId(1)], &[PerformerField::SceneCount])
        .await;
    let fields = results[0].as_ref().expect("resolve").as_ref().expect("exists");
    assert_eq!(fields.value(PerformerField::SceneCount), Some(&FieldValue::Int(3)));

    drop(ctx);
    wait_for_no_open_snapshots(&fixture).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pinned_scope_is_released_with_the_request() {
    let fixture = Fixture::new();
    let ctx = RequestContext::pinned(fixture.store.clone(), &LoaderConfig::default())
        .await
        .expect("pin request");
    let clone = ctx.clone();
    assert_eq!(fixture.store.open_snapshots(), 1);

    drop(ctx);
    assert_eq!(fixture.store.open_snapshots(), 1);
    drop(clone);
    wait_for_no_open_snapshots(&fixture).await;
}

#[test]
fn cancelling_during_a_batch_fetch_fails_every_waiter() {
    // One blocking thread: occupying it parks the batch fetch right after it
    // has been issued.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .max_blocking_threads(1)
        .enable_all()
        .build()
        .expect("runtime");

    runtime.block_on(async {
        let fixture = Fixture::new();
        let ctx = RequestContext::pinned(fixture.store.clone(), &LoaderConfig::default())
            .await
            .expect("pin request");

        let (release, parked) = std_mpsc::channel::<()>();
        let (started_tx, started) = oneshot::channel();
        let blocker = tokio::task::spawn_blocking(move || {
            let _ = started_tx.send(());
            let _ = parked.recv();
        });
        started.await.expect("blocker started");

        let task = tokio::spawn({
            let ctx = ctx.clone();
            async move {
                PerformerResolver::new(&ctx)
                    .resolve_many(
                        &[PerformerId(1), PerformerId(2), PerformerId(3)],
                        &[PerformerField::Name],
                    )
                    .await
            }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while fixture.store.query_count("find_performers") == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("batch fetch never started");
        assert!(!task.is_finished());

        ctx.cancel();
        let results = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("waiters still blocked")
            .expect("resolve task");

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|result| result == &Err(WeftError::Cancelled)));

        let _ = release.send(());
        blocker.await.expect("blocker");
        drop(ctx);
        wait_for_no_open_snapshots(&fixture).await;
        assert_eq!(fixture.store.query_count("find_performers"), 1);
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_a_pinned_request_releases_its_snapshot() {
    let fixture = Fixture::new();
    let ctx = RequestContext::pinned(fixture.store.clone(), &LoaderConfig::default())
        .await
        .expect("pin request");
    assert_eq!(fixture.store.open_snapshots(), 1);

    ctx.cancel();
    wait_for_no_open_snapshots(&fixture).await;

    let err = ctx.read(|scope| async move { scope.snapshot().map(|_| ()) }).await;
    assert!(err.is_err());
}
