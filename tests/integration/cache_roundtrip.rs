//! Packs persisted in sled survive a service restart.

use super::support::{battery, camry, hosted_url, FakeImage, FakeReasoning, Harness};
use overlay_forge::api::PackOrigin;
use overlay_forge::store::{PackStore, SledPackStore};
use overlay_forge::types::WorkspaceType;
use overlay_forge::CacheKey;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_sled_backed_pack_served_after_restart() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn PackStore> = Arc::new(SledPackStore::new(temp_dir.path().join("packs")).unwrap());

    let first = Harness::with_store(
        FakeReasoning::new(),
        FakeImage::new(),
        Arc::clone(&store),
        |b| b,
    );
    let generated = first
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();
    assert!(generated.stored);
    drop(first);

    let second = Harness::with_store(
        FakeReasoning::new(),
        FakeImage::new(),
        Arc::clone(&store),
        |b| b,
    );
    let served = second
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();

    assert_eq!(served.origin, PackOrigin::Cache);
    assert_eq!(served.pack.id, generated.pack.id);
    assert_eq!(served.pack.parts, generated.pack.parts);
    assert_eq!(served.pack.image_url(), Some(hosted_url(&served.key).as_str()));
    assert_eq!(second.reasoning.plan_calls(), 0);
    assert_eq!(second.image.calls(), 0);
}

#[tokio::test]
async fn test_usage_count_is_bumped_in_the_background() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn PackStore> = Arc::new(SledPackStore::new(temp_dir.path().join("packs")).unwrap());
    let harness = Harness::with_store(FakeReasoning::new(), FakeImage::new(), Arc::clone(&store), |b| b);
    let key = CacheKey::new("toyota_camry", WorkspaceType::EngineFront);

    harness.service.get_or_generate(&camry(), &battery()).await.unwrap();
    for _ in 0..3 {
        harness.service.get_or_generate(&camry(), &battery()).await.unwrap();
    }

    let mut stored = 0;
    for _ in 0..50 {
        stored = store.get(&key).unwrap().unwrap().usage_count;
        if stored == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stored, 3);
}

#[tokio::test]
async fn test_cached_lookup_does_not_bump_usage() {
    let harness = Harness::new(FakeReasoning::new(), FakeImage::new());
    let key = CacheKey::new("toyota_camry", WorkspaceType::EngineFront);

    assert!(harness.service.cached(&key).await.unwrap().is_none());
    harness.service.get_or_generate(&camry(), &battery()).await.unwrap();

    let pack = harness.service.cached(&key).await.unwrap().unwrap();
    assert_eq!(pack.usage_count, 0);
    assert_eq!(harness.service.list().await.unwrap().len(), 1);
}
