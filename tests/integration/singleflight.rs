//! Concurrent requests for one cache key share a single pipeline run.

use super::support::{battery, camry, FakeImage, FakeReasoning, Harness};
use overlay_forge::api::PackOrigin;
use overlay_forge::store::PackStore;
use overlay_forge::{OverlayError, RepairIntent, VehicleDescriptor};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_run_pipeline_once() {
    let harness = Arc::new(Harness::new(
        FakeReasoning::new().with_delay(Duration::from_millis(200)),
        FakeImage::new(),
    ));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let harness = Arc::clone(&harness);
        handles.push(tokio::spawn(async move {
            harness.service.get_or_generate(&camry(), &battery()).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let served = handle.await.unwrap().unwrap();
        ids.push(served.pack.id.clone());
    }

    assert_eq!(harness.reasoning.plan_calls(), 1);
    assert_eq!(harness.image.calls(), 1);
    assert_eq!(harness.host.calls(), 1);
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(harness.service.in_flight(), 0);
}

#[tokio::test]
async fn test_later_request_is_served_from_cache() {
    let harness = Harness::new(FakeReasoning::new(), FakeImage::new());

    let first = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();
    assert_eq!(first.origin, PackOrigin::Generated);
    assert!(first.stored);
    let access_calls = harness.reasoning.access_calls();
    let layer_calls = harness.reasoning.layer_calls();

    let second = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();
    assert_eq!(second.origin, PackOrigin::Cache);
    assert!(second.trace.is_empty());
    assert_eq!(second.pack.id, first.pack.id);
    assert_eq!(second.pack.usage_count, 1);
    assert_eq!(harness.reasoning.plan_calls(), 1);
    assert_eq!(harness.image.calls(), 1);
    assert_eq!(harness.host.calls(), 1);
    assert_eq!(harness.reasoning.access_calls(), access_calls);
    assert_eq!(harness.reasoning.layer_calls(), layer_calls);
}

#[tokio::test]
async fn test_trim_variants_share_a_family_pack() {
    let harness = Harness::new(FakeReasoning::new(), FakeImage::new());

    let mut xse = camry();
    xse.trim = Some("XSE".to_string());
    let a = harness.service.get_or_generate(&camry(), &battery()).await.unwrap();
    let b = harness.service.get_or_generate(&xse, &battery()).await.unwrap();

    assert_eq!(a.key, b.key);
    assert_eq!(harness.reasoning.plan_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_generate_independently() {
    let harness = Arc::new(Harness::new(
        FakeReasoning::new().with_delay(Duration::from_millis(50)),
        FakeImage::new(),
    ));

    let requests = [
        (VehicleDescriptor::new(2020, "Toyota", "Camry"), "battery_replacement"),
        (VehicleDescriptor::new(2018, "Honda", "Civic"), "battery_replacement"),
        (VehicleDescriptor::new(2020, "Toyota", "Camry"), "brake_pad_replacement"),
    ];
    let mut handles = Vec::new();
    for (vehicle, repair) in requests {
        let harness = Arc::clone(&harness);
        handles.push(tokio::spawn(async move {
            harness
                .service
                .get_or_generate(&vehicle, &RepairIntent::new(repair))
                .await
        }));
    }
    let mut keys = Vec::new();
    for handle in handles {
        keys.push(handle.await.unwrap().unwrap().key);
    }
    keys.sort();
    keys.dedup();

    assert_eq!(keys.len(), 3);
    assert_eq!(harness.reasoning.plan_calls(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deadline_releases_lock_for_every_waiter() {
    let harness = Arc::new(Harness::with_store(
        FakeReasoning::new().with_delay(Duration::from_secs(5)),
        FakeImage::new(),
        Arc::new(overlay_forge::store::MemoryPackStore::new()),
        |builder| builder.deadline(Duration::from_millis(100)),
    ));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let harness = Arc::clone(&harness);
        handles.push(tokio::spawn(async move {
            harness.service.get_or_generate(&camry(), &battery()).await
        }));
    }
    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, OverlayError::LockTimeoutError { .. }));
    }

    assert_eq!(harness.service.in_flight(), 0);
    assert!(harness.store.list().unwrap().is_empty());
}
