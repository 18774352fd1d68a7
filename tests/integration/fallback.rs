//! Degraded tiers: plan-only and static packs, and validation rejection.

use super::support::{
    battery, camry, rate_limited, server_error, FakeImage, FakeReasoning, Harness,
};
use overlay_forge::geometry::find_violations;
use overlay_forge::orchestrator::{OrchestratorOptions, PipelineState};
use overlay_forge::store::{MemoryPackStore, PackStore};
use overlay_forge::types::GenerationTier;
use overlay_forge::OverlayError;
use std::sync::Arc;

#[tokio::test]
async fn test_planning_failure_falls_back_to_static() {
    let harness = Harness::new(
        FakeReasoning::new().with_plan(Err(server_error())),
        FakeImage::new(),
    );

    let served = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();

    assert_eq!(served.pack.tier, GenerationTier::Static);
    assert_eq!(
        served.trace,
        vec![
            PipelineState::NotStarted,
            PipelineState::PlanningInFlight,
            PipelineState::FailedFallbackToStatic,
        ]
    );
    assert_eq!(served.pack.parts.len(), 1);
    assert!(served.pack.parts.contains_key("battery"));
    assert!(served.pack.vector_scene().is_some());
    assert_eq!(served.pack.provider_tag, "static");
    assert_eq!(harness.image.calls(), 0);
    assert!(!served.stored);
    assert!(harness.store.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_unparseable_plan_falls_back_to_static() {
    let harness = Harness::new(
        FakeReasoning::new().with_plan(Ok("I cannot help with that.".to_string())),
        FakeImage::new(),
    );
    let served = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();
    assert_eq!(served.pack.tier, GenerationTier::Static);
}

#[tokio::test]
async fn test_image_failure_falls_back_to_plan_only() {
    let harness = Harness::new(FakeReasoning::new(), FakeImage::failing(503));

    let served = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();

    assert_eq!(served.pack.tier, GenerationTier::PlanOnly);
    assert_eq!(
        served.trace.last(),
        Some(&PipelineState::FailedFallbackToVectorOnly)
    );
    assert!(!served.trace.contains(&PipelineState::GeometryInFlight));
    let scene = served.pack.vector_scene().unwrap();
    assert_eq!(scene.shapes.len(), served.pack.parts.len() + 1);
    assert!(served.pack.parts.contains_key("air_intake"));
    assert!(served.pack.access_paths.is_empty());
    assert_eq!(served.pack.provider_tag, "fake-reasoner");
    assert_eq!(harness.reasoning.access_calls(), 0);
}

#[tokio::test]
async fn test_empty_image_url_is_not_accepted() {
    let harness = Harness::new(FakeReasoning::new(), FakeImage::empty_url());
    let served = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();
    assert_eq!(served.pack.tier, GenerationTier::PlanOnly);
    assert!(served.pack.image_url().is_none());
    assert_eq!(harness.host.calls(), 0);
}

#[tokio::test]
async fn test_fallback_packs_cached_when_enabled() {
    let harness = Harness::with_store(
        FakeReasoning::new().with_plan(Err(server_error())),
        FakeImage::new(),
        Arc::new(MemoryPackStore::new()),
        |builder| {
            builder.options(OrchestratorOptions {
                auxiliary_enabled: true,
                cache_fallback_packs: true,
            })
        },
    );
    let served = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();
    assert!(served.stored);
    assert_eq!(harness.store.list().unwrap().len(), 1);
}

#[tokio::test]
async fn test_auxiliary_failures_keep_full_tier() {
    let harness = Harness::new(
        FakeReasoning::new()
            .with_access_path(Err(server_error()))
            .with_layers(Ok("no json here".to_string())),
        FakeImage::new(),
    );
    let served = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();

    assert_eq!(served.pack.tier, GenerationTier::Full);
    assert!(served.pack.access_paths.is_empty());
    assert!(served.pack.layers.is_empty());
    assert!(served.stored);
}

#[tokio::test]
async fn test_rate_limited_planning_is_retried() {
    let harness = Harness::new(
        FakeReasoning::new().with_queued_plans(vec![Err(rate_limited()), Err(rate_limited())]),
        FakeImage::new(),
    );
    let served = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();
    assert_eq!(served.pack.tier, GenerationTier::Full);
    assert_eq!(harness.reasoning.plan_calls(), 3);
}

#[tokio::test]
async fn test_other_provider_errors_are_not_retried() {
    let harness = Harness::new(
        FakeReasoning::new().with_queued_plans(vec![Err(server_error())]),
        FakeImage::new(),
    );
    let served = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();
    assert_eq!(served.pack.tier, GenerationTier::Static);
    assert_eq!(harness.reasoning.plan_calls(), 1);
}

#[tokio::test]
async fn test_out_of_range_geometry_is_rejected_and_not_stored() {
    let plan = r#"{
        "visual_brief": {"target_part": "battery", "part_location": "front left"},
        "layout_specifications": {
            "battery": {"polygon": [[0.1, 0.1], [1.2, 0.1], [1.2, 0.4], [0.1, 0.4]]}
        }
    }"#;
    let harness = Harness::new(
        FakeReasoning::new().with_plan(Ok(plan.to_string())),
        FakeImage::new(),
    );

    let err = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap_err();

    assert!(matches!(err, OverlayError::ValidationError(_)));
    assert!(harness.store.list().unwrap().is_empty());
    assert_eq!(harness.service.in_flight(), 0);
}

#[tokio::test]
async fn test_every_tier_passes_validation() {
    for harness in [
        Harness::new(FakeReasoning::new(), FakeImage::new()),
        Harness::new(FakeReasoning::new(), FakeImage::failing(500)),
        Harness::new(FakeReasoning::new().with_plan(Err(server_error())), FakeImage::new()),
    ] {
        let served = harness
            .service
            .get_or_generate(&camry(), &battery())
            .await
            .unwrap();
        assert!(find_violations(&served.pack).is_empty());
        assert!(served.trace.last().unwrap().is_terminal());
    }
}
