//! End-to-end run of the full pipeline over fake providers.

use super::support::{battery, camry, hosted_url, FakeImage, FakeReasoning, Harness};
use overlay_forge::orchestrator::PipelineState;
use overlay_forge::types::{AccessibilityTier, GenerationTier, WorkspaceType};
use overlay_forge::RepairIntent;

#[tokio::test]
async fn test_full_pipeline_produces_complete_pack() {
    let harness = Harness::new(FakeReasoning::new(), FakeImage::new());

    let served = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();
    let pack = &served.pack;

    assert_eq!(served.key.to_string(), "engine_front/toyota_camry");
    assert_eq!(pack.id, served.key.pack_id());
    assert_eq!(pack.tier, GenerationTier::Full);
    assert_eq!(pack.provider_tag, "fake-reasoner+fake-image");
    assert_eq!(pack.image_url(), Some(hosted_url(&served.key).as_str()));
    assert_eq!(pack.canvas.width, 1024);
    assert_eq!(
        served.trace,
        vec![
            PipelineState::NotStarted,
            PipelineState::PlanningInFlight,
            PipelineState::ImageInFlight,
            PipelineState::GeometryInFlight,
            PipelineState::Assembling,
            PipelineState::Cached,
        ]
    );

    assert_eq!(pack.parts.len(), 3);
    let strap = &pack.parts["ground_strap"];
    assert_eq!(strap.accessibility, AccessibilityTier::Difficult);
    assert_eq!(strap.polygon.len(), 4);
    assert!(pack
        .parts
        .values()
        .flat_map(|p| p.polygon.iter())
        .all(|c| c.is_normalized()));

    assert_eq!(pack.access_paths.len(), 1);
    let path = &pack.access_paths["ground_strap"];
    assert_eq!(path.waypoints.len(), 3);
    assert_eq!(path.duration_ms, 1200);

    assert_eq!(pack.layers.len(), 1);
    assert!(pack.layers.values().all(|l| l.polygon.len() >= 3));

    assert_eq!(harness.reasoning.access_calls(), 1);
    assert_eq!(harness.reasoning.layer_calls(), 1);
}

#[tokio::test]
async fn test_missing_target_part_is_added() {
    let plan = r#"{
        "visual_brief": {"target_part": "battery", "part_location": "bottom right corner"},
        "layout_specifications": {"fuse_box": {"position": "top-right", "size": "small"}}
    }"#;
    let harness = Harness::new(
        FakeReasoning::new().with_plan(Ok(plan.to_string())),
        FakeImage::new(),
    );
    let served = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();
    assert!(served.pack.parts.contains_key("battery"));
    assert!(served.pack.parts.contains_key("fuse_box"));
}

#[tokio::test]
async fn test_explicit_workspace_overrides_resolver() {
    let harness = Harness::new(FakeReasoning::new(), FakeImage::new());
    let served = harness
        .service
        .get_or_generate_in(
            &camry(),
            WorkspaceType::Undercarriage,
            &RepairIntent::new("battery_replacement"),
        )
        .await
        .unwrap();
    assert_eq!(served.key.workspace_type, WorkspaceType::Undercarriage);
    assert_eq!(served.pack.workspace_type, WorkspaceType::Undercarriage);
}

#[tokio::test]
async fn test_auxiliary_phases_can_be_disabled() {
    let harness = Harness::with_store(
        FakeReasoning::new(),
        FakeImage::new(),
        std::sync::Arc::new(overlay_forge::store::MemoryPackStore::new()),
        |builder| {
            builder.options(overlay_forge::orchestrator::OrchestratorOptions {
                auxiliary_enabled: false,
                cache_fallback_packs: false,
            })
        },
    );
    let served = harness
        .service
        .get_or_generate(&camry(), &battery())
        .await
        .unwrap();
    assert_eq!(served.pack.tier, GenerationTier::Full);
    assert!(served.pack.access_paths.is_empty());
    assert_eq!(harness.reasoning.access_calls(), 0);
    assert_eq!(harness.reasoning.layer_calls(), 0);
}
