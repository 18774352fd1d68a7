//! Shared fakes for integration tests
//!
//! Providers and the image host are replaced by scripted fakes that count
//! their calls, so tests can assert how many times each phase reached out.

use async_trait::async_trait;
use overlay_forge::api::{OverlayService, OverlayServiceBuilder};
use overlay_forge::hosting::{ImageHost, ImageSource};
use overlay_forge::provider::{
    ImageDatum, ImageProvider, ImageRequest, ImageResponse, ReasoningProvider, ReasoningRequest,
    ReasoningResponse, TokenUsage,
};
use overlay_forge::retry::RetryPolicy;
use overlay_forge::store::{MemoryPackStore, PackStore};
use overlay_forge::{CacheKey, OverlayError, RepairIntent, VehicleDescriptor};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const REASONING_MODEL: &str = "fake-reasoner";
pub const IMAGE_MODEL: &str = "fake-image";

/// Which reasoning request a prompt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Plan,
    AccessPath,
    Layers,
}

impl PromptKind {
    fn of(prompt: &str) -> Self {
        if prompt.contains("technical plan") {
            PromptKind::Plan
        } else if prompt.contains("approach route") {
            PromptKind::AccessPath
        } else {
            PromptKind::Layers
        }
    }
}

pub type Scripted = Result<String, OverlayError>;

/// Reasoning provider answering from per-kind scripts. Queued plan answers
/// are used first; the default plan repeats afterwards.
pub struct FakeReasoning {
    plan: Mutex<VecDeque<Scripted>>,
    default_plan: Scripted,
    access_path: Scripted,
    layers: Scripted,
    delay: Duration,
    plan_calls: AtomicUsize,
    access_calls: AtomicUsize,
    layer_calls: AtomicUsize,
}

impl FakeReasoning {
    pub fn new() -> Self {
        Self {
            plan: Mutex::new(VecDeque::new()),
            default_plan: Ok(plan_json()),
            access_path: Ok(access_path_json()),
            layers: Ok(layers_json()),
            delay: Duration::ZERO,
            plan_calls: AtomicUsize::new(0),
            access_calls: AtomicUsize::new(0),
            layer_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_plan(mut self, plan: Scripted) -> Self {
        self.default_plan = plan;
        self
    }

    pub fn with_queued_plans(self, answers: Vec<Scripted>) -> Self {
        self.plan.lock().extend(answers);
        self
    }

    pub fn with_access_path(mut self, answer: Scripted) -> Self {
        self.access_path = answer;
        self
    }

    pub fn with_layers(mut self, answer: Scripted) -> Self {
        self.layers = answer;
        self
    }

    /// Planning requests sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn plan_calls(&self) -> usize {
        self.plan_calls.load(Ordering::SeqCst)
    }

    pub fn access_calls(&self) -> usize {
        self.access_calls.load(Ordering::SeqCst)
    }

    pub fn layer_calls(&self) -> usize {
        self.layer_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningProvider for FakeReasoning {
    async fn issue(&self, request: ReasoningRequest) -> Result<ReasoningResponse, OverlayError> {
        let answer = match PromptKind::of(&request.prompt) {
            PromptKind::Plan => {
                self.plan_calls.fetch_add(1, Ordering::SeqCst);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                let queued = self.plan.lock().pop_front();
                queued.unwrap_or_else(|| self.default_plan.clone())
            }
            PromptKind::AccessPath => {
                self.access_calls.fetch_add(1, Ordering::SeqCst);
                self.access_path.clone()
            }
            PromptKind::Layers => {
                self.layer_calls.fetch_add(1, Ordering::SeqCst);
                self.layers.clone()
            }
        };
        answer.map(|text| ReasoningResponse {
            text,
            model: REASONING_MODEL.to_string(),
            usage: TokenUsage::default(),
        })
    }

    fn provider_name(&self) -> &str {
        "fake"
    }

    fn model_name(&self) -> &str {
        REASONING_MODEL
    }
}

/// Image provider returning one scripted response.
pub struct FakeImage {
    answer: Result<ImageResponse, OverlayError>,
    calls: AtomicUsize,
}

impl FakeImage {
    pub fn new() -> Self {
        Self::answering(Ok(ImageResponse {
            data: vec![ImageDatum {
                url: Some("https://provider.test/tmp/abc.png".to_string()),
                ..ImageDatum::default()
            }],
        }))
    }

    pub fn answering(answer: Result<ImageResponse, OverlayError>) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self::answering(Err(OverlayError::provider(Some(status), "image backend down")))
    }

    pub fn empty_url() -> Self {
        Self::answering(Ok(ImageResponse {
            data: vec![ImageDatum {
                url: Some(String::new()),
                ..ImageDatum::default()
            }],
        }))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for FakeImage {
    async fn issue(&self, _request: ImageRequest) -> Result<ImageResponse, OverlayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }

    fn provider_name(&self) -> &str {
        "fake"
    }

    fn model_name(&self) -> &str {
        IMAGE_MODEL
    }
}

/// Image host that re-hosts onto a stable test CDN URL.
pub struct FakeHost {
    calls: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn hosted_url(key: &CacheKey) -> String {
    format!(
        "https://cdn.test/{}/{}.png",
        key.workspace_type, key.vehicle_family
    )
}

#[async_trait]
impl ImageHost for FakeHost {
    async fn rehost(&self, _source: &ImageSource, key: &CacheKey) -> Result<String, OverlayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(hosted_url(key))
    }
}

/// Fakes plus the service wired over them.
pub struct Harness {
    pub reasoning: Arc<FakeReasoning>,
    pub image: Arc<FakeImage>,
    pub host: Arc<FakeHost>,
    pub store: Arc<dyn PackStore>,
    pub service: OverlayService,
}

impl Harness {
    pub fn new(reasoning: FakeReasoning, image: FakeImage) -> Self {
        Self::with_store(reasoning, image, Arc::new(MemoryPackStore::new()), |b| b)
    }

    pub fn with_store(
        reasoning: FakeReasoning,
        image: FakeImage,
        store: Arc<dyn PackStore>,
        configure: impl FnOnce(OverlayServiceBuilder) -> OverlayServiceBuilder,
    ) -> Self {
        let reasoning = Arc::new(reasoning);
        let image = Arc::new(image);
        let host = Arc::new(FakeHost::new());
        let builder = OverlayService::builder()
            .reasoning(reasoning.clone())
            .image(image.clone())
            .image_host(host.clone())
            .store(Arc::clone(&store))
            .retry(RetryPolicy::immediate(3));
        let service = configure(builder).build().unwrap();
        Self {
            reasoning,
            image,
            host,
            store,
            service,
        }
    }
}

pub fn camry() -> VehicleDescriptor {
    let mut vehicle = VehicleDescriptor::new(2020, "Toyota", "Camry");
    vehicle.engine = Some("2.5L I4".to_string());
    vehicle
}

pub fn battery() -> RepairIntent {
    RepairIntent::new("battery_replacement")
}

/// A well-formed plan wrapped in prose and a code fence.
pub fn plan_json() -> String {
    r##"Here is the plan you asked for:
```json
{
  "visual_brief": {
    "viewpoint": "front, hood open, eye level",
    "style": "photorealistic",
    "contrast": "high",
    "target_part": "battery",
    "part_location": "driver side, front left of the engine bay"
  },
  "layout_specifications": {
    "battery": {"position": "top-left", "size": "medium", "color": "#FF3B30", "accessibility": "easy"},
    "air_intake": {"position": "center", "size": "large", "color": "#FFCC00", "accessibility": "moderate"},
    "ground_strap": {"position": "bottom-left", "size": "small", "color": "#34C759", "accessibility": "difficult"}
  },
  "ar_hints": ["keep labels outside the engine cover"],
  "vehicle_notes": {
    "engine_layout": "transverse inline-4",
    "accessibility": "battery hold-down is under the intake duct",
    "obstacles": ["intake duct"],
    "best_viewing_angle": "front left, slightly above"
  }
}
```
Let me know if you need anything else."##
        .to_string()
}

pub fn access_path_json() -> String {
    r#"{"waypoints": [[0.1, 0.9], [0.15, 0.85], [0.2, 0.8]], "duration_ms": 1200, "stroke_width": 3.0, "dash_pattern": [6, 3]}"#
        .to_string()
}

pub fn layers_json() -> String {
    r##"{"layers": [{"label": "Engine cover", "polygon": [[0.3, 0.3], [0.7, 0.3], [0.7, 0.6], [0.3, 0.6]], "tint_color": "#3A7BD5", "cutaway_opacity": 0.4}]}"##
        .to_string()
}

pub fn server_error() -> OverlayError {
    OverlayError::provider(Some(500), "internal error")
}

pub fn rate_limited() -> OverlayError {
    OverlayError::provider(Some(429), "Rate limit exceeded, retry later")
}
