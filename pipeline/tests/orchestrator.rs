//! End-to-end runs over the reference backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use tempfile::TempDir;
use tryon_artifacts::ArtifactStore;
use tryon_model_cache::{
    BuildOptions, DevicePolicy, ModelCache, ModelFactory, ModelHandle, SynthesisInput, Synthesizer,
};
use tryon_pipeline::reference::{ReferenceModelFactory, ReferenceSegmenter};
use tryon_pipeline::{MaskCompositor, PipelineOrchestrator, StageObserver, StageOutcome};
use tryon_validation::ValidationEngine;
use tryon_values::{
    CategoryInput, ErrorKind, ImageAsset, ProcessRequest, Profile, Stage, UploadedImage, Uploads,
};

fn png(width: u32, height: u32, colour: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(colour));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn upload(name: &str, colour: [u8; 3]) -> UploadedImage {
    UploadedImage::new(name, Some("image/png".to_string()), png(256, 256, colour))
}

fn uploads() -> Uploads {
    Uploads {
        model_image: Some(upload("model.png", [90, 60, 40])),
        cloth_image: Some(upload("cloth.png", [200, 10, 10])),
    }
}

fn request(profile: &str, category: i64, samples: i64) -> ProcessRequest {
    ProcessRequest {
        profile: Some(profile.to_string()),
        category: Some(CategoryInput::Index(category)),
        samples: Some(samples),
        steps: Some(2),
        ..Default::default()
    }
}

/// Reference stages with a synthesizer that returns a fixed count.
struct FixedCount(usize);

impl Synthesizer for FixedCount {
    fn synthesize(&self, input: &SynthesisInput<'_>) -> anyhow::Result<Vec<ImageAsset>> {
        Ok(vec![input.masked.clone(); self.0])
    }
}

struct TestFactory {
    builds: AtomicUsize,
    fixed_count: Option<usize>,
}

impl TestFactory {
    fn new(fixed_count: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            builds: AtomicUsize::new(0),
            fixed_count,
        })
    }
}

impl ModelFactory for TestFactory {
    fn build(&self, profile: Profile, options: &BuildOptions) -> anyhow::Result<ModelHandle> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let mut handle = ReferenceModelFactory.build(profile, options)?;
        if let Some(count) = self.fixed_count {
            handle.synthesizer = Box::new(FixedCount(count));
        }
        Ok(handle)
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<(Stage, Option<ErrorKind>)>>,
    entered: Mutex<Vec<Stage>>,
}

impl StageObserver for RecordingObserver {
    fn on_enter(&self, _request_id: &str, stage: Stage) {
        self.entered.lock().push(stage);
    }

    fn on_exit(&self, _request_id: &str, stage: Stage, _elapsed: Duration, outcome: StageOutcome<'_>) {
        let kind = match outcome {
            StageOutcome::Completed => None,
            StageOutcome::Failed(error) => Some(error.kind()),
        };
        self.events.lock().push((stage, kind));
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<ArtifactStore>,
    factory: Arc<TestFactory>,
    observer: Arc<RecordingObserver>,
    orchestrator: PipelineOrchestrator,
}

fn harness(fixed_count: Option<usize>) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        ArtifactStore::new(dir.path().join("temp"), dir.path().join("outputs")).unwrap(),
    );
    let factory = TestFactory::new(fixed_count);
    let cache = Arc::new(ModelCache::new(factory.clone(), DevicePolicy::cpu_only()));
    let observer = Arc::new(RecordingObserver::default());
    let orchestrator = PipelineOrchestrator::new(
        ValidationEngine::default(),
        store.clone(),
        cache,
        MaskCompositor::new(Arc::new(ReferenceSegmenter)),
    )
    .with_observer(observer.clone());

    Harness {
        _dir: dir,
        store,
        factory,
        observer,
        orchestrator,
    }
}

fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn valid_hd_request_produces_one_output() {
    let h = harness(None);
    let result = h
        .orchestrator
        .run("req000000001", &request("hd", 0, 1), &uploads())
        .unwrap();

    assert_eq!(result.output_paths.len(), 1);
    assert!(result.elapsed > Duration::ZERO);
    assert!(result.output_paths[0].is_file());
    let name = result.output_paths[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("result_"));
    assert!(name.ends_with("_req000000001_0.png"));

    let output = ImageAsset::open(&result.output_paths[0]).unwrap();
    assert_eq!(output.dimensions(), (768, 1024));

    let stages: Vec<Stage> = result.timings.iter().map(|t| t.stage).collect();
    assert_eq!(stages, Stage::ORDER.to_vec());

    // Ephemeral inputs are gone, outputs stay.
    assert_eq!(file_count(h.store.uploads_dir()), 0);
    assert_eq!(file_count(h.store.results_dir()), 1);
}

#[test]
fn outputs_are_persisted_in_synthesizer_order() {
    let h = harness(None);
    let result = h
        .orchestrator
        .run("orderedreq01", &request("dc", 2, 3), &uploads())
        .unwrap();

    assert_eq!(result.output_paths.len(), 3);
    for (index, path) in result.output_paths.iter().enumerate() {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with(&format!("_{}.png", index)), "{name}");
    }
}

#[test]
fn unknown_category_fails_validation() {
    let h = harness(None);
    let failure = h
        .orchestrator
        .run("req", &request("dc", 5, 1), &uploads())
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Validation);
    assert_eq!(failure.stage, Some(Stage::Validating));
    let fields = failure.error.field_errors().unwrap();
    assert!(fields.iter().any(|f| f.field == "category"));
}

#[test]
fn hd_with_lower_category_never_touches_models() {
    let h = harness(None);
    let failure = h
        .orchestrator
        .run("req", &request("hd", 1, 1), &uploads())
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Validation);
    assert_eq!(h.factory.builds.load(Ordering::SeqCst), 0);
    assert_eq!(*h.observer.entered.lock(), vec![Stage::Validating]);
}

#[test]
fn missing_cloth_image_fails_before_anything_is_written() {
    let h = harness(None);
    let mut uploads = uploads();
    uploads.cloth_image = None;

    let failure = h
        .orchestrator
        .run("req", &request("hd", 0, 1), &uploads)
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Validation);
    assert!(failure
        .error
        .field_errors()
        .unwrap()
        .iter()
        .any(|f| f.field == "clothImage"));
    assert_eq!(file_count(h.store.uploads_dir()), 0);
    assert_eq!(file_count(h.store.results_dir()), 0);
}

#[test]
fn sample_count_mismatch_is_a_synthesis_failure() {
    let h = harness(Some(2));
    let failure = h
        .orchestrator
        .run("req", &request("dc", 1, 3), &uploads())
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Processing);
    assert_eq!(failure.stage, Some(Stage::Synthesizing));
    assert!(failure.to_string().contains("Synthesizing"));
    assert_eq!(file_count(h.store.results_dir()), 0);
    assert_eq!(file_count(h.store.uploads_dir()), 0);

    let events = h.observer.events.lock();
    assert_eq!(
        events.last(),
        Some(&(Stage::Synthesizing, Some(ErrorKind::Processing)))
    );
    assert!(events[..events.len() - 1].iter().all(|(_, kind)| kind.is_none()));
}

#[test]
fn model_construction_failure_is_reported_at_loading() {
    struct Broken;
    impl ModelFactory for Broken {
        fn build(&self, _: Profile, _: &BuildOptions) -> anyhow::Result<ModelHandle> {
            anyhow::bail!("checkpoint not found")
        }
    }

    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        ArtifactStore::new(dir.path().join("temp"), dir.path().join("outputs")).unwrap(),
    );
    let cache = Arc::new(ModelCache::new(Arc::new(Broken), DevicePolicy::cpu_only()));
    let orchestrator = PipelineOrchestrator::new(
        ValidationEngine::default(),
        store.clone(),
        cache,
        MaskCompositor::new(Arc::new(ReferenceSegmenter)),
    );

    let failure = orchestrator
        .run("req", &request("hd", 0, 1), &uploads())
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::ModelLoad);
    assert_eq!(failure.stage, Some(Stage::Loading));
    assert_eq!(file_count(store.uploads_dir()), 0);
}

#[test]
fn concurrent_requests_share_one_construction() {
    let h = Arc::new(harness(None));
    let threads: Vec<_> = (0..4)
        .map(|i| {
            let h = Arc::clone(&h);
            std::thread::spawn(move || {
                h.orchestrator
                    .run(&format!("concurrent{:02}", i), &request("hd", 0, 1), &uploads())
                    .map(|r| r.output_paths)
            })
        })
        .collect();

    let mut names = std::collections::HashSet::new();
    for thread in threads {
        for path in thread.join().unwrap().unwrap() {
            assert!(names.insert(path));
        }
    }
    assert_eq!(names.len(), 4);
    assert_eq!(h.factory.builds.load(Ordering::SeqCst), 1);
}

/// Occupies the partial path of one output index with a directory as the
/// Persisting stage starts, so that write fails while earlier ones succeed.
struct BlockOutput {
    results_dir: std::path::PathBuf,
    index: usize,
}

impl StageObserver for BlockOutput {
    fn on_enter(&self, request_id: &str, stage: Stage) {
        if stage != Stage::Persisting {
            return;
        }
        let now = chrono::Utc::now();
        for offset in -1..=3 {
            let at = now + chrono::Duration::seconds(offset);
            let name = format!(
                ".result_{}_{}_{}.png.partial",
                at.format("%Y%m%d_%H%M%S"),
                request_id,
                self.index
            );
            std::fs::create_dir_all(self.results_dir.join(name)).unwrap();
        }
    }

    fn on_exit(&self, _: &str, _: Stage, _: Duration, _: StageOutcome<'_>) {}
}

#[test]
fn failed_persist_removes_earlier_outputs() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        ArtifactStore::new(dir.path().join("temp"), dir.path().join("outputs")).unwrap(),
    );
    let cache = Arc::new(ModelCache::new(TestFactory::new(None), DevicePolicy::cpu_only()));
    let orchestrator = PipelineOrchestrator::new(
        ValidationEngine::default(),
        store.clone(),
        cache,
        MaskCompositor::new(Arc::new(ReferenceSegmenter)),
    )
    .with_observer(Arc::new(BlockOutput {
        results_dir: store.results_dir().to_path_buf(),
        index: 1,
    }));

    let failure = orchestrator
        .run("persistfail1", &request("dc", 0, 3), &uploads())
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Resource);
    assert_eq!(failure.stage, Some(Stage::Persisting));

    let results: Vec<String> = std::fs::read_dir(store.results_dir())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("result_"))
        .collect();
    assert!(results.is_empty(), "left behind: {results:?}");
    assert_eq!(file_count(store.uploads_dir()), 0);
    assert_eq!(file_count(store.processed_dir()), 0);
}
