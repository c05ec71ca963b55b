//! Concurrent first-time construction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tryon_model_cache::{
    BuildOptions, DevicePolicy, HumanParser, ModelCache, ModelCacheError, ModelFactory,
    ModelHandle, PoseEstimator, ProfileState, SynthesisInput, Synthesizer,
};
use tryon_values::{ImageAsset, Keypoints, ParseMap, Profile};

struct Noop;

impl PoseEstimator for Noop {
    fn estimate(&self, _image: &ImageAsset) -> anyhow::Result<Keypoints> {
        Ok(Keypoints::default())
    }
}

impl HumanParser for Noop {
    fn parse(&self, image: &ImageAsset) -> anyhow::Result<ParseMap> {
        Ok(ParseMap::new(image::GrayImage::new(image.width(), image.height())))
    }
}

impl Synthesizer for Noop {
    fn synthesize(&self, _input: &SynthesisInput<'_>) -> anyhow::Result<Vec<ImageAsset>> {
        Ok(Vec::new())
    }
}

/// Slow factory whose first `failures` builds fail.
struct SlowFactory {
    builds: AtomicUsize,
    failures: usize,
    delay: Duration,
}

impl SlowFactory {
    fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            builds: AtomicUsize::new(0),
            failures,
            delay: Duration::from_millis(300),
        })
    }

    fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ModelFactory for SlowFactory {
    fn build(&self, profile: Profile, options: &BuildOptions) -> anyhow::Result<ModelHandle> {
        let n = self.builds.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        if n < self.failures {
            anyhow::bail!("attempt {} failed", n + 1);
        }
        Ok(ModelHandle {
            profile,
            device: options.device,
            precision: options.precision,
            pose: Box::new(Noop),
            parser: Box::new(Noop),
            synthesizer: Box::new(Noop),
        })
    }
}

fn acquire_concurrently(
    cache: &Arc<ModelCache>,
    profile: Profile,
    callers: usize,
) -> Vec<tryon_model_cache::Result<Arc<ModelHandle>>> {
    let barrier = Arc::new(Barrier::new(callers));
    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let cache = Arc::clone(cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.acquire(profile)
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn concurrent_first_acquire_constructs_once() {
    let factory = SlowFactory::new(0);
    let cache = Arc::new(ModelCache::new(factory.clone(), DevicePolicy::cpu_only()));

    let results = acquire_concurrently(&cache, Profile::Hd, 8);
    let handles: Vec<_> = results.into_iter().map(Result::unwrap).collect();

    assert_eq!(factory.builds(), 1);
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    assert_eq!(cache.state(Profile::Hd), ProfileState::Ready);
    assert_eq!(cache.state(Profile::Dc), ProfileState::Uninitialized);
}

#[test]
fn concurrent_waiters_share_a_failure() {
    let factory = SlowFactory::new(1);
    let cache = Arc::new(ModelCache::new(factory.clone(), DevicePolicy::cpu_only()));

    let results = acquire_concurrently(&cache, Profile::Dc, 6);
    assert_eq!(factory.builds(), 1);
    for result in results {
        match result {
            Err(ModelCacheError::Construction { profile, message }) => {
                assert_eq!(profile, Profile::Dc);
                assert!(message.contains("attempt 1 failed"));
            }
            other => panic!("expected construction failure, got {other:?}"),
        }
    }

    // Next caller retries and succeeds.
    let handle = cache.acquire(Profile::Dc).unwrap();
    assert_eq!(handle.profile, Profile::Dc);
    assert_eq!(factory.builds(), 2);
}

#[test]
fn preload_builds_every_profile() {
    let factory = SlowFactory::new(0);
    let cache = Arc::new(ModelCache::new(factory.clone(), DevicePolicy::cpu_only()));

    let threads = cache.preload();
    cache
        .wait_until_ready(&Profile::ALL, Duration::from_secs(10), Duration::from_millis(20))
        .unwrap();
    for thread in threads {
        thread.join().unwrap().unwrap();
    }

    assert!(cache.all_ready());
    assert_eq!(factory.builds(), 2);
    assert!(cache.status().iter().all(|s| s.state == "ready"));
}
