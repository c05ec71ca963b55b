//! Per-profile model registry.
//!
//! Each profile owns a slot that moves through
//! `Uninitialized -> Constructing -> Ready | Failed`. The first caller to
//! find a slot `Uninitialized` (or `Failed`) builds the models with the
//! slot lock released; everyone else blocks on the slot's condvar until the
//! attempt they observed finishes. A failed attempt is reported to every
//! waiter of that attempt and the next caller retries.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tryon_values::{Profile, ProfileStatus};

use crate::device::DevicePolicy;
use crate::error::{ModelCacheError, Result};
use crate::handle::{ModelFactory, ModelHandle};

/// Observable construction state of one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileState {
    Uninitialized,
    Constructing,
    Ready,
    Failed,
}

impl ProfileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Constructing => "constructing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

enum SlotState {
    Uninitialized,
    Constructing { attempt: u64 },
    Ready(Arc<ModelHandle>),
    Failed { attempt: u64, message: String },
}

struct SlotInner {
    state: SlotState,
    attempts: u64,
}

struct Slot {
    ready: OnceLock<Arc<ModelHandle>>,
    inner: Mutex<SlotInner>,
    cond: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            ready: OnceLock::new(),
            inner: Mutex::new(SlotInner {
                state: SlotState::Uninitialized,
                attempts: 0,
            }),
            cond: Condvar::new(),
        }
    }
}

/// Registry of constructed models, one slot per [`Profile`].
///
/// Owned by the application state and shared by `Arc`; there is no
/// process-wide instance.
pub struct ModelCache {
    factory: Arc<dyn ModelFactory>,
    policy: DevicePolicy,
    hd: Slot,
    dc: Slot,
}

impl ModelCache {
    pub fn new(factory: Arc<dyn ModelFactory>, policy: DevicePolicy) -> Self {
        Self {
            factory,
            policy,
            hd: Slot::new(),
            dc: Slot::new(),
        }
    }

    pub fn policy(&self) -> &DevicePolicy {
        &self.policy
    }

    fn slot(&self, profile: Profile) -> &Slot {
        match profile {
            Profile::Hd => &self.hd,
            Profile::Dc => &self.dc,
        }
    }

    /// Returns the profile's models, constructing them on first use.
    ///
    /// Concurrent callers for one profile share a single construction.
    pub fn acquire(&self, profile: Profile) -> Result<Arc<ModelHandle>> {
        let slot = self.slot(profile);
        if let Some(handle) = slot.ready.get() {
            return Ok(Arc::clone(handle));
        }

        let mut guard = slot.inner.lock();
        let mut observed: Option<u64> = None;
        loop {
            match &guard.state {
                SlotState::Ready(handle) => return Ok(Arc::clone(handle)),
                SlotState::Constructing { attempt } => {
                    observed = Some(*attempt);
                    tracing::debug!(profile = %profile, "Waiting for model construction");
                    slot.cond.wait(&mut guard);
                }
                SlotState::Failed { attempt, message } if observed == Some(*attempt) => {
                    return Err(ModelCacheError::Construction {
                        profile,
                        message: message.clone(),
                    });
                }
                SlotState::Uninitialized | SlotState::Failed { .. } => {
                    return self.construct(profile, slot, &mut guard);
                }
            }
        }
    }

    fn construct(
        &self,
        profile: Profile,
        slot: &Slot,
        guard: &mut MutexGuard<'_, SlotInner>,
    ) -> Result<Arc<ModelHandle>> {
        let attempt = guard.attempts + 1;
        guard.attempts = attempt;
        guard.state = SlotState::Constructing { attempt };

        let options = self.policy.options_for(profile);
        let outcome = MutexGuard::unlocked(guard, || {
            tracing::info!(
                profile = %profile,
                device = %options.device,
                precision = %options.precision,
                attempt,
                "Constructing models"
            );
            let started = Instant::now();
            let built = panic::catch_unwind(AssertUnwindSafe(|| {
                self.factory.build(profile, &options)
            }));
            let outcome = match built {
                Ok(Ok(handle)) => Ok(Arc::new(handle)),
                Ok(Err(err)) => Err(format!("{err:#}")),
                Err(payload) => Err(panic_message(payload.as_ref())),
            };
            match &outcome {
                Ok(_) => tracing::info!(
                    profile = %profile,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Models ready"
                ),
                Err(message) => tracing::error!(
                    profile = %profile,
                    attempt,
                    error = %message,
                    "Model construction failed"
                ),
            }
            outcome
        });

        let result = match outcome {
            Ok(handle) => {
                let _ = slot.ready.set(Arc::clone(&handle));
                guard.state = SlotState::Ready(Arc::clone(&handle));
                Ok(handle)
            }
            Err(message) => {
                guard.state = SlotState::Failed {
                    attempt,
                    message: message.clone(),
                };
                Err(ModelCacheError::Construction { profile, message })
            }
        };
        slot.cond.notify_all();
        result
    }

    /// Starts one construction thread per profile.
    pub fn preload(self: &Arc<Self>) -> Vec<JoinHandle<Result<()>>> {
        Profile::ALL
            .into_iter()
            .filter_map(|profile| {
                let cache = Arc::clone(self);
                thread::Builder::new()
                    .name(format!("preload-{}", profile))
                    .spawn(move || cache.acquire(profile).map(|_| ()))
                    .map_err(|err| {
                        tracing::error!(profile = %profile, error = %err, "Failed to spawn preload thread");
                    })
                    .ok()
            })
            .collect()
    }

    /// Blocks until every listed profile is ready.
    ///
    /// Does not start construction. Fails immediately when a profile's last
    /// attempt failed and no retry is running, and with a timeout error once
    /// `timeout` elapses. Progress is logged every `interval`.
    pub fn wait_until_ready(
        &self,
        profiles: &[Profile],
        timeout: Duration,
        interval: Duration,
    ) -> Result<()> {
        let started = Instant::now();
        let deadline = started + timeout;

        for &profile in profiles {
            let slot = self.slot(profile);
            let mut guard = slot.inner.lock();
            loop {
                match &guard.state {
                    SlotState::Ready(_) => break,
                    SlotState::Failed { message, .. } => {
                        return Err(ModelCacheError::Construction {
                            profile,
                            message: message.clone(),
                        });
                    }
                    SlotState::Uninitialized | SlotState::Constructing { .. } => {}
                }

                let now = Instant::now();
                if now >= deadline {
                    drop(guard);
                    let pending = profiles
                        .iter()
                        .copied()
                        .filter(|p| self.state(*p) != ProfileState::Ready)
                        .collect();
                    return Err(ModelCacheError::Timeout {
                        waited: started.elapsed(),
                        pending,
                    });
                }
                let wait = interval.min(deadline - now);
                if slot.cond.wait_for(&mut guard, wait).timed_out() {
                    tracing::info!(
                        profile = %profile,
                        waited_s = started.elapsed().as_secs(),
                        "Still waiting for models"
                    );
                }
            }
        }
        Ok(())
    }

    pub fn state(&self, profile: Profile) -> ProfileState {
        match self.slot(profile).inner.lock().state {
            SlotState::Uninitialized => ProfileState::Uninitialized,
            SlotState::Constructing { .. } => ProfileState::Constructing,
            SlotState::Ready(_) => ProfileState::Ready,
            SlotState::Failed { .. } => ProfileState::Failed,
        }
    }

    pub fn is_ready(&self, profile: Profile) -> bool {
        self.slot(profile).ready.get().is_some()
    }

    pub fn all_ready(&self) -> bool {
        Profile::ALL.into_iter().all(|p| self.is_ready(p))
    }

    /// Snapshot of every profile for health reports.
    pub fn status(&self) -> Vec<ProfileStatus> {
        Profile::ALL
            .into_iter()
            .map(|profile| {
                let inner = self.slot(profile).inner.lock();
                let (state, device, error) = match &inner.state {
                    SlotState::Uninitialized => (ProfileState::Uninitialized, None, None),
                    SlotState::Constructing { .. } => (
                        ProfileState::Constructing,
                        Some(self.policy.device_for(profile).to_string()),
                        None,
                    ),
                    SlotState::Ready(handle) => {
                        (ProfileState::Ready, Some(handle.device.to_string()), None)
                    }
                    SlotState::Failed { message, .. } => {
                        (ProfileState::Failed, None, Some(message.clone()))
                    }
                };
                ProfileStatus {
                    profile,
                    state: state.as_str().to_string(),
                    device,
                    error,
                }
            })
            .collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic during construction: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic during construction: {s}")
    } else {
        "panic during construction".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BuildOptions, DeviceSetting, Precision};
    use crate::stages::{HumanParser, PoseEstimator, SynthesisInput, Synthesizer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tryon_values::{ImageAsset, Keypoints, ParseMap};

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

    struct CountingFactory {
        builds: AtomicUsize,
        fail_dc: bool,
    }

    impl ModelFactory for CountingFactory {
        fn build(&self, profile: Profile, options: &BuildOptions) -> anyhow::Result<ModelHandle> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.fail_dc && profile == Profile::Dc {
                anyhow::bail!("weights missing");
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

    fn cache(fail_dc: bool) -> (Arc<CountingFactory>, ModelCache) {
        let factory = Arc::new(CountingFactory {
            builds: AtomicUsize::new(0),
            fail_dc,
        });
        let policy = DevicePolicy::new(DeviceSetting::Auto, 0, Precision::Float16);
        (factory.clone(), ModelCache::new(factory, policy))
    }

    #[test]
    fn test_acquire_builds_once() {
        let (factory, cache) = cache(false);
        assert_eq!(cache.state(Profile::Hd), ProfileState::Uninitialized);

        let first = cache.acquire(Profile::Hd).unwrap();
        let second = cache.acquire(Profile::Hd).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state(Profile::Hd), ProfileState::Ready);
        assert!(!cache.all_ready());
    }

    #[test]
    fn test_failure_is_isolated_per_profile() {
        let (_, cache) = cache(true);
        assert!(cache.acquire(Profile::Dc).is_err());
        assert!(cache.acquire(Profile::Hd).is_ok());
        assert_eq!(cache.state(Profile::Dc), ProfileState::Failed);

        let status = cache.status();
        let dc = status.iter().find(|s| s.profile == Profile::Dc).unwrap();
        assert_eq!(dc.state, "failed");
        assert!(dc.error.as_deref().unwrap().contains("weights missing"));
        let hd = status.iter().find(|s| s.profile == Profile::Hd).unwrap();
        assert_eq!(hd.device.as_deref(), Some("cpu"));
    }

    #[test]
    fn test_failed_slot_retries_on_next_acquire() {
        let (factory, cache) = cache(true);
        assert!(cache.acquire(Profile::Dc).is_err());
        assert!(cache.acquire(Profile::Dc).is_err());
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_wait_until_ready_times_out_without_preload() {
        let (_, cache) = cache(false);
        let err = cache
            .wait_until_ready(
                &[Profile::Hd],
                Duration::from_millis(30),
                Duration::from_millis(10),
            )
            .unwrap_err();
        match err {
            ModelCacheError::Timeout { pending, .. } => assert_eq!(pending, vec![Profile::Hd]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wait_until_ready_reports_failure() {
        let (_, cache) = cache(true);
        let _ = cache.acquire(Profile::Dc);
        let err = cache
            .wait_until_ready(&Profile::ALL, Duration::from_secs(5), Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, ModelCacheError::Construction { profile: Profile::Dc, .. }));
    }

    #[test]
    fn test_panicking_factory_becomes_failure() {
        struct Panics;
        impl ModelFactory for Panics {
            fn build(&self, _: Profile, _: &BuildOptions) -> anyhow::Result<ModelHandle> {
                panic!("out of memory");
            }
        }
        let cache = ModelCache::new(Arc::new(Panics), DevicePolicy::cpu_only());
        let err = cache.acquire(Profile::Hd).unwrap_err();
        assert!(err.to_string().contains("out of memory"));
        assert_eq!(cache.state(Profile::Hd), ProfileState::Failed);
    }
}
