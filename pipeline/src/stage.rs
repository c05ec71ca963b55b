//! Stage wrapper and observer hooks.

use std::time::{Duration, Instant};

use common::{StageFailure, TryOnError};
use tryon_values::{PipelineState, Stage, StageTiming};

/// How a stage ended, as seen by a [`StageObserver`].
#[derive(Debug, Clone, Copy)]
pub enum StageOutcome<'a> {
    Completed,
    Failed(&'a TryOnError),
}

/// Enter/exit hooks around every stage.
pub trait StageObserver: Send + Sync {
    fn on_enter(&self, request_id: &str, stage: Stage);
    fn on_exit(&self, request_id: &str, stage: Stage, elapsed: Duration, outcome: StageOutcome<'_>);
}

/// Logs stage transitions through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn on_enter(&self, request_id: &str, stage: Stage) {
        tracing::debug!(request_id, stage = %stage, "Stage started");
    }

    fn on_exit(&self, request_id: &str, stage: Stage, elapsed: Duration, outcome: StageOutcome<'_>) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match outcome {
            StageOutcome::Completed => {
                tracing::info!(request_id, stage = %stage, elapsed_ms, "Stage completed")
            }
            StageOutcome::Failed(error) => tracing::warn!(
                request_id,
                stage = %stage,
                elapsed_ms,
                kind = %error.kind(),
                "Stage failed"
            ),
        }
    }
}

/// Per-request bookkeeping carried through the stages.
pub struct RunContext<'a> {
    pub request_id: &'a str,
    started: Instant,
    state: PipelineState,
    timings: Vec<StageTiming>,
    observer: &'a dyn StageObserver,
}

impl<'a> RunContext<'a> {
    pub fn new(request_id: &'a str, observer: &'a dyn StageObserver) -> Self {
        Self {
            request_id,
            started: Instant::now(),
            state: PipelineState::Running(Stage::Validating),
            timings: Vec::with_capacity(Stage::ORDER.len()),
            observer,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn timings(&self) -> &[StageTiming] {
        &self.timings
    }

    /// Marks the run `Done` and hands back the stage timings.
    pub fn finish(mut self) -> (Vec<StageTiming>, Duration) {
        self.state = PipelineState::Done;
        tracing::debug!(request_id = self.request_id, state = ?self.state, "Pipeline finished");
        (self.timings, self.started.elapsed())
    }

    /// Runs one stage.
    ///
    /// Times the body, calls the observer on entry and exit, and on failure
    /// classifies the error, tags it with `stage` and moves the run to
    /// `Errored`.
    pub fn run_stage<T>(
        &mut self,
        stage: Stage,
        body: impl FnOnce() -> anyhow::Result<T>,
    ) -> Result<T, StageFailure> {
        self.state = PipelineState::Running(stage);
        self.observer.on_enter(self.request_id, stage);

        let stage_started = Instant::now();
        let outcome = body();
        let elapsed = stage_started.elapsed();

        match outcome {
            Ok(value) => {
                self.observer
                    .on_exit(self.request_id, stage, elapsed, StageOutcome::Completed);
                self.timings.push(StageTiming {
                    stage,
                    seconds: elapsed.as_secs_f64(),
                });
                Ok(value)
            }
            Err(err) => {
                let error = TryOnError::classify(stage, err);
                self.observer
                    .on_exit(self.request_id, stage, elapsed, StageOutcome::Failed(&error));
                self.state = PipelineState::Errored { at: stage };
                Err(StageFailure::at(stage, self.started.elapsed(), error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tryon_values::ErrorKind;

    #[test]
    fn test_successful_stage_is_timed() {
        let observer = TracingObserver;
        let mut ctx = RunContext::new("req", &observer);
        let value = ctx.run_stage(Stage::Parsing, || Ok(7)).unwrap();
        assert_eq!(value, 7);
        assert_eq!(ctx.timings().len(), 1);
        assert_eq!(ctx.timings()[0].stage, Stage::Parsing);
        assert_eq!(ctx.state(), PipelineState::Running(Stage::Parsing));
    }

    #[test]
    fn test_opaque_failure_becomes_processing_at_stage() {
        let observer = TracingObserver;
        let mut ctx = RunContext::new("req", &observer);
        let failure = ctx
            .run_stage(Stage::PoseEstimating, || -> anyhow::Result<()> {
                anyhow::bail!("cuda kernel crashed")
            })
            .unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::Processing);
        assert_eq!(failure.stage, Some(Stage::PoseEstimating));
        assert_eq!(ctx.state(), PipelineState::Errored { at: Stage::PoseEstimating });
        assert!(ctx.timings().is_empty());
    }

    #[test]
    fn test_classified_failure_keeps_its_kind() {
        let observer = TracingObserver;
        let mut ctx = RunContext::new("req", &observer);
        let failure = ctx
            .run_stage(Stage::Loading, || -> anyhow::Result<()> {
                Err(TryOnError::model_load("tryon-dc", "weights missing").into())
            })
            .unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::ModelLoad);
        assert_eq!(failure.stage, Some(Stage::Loading));
    }
}
