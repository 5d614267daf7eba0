//! Inference loop controller
//!
//! Runs a continuous predict loop against a live video source. The loop is
//! tick-driven and self-terminates as soon as the inference status drifts
//! away from Running (a `stop()` call or an error recorded elsewhere).
//! Predictions are committed to the snapshot at most once per
//! `min_update_interval`; the predict itself still runs every tick.

use crate::backends::{ModelBackend, StreamHandle};
use crate::session::{InferenceStatus, Prediction, SessionStore};
use crate::workflow::guards;
use crate::{ProtegeError, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of one predict-loop step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceTick {
    /// A prediction was committed to the snapshot
    Predicted,
    /// Predict ran, but the commit was clamped by the update interval
    Throttled,
    /// Status is no longer Running; the loop must end
    Stopped,
    /// Predict failed; status is Error and the loop must end
    Failed,
}

pub struct InferenceController {
    store: Arc<SessionStore>,
    model: Arc<dyn ModelBackend>,
    /// Minimum interval between committed prediction updates
    min_update_interval: Duration,
    /// Sleep between ticks in the blocking loop (one display refresh)
    frame_interval: Duration,
    source: Mutex<Option<StreamHandle>>,
    last_commit: Mutex<Option<Instant>>,
}

impl InferenceController {
    pub fn new(store: Arc<SessionStore>, model: Arc<dyn ModelBackend>) -> Self {
        Self {
            store,
            model,
            min_update_interval: Duration::from_millis(200),
            frame_interval: Duration::from_millis(16),
            source: Mutex::new(None),
            last_commit: Mutex::new(None),
        }
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.min_update_interval = interval;
        self
    }

    /// Bind the loop to a live video source and flip status to Running.
    /// Rejected without a usable classifier or while already running.
    pub fn start(&self, source: StreamHandle) -> Result<()> {
        let snapshot = self.store.state();
        if snapshot.inference.status == InferenceStatus::Running {
            return Err(ProtegeError::ResourceBusy(
                "Inference is already running".into(),
            ));
        }
        if !guards::can_start_inference(&snapshot) {
            return Err(ProtegeError::ValidationFailure(
                "No trained classifier is available".into(),
            ));
        }

        *self.source.lock() = Some(source);
        *self.last_commit.lock() = None;
        self.store
            .set_inference_status(InferenceStatus::Running, None);
        info!("inference started");
        Ok(())
    }

    /// One predict step. The host drives this once per display refresh.
    pub fn tick(&self) -> InferenceTick {
        let snapshot = self.store.state();
        if snapshot.inference.status != InferenceStatus::Running {
            return InferenceTick::Stopped;
        }
        let Some(source) = *self.source.lock() else {
            return InferenceTick::Stopped;
        };

        let output = self
            .model
            .embed(source)
            .and_then(|embedding| self.model.predict(&embedding));
        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "predict failed, stopping loop");
                self.store
                    .set_inference_status(InferenceStatus::Error, Some(e.to_string()));
                self.source.lock().take();
                return InferenceTick::Failed;
            }
        };

        let mut last_commit = self.last_commit.lock();
        let now = Instant::now();
        let due = last_commit
            .map(|at| now.duration_since(at) >= self.min_update_interval)
            .unwrap_or(true);
        if !due {
            return InferenceTick::Throttled;
        }
        *last_commit = Some(now);
        drop(last_commit);

        self.store.set_last_prediction(Some(Prediction {
            values: output.values,
            best_index: output.best_index,
            updated_at: Utc::now(),
        }));
        InferenceTick::Predicted
    }

    /// Blocking loop: tick once per frame until the loop self-terminates.
    pub fn run(&self) {
        loop {
            match self.tick() {
                InferenceTick::Predicted | InferenceTick::Throttled => {
                    thread::sleep(self.frame_interval);
                }
                InferenceTick::Stopped | InferenceTick::Failed => return,
            }
        }
    }

    /// Cancel the loop. Clears the last prediction; idempotent when the loop
    /// is not running.
    pub fn stop(&self) {
        let snapshot = self.store.state();
        if snapshot.inference.status != InferenceStatus::Running {
            debug!("stop ignored, inference not running");
            return;
        }
        self.source.lock().take();
        self.store
            .set_inference_status(InferenceStatus::Stopped, None);
        self.store.set_last_prediction(None);
        info!("inference stopped");
    }
}
