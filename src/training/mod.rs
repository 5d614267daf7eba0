//! Training orchestrator
//!
//! Owns the run lifecycle `Idle -> Running -> {Done, Aborted, Error}` and the
//! last-run record used to flag stale datasets. The fit itself runs on a
//! worker thread and is cancelled cooperatively: the abort flag is observed
//! at epoch boundaries only, epochs are atomic.

use crate::backends::{EpochSignal, ModelBackend};
use crate::features::FeatureStore;
use crate::session::{
    SessionSnapshot, SessionStore, TrainingRunRecord, TrainingStatus,
};
use crate::workflow::guards;
use crate::{ProtegeError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

pub struct TrainingOrchestrator {
    store: Arc<SessionStore>,
    model: Arc<dyn ModelBackend>,
    features: Arc<FeatureStore>,
    abort: Arc<AtomicBool>,
    /// Dataset timestamp captured at run start, shared with `abort()` so the
    /// optimistic abort record carries the same marker as the worker's.
    active_marker: Mutex<Option<DateTime<Utc>>>,
}

/// Handle to a running fit; joining waits for the worker to finish.
pub struct TrainingHandle {
    worker: JoinHandle<()>,
}

impl TrainingHandle {
    pub fn join(self) {
        let _ = self.worker.join();
    }
}

impl TrainingOrchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        model: Arc<dyn ModelBackend>,
        features: Arc<FeatureStore>,
    ) -> Self {
        Self {
            store,
            model,
            features,
            abort: Arc::new(AtomicBool::new(false)),
            active_marker: Mutex::new(None),
        }
    }

    /// Start a training run on a worker thread. Rejected while a run is in
    /// flight, and unless every class is Ready (two minimum) with at least
    /// one accumulated feature sample.
    pub fn start(&self) -> Result<TrainingHandle> {
        let snapshot = self.store.state();

        if snapshot.training.status == TrainingStatus::Running {
            return Err(ProtegeError::ResourceBusy(
                "A training run is already in progress".into(),
            ));
        }
        if !guards::can_access_training(&snapshot) {
            return Err(ProtegeError::ValidationFailure(
                "Training needs at least two classes with complete datasets".into(),
            ));
        }
        if self.features.total_examples() == 0 {
            return Err(ProtegeError::ValidationFailure(
                "No feature samples have been accumulated".into(),
            ));
        }

        let marker = snapshot.newest_dataset_update();
        let run_session = snapshot.session.as_ref().map(|s| s.id);
        *self.active_marker.lock() = marker;
        self.abort.store(false, Ordering::SeqCst);

        let class_order: Vec<Uuid> = snapshot.classes.iter().map(|c| c.id).collect();
        let (samples, labels) = self.features.training_set(&class_order);
        let params = snapshot.training.params.clone();

        self.store.set_training_status(TrainingStatus::Running, None);
        self.store.set_training_progress(0);
        info!(
            examples = samples.len(),
            classes = class_order.len(),
            epochs = params.epochs,
            "training started"
        );

        let store = Arc::clone(&self.store);
        let model = Arc::clone(&self.model);
        let abort = Arc::clone(&self.abort);

        let worker = std::thread::spawn(move || {
            // The worker only ever writes into the session it was started
            // for; a discarded or replaced session keeps its fresh defaults.
            let session_current = |store: &SessionStore| {
                store.state().session.as_ref().map(|s| s.id) == run_session
            };

            let mut on_epoch_end = |epoch: u32, total: u32| {
                let total = total.max(1);
                let progress =
                    ((epoch as f64 / total as f64) * 100.0).round() as u8;
                if session_current(&store) {
                    store.set_training_progress(progress);
                }
                if abort.load(Ordering::SeqCst) || !session_current(&store) {
                    EpochSignal::Stop
                } else {
                    EpochSignal::Continue
                }
            };

            let outcome = model.fit(&samples, &labels, &params, &mut on_epoch_end);

            match outcome {
                Ok(()) => {
                    if abort.load(Ordering::SeqCst) {
                        // abort() already wrote the Aborted status and record.
                        info!("training stopped at epoch boundary after abort");
                        return;
                    }
                    if !session_current(&store) {
                        info!("training result dropped, session no longer active");
                        return;
                    }
                    store.set_training_status(TrainingStatus::Done, None);
                    store.set_training_progress(100);
                    store.record_training_run(TrainingRunRecord {
                        status: TrainingStatus::Done,
                        completed_at: Utc::now(),
                        error: None,
                        dataset_updated_at: marker,
                    });
                    info!("training complete");
                }
                Err(e) => {
                    error!(error = %e, "training failed");
                    if !session_current(&store) {
                        return;
                    }
                    store.set_training_status(TrainingStatus::Error, Some(e.to_string()));
                    store.record_training_run(TrainingRunRecord {
                        status: TrainingStatus::Error,
                        completed_at: Utc::now(),
                        error: Some(e.to_string()),
                        dataset_updated_at: marker,
                    });
                }
            }
        });

        Ok(TrainingHandle { worker })
    }

    /// Request a cooperative stop. The status flips to Aborted immediately;
    /// the backend finishes its current epoch and then stops. Accumulated
    /// samples are untouched.
    pub fn abort(&self) {
        let snapshot = self.store.state();
        if snapshot.training.status != TrainingStatus::Running {
            return;
        }

        self.abort.store(true, Ordering::SeqCst);
        let marker = *self.active_marker.lock();
        self.store.set_training_status(TrainingStatus::Aborted, None);
        self.store.record_training_run(TrainingRunRecord {
            status: TrainingStatus::Aborted,
            completed_at: Utc::now(),
            error: None,
            dataset_updated_at: marker,
        });
        info!("training abort requested");
    }
}

/// Classes whose samples changed after the last training run. A run that
/// carried no dataset timestamp marks every class with one as stale; with no
/// run at all, nothing is stale.
pub fn stale_classes(snapshot: &SessionSnapshot) -> Vec<Uuid> {
    let Some(last_run) = &snapshot.training.last_run else {
        return Vec::new();
    };

    snapshot
        .classes
        .iter()
        .filter(|class| match (class.dataset.last_updated_at, last_run.dataset_updated_at) {
            (Some(updated), Some(run_marker)) => updated > run_marker,
            (Some(_), None) => true,
            (None, _) => false,
        })
        .map(|class| class.id)
        .collect()
}
