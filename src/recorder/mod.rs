//! Dataset recorder orchestrator
//!
//! Drives one class's sample collection at a time. The active-recorder token
//! (`Mutex<Option<ActiveRecording>>`) is the mutual-exclusion marker: at most
//! one class may be in Countdown or Recording across the whole session, and
//! a second `start_recording` fails fast without touching state.
//!
//! The sampling loop is tick-driven: the host calls [`RecorderOrchestrator::tick`]
//! at the configured cadence (or uses the blocking [`RecorderOrchestrator::run`]),
//! and every tick re-checks liveness before capturing, so pre-emption and a
//! concurrently started training run cancel the loop cooperatively.

pub mod config;

pub use config::RecorderConfig;

use crate::backends::{
    CaptureBackend, ConfirmRequest, ModelBackend, Notice, StreamConstraints, StreamHandle,
    UserPrompts,
};
use crate::features::FeatureStore;
use crate::session::{
    ClassEntry, DatasetStatus, InputModality, Sample, SessionStore, TaskModel, TrainingStatus,
};
use crate::workflow::guards;
use crate::{ProtegeError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of one sampling-loop step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Countdown tick consumed; capture has not started yet
    CountingDown,
    /// One sample captured; dataset not full yet
    Captured { recorded: usize },
    /// Dataset reached its expected count and was marked Ready
    Completed,
    /// Token no longer owned by this class (stopped, pre-empted, or training
    /// started); the loop must end
    PreEmpted,
    /// Capture failed; dataset status is Error and the loop must end
    Failed,
}

struct ActiveRecording {
    class_id: Uuid,
    stream: StreamHandle,
    countdown_remaining: u32,
}

pub struct RecorderOrchestrator {
    store: Arc<SessionStore>,
    capture: Arc<dyn CaptureBackend>,
    model: Arc<dyn ModelBackend>,
    prompts: Arc<dyn UserPrompts>,
    features: Arc<FeatureStore>,
    config: RecorderConfig,
    active: Mutex<Option<ActiveRecording>>,
}

impl RecorderOrchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        capture: Arc<dyn CaptureBackend>,
        model: Arc<dyn ModelBackend>,
        prompts: Arc<dyn UserPrompts>,
        features: Arc<FeatureStore>,
        config: RecorderConfig,
    ) -> Self {
        Self {
            store,
            capture,
            model,
            prompts,
            features,
            config,
            active: Mutex::new(None),
        }
    }

    /// Class id currently holding the active-recorder token
    pub fn active_class(&self) -> Option<Uuid> {
        self.active.lock().as_ref().map(|rec| rec.class_id)
    }

    // ---- session lifecycle ----

    /// Start a fresh session for a task. Any active recording is stopped and
    /// every accumulated feature tensor is dropped with the old snapshot.
    pub fn start_session(&self, task: TaskModel) {
        self.abandon_current();
        self.store.start_session(task);
    }

    /// Discard the current session: stop recording, drop all feature
    /// tensors and reset the snapshot to its defaults.
    pub fn discard_session(&self) {
        self.abandon_current();
        self.store.discard_session();
    }

    fn abandon_current(&self) {
        if let Some(class_id) = self.active_class() {
            self.stop_recording(class_id);
        }
        self.features.clear_all();
    }

    // ---- class management ----

    /// Add a class with an empty dataset. Names are trimmed and must be
    /// non-empty and case-insensitively unique among siblings.
    pub fn add_class(&self, name: &str) -> Result<Uuid> {
        let name = self.validate_name(name, None)?;
        let entry = ClassEntry::new(name.clone(), self.config.expected_samples);
        let id = entry.id;
        self.store.add_class(entry);
        info!(class = %name, "class added");
        Ok(id)
    }

    pub fn rename_class(&self, class_id: Uuid, name: &str) -> Result<()> {
        let snapshot = self.store.state();
        if snapshot.class(class_id).is_none() {
            return Err(ProtegeError::ValidationFailure("Unknown class".into()));
        }
        let name = self.validate_name(name, Some(class_id))?;
        self.store.set_class_name(class_id, name);
        Ok(())
    }

    /// Remove a class and everything recorded for it. Requires confirmation;
    /// declined returns `Ok(false)`.
    pub fn remove_class(&self, class_id: Uuid) -> Result<bool> {
        let snapshot = self.store.state();
        let class = snapshot
            .class(class_id)
            .ok_or_else(|| ProtegeError::ValidationFailure("Unknown class".into()))?;
        if !guards::can_discard_class(&snapshot) {
            return Err(ProtegeError::ResourceBusy(
                "Cannot remove a class while training is running".into(),
            ));
        }
        if self.active_class() == Some(class_id) {
            return Err(ProtegeError::ResourceBusy(
                "Stop recording before removing this class".into(),
            ));
        }

        let request = ConfirmRequest::destructive(
            format!("Remove \"{}\"?", class.name),
            "The class and all of its samples will be deleted.",
        );
        if !self.prompts.confirm(&request) {
            return Ok(false);
        }

        self.features.clear_class(class_id);
        self.store.remove_class(class_id);
        info!(class = %class.name, "class removed");
        Ok(true)
    }

    // ---- recording lifecycle ----

    /// Claim the active-recorder token and open a capture stream for this
    /// class. Fails fast, with no state change, when another recorder is
    /// active or training is running.
    pub fn start_recording(&self, class_id: Uuid) -> Result<()> {
        let snapshot = self.store.state();

        if snapshot.training.status == TrainingStatus::Running {
            return Err(ProtegeError::ResourceBusy(
                "Recording is unavailable while training runs".into(),
            ));
        }
        let class = snapshot
            .class(class_id)
            .ok_or_else(|| ProtegeError::ValidationFailure("Unknown class".into()))?;
        if class.dataset.is_ready() {
            return Err(ProtegeError::ValidationFailure(format!(
                "\"{}\" already has a complete dataset",
                class.name
            )));
        }
        let modality = snapshot
            .task
            .as_ref()
            .map(|t| t.input_modality)
            .ok_or_else(|| ProtegeError::ValidationFailure("No task selected".into()))?;

        let mut active = self.active.lock();
        if let Some(current) = active.as_ref() {
            return Err(ProtegeError::ResourceBusy(format!(
                "Another class is already recording ({})",
                current.class_id
            )));
        }

        let constraints = StreamConstraints::for_modality(modality);
        let stream = match modality {
            InputModality::Camera => self.capture.acquire_video(&constraints),
            InputModality::Microphone => self.capture.acquire_audio(&constraints),
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                drop(active);
                return Err(self.handle_acquire_failure(class_id, modality, e));
            }
        };

        *active = Some(ActiveRecording {
            class_id,
            stream,
            countdown_remaining: self.config.countdown_ticks,
        });
        drop(active);

        let initial = if self.config.countdown_ticks > 0 {
            DatasetStatus::Countdown
        } else {
            DatasetStatus::Recording
        };
        self.store.update_dataset_status(class_id, initial, None);
        self.store.set_permission_state(
            modality,
            crate::session::PermissionStatus::Granted,
            None,
        );
        info!(%class_id, ?modality, "recording started");
        Ok(())
    }

    /// One sampling-loop step. The host drives this at the modality cadence.
    pub fn tick(&self, class_id: Uuid) -> TickOutcome {
        let snapshot = self.store.state();

        let mut guard = self.active.lock();
        let Some(mut rec) = guard.take() else {
            return TickOutcome::PreEmpted;
        };
        if rec.class_id != class_id {
            *guard = Some(rec);
            return TickOutcome::PreEmpted;
        }
        if snapshot.training.status == TrainingStatus::Running {
            // Training pre-empts recording; park the dataset as-is.
            drop(guard);
            self.capture.release(rec.stream);
            self.settle_status(class_id);
            debug!(%class_id, "recording pre-empted by training");
            return TickOutcome::PreEmpted;
        }
        if rec.countdown_remaining > 0 {
            rec.countdown_remaining -= 1;
            let countdown_done = rec.countdown_remaining == 0;
            *guard = Some(rec);
            drop(guard);
            if countdown_done {
                self.store
                    .update_dataset_status(class_id, DatasetStatus::Recording, None);
            }
            return TickOutcome::CountingDown;
        }
        let stream = rec.stream;
        *guard = Some(rec);
        drop(guard);

        let embedding = match self.model.embed(stream) {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(%class_id, error = %e, "capture failed mid-loop");
                self.release_token();
                self.capture.release(stream);
                self.store.update_dataset_status(
                    class_id,
                    DatasetStatus::Error,
                    Some(e.to_string()),
                );
                return TickOutcome::Failed;
            }
        };

        let modality = stream.modality;
        let mut sample = Sample::new(modality);
        if let Some(duration_ms) = self.config.sample_duration_ms(modality) {
            sample = sample.with_duration_ms(duration_ms);
        }
        self.store.add_dataset_sample(class_id, sample);
        self.features.append(class_id, embedding);

        let snapshot = self.store.state();
        let dataset = match snapshot.class(class_id) {
            Some(class) => &class.dataset,
            // Class vanished mid-loop; drop the token and end.
            None => {
                self.release_token();
                self.capture.release(stream);
                return TickOutcome::PreEmpted;
            }
        };

        if dataset.is_full() {
            self.release_token();
            self.capture.release(stream);
            self.store
                .update_dataset_status(class_id, DatasetStatus::Ready, None);
            info!(%class_id, recorded = dataset.recorded_count, "dataset complete");
            return TickOutcome::Completed;
        }

        TickOutcome::Captured {
            recorded: dataset.recorded_count,
        }
    }

    /// Blocking convenience loop: start, then tick at the modality cadence
    /// until the loop terminates. Mid-loop failures land in the snapshot.
    pub fn run(&self, class_id: Uuid) -> Result<()> {
        self.start_recording(class_id)?;
        let modality = self
            .active
            .lock()
            .as_ref()
            .map(|rec| rec.stream.modality)
            .unwrap_or(InputModality::Camera);
        let interval = self.config.tick_interval(modality);

        loop {
            thread::sleep(interval);
            match self.tick(class_id) {
                TickOutcome::CountingDown | TickOutcome::Captured { .. } => continue,
                TickOutcome::Completed | TickOutcome::PreEmpted | TickOutcome::Failed => {
                    return Ok(())
                }
            }
        }
    }

    /// Release the token, close the stream and settle the dataset status.
    /// Idempotent: a second call (or a call for a class that is not
    /// recording) changes nothing.
    pub fn stop_recording(&self, class_id: Uuid) {
        let released = {
            let mut active = self.active.lock();
            if active.as_ref().is_some_and(|rec| rec.class_id == class_id) {
                active.take()
            } else {
                None
            }
        };

        if let Some(rec) = released {
            self.capture.release(rec.stream);
            self.settle_status(class_id);
            info!(%class_id, "recording stopped");
        }
    }

    /// Clear all samples and feature tensors for a class. Requires
    /// confirmation; declined returns `Ok(false)`.
    pub fn discard_dataset(&self, class_id: Uuid) -> Result<bool> {
        let snapshot = self.store.state();
        let class = snapshot
            .class(class_id)
            .ok_or_else(|| ProtegeError::ValidationFailure("Unknown class".into()))?;
        self.ensure_dataset_mutable(class_id, &snapshot)?;

        let request = ConfirmRequest::destructive(
            format!("Discard samples for \"{}\"?", class.name),
            "All recorded samples for this class will be deleted.",
        );
        if !self.prompts.confirm(&request) {
            return Ok(false);
        }

        self.features.clear_class(class_id);
        self.store.clear_dataset(class_id);
        info!(%class_id, "dataset discarded");
        Ok(true)
    }

    pub fn remove_sample(&self, class_id: Uuid, sample_id: Uuid) -> Result<bool> {
        self.remove_samples(class_id, &[sample_id])
    }

    /// Remove specific samples (and their embeddings). Requires
    /// confirmation; declined returns `Ok(false)`.
    pub fn remove_samples(&self, class_id: Uuid, sample_ids: &[Uuid]) -> Result<bool> {
        let snapshot = self.store.state();
        let class = snapshot
            .class(class_id)
            .ok_or_else(|| ProtegeError::ValidationFailure("Unknown class".into()))?;
        self.ensure_dataset_mutable(class_id, &snapshot)?;

        let indices: Vec<usize> = class
            .dataset
            .samples
            .iter()
            .enumerate()
            .filter(|(_, s)| sample_ids.contains(&s.id))
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return Ok(false);
        }

        let request = ConfirmRequest::destructive(
            format!("Remove {} sample(s)?", indices.len()),
            format!("Samples will be removed from \"{}\".", class.name),
        );
        if !self.prompts.confirm(&request) {
            return Ok(false);
        }

        self.features.remove_many(class_id, &indices);
        self.store.remove_dataset_samples(class_id, sample_ids);
        self.settle_status(class_id);
        Ok(true)
    }

    // ---- internals ----

    fn validate_name(&self, name: &str, exempt: Option<Uuid>) -> Result<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ProtegeError::ValidationFailure(
                "Class name cannot be empty".into(),
            ));
        }
        let snapshot = self.store.state();
        let clash = snapshot.classes.iter().any(|c| {
            Some(c.id) != exempt && c.name.eq_ignore_ascii_case(trimmed)
        });
        if clash {
            return Err(ProtegeError::ValidationFailure(format!(
                "A class named \"{}\" already exists",
                trimmed
            )));
        }
        Ok(trimmed.to_string())
    }

    fn ensure_dataset_mutable(
        &self,
        class_id: Uuid,
        snapshot: &crate::session::SessionSnapshot,
    ) -> Result<()> {
        if snapshot.training.status == TrainingStatus::Running {
            return Err(ProtegeError::ResourceBusy(
                "Samples are locked while training runs".into(),
            ));
        }
        if self.active_class() == Some(class_id) {
            return Err(ProtegeError::ResourceBusy(
                "Stop recording before editing samples".into(),
            ));
        }
        Ok(())
    }

    fn release_token(&self) {
        self.active.lock().take();
    }

    /// Recompute dataset status after the loop ends: full datasets are
    /// Ready, untouched ones Empty, and a partial dataset keeps status
    /// Recording with its samples intact.
    fn settle_status(&self, class_id: Uuid) {
        let snapshot = self.store.state();
        let Some(class) = snapshot.class(class_id) else {
            return;
        };
        let status = if class.dataset.is_full() {
            DatasetStatus::Ready
        } else if class.dataset.recorded_count == 0 {
            DatasetStatus::Empty
        } else {
            DatasetStatus::Recording
        };
        self.store.update_dataset_status(class_id, status, None);
    }

    fn handle_acquire_failure(
        &self,
        class_id: Uuid,
        modality: InputModality,
        error: ProtegeError,
    ) -> ProtegeError {
        let detail = error.to_string();
        let translated = ProtegeError::PermissionDenied(detail.clone());
        self.store.update_dataset_status(
            class_id,
            DatasetStatus::Error,
            Some(translated.user_message()),
        );
        self.store.set_permission_state(
            modality,
            crate::session::PermissionStatus::Blocked,
            Some(detail),
        );
        let capability = match modality {
            InputModality::Camera => "Camera",
            InputModality::Microphone => "Microphone",
        };
        self.prompts.notify(&Notice::error(
            format!("{} access needed", capability),
            translated.user_message(),
        ));
        warn!(%class_id, ?modality, "stream acquisition failed");
        translated
    }
}
