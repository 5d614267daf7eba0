//! Session state container
//!
//! A dumb, consistent ledger: every operation produces a new immutable
//! snapshot and notifies subscribers synchronously, in subscription order.
//! No guard logic lives here; operations addressing an unknown class or
//! sample id are silently ignored so malformed external input can never
//! corrupt the snapshot.

use crate::session::types::*;
use chrono::Utc;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

/// Handle returned by [`SessionStore::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    listener: Arc<dyn Fn(&SessionSnapshot) + Send + Sync>,
}

pub struct SessionStore {
    snapshot: Mutex<Arc<SessionSnapshot>>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscription: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(Arc::new(SessionSnapshot::default())),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// Latest committed snapshot. O(1); the returned value never changes.
    pub fn state(&self) -> Arc<SessionSnapshot> {
        Arc::clone(&self.snapshot.lock())
    }

    /// Register a listener invoked synchronously after every commit.
    pub fn subscribe(
        &self,
        listener: impl Fn(&SessionSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.subscribers.lock().push(Subscriber {
            id,
            listener: Arc::new(listener),
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().retain(|s| s.id != id);
    }

    /// Apply a mutation and notify subscribers. The mutator returns false to
    /// decline the commit (unknown id), in which case the prior snapshot is
    /// kept and nobody is notified.
    fn commit(&self, mutate: impl FnOnce(&mut SessionSnapshot) -> bool) {
        let committed = {
            let mut slot = self.snapshot.lock();
            let mut next = (**slot).clone();
            if !mutate(&mut next) {
                return;
            }
            let next = Arc::new(next);
            *slot = Arc::clone(&next);
            next
        };

        // Locks are released before fan-out so listeners may commit again.
        let subscribers: Vec<Arc<dyn Fn(&SessionSnapshot) + Send + Sync>> = self
            .subscribers
            .lock()
            .iter()
            .map(|s| Arc::clone(&s.listener))
            .collect();

        for listener in subscribers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(&committed))) {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic".to_string());
                error!("state listener panicked: {}", msg);
            }
        }
    }

    // ---- navigation & session lifecycle ----

    pub fn set_step(&self, step: WorkflowStep) {
        self.commit(|s| {
            s.step = step;
            true
        });
    }

    /// Start a fresh session for the selected task. Resets every sub-object
    /// to its default and lands on the Collect step.
    pub fn start_session(&self, task: TaskModel) {
        self.commit(|s| {
            *s = SessionSnapshot {
                session: Some(SessionInfo::new()),
                step: WorkflowStep::Collect,
                task: Some(task),
                ..SessionSnapshot::default()
            };
            true
        });
    }

    /// Discard the current session: stamp it, then replace the snapshot with
    /// the empty default. Two commits, so observers see the discard happen.
    pub fn discard_session(&self) {
        self.commit(|s| match &mut s.session {
            Some(session) => {
                session.discarded_at = Some(Utc::now());
                true
            }
            None => false,
        });
        self.commit(|s| {
            *s = SessionSnapshot::default();
            true
        });
    }

    // ---- classes & datasets ----

    pub fn add_class(&self, entry: ClassEntry) {
        self.commit(|s| {
            s.classes.push(entry);
            true
        });
    }

    pub fn remove_class(&self, class_id: Uuid) {
        self.commit(|s| {
            let before = s.classes.len();
            s.classes.retain(|c| c.id != class_id);
            s.classes.len() != before
        });
    }

    pub fn set_class_name(&self, class_id: Uuid, name: impl Into<String>) {
        let name = name.into();
        self.commit(|s| match s.classes.iter_mut().find(|c| c.id == class_id) {
            Some(class) => {
                class.name = name;
                true
            }
            None => false,
        });
    }

    pub fn update_dataset_status(
        &self,
        class_id: Uuid,
        status: DatasetStatus,
        error: Option<String>,
    ) {
        self.commit(|s| match s.classes.iter_mut().find(|c| c.id == class_id) {
            Some(class) => {
                class.dataset.status = status;
                class.dataset.error = error;
                true
            }
            None => false,
        });
    }

    pub fn add_dataset_sample(&self, class_id: Uuid, sample: Sample) {
        self.commit(|s| match s.classes.iter_mut().find(|c| c.id == class_id) {
            Some(class) => {
                class.dataset.samples.push(sample);
                class.dataset.recorded_count = class.dataset.samples.len();
                class.dataset.last_updated_at = Some(Utc::now());
                true
            }
            None => false,
        });
    }

    pub fn remove_dataset_sample(&self, class_id: Uuid, sample_id: Uuid) {
        self.remove_dataset_samples(class_id, &[sample_id]);
    }

    pub fn remove_dataset_samples(&self, class_id: Uuid, sample_ids: &[Uuid]) {
        self.commit(|s| match s.classes.iter_mut().find(|c| c.id == class_id) {
            Some(class) => {
                let before = class.dataset.samples.len();
                class.dataset.samples.retain(|x| !sample_ids.contains(&x.id));
                if class.dataset.samples.len() == before {
                    return false;
                }
                class.dataset.recorded_count = class.dataset.samples.len();
                class.dataset.last_updated_at = Some(Utc::now());
                true
            }
            None => false,
        });
    }

    pub fn clear_dataset(&self, class_id: Uuid) {
        self.commit(|s| match s.classes.iter_mut().find(|c| c.id == class_id) {
            Some(class) => {
                let expected = class.dataset.expected_count;
                class.dataset = Dataset {
                    last_updated_at: Some(Utc::now()),
                    ..Dataset::empty(expected)
                };
                true
            }
            None => false,
        });
    }

    // ---- training ----

    pub fn set_training_status(&self, status: TrainingStatus, error: Option<String>) {
        self.commit(|s| {
            s.training.status = status;
            s.training.error = error;
            true
        });
    }

    pub fn set_training_progress(&self, progress: u8) {
        self.commit(|s| {
            s.training.progress = progress.min(100);
            true
        });
    }

    pub fn set_training_params(&self, params: TrainingParams) {
        self.commit(|s| {
            s.training.params = params;
            true
        });
    }

    pub fn record_training_run(&self, record: TrainingRunRecord) {
        self.commit(|s| {
            s.training.last_run = Some(record);
            true
        });
    }

    // ---- inference ----

    pub fn set_inference_status(&self, status: InferenceStatus, error: Option<String>) {
        self.commit(|s| {
            s.inference.status = status;
            s.inference.error = error;
            true
        });
    }

    pub fn set_last_prediction(&self, prediction: Option<Prediction>) {
        self.commit(|s| {
            s.inference.last_prediction = prediction;
            true
        });
    }

    pub fn set_streaming(&self, enabled: bool) {
        self.commit(|s| {
            s.inference.stream_to_edge = enabled;
            true
        });
    }

    // ---- edge device ----

    pub fn set_edge_status(&self, status: EdgeStatus, error: Option<String>) {
        self.commit(|s| {
            s.edge.status = status;
            s.edge.error = error;
            true
        });
    }

    pub fn set_edge_device(&self, device: Option<DeviceInfo>) {
        self.commit(|s| {
            s.edge.device_info = device;
            true
        });
    }

    pub fn set_selected_device(&self, device_id: Option<String>) {
        self.commit(|s| {
            s.edge.selected_device = device_id;
            true
        });
    }

    // ---- permissions ----

    pub fn set_permission_state(
        &self,
        capability: InputModality,
        status: PermissionStatus,
        message: Option<String>,
    ) {
        self.commit(|s| {
            let entry = s.permissions.get_mut(capability);
            entry.status = status;
            entry.message = message;
            entry.updated_at = Some(Utc::now());
            true
        });
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
