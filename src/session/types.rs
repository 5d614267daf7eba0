use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workflow step the user is currently on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WorkflowStep {
    #[default]
    Home,
    Collect,
    Train,
    Infer,
}

/// Input modality of a task; doubles as the source tag on a recorded sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputModality {
    Camera,
    Microphone,
}

/// Microphone recording preset; determines the clip length per sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MicrophonePreset {
    /// Short labeled clip (2 s)
    #[default]
    Clip,
    /// Long ambient clip for a background class (>= 15 s)
    Background,
}

/// Externally supplied task descriptor; selecting one starts a new session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskModel {
    pub id: String,
    pub requires_training: bool,
    pub input_modality: InputModality,
    pub default_inference_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub discarded_at: Option<DateTime<Utc>>,
}

impl SessionInfo {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            discarded_at: None,
        }
    }
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DatasetStatus {
    #[default]
    Empty,
    Countdown,
    Recording,
    Ready,
    Error,
}

/// One recorded camera frame or microphone clip. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: Uuid,
    pub source: InputModality,
    pub captured_at: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub thumbnail: Option<String>,
    pub preview_frames: Vec<String>,
    pub annotation: Option<String>,
}

impl Sample {
    pub fn new(source: InputModality) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            captured_at: Utc::now(),
            duration_ms: None,
            thumbnail: None,
            preview_frames: Vec::new(),
            annotation: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub status: DatasetStatus,
    pub samples: Vec<Sample>,
    /// Cached `samples.len()` for cheap reads; recomputed on every mutation
    pub recorded_count: usize,
    pub expected_count: usize,
    pub error: Option<String>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl Dataset {
    pub fn empty(expected_count: usize) -> Self {
        Self {
            status: DatasetStatus::Empty,
            samples: Vec::new(),
            recorded_count: 0,
            expected_count,
            error: None,
            last_updated_at: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == DatasetStatus::Ready
    }

    pub fn is_full(&self) -> bool {
        self.recorded_count >= self.expected_count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub id: Uuid,
    pub name: String,
    pub dataset: Dataset,
}

impl ClassEntry {
    pub fn new(name: impl Into<String>, expected_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            dataset: Dataset::empty(expected_count),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TrainingStatus {
    #[default]
    Idle,
    Running,
    Done,
    Aborted,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub epochs: u32,
    pub batch_size: usize,
    pub learning_rate: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 16,
            learning_rate: 0.001,
        }
    }
}

/// Record of the most recent training run, kept across status resets so the
/// staleness view can compare it against live dataset timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRunRecord {
    pub status: TrainingStatus,
    pub completed_at: DateTime<Utc>,
    pub error: Option<String>,
    /// Newest `Dataset.last_updated_at` across classes at run start
    pub dataset_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrainingState {
    pub status: TrainingStatus,
    /// 0..=100
    pub progress: u8,
    pub params: TrainingParams,
    pub error: Option<String>,
    pub last_run: Option<TrainingRunRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InferenceStatus {
    #[default]
    Idle,
    Running,
    Stopped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// One confidence per class, in class order
    pub values: Vec<f32>,
    pub best_index: usize,
    pub updated_at: DateTime<Utc>,
}

impl Prediction {
    pub fn best_value(&self) -> f32 {
        self.values.get(self.best_index).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InferenceState {
    pub status: InferenceStatus,
    pub last_prediction: Option<Prediction>,
    pub stream_to_edge: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EdgeStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EdgeState {
    pub status: EdgeStatus,
    pub device_info: Option<DeviceInfo>,
    /// Kept across connection errors so the UI can offer a retry
    pub selected_device: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PermissionStatus {
    #[default]
    Unknown,
    Granted,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PermissionState {
    pub status: PermissionStatus,
    pub message: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Permissions {
    pub camera: PermissionState,
    pub microphone: PermissionState,
}

impl Permissions {
    pub fn get(&self, capability: InputModality) -> &PermissionState {
        match capability {
            InputModality::Camera => &self.camera,
            InputModality::Microphone => &self.microphone,
        }
    }

    pub fn get_mut(&mut self, capability: InputModality) -> &mut PermissionState {
        match capability {
            InputModality::Camera => &mut self.camera,
            InputModality::Microphone => &mut self.microphone,
        }
    }
}

/// The single immutable value representing all workflow state at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionSnapshot {
    pub session: Option<SessionInfo>,
    pub step: WorkflowStep,
    pub task: Option<TaskModel>,
    pub classes: Vec<ClassEntry>,
    pub training: TrainingState,
    pub inference: InferenceState,
    pub edge: EdgeState,
    pub permissions: Permissions,
}

impl SessionSnapshot {
    pub fn class(&self, id: Uuid) -> Option<&ClassEntry> {
        self.classes.iter().find(|c| c.id == id)
    }

    pub fn class_index(&self, id: Uuid) -> Option<usize> {
        self.classes.iter().position(|c| c.id == id)
    }

    /// Newest dataset mutation timestamp across all classes
    pub fn newest_dataset_update(&self) -> Option<DateTime<Utc>> {
        self.classes
            .iter()
            .filter_map(|c| c.dataset.last_updated_at)
            .max()
    }
}
