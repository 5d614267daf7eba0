//! Shared test stack: the full controller wiring against scripted
//! collaborators.

#![allow(dead_code)]

use protege::backends::{CaptureBackend, DeviceTransport, ModelBackend, UserPrompts};
use protege::edge::EdgeController;
use protege::features::FeatureStore;
use protege::inference::InferenceController;
use protege::recorder::{RecorderConfig, RecorderOrchestrator, TickOutcome};
use protege::session::{InputModality, SessionStore, TaskModel};
use protege::testkit::{AutoPrompts, MemoryTransport, ScriptedCapture, ScriptedModel};
use protege::training::TrainingOrchestrator;
use protege::workflow::NavigationController;
use std::sync::Arc;
use uuid::Uuid;

pub struct Stack {
    pub store: Arc<SessionStore>,
    pub features: Arc<FeatureStore>,
    pub capture: Arc<ScriptedCapture>,
    pub model: Arc<ScriptedModel>,
    pub prompts: Arc<AutoPrompts>,
    pub transport: Arc<MemoryTransport>,
    pub recorder: RecorderOrchestrator,
    pub training: TrainingOrchestrator,
    pub inference: Arc<InferenceController>,
    pub edge: Arc<EdgeController>,
    pub navigation: NavigationController,
}

impl Stack {
    /// Small datasets (3 samples) keep most tests terse.
    pub fn new() -> Self {
        Self::with_config(RecorderConfig {
            expected_samples: 3,
            ..RecorderConfig::default()
        })
    }

    pub fn with_expected_samples(expected: usize) -> Self {
        Self::with_config(RecorderConfig {
            expected_samples: expected,
            ..RecorderConfig::default()
        })
    }

    pub fn with_config(config: RecorderConfig) -> Self {
        let store = Arc::new(SessionStore::new());
        let features = Arc::new(FeatureStore::new());
        let capture = Arc::new(ScriptedCapture::new());
        let model = Arc::new(ScriptedModel::new());
        let prompts = Arc::new(AutoPrompts::accepting());
        let transport = Arc::new(MemoryTransport::new());

        // Trait-object handles for the controllers; the concrete handles
        // stay on the stack for the scripted test API.
        let capture_backend: Arc<dyn CaptureBackend> = capture.clone();
        let model_backend: Arc<dyn ModelBackend> = model.clone();
        let prompt_backend: Arc<dyn UserPrompts> = prompts.clone();
        let transport_backend: Arc<dyn DeviceTransport> = transport.clone();

        let recorder = RecorderOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&capture_backend),
            Arc::clone(&model_backend),
            Arc::clone(&prompt_backend),
            Arc::clone(&features),
            config,
        );
        let training = TrainingOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&model_backend),
            Arc::clone(&features),
        );
        let inference = Arc::new(InferenceController::new(
            Arc::clone(&store),
            Arc::clone(&model_backend),
        ));
        let edge = EdgeController::new(
            Arc::clone(&store),
            transport_backend,
            Arc::clone(&inference),
            prompt_backend,
        );
        let navigation = NavigationController::new(Arc::clone(&store));

        Self {
            store,
            features,
            capture,
            model,
            prompts,
            transport,
            recorder,
            training,
            inference,
            edge,
            navigation,
        }
    }

    pub fn camera_task() -> TaskModel {
        TaskModel {
            id: "image-classifier".into(),
            requires_training: true,
            input_modality: InputModality::Camera,
            default_inference_source: None,
        }
    }

    pub fn untrained_task() -> TaskModel {
        TaskModel {
            requires_training: false,
            ..Self::camera_task()
        }
    }

    pub fn microphone_task() -> TaskModel {
        TaskModel {
            id: "audio-classifier".into(),
            requires_training: true,
            input_modality: InputModality::Microphone,
            default_inference_source: None,
        }
    }

    pub fn start_camera_session(&self) {
        self.recorder.start_session(Self::camera_task());
    }

    /// Add a class and record it to completion.
    pub fn ready_class(&self, name: &str) -> Uuid {
        let id = self.recorder.add_class(name).expect("add class");
        self.record_to_ready(id);
        id
    }

    pub fn record_to_ready(&self, class_id: Uuid) {
        self.recorder.start_recording(class_id).expect("start recording");
        loop {
            match self.recorder.tick(class_id) {
                TickOutcome::CountingDown | TickOutcome::Captured { .. } => continue,
                TickOutcome::Completed => break,
                other => panic!("unexpected tick outcome: {:?}", other),
            }
        }
    }

    /// Record exactly `count` samples and stop, leaving a partial dataset.
    pub fn record_partial(&self, class_id: Uuid, count: usize) {
        self.recorder.start_recording(class_id).expect("start recording");
        for _ in 0..count {
            match self.recorder.tick(class_id) {
                TickOutcome::Captured { .. } => {}
                other => panic!("unexpected tick outcome: {:?}", other),
            }
        }
        self.recorder.stop_recording(class_id);
    }
}
