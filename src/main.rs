use anyhow::Result;
use protege::backends::{
    CaptureBackend, DeviceTransport, ModelBackend, StreamConstraints, UserPrompts,
};
use protege::edge::EdgeController;
use protege::features::FeatureStore;
use protege::inference::{InferenceController, InferenceTick};
use protege::recorder::{RecorderConfig, RecorderOrchestrator};
use protege::session::{InputModality, SessionStore, TaskModel};
use protege::testkit::{AutoPrompts, MemoryTransport, ScriptedCapture, ScriptedModel};
use protege::training::TrainingOrchestrator;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scripted end-to-end session against the in-memory collaborators:
/// collect two classes, train, run inference and stream to a fake device.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "protege=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting protege demo session");

    let store = Arc::new(SessionStore::new());
    let features = Arc::new(FeatureStore::new());
    let capture = Arc::new(ScriptedCapture::new());
    let model = Arc::new(ScriptedModel::new());
    let prompts = Arc::new(AutoPrompts::accepting());
    let transport = Arc::new(MemoryTransport::new());

    let capture_backend: Arc<dyn CaptureBackend> = capture.clone();
    let model_backend: Arc<dyn ModelBackend> = model.clone();
    let prompt_backend: Arc<dyn UserPrompts> = prompts.clone();
    let transport_backend: Arc<dyn DeviceTransport> = transport.clone();

    let recorder = RecorderOrchestrator::new(
        Arc::clone(&store),
        capture_backend,
        Arc::clone(&model_backend),
        prompt_backend.clone(),
        Arc::clone(&features),
        RecorderConfig {
            expected_samples: 5,
            ..RecorderConfig::default()
        },
    );
    let training = TrainingOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&model_backend),
        Arc::clone(&features),
    );
    let inference = Arc::new(InferenceController::new(
        Arc::clone(&store),
        model_backend,
    ));
    let edge = EdgeController::new(
        Arc::clone(&store),
        transport_backend,
        Arc::clone(&inference),
        prompt_backend,
    );

    recorder.start_session(TaskModel {
        id: "image-classifier".into(),
        requires_training: true,
        input_modality: InputModality::Camera,
        default_inference_source: None,
    });

    let cat = recorder.add_class("Cat")?;
    let dog = recorder.add_class("Dog")?;
    recorder.run(cat)?;
    recorder.run(dog)?;

    training.start()?.join();
    info!(status = ?store.state().training.status, "training finished");

    edge.connect("micro:bit-01")?;
    edge.set_streaming(true);

    model.set_prediction(vec![0.87, 0.13], 0);
    let source = capture.acquire_video(&StreamConstraints::for_modality(InputModality::Camera))?;
    inference.start(source)?;
    for _ in 0..5 {
        if inference.tick() == InferenceTick::Failed {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    inference.stop();
    edge.disconnect()?;

    info!(writes = ?transport.writes_utf8(), "payloads streamed to device");
    println!("{}", serde_json::to_string_pretty(&*store.state())?);

    Ok(())
}
