//! In-memory collaborator implementations
//!
//! Deterministic doubles for the capture, model, device and prompt
//! collaborators, used by the integration tests and the demo binary. Each
//! can be primed to fail so error paths are exercisable without hardware.

use crate::backends::{
    CaptureBackend, ConfirmRequest, ConnectionEvent, DeviceTransport, Embedding, EpochSignal,
    ModelBackend, Notice, PredictionOutput, StreamConstraints, StreamHandle, UserPrompts,
};
use crate::session::{DeviceInfo, TrainingParams};
use crate::{ProtegeError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Capture backend handing out sequential stream handles
#[derive(Default)]
pub struct ScriptedCapture {
    next_id: AtomicU64,
    fail_next: Mutex<Option<String>>,
    released: Mutex<Vec<StreamHandle>>,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next acquisition fail with this message (one-shot).
    pub fn fail_next_acquire(&self, message: impl Into<String>) {
        *self.fail_next.lock() = Some(message.into());
    }

    pub fn released(&self) -> Vec<StreamHandle> {
        self.released.lock().clone()
    }

    fn acquire(&self, constraints: &StreamConstraints) -> Result<StreamHandle> {
        if let Some(message) = self.fail_next.lock().take() {
            return Err(ProtegeError::CaptureFailure(message));
        }
        Ok(StreamHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            modality: constraints.modality,
        })
    }
}

impl CaptureBackend for ScriptedCapture {
    fn acquire_video(&self, constraints: &StreamConstraints) -> Result<StreamHandle> {
        self.acquire(constraints)
    }

    fn acquire_audio(&self, constraints: &StreamConstraints) -> Result<StreamHandle> {
        self.acquire(constraints)
    }

    fn release(&self, handle: StreamHandle) {
        self.released.lock().push(handle);
    }
}

/// Model backend with deterministic embeddings and a scriptable fit
#[derive(Default)]
pub struct ScriptedModel {
    embed_counter: AtomicU64,
    embed_fail: Mutex<Option<String>>,
    predict_output: Mutex<Option<PredictionOutput>>,
    predict_fail: Mutex<Option<String>>,
    fit_gate: Mutex<Option<Receiver<()>>>,
    fit_fail_at_epoch: Mutex<Option<(u32, String)>>,
    fit_epochs_run: AtomicU64,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next embed fail (one-shot).
    pub fn fail_next_embed(&self, message: impl Into<String>) {
        *self.embed_fail.lock() = Some(message.into());
    }

    /// Fix the output of every subsequent predict.
    pub fn set_prediction(&self, values: Vec<f32>, best_index: usize) {
        *self.predict_output.lock() = Some(PredictionOutput { values, best_index });
    }

    pub fn fail_next_predict(&self, message: impl Into<String>) {
        *self.predict_fail.lock() = Some(message.into());
    }

    /// Block the next fit call until the returned sender fires (or drops),
    /// so tests can observe the Running state.
    pub fn gate_next_fit(&self) -> Sender<()> {
        let (tx, rx) = bounded(1);
        *self.fit_gate.lock() = Some(rx);
        tx
    }

    /// Make fit fail when it reaches the given epoch.
    pub fn fail_fit_at_epoch(&self, epoch: u32, message: impl Into<String>) {
        *self.fit_fail_at_epoch.lock() = Some((epoch, message.into()));
    }

    /// Number of epoch boundaries the last fit reached
    pub fn epochs_run(&self) -> u64 {
        self.fit_epochs_run.load(Ordering::SeqCst)
    }
}

impl ModelBackend for ScriptedModel {
    fn embed(&self, stream: StreamHandle) -> Result<Embedding> {
        if let Some(message) = self.embed_fail.lock().take() {
            return Err(ProtegeError::CaptureFailure(message));
        }
        let seq = self.embed_counter.fetch_add(1, Ordering::SeqCst);
        Ok(Embedding(vec![stream.id as f32, seq as f32]))
    }

    fn fit(
        &self,
        _samples: &[Embedding],
        _labels: &[usize],
        params: &TrainingParams,
        on_epoch_end: &mut dyn FnMut(u32, u32) -> EpochSignal,
    ) -> Result<()> {
        if let Some(gate) = self.fit_gate.lock().take() {
            let _ = gate.recv();
        }

        let fail_at = self.fit_fail_at_epoch.lock().take();
        self.fit_epochs_run.store(0, Ordering::SeqCst);

        for epoch in 1..=params.epochs {
            if let Some((fail_epoch, message)) = &fail_at {
                if epoch == *fail_epoch {
                    return Err(ProtegeError::TrainingFailure(message.clone()));
                }
            }
            self.fit_epochs_run.fetch_add(1, Ordering::SeqCst);
            if on_epoch_end(epoch, params.epochs) == EpochSignal::Stop {
                return Ok(());
            }
        }
        Ok(())
    }

    fn predict(&self, _embedding: &Embedding) -> Result<PredictionOutput> {
        if let Some(message) = self.predict_fail.lock().take() {
            return Err(ProtegeError::CaptureFailure(message));
        }
        Ok(self
            .predict_output
            .lock()
            .clone()
            .unwrap_or(PredictionOutput {
                values: vec![1.0],
                best_index: 0,
            }))
    }
}

type ConnectionCallback = Box<dyn Fn(ConnectionEvent) + Send + Sync>;

/// Device transport recording writes and firing its connection callback
/// synchronously on connect/disconnect
#[derive(Default)]
pub struct MemoryTransport {
    connected: Mutex<Option<DeviceInfo>>,
    callback: Mutex<Option<ConnectionCallback>>,
    writes: Mutex<Vec<Vec<u8>>>,
    connect_fail: Mutex<Option<String>>,
    write_fail: Mutex<Option<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_connect(&self, message: impl Into<String>) {
        *self.connect_fail.lock() = Some(message.into());
    }

    /// Make every subsequent write fail with this message.
    pub fn fail_writes(&self, message: impl Into<String>) {
        *self.write_fail.lock() = Some(message.into());
    }

    pub fn writes_utf8(&self) -> Vec<String> {
        self.writes
            .lock()
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }

    /// Simulate a hardware-side link change (e.g. the device powering off).
    pub fn simulate_connection_change(&self, device: DeviceInfo, connected: bool) {
        if connected {
            *self.connected.lock() = Some(device.clone());
        } else {
            self.connected.lock().take();
        }
        if let Some(callback) = self.callback.lock().as_ref() {
            callback(ConnectionEvent { device, connected });
        }
    }
}

impl DeviceTransport for MemoryTransport {
    fn connect(&self, device_id: &str) -> Result<()> {
        if let Some(message) = self.connect_fail.lock().take() {
            return Err(ProtegeError::DeviceError(message));
        }
        let device = DeviceInfo {
            id: device_id.to_string(),
            name: format!("Device {}", device_id),
        };
        self.simulate_connection_change(device, true);
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let device = self.connected.lock().clone();
        if let Some(device) = device {
            self.simulate_connection_change(device, false);
        }
        Ok(())
    }

    fn write(&self, payload: &[u8]) -> Result<()> {
        if let Some(message) = self.write_fail.lock().clone() {
            return Err(ProtegeError::StreamingFailure(message));
        }
        self.writes.lock().push(payload.to_vec());
        Ok(())
    }

    fn is_connected(&self, device_id: &str) -> bool {
        self.connected
            .lock()
            .as_ref()
            .is_some_and(|d| d.id == device_id)
    }

    fn on_connection_changed(&self, callback: ConnectionCallback) {
        *self.callback.lock() = Some(callback);
    }
}

/// Prompt collaborator with a fixed answer, recording everything shown
pub struct AutoPrompts {
    answer: AtomicBool,
    confirms: Mutex<Vec<ConfirmRequest>>,
    notices: Mutex<Vec<Notice>>,
}

impl AutoPrompts {
    pub fn accepting() -> Self {
        Self {
            answer: AtomicBool::new(true),
            confirms: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn declining() -> Self {
        let prompts = Self::accepting();
        prompts.answer.store(false, Ordering::SeqCst);
        prompts
    }

    pub fn set_answer(&self, answer: bool) {
        self.answer.store(answer, Ordering::SeqCst);
    }

    pub fn confirms(&self) -> Vec<ConfirmRequest> {
        self.confirms.lock().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

impl UserPrompts for AutoPrompts {
    fn confirm(&self, request: &ConfirmRequest) -> bool {
        self.confirms.lock().push(request.clone());
        self.answer.load(Ordering::SeqCst)
    }

    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }
}
