//! Feature-extraction / training backend

use crate::backends::capture::StreamHandle;
use crate::session::TrainingParams;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Feature vector extracted from one frame or clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn dims(&self) -> usize {
        self.0.len()
    }
}

/// Raw classifier output for one embedding
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutput {
    pub values: Vec<f32>,
    pub best_index: usize,
}

/// Returned from the epoch-end callback. `Stop` asks the backend to finish
/// at the next epoch boundary; epochs are never interrupted mid-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochSignal {
    Continue,
    Stop,
}

pub trait ModelBackend: Send + Sync {
    /// Capture one frame/clip from the live stream and embed it.
    fn embed(&self, stream: StreamHandle) -> Result<Embedding>;

    /// Fit a classifier. `labels` are class indices parallel to `samples`.
    /// `on_epoch_end(epoch, total_epochs)` runs after every epoch; returning
    /// [`EpochSignal::Stop`] ends the run cooperatively.
    fn fit(
        &self,
        samples: &[Embedding],
        labels: &[usize],
        params: &TrainingParams,
        on_epoch_end: &mut dyn FnMut(u32, u32) -> EpochSignal,
    ) -> Result<()>;

    /// Single-shot prediction against the fitted classifier.
    fn predict(&self, embedding: &Embedding) -> Result<PredictionOutput>;
}
