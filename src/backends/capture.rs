//! Camera / microphone stream acquisition

use crate::session::InputModality;
use crate::Result;

/// Opaque handle to a live capture stream owned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHandle {
    pub id: u64,
    pub modality: InputModality,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamConstraints {
    pub modality: InputModality,
    pub device_id: Option<String>,
}

impl StreamConstraints {
    pub fn for_modality(modality: InputModality) -> Self {
        Self {
            modality,
            device_id: None,
        }
    }
}

pub trait CaptureBackend: Send + Sync {
    fn acquire_video(&self, constraints: &StreamConstraints) -> Result<StreamHandle>;

    fn acquire_audio(&self, constraints: &StreamConstraints) -> Result<StreamHandle>;

    fn release(&self, handle: StreamHandle);
}
