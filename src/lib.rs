pub mod backends;
pub mod edge;
pub mod features;
pub mod inference;
pub mod recorder;
pub mod session;
pub mod testkit;
pub mod training;
pub mod workflow;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ProtegeError {
    #[error("Capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("Resource busy: {0}")]
    ResourceBusy(String),

    #[error("Validation failure: {0}")]
    ValidationFailure(String),

    #[error("Capture failure: {0}")]
    CaptureFailure(String),

    #[error("Training failure: {0}")]
    TrainingFailure(String),

    #[error("Streaming failure: {0}")]
    StreamingFailure(String),

    #[error("Device error: {0}")]
    DeviceError(String),
}

impl ProtegeError {
    /// Check if this error is recoverable by retrying the same operation
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Clears once the user grants the capability and retries
            ProtegeError::PermissionDenied(_) => true,
            // Another recorder/loop owns the resource; retry after it stops
            ProtegeError::ResourceBusy(_) => true,
            // Caller must change its input first
            ProtegeError::ValidationFailure(_) => false,
            ProtegeError::CaptureFailure(_) => true,
            ProtegeError::TrainingFailure(_) => true,
            ProtegeError::StreamingFailure(_) => true,
            ProtegeError::DeviceError(_) => true,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ProtegeError::PermissionDenied(_) => {
                "Camera or microphone access is blocked. Please allow access and try again."
                    .to_string()
            }
            ProtegeError::ResourceBusy(_) => {
                "Another recording or inference session is active. Stop it first.".to_string()
            }
            ProtegeError::ValidationFailure(msg) => msg.clone(),
            ProtegeError::CaptureFailure(_) => {
                "Capturing a sample failed. Please try again.".to_string()
            }
            ProtegeError::TrainingFailure(_) => {
                "Training failed. Your samples are preserved; please try again.".to_string()
            }
            ProtegeError::StreamingFailure(_) => {
                "Sending predictions to the device failed. Streaming was disabled.".to_string()
            }
            ProtegeError::DeviceError(_) => {
                "Device connection error. Please check the device and retry.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtegeError>;
