//! Collaborator interfaces
//!
//! The session core owns no hardware, model runtime or UI. Everything it
//! needs from the outside world comes through these traits; controllers hold
//! them as `Arc<dyn ...>` and translate every collaborator failure into
//! status fields on the snapshot.

pub mod capture;
pub mod device;
pub mod model;
pub mod prompts;

pub use capture::{CaptureBackend, StreamConstraints, StreamHandle};
pub use device::{ConnectionEvent, DeviceTransport};
pub use model::{Embedding, EpochSignal, ModelBackend, PredictionOutput};
pub use prompts::{ConfirmRequest, Notice, NoticeTone, UserPrompts};
