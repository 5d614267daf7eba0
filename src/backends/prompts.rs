//! Confirmation dialogs and toast notifications, rendered elsewhere

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmRequest {
    pub title: String,
    pub message: String,
    pub destructive: bool,
}

impl ConfirmRequest {
    pub fn destructive(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            destructive: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeTone {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub tone: NoticeTone,
}

impl Notice {
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            tone: NoticeTone::Error,
        }
    }
}

pub trait UserPrompts: Send + Sync {
    /// Ask the user to confirm. Returns true when they accept.
    fn confirm(&self, request: &ConfirmRequest) -> bool;

    fn notify(&self, notice: &Notice);
}
