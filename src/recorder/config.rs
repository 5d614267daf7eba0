use crate::session::{InputModality, MicrophonePreset};
use std::time::Duration;

/// Cadences and presets for the sampling loop
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Interval between camera frame captures
    pub camera_interval: Duration,
    /// Ticks spent in Countdown before capture starts (0 = none)
    pub countdown_ticks: u32,
    /// Microphone clip length for the `Clip` preset
    pub clip_duration: Duration,
    /// Microphone clip length for the `Background` preset
    pub background_duration: Duration,
    /// Samples required before a dataset is marked Ready
    pub expected_samples: usize,
    pub microphone_preset: MicrophonePreset,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            camera_interval: Duration::from_millis(100),
            countdown_ticks: 0,
            clip_duration: Duration::from_millis(2000),
            background_duration: Duration::from_millis(15000),
            expected_samples: 10,
            microphone_preset: MicrophonePreset::Clip,
        }
    }
}

impl RecorderConfig {
    /// Sampling-loop cadence for the given modality. Microphone ticks are
    /// driven by the clip length rather than a fixed frame rate.
    pub fn tick_interval(&self, modality: InputModality) -> Duration {
        match modality {
            InputModality::Camera => self.camera_interval,
            InputModality::Microphone => match self.microphone_preset {
                MicrophonePreset::Clip => self.clip_duration,
                MicrophonePreset::Background => self.background_duration,
            },
        }
    }

    /// Recorded clip duration attached to microphone samples
    pub fn sample_duration_ms(&self, modality: InputModality) -> Option<u64> {
        match modality {
            InputModality::Camera => None,
            InputModality::Microphone => Some(self.tick_interval(modality).as_millis() as u64),
        }
    }
}
