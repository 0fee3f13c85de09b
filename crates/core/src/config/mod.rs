use serde::{Deserialize, Serialize};

use crate::GridSize;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub grid: GridSize,
    pub playback: PlaybackConfig,
    pub audio: AudioConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            grid: GridSize::default(),
            playback: PlaybackConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn live_defaults() -> Self {
        Self::default()
    }
}

/// Configuration for the playback transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Base frame rate used when tempo sync is off.
    pub fps: f64,
    pub speed_multiplier: f64,
    pub bpm: u16,
    pub tempo_sync: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fps: 12.0,
            speed_multiplier: 1.0,
            bpm: 120,
            tempo_sync: true,
        }
    }
}

/// Configuration specific to the audio-reactive subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Peak-magnitude gate below which spectrum ticks are ignored, on the
    /// byte (0-255) magnitude scale.
    pub threshold: f32,
    /// Sampling interval of the synthesiser timer in milliseconds.
    pub sample_interval_ms: u64,
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            threshold: 30.0,
            sample_interval_ms: 50,
            sample_rate: 48_000,
        }
    }
}
