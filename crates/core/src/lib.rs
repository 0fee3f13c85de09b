//! Core library for the Voxelgram volumetric light sequencer.
//!
//! The crate synthesises animation loops for a bounded 3D grid of LED cells
//! and schedules their playback. Each module owns a distinct subsystem:
//! procedural presets, the expression sandbox, the particle simulator, the
//! audio-reactive synthesiser, tap-tempo estimation and the playback
//! transport. The [`engine`] module ties them together behind a single
//! façade the way an embedding application consumes them.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod generate;
pub mod grid;
pub mod history;
pub mod noise;
pub mod particles;
pub mod playback;
pub mod presets;
pub mod shader;
pub mod tempo;

pub use audio::{AudioSynth, FftSpectrumSource, SpectrumSource};
pub use config::{AppConfig, AudioConfig, PlaybackConfig};
pub use engine::VoxelEngine;
pub use error::{Result, VoxelgramError};
pub use generate::{GeneratedPattern, Mode, PatternResponse};
pub use grid::{Frame, FrameSequence, GridSize};
pub use history::{HistoryItem, HistoryStore};
pub use particles::{Behavior, ParticleParams};
pub use playback::{PlaybackState, TempoState, Transport};
pub use presets::Preset;
pub use shader::Shader;
pub use tempo::TapTempo;
