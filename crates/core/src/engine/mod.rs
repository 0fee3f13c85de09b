//! High level engine façade.
//!
//! [`VoxelEngine`] owns the displayed frame sequence, the playback
//! transport, the tap-tempo estimator and the generation history, and it
//! arbitrates between the two frame producers: the transport's frame timer
//! and the audio-reactive synthesiser. At most one of them is ever active;
//! entering audio mode suspends the transport before the synthesiser exists,
//! and leaving it drops the synthesiser before the transport resumes.

use std::time::Duration;

use crate::audio::{AudioSynth, SpectrumSource};
use crate::generate::{self, PatternResponse};
use crate::history::{HistoryItem, HistoryStore};
use crate::particles::{self, ParticleParams};
use crate::playback::Transport;
use crate::presets::{self, Preset, DEFAULT_FRAME_COUNT};
use crate::shader::Shader;
use crate::tempo::TapTempo;
use crate::{AppConfig, Frame, FrameSequence, GridSize, Result};

/// Application-facing façade over the synthesis and playback subsystems.
#[derive(Debug)]
pub struct VoxelEngine {
    config: AppConfig,
    size: GridSize,
    sequence: FrameSequence,
    transport: Transport,
    tap: TapTempo,
    history: HistoryStore,
    audio: Option<AudioSynth>,
}

impl VoxelEngine {
    /// Builds an engine showing the default wave loop, paused at frame zero.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.grid.validate()?;
        let size = config.grid;
        let sequence = presets::generate(Preset::Wave, size, DEFAULT_FRAME_COUNT);
        let mut transport = Transport::new(&config.playback);
        transport.set_sequence_len(Duration::ZERO, sequence.len());
        Ok(Self {
            config,
            size,
            sequence,
            transport,
            tap: TapTempo::new(),
            history: HistoryStore::new(),
            audio: None,
        })
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    pub fn audio_active(&self) -> bool {
        self.audio.is_some()
    }

    /// The sequence playback currently indexes into. While audio mode is
    /// active this is the synthesiser's single-frame buffer.
    pub fn sequence(&self) -> &FrameSequence {
        match &self.audio {
            Some(audio) => audio.buffer(),
            None => &self.sequence,
        }
    }

    /// The frame the display should show right now.
    pub fn current_frame(&self) -> Option<&Frame> {
        match &self.audio {
            Some(audio) => audio.buffer().frame(0),
            None => self.sequence.frame(self.transport.current_frame()),
        }
    }

    // --- playback controls -------------------------------------------------

    pub fn play(&mut self, now: Duration) {
        self.transport.play(now);
    }

    pub fn pause(&mut self) {
        self.transport.pause();
    }

    pub fn toggle(&mut self, now: Duration) {
        self.transport.toggle(now);
    }

    pub fn rewind(&mut self) {
        self.transport.reset();
    }

    pub fn set_speed(&mut self, now: Duration, multiplier: f64) {
        self.transport.set_speed(now, multiplier);
    }

    pub fn set_tempo(&mut self, now: Duration, bpm: u16) {
        self.transport.set_tempo(now, bpm);
    }

    pub fn set_tempo_sync(&mut self, now: Duration, enabled: bool) {
        self.transport.set_tempo_sync(now, enabled);
    }

    pub fn set_frame_rate(&mut self, now: Duration, fps: f64) {
        self.transport.set_frame_rate(now, fps);
    }

    /// Feeds the tap-tempo estimator; a produced estimate is applied to the
    /// transport immediately.
    pub fn tap_tempo(&mut self, now: Duration) -> Option<u16> {
        let bpm = self.tap.register_tap(now);
        if let Some(bpm) = bpm {
            self.transport.set_tempo(now, bpm);
        }
        bpm
    }

    // --- synthesis ---------------------------------------------------------

    pub fn apply_preset(&mut self, now: Duration, preset: Preset) {
        let sequence = presets::generate(preset, self.size, DEFAULT_FRAME_COUNT);
        self.install(now, sequence);
    }

    pub fn apply_shader(&mut self, now: Duration, text: &str) {
        let sequence = Shader::compile(text).render(self.size, DEFAULT_FRAME_COUNT);
        self.install(now, sequence);
    }

    pub fn apply_particles(
        &mut self,
        now: Duration,
        params: &ParticleParams,
        seed: u64,
    ) -> Result<()> {
        let sequence = particles::simulate(params, self.size, DEFAULT_FRAME_COUNT, seed)?;
        self.install(now, sequence);
        Ok(())
    }

    /// Synthesises a generation response and records it in the history. On
    /// failure the previously displayed sequence is left untouched.
    pub fn apply_generated(
        &mut self,
        now: Duration,
        response: &PatternResponse,
        seed: u64,
        timestamp_ms: u64,
    ) -> Result<u64> {
        let pattern = generate::synthesize(response, self.size, seed)?;
        let entry = HistoryItem {
            id: 0,
            name: pattern.name,
            description: pattern.description,
            data: pattern.sequence.to_nested(),
            size: self.size,
            timestamp_ms,
        };
        self.install(now, pattern.sequence);
        Ok(self.history.append(entry))
    }

    /// Replaces the displayed sequence with imported interchange JSON,
    /// re-deriving the grid size from the data.
    pub fn import_frames(&mut self, now: Duration, json: &str) -> Result<()> {
        let sequence = FrameSequence::from_json(json)?;
        self.size = sequence.size();
        self.install(now, sequence);
        Ok(())
    }

    /// Serialises the currently displayed sequence.
    pub fn export_frames(&self) -> Result<String> {
        self.sequence().to_json()
    }

    /// Resizes the volume. Existing sequences are invalidated, so the
    /// default wave loop is regenerated at the new size.
    pub fn set_grid_size(&mut self, now: Duration, size: GridSize) -> Result<()> {
        size.validate()?;
        self.size = size;
        self.config.grid = size;
        let sequence = presets::generate(Preset::Wave, size, DEFAULT_FRAME_COUNT);
        self.install(now, sequence);
        Ok(())
    }

    fn install(&mut self, now: Duration, sequence: FrameSequence) {
        self.disable_audio(now);
        self.transport.set_sequence_len(now, sequence.len());
        self.sequence = sequence;
        self.transport.reset();
        self.transport.play(now);
    }

    // --- audio-reactive mode -----------------------------------------------

    /// Enters audio-reactive mode. The source factory runs first; if it
    /// fails nothing changes and the error propagates, so the caller's
    /// enabling flag can simply revert. On success the transport timer is
    /// cancelled before the synthesiser starts sampling.
    pub fn enable_audio<F>(&mut self, now: Duration, factory: F) -> Result<()>
    where
        F: FnOnce() -> Result<Box<dyn SpectrumSource>>,
    {
        if self.audio.is_some() {
            return Ok(());
        }
        let source = factory()?;
        self.transport.suspend();
        self.audio = Some(AudioSynth::start(
            self.size,
            self.config.audio.threshold,
            Duration::from_millis(self.config.audio.sample_interval_ms),
            source,
            now,
        ));
        Ok(())
    }

    /// Leaves audio-reactive mode, dropping the synthesiser (and with it the
    /// acquired source) and resuming the transport if playback was running.
    pub fn disable_audio(&mut self, now: Duration) {
        if self.audio.take().is_some() {
            self.transport.resume(now);
        }
    }

    pub fn set_audio_threshold(&mut self, threshold: f32) {
        self.config.audio.threshold = threshold;
        if let Some(audio) = &mut self.audio {
            audio.set_threshold(threshold);
        }
    }

    /// Drives whichever frame producer is active. Returns the number of
    /// transport advances (always zero while audio mode is active).
    pub fn poll(&mut self, now: Duration) -> Result<u32> {
        match &mut self.audio {
            Some(audio) => {
                audio.poll(now)?;
                Ok(0)
            }
            None => Ok(self.transport.poll(now)),
        }
    }
}
