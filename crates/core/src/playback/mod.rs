//! Playback transport: owns the current-frame cursor and the repeating frame
//! timer, deriving its period from either a musical tempo or a flat frame
//! rate.
//!
//! Time is injected by the caller as a [`Duration`] since an arbitrary fixed
//! epoch and the timer is poll-driven, so scheduling stays deterministic and
//! testable. Every parameter change replaces the timer (cancel and
//! reschedule from `now`); a running timer's period is never edited in
//! place, which keeps reconfiguration free of drift and double-advances.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PlaybackConfig;
use crate::tempo::{MAX_BPM, MIN_BPM};

/// Shortest allowed timer period.
pub const MIN_PERIOD: Duration = Duration::from_millis(16);

/// Speed multipliers offered by the standard control surface. Any positive
/// multiplier is accepted; these are the conventional stops.
pub const SPEED_STEPS: [f64; 4] = [0.5, 1.0, 2.0, 4.0];

/// Frames advanced per beat when tempo sync is enabled (16th notes in 4/4).
const SUBDIVISIONS_PER_BEAT: f64 = 4.0;

/// Externally visible playback state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_frame: usize,
    pub speed_multiplier: f64,
    pub fps: f64,
}

/// Musical clock settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TempoState {
    pub bpm: u16,
    pub sync: bool,
}

/// Repeating deadline timer. `poll` reports how many periods have elapsed,
/// catching up if the caller was late.
#[derive(Debug, Default)]
struct FrameTimer {
    period: Duration,
    deadline: Option<Duration>,
}

impl FrameTimer {
    fn schedule(&mut self, now: Duration, period: Duration) {
        self.period = period;
        self.deadline = Some(now + period);
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    fn is_scheduled(&self) -> bool {
        self.deadline.is_some()
    }

    fn poll(&mut self, now: Duration) -> u32 {
        let mut fires = 0;
        while let Some(deadline) = self.deadline {
            if now < deadline {
                break;
            }
            self.deadline = Some(deadline + self.period);
            fires += 1;
        }
        fires
    }
}

/// The playback scheduler.
#[derive(Debug)]
pub struct Transport {
    state: PlaybackState,
    tempo: TempoState,
    sequence_len: usize,
    timer: FrameTimer,
    suspended: bool,
}

impl Transport {
    pub fn new(config: &PlaybackConfig) -> Self {
        let fps = if config.fps.is_finite() && config.fps > 0.0 {
            config.fps
        } else {
            12.0
        };
        let speed = if config.speed_multiplier.is_finite() && config.speed_multiplier > 0.0 {
            config.speed_multiplier
        } else {
            1.0
        };
        Self {
            state: PlaybackState {
                is_playing: false,
                current_frame: 0,
                speed_multiplier: speed,
                fps,
            },
            tempo: TempoState {
                bpm: config.bpm.clamp(MIN_BPM, MAX_BPM),
                sync: config.tempo_sync,
            },
            sequence_len: 0,
            timer: FrameTimer::default(),
            suspended: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn tempo(&self) -> TempoState {
        self.tempo
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn current_frame(&self) -> usize {
        self.state.current_frame
    }

    pub fn sequence_len(&self) -> usize {
        self.sequence_len
    }

    /// Current timer period: `max(16 ms, base / speed)` where base is a 16th
    /// note with tempo sync, else one frame at the base rate.
    pub fn period(&self) -> Duration {
        let base_ms = if self.tempo.sync {
            60_000.0 / f64::from(self.tempo.bpm) / SUBDIVISIONS_PER_BEAT
        } else {
            1000.0 / self.state.fps
        };
        // The cap keeps the conversion panic-free for degenerate speeds.
        let seconds = (base_ms / self.state.speed_multiplier / 1000.0).min(3600.0);
        Duration::from_secs_f64(seconds).max(MIN_PERIOD)
    }

    pub fn play(&mut self, now: Duration) {
        self.state.is_playing = true;
        self.reschedule(now);
    }

    pub fn pause(&mut self) {
        self.state.is_playing = false;
        self.timer.cancel();
    }

    pub fn toggle(&mut self, now: Duration) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play(now);
        }
    }

    /// Rewinds the cursor without touching the play state or the timer.
    pub fn reset(&mut self) {
        self.state.current_frame = 0;
    }

    pub fn set_speed(&mut self, now: Duration, multiplier: f64) {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return;
        }
        self.state.speed_multiplier = multiplier;
        self.reschedule(now);
    }

    pub fn set_tempo(&mut self, now: Duration, bpm: u16) {
        self.tempo.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        self.reschedule(now);
    }

    pub fn set_tempo_sync(&mut self, now: Duration, enabled: bool) {
        self.tempo.sync = enabled;
        self.reschedule(now);
    }

    pub fn set_frame_rate(&mut self, now: Duration, fps: f64) {
        if !fps.is_finite() || fps <= 0.0 {
            return;
        }
        self.state.fps = fps;
        self.reschedule(now);
    }

    /// Installs a new sequence length. A shrinking sequence re-derives the
    /// cursor modulo the new length rather than resetting playback.
    pub fn set_sequence_len(&mut self, now: Duration, len: usize) {
        self.sequence_len = len;
        if len == 0 {
            self.state.current_frame = 0;
            self.timer.cancel();
            return;
        }
        self.state.current_frame %= len;
        if !self.timer.is_scheduled() {
            self.reschedule(now);
        }
    }

    /// Cancels the frame timer while an audio-reactive synthesiser owns the
    /// displayed buffer.
    pub fn suspend(&mut self) {
        self.suspended = true;
        self.timer.cancel();
    }

    /// Restores normal scheduling if playback was left running.
    pub fn resume(&mut self, now: Duration) {
        self.suspended = false;
        self.reschedule(now);
    }

    /// Advances the cursor for every period elapsed up to `now`. Returns the
    /// number of frames advanced.
    pub fn poll(&mut self, now: Duration) -> u32 {
        let fires = self.timer.poll(now);
        if fires > 0 && self.sequence_len > 0 {
            self.state.current_frame =
                (self.state.current_frame + fires as usize) % self.sequence_len;
        }
        fires
    }

    fn reschedule(&mut self, now: Duration) {
        if self.state.is_playing && !self.suspended && self.sequence_len > 0 {
            self.timer.schedule(now, self.period());
        } else {
            self.timer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn transport(len: usize) -> Transport {
        let mut transport = Transport::new(&PlaybackConfig::default());
        transport.set_sequence_len(ms(0), len);
        transport
    }

    #[test]
    fn tempo_synced_period_is_a_sixteenth_note() {
        let transport = transport(32);
        // 120 BPM, speed 1: 60000 / 120 / 4.
        assert_eq!(transport.period(), Duration::from_millis(125));
    }

    #[test]
    fn speed_divides_the_period() {
        let mut transport = transport(32);
        transport.set_speed(ms(0), 2.0);
        assert_eq!(transport.period(), Duration::from_micros(62_500));
    }

    #[test]
    fn period_clamps_at_sixteen_milliseconds() {
        let mut transport = transport(32);
        // 125 ms / 8 = 15.625 ms, below the floor.
        transport.set_speed(ms(0), 8.0);
        assert_eq!(transport.period(), MIN_PERIOD);
        // Just below the ~7.8x threshold the floor is not hit yet.
        transport.set_speed(ms(0), 7.5);
        assert!(transport.period() > MIN_PERIOD);
    }

    #[test]
    fn flat_frame_rate_period_without_sync() {
        let mut transport = transport(32);
        transport.set_tempo_sync(ms(0), false);
        let period = transport.period().as_secs_f64();
        assert!((period - 1.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn advancement_wraps_after_a_full_loop() {
        let mut transport = transport(4);
        transport.play(ms(0));
        // Period is 125 ms; four ticks elapse by 500 ms.
        assert_eq!(transport.poll(ms(500)), 4);
        assert_eq!(transport.current_frame(), 0);
        assert_eq!(transport.poll(ms(875)), 3);
        assert_eq!(transport.current_frame(), 3);
    }

    #[test]
    fn zero_length_sequences_are_a_no_op() {
        let mut transport = transport(0);
        transport.play(ms(0));
        assert_eq!(transport.poll(ms(10_000)), 0);
        assert_eq!(transport.current_frame(), 0);
    }

    #[test]
    fn pausing_cancels_the_timer() {
        let mut transport = transport(8);
        transport.play(ms(0));
        transport.pause();
        assert_eq!(transport.poll(ms(1000)), 0);
        assert!(!transport.is_playing());
    }

    #[test]
    fn reconfiguration_replaces_the_timer_without_double_advance() {
        let mut transport = transport(32);
        transport.play(ms(0));
        // 100 ms in, the first 125 ms deadline has not fired yet.
        assert_eq!(transport.poll(ms(100)), 0);
        // Speeding up reschedules from now: the next fire is at 162.5 ms,
        // not the stale 125 ms deadline.
        transport.set_speed(ms(100), 2.0);
        assert_eq!(transport.poll(ms(130)), 0);
        assert_eq!(transport.poll(ms(163)), 1);
    }

    #[test]
    fn shrinking_sequence_re_derives_the_cursor() {
        let mut transport = transport(10);
        transport.play(ms(0));
        transport.poll(ms(875)); // 7 ticks
        assert_eq!(transport.current_frame(), 7);
        transport.set_sequence_len(ms(875), 3);
        assert_eq!(transport.current_frame(), 1);
    }

    #[test]
    fn suspension_halts_ticking_and_resume_restores_it() {
        let mut transport = transport(8);
        transport.play(ms(0));
        transport.suspend();
        assert_eq!(transport.poll(ms(1000)), 0);
        assert!(transport.is_playing(), "suspension must not clear play state");

        transport.resume(ms(1000));
        assert_eq!(transport.poll(ms(1125)), 1);
    }

    #[test]
    fn resume_while_paused_stays_idle() {
        let mut transport = transport(8);
        transport.suspend();
        transport.resume(ms(0));
        assert_eq!(transport.poll(ms(1000)), 0);
    }

    #[test]
    fn tempo_values_clamp_into_range() {
        let mut transport = transport(8);
        transport.set_tempo(ms(0), 10);
        assert_eq!(transport.tempo().bpm, MIN_BPM);
        transport.set_tempo(ms(0), 900);
        assert_eq!(transport.tempo().bpm, MAX_BPM);
    }
}
