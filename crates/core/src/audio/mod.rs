//! Audio-reactive frame synthesis.
//!
//! The synthesiser consumes a frequency-domain magnitude spectrum from a
//! [`SpectrumSource`] on its own fixed sampling interval, independent of the
//! playback transport. Acquiring the underlying input device is the
//! embedder's job; the core only sees the source, so a failed acquisition
//! never leaves partial state here.

use std::time::Duration;
use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{Frame, FrameSequence, GridSize, Result, VoxelgramError};

/// Fixed sampling cadence of the synthesiser timer.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

/// Provider of the current magnitude spectrum, on a 0-255 scale (the byte
/// spectrum convention the gate threshold range is calibrated against).
pub trait SpectrumSource {
    fn spectrum(&mut self) -> Result<&[f32]>;
}

/// FFT-backed [`SpectrumSource`] fed with pushed mono sample blocks.
///
/// Live capture calls [`push_block`](Self::push_block) repeatedly; the most
/// recent block defines the spectrum until the next one arrives. A Hann
/// window is applied before the transform, and the FFT plan plus scratch
/// buffers are cached per block size.
pub struct FftSpectrumSource {
    sample_rate: u32,
    planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
    magnitudes: Vec<f32>,
}

impl FftSpectrumSource {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            planner: RealFftPlanner::new(),
            fft: None,
            magnitudes: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Analyses one block of samples and replaces the current spectrum.
    pub fn push_block(&mut self, samples: &[f32]) -> Result<()> {
        if samples.len() < 2 {
            return Err(VoxelgramError::AudioSource(
                "analysis requires blocks with at least two samples".into(),
            ));
        }

        let len = samples.len();
        let fft = self.prepare_fft(len);
        for (index, value) in samples.iter().enumerate() {
            fft.input[index] = *value * hann_value(index, len);
        }
        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        // Scale so a full-range sinusoid peaks near 255.
        let scale = 2.0 / len as f32 * 255.0;
        let magnitudes: Vec<f32> = fft
            .spectrum
            .iter()
            .map(|bin| (bin.norm() * scale).min(255.0))
            .collect();
        self.magnitudes.clear();
        self.magnitudes.extend(magnitudes);
        Ok(())
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        let rebuild = self
            .fft
            .as_ref()
            .map(|fft| fft.size != size)
            .unwrap_or(true);

        if rebuild {
            let plan = self.planner.plan_fft_forward(size);
            let scratch = plan.make_scratch_vec();
            let spectrum = plan.make_output_vec();
            let input = plan.make_input_vec();
            self.fft = Some(FftResources {
                size,
                plan,
                scratch,
                spectrum,
                input,
            });
        }

        self.fft.as_mut().expect("fft resources must exist")
    }
}

impl SpectrumSource for FftSpectrumSource {
    fn spectrum(&mut self) -> Result<&[f32]> {
        Ok(&self.magnitudes)
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for FftSpectrumSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftSpectrumSource")
            .field("sample_rate", &self.sample_rate)
            .field("bins", &self.magnitudes.len())
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

/// Live audio-reactive synthesiser.
///
/// While active it owns the displayed buffer: a single frame whose depth
/// slices form a scrolling history of recent spectra, newest at depth zero.
/// The playback transport's timer must be suspended for as long as one of
/// these is alive; the engine enforces that ordering.
pub struct AudioSynth {
    size: GridSize,
    threshold: f32,
    interval: Duration,
    deadline: Duration,
    buffer: FrameSequence,
    source: Box<dyn SpectrumSource>,
}

impl AudioSynth {
    /// Activates the synthesiser with an already-acquired source. The first
    /// sample fires one interval after `now`.
    pub fn start(
        size: GridSize,
        threshold: f32,
        interval: Duration,
        source: Box<dyn SpectrumSource>,
        now: Duration,
    ) -> Self {
        let mut buffer = FrameSequence::new(size);
        buffer.push(Frame::new(size));
        Self {
            size,
            threshold,
            interval,
            deadline: now + interval,
            buffer,
            source,
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// The maintained single-frame sequence; the displayed frame is always
    /// index zero.
    pub fn buffer(&self) -> &FrameSequence {
        &self.buffer
    }

    /// Runs every sampling tick that has elapsed up to `now`. Returns true
    /// if the buffer changed.
    pub fn poll(&mut self, now: Duration) -> Result<bool> {
        let mut updated = false;
        while now >= self.deadline {
            self.deadline += self.interval;
            updated |= self.sample_once()?;
        }
        Ok(updated)
    }

    fn sample_once(&mut self) -> Result<bool> {
        let spectrum = self.source.spectrum()?;
        let peak = spectrum.iter().copied().fold(0.0_f32, f32::max);
        // Gate: quiet ticks leave the buffer untouched.
        if peak <= self.threshold {
            return Ok(false);
        }

        let previous = self
            .buffer
            .frame(0)
            .cloned()
            .unwrap_or_else(|| Frame::new(self.size));
        let mut frame = Frame::new(self.size);

        // Scroll the existing history one slice deeper.
        for z in 1..self.size.z {
            for y in 0..self.size.y {
                for x in 0..self.size.x {
                    frame.set(x, y, z, f32::from(previous.get(x, y, z - 1)));
                }
            }
        }

        // Newest slice: one binary column per band.
        let bands = band_averages(spectrum, self.size.x as usize);
        for (x, average) in bands.iter().enumerate() {
            let height = average / 255.0 * self.size.y as f32;
            for y in 0..self.size.y {
                let value = if (y as f32) < height { 255.0 } else { 0.0 };
                frame.set(x as u32, y, 0, value);
            }
        }

        let mut buffer = FrameSequence::new(self.size);
        buffer.push(frame);
        self.buffer = buffer;
        Ok(true)
    }
}

impl fmt::Debug for AudioSynth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSynth")
            .field("size", &self.size)
            .field("threshold", &self.threshold)
            .field("interval", &self.interval)
            .finish()
    }
}

/// Partitions the spectrum into `bands` contiguous groups and averages each.
/// A spectrum narrower than the band count degenerates to one bin per band,
/// with missing bands reading zero.
fn band_averages(spectrum: &[f32], bands: usize) -> Vec<f32> {
    let bins_per_band = spectrum.len() / bands.max(1);
    (0..bands)
        .map(|band| {
            if bins_per_band == 0 {
                return spectrum.get(band).copied().unwrap_or(0.0);
            }
            let start = band * bins_per_band;
            let slice = &spectrum[start..start + bins_per_band];
            slice.iter().sum::<f32>() / bins_per_band as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedSource {
        spectrum: Vec<f32>,
        reads: usize,
    }

    impl CannedSource {
        fn new(spectrum: Vec<f32>) -> Self {
            Self { spectrum, reads: 0 }
        }
    }

    impl SpectrumSource for CannedSource {
        fn spectrum(&mut self) -> Result<&[f32]> {
            self.reads += 1;
            Ok(&self.spectrum)
        }
    }

    fn cube4() -> GridSize {
        GridSize::cube(4).unwrap()
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn start_synth(spectrum: Vec<f32>, threshold: f32) -> AudioSynth {
        AudioSynth::start(
            cube4(),
            threshold,
            DEFAULT_SAMPLE_INTERVAL,
            Box::new(CannedSource::new(spectrum)),
            ms(0),
        )
    }

    #[test]
    fn quiet_spectrum_is_gated() {
        let mut synth = start_synth(vec![10.0; 8], 30.0);
        let before = synth.buffer().clone();
        assert!(!synth.poll(ms(50)).unwrap());
        assert_eq!(synth.buffer(), &before);
    }

    #[test]
    fn loud_spectrum_writes_band_columns() {
        // Left half of the spectrum loud, right half silent; width 4 over
        // 8 bins gives 2 bins per band.
        let mut spectrum = vec![255.0; 4];
        spectrum.extend([0.0; 4]);
        let mut synth = start_synth(spectrum, 30.0);
        assert!(synth.poll(ms(50)).unwrap());

        let frame = synth.buffer().frame(0).unwrap();
        for y in 0..4 {
            assert_eq!(frame.get(0, y, 0), 255, "band 0 should be a full column");
            assert_eq!(frame.get(1, y, 0), 255, "band 1 should be a full column");
            assert_eq!(frame.get(3, y, 0), 0, "band 3 should be silent");
        }
    }

    #[test]
    fn history_scrolls_into_depth() {
        let mut synth = start_synth(vec![255.0; 8], 30.0);
        assert!(synth.poll(ms(50)).unwrap());
        let first = synth.buffer().frame(0).unwrap().clone();
        assert!(synth.poll(ms(100)).unwrap());

        let frame = synth.buffer().frame(0).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(frame.get(x, y, 1), first.get(x, y, 0));
            }
        }
    }

    #[test]
    fn buffer_stays_a_single_frame() {
        let mut synth = start_synth(vec![255.0; 8], 30.0);
        synth.poll(ms(250)).unwrap();
        assert_eq!(synth.buffer().len(), 1);
    }

    #[test]
    fn polling_before_the_deadline_does_not_sample() {
        let source = CannedSource::new(vec![255.0; 8]);
        let mut synth = AudioSynth::start(
            cube4(),
            30.0,
            DEFAULT_SAMPLE_INTERVAL,
            Box::new(source),
            ms(0),
        );
        assert!(!synth.poll(ms(49)).unwrap());
        assert_eq!(synth.buffer().frame(0).unwrap().cells().iter().sum::<u8>(), 0);
    }

    #[test]
    fn catch_up_runs_every_elapsed_tick() {
        let mut synth = start_synth(vec![255.0; 8], 30.0);
        // Three intervals elapse in one poll: the newest three depth slices
        // are all populated.
        assert!(synth.poll(ms(150)).unwrap());
        let frame = synth.buffer().frame(0).unwrap();
        assert!(frame.get(0, 0, 0) > 0);
        assert!(frame.get(0, 0, 1) > 0);
        assert!(frame.get(0, 0, 2) > 0);
        assert_eq!(frame.get(0, 0, 3), 0);
    }

    #[test]
    fn narrow_spectrum_degenerates_to_one_bin_per_band() {
        let mut synth = start_synth(vec![255.0, 255.0], 30.0);
        assert!(synth.poll(ms(50)).unwrap());
        let frame = synth.buffer().frame(0).unwrap();
        assert_eq!(frame.get(0, 0, 0), 255);
        assert_eq!(frame.get(1, 0, 0), 255);
        assert_eq!(frame.get(2, 0, 0), 0);
        assert_eq!(frame.get(3, 0, 0), 0);
    }

    #[test]
    fn fft_source_resolves_a_constant_block() {
        let mut source = FftSpectrumSource::new(48_000);
        source.push_block(&vec![1.0; 256]).unwrap();
        let spectrum = source.spectrum().unwrap();
        assert_eq!(spectrum.len(), 129);
        assert!(spectrum[0] > 200.0, "DC bin should dominate: {}", spectrum[0]);
        assert!(spectrum[64] < 5.0, "mid bins should be near silent");
    }

    #[test]
    fn fft_source_rejects_tiny_blocks() {
        let mut source = FftSpectrumSource::new(48_000);
        assert!(source.push_block(&[]).is_err());
        assert!(source.push_block(&[0.5]).is_err());
    }
}
