//! Closed set of procedural pattern generators. Each preset is a pure
//! function of cell coordinates and loop phase, so the same request always
//! produces bit-identical frames. The default loop length of 32 frames spans
//! two musical bars at four subdivisions per beat.

use std::f32::consts::{PI, TAU};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::noise::value_noise;
use crate::{Frame, FrameSequence, GridSize, VoxelgramError};

/// Conventional loop length: two bars of 4/4 at 4 frames per beat.
pub const DEFAULT_FRAME_COUNT: usize = 32;

/// Named procedural patterns. The set is closed; unknown names are rejected
/// when parsing, before they can reach [`generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Wave,
    Scan,
    Pulse,
    Rain,
    Sphere,
    Spiral,
    Fireworks,
    Fountain,
    Cube,
    Dna,
    Plasma,
    Random,
    Clear,
}

impl Preset {
    pub const ALL: [Preset; 13] = [
        Preset::Wave,
        Preset::Scan,
        Preset::Pulse,
        Preset::Rain,
        Preset::Sphere,
        Preset::Spiral,
        Preset::Fireworks,
        Preset::Fountain,
        Preset::Cube,
        Preset::Dna,
        Preset::Plasma,
        Preset::Random,
        Preset::Clear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Wave => "wave",
            Preset::Scan => "scan",
            Preset::Pulse => "pulse",
            Preset::Rain => "rain",
            Preset::Sphere => "sphere",
            Preset::Spiral => "spiral",
            Preset::Fireworks => "fireworks",
            Preset::Fountain => "fountain",
            Preset::Cube => "cube",
            Preset::Dna => "dna",
            Preset::Plasma => "plasma",
            Preset::Random => "random",
            Preset::Clear => "clear",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = VoxelgramError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|preset| preset.as_str() == value)
            .ok_or_else(|| VoxelgramError::UnknownPreset(value.to_string()))
    }
}

/// Generates a full animation loop for the preset. Deterministic: calling
/// twice with identical arguments yields identical output.
pub fn generate(preset: Preset, size: GridSize, frame_count: usize) -> FrameSequence {
    let mut sequence = FrameSequence::new(size);
    let (cx, cy, cz) = size.center();

    for t in 0..frame_count {
        let mut frame = Frame::new(size);
        let progress = t as f32 / frame_count as f32;
        let phase = progress * TAU;

        for z in 0..size.z {
            for y in 0..size.y {
                for x in 0..size.x {
                    let xf = x as f32;
                    let yf = y as f32;
                    let zf = z as f32;
                    // Half-cell bias centers the formulas on the voxel grid.
                    let dx = xf - cx + 0.5;
                    let dy = yf - cy + 0.5;
                    let dz = zf - cz + 0.5;

                    let cell = CellContext {
                        size,
                        cx,
                        cy,
                        cz,
                        t,
                        phase,
                        x: xf,
                        y: yf,
                        z: zf,
                        dx,
                        dy,
                        dz,
                    };
                    frame.set(x, y, z, evaluate(preset, &cell));
                }
            }
        }
        sequence.push(frame);
    }
    sequence
}

struct CellContext {
    size: GridSize,
    cx: f32,
    cy: f32,
    cz: f32,
    t: usize,
    phase: f32,
    x: f32,
    y: f32,
    z: f32,
    dx: f32,
    dy: f32,
    dz: f32,
}

fn evaluate(preset: Preset, c: &CellContext) -> f32 {
    match preset {
        Preset::Random => {
            // Chaos level changes lock to 16th notes: time is discretized to
            // two-frame steps so sparkle cells are stable within a step.
            let t_step = (c.t / 2) as f32;
            let seed = (c.x * 12.9 + c.y * 78.2 + c.z * 37.7 + t_step * 13.1).sin() * 43_758.5;
            if seed - seed.floor() > 0.92 {
                255.0
            } else {
                0.0
            }
        }

        Preset::Wave => {
            // Two full radial waves per loop, one per bar.
            let d = (c.dx * c.dx + c.dz * c.dz).sqrt();
            let wave_y =
                (d * 0.5 - c.phase * 2.0).sin() * (c.size.y as f32 * 0.35) + c.cy;
            (255.0 - (c.y - wave_y).abs() * 150.0).max(0.0)
        }

        Preset::Scan => {
            // Two perpendicular sweep planes, one scan per bar each.
            let scan_phase = (c.phase * 2.0) % TAU;
            let scan_pos = (scan_phase.sin() + 1.0) / 2.0 * (c.size.z as f32 - 1.0);
            let mut val = (255.0 - (c.z - scan_pos).abs() * 200.0).max(0.0);
            let scan_pos2 = (scan_phase.cos() + 1.0) / 2.0 * (c.size.x as f32 - 1.0);
            val = val.max(255.0 - (c.x - scan_pos2).abs() * 200.0);
            val
        }

        Preset::Pulse => {
            // Expanding hollow shell, four pulses per loop. The power of 4
            // sharpens the pulse while keeping it visible.
            let beat_phase = (c.phase * 4.0) % TAU;
            let pulse_strength = (beat_phase - PI / 2.0).sin().max(0.0).powi(4);
            let p_r = pulse_strength * c.cx.min(c.cy).min(c.cz) * 1.2;
            let dist = (c.dx * c.dx + c.dy * c.dy + c.dz * c.dz).sqrt();
            let mut val = (255.0 - (dist - p_r).abs() * 200.0).max(0.0);
            // Core flash on the beat itself.
            if dist < 1.0 && pulse_strength > 0.8 {
                val = 255.0;
            }
            val
        }

        Preset::Rain => {
            // Per-column speed and offset derived from a stable hash so the
            // streaks loop seamlessly.
            let rain_seed = c.x * 17.3 + c.z * 31.7;
            let rain_rand = rain_seed.sin() * 0.5 + 0.5;
            let rain_speed = 1.0 + rain_rand * 0.5;
            let span = c.size.y as f32 * 1.5;
            let drop_y =
                span - (c.t as f32 * rain_speed + rain_rand * c.size.y as f32) % span;
            if (c.y - drop_y).abs() < 1.0 {
                255.0
            } else if c.y > drop_y && c.y < drop_y + 2.5 {
                150.0 * (1.0 - (c.y - drop_y) / 2.5)
            } else {
                0.0
            }
        }

        Preset::Sphere => {
            // Breathing shell, one breath per bar.
            let dist = (c.dx * c.dx + c.dy * c.dy + c.dz * c.dz).sqrt();
            let breath_r = ((c.phase * 2.0).sin() * 0.2 + 0.4) * c.size.min_extent() as f32;
            (255.0 - (dist - breath_r).abs() * 120.0).max(0.0)
        }

        Preset::Spiral => {
            // Helix sweep, one rotation per bar.
            let angle = c.dz.atan2(c.dx);
            let spiral_y =
                ((angle + c.phase * 2.0) / TAU * c.size.y as f32 * 2.0) % c.size.y as f32;
            (255.0 - (c.y - spiral_y).abs() * 100.0).max(0.0)
        }

        Preset::Fireworks => {
            // One launch per bar: frames 0-5 rise, 6-15 explode.
            let fw_t = c.t % 16;
            if fw_t < 6 {
                let rise_y = fw_t as f32 / 6.0 * (c.size.y as f32 * 0.7);
                if c.dx.abs() < 1.0 && c.dz.abs() < 1.0 && (c.y - rise_y).abs() < 1.5 {
                    255.0
                } else {
                    0.0
                }
            } else {
                let exp_p = (fw_t as f32 - 6.0) / 10.0;
                let exp_r = exp_p * c.cx.min(c.cy).min(c.cz) * 2.0;
                let burst_y = c.y - c.size.y as f32 * 0.7;
                let fw_dist = (c.dx * c.dx + burst_y * burst_y + c.dz * c.dz).sqrt();
                let mut val = 0.0;
                if (fw_dist - exp_r).abs() < 1.0 {
                    val = 255.0 * (1.0 - exp_p);
                }
                // Sparkle cells gate on the shared value noise so the burst
                // stays identical between runs.
                if value_noise(c.x, c.y, c.z, c.t as f32) > 0.8 && fw_dist < exp_r {
                    val = 200.0 * (1.0 - exp_p);
                }
                val
            }
        }

        Preset::Fountain => {
            // One jet per bar: a cone ring expanding outward over a column.
            let f_cycle = (c.t % 16) as f32 / 16.0;
            let f_y = f_cycle * c.size.y as f32;
            let f_dist = (c.dx * c.dx + c.dz * c.dz).sqrt();
            let cone_r = f_y * 0.6;
            let mut val = 0.0;
            if (f_dist - cone_r).abs() < 1.5 && (c.y - f_y).abs() < 2.0 {
                val = 255.0 * (1.0 - f_cycle * 0.5);
            }
            if f_dist < 1.0 && c.y < f_y {
                val = 200.0;
            }
            val
        }

        Preset::Cube => {
            // Bouncing wireframe cube, one bounce per bar.
            let side = ((c.phase * 2.0).sin() + 1.0) / 2.0 * (c.cx.min(c.cy).min(c.cz) * 0.7)
                + 1.0;
            let max_c = c.dx.abs().max(c.dy.abs()).max(c.dz.abs());
            let mut val: f32 = 0.0;
            if (max_c - side).abs() < 0.8 {
                val = 255.0;
            }
            if max_c < side {
                val = val.max(30.0);
            }
            val
        }

        Preset::Dna => {
            // Double helix rotating once per loop, strands half a turn apart.
            let dna_a = c.y / c.size.y as f32 * TAU + c.phase;
            let radius_x = c.size.x as f32 * 0.25;
            let radius_z = c.size.z as f32 * 0.25;
            let x1 = dna_a.cos() * radius_x + c.cx;
            let z1 = dna_a.sin() * radius_z + c.cz;
            let x2 = (dna_a + PI).cos() * radius_x + c.cx;
            let z2 = (dna_a + PI).sin() * radius_z + c.cz;
            let near = |px: f32, pz: f32| {
                ((c.x - px).powi(2) + (c.z - pz).powi(2)).sqrt() < 0.8
            };
            if near(x1, z1) || near(x2, z2) {
                255.0
            } else {
                0.0
            }
        }

        Preset::Plasma => {
            // Three-axis interference field, two cycles per loop.
            let v = (c.x * 0.5 + c.phase * 2.0).sin()
                + (c.y * 0.5 + c.phase * 3.0).sin()
                + (c.z * 0.5 + c.phase).sin();
            (v + 1.2) * 100.0
        }

        Preset::Clear => 0.0,
    }
}
