//! Discrete particle simulator. A set of point particles is integrated with
//! explicit Euler steps (one per frame) and splatted into the grid; the
//! particles themselves never leave this module.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{Frame, FrameSequence, GridSize, Result, VoxelgramError};

/// Upper bound on the particle count a single request may ask for.
pub const MAX_PARTICLES: u32 = 10_000;

/// Brightness added at a particle's cell each frame.
const SPLAT_CORE: u8 = 200;
/// Minimum brightness of the six axis-aligned neighbours of a lit cell.
const SPLAT_HALO: u8 = 50;
/// Out-of-bounds margin (in cells) beyond the volume on every axis.
const BOUNDS_MARGIN: f32 = 1.0;

/// How particles behave when their lifetime runs out or they leave the
/// volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// Synchronized burst from the emitter; exhausted particles stay dark
    /// until a re-burst late in the loop.
    Explode,
    /// Individual respawn at the top (or gravity-appropriate) boundary.
    Rain,
    /// Individual respawn at the bottom boundary, floating upward.
    Rise,
}

/// Physics settings for one simulation, matching the generation contract's
/// `particleParams` schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticleParams {
    pub count: u32,
    pub emitter: [f32; 3],
    pub velocity: [f32; 3],
    pub gravity: f32,
    pub spread: f32,
    pub lifetime: f32,
    pub behavior: Behavior,
}

impl ParticleParams {
    /// Parses a spec from contract JSON, folding shape violations into a
    /// synthesis failure.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| VoxelgramError::Synthesis(format!("malformed particle spec: {err}")))
    }

    /// Rejects specs that cannot drive a meaningful simulation. Malformed
    /// specs surface as a synthesis failure upstream, never a panic.
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 || self.count > MAX_PARTICLES {
            return Err(VoxelgramError::Synthesis(format!(
                "particle count {} outside [1, {MAX_PARTICLES}]",
                self.count
            )));
        }
        let finite = self
            .emitter
            .iter()
            .chain(self.velocity.iter())
            .chain([&self.gravity, &self.spread, &self.lifetime])
            .all(|value| value.is_finite());
        if !finite {
            return Err(VoxelgramError::Synthesis(
                "particle parameters must be finite numbers".into(),
            ));
        }
        if self.lifetime <= 0.0 {
            return Err(VoxelgramError::Synthesis(
                "particle lifetime must be positive".into(),
            ));
        }
        Ok(())
    }
}

struct Particle {
    pos: [f32; 3],
    vel: [f32; 3],
    life: f32,
}

/// Runs the simulation and splats every frame. The explicit seed makes runs
/// reproducible; identical `(params, size, frame_count, seed)` inputs yield
/// identical sequences.
pub fn simulate(
    params: &ParticleParams,
    size: GridSize,
    frame_count: usize,
    seed: u64,
) -> Result<FrameSequence> {
    params.validate()?;

    let mut rng = SmallRng::seed_from_u64(seed);
    let emitter = resolve_emitter(params.emitter, size);
    let span = |extent: u32| (extent.saturating_sub(1)) as f32;

    let mut particles: Vec<Particle> = (0..params.count)
        .map(|_| {
            let jitter = |rng: &mut SmallRng| (rng.gen::<f32>() - 0.5) * params.spread;
            Particle {
                pos: emitter,
                vel: [
                    params.velocity[0] + jitter(&mut rng),
                    params.velocity[1] + jitter(&mut rng),
                    params.velocity[2] + jitter(&mut rng),
                ],
                // Staggered lifetimes avoid a synchronized first burst.
                life: rng.gen::<f32>() * params.lifetime,
            }
        })
        .collect();

    if params.behavior == Behavior::Rain {
        // Rain ignores the emitter: scatter across the horizontal plane in
        // an elevated band above the volume.
        for particle in &mut particles {
            particle.pos = [
                rng.gen::<f32>() * span(size.x),
                rng.gen::<f32>() * span(size.y) + 2.0,
                rng.gen::<f32>() * span(size.z),
            ];
        }
    }

    // Exhausted explode particles only re-burst once the loop is past its
    // 5/8 mark, keeping the burst synchronized instead of continuous.
    let reburst_frame = frame_count * 5 / 8;

    let mut sequence = FrameSequence::new(size);
    for frame_index in 0..frame_count {
        let mut frame = Frame::new(size);

        for particle in &mut particles {
            particle.pos[0] += particle.vel[0];
            particle.pos[1] += particle.vel[1];
            particle.pos[2] += particle.vel[2];
            particle.vel[1] += params.gravity;
            particle.life -= 1.0;

            if particle.life <= 0.0 || out_of_bounds(&particle.pos, size) {
                match params.behavior {
                    Behavior::Explode => {
                        if frame_index > reburst_frame {
                            particle.pos = emitter;
                            particle.vel = [
                                params.velocity[0],
                                params.velocity[1] + 0.2,
                                params.velocity[2],
                            ];
                            particle.life = params.lifetime;
                        }
                    }
                    Behavior::Rain | Behavior::Rise => {
                        particle.pos[1] = if params.gravity < 0.0 {
                            size.y as f32 + 0.5
                        } else {
                            -0.5
                        };
                        particle.pos[0] = rng.gen::<f32>() * span(size.x);
                        particle.pos[2] = rng.gen::<f32>() * span(size.z);
                        particle.vel[1] = params.velocity[1];
                        particle.life = params.lifetime;
                    }
                }
            }

            splat(&mut frame, particle.pos);
        }

        sequence.push(frame);
    }
    Ok(sequence)
}

/// Components in `[0, 1]` are treated as normalized and scaled to the axis;
/// anything else is used as an absolute cell coordinate.
fn resolve_emitter(emitter: [f32; 3], size: GridSize) -> [f32; 3] {
    let resolve = |value: f32, extent: u32| {
        if (0.0..=1.0).contains(&value) {
            value * (extent.saturating_sub(1)) as f32
        } else {
            value
        }
    };
    [
        resolve(emitter[0], size.x),
        resolve(emitter[1], size.y),
        resolve(emitter[2], size.z),
    ]
}

fn out_of_bounds(pos: &[f32; 3], size: GridSize) -> bool {
    let outside = |value: f32, extent: u32| {
        value < -BOUNDS_MARGIN || value > extent as f32 + BOUNDS_MARGIN
    };
    outside(pos[0], size.x) || outside(pos[1], size.y) || outside(pos[2], size.z)
}

fn splat(frame: &mut Frame, pos: [f32; 3]) {
    let gx = pos[0].round() as i64;
    let gy = pos[1].round() as i64;
    let gz = pos[2].round() as i64;
    frame.deposit(gx, gy, gz, SPLAT_CORE);
    // Soften the single-voxel point with its axis-aligned neighbours.
    const NEIGHBOURS: [(i64, i64, i64); 6] = [
        (0, 1, 0),
        (0, -1, 0),
        (1, 0, 0),
        (-1, 0, 0),
        (0, 0, 1),
        (0, 0, -1),
    ];
    for (dx, dy, dz) in NEIGHBOURS {
        frame.lift(gx + dx, gy + dy, gz + dz, SPLAT_HALO);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube8() -> GridSize {
        GridSize::cube(8).unwrap()
    }

    fn rain_params() -> ParticleParams {
        ParticleParams {
            count: 40,
            emitter: [0.5, 0.9, 0.5],
            velocity: [0.0, -0.8, 0.0],
            gravity: -0.05,
            spread: 0.3,
            lifetime: 12.0,
            behavior: Behavior::Rain,
        }
    }

    #[test]
    fn validation_rejects_degenerate_specs() {
        let mut params = rain_params();
        params.count = 0;
        assert!(params.validate().is_err());

        let mut params = rain_params();
        params.count = MAX_PARTICLES + 1;
        assert!(params.validate().is_err());

        let mut params = rain_params();
        params.gravity = f32::NAN;
        assert!(params.validate().is_err());

        let mut params = rain_params();
        params.lifetime = 0.0;
        assert!(params.validate().is_err());

        assert!(rain_params().validate().is_ok());
    }

    #[test]
    fn identical_seeds_reproduce_identical_sequences() {
        let params = rain_params();
        let a = simulate(&params, cube8(), 32, 7).unwrap();
        let b = simulate(&params, cube8(), 32, 7).unwrap();
        assert_eq!(a, b);

        let c = simulate(&params, cube8(), 32, 8).unwrap();
        assert_ne!(a, c, "different seeds should scatter differently");
    }

    #[test]
    fn rain_keeps_raining_past_individual_lifetimes() {
        let params = rain_params();
        let sequence = simulate(&params, cube8(), 64, 3).unwrap();
        // Long after lifetime + fall distance, respawned drops must still
        // be lighting cells.
        let tail_lit: usize = sequence.frames()[40..]
            .iter()
            .map(|frame| frame.cells().iter().filter(|&&cell| cell > 0).count())
            .sum();
        assert!(tail_lit > 0, "rain died out instead of respawning");
    }

    #[test]
    fn explode_goes_dark_then_rebursts() {
        let params = ParticleParams {
            count: 60,
            emitter: [0.5, 0.5, 0.5],
            velocity: [0.0, 0.3, 0.0],
            gravity: -0.02,
            spread: 0.8,
            lifetime: 6.0,
            behavior: Behavior::Explode,
        };
        let sequence = simulate(&params, cube8(), 32, 11).unwrap();
        let lit = |index: usize| {
            sequence
                .frame(index)
                .unwrap()
                .cells()
                .iter()
                .filter(|&&cell| cell > 0)
                .count()
        };
        // The initial burst leaves the emitter region immediately.
        assert!(lit(0) > 0, "initial burst deposited nothing");
        // Every lifetime (max 6 frames) has expired by frame 21, so the
        // first frame past the re-burst threshold respawns all particles at
        // the emitter, which saturates the center cell.
        assert_eq!(sequence.frame(21).unwrap().get(4, 4, 4), 255);
    }

    #[test]
    fn rise_spawns_from_the_bottom() {
        let params = ParticleParams {
            count: 30,
            emitter: [0.5, 0.0, 0.5],
            velocity: [0.0, 0.6, 0.0],
            gravity: 0.0,
            spread: 0.4,
            lifetime: 10.0,
            behavior: Behavior::Rise,
        };
        let sequence = simulate(&params, cube8(), 32, 5).unwrap();
        // Rising particles traverse the volume, so both halves see light
        // somewhere in the loop.
        let mut lower = 0usize;
        let mut upper = 0usize;
        for frame in sequence.frames() {
            for z in 0..8 {
                for y in 0..8u32 {
                    for x in 0..8 {
                        if frame.get(x, y, z) > 0 {
                            if y < 4 {
                                lower += 1;
                            } else {
                                upper += 1;
                            }
                        }
                    }
                }
            }
        }
        assert!(lower > 0 && upper > 0);
    }

    #[test]
    fn normalized_and_absolute_emitters_resolve() {
        let resolved = resolve_emitter([0.5, 1.0, 12.0], cube8());
        assert_eq!(resolved, [3.5, 7.0, 12.0]);
    }

    #[test]
    fn parses_contract_json() {
        let json = r#"{
            "count": 80,
            "emitter": [0.5, 0.5, 0.5],
            "velocity": [0.0, 0.4, 0.0],
            "gravity": -0.03,
            "spread": 0.6,
            "lifetime": 14,
            "behavior": "explode"
        }"#;
        let params = ParticleParams::from_json(json).unwrap();
        assert_eq!(params.behavior, Behavior::Explode);
        assert!(ParticleParams::from_json("{}").is_err());
        assert_eq!(params.count, 80);
        assert!(params.validate().is_ok());
    }
}
