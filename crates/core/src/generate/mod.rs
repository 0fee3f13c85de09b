//! Structured contract with the external generative service.
//!
//! Only the response schema is specified here; transport is someone else's
//! problem. A response either routes to the expression sandbox (`shader`
//! mode) or the particle simulator (`particle` mode). Shader responses can
//! always be rendered thanks to the sandbox fallback; particle responses
//! without a usable spec are a synthesis failure and produce no frames at
//! all, leaving whatever was displayed before untouched.

use serde::{Deserialize, Serialize};

use crate::particles::{self, ParticleParams};
use crate::presets::DEFAULT_FRAME_COUNT;
use crate::shader::Shader;
use crate::{FrameSequence, GridSize, Result, VoxelgramError};

/// Expression used when a shader-mode response omits its logic.
pub const DEFAULT_SHADER: &str = "sin(d - t*10)*255";

/// Rendering engine selected by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Shader,
    Particle,
}

/// The trusted shape of a generation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternResponse {
    pub name: String,
    pub description: String,
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub particle_params: Option<ParticleParams>,
}

/// A synthesised pattern ready for playback.
#[derive(Debug, Clone)]
pub struct GeneratedPattern {
    pub name: String,
    pub description: String,
    pub sequence: FrameSequence,
}

/// Parses response JSON, folding shape violations into a synthesis failure.
pub fn parse_response(json: &str) -> Result<PatternResponse> {
    serde_json::from_str(json)
        .map_err(|err| VoxelgramError::Synthesis(format!("malformed response: {err}")))
}

/// Turns a validated response into a frame sequence.
pub fn synthesize(
    response: &PatternResponse,
    size: GridSize,
    seed: u64,
) -> Result<GeneratedPattern> {
    let sequence = match response.mode {
        Mode::Shader => {
            let logic = response.logic.as_deref().unwrap_or(DEFAULT_SHADER);
            Shader::compile(logic).render(size, DEFAULT_FRAME_COUNT)
        }
        Mode::Particle => {
            let params = response.particle_params.as_ref().ok_or_else(|| {
                VoxelgramError::Synthesis("particle mode without particleParams".into())
            })?;
            particles::simulate(params, size, DEFAULT_FRAME_COUNT, seed)?
        }
    };

    Ok(GeneratedPattern {
        name: response.name.clone(),
        description: response.description.clone(),
        sequence,
    })
}
