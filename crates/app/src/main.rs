use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use voxelgram_core::{
    generate, particles, presets, FrameSequence, GridSize, ParticleParams, PlaybackConfig, Preset,
    Shader, Transport,
};

fn main() -> voxelgram_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Preset {
            name,
            size,
            frames,
            output,
        } => run_preset(&name, size, frames, output.as_deref()),
        Commands::Shader {
            expr,
            size,
            frames,
            output,
        } => run_shader(&expr, size, frames, output.as_deref()),
        Commands::Particles {
            spec,
            size,
            frames,
            seed,
            output,
        } => run_particles(&spec, size, frames, seed, output.as_deref()),
        Commands::Synthesize {
            response,
            size,
            seed,
            output,
        } => run_synthesize(&response, size, seed, output.as_deref()),
        Commands::Play {
            input,
            bpm,
            fps,
            no_sync,
            speed,
            ticks,
        } => run_play(&input, bpm, fps, no_sync, speed, ticks),
    }
}

fn run_preset(
    name: &str,
    size: u32,
    frames: usize,
    output: Option<&std::path::Path>,
) -> voxelgram_core::Result<()> {
    let preset: Preset = name.parse()?;
    let grid = GridSize::cube(size)?;
    tracing::info!(%preset, size, frames, "generating procedural pattern");
    let sequence = presets::generate(preset, grid, frames);
    emit(&sequence, output)
}

fn run_shader(
    expr: &str,
    size: u32,
    frames: usize,
    output: Option<&std::path::Path>,
) -> voxelgram_core::Result<()> {
    let grid = GridSize::cube(size)?;
    if let Err(err) = Shader::parse(expr) {
        tracing::warn!(%err, "expression did not compile, using fallback");
    }
    let sequence = Shader::compile(expr).render(grid, frames);
    emit(&sequence, output)
}

fn run_particles(
    spec: &PathBuf,
    size: u32,
    frames: usize,
    seed: u64,
    output: Option<&std::path::Path>,
) -> voxelgram_core::Result<()> {
    let grid = GridSize::cube(size)?;
    let params = ParticleParams::from_json(&std::fs::read_to_string(spec)?)?;
    tracing::info!(count = params.count, ?params.behavior, "simulating particles");
    let sequence = particles::simulate(&params, grid, frames, seed)?;
    emit(&sequence, output)
}

fn run_synthesize(
    response: &PathBuf,
    size: u32,
    seed: u64,
    output: Option<&std::path::Path>,
) -> voxelgram_core::Result<()> {
    let grid = GridSize::cube(size)?;
    let response = generate::parse_response(&std::fs::read_to_string(response)?)?;
    let pattern = generate::synthesize(&response, grid, seed)?;
    tracing::info!(name = %pattern.name, mode = ?response.mode, "synthesised pattern");
    emit(&pattern.sequence, output)
}

fn run_play(
    input: &PathBuf,
    bpm: u16,
    fps: f64,
    no_sync: bool,
    speed: f64,
    ticks: u32,
) -> voxelgram_core::Result<()> {
    let sequence = FrameSequence::from_json(&std::fs::read_to_string(input)?)?;
    let mut transport = Transport::new(&PlaybackConfig {
        fps,
        speed_multiplier: speed,
        bpm,
        tempo_sync: !no_sync,
    });
    transport.set_sequence_len(Duration::ZERO, sequence.len());
    transport.play(Duration::ZERO);

    let period = transport.period();
    tracing::info!(
        frames = sequence.len(),
        period_ms = period.as_secs_f64() * 1000.0,
        "simulating playback"
    );

    let mut now = Duration::ZERO;
    for tick in 0..ticks {
        now += period;
        transport.poll(now);
        let index = transport.current_frame();
        let lit = sequence
            .frame(index)
            .map(|frame| frame.cells().iter().filter(|&&cell| cell > 0).count())
            .unwrap_or(0);
        tracing::info!(tick, frame = index, lit, "advanced");
    }
    Ok(())
}

fn emit(sequence: &FrameSequence, output: Option<&std::path::Path>) -> voxelgram_core::Result<()> {
    let json = sequence.to_json()?;
    match output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Volumetric light pattern sequencer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a named procedural pattern.
    Preset {
        /// Preset name (wave, scan, pulse, rain, sphere, spiral, fireworks,
        /// fountain, cube, dna, plasma, random, clear).
        name: String,
        #[arg(short, long, default_value_t = 8)]
        size: u32,
        #[arg(short, long, default_value_t = 32)]
        frames: usize,
        /// Write interchange JSON here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render a scalar-field expression.
    Shader {
        /// Expression over x, y, z, nx, ny, nz, t, d, nd, r and noise().
        expr: String,
        #[arg(short, long, default_value_t = 8)]
        size: u32,
        #[arg(short, long, default_value_t = 32)]
        frames: usize,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Simulate a particle spec (JSON file with the particleParams schema).
    Particles {
        spec: PathBuf,
        #[arg(short, long, default_value_t = 8)]
        size: u32,
        #[arg(short, long, default_value_t = 32)]
        frames: usize,
        /// Simulation seed; identical seeds reproduce identical output.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a generation-service response through the synthesis contract.
    Synthesize {
        /// Path to the response JSON.
        response: PathBuf,
        #[arg(short, long, default_value_t = 8)]
        size: u32,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Simulate tempo-synced playback of an interchange file.
    Play {
        /// Path to interchange JSON ([time][depth][height][width]).
        input: PathBuf,
        #[arg(short, long, default_value_t = 120)]
        bpm: u16,
        #[arg(long, default_value_t = 12.0)]
        fps: f64,
        /// Use the flat frame rate instead of the musical tempo clock.
        #[arg(long)]
        no_sync: bool,
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// Number of timer ticks to simulate.
        #[arg(short, long, default_value_t = 64)]
        ticks: u32,
    },
}
