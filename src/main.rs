use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use melt::{settings::Settings, simulator::Simulator, vec2::Vec2};

/// Laser forming simulator control.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// command to run
    #[arg(short = 'c', value_enum)]
    command: Option<Command>,

    /// input file (image mask or saved state)
    #[arg(short = 'i')]
    input: Option<PathBuf>,

    /// laser pass coordinates, two integers per point
    #[arg(short = 'p', num_args = 1.., allow_negative_numbers = true)]
    params: Vec<i64>,

    /// target file (shape outline XY coordinates)
    #[arg(short = 't')]
    target: Option<PathBuf>,

    /// settings file
    #[arg(short = 's')]
    settings: Option<PathBuf>,

    /// output file for the resulting state
    #[arg(short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Command {
    /// build a mesh from the input and write it out
    Init,
    /// run laser passes over the mesh
    Pass,
    /// derive laser passes that approximate a target shape
    Predict,
}

#[derive(Debug)]
enum CliError {
    NoCommand,
    NoInput,
    UnreadableInput(PathBuf, String),
    NoPassCoordinates,
    TooFewCoordinates(usize),
    OddCoordinateCount(usize),
    UnwritableOutput(PathBuf, String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NoCommand => f.write_str("no command provided (use -c)"),
            CliError::NoInput => f.write_str("no input file provided to initialize from (use -i)"),
            CliError::UnreadableInput(path, msg) => f.write_fmt(format_args!(
                "failed reading input file {}: {msg}",
                path.display()
            )),
            CliError::NoPassCoordinates => {
                f.write_str("no coordinates of laser pass provided (use -p)")
            }
            CliError::TooFewCoordinates(count) => f.write_fmt(format_args!(
                "too few coordinates provided: {count} (at least 2 points)"
            )),
            CliError::OddCoordinateCount(count) => f.write_fmt(format_args!(
                "odd number of coordinates provided: {count} (2 per point)"
            )),
            CliError::UnwritableOutput(path, msg) => f.write_fmt(format_args!(
                "could not write output file {}: {msg}",
                path.display()
            )),
        }
    }
}

impl std::error::Error for CliError {}

/// The on-disk state format: everything needed to resume a simulation.
#[derive(Serialize, Deserialize)]
struct SavedState {
    time: i64,
    particles: Vec<SavedParticle>,
    springs: Vec<SavedSpring>,
}

#[derive(Serialize, Deserialize)]
struct SavedParticle {
    x: f64,
    y: f64,
    molten: bool,
    melting_timeout: i64,
}

#[derive(Serialize, Deserialize)]
struct SavedSpring {
    a: usize,
    b: usize,
    length: f64,
}

impl SavedState {
    fn capture(simulator: &Simulator) -> Self {
        let mesh = simulator.mesh();
        Self {
            time: simulator.time(),
            particles: mesh
                .particles()
                .map(|particle| SavedParticle {
                    x: particle.pos().x,
                    y: particle.pos().y,
                    molten: particle.molten(),
                    melting_timeout: particle.melting_timeout(),
                })
                .collect(),
            springs: mesh
                .springs()
                .map(|(_, spring)| {
                    let (a, b) = spring.endpoints();
                    SavedSpring {
                        a: a.0,
                        b: b.0,
                        length: spring.length(),
                    }
                })
                .collect(),
        }
    }

    fn into_simulator(self, settings: Settings) -> Simulator {
        Simulator::from_parts(
            settings,
            self.time,
            self.particles
                .into_iter()
                .map(|p| (Vec2::new(p.x, p.y), p.molten, p.melting_timeout)),
            self.springs.into_iter().map(|s| (s.a, s.b, s.length)),
        )
    }
}

fn load_simulator(path: &Path, settings: Settings) -> Result<Simulator, CliError> {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| CliError::UnreadableInput(path.into(), err.to_string()))?;
        let state: SavedState = serde_json::from_str(&raw)
            .map_err(|err| CliError::UnreadableInput(path.into(), err.to_string()))?;
        return Ok(state.into_simulator(settings));
    }

    let image = image::open(path)
        .map_err(|err| CliError::UnreadableInput(path.into(), err.to_string()))?;
    let mut mask = image.to_luma8();
    let (width, height) = mask.dimensions();
    // a lit corner means the background is bright and the shape is dark
    if width > 0 && height > 0 && mask.get_pixel(0, 0).0[0] != 0 {
        image::imageops::invert(&mut mask);
    }

    let mut simulator = Simulator::new(settings);
    simulator.initialize_from_mask(f64::from(width), f64::from(height), 1.0, |x, y| {
        let px = (x as u32).min(width.saturating_sub(1));
        let py = (y as u32).min(height.saturating_sub(1));
        mask.get_pixel(px, py).0[0] != 0
    });
    Ok(simulator)
}

fn pass_points(params: &[i64]) -> Result<Vec<Vec2>, CliError> {
    if params.is_empty() {
        return Err(CliError::NoPassCoordinates);
    }
    if params.len() < 4 {
        return Err(CliError::TooFewCoordinates(params.len()));
    }
    if params.len() % 2 != 0 {
        return Err(CliError::OddCoordinateCount(params.len()));
    }
    Ok(params
        .chunks(2)
        .map(|pair| Vec2::new(pair[0] as f64, pair[1] as f64))
        .collect())
}

fn run(args: Args) -> Result<(), CliError> {
    let command = args.command.ok_or(CliError::NoCommand)?;

    let settings = match &args.settings {
        Some(path) => Settings::load_from_file(path),
        None => {
            log::warn!("no settings file provided, using defaults (use -s)");
            Settings::default()
        }
    };

    let input = args.input.as_deref().ok_or(CliError::NoInput)?;
    let mut simulator = load_simulator(input, settings)?;

    match command {
        Command::Init => {}
        Command::Pass => {
            let points = pass_points(&args.params)?;
            simulator.run_linear_passes(&points);
        }
        Command::Predict => {
            if args.target.is_none() {
                log::warn!("no target file provided (use -t)");
            }
            log::warn!("prediction is not implemented yet");
        }
    }

    match &args.output {
        Some(path) => {
            let state = serde_json::to_string(&SavedState::capture(&simulator))
                .expect("state should be valid to save");
            std::fs::write(path, state)
                .map_err(|err| CliError::UnwritableOutput(path.clone(), err.to_string()))?;
        }
        None => log::warn!("no output file provided (use -o)"),
    }

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(err) = run(Args::parse()) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
