//! Folded power spectrum of a particle fixture on in-process ranks, written as CSV.
use std::{error::Error, fs::File, io};

use clap::{Parser, ValueEnum};
use csv::Writer;
use log::info;
use pmfft::{
    helpers::{clustered_particles_fixture, particles_fixture},
    powerspec::PowerSpectrum,
    Binning, Bulk, ColumnFft, Communicator, DistributedFft, LocalCommunicator, MeshAssignment,
    Particles, PmError, PointToPoint, PowerSpectrumEstimator, SlabFft,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    Slab,
    Column,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Assignment {
    PointToPoint,
    Bulk,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Spacing {
    Linear,
    Logarithmic,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Distribution {
    Uniform,
    Clustered,
}

/// Struct for parsing command-line arguments
#[derive(Parser)]
struct Args {
    /// Number of in-process ranks
    #[arg(long, default_value_t = 4)]
    procs: usize,

    /// Number of particles per rank
    #[arg(long, default_value_t = 100000)]
    n_points: usize,

    /// Mesh cells along each axis
    #[arg(long, default_value_t = 64)]
    grid: usize,

    /// Side length of the box
    #[arg(long, default_value_t = 1.0)]
    box_size: f64,

    /// Number of wavenumber bins
    #[arg(long, default_value_t = pmfft::powerspec::DEFAULT_BINS)]
    bins: usize,

    #[arg(long, value_enum, default_value_t = Spacing::Logarithmic)]
    spacing: Spacing,

    #[arg(long, value_enum, default_value_t = Strategy::Slab)]
    strategy: Strategy,

    #[arg(long, value_enum, default_value_t = Assignment::Bulk)]
    assignment: Assignment,

    #[arg(long, value_enum, default_value_t = Distribution::Uniform)]
    distribution: Distribution,

    /// Output file, standard output when absent
    #[arg(long)]
    output: Option<String>,
}

fn measure<F, A>(args: &Args) -> Result<[PowerSpectrum; 3], PmError>
where
    F: DistributedFft<f64>,
    A: MeshAssignment<f64>,
{
    let binning = match args.spacing {
        Spacing::Linear => Binning::Linear,
        Spacing::Logarithmic => Binning::Logarithmic,
    };

    let spectra = LocalCommunicator::run(args.procs, |comm| -> Result<_, PmError> {
        let seed = Some(comm.rank() as u64);
        let (positions, masses) = match args.distribution {
            Distribution::Uniform => particles_fixture::<f64>(args.n_points, seed),
            Distribution::Clustered => {
                clustered_particles_fixture::<f64>(args.n_points, [0.5, 0.5, 0.5], 0.2, seed)
            }
        };
        let particles = Particles::new(&positions, &masses)?;

        PowerSpectrumEstimator::<f64, _, F, A>::new(args.grid, args.box_size, comm)?
            .bins(args.bins)?
            .measure_folded(&particles, binning)
    });

    // Every rank holds the reduced estimate
    spectra
        .into_iter()
        .next()
        .unwrap_or_else(|| Err(PmError::Configuration("no ranks to run on".to_string())))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    info!(
        "power spectrum of {} particles on {} ranks, grid {}",
        args.n_points * args.procs,
        args.procs,
        args.grid
    );

    let spectra = match (args.strategy, args.assignment) {
        (Strategy::Slab, Assignment::PointToPoint) => {
            measure::<SlabFft<f64>, PointToPoint>(&args)?
        }
        (Strategy::Slab, Assignment::Bulk) => measure::<SlabFft<f64>, Bulk>(&args)?,
        (Strategy::Column, Assignment::PointToPoint) => {
            measure::<ColumnFft<f64>, PointToPoint>(&args)?
        }
        (Strategy::Column, Assignment::Bulk) => measure::<ColumnFft<f64>, Bulk>(&args)?,
    };

    let mut writer: Writer<Box<dyn io::Write>> = match &args.output {
        Some(filename) => Writer::from_writer(Box::new(File::create(format!("{filename}.csv"))?)),
        None => Writer::from_writer(Box::new(io::stdout())),
    };

    writer.write_record(["fold", "k", "power", "delta2", "modes", "shot_noise"])?;
    for spectrum in spectra.iter() {
        for bin in spectrum.bins.iter() {
            writer.write_record(&[
                spectrum.fold.to_string(),
                bin.k.to_string(),
                bin.power.to_string(),
                bin.delta2.to_string(),
                bin.modes.to_string(),
                bin.shot_noise.to_string(),
            ])?;
        }
    }
    writer.flush()?;

    Ok(())
}
