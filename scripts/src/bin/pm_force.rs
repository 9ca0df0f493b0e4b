//! Time a parametrised particle-mesh force evaluation on in-process ranks, writing one CSV row
//! per rank.
use std::{error::Error, fs::File, io, time::Instant};

use clap::{Parser, ValueEnum};
use csv::Writer;
use log::info;
use pmfft::{
    helpers::{clustered_particles_fixture, particles_fixture},
    pm::{ForceMethod, KernelVariant},
    Bulk, ColumnFft, Communicator, DistributedFft, LocalCommunicator, MeshAssignment, Particles,
    PmBuilder, PmError, PointToPoint, SlabFft,
};
use rayon::ThreadPoolBuilder;

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
enum Forces {
    Spectral,
    FiniteDifference,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Boundary {
    Periodic,
    Isolated,
    /// Periodic in x and y, isolated along z
    TallBox,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Distribution {
    Uniform,
    Clustered,
}

/// Struct for parsing command-line arguments
#[derive(Parser)]
struct Args {
    #[arg(long, default_value_t = String::from("x"))]
    id: String,

    /// Number of in-process ranks
    #[arg(long, default_value_t = 4)]
    procs: usize,

    /// Number of particles per rank
    #[arg(long, default_value_t = 100000)]
    n_points: usize,

    /// Mesh cells along each axis
    #[arg(long, default_value_t = 64)]
    grid: usize,

    /// Long range smoothing scale in cells
    #[arg(long, default_value_t = 1.25)]
    split_scale: f64,

    #[arg(long, value_enum, default_value_t = Strategy::Slab)]
    strategy: Strategy,

    #[arg(long, value_enum, default_value_t = Assignment::PointToPoint)]
    assignment: Assignment,

    #[arg(long, value_enum, default_value_t = Forces::Spectral)]
    forces: Forces,

    #[arg(long, value_enum, default_value_t = Boundary::Periodic)]
    boundary: Boundary,

    #[arg(long, value_enum, default_value_t = Distribution::Uniform)]
    distribution: Distribution,

    /// Number of rayon threads shared by all ranks
    #[arg(long, default_value_t = 1)]
    n_threads: usize,

    /// Output file, standard output when absent
    #[arg(long)]
    output: Option<String>,
}

/// Timings and diagnostics of one rank.
struct Row {
    rank: usize,
    setup_ms: u128,
    evaluate_ms: u128,
    net_force: [f64; 3],
    rms_acceleration: f64,
}

fn evaluate<F, A>(args: &Args) -> Result<Vec<Row>, PmError>
where
    F: DistributedFft<f64>,
    A: MeshAssignment<f64>,
{
    let force_method = match args.forces {
        Forces::Spectral => ForceMethod::Spectral,
        Forces::FiniteDifference => ForceMethod::FiniteDifference,
    };
    let kernel = match args.boundary {
        Boundary::Periodic => KernelVariant::Periodic,
        Boundary::Isolated => KernelVariant::Isolated,
        Boundary::TallBox => KernelVariant::TallBox { axis: 2 },
    };

    LocalCommunicator::run(args.procs, |comm| -> Result<Row, PmError> {
        let rank = comm.rank();
        let seed = Some(rank as u64);
        let (positions, masses) = match args.distribution {
            Distribution::Uniform => particles_fixture::<f64>(args.n_points, seed),
            Distribution::Clustered => {
                clustered_particles_fixture::<f64>(args.n_points, [0.3, 0.6, 0.5], 0.1, seed)
            }
        };
        let particles = Particles::new(&positions, &masses)?;

        let s = Instant::now();
        let pm = PmBuilder::new()
            .grid(args.grid)?
            .split_scale(args.split_scale)?
            .force_method(force_method)
            .kernel(kernel)
            .build::<f64, _, F, A>(comm)?;
        let setup_ms = s.elapsed().as_millis();

        let s = Instant::now();
        let accelerations = pm.accelerations(&particles)?;
        let evaluate_ms = s.elapsed().as_millis();

        let mut net_force = [0f64; 3];
        for (p, m) in masses.iter().enumerate() {
            for a in 0..3 {
                net_force[a] += m * accelerations[3 * p + a];
            }
        }
        comm.all_reduce_sum(&mut net_force)?;

        let rms_acceleration = (accelerations.iter().map(|a| a * a).sum::<f64>()
            / masses.len().max(1) as f64)
            .sqrt();

        Ok(Row {
            rank,
            setup_ms,
            evaluate_ms,
            net_force,
            rms_acceleration,
        })
    })
    .into_iter()
    .collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    ThreadPoolBuilder::new()
        .num_threads(args.n_threads)
        .build_global()?;

    info!(
        "{:?} transform, {:?} assignment, {:?} forces, {:?} boundaries on {} ranks",
        args.strategy, args.assignment, args.forces, args.boundary, args.procs
    );

    let rows = match (args.strategy, args.assignment) {
        (Strategy::Slab, Assignment::PointToPoint) => {
            evaluate::<SlabFft<f64>, PointToPoint>(&args)?
        }
        (Strategy::Slab, Assignment::Bulk) => evaluate::<SlabFft<f64>, Bulk>(&args)?,
        (Strategy::Column, Assignment::PointToPoint) => {
            evaluate::<ColumnFft<f64>, PointToPoint>(&args)?
        }
        (Strategy::Column, Assignment::Bulk) => evaluate::<ColumnFft<f64>, Bulk>(&args)?,
    };

    let mut writer: Writer<Box<dyn io::Write>> = match &args.output {
        Some(filename) => Writer::from_writer(Box::new(File::create(format!("{filename}.csv"))?)),
        None => Writer::from_writer(Box::new(io::stdout())),
    };

    writer.write_record([
        "id",
        "rank",
        "procs",
        "grid",
        "n_points",
        "setup_ms",
        "evaluate_ms",
        "net_force_x",
        "net_force_y",
        "net_force_z",
        "rms_acceleration",
    ])?;

    for row in rows {
        writer.write_record(&[
            args.id.clone(),
            row.rank.to_string(),
            args.procs.to_string(),
            args.grid.to_string(),
            args.n_points.to_string(),
            row.setup_ms.to_string(),
            row.evaluate_ms.to_string(),
            row.net_force[0].to_string(),
            row.net_force[1].to_string(),
            row.net_force[2].to_string(),
            row.rms_acceleration.to_string(),
        ])?;
    }
    writer.flush()?;

    Ok(())
}
