//? mpirun -n {{NPROCESSES}} --features "mpi"

#[cfg(feature = "mpi")]
fn main() {
    use pmfft::{
        helpers::{clustered_particles_fixture, particles_fixture},
        pm::ForceMethod,
        Binning, Bulk, ColumnFft, Communicator, Particles, PmBuilder, PointToPoint,
        PowerSpectrumEstimator, SlabFft,
    };

    // Setup an MPI environment
    let universe = mpi::initialize().unwrap();
    let world = universe.world();
    let rank = world.rank();

    // Particles local to each process
    let n_particles = 10000;
    let (positions, masses) = particles_fixture::<f64>(n_particles, Some(rank as u64));
    let particles = Particles::new(&positions, &masses).unwrap();

    let pm = PmBuilder::new()
        .grid(32)
        .unwrap()
        .build::<f64, _, SlabFft<f64>, Bulk>(&world)
        .unwrap();

    let (rho, _state) = pm.deposit(&particles).unwrap();
    let mut mass = [pm
        .fft
        .real_layout()
        .local_cells(rank)
        .map(|(offset, _)| rho[offset])
        .sum::<f64>()];
    world.all_reduce_sum(&mut mass).unwrap();

    let accelerations = pm.accelerations(&particles).unwrap();
    let mut momentum = [0f64; 3];
    for (p, m) in masses.iter().enumerate() {
        for a in 0..3 {
            momentum[a] += m * accelerations[3 * p + a];
        }
    }
    world.all_reduce_sum(&mut momentum).unwrap();

    if rank == 0 {
        println!("deposited mass {} of {}", mass[0], world.size());
        println!("net force {:?}", momentum);
    }

    // Clustered particles with the zoom assignment and column transforms
    let (positions, masses) =
        clustered_particles_fixture::<f64>(n_particles, [0.2, 0.3, 0.4], 0.05, Some(rank as u64));
    let particles = Particles::new(&positions, &masses).unwrap();

    let pm = PmBuilder::new()
        .grid(32)
        .unwrap()
        .force_method(ForceMethod::FiniteDifference)
        .build::<f64, _, ColumnFft<f64>, PointToPoint>(&world)
        .unwrap();
    let accelerations = pm.accelerations(&particles).unwrap();
    assert_eq!(accelerations.len(), 3 * n_particles);

    // Power spectrum of the uniform set
    let (positions, masses) = particles_fixture::<f64>(n_particles, Some(rank as u64));
    let particles = Particles::new(&positions, &masses).unwrap();
    let estimator = PowerSpectrumEstimator::<f64, _, SlabFft<f64>, Bulk>::new(32, 1.0, &world)
        .unwrap()
        .bins(32)
        .unwrap();
    let spectra = estimator
        .measure_folded(&particles, Binning::Logarithmic)
        .unwrap();

    if rank == 0 {
        for spectrum in spectra.iter() {
            let bin = &spectrum.bins[0];
            println!(
                "fold {}: k {:.3} P {:.3e} shot noise {:.3e}",
                spectrum.fold, bin.k, bin.power, bin.shot_noise
            );
        }
    }
}

#[cfg(not(feature = "mpi"))]
fn main() {}
