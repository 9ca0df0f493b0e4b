//? mpirun -n {{NPROCESSES}} --features "mpi"

#[cfg(feature = "mpi")]
fn main() {
    use pmfft::{
        decomposition::GridSpec, helpers::field_fixture, traits::general::PmScalar, ColumnFft,
        Communicator, DistributedFft, SlabFft,
    };

    // Setup an MPI environment
    let universe = mpi::initialize().unwrap();
    let world = universe.world();

    fn round_trip<F: DistributedFft<f64>>(world: &mpi::topology::SimpleCommunicator, grid: GridSpec) {
        let rank = world.rank();
        let fft = F::new(grid, world).unwrap();

        // Field equal to the flat index of each cell
        let layout = fft.real_layout().clone();
        let original = field_fixture::<f64>(&layout, rank, fft.fftsize(), |cell| {
            grid.flat_index(cell) as f64
        });

        let mut data = original.clone();
        fft.forward(world, &mut data).unwrap();
        fft.backward(world, &mut data).unwrap();

        let local_error = layout
            .local_cells(rank)
            .map(|(offset, _)| (data[offset] - original[offset]).abs() / grid.volume() as f64)
            .fold(0f64, f64::max);

        let mut error = [local_error];
        world.all_reduce_sum(&mut error).unwrap();

        if rank == 0 {
            println!(
                "{} transform of {:?} on {} processes: summed relative error {:e}",
                F::STRATEGY,
                grid.shape(),
                world.size(),
                error[0]
            );
            assert!(error[0] < f64::round_trip_tolerance());
        }
    }

    // The 64^3 grid every slab process count up to 64 can run
    let grid = GridSpec::new(64, 64, 64).unwrap();
    round_trip::<SlabFft<f64>>(&world, grid);
    round_trip::<ColumnFft<f64>>(&world, grid);

    // Uneven grid, column decomposition only needs one column per process
    let grid = GridSpec::new(5, 7, 9).unwrap();
    round_trip::<ColumnFft<f64>>(&world, grid);
}

#[cfg(not(feature = "mpi"))]
fn main() {}
