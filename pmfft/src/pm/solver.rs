//! Evaluation of long range potentials and accelerations.
use std::marker::PhantomData;
use std::time::Instant;

use log::{info, trace};
use num_complex::Complex;

use crate::{
    helpers::try_zeroed,
    pm::{
        kernel::{is_nyquist, wavevector},
        types::{FiniteDifference, ForceKernel, ForceMethod, ParticleMesh, Particles, PmConfig},
    },
    traits::{
        fft::DistributedFft, general::PmScalar, mesh::MeshAssignment, parallel::Communicator,
        types::PmError,
    },
};

impl<'c, T, C, F, A> ParticleMesh<'c, T, C, F, A>
where
    T: PmScalar,
    C: Communicator,
    F: DistributedFft<T>,
    A: MeshAssignment<T>,
{
    /// Plan the transform, build the kernel and, for finite differences, the remaps. Collective.
    ///
    /// # Arguments
    /// * `config` - Validated parameters.
    /// * `comm` - Communicator, borrowed for the lifetime of the solver.
    pub fn new(config: PmConfig, comm: &'c C) -> Result<Self, PmError> {
        let geometry = config.geometry()?;

        // Every process has to plan the same grid, and all of them fail together otherwise
        let volume = geometry.grid.volume();
        let largest = comm.all_reduce_max(volume)?;
        let smallest = usize::MAX - comm.all_reduce_max(usize::MAX - volume)?;
        if largest != smallest {
            return Err(PmError::Configuration(format!(
                "rank {} configured a grid of {} cells, processes range from {} to {}",
                comm.rank(),
                volume,
                smallest,
                largest
            )));
        }

        let fft = F::new(geometry.grid, comm)?;
        let kernel = ForceKernel::new(&fft, comm, &config, &geometry)?;

        let finite_difference = match config.force_method {
            ForceMethod::Spectral => None,
            ForceMethod::FiniteDifference => {
                Some(FiniteDifference::new(fft.real_layout(), comm)?)
            }
        };

        info!(
            "rank {} particle mesh: grid {:?}, {} transform, {} assignment, {:?} forces, {:?} kernel",
            comm.rank(),
            geometry.grid.shape(),
            F::STRATEGY,
            A::STRATEGY,
            config.force_method,
            config.kernel
        );

        Ok(Self {
            comm,
            config,
            geometry,
            fft,
            kernel,
            finite_difference,
            assignment: PhantomData,
        })
    }

    /// Length of the mesh buffers allocated by every evaluation, even so that they can be viewed
    /// as complex numbers.
    pub fn buffer_len(&self) -> usize {
        let len = self
            .finite_difference
            .as_ref()
            .map_or(0, |fd| fd.buffer_len())
            .max(self.fft.fftsize());
        len + len % 2
    }

    /// Assign local particles to a fresh mesh in the real layout of the transform. Collective.
    ///
    /// Returns the mesh and the bookkeeping needed to read fields out at the same particles.
    ///
    /// # Arguments
    /// * `particles` - Local particles.
    pub fn deposit(&self, particles: &Particles<'_, T>) -> Result<(Vec<T>, A::State), PmError> {
        let mut rho = try_zeroed::<T>(self.buffer_len())?;
        let state = A::deposit(
            self.comm,
            self.fft.real_layout(),
            &self.geometry,
            particles,
            &mut rho,
        )?;
        Ok((rho, state))
    }

    /// Interpolate a field in the real layout at the particles of a previous deposit. Collective.
    ///
    /// # Arguments
    /// * `state` - Result of the deposit.
    /// * `particles` - Particles passed to the deposit.
    /// * `field` - Local field in the real layout.
    pub fn readout(
        &self,
        state: &A::State,
        particles: &Particles<'_, T>,
        field: &[T],
    ) -> Result<Vec<T>, PmError> {
        A::readout(
            self.comm,
            self.fft.real_layout(),
            &self.geometry,
            state,
            particles,
            field,
        )
    }

    /// Deposit, transform and multiply by the kernel.
    fn potential_spectrum(
        &self,
        particles: &Particles<'_, T>,
    ) -> Result<(Vec<T>, A::State), PmError> {
        let timer = Instant::now();
        let (mut data, state) = self.deposit(particles)?;
        trace!("rank {} deposit: {:?}", self.comm.rank(), timer.elapsed());

        self.fft.forward(self.comm, &mut data)?;

        let len = self.fft.complex_layout().local_len(self.comm.rank());
        self.kernel.apply(&mut T::as_complex_mut(&mut data)[..len]);

        Ok((data, state))
    }

    /// Long range potential at every local particle. Collective.
    ///
    /// # Arguments
    /// * `particles` - Local particles.
    pub fn potential(&self, particles: &Particles<'_, T>) -> Result<Vec<T>, PmError> {
        let (mut data, state) = self.potential_spectrum(particles)?;
        self.fft.backward(self.comm, &mut data)?;
        self.readout(&state, particles, &data)
    }

    /// Long range acceleration of every local particle, interleaved `[ax0, ay0, az0, ax1, ...]`.
    /// Collective.
    ///
    /// # Arguments
    /// * `particles` - Local particles.
    pub fn accelerations(&self, particles: &Particles<'_, T>) -> Result<Vec<T>, PmError> {
        let (spectrum, state) = self.potential_spectrum(particles)?;

        let timer = Instant::now();
        let components = match &self.finite_difference {
            None => [
                self.spectral_component(&spectrum, 0)?,
                self.spectral_component(&spectrum, 1)?,
                self.spectral_component(&spectrum, 2)?,
            ],
            Some(fd) => {
                let mut potential = spectrum;
                self.fft.backward(self.comm, &mut potential)?;
                fd.gradient(self.comm, &potential, self.geometry.cell_size)?
            }
        };
        trace!("rank {} force mesh: {:?}", self.comm.rank(), timer.elapsed());

        let mut result = try_zeroed::<T>(3 * particles.len())?;
        for (a, component) in components.iter().enumerate() {
            let values = self.readout(&state, particles, component)?;
            for (p, value) in values.into_iter().enumerate() {
                result[3 * p + a] = value;
            }
        }

        Ok(result)
    }

    /// One component of minus the gradient, `-i k_a phi_k` transformed back to the real layout.
    /// The Nyquist plane of the axis is dropped, as its derivative has no real counterpart.
    fn spectral_component(&self, spectrum: &[T], axis: usize) -> Result<Vec<T>, PmError> {
        let rank = self.comm.rank();
        let shape = self.geometry.grid.shape();

        let mut data = try_zeroed::<T>(self.buffer_len())?;
        {
            let phi = T::as_complex(spectrum);
            let gradient = T::as_complex_mut(&mut data);
            for (offset, mode) in self.fft.complex_layout().local_cells(rank) {
                if is_nyquist(mode[axis], shape[axis]) {
                    continue;
                }
                let k = wavevector(mode, &self.geometry)[axis];
                gradient[offset] = phi[offset] * Complex::new(T::zero(), T::cast(-k));
            }
        }

        self.fft.backward(self.comm, &mut data)?;
        Ok(data)
    }
}

#[cfg(test)]
mod test {
    use std::f64::consts::PI;

    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        comm::LocalCommunicator,
        engine::{ColumnFft, SlabFft},
        helpers::{clustered_particles_fixture, particles_fixture},
        pm::{
            types::{KernelVariant, PmBuilder},
            uniform::Bulk,
            zoom::PointToPoint,
        },
    };

    /// Particles of the global set owned by `rank`, in a round robin split.
    fn local_share(
        positions: &[f64],
        masses: &[f64],
        rank: usize,
        size: usize,
    ) -> (Vec<f64>, Vec<f64>) {
        let indices = (rank..masses.len()).step_by(size).collect::<Vec<_>>();
        let p = indices
            .iter()
            .flat_map(|&i| positions[3 * i..3 * i + 3].to_vec())
            .collect();
        let m = indices.iter().map(|&i| masses[i]).collect();
        (p, m)
    }

    /// Globally deposited mass on every process, and the mass of the particles.
    fn deposited_mass<F, A>(n_procs: usize, clustered: bool) -> (Vec<f64>, f64)
    where
        F: DistributedFft<f64>,
        A: MeshAssignment<f64>,
    {
        let (positions, masses) = if clustered {
            clustered_particles_fixture::<f64>(500, [0.1, 0.95, 0.5], 0.1, Some(3))
        } else {
            particles_fixture::<f64>(500, Some(3))
        };

        let totals = LocalCommunicator::run(n_procs, |comm| {
            let (p, m) = local_share(&positions, &masses, comm.rank(), comm.size());
            let particles = Particles::new(&p, &m).unwrap();
            let pm = PmBuilder::new()
                .grid(12)
                .unwrap()
                .build::<f64, _, F, A>(comm)
                .unwrap();

            let (rho, _state) = pm.deposit(&particles).unwrap();
            let mut total = [pm
                .fft
                .real_layout()
                .local_cells(comm.rank())
                .map(|(offset, _)| rho[offset])
                .sum::<f64>()];
            comm.all_reduce_sum(&mut total).unwrap();
            total[0]
        });

        (totals, masses.iter().sum())
    }

    #[test]
    fn test_mass_conservation() {
        for n_procs in 1..=4 {
            for clustered in [false, true] {
                for (totals, expected) in [
                    deposited_mass::<SlabFft<f64>, PointToPoint>(n_procs, clustered),
                    deposited_mass::<SlabFft<f64>, Bulk>(n_procs, clustered),
                    deposited_mass::<ColumnFft<f64>, PointToPoint>(n_procs, clustered),
                    deposited_mass::<ColumnFft<f64>, Bulk>(n_procs, clustered),
                ] {
                    assert!(expected > 0.0);
                    for total in totals {
                        assert_relative_eq!(total, expected, epsilon = 1e-12);
                    }
                }
            }
        }
    }

    #[test]
    fn test_mismatched_grids_fail_on_every_process() {
        let results = LocalCommunicator::run(3, |comm| {
            let grid = if comm.rank() == 1 { 12 } else { 8 };
            PmBuilder::new()
                .grid(grid)
                .unwrap()
                .build::<f64, _, SlabFft<f64>, PointToPoint>(comm)
                .map(|_| ())
        });

        for result in results {
            assert!(matches!(result, Err(PmError::Configuration(_))));
        }
    }

    /// Accelerations of the global particle set, gathered in global particle order.
    fn global_accelerations<F, A>(n_procs: usize, method: ForceMethod) -> Vec<f64>
    where
        F: DistributedFft<f64>,
        A: MeshAssignment<f64>,
    {
        let (positions, masses) =
            clustered_particles_fixture::<f64>(200, [0.5, 0.5, 0.5], 0.4, Some(7));
        let n = masses.len();

        let per_rank = LocalCommunicator::run(n_procs, |comm| {
            let (p, m) = local_share(&positions, &masses, comm.rank(), comm.size());
            let particles = Particles::new(&p, &m).unwrap();
            let pm = PmBuilder::new()
                .grid(16)
                .unwrap()
                .force_method(method)
                .build::<f64, _, F, A>(comm)
                .unwrap();
            pm.accelerations(&particles).unwrap()
        });

        let mut result = vec![0f64; 3 * n];
        for (rank, values) in per_rank.iter().enumerate() {
            for (j, i) in (rank..n).step_by(n_procs).enumerate() {
                result[3 * i..3 * i + 3].copy_from_slice(&values[3 * j..3 * j + 3]);
            }
        }
        result
    }

    #[test]
    fn test_momentum_conservation() {
        let (_, masses) = clustered_particles_fixture::<f64>(200, [0.5, 0.5, 0.5], 0.4, Some(7));

        for method in [ForceMethod::Spectral, ForceMethod::FiniteDifference] {
            let acc = global_accelerations::<SlabFft<f64>, PointToPoint>(2, method);
            let scale: f64 = (0..masses.len())
                .map(|i| masses[i] * acc[3 * i..3 * i + 3].iter().map(|a| a.abs()).sum::<f64>())
                .sum();
            assert!(scale > 0.0);
            for a in 0..3 {
                let net: f64 = (0..masses.len()).map(|i| masses[i] * acc[3 * i + a]).sum();
                assert!(net.abs() < 1e-10 * scale, "net force {} along {}", net, a);
            }
        }
    }

    #[test]
    fn test_strategies_agree() {
        let reference = global_accelerations::<SlabFft<f64>, PointToPoint>(1, ForceMethod::Spectral);

        for n_procs in 2..=4 {
            for other in [
                global_accelerations::<SlabFft<f64>, PointToPoint>(n_procs, ForceMethod::Spectral),
                global_accelerations::<SlabFft<f64>, Bulk>(n_procs, ForceMethod::Spectral),
                global_accelerations::<ColumnFft<f64>, PointToPoint>(n_procs, ForceMethod::Spectral),
                global_accelerations::<ColumnFft<f64>, Bulk>(n_procs, ForceMethod::Spectral),
            ] {
                for (a, b) in reference.iter().zip(other.iter()) {
                    assert_relative_eq!(a, b, epsilon = 1e-9, max_relative = 1e-7);
                }
            }
        }
    }

    #[test]
    fn test_force_methods_roughly_agree() {
        let spectral = global_accelerations::<ColumnFft<f64>, Bulk>(3, ForceMethod::Spectral);
        let fd = global_accelerations::<ColumnFft<f64>, Bulk>(3, ForceMethod::FiniteDifference);

        let norm = |v: &[f64]| v.iter().map(|x| x * x).sum::<f64>().sqrt();
        let difference = spectral
            .iter()
            .zip(fd.iter())
            .map(|(a, b)| a - b)
            .collect::<Vec<_>>();
        assert!(norm(&difference) < 0.1 * norm(&spectral));
    }

    #[test]
    fn test_node_particle_reads_grid_value() {
        // The first particle sits on node (2, 4, 6)
        let positions = [0.25, 0.5, 0.75, 0.61, 0.13, 0.37];
        let masses = [1.0, 0.5];
        let node = [2, 4, 6];

        for n_procs in 1..=3 {
            let results = LocalCommunicator::run(n_procs, |comm| {
                let rank = comm.rank();
                let (p, m) = local_share(&positions, &masses, rank, comm.size());
                let particles = Particles::new(&p, &m).unwrap();
                let pm = PmBuilder::new()
                    .grid(8)
                    .unwrap()
                    .build::<f64, _, SlabFft<f64>, Bulk>(comm)
                    .unwrap();

                let (mut data, state) = pm.deposit(&particles).unwrap();
                pm.fft.forward(comm, &mut data).unwrap();
                let len = pm.fft.complex_layout().local_len(rank);
                pm.kernel.apply(&mut f64::as_complex_mut(&mut data)[..len]);
                pm.fft.backward(comm, &mut data).unwrap();
                let interpolated = pm.readout(&state, &particles, &data).unwrap();

                let layout = pm.fft.real_layout();
                let mut value = [0.0];
                if layout.owner_of_cell(node) == rank {
                    value[0] = data[layout.local_offset(rank, node)];
                }
                comm.all_reduce_sum(&mut value).unwrap();

                let potential = pm.potential(&particles).unwrap();
                (rank, interpolated, potential, value[0])
            });

            for (rank, interpolated, potential, value) in results {
                assert_eq!(interpolated, potential);
                if rank == 0 {
                    assert!(value.abs() > 0.0);
                    assert_relative_eq!(interpolated[0], value, max_relative = 1e-12);
                }
            }
        }
    }

    fn tall_box_pair<F: DistributedFft<f64>>(n_procs: usize) {
        // A column four times taller than wide, the particles on nodes (4, 4, 8) and (4, 4, 24)
        let positions = [0.5, 0.5, 0.25, 0.5, 0.5, 0.75];
        let masses = [1.0, 2.0];

        let results = LocalCommunicator::run(n_procs, |comm| {
            let (p, m) = local_share(&positions, &masses, comm.rank(), comm.size());
            let particles = Particles::new(&p, &m).unwrap();
            let pm = PmBuilder::new()
                .grid(32)
                .unwrap()
                .stretch([4, 4, 1])
                .unwrap()
                .kernel(KernelVariant::TallBox { axis: 2 })
                .force_method(ForceMethod::FiniteDifference)
                .build::<f64, _, F, PointToPoint>(comm)
                .unwrap();
            (comm.rank(), pm.accelerations(&particles).unwrap())
        });

        // Sixteen cells apart, the transverse images act as a uniform sheet of 2 pi G m / area
        let area = 0.25 * 0.25;
        for (rank, acc) in results {
            let (_, m) = local_share(&positions, &masses, rank, n_procs);
            for (j, &mass) in m.iter().enumerate() {
                let other = 3.0 - mass;
                let direction = if mass == 1.0 { 1.0 } else { -1.0 };
                let expected = direction * 2.0 * PI * other / area;
                assert_relative_eq!(acc[3 * j + 2], expected, max_relative = 1e-3);
                assert!(acc[3 * j].abs() < 1e-6 * expected.abs());
                assert!(acc[3 * j + 1].abs() < 1e-6 * expected.abs());
            }
        }
    }

    #[test]
    fn test_tall_box_pair() {
        for n_procs in 1..=2 {
            tall_box_pair::<SlabFft<f64>>(n_procs);
            tall_box_pair::<ColumnFft<f64>>(n_procs);
        }
    }

    #[test]
    fn test_isolated_pair() {
        // Two particles on mesh nodes, six cells apart along x
        let positions = [5.0 / 16.0, 0.5, 0.5, 11.0 / 16.0, 0.5, 0.5];
        let masses = [1.0, 2.0];

        for n_procs in [1, 3] {
            let results = LocalCommunicator::run(n_procs, |comm| {
                let (p, m) = local_share(&positions, &masses, comm.rank(), comm.size());
                let particles = Particles::new(&p, &m).unwrap();
                let pm = PmBuilder::new()
                    .grid(16)
                    .unwrap()
                    .split_scale(0.0)
                    .unwrap()
                    .kernel(KernelVariant::Isolated)
                    .force_method(ForceMethod::FiniteDifference)
                    .build::<f64, _, SlabFft<f64>, PointToPoint>(comm)
                    .unwrap();
                (
                    comm.rank(),
                    pm.potential(&particles).unwrap(),
                    pm.accelerations(&particles).unwrap(),
                )
            });

            let h = 1.0 / 16.0;
            let r = 6.0 * h;
            for (rank, potential, acc) in results {
                let (_, m) = local_share(&positions, &masses, rank, n_procs);
                for (j, &mass) in m.iter().enumerate() {
                    let other = 3.0 - mass;
                    assert_relative_eq!(
                        potential[j],
                        -(other / r + mass / h),
                        max_relative = 1e-10
                    );

                    // Attraction towards the other particle
                    let direction = if mass == 1.0 { 1.0 } else { -1.0 };
                    assert_relative_eq!(acc[3 * j], direction * other / (r * r), max_relative = 1e-2);
                    assert!(acc[3 * j + 1].abs() < 1e-8);
                    assert!(acc[3 * j + 2].abs() < 1e-8);
                }
            }
        }
    }
}
