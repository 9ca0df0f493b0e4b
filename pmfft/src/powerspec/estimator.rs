//! Binned power spectrum estimates.
use std::f64::consts::PI;
use std::marker::PhantomData;

use log::{debug, info};

use crate::{
    helpers::try_zeroed,
    pm::{
        kernel::{cic_window, is_nyquist, wavevector},
        Particles, PmBuilder,
    },
    powerspec::types::{Binning, PowerSpectrum, PowerSpectrumBin, PowerSpectrumEstimator},
    traits::{
        fft::DistributedFft, general::PmScalar, mesh::MeshAssignment, parallel::Communicator,
        types::PmError,
    },
};

/// Default number of wavenumber bins.
pub const DEFAULT_BINS: usize = 4000;

/// Ratio between successive fold factors of [`PowerSpectrumEstimator::measure_folded`].
pub const FOLD_FACTOR: usize = 16;

impl<'c, T, C, F, A> PowerSpectrumEstimator<'c, T, C, F, A>
where
    T: PmScalar,
    C: Communicator,
    F: DistributedFft<T>,
    A: MeshAssignment<T>,
{
    /// Plan an estimator on a periodic cubic mesh. Collective.
    ///
    /// # Arguments
    /// * `pm_grid` - Cells along each axis.
    /// * `box_size` - Side length of the box.
    /// * `comm` - Communicator, borrowed for the lifetime of the estimator.
    pub fn new(pm_grid: usize, box_size: f64, comm: &'c C) -> Result<Self, PmError> {
        let config = PmBuilder::new()
            .grid(pm_grid)?
            .box_size(box_size)?
            .config()?;
        let geometry = config.geometry()?;
        let fft = F::new(geometry.grid, comm)?;

        info!(
            "rank {} power spectrum estimator: grid {:?}, {} transform, {} assignment",
            comm.rank(),
            geometry.grid.shape(),
            F::STRATEGY,
            A::STRATEGY
        );

        Ok(Self {
            comm,
            geometry,
            box_size,
            fft,
            n_bins: DEFAULT_BINS,
            scalar: PhantomData,
            assignment: PhantomData,
        })
    }

    /// Number of wavenumber bins, defaults to [`DEFAULT_BINS`].
    ///
    /// # Arguments
    /// * `n_bins` - Positive number of bins.
    pub fn bins(mut self, n_bins: usize) -> Result<Self, PmError> {
        if n_bins == 0 {
            return Err(PmError::Configuration(
                "number of power spectrum bins must be positive".to_string(),
            ));
        }
        self.n_bins = n_bins;
        Ok(self)
    }

    /// Estimate the power spectrum of the particles folded by `fold`. Collective.
    ///
    /// # Arguments
    /// * `particles` - Local particles.
    /// * `fold` - Fold factor, 1 for the unfolded box.
    /// * `binning` - Spacing of the bins.
    pub fn estimate(
        &self,
        particles: &Particles<'_, T>,
        fold: usize,
        binning: Binning,
    ) -> Result<PowerSpectrum, PmError> {
        if fold == 0 {
            return Err(PmError::InvalidInput("fold factor must be positive".to_string()));
        }

        let rank = self.comm.rank();
        let shape = self.geometry.grid.shape();

        let folded = particles
            .positions
            .iter()
            .map(|x| T::cast((fold as f64 * x.widen()).rem_euclid(1.0)))
            .collect::<Vec<_>>();
        let folded = Particles::new(&folded, particles.masses)?;

        let mut data = try_zeroed::<T>(self.fft.fftsize())?;
        A::deposit(
            self.comm,
            self.fft.real_layout(),
            &self.geometry,
            &folded,
            &mut data,
        )?;

        let mut totals = [
            particles.len() as f64,
            particles.total_mass(),
            particles.masses.iter().map(|m| m.widen().powi(2)).sum(),
        ];
        self.comm.all_reduce_sum(&mut totals)?;
        let [n_particles, total_mass, mass_squared] = totals;

        if total_mass <= 0.0 {
            return Err(PmError::InvalidInput(
                "power spectrum of a particle set without mass".to_string(),
            ));
        }

        self.fft.forward(self.comm, &mut data)?;

        // Folding maps a box of side L / fold onto the mesh
        let volume = (self.box_size / fold as f64).powi(3);
        let k_min = 2.0 * PI * fold as f64 / self.box_size;
        let k_max = k_min * shape.iter().map(|&n| (n as f64 / 2.0).powi(2)).sum::<f64>().sqrt();

        let n_bins = self.n_bins;
        let bin_of = |k: f64| -> usize {
            let x = match binning {
                Binning::Linear => k / k_max,
                Binning::Logarithmic => (k / k_min).ln() / (k_max / k_min).ln().max(f64::EPSILON),
            };
            ((x * n_bins as f64).max(0.0) as usize).min(n_bins - 1)
        };

        // Sums of k, power and mode counts, reduced in one call
        let mut sums = vec![0f64; 3 * n_bins];
        let spectrum = T::as_complex(&data);
        for (offset, mode) in self.fft.complex_layout().local_cells(rank) {
            let k = wavevector(mode, &self.geometry);
            let k = fold as f64 * k.iter().map(|v| v * v).sum::<f64>().sqrt();
            if k == 0.0 {
                continue;
            }

            // Conjugates of the modes with 0 < kz < nz/2 are not stored
            let weight = if mode[2] > 0 && !is_nyquist(mode[2], shape[2]) {
                2.0
            } else {
                1.0
            };

            let window = cic_window(mode, shape);
            let amplitude = spectrum[offset].norm_sqr().widen() / (total_mass * total_mass);
            let power = volume * amplitude / (window * window);

            let bin = bin_of(k);
            sums[bin] += weight * k;
            sums[n_bins + bin] += weight * power;
            sums[2 * n_bins + bin] += weight;
        }

        self.comm.all_reduce_sum(&mut sums)?;

        let shot_noise = volume * mass_squared / (total_mass * total_mass);
        let bins = (0..n_bins)
            .filter(|&b| sums[2 * n_bins + b] > 0.0)
            .map(|b| {
                let modes = sums[2 * n_bins + b];
                let k = sums[b] / modes;
                let power = sums[n_bins + b] / modes;
                PowerSpectrumBin {
                    k,
                    power,
                    delta2: k.powi(3) * power / (2.0 * PI * PI),
                    modes: modes.round() as u64,
                    shot_noise,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "rank {} power spectrum at fold {}: {} non empty bins",
            rank,
            fold,
            bins.len()
        );

        Ok(PowerSpectrum {
            fold,
            bins,
            n_particles: n_particles.round() as u64,
            total_mass,
        })
    }

    /// The three standard estimates, at fold factors 1, [`FOLD_FACTOR`] and its square.
    /// Collective.
    ///
    /// # Arguments
    /// * `particles` - Local particles.
    /// * `binning` - Spacing of the bins.
    pub fn measure_folded(
        &self,
        particles: &Particles<'_, T>,
        binning: Binning,
    ) -> Result<[PowerSpectrum; 3], PmError> {
        Ok([
            self.estimate(particles, 1, binning)?,
            self.estimate(particles, FOLD_FACTOR, binning)?,
            self.estimate(particles, FOLD_FACTOR * FOLD_FACTOR, binning)?,
        ])
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        comm::LocalCommunicator,
        engine::{ColumnFft, SlabFft},
        helpers::particles_fixture,
        pm::{Bulk, PointToPoint},
    };

    /// One particle on every node of an `n^3` lattice, with masses modulated by a cosine of
    /// `wave` periods along x.
    fn plane_wave(n: usize, wave: usize, amplitude: f64) -> (Vec<f64>, Vec<f64>) {
        let mut positions = Vec::new();
        let mut masses = Vec::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    positions.extend([i, j, k].map(|c| c as f64 / n as f64));
                    masses.push(1.0 + amplitude * (2.0 * PI * (wave * i) as f64 / n as f64).cos());
                }
            }
        }
        (positions, masses)
    }

    fn plane_wave_spectrum<F, A>(n_procs: usize) -> Vec<PowerSpectrum>
    where
        F: DistributedFft<f64>,
        A: MeshAssignment<f64>,
    {
        let (positions, masses) = plane_wave(16, 2, 0.5);

        LocalCommunicator::run(n_procs, |comm| {
            // Split the lattice into contiguous particle ranges
            let n = masses.len();
            let first = comm.rank() * n / comm.size();
            let last = (comm.rank() + 1) * n / comm.size();
            let particles =
                Particles::new(&positions[3 * first..3 * last], &masses[first..last]).unwrap();

            let estimator = PowerSpectrumEstimator::<f64, _, F, A>::new(16, 100.0, comm)
                .unwrap()
                .bins(400)
                .unwrap();
            estimator
                .estimate(&particles, 1, Binning::Linear)
                .unwrap()
        })
    }

    #[test]
    fn test_plane_wave() {
        let volume = 100f64.powi(3);
        // Power at (+-2, 0, 0) shares its shell with (0, +-2, 0) and (0, 0, 2) counted twice
        let window = cic_window([2, 0, 0], [16, 16, 16]);
        let expected = 2.0 * volume * 0.25 * 0.25 / (6.0 * window * window);

        for n_procs in 1..=4 {
            for spectrum in plane_wave_spectrum::<SlabFft<f64>, PointToPoint>(n_procs)
                .into_iter()
                .chain(plane_wave_spectrum::<ColumnFft<f64>, Bulk>(n_procs))
            {
                assert_eq!(spectrum.n_particles, 4096);
                assert_relative_eq!(spectrum.total_mass, 4096.0, max_relative = 1e-12);

                let peak = spectrum
                    .bins
                    .iter()
                    .max_by(|a, b| a.power.total_cmp(&b.power))
                    .unwrap();
                assert_relative_eq!(peak.k, 2.0 * 2.0 * PI / 100.0, max_relative = 1e-12);
                assert_eq!(peak.modes, 6);
                assert_relative_eq!(peak.power, expected, max_relative = 1e-8);

                for bin in spectrum.bins.iter().filter(|b| b.k != peak.k) {
                    assert!(bin.power < 1e-12 * expected);
                }
            }
        }
    }

    #[test]
    fn test_mode_count() {
        // Every mode but the mean lands in some bin, once per conjugate pair member
        let n = 6;
        let results = LocalCommunicator::run(2, |comm| {
            let (positions, masses) = particles_fixture::<f64>(50, Some(comm.rank() as u64));
            let particles = Particles::new(&positions, &masses).unwrap();
            let estimator =
                PowerSpectrumEstimator::<f64, _, SlabFft<f64>, Bulk>::new(n, 1.0, comm).unwrap();
            estimator
                .estimate(&particles, 1, Binning::Logarithmic)
                .unwrap()
        });

        for spectrum in results {
            let modes: u64 = spectrum.bins.iter().map(|b| b.modes).sum();
            // nz = 6: kz = 0 and kz = 3 planes stored once, kz = 1, 2 twice
            assert_eq!(modes, (n * n * n - 1) as u64);
            assert_eq!(spectrum.n_particles, 100);
            assert_relative_eq!(spectrum.bins[0].shot_noise, 1.0 / 100.0, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_folded_estimates() {
        let results = LocalCommunicator::run(3, |comm| {
            let (positions, masses) = particles_fixture::<f32>(200, Some(11 + comm.rank() as u64));
            let particles = Particles::new(&positions, &masses).unwrap();
            let estimator =
                PowerSpectrumEstimator::<f32, _, SlabFft<f32>, PointToPoint>::new(8, 10.0, comm)
                    .unwrap();
            estimator
                .measure_folded(&particles, Binning::Logarithmic)
                .unwrap()
        });

        for [unfolded, folded, twice] in results {
            assert_eq!([unfolded.fold, folded.fold, twice.fold], [1, 16, 256]);
            let k_min = 2.0 * PI / 10.0;
            assert_relative_eq!(unfolded.bins[0].k, k_min, max_relative = 1e-6);
            assert_relative_eq!(folded.bins[0].k, 16.0 * k_min, max_relative = 1e-6);
            assert_relative_eq!(twice.bins[0].k, 256.0 * k_min, max_relative = 1e-6);
            assert!(twice.bins[0].shot_noise < folded.bins[0].shot_noise);
        }
    }

    #[test]
    fn test_zero_fold_is_rejected() {
        LocalCommunicator::run(1, |comm| {
            let (positions, masses) = particles_fixture::<f64>(10, None);
            let particles = Particles::new(&positions, &masses).unwrap();
            let estimator =
                PowerSpectrumEstimator::<f64, _, SlabFft<f64>, Bulk>::new(4, 1.0, comm).unwrap();
            assert!(matches!(
                estimator.estimate(&particles, 0, Binning::Linear),
                Err(PmError::InvalidInput(_))
            ));
        });
    }
}
