//! Green's functions of the long range gravitational potential.
use std::collections::HashMap;
use std::f64::consts::PI;

use itertools::Itertools;
use log::info;
use num_complex::Complex;
use statrs::function::erf::{erf, erfc};

use crate::{
    fft::{C2cPlan, Sign},
    helpers::try_zeroed,
    pm::types::{ForceKernel, KernelVariant, MeshGeometry, PmConfig},
    traits::{
        fft::DistributedFft, general::PmScalar, parallel::Communicator, types::PmError,
    },
};

/// Signed frequency of mode `i` on an axis of `n` points.
pub fn signed_mode(i: usize, n: usize) -> i64 {
    if i <= n / 2 {
        i as i64
    } else {
        i as i64 - n as i64
    }
}

/// Whether mode `i` is the Nyquist frequency of an axis of `n` points.
pub fn is_nyquist(i: usize, n: usize) -> bool {
    n % 2 == 0 && i == n / 2
}

/// Physical wave vector of a mode of the transform grid.
///
/// # Arguments
/// * `mode` - Mode indices in canonical order.
/// * `geometry` - Mesh geometry.
pub fn wavevector(mode: [usize; 3], geometry: &MeshGeometry) -> [f64; 3] {
    let shape = geometry.grid.shape();
    let mut k = [0f64; 3];
    for a in 0..3 {
        k[a] = 2.0 * PI * signed_mode(mode[a], shape[a]) as f64
            / (shape[a] as f64 * geometry.cell_size);
    }
    k
}

/// Fourier transform of the cloud-in-cell assignment function, `prod sinc^2(pi k_a / n_a)`.
///
/// # Arguments
/// * `mode` - Mode indices in canonical order.
/// * `shape` - Transform grid.
pub fn cic_window(mode: [usize; 3], shape: [usize; 3]) -> f64 {
    (0..3).map(|a| axis_window(mode[a], shape[a])).product()
}

/// One axis factor of [`cic_window`].
fn axis_window(i: usize, n: usize) -> f64 {
    let x = PI * signed_mode(i, n) as f64 / n as f64;
    let sinc = if x == 0.0 { 1.0 } else { x.sin() / x };
    sinc * sinc
}

/// `exp(a) erfc(x)`, kept finite where the two factors over- or underflow separately.
fn scaled_erfc(a: f64, x: f64) -> f64 {
    if x > 10.0 {
        // Asymptotic series of erfc
        let x2 = x * x;
        let series = 1.0 - 0.5 / x2 + 0.75 / (x2 * x2) - 1.875 / (x2 * x2 * x2);
        (a - x2).exp() / (x * PI.sqrt()) * series
    } else {
        a.exp() * erfc(x)
    }
}

/// Green's function of a sheet of unit surface density with transverse wavenumber `q`, at
/// distance `d` from the sheet, with the long range smoothing `exp(-k^2 r_s^2)` applied. This is
/// the inverse transform of `4 pi exp(-k^2 r_s^2) / k^2` along the sheet normal.
///
/// The transverse mean `q = 0` grows linearly with distance; its constant term is dropped so that
/// it vanishes at `d = 0`.
///
/// # Arguments
/// * `q` - Transverse wavenumber, non negative.
/// * `d` - Distance from the sheet.
/// * `split` - Smoothing scale `r_s`, zero for the bare Green's function.
pub fn sheet_green(q: f64, d: f64, split: f64) -> f64 {
    let d = d.abs();
    match (q > 0.0, split > 0.0) {
        (true, true) => {
            let u = d / (2.0 * split);
            PI / q * (scaled_erfc(q * d, q * split + u) + scaled_erfc(-q * d, q * split - u))
        }
        (true, false) => 2.0 * PI / q * (-q * d).exp(),
        (false, true) => {
            let u = d / (2.0 * split);
            -2.0 * PI * (d * erf(u) + 2.0 * split / PI.sqrt() * ((-u * u).exp() - 1.0))
        }
        (false, false) => -2.0 * PI * d,
    }
}

impl<T: PmScalar> ForceKernel<T> {
    /// Build the kernel for the configured boundary conditions. Collective.
    ///
    /// # Arguments
    /// * `fft` - Distributed transform the kernel is applied with.
    /// * `comm` - Communicator.
    /// * `config` - Parameters.
    /// * `geometry` - Mesh geometry.
    pub fn new<F: DistributedFft<T>, C: Communicator>(
        fft: &F,
        comm: &C,
        config: &PmConfig,
        geometry: &MeshGeometry,
    ) -> Result<Self, PmError> {
        match config.kernel {
            KernelVariant::Periodic => Self::periodic(fft, comm.rank(), config, geometry),
            KernelVariant::Isolated => Self::isolated(fft, comm, config, geometry),
            KernelVariant::TallBox { axis } => {
                Self::tallbox(fft, comm.rank(), config, geometry, axis)
            }
        }
    }

    /// Periodic kernel `-4 pi G exp(-k^2 r_s^2) / k^2`, deconvolved with the cloud-in-cell window of
    /// both assignment and interpolation, and divided by the cell volume so that it acts on the
    /// transformed mass mesh. The mean mode is zero.
    ///
    /// # Arguments
    /// * `fft` - Distributed transform the kernel is applied with.
    /// * `rank` - Rank of the calling process.
    /// * `config` - Parameters.
    /// * `geometry` - Mesh geometry.
    pub fn periodic<F: DistributedFft<T>>(
        fft: &F,
        rank: usize,
        config: &PmConfig,
        geometry: &MeshGeometry,
    ) -> Result<Self, PmError> {
        let layout = fft.complex_layout();
        let shape = geometry.grid.shape();
        let split = config.split_scale * geometry.cell_size;
        let cell_volume = geometry.cell_size.powi(3);

        let mut values = try_zeroed::<Complex<T>>(layout.local_len(rank))?;
        for (offset, mode) in layout.local_cells(rank) {
            let k = wavevector(mode, geometry);
            let k2: f64 = k.iter().map(|v| v * v).sum();
            if k2 == 0.0 {
                continue;
            }

            let window = cic_window(mode, shape);
            let green = -4.0 * PI * config.gravity * (-k2 * split * split).exp()
                / (k2 * window * window * cell_volume);
            values[offset] = Complex::new(T::cast(green), T::zero());
        }

        info!("rank {} built periodic kernel for {} modes", rank, values.len());

        Ok(Self {
            values,
            variant: KernelVariant::Periodic,
        })
    }

    /// Isolated kernel, the transform of `-G erf(r / 2 r_s) / r` sampled on the doubled grid with
    /// minimum image distances. Mass deposited in the lower octant never interacts with its
    /// periodic images. Collective, as the real space kernel is transformed by `fft`.
    ///
    /// # Arguments
    /// * `fft` - Distributed transform the kernel is applied with.
    /// * `comm` - Communicator.
    /// * `config` - Parameters.
    /// * `geometry` - Mesh geometry.
    pub fn isolated<F: DistributedFft<T>, C: Communicator>(
        fft: &F,
        comm: &C,
        config: &PmConfig,
        geometry: &MeshGeometry,
    ) -> Result<Self, PmError> {
        let rank = comm.rank();
        let shape = geometry.grid.shape();
        let split = config.split_scale * geometry.cell_size;
        let g = config.gravity;

        let mut data = try_zeroed::<T>(fft.fftsize())?;
        for (offset, cell) in fft.real_layout().local_cells(rank) {
            let r2: f64 = (0..3)
                .map(|a| {
                    let d = cell[a].min(shape[a] - cell[a]) as f64 * geometry.cell_size;
                    d * d
                })
                .sum();
            let r = r2.sqrt();

            let value = match (r > 0.0, split > 0.0) {
                (true, true) => -g * erf(r / (2.0 * split)) / r,
                (true, false) => -g / r,
                (false, true) => -g / (PI.sqrt() * split),
                (false, false) => -g / geometry.cell_size,
            };
            data[offset] = T::cast(value);
        }

        fft.forward(comm, &mut data)?;

        let len = fft.complex_layout().local_len(rank);
        let values = T::as_complex(&data)[..len].to_vec();

        info!("rank {} built isolated kernel for {} modes", rank, len);

        Ok(Self {
            values,
            variant: KernelVariant::Isolated,
        })
    }

    /// Kernel periodic across two axes and isolated along `axis`.
    ///
    /// For every transverse wave vector the Green's function of a periodic sheet,
    /// [`sheet_green`], is sampled at the minimum image distances of the doubled axis and
    /// transformed along it. Transverse modes are deconvolved with the cloud-in-cell window, the
    /// isolated axis is not.
    ///
    /// # Arguments
    /// * `fft` - Distributed transform the kernel is applied with.
    /// * `rank` - Rank of the calling process.
    /// * `config` - Parameters.
    /// * `geometry` - Mesh geometry, doubled along `axis`.
    /// * `axis` - Isolated axis.
    pub fn tallbox<F: DistributedFft<T>>(
        fft: &F,
        rank: usize,
        config: &PmConfig,
        geometry: &MeshGeometry,
        axis: usize,
    ) -> Result<Self, PmError> {
        let layout = fft.complex_layout();
        let shape = geometry.grid.shape();
        let h = geometry.cell_size;
        let split = config.split_scale * h;
        let n = shape[axis];
        let transverse = (0..3).filter(|&a| a != axis).collect_vec();

        let plan = C2cPlan::<f64>::new(Sign::Forward, n, 1, 1, n)?;

        // Transform along the isolated axis, one per transverse mode
        let mut profiles: HashMap<(usize, usize), Vec<f64>> = HashMap::new();

        let mut values = try_zeroed::<Complex<T>>(layout.local_len(rank))?;
        for (offset, mode) in layout.local_cells(rank) {
            let key = (mode[transverse[0]], mode[transverse[1]]);
            if !profiles.contains_key(&key) {
                let k = wavevector(mode, geometry);
                let q = k[transverse[0]].hypot(k[transverse[1]]);

                // Sheet of the mass in one cell, over the transverse cell area
                let mut samples = (0..n)
                    .map(|j| {
                        let d = j.min(n - j) as f64 * h;
                        Complex::new(-config.gravity * sheet_green(q, d, split) / (h * h), 0.0)
                    })
                    .collect_vec();
                plan.execute(&mut samples)?;
                profiles.insert(key, samples.iter().map(|c| c.re).collect());
            }

            let window = transverse
                .iter()
                .map(|&a| axis_window(mode[a], shape[a]))
                .product::<f64>();
            let value = profiles[&key][mode[axis]] / (window * window);
            values[offset] = Complex::new(T::cast(value), T::zero());
        }

        info!(
            "rank {} built tall box kernel isolated along axis {} for {} modes, {} transverse",
            rank,
            axis,
            values.len(),
            profiles.len()
        );

        Ok(Self {
            values,
            variant: KernelVariant::TallBox { axis },
        })
    }

    /// Multiply a local spectrum by the kernel.
    ///
    /// # Arguments
    /// * `spectrum` - Local modes in the complex layout the kernel was built for.
    pub fn apply(&self, spectrum: &mut [Complex<T>]) {
        spectrum
            .iter_mut()
            .zip(self.values.iter())
            .for_each(|(s, k)| *s = *s * *k);
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_signed_modes() {
        assert_eq!(signed_mode(0, 8), 0);
        assert_eq!(signed_mode(4, 8), 4);
        assert_eq!(signed_mode(5, 8), -3);
        assert_eq!(signed_mode(3, 7), 3);
        assert_eq!(signed_mode(4, 7), -3);
        assert!(is_nyquist(4, 8));
        assert!(!is_nyquist(3, 7));
    }

    #[test]
    fn test_sheet_green_limits() {
        // Without smoothing, exp(-q d) decay and the linear potential of a uniform sheet
        assert_relative_eq!(sheet_green(2.0, 0.5, 0.0), PI * (-1.0f64).exp());
        assert_relative_eq!(sheet_green(0.0, -0.5, 0.0), -PI);

        // Far from the sheet smoothing leaves the profile unchanged, up to the constant of the
        // transverse mean
        let split = 0.05;
        assert_relative_eq!(
            sheet_green(2.0, 0.8, split),
            sheet_green(2.0, 0.8, 0.0),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            sheet_green(0.0, 0.8, split) - sheet_green(0.0, 0.7, split),
            -2.0 * PI * 0.1,
            max_relative = 1e-12
        );

        // On the sheet
        assert_relative_eq!(
            sheet_green(3.0, 0.0, split),
            2.0 * PI / 3.0 * erfc(3.0 * split),
            max_relative = 1e-12
        );

        // Large arguments stay finite
        assert!(sheet_green(500.0, 2.0, 0.01).is_finite());
        assert!(sheet_green(500.0, 2.0, 0.01) >= 0.0);
    }

    #[test]
    fn test_cic_window() {
        assert_relative_eq!(cic_window([0, 0, 0], [8, 8, 8]), 1.0);
        // sinc^2(pi / 2) at the Nyquist frequency of one axis
        let expected = (2.0 / PI).powi(2);
        assert_relative_eq!(cic_window([4, 0, 0], [8, 8, 8]), expected, epsilon = 1e-14);
        assert_relative_eq!(cic_window([4, 0, 0], [8, 8, 8]), cic_window([0, 0, 4], [8, 8, 8]));
    }
}
