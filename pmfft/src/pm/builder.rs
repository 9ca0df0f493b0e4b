//! Builder objects to construct particle-mesh solvers
use crate::{
    decomposition::GridSpec,
    pm::types::{
        ForceMethod, KernelVariant, MeshGeometry, ParticleMesh, PmBuilder, PmConfig,
    },
    traits::{
        fft::DistributedFft, general::PmScalar, mesh::MeshAssignment, parallel::Communicator,
        types::PmError,
    },
};

/// Default long range smoothing scale, in mesh cells.
pub const DEFAULT_SPLIT_SCALE: f64 = 1.25;

impl PmBuilder {
    /// Initialise an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Base mesh resolution, cells along an axis of unit stretch.
    ///
    /// # Arguments
    /// * `pm_grid` - Number of cells, positive.
    pub fn grid(mut self, pm_grid: usize) -> Result<Self, PmError> {
        if pm_grid == 0 {
            return Err(PmError::Configuration(
                "mesh resolution must be positive".to_string(),
            ));
        }
        self.pm_grid = Some(pm_grid);
        Ok(self)
    }

    /// Side length of a box of unit stretch, defaults to 1.
    ///
    /// # Arguments
    /// * `box_size` - Positive, finite length.
    pub fn box_size(mut self, box_size: f64) -> Result<Self, PmError> {
        if !(box_size.is_finite() && box_size > 0.0) {
            return Err(PmError::Configuration(format!(
                "box size must be positive, got {}",
                box_size
            )));
        }
        self.box_size = Some(box_size);
        Ok(self)
    }

    /// Elongation factors of the box, defaults to `[1, 1, 1]`.
    ///
    /// Axis `a` spans `box_size / stretch[a]` and has `pm_grid / stretch[a]` cells, so every
    /// factor must divide the mesh resolution. This is checked by [`PmBuilder::config`].
    ///
    /// # Arguments
    /// * `stretch` - Positive factor per axis.
    pub fn stretch(mut self, stretch: [usize; 3]) -> Result<Self, PmError> {
        if stretch.iter().any(|&s| s == 0) {
            return Err(PmError::Configuration(format!(
                "stretch factors must be positive, got {:?}",
                stretch
            )));
        }
        self.stretch = Some(stretch);
        Ok(self)
    }

    /// Gravitational constant, defaults to 1.
    ///
    /// # Arguments
    /// * `gravity` - Finite value.
    pub fn gravity(mut self, gravity: f64) -> Result<Self, PmError> {
        if !gravity.is_finite() {
            return Err(PmError::Configuration(format!(
                "gravitational constant must be finite, got {}",
                gravity
            )));
        }
        self.gravity = Some(gravity);
        Ok(self)
    }

    /// Smoothing scale of the long range force in mesh cells, defaults to
    /// [`DEFAULT_SPLIT_SCALE`]. Zero keeps the full force.
    ///
    /// # Arguments
    /// * `split_scale` - Non negative scale.
    pub fn split_scale(mut self, split_scale: f64) -> Result<Self, PmError> {
        if !(split_scale.is_finite() && split_scale >= 0.0) {
            return Err(PmError::Configuration(format!(
                "split scale must be non negative, got {}",
                split_scale
            )));
        }
        self.split_scale = Some(split_scale);
        Ok(self)
    }

    /// Force extraction method, defaults to spectral.
    pub fn force_method(mut self, force_method: ForceMethod) -> Self {
        self.force_method = Some(force_method);
        self
    }

    /// Boundary conditions, defaults to periodic.
    pub fn kernel(mut self, kernel: KernelVariant) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Validate the parameters.
    pub fn config(&self) -> Result<PmConfig, PmError> {
        let pm_grid = self.pm_grid.ok_or_else(|| {
            PmError::Configuration("mesh resolution must be set".to_string())
        })?;
        let stretch = self.stretch.unwrap_or([1, 1, 1]);

        if let Some(a) = (0..3).find(|&a| pm_grid % stretch[a] != 0) {
            return Err(PmError::Configuration(format!(
                "mesh resolution {} is not a multiple of the stretch factor {} along axis {}",
                pm_grid, stretch[a], a
            )));
        }

        let config = PmConfig {
            pm_grid,
            box_size: self.box_size.unwrap_or(1.0),
            stretch,
            gravity: self.gravity.unwrap_or(1.0),
            split_scale: self.split_scale.unwrap_or(DEFAULT_SPLIT_SCALE),
            force_method: self.force_method.unwrap_or_default(),
            kernel: self.kernel.unwrap_or_default(),
        };
        config.geometry()?;

        Ok(config)
    }

    /// Plan the solver on the processes of `comm`. Collective.
    ///
    /// # Arguments
    /// * `comm` - Communicator, borrowed for the lifetime of the solver.
    pub fn build<T, C, F, A>(self, comm: &C) -> Result<ParticleMesh<'_, T, C, F, A>, PmError>
    where
        T: PmScalar,
        C: Communicator,
        F: DistributedFft<T>,
        A: MeshAssignment<T>,
    {
        ParticleMesh::new(self.config()?, comm)
    }
}

impl PmConfig {
    /// Mesh geometry implied by the parameters.
    pub fn geometry(&self) -> Result<MeshGeometry, PmError> {
        let mesh = self.stretch.map(|s| self.pm_grid / s);
        let grid = match self.kernel {
            KernelVariant::Periodic => mesh,
            KernelVariant::Isolated => mesh.map(|n| 2 * n),
            KernelVariant::TallBox { axis } => {
                let mut grid = mesh;
                let n = grid.get_mut(axis).ok_or_else(|| {
                    PmError::Configuration(format!("tall box axis {} is not a grid axis", axis))
                })?;
                *n *= 2;
                grid
            }
        };

        Ok(MeshGeometry {
            mesh,
            grid: GridSpec::new(grid[0], grid[1], grid[2])?,
            cell_size: self.box_size / self.pm_grid as f64,
            extent: self.stretch.map(|s| self.box_size / s as f64),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PmBuilder::new().grid(32).unwrap().config().unwrap();
        assert_eq!(config.stretch, [1, 1, 1]);
        assert_eq!(config.split_scale, DEFAULT_SPLIT_SCALE);
        assert_eq!(config.force_method, ForceMethod::Spectral);
        assert_eq!(config.kernel, KernelVariant::Periodic);

        let geometry = config.geometry().unwrap();
        assert_eq!(geometry.mesh, [32, 32, 32]);
        assert_eq!(geometry.grid.nz2, 34);
    }

    #[test]
    fn test_stretch_must_divide_grid() {
        let builder = PmBuilder::new()
            .grid(24)
            .unwrap()
            .stretch([1, 5, 1])
            .unwrap();
        assert!(matches!(builder.config(), Err(PmError::Configuration(_))));

        let config = PmBuilder::new()
            .grid(24)
            .unwrap()
            .box_size(12.0)
            .unwrap()
            .stretch([1, 2, 4])
            .unwrap()
            .kernel(KernelVariant::Isolated)
            .config()
            .unwrap();
        let geometry = config.geometry().unwrap();
        assert_eq!(geometry.mesh, [24, 12, 6]);
        assert_eq!(geometry.grid.shape(), [48, 24, 12]);
        assert_eq!(geometry.extent, [12.0, 6.0, 3.0]);
        assert_eq!(geometry.cell_size, 0.5);
    }

    #[test]
    fn test_tall_box_doubles_one_axis() {
        let geometry = PmBuilder::new()
            .grid(16)
            .unwrap()
            .stretch([4, 4, 1])
            .unwrap()
            .kernel(KernelVariant::TallBox { axis: 2 })
            .config()
            .unwrap()
            .geometry()
            .unwrap();
        assert_eq!(geometry.mesh, [4, 4, 16]);
        assert_eq!(geometry.grid.shape(), [4, 4, 32]);
        assert_eq!(geometry.extent, [0.25, 0.25, 1.0]);

        let builder = PmBuilder::new()
            .grid(16)
            .unwrap()
            .kernel(KernelVariant::TallBox { axis: 3 });
        assert!(matches!(builder.config(), Err(PmError::Configuration(_))));
    }

    #[test]
    fn test_invalid_setters() {
        assert!(PmBuilder::new().grid(0).is_err());
        assert!(PmBuilder::new().box_size(-1.0).is_err());
        assert!(PmBuilder::new().stretch([1, 0, 1]).is_err());
        assert!(PmBuilder::new().split_scale(f64::NAN).is_err());
        assert!(matches!(
            PmBuilder::new().config(),
            Err(PmError::Configuration(_))
        ));
    }
}
