//! Bulk mesh assignment, for particles spread over the whole mesh.
use itertools::Itertools;
use log::debug;
use rayon::prelude::*;

use crate::{
    comm::helpers::{all_to_all_varcount, all_to_all_varcount_into},
    decomposition::Layout,
    helpers::try_zeroed,
    pm::{
        cic::stencil,
        types::{MeshGeometry, Particles},
    },
    traits::{
        general::PmScalar, mesh::MeshAssignment, parallel::Communicator, types::PmError,
    },
};

/// Assignment by shipping particles to the mesh.
///
/// Every particle is sent, once, to each distinct process owning a corner of its stencil. The
/// receiving process deposits the corners it owns and, on read-out, returns the partial
/// interpolation over the same corners. Suited to particle distributions that follow the
/// partitioning of the mesh, where most particles never leave their process.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bulk;

/// Bookkeeping of a bulk deposit.
#[derive(Clone, Debug)]
pub struct BulkState<T> {
    /// Local particle index of every exported record, in send order.
    pub export_particles: Vec<usize>,

    /// Records sent to each process.
    pub send_counts: Vec<usize>,

    /// Records received from each process.
    pub recv_counts: Vec<usize>,

    /// Received particles, position followed by mass, in receive order.
    pub imported: Vec<[T; 4]>,
}

/// Distinct owners of the corners of a stencil, ascending.
fn corner_owners(layout: &Layout, cells: &[[usize; 3]; 8]) -> Vec<usize> {
    cells
        .iter()
        .map(|&c| layout.owner_of_cell(c))
        .sorted_unstable()
        .dedup()
        .collect()
}

impl<T: PmScalar> MeshAssignment<T> for Bulk {
    type State = BulkState<T>;

    const STRATEGY: &'static str = "bulk";

    fn deposit<C: Communicator>(
        comm: &C,
        layout: &Layout,
        geometry: &MeshGeometry,
        particles: &Particles<'_, T>,
        rho: &mut [T],
    ) -> Result<Self::State, PmError> {
        let rank = comm.rank();
        let size = comm.size();

        if rho.len() < layout.local_len(rank) {
            return Err(PmError::InvalidInput(format!(
                "mesh buffer of {} values is shorter than the local layout",
                rho.len()
            )));
        }

        let targets = (0..particles.len())
            .into_par_iter()
            .flat_map_iter(|p| {
                let s = stencil(particles.position(p), geometry);
                corner_owners(layout, &s.cells)
                    .into_iter()
                    .map(move |owner| (owner, p))
            })
            .collect::<Vec<_>>();

        // Stable, so particles stay in local order within each destination
        let targets = targets
            .into_iter()
            .sorted_by_key(|&(owner, _)| owner)
            .collect_vec();

        let mut send_counts = vec![0usize; size];
        targets.iter().for_each(|&(owner, _)| send_counts[owner] += 1);

        let export_particles = targets.iter().map(|&(_, p)| p).collect_vec();
        let records = export_particles
            .iter()
            .map(|&p| {
                let x = particles.position(p);
                [x[0], x[1], x[2], particles.masses[p]]
            })
            .collect_vec();

        let (imported, recv_counts) = all_to_all_varcount(comm, &records, &send_counts)?;

        for record in imported.iter() {
            let s = stencil(&record[..3], geometry);
            let mass = record[3].widen();
            for (cell, weight) in s.cells.iter().zip(s.weights.iter()) {
                if layout.owner_of_cell(*cell) == rank {
                    let offset = layout.local_offset(rank, *cell);
                    rho[offset] = rho[offset] + T::cast(mass * weight);
                }
            }
        }

        debug!(
            "rank {} bulk deposit: {} particles, {} exported records, {} imported records",
            rank,
            particles.len(),
            records.len(),
            imported.len()
        );

        Ok(BulkState {
            export_particles,
            send_counts,
            recv_counts,
            imported,
        })
    }

    fn readout<C: Communicator>(
        comm: &C,
        layout: &Layout,
        geometry: &MeshGeometry,
        state: &Self::State,
        particles: &Particles<'_, T>,
        grid: &[T],
    ) -> Result<Vec<T>, PmError> {
        let rank = comm.rank();

        if grid.len() < layout.local_len(rank) {
            return Err(PmError::InvalidInput(format!(
                "field of {} values is shorter than the local layout",
                grid.len()
            )));
        }

        let partials = state
            .imported
            .par_iter()
            .map(|record| {
                let s = stencil(&record[..3], geometry);
                let value: f64 = s
                    .cells
                    .iter()
                    .zip(s.weights.iter())
                    .filter(|(cell, _)| layout.owner_of_cell(**cell) == rank)
                    .map(|(cell, weight)| weight * grid[layout.local_offset(rank, *cell)].widen())
                    .sum();
                T::cast(value)
            })
            .collect::<Vec<_>>();

        let mut returned = try_zeroed::<T>(state.export_particles.len())?;
        all_to_all_varcount_into(
            comm,
            &partials,
            &state.recv_counts,
            &mut returned,
            &state.send_counts,
        )?;

        let mut values = vec![0f64; particles.len()];
        for (&p, value) in state.export_particles.iter().zip(returned.iter()) {
            if p >= values.len() {
                return Err(PmError::InvalidInput(
                    "read-out does not match the deposited particles".to_string(),
                ));
            }
            values[p] += value.widen();
        }

        Ok(values.into_iter().map(T::cast).collect())
    }
}
