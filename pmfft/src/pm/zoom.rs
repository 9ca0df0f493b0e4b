//! Point-to-point mesh assignment, for particles clustered in a small part of the mesh.
use itertools::Itertools;
use log::debug;
use rayon::prelude::*;

use crate::{
    comm::helpers::{all_to_all_varcount, all_to_all_varcount_into},
    decomposition::{GridSpec, Layout},
    helpers::try_zeroed,
    pm::{
        cic::{stencil, Stencil},
        types::{MeshContribution, MeshGeometry, Particles},
    },
    traits::{
        general::{GridIndex, PmScalar},
        mesh::MeshAssignment,
        parallel::Communicator,
        types::PmError,
    },
};

/// Assignment by explicit cell contributions.
///
/// Every particle produces eight contributions, which are merged per distinct cell locally and
/// sent only to the processes owning those cells. Communication scales with the number of
/// distinct cells touched, independently of how the mesh is partitioned.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointToPoint;

/// Bookkeeping of a point-to-point deposit.
#[derive(Clone, Debug)]
pub struct ZoomState {
    /// Stencil of every local particle.
    pub stencils: Vec<Stencil>,

    /// For each particle corner `8 * p + c`, the index of its cell in the local field.
    pub corner_local: Vec<usize>,

    /// Local field indices in the order their values were sent.
    pub send_order: Vec<usize>,

    /// Distinct cells sent to each process.
    pub send_counts: Vec<usize>,

    /// Cells received from each process.
    pub recv_counts: Vec<usize>,

    /// Offset in the local mesh of every received cell, in receive order.
    pub import_offsets: Vec<usize>,
}

/// Sorted contributions of all particles, and the distinct cells they touch.
///
/// Returns the local field index of every particle corner and the global index of every
/// distinct cell, ascending.
fn link_cells<I: GridIndex>(
    stencils: &[Stencil],
    grid: &GridSpec,
) -> Result<(Vec<usize>, Vec<I>), PmError> {
    let mut contributions = Vec::new();
    contributions
        .try_reserve_exact(8 * stencils.len())
        .map_err(|e| PmError::Allocation(format!("mesh contributions: {}", e)))?;

    for (p, s) in stencils.iter().enumerate() {
        for (c, cell) in s.cells.iter().enumerate() {
            contributions.push(MeshContribution {
                global: I::from_usize(grid.flat_index(*cell)),
                part: (p << 3) | c,
                local: 0,
            });
        }
    }

    contributions.par_sort_unstable_by_key(|c| c.global);

    let mut distinct: Vec<I> = Vec::new();
    for c in contributions.iter_mut() {
        if distinct.last() != Some(&c.global) {
            distinct.push(c.global);
        }
        c.local = distinct.len() - 1;
    }

    let mut corner_local = try_zeroed::<usize>(contributions.len())?;
    for c in contributions.iter() {
        corner_local[c.part] = c.local;
    }

    Ok((corner_local, distinct))
}

fn deposit_with<I, T, C>(
    comm: &C,
    layout: &Layout,
    geometry: &MeshGeometry,
    particles: &Particles<'_, T>,
    rho: &mut [T],
) -> Result<ZoomState, PmError>
where
    I: GridIndex,
    T: PmScalar,
    C: Communicator,
{
    let rank = comm.rank();
    let size = comm.size();

    let stencils = (0..particles.len())
        .into_par_iter()
        .map(|p| stencil(particles.position(p), geometry))
        .collect::<Vec<_>>();

    let (corner_local, distinct) = link_cells::<I>(&stencils, &geometry.grid)?;

    // Merge contributions to the same cell before sending
    let mut field = vec![0f64; distinct.len()];
    for (p, s) in stencils.iter().enumerate() {
        let mass = particles.masses[p].widen();
        for c in 0..8 {
            field[corner_local[(p << 3) | c]] += mass * s.weights[c];
        }
    }

    let owners = distinct
        .iter()
        .map(|g| layout.owner_of_cell(geometry.grid.unflatten(g.to_usize())))
        .collect_vec();

    // Stable, so cells stay ascending within each destination
    let send_order = (0..distinct.len())
        .sorted_by_key(|&u| owners[u])
        .collect_vec();

    let mut send_counts = vec![0usize; size];
    owners.iter().for_each(|&o| send_counts[o] += 1);

    let send_globals = send_order.iter().map(|&u| distinct[u]).collect_vec();
    let send_values = send_order
        .iter()
        .map(|&u| T::cast(field[u]))
        .collect_vec();

    let (imported, recv_counts) = all_to_all_varcount(comm, &send_globals, &send_counts)?;
    let mut values = try_zeroed::<T>(imported.len())?;
    all_to_all_varcount_into(comm, &send_values, &send_counts, &mut values, &recv_counts)?;

    let import_offsets = imported
        .iter()
        .map(|g| layout.local_offset(rank, geometry.grid.unflatten(g.to_usize())))
        .collect_vec();

    for (&offset, &value) in import_offsets.iter().zip(values.iter()) {
        rho[offset] = rho[offset] + value;
    }

    debug!(
        "rank {} point-to-point deposit: {} particles, {} distinct cells, {} imported cells",
        rank,
        particles.len(),
        distinct.len(),
        imported.len()
    );

    Ok(ZoomState {
        stencils,
        corner_local,
        send_order,
        send_counts,
        recv_counts,
        import_offsets,
    })
}

impl<T: PmScalar> MeshAssignment<T> for PointToPoint {
    type State = ZoomState;

    const STRATEGY: &'static str = "point-to-point";

    fn deposit<C: Communicator>(
        comm: &C,
        layout: &Layout,
        geometry: &MeshGeometry,
        particles: &Particles<'_, T>,
        rho: &mut [T],
    ) -> Result<Self::State, PmError> {
        if rho.len() < layout.local_len(comm.rank()) {
            return Err(PmError::InvalidInput(format!(
                "mesh buffer of {} values is shorter than the local layout",
                rho.len()
            )));
        }

        // Narrow indices whenever the grid can be addressed with them
        if geometry.grid.volume() <= <u32 as GridIndex>::MAX_VOLUME {
            deposit_with::<u32, T, C>(comm, layout, geometry, particles, rho)
        } else {
            deposit_with::<u64, T, C>(comm, layout, geometry, particles, rho)
        }
    }

    fn readout<C: Communicator>(
        comm: &C,
        layout: &Layout,
        _geometry: &MeshGeometry,
        state: &Self::State,
        particles: &Particles<'_, T>,
        grid: &[T],
    ) -> Result<Vec<T>, PmError> {
        if grid.len() < layout.local_len(comm.rank()) || state.stencils.len() != particles.len() {
            return Err(PmError::InvalidInput(
                "read-out does not match the deposited particles and mesh".to_string(),
            ));
        }

        let outgoing = state.import_offsets.iter().map(|&o| grid[o]).collect_vec();
        let mut returned = try_zeroed::<T>(state.send_order.len())?;
        all_to_all_varcount_into(
            comm,
            &outgoing,
            &state.recv_counts,
            &mut returned,
            &state.send_counts,
        )?;

        let mut field = vec![0f64; state.send_order.len()];
        for (&u, value) in state.send_order.iter().zip(returned.iter()) {
            field[u] = value.widen();
        }

        Ok(state
            .stencils
            .par_iter()
            .enumerate()
            .map(|(p, s)| {
                let value: f64 = (0..8)
                    .map(|c| s.weights[c] * field[state.corner_local[(p << 3) | c]])
                    .sum();
                T::cast(value)
            })
            .collect())
    }
}
