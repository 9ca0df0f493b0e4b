//! Layout changes inside a transform.
use bytemuck::Pod;
use log::debug;

use crate::{
    decomposition::Layout,
    engine::types::{Transition, TransitionKind},
    helpers::try_zeroed,
    traits::{parallel::Communicator, types::PmError},
    transpose::{local_swap, ExchangeDescriptor},
};

impl Transition {
    /// Plan the move between two layouts. Collective, as remaps run their count pass here.
    ///
    /// # Arguments
    /// * `source` - Layout before the transition.
    /// * `dest` - Layout after the transition.
    /// * `comm` - Communicator.
    pub fn new<C: Communicator>(source: &Layout, dest: &Layout, comm: &C) -> Result<Self, PmError> {
        let kind = if source.same_ownership(dest) {
            TransitionKind::Swap
        } else {
            TransitionKind::Remap {
                forward: ExchangeDescriptor::count(source, dest, comm)?,
                backward: ExchangeDescriptor::count(dest, source, comm)?,
            }
        };

        debug!(
            "rank {} transition {:?} -> {:?} planned as {}",
            comm.rank(),
            source.axes,
            dest.axes,
            if matches!(kind, TransitionKind::Swap) {
                "local swap"
            } else {
                "remap"
            }
        );

        Ok(Self {
            source: source.clone(),
            dest: dest.clone(),
            kind,
            rank: comm.rank(),
        })
    }

    /// Whether the transition needs no communication.
    pub fn is_local(&self) -> bool {
        matches!(self.kind, TransitionKind::Swap)
    }

    /// Move `data` from the source to the destination layout, in place.
    ///
    /// # Arguments
    /// * `comm` - Communicator.
    /// * `data` - Buffer long enough for the local part of both layouts.
    pub fn forward<E: Pod, C: Communicator>(&self, comm: &C, data: &mut [E]) -> Result<(), PmError> {
        let descriptor = match &self.kind {
            TransitionKind::Remap { forward, .. } => Some(forward),
            TransitionKind::Swap => None,
        };
        self.apply(&self.source, &self.dest, descriptor, comm, data)
    }

    /// Move `data` from the destination back to the source layout, in place.
    ///
    /// # Arguments
    /// * `comm` - Communicator.
    /// * `data` - Buffer long enough for the local part of both layouts.
    pub fn backward<E: Pod, C: Communicator>(&self, comm: &C, data: &mut [E]) -> Result<(), PmError> {
        let descriptor = match &self.kind {
            TransitionKind::Remap { backward, .. } => Some(backward),
            TransitionKind::Swap => None,
        };
        self.apply(&self.dest, &self.source, descriptor, comm, data)
    }

    fn apply<E: Pod, C: Communicator>(
        &self,
        from: &Layout,
        to: &Layout,
        descriptor: Option<&ExchangeDescriptor>,
        comm: &C,
        data: &mut [E],
    ) -> Result<(), PmError> {
        let in_len = from.local_len(self.rank);
        let out_len = to.local_len(self.rank);
        if data.len() < in_len.max(out_len) {
            return Err(PmError::InvalidInput(format!(
                "buffer of {} values cannot hold local layouts of {} and {} values",
                data.len(),
                in_len,
                out_len
            )));
        }

        let mut work = try_zeroed::<E>(out_len)?;
        match descriptor {
            Some(descriptor) => {
                descriptor.exchange(from, to, comm, &data[..in_len], &mut work)?
            }
            None => local_swap(from, to, self.rank, &data[..in_len], &mut work)?,
        }
        data[..out_len].copy_from_slice(&work);

        Ok(())
    }
}
