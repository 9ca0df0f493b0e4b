//! MPI backed communicator.
use itertools::Itertools;
use mpi::{
    collective::SystemOperation,
    datatype::{Partition, PartitionMut},
    topology::SimpleCommunicator,
    traits::{Communicator as MpiCommunicator, CommunicatorCollectives},
    Count,
};

use crate::{
    comm::helpers::displacements,
    traits::{parallel::Communicator, types::PmError},
};

/// MPI counts are 32 bit, larger messages have to be refused rather than truncated.
fn to_counts(counts: &[usize]) -> Result<Vec<Count>, PmError> {
    counts
        .iter()
        .map(|&c| {
            Count::try_from(c).map_err(|_| {
                PmError::Communication(format!("message of {} bytes exceeds the MPI count range", c))
            })
        })
        .collect()
}

impl Communicator for SimpleCommunicator {
    fn rank(&self) -> usize {
        MpiCommunicator::rank(self) as usize
    }

    fn size(&self) -> usize {
        MpiCommunicator::size(self) as usize
    }

    fn barrier(&self) -> Result<(), PmError> {
        CommunicatorCollectives::barrier(self);
        Ok(())
    }

    fn all_to_all_counts(&self, send_counts: &[usize]) -> Result<Vec<usize>, PmError> {
        let send = send_counts.iter().map(|&c| c as u64).collect_vec();
        let mut recv = vec![0u64; Communicator::size(self)];
        self.all_to_all_into(&send[..], &mut recv[..]);
        Ok(recv.into_iter().map(|c| c as usize).collect_vec())
    }

    fn all_to_all_bytes(
        &self,
        send: &[u8],
        send_counts: &[usize],
        recv: &mut [u8],
        recv_counts: &[usize],
    ) -> Result<(), PmError> {
        let displs_snd = to_counts(&displacements(send_counts))?;
        let displs_recv = to_counts(&displacements(recv_counts))?;
        let counts_snd = to_counts(send_counts)?;
        let counts_recv = to_counts(recv_counts)?;

        let partition_snd = Partition::new(send, counts_snd, &displs_snd[..]);
        let mut partition_received: PartitionMut<[u8], Vec<Count>, &[Count]> =
            PartitionMut::new(recv, counts_recv, &displs_recv[..]);

        self.all_to_all_varcount_into(&partition_snd, &mut partition_received);
        Ok(())
    }

    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), PmError> {
        let local = values.to_vec();
        self.all_reduce_into(&local[..], values, SystemOperation::sum());
        Ok(())
    }

    fn all_reduce_max(&self, value: usize) -> Result<usize, PmError> {
        let mut global = 0u64;
        self.all_reduce_into(&(value as u64), &mut global, SystemOperation::max());
        Ok(global as usize)
    }
}
