//! In-process communicator, one thread per process.
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use itertools::Itertools;

use crate::traits::{parallel::Communicator, types::PmError};

/// State of a reusable barrier that can be poisoned by a failing process.
#[derive(Default)]
struct BarrierState {
    arrived: usize,
    generation: usize,
    aborted: bool,
}

/// Mailboxes and synchronisation shared by all processes of a [`LocalCommunicator`] group.
struct Shared {
    size: usize,

    /// Slot `source * size + dest` holds the bytes in flight from `source` to `dest`.
    slots: Vec<Mutex<Vec<u8>>>,

    state: Mutex<BarrierState>,
    condvar: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, PmError> {
    mutex
        .lock()
        .map_err(|_| PmError::Communication("a peer process failed".to_string()))
}

impl Shared {
    fn new(size: usize) -> Self {
        Self {
            size,
            slots: (0..size * size).map(|_| Mutex::new(Vec::new())).collect_vec(),
            state: Mutex::new(BarrierState::default()),
            condvar: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<(), PmError> {
        let aborted = || PmError::Communication("a peer process left the group".to_string());

        let mut state = lock(&self.state)?;
        if state.aborted {
            return Err(aborted());
        }

        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation += 1;
            self.condvar.notify_all();
            return Ok(());
        }

        let generation = state.generation;
        while state.generation == generation && !state.aborted {
            state = self
                .condvar
                .wait(state)
                .map_err(|_| PmError::Communication("a peer process failed".to_string()))?;
        }

        if state.generation == generation {
            Err(aborted())
        } else {
            Ok(())
        }
    }

    fn abort(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.aborted = true;
        }
        self.condvar.notify_all();
    }
}

/// Wakes peers blocked in a collective once the owning process has left the group, whether it
/// returned or unwound. A departed process can never reach another barrier.
struct DepartOnDrop<'a>(&'a Shared);

impl Drop for DepartOnDrop<'_> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A group of processes emulated by scoped threads exchanging data through shared mailboxes.
///
/// Every collective is a write phase, a barrier, a read phase and a second barrier, so it has
/// the same blocking semantics as its MPI counterpart. Once a process has finished or panicked,
/// peers blocked in or later entering a collective receive [`PmError::Communication`] instead of
/// waiting forever.
#[derive(Clone)]
pub struct LocalCommunicator {
    rank: usize,
    shared: Arc<Shared>,
}

impl LocalCommunicator {
    /// Run `f` on `n_procs` processes, returning each process's result in rank order.
    ///
    /// A panic on any process is resumed on the calling thread once all processes have finished.
    ///
    /// # Arguments
    /// * `n_procs` - Number of processes.
    /// * `f` - Body executed by every process.
    pub fn run<R, F>(n_procs: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&LocalCommunicator) -> R + Sync,
    {
        let shared = Arc::new(Shared::new(n_procs));
        let f = &f;

        std::thread::scope(|scope| {
            let handles = (0..n_procs)
                .map(|rank| {
                    let comm = LocalCommunicator {
                        rank,
                        shared: shared.clone(),
                    };
                    scope.spawn(move || {
                        let _guard = DepartOnDrop(&comm.shared);
                        f(&comm)
                    })
                })
                .collect_vec();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect_vec()
        })
    }

    /// Deliver one message to every peer, returning the message received from each peer.
    fn exchange(&self, outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, PmError> {
        let size = self.shared.size;

        for (dest, message) in outgoing.into_iter().enumerate() {
            *lock(&self.shared.slots[self.rank * size + dest])? = message;
        }
        self.shared.wait()?;

        let incoming = (0..size)
            .map(|source| {
                lock(&self.shared.slots[source * size + self.rank]).map(|mut s| std::mem::take(&mut *s))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.shared.wait()?;

        Ok(incoming)
    }

    /// Gather one message from every process onto every process.
    fn all_gather(&self, message: Vec<u8>) -> Result<Vec<Vec<u8>>, PmError> {
        self.exchange(vec![message; self.shared.size])
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> Result<(), PmError> {
        self.shared.wait()
    }

    fn all_to_all_counts(&self, send_counts: &[usize]) -> Result<Vec<usize>, PmError> {
        if send_counts.len() != self.size() {
            return Err(PmError::InvalidInput(format!(
                "expected {} counts, got {}",
                self.size(),
                send_counts.len()
            )));
        }

        let outgoing = send_counts
            .iter()
            .map(|&c| (c as u64).to_le_bytes().to_vec())
            .collect_vec();

        self.exchange(outgoing)?
            .into_iter()
            .map(|bytes| {
                <[u8; 8]>::try_from(bytes.as_slice())
                    .map(|b| u64::from_le_bytes(b) as usize)
                    .map_err(|_| PmError::Communication("malformed count message".to_string()))
            })
            .collect()
    }

    fn all_to_all_bytes(
        &self,
        send: &[u8],
        send_counts: &[usize],
        recv: &mut [u8],
        recv_counts: &[usize],
    ) -> Result<(), PmError> {
        let size = self.size();
        if send_counts.len() != size || recv_counts.len() != size {
            return Err(PmError::InvalidInput(format!(
                "expected {} counts per direction",
                size
            )));
        }
        if send_counts.iter().sum::<usize>() != send.len()
            || recv_counts.iter().sum::<usize>() != recv.len()
        {
            return Err(PmError::InvalidInput(
                "buffer lengths do not match the exchange counts".to_string(),
            ));
        }

        let mut offset = 0;
        let outgoing = send_counts
            .iter()
            .map(|&count| {
                let message = send[offset..offset + count].to_vec();
                offset += count;
                message
            })
            .collect_vec();

        let incoming = self.exchange(outgoing)?;

        let mut offset = 0;
        for (source, (message, &expected)) in incoming.iter().zip(recv_counts).enumerate() {
            if message.len() != expected {
                return Err(PmError::Communication(format!(
                    "rank {} expected {} bytes from rank {}, received {}",
                    self.rank,
                    expected,
                    source,
                    message.len()
                )));
            }
            recv[offset..offset + expected].copy_from_slice(message);
            offset += expected;
        }

        Ok(())
    }

    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), PmError> {
        let message = values.iter().flat_map(|v| v.to_le_bytes()).collect_vec();
        let gathered = self.all_gather(message)?;

        values.iter_mut().for_each(|v| *v = 0.0);
        for message in gathered.iter() {
            if message.len() != values.len() * std::mem::size_of::<f64>() {
                return Err(PmError::Communication(
                    "reduction length differs between processes".to_string(),
                ));
            }
            for (v, bytes) in values.iter_mut().zip(message.chunks_exact(8)) {
                let mut word = [0u8; 8];
                word.copy_from_slice(bytes);
                *v += f64::from_le_bytes(word);
            }
        }

        Ok(())
    }

    fn all_reduce_max(&self, value: usize) -> Result<usize, PmError> {
        let gathered = self.all_gather((value as u64).to_le_bytes().to_vec())?;
        gathered
            .into_iter()
            .map(|bytes| {
                <[u8; 8]>::try_from(bytes.as_slice())
                    .map(|b| u64::from_le_bytes(b) as usize)
                    .map_err(|_| PmError::Communication("malformed reduction message".to_string()))
            })
            .fold_ok(0, usize::max)
    }
}
