//! Point-to-point halo exchange across partition boundaries.
//!
//! Every matrix-vector product and preconditioner apply ends with an
//! exchange: boundary data goes out to the neighboring partitions and the
//! call blocks until all expected halo data has arrived and been merged.
//! The forward mode overwrites halo slots with the owning partition's
//! values; the reverse mode (used by transposed products) adds incoming
//! partial sums into locally owned slots instead.

use num_traits::Float;

use crate::error::FmError;
use crate::vector::BlockVector;

#[cfg(feature = "mpi")]
pub mod mpi_exchange;
#[cfg(feature = "mpi")]
pub use mpi_exchange::MpiExchange;

/// Size the global rayon pool to the physical core count. Call once at
/// startup, before the first parallel product; later calls are no-ops.
#[cfg(feature = "rayon")]
pub fn init_thread_pool() {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build_global()
        .ok();
}

/// Direction of the halo exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeMode {
    /// Owned values out, halo slots overwritten on arrival.
    Forward,
    /// Sender/receiver roles swap; arriving partial sums are added into
    /// owned slots.
    Reverse,
}

/// Halo-exchange service injected by the mesh/geometry layer.
///
/// `exchange` takes `&mut self`: the staging buffers are process-wide,
/// lazily grown to the largest message seen, and reused across calls, so
/// two exchanges must never be in flight at once.
pub trait HaloExchange<T> {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Block until the vector is consistent across partitions.
    fn exchange(&mut self, v: &mut BlockVector<T>, mode: ExchangeMode) -> Result<(), FmError>;
}

/// Single-partition topology: no neighbors, nothing to exchange.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialExchange;

impl SerialExchange {
    pub fn new() -> Self {
        SerialExchange
    }
}

impl<T: Float> HaloExchange<T> for SerialExchange {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn exchange(&mut self, _v: &mut BlockVector<T>, _mode: ExchangeMode) -> Result<(), FmError> {
        Ok(())
    }
}

/// Partition-boundary topology: which points go to and come from which
/// neighbor rank. Built by the mesh decomposition, immutable afterwards.
///
/// Message `m` of the send side covers `send_points[send_offsets[m]..
/// send_offsets[m + 1]]`, destined for `send_ranks[m]`; the receive side is
/// laid out the same way.
#[derive(Debug, Clone, Default)]
pub struct HaloPlan {
    pub send_ranks: Vec<i32>,
    pub send_offsets: Vec<usize>,
    pub send_points: Vec<usize>,
    pub recv_ranks: Vec<i32>,
    pub recv_offsets: Vec<usize>,
    pub recv_points: Vec<usize>,
}

impl HaloPlan {
    pub fn n_send_msgs(&self) -> usize {
        self.send_ranks.len()
    }

    pub fn n_recv_msgs(&self) -> usize {
        self.recv_ranks.len()
    }
}

/// Gather the blocks of `points` into `buf`, contiguously with the current
/// block size `count`. `buf` may be larger than the message (the staging
/// buffers are sized to the largest exchange seen); only the first
/// `points.len() * count` scalars are written.
#[cfg(any(feature = "mpi", test))]
pub(crate) fn pack_points<T: Float>(
    v: &BlockVector<T>,
    points: &[usize],
    count: usize,
    buf: &mut [T],
) {
    for (k, &p) in points.iter().enumerate() {
        for var in 0..count {
            buf[k * count + var] = v[p * count + var];
        }
    }
}

/// Scatter a received message back into the vector, overwriting (forward)
/// or accumulating (reverse) per block.
#[cfg(any(feature = "mpi", test))]
pub(crate) fn unpack_points<T: Float>(
    v: &mut BlockVector<T>,
    points: &[usize],
    count: usize,
    buf: &[T],
    mode: ExchangeMode,
) {
    for (k, &p) in points.iter().enumerate() {
        for var in 0..count {
            let incoming = buf[k * count + var];
            match mode {
                ExchangeMode::Forward => v[p * count + var] = incoming,
                ExchangeMode::Reverse => v[p * count + var] = v[p * count + var] + incoming,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The staging buffer keeps its high-water capacity, but the message
    /// layout must follow the current block size: no padding between
    /// blocks when a smaller exchange reuses a larger buffer.
    #[test]
    fn message_layout_follows_the_current_count() {
        let mut v = BlockVector::<f64>::new(4, 3, 2);
        for i in 0..8 {
            v[i] = i as f64;
        }
        // Capacity from an earlier count-3 exchange over the same 2 points.
        let mut buf = vec![-1.0; 6];
        pack_points(&v, &[2, 0], 2, &mut buf);
        assert_eq!(&buf[..4], &[4.0, 5.0, 0.0, 1.0]);
        assert_eq!(&buf[4..], &[-1.0, -1.0]);

        unpack_points(&mut v, &[3], 2, &buf[..2], ExchangeMode::Forward);
        assert_eq!(v[6], 4.0);
        assert_eq!(v[7], 5.0);

        unpack_points(&mut v, &[3], 2, &buf[..2], ExchangeMode::Reverse);
        assert_eq!(v[6], 8.0);
        assert_eq!(v[7], 10.0);
    }
}
