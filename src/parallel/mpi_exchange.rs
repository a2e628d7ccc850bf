//! MPI implementation of the halo exchange.
//!
//! Non-blocking receives are posted for every expected inbound message
//! before any send goes out, then the call drains completions in whatever
//! order they arrive. Merging is order-independent because each message's
//! buffer region is fixed by the plan. All sends are confirmed complete
//! before returning so the staging buffers can be reused by the next call.

use mpi::request::WaitGuard;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::error::FmError;
use crate::parallel::{pack_points, unpack_points, ExchangeMode, HaloExchange, HaloPlan};
use crate::vector::BlockVector;

/// Halo exchange over an MPI communicator.
///
/// Process identity comes from the communicator passed in, never from
/// ambient global state.
pub struct MpiExchange {
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
    plan: HaloPlan,
    /// Largest scalars-per-point the buffers have been sized for; capacity
    /// only, messages are laid out with the current count.
    count_per_point: usize,
    buf_send: Vec<f64>,
    buf_recv: Vec<f64>,
}

impl MpiExchange {
    pub fn new(world: SimpleCommunicator, plan: HaloPlan) -> Self {
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Self {
            world,
            rank,
            size,
            plan,
            count_per_point: 0,
            buf_send: Vec::new(),
            buf_recv: Vec::new(),
        }
    }

    fn ensure_capacity(&mut self, count: usize) {
        if count > self.count_per_point {
            self.count_per_point = count;
            self.buf_send.resize(self.plan.send_points.len() * count, 0.0);
            self.buf_recv.resize(self.plan.recv_points.len() * count, 0.0);
        }
    }

    /// Post receives, then sends, then block until everything completes.
    /// `send_buf`/`recv_buf` and the rank/offset arrays swap between the
    /// forward and reverse modes.
    #[allow(clippy::too_many_arguments)]
    fn transfer(
        world: &SimpleCommunicator,
        cpp: usize,
        send_ranks: &[i32],
        send_offsets: &[usize],
        send_buf: &[f64],
        recv_ranks: &[i32],
        recv_offsets: &[usize],
        recv_buf: &mut [f64],
    ) {
        let n_recv = recv_ranks.len();
        mpi::request::multiple_scope(n_recv, |scope, coll| {
            let mut rest = recv_buf;
            for m in 0..n_recv {
                let len = (recv_offsets[m + 1] - recv_offsets[m]) * cpp;
                let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(len);
                rest = tail;
                let req = world
                    .process_at_rank(recv_ranks[m])
                    .immediate_receive_into(scope, chunk);
                coll.add(req);
            }

            // Receives are posted on every rank before any send, so the
            // sends below cannot deadlock; the guards confirm completion.
            mpi::request::scope(|send_scope| {
                let mut guards = Vec::with_capacity(send_ranks.len());
                for m in 0..send_ranks.len() {
                    let span = send_offsets[m] * cpp..send_offsets[m + 1] * cpp;
                    guards.push(WaitGuard::from(
                        world
                            .process_at_rank(send_ranks[m])
                            .immediate_send(send_scope, &send_buf[span]),
                    ));
                }
            });

            // Drain inbound messages in completion order.
            while coll.incomplete() > 0 {
                let _ = coll.wait_any();
            }
        });
    }
}

impl HaloExchange<f64> for MpiExchange {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn exchange(&mut self, v: &mut BlockVector<f64>, mode: ExchangeMode) -> Result<(), FmError> {
        let count = v.nvar();
        let n_points = v.n_points();
        if self
            .plan
            .send_points
            .iter()
            .chain(self.plan.recv_points.iter())
            .any(|&p| p >= n_points)
        {
            return Err(FmError::PlanMismatch);
        }
        self.ensure_capacity(count);
        let plan = &self.plan;
        let n_send = plan.send_points.len() * count;
        let n_recv = plan.recv_points.len() * count;

        match mode {
            ExchangeMode::Forward => {
                pack_points(v, &plan.send_points, count, &mut self.buf_send);
                Self::transfer(
                    &self.world,
                    count,
                    &plan.send_ranks,
                    &plan.send_offsets,
                    &self.buf_send[..n_send],
                    &plan.recv_ranks,
                    &plan.recv_offsets,
                    &mut self.buf_recv[..n_recv],
                );
                unpack_points(v, &plan.recv_points, count, &self.buf_recv[..n_recv], mode);
            }
            ExchangeMode::Reverse => {
                // Halo contributions travel back to their owners: the
                // receive-side structures describe the outbound messages
                // and vice versa, and arriving data is accumulated.
                pack_points(v, &plan.recv_points, count, &mut self.buf_recv);
                Self::transfer(
                    &self.world,
                    count,
                    &plan.recv_ranks,
                    &plan.recv_offsets,
                    &self.buf_recv[..n_recv],
                    &plan.send_ranks,
                    &plan.send_offsets,
                    &mut self.buf_send[..n_send],
                );
                unpack_points(v, &plan.send_points, count, &self.buf_send[..n_send], mode);
            }
        }

        Ok(())
    }
}
