//! Symmetric Gauss-Seidel, applied directly off the live matrix.
//!
//! There is no persistent build state: the sweeps read the current matrix
//! blocks and solve each diagonal block on the fly with no-pivot Gaussian
//! elimination. The forward sweep solves `(D + L) x* = b`, the backward
//! sweep `(D + U) x = D x*`, with a halo exchange after each so neighbor
//! partitions see the partially updated vector.

use std::marker::PhantomData;

use bitflags::bitflags;
use num_traits::Float;

use crate::error::FmError;
use crate::matrix::BlockMatrix;
use crate::parallel::{ExchangeMode, HaloExchange};
use crate::precond::Precond;
use crate::vector::BlockVector;

bitflags! {
    /// Which sweeps to run; the symmetric pair is the default.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct SweepSet: u32 {
        const FORWARD  = 0b01;
        const BACKWARD = 0b10;
        const SYMMETRIC = Self::FORWARD.bits() | Self::BACKWARD.bits();
    }
}

pub struct SymGaussSeidel<T> {
    sweeps: SweepSet,
    _marker: PhantomData<T>,
}

impl<T: Float> SymGaussSeidel<T> {
    pub fn new() -> Self {
        Self { sweeps: SweepSet::SYMMETRIC, _marker: PhantomData }
    }

    pub fn with_sweeps(sweeps: SweepSet) -> Self {
        Self { sweeps, _marker: PhantomData }
    }

    pub fn sweeps(&self) -> SweepSet {
        self.sweeps
    }
}

impl<T: Float> Default for SymGaussSeidel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> Precond<T> for SymGaussSeidel<T> {
    fn build(&mut self, a: &BlockMatrix<T>) -> Result<(), FmError> {
        // Apply-only: just validate that the diagonal solves are square.
        if a.nvar() != a.neqn() {
            return Err(FmError::DimensionMismatch { expected: a.nvar(), found: a.neqn() });
        }
        Ok(())
    }

    fn apply(
        &mut self,
        a: &BlockMatrix<T>,
        x: &BlockVector<T>,
        y: &mut BlockVector<T>,
        ex: &mut dyn HaloExchange<T>,
    ) -> Result<(), FmError> {
        let nvar = a.nvar();
        if nvar != a.neqn() {
            return Err(FmError::DimensionMismatch { expected: nvar, found: a.neqn() });
        }
        let npd = a.n_point_domain();
        let bs = nvar * nvar;

        let mut acc = vec![T::zero(); nvar];
        let mut aux = vec![T::zero(); nvar];
        let mut diag = vec![T::zero(); bs];

        y.set_zero();

        if self.sweeps.contains(SweepSet::FORWARD) {
            // (D + L) x* = b, node by node; rows before i already hold x*.
            for i in 0..npd {
                a.lower_product(y, i, &mut acc);
                for v in 0..nvar {
                    y[i * nvar + v] = x[i * nvar + v] - acc[v];
                }
                diag.copy_from_slice(a.block_at(a.pattern().dia(i)));
                a.kernels().gauss_solve(nvar, &mut diag, y.block_mut(i));
            }
            ex.exchange(y, ExchangeMode::Forward)?;
        }

        if self.sweeps.contains(SweepSet::BACKWARD) {
            // (D + U) x = D x*, in reverse node order.
            for i in (0..npd).rev() {
                a.diag_product(y, i, &mut aux);
                a.upper_product(y, i, &mut acc);
                for v in 0..nvar {
                    y[i * nvar + v] = aux[v] - acc[v];
                }
                diag.copy_from_slice(a.block_at(a.pattern().dia(i)));
                a.kernels().gauss_solve(nvar, &mut diag, y.block_mut(i));
            }
            ex.exchange(y, ExchangeMode::Forward)?;
        }

        Ok(())
    }
}
