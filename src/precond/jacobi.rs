//! Block Jacobi preconditioner: M = D, one inverse block per owned node.

use num_traits::Float;

use crate::dense::Accum;
use crate::error::FmError;
use crate::matrix::BlockMatrix;
use crate::parallel::{ExchangeMode, HaloExchange};
use crate::precond::Precond;
use crate::vector::BlockVector;

pub struct BlockJacobi<T> {
    inv_m: Vec<T>,
    nvar: usize,
    transpose: bool,
}

impl<T: Float> BlockJacobi<T> {
    pub fn new() -> Self {
        Self { inv_m: Vec::new(), nvar: 0, transpose: false }
    }

    /// Invert the transposed diagonal blocks instead, for adjoint solves.
    pub fn transposed() -> Self {
        Self { inv_m: Vec::new(), nvar: 0, transpose: true }
    }

    /// Cached diagonal inverses, `nvar * nvar` per owned node.
    pub fn inv_diag(&self) -> &[T] {
        &self.inv_m
    }
}

impl<T: Float> Default for BlockJacobi<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> Precond<T> for BlockJacobi<T> {
    fn build(&mut self, a: &BlockMatrix<T>) -> Result<(), FmError> {
        let nvar = a.nvar();
        if nvar != a.neqn() {
            return Err(FmError::DimensionMismatch { expected: nvar, found: a.neqn() });
        }
        let npd = a.n_point_domain();
        let bs = nvar * nvar;
        self.nvar = nvar;
        self.inv_m.clear();
        self.inv_m.resize(npd * bs, T::zero());

        let mut diag = vec![T::zero(); bs];
        for i in 0..npd {
            let src = a.block_at(a.pattern().dia(i));
            if self.transpose {
                for r in 0..nvar {
                    for c in 0..nvar {
                        diag[r * nvar + c] = src[c * nvar + r];
                    }
                }
            } else {
                diag.copy_from_slice(src);
            }
            a.kernels().invert(nvar, &diag, &mut self.inv_m[i * bs..(i + 1) * bs]);
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
        if self.inv_m.is_empty() {
            return Err(FmError::NotBuilt);
        }
        let nvar = self.nvar;
        let bs = nvar * nvar;
        let npd = a.n_point_domain();
        y.set_zero();
        for i in 0..npd {
            a.kernels().mat_vec(
                nvar,
                nvar,
                &self.inv_m[i * bs..(i + 1) * bs],
                x.block(i),
                y.block_mut(i),
                Accum::Overwrite,
            );
        }
        ex.exchange(y, ExchangeMode::Forward)
    }
}
