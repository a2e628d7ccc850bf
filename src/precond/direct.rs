//! Direct-solver adapter: exact factorization of the owned sub-block.
//!
//! Packs the owned rows and columns of the sparse matrix into a dense faer
//! matrix and factors it with full-pivot LU. Applying the preconditioner is
//! then an exact solve of the local system, which makes this the reference
//! the iterative preconditioners are checked against. Halo coupling is
//! dropped, so across partitions this is a block-Jacobi-by-partition
//! method. Dense storage limits it to small local problems.

#[cfg(feature = "direct")]
mod imp {
    use faer::linalg::solvers::{FullPivLu, SolveCore};
    use faer::traits::{ComplexField, RealField};
    use faer::{Conj, Mat, MatMut};
    use num_traits::Float;

    use crate::error::FmError;
    use crate::matrix::BlockMatrix;
    use crate::parallel::{ExchangeMode, HaloExchange};
    use crate::precond::Precond;
    use crate::vector::BlockVector;

    pub struct DirectPrecond<T> {
        factor: Option<FullPivLu<T>>,
        n: usize,
    }

    impl<T> DirectPrecond<T> {
        pub fn new() -> Self {
            Self { factor: None, n: 0 }
        }
    }

    impl<T> Default for DirectPrecond<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T: Float + ComplexField + RealField> Precond<T> for DirectPrecond<T> {
        fn build(&mut self, a: &BlockMatrix<T>) -> Result<(), FmError> {
            let nvar = a.nvar();
            if nvar != a.neqn() {
                return Err(FmError::DimensionMismatch { expected: nvar, found: a.neqn() });
            }
            let npd = a.n_point_domain();
            let n = npd * nvar;

            let dense = Mat::from_fn(n, n, |r, c| {
                let (i, iv) = (r / nvar, r % nvar);
                let (j, jv) = (c / nvar, c % nvar);
                match a.block(i, j) {
                    Some(block) => block[iv * nvar + jv],
                    None => T::zero(),
                }
            });
            self.factor = Some(FullPivLu::new(dense.as_ref()));
            self.n = n;
            Ok(())
        }

        fn apply(
            &mut self,
            _a: &BlockMatrix<T>,
            x: &BlockVector<T>,
            y: &mut BlockVector<T>,
            ex: &mut dyn HaloExchange<T>,
        ) -> Result<(), FmError> {
            let Some(factor) = &self.factor else {
                return Err(FmError::NotBuilt);
            };
            let n = self.n;
            y.set_zero();
            y.as_mut_slice()[..n].copy_from_slice(&x.as_slice()[..n]);
            let y_mat = MatMut::from_column_major_slice_mut(&mut y.as_mut_slice()[..n], n, 1);
            factor.solve_in_place_with_conj(Conj::No, y_mat);
            ex.exchange(y, ExchangeMode::Forward)
        }
    }
}

#[cfg(not(feature = "direct"))]
mod imp {
    use std::marker::PhantomData;

    use num_traits::Float;

    use crate::error::FmError;
    use crate::matrix::BlockMatrix;
    use crate::parallel::HaloExchange;
    use crate::precond::Precond;
    use crate::vector::BlockVector;

    /// Stub kept so configuration code can name the type; every operation
    /// reports that direct support was not compiled in.
    pub struct DirectPrecond<T> {
        _marker: PhantomData<T>,
    }

    impl<T> DirectPrecond<T> {
        pub fn new() -> Self {
            Self { _marker: PhantomData }
        }
    }

    impl<T> Default for DirectPrecond<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T: Float> Precond<T> for DirectPrecond<T> {
        fn build(&mut self, _a: &BlockMatrix<T>) -> Result<(), FmError> {
            Err(FmError::DirectUnavailable)
        }

        fn apply(
            &mut self,
            _a: &BlockMatrix<T>,
            _x: &BlockVector<T>,
            _y: &mut BlockVector<T>,
            _ex: &mut dyn HaloExchange<T>,
        ) -> Result<(), FmError> {
            Err(FmError::DirectUnavailable)
        }
    }
}

pub use imp::DirectPrecond;
