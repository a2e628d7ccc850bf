//! Dense micro-kernels for the small per-node blocks.
//!
//! All hot loops of the sparse subsystem bottom out here: block-block
//! products, block-vector products with selectable accumulation, and
//! no-pivot Gaussian elimination for inverses and solves. Callers guarantee
//! the blocks are well conditioned for the no-pivot path (diagonally
//! dominant blocks are expected from the discretization); an ill-conditioned
//! block degrades the result silently instead of raising an error.
//!
//! The kernels sit behind the [`DenseKernels`] strategy trait so that an
//! accelerated backend can be substituted at startup without touching the
//! sparse code. [`NativeKernels`] is the portable default; [`FaerKernels`]
//! routes the inverse/solve paths through faer's pivoted LU.

pub mod accel;
pub mod native;

pub use accel::FaerKernels;
pub use native::NativeKernels;

/// Accumulation mode for block-vector products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accum {
    /// y = A x
    Overwrite,
    /// y += A x
    Add,
    /// y -= A x
    Sub,
}

/// Strategy interface over the dense block primitives.
///
/// `a` is stored row-major; `mat_mat` and the factorization kernels operate
/// on square `n x n` blocks, `mat_vec` on `nvar x neqn` blocks.
pub trait DenseKernels<T> {
    /// C = A * B for square `n x n` blocks.
    fn mat_mat(&self, n: usize, a: &[T], b: &[T], c: &mut [T]);

    /// Block-vector product with the requested accumulation mode.
    fn mat_vec(&self, nvar: usize, neqn: usize, a: &[T], x: &[T], y: &mut [T], mode: Accum);

    /// y += A^T x; `x` has `nvar` entries, `y` has `neqn`.
    fn mat_vec_transp(&self, nvar: usize, neqn: usize, a: &[T], x: &[T], y: &mut [T]);

    /// inv = A^{-1} via Gaussian elimination.
    fn invert(&self, n: usize, a: &[T], inv: &mut [T]);

    /// Solve A b = rhs in place; `a` is destroyed in the process.
    fn gauss_solve(&self, n: usize, a: &mut [T], b: &mut [T]);
}
