//! faer-accelerated block kernels.
//!
//! Routes the block product through faer's dense matmul and the
//! inverse/solve kernels through its pivoted LU. Results agree with
//! [`NativeKernels`](crate::dense::NativeKernels) to floating-point
//! tolerance; the pivoted LU additionally tolerates blocks the no-pivot
//! path cannot handle.

use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};

use crate::dense::{Accum, DenseKernels, NativeKernels};

/// Accelerated backend, selected at startup in place of the native one.
#[derive(Debug, Default, Clone, Copy)]
pub struct FaerKernels;

impl FaerKernels {
    pub fn new() -> Self {
        FaerKernels
    }
}

impl DenseKernels<f64> for FaerKernels {
    fn mat_mat(&self, n: usize, a: &[f64], b: &[f64], c: &mut [f64]) {
        let a_mat = Mat::from_fn(n, n, |i, j| a[i * n + j]);
        let b_mat = Mat::from_fn(n, n, |i, j| b[i * n + j]);
        let c_mat = &a_mat * &b_mat;
        for i in 0..n {
            for j in 0..n {
                c[i * n + j] = c_mat[(i, j)];
            }
        }
    }

    // The vector products stay on the native path: the blocks are a handful
    // of scalars and the dispatch overhead dominates any dense-library gain.
    fn mat_vec(&self, nvar: usize, neqn: usize, a: &[f64], x: &[f64], y: &mut [f64], mode: Accum) {
        NativeKernels.mat_vec(nvar, neqn, a, x, y, mode);
    }

    fn mat_vec_transp(&self, nvar: usize, neqn: usize, a: &[f64], x: &[f64], y: &mut [f64]) {
        NativeKernels.mat_vec_transp(nvar, neqn, a, x, y);
    }

    fn invert(&self, n: usize, a: &[f64], inv: &mut [f64]) {
        let a_mat = Mat::from_fn(n, n, |i, j| a[i * n + j]);
        let factor = FullPivLu::new(a_mat.as_ref());
        let mut id = Mat::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 });
        factor.solve_in_place_with_conj(Conj::No, id.as_mut());
        for i in 0..n {
            for j in 0..n {
                inv[i * n + j] = id[(i, j)];
            }
        }
    }

    fn gauss_solve(&self, n: usize, a: &mut [f64], b: &mut [f64]) {
        let a_mat = Mat::from_fn(n, n, |i, j| a[i * n + j]);
        let factor = FullPivLu::new(a_mat.as_ref());
        let b_mat = MatMut::from_column_major_slice_mut(&mut b[..n], n, 1);
        factor.solve_in_place_with_conj(Conj::No, b_mat);
    }
}
