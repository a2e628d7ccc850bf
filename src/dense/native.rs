//! Portable block kernels, no pivoting.

use num_traits::Float;

use crate::dense::{Accum, DenseKernels};

/// Default backend: straight-line Gaussian elimination and triple loops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeKernels;

impl NativeKernels {
    pub fn new() -> Self {
        NativeKernels
    }
}

impl<T: Float> DenseKernels<T> for NativeKernels {
    fn mat_mat(&self, n: usize, a: &[T], b: &[T], c: &mut [T]) {
        debug_assert!(a.len() >= n * n && b.len() >= n * n && c.len() >= n * n);
        for i in 0..n {
            for j in 0..n {
                let mut acc = T::zero();
                for k in 0..n {
                    acc = acc + a[i * n + k] * b[k * n + j];
                }
                c[i * n + j] = acc;
            }
        }
    }

    fn mat_vec(&self, nvar: usize, neqn: usize, a: &[T], x: &[T], y: &mut [T], mode: Accum) {
        debug_assert!(a.len() >= nvar * neqn && x.len() >= neqn && y.len() >= nvar);
        for i in 0..nvar {
            let mut acc = T::zero();
            for j in 0..neqn {
                acc = acc + a[i * neqn + j] * x[j];
            }
            y[i] = match mode {
                Accum::Overwrite => acc,
                Accum::Add => y[i] + acc,
                Accum::Sub => y[i] - acc,
            };
        }
    }

    fn mat_vec_transp(&self, nvar: usize, neqn: usize, a: &[T], x: &[T], y: &mut [T]) {
        debug_assert!(a.len() >= nvar * neqn && x.len() >= nvar && y.len() >= neqn);
        for j in 0..neqn {
            let mut acc = T::zero();
            for i in 0..nvar {
                acc = acc + a[i * neqn + j] * x[i];
            }
            y[j] = y[j] + acc;
        }
    }

    fn invert(&self, n: usize, a: &[T], inv: &mut [T]) {
        debug_assert!(a.len() >= n * n && inv.len() >= n * n);

        // Work on a copy, accumulate the inverse from the identity.
        let mut work = a[..n * n].to_vec();
        for i in 0..n {
            for j in 0..n {
                inv[i * n + j] = if i == j { T::one() } else { T::zero() };
            }
        }

        // Forward elimination to an upper-triangular system.
        for i in 1..n {
            for j in 0..i {
                let weight = work[i * n + j] / work[j * n + j];
                for k in j..n {
                    work[i * n + k] = work[i * n + k] - weight * work[j * n + k];
                }
                // "inv" is still lower triangular at this stage.
                for k in 0..=j {
                    inv[i * n + k] = inv[i * n + k] - weight * inv[j * n + k];
                }
            }
        }

        // Backward substitution.
        for i in (0..n).rev() {
            for j in i + 1..n {
                let factor = work[i * n + j];
                for k in 0..n {
                    inv[i * n + k] = inv[i * n + k] - factor * inv[j * n + k];
                }
            }
            let pivot = work[i * n + i];
            for k in 0..n {
                inv[i * n + k] = inv[i * n + k] / pivot;
            }
        }
    }

    fn gauss_solve(&self, n: usize, a: &mut [T], b: &mut [T]) {
        debug_assert!(a.len() >= n * n && b.len() >= n);

        for i in 1..n {
            for j in 0..i {
                let weight = a[i * n + j] / a[j * n + j];
                for k in j..n {
                    a[i * n + k] = a[i * n + k] - weight * a[j * n + k];
                }
                b[i] = b[i] - weight * b[j];
            }
        }

        for i in (0..n).rev() {
            for j in i + 1..n {
                b[i] = b[i] - a[i * n + j] * b[j];
            }
            b[i] = b[i] / a[i * n + i];
        }
    }
}
