//! Incomplete block LU factorization, ILU(n).
//!
//! The factorization owns a separate value array keyed against the extended
//! fill-in pattern (for fill level 0 this is the primary pattern). The
//! array has two meanings: raw matrix values after the copy-in step, and
//! factorization results after build. Lower blocks then hold the Gauss
//! multiplier `A_ij * D_j^{-1}` for reuse in the forward solve, while upper
//! and diagonal blocks hold Schur-complement-updated values. Fill-in that
//! falls outside the extended pattern is silently dropped; that is what
//! makes the factorization approximate.

use std::sync::Arc;

use num_traits::Float;

use crate::dense::Accum;
use crate::error::FmError;
use crate::matrix::BlockMatrix;
use crate::parallel::{ExchangeMode, HaloExchange};
use crate::pattern::SparsityPattern;
use crate::precond::Precond;
use crate::vector::BlockVector;

pub struct BlockIlu<T> {
    pattern: Arc<SparsityPattern>,
    fill: usize,
    transpose: bool,
    values: Vec<T>,
    inv_m: Vec<T>,
    nvar: usize,
    built: bool,
}

impl<T: Float> BlockIlu<T> {
    /// `pattern` is the extended fill-in pattern; for `fill == 0` pass the
    /// matrix's primary pattern handle.
    pub fn new(pattern: Arc<SparsityPattern>, fill: usize) -> Self {
        Self {
            pattern,
            fill,
            transpose: false,
            values: Vec::new(),
            inv_m: Vec::new(),
            nvar: 0,
            built: false,
        }
    }

    /// Factor the transpose instead, for adjoint / discrete-sensitivity
    /// solves. Blocks are transposed as they are inserted.
    pub fn transposed(pattern: Arc<SparsityPattern>, fill: usize) -> Self {
        Self { transpose: true, ..Self::new(pattern, fill) }
    }

    pub fn fill(&self) -> usize {
        self.fill
    }

    /// Factorized storage, for inspection.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn inv_diag(&self) -> &[T] {
        &self.inv_m
    }

    fn block_mut(&mut self, index: usize) -> &mut [T] {
        let bs = self.nvar * self.nvar;
        &mut self.values[index * bs..(index + 1) * bs]
    }

    fn copy_in(&mut self, a: &BlockMatrix<T>) {
        let nvar = self.nvar;
        let bs = nvar * nvar;

        if self.fill == 0 && !self.transpose && Arc::ptr_eq(&self.pattern, a.pattern()) {
            // Identical structure: straight copy.
            for index in 0..self.pattern.nnz() {
                self.block_mut(index).copy_from_slice(a.block_at(index));
            }
            return;
        }

        // Extended pattern or transposed build: clear, then place each
        // matrix block at its slot in the ILU structure.
        let transpose = self.transpose;
        self.values.iter_mut().for_each(|v| *v = T::zero());
        for i in 0..a.n_point_domain() {
            for index in a.pattern().row_span(i) {
                let j = a.pattern().col_at(index);
                let (di, dj) = if transpose { (j, i) } else { (i, j) };
                let Some(slot) = self.pattern.index_of(di, dj) else { continue };
                let src = a.block_at(index);
                let dst = self.block_mut(slot);
                if transpose {
                    for r in 0..nvar {
                        for c in 0..nvar {
                            dst[r * nvar + c] = src[c * nvar + r];
                        }
                    }
                } else {
                    dst.copy_from_slice(&src[..bs]);
                }
            }
        }
    }
}

impl<T: Float> Precond<T> for BlockIlu<T> {
    fn build(&mut self, a: &BlockMatrix<T>) -> Result<(), FmError> {
        let nvar = a.nvar();
        if nvar != a.neqn() {
            return Err(FmError::DimensionMismatch { expected: nvar, found: a.neqn() });
        }
        if self.pattern.n_points() != a.n_points() {
            return Err(FmError::DimensionMismatch {
                expected: a.n_points(),
                found: self.pattern.n_points(),
            });
        }
        let npd = a.n_point_domain();
        let bs = nvar * nvar;
        let nnz = self.pattern.nnz();
        self.nvar = nvar;
        if self.values.len() != nnz * bs {
            self.values = vec![T::zero(); nnz * bs];
        }
        if self.inv_m.len() != npd * bs {
            self.inv_m = vec![T::zero(); npd * bs];
        }

        self.copy_in(a);

        let kernels = a.kernels();
        let mut diag = vec![T::zero(); bs];
        let mut weight = vec![T::zero(); bs];
        let mut upper = vec![T::zero(); bs];
        let mut prod = vec![T::zero(); bs];

        // Row-by-row elimination. The diagonal of row j is inverted the
        // step before row j + 1 needs it.
        for i in 1..npd {
            diag.copy_from_slice(&self.values[self.pattern.dia(i - 1) * bs..self.pattern.dia(i - 1) * bs + bs]);
            kernels.invert(nvar, &diag, &mut self.inv_m[(i - 1) * bs..i * bs]);

            // Lower entries of row i in ascending column order.
            let mut lower: Vec<(usize, usize)> = self
                .pattern
                .row_span(i)
                .filter_map(|k| {
                    let j = self.pattern.col_at(k);
                    (j < i).then_some((k, j))
                })
                .collect();
            lower.sort_unstable_by_key(|&(_, j)| j);

            for (index, j) in lower {
                // weight = A_ij * D_j^{-1}
                kernels.mat_mat(
                    nvar,
                    &self.values[index * bs..(index + 1) * bs],
                    &self.inv_m[j * bs..(j + 1) * bs],
                    &mut weight,
                );

                // A_ik -= weight * A_jk for every k > j present in the
                // extended pattern; anything else is dropped fill-in.
                for index2 in self.pattern.row_span(j) {
                    let k = self.pattern.col_at(index2);
                    if k <= j {
                        continue;
                    }
                    let Some(ik) = self.pattern.index_of(i, k) else { continue };
                    upper.copy_from_slice(&self.values[index2 * bs..(index2 + 1) * bs]);
                    kernels.mat_mat(nvar, &weight, &upper, &mut prod);
                    let dst = &mut self.values[ik * bs..(ik + 1) * bs];
                    for (d, &p) in dst.iter_mut().zip(&prod) {
                        *d = *d - p;
                    }
                }

                // The multiplier replaces the lower entry; the forward
                // solve reuses it.
                self.values[index * bs..(index + 1) * bs].copy_from_slice(&weight);
            }
        }

        diag.copy_from_slice(
            &self.values[self.pattern.dia(npd - 1) * bs..self.pattern.dia(npd - 1) * bs + bs],
        );
        kernels.invert(nvar, &diag, &mut self.inv_m[(npd - 1) * bs..npd * bs]);

        self.built = true;
        Ok(())
    }

    fn apply(
        &mut self,
        a: &BlockMatrix<T>,
        x: &BlockVector<T>,
        y: &mut BlockVector<T>,
        ex: &mut dyn HaloExchange<T>,
    ) -> Result<(), FmError> {
        if !self.built {
            return Err(FmError::NotBuilt);
        }
        let nvar = self.nvar;
        let bs = nvar * nvar;
        let npd = a.n_point_domain();
        let kernels = a.kernels();

        y.set_zero();
        let owned = npd * nvar;
        y.as_mut_slice()[..owned].copy_from_slice(&x.as_slice()[..owned]);

        let mut other = vec![T::zero(); nvar];
        let mut sum = vec![T::zero(); nvar];

        // Forward solve with the stored multipliers, in place.
        for i in 1..npd {
            for index in self.pattern.row_span(i) {
                let j = self.pattern.col_at(index);
                if j >= i {
                    continue;
                }
                other.copy_from_slice(y.block(j));
                kernels.mat_vec(
                    nvar,
                    nvar,
                    &self.values[index * bs..(index + 1) * bs],
                    &other,
                    y.block_mut(i),
                    Accum::Sub,
                );
            }
        }

        // Backward substitution with the inverted diagonals.
        for i in (0..npd).rev() {
            sum.copy_from_slice(y.block(i));
            for index in self.pattern.row_span(i) {
                let j = self.pattern.col_at(index);
                if j <= i || j >= npd {
                    continue;
                }
                other.copy_from_slice(y.block(j));
                kernels.mat_vec(
                    nvar,
                    nvar,
                    &self.values[index * bs..(index + 1) * bs],
                    &other,
                    &mut sum,
                    Accum::Sub,
                );
            }
            kernels.mat_vec(
                nvar,
                nvar,
                &self.inv_m[i * bs..(i + 1) * bs],
                &sum,
                y.block_mut(i),
                Accum::Overwrite,
            );
        }

        ex.exchange(y, ExchangeMode::Forward)
    }
}
