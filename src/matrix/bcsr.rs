//! Block compressed-sparse-row matrix.
//!
//! The matrix owns a flat array of `nnz * nvar * neqn` scalars and borrows
//! its sparsity pattern from the mesh layer; block `(i, j)` sits contiguously
//! at `index * nvar * neqn`, where `index` is the position of column `j`
//! within row `i`'s span. Blocks absent from the pattern are implicitly
//! zero. The physics layer zeroes and reassembles the values every solver
//! iteration; the pattern never changes.

use std::sync::Arc;

use num_traits::Float;

use crate::dense::{Accum, DenseKernels, NativeKernels};
use crate::error::FmError;
use crate::parallel::{ExchangeMode, HaloExchange};
use crate::pattern::SparsityPattern;
use crate::vector::BlockVector;

pub struct BlockMatrix<T> {
    pattern: Option<Arc<SparsityPattern>>,
    nvar: usize,
    neqn: usize,
    values: Vec<T>,
    kernels: Box<dyn DenseKernels<T> + Send + Sync>,
}

impl<T: Float + Send + Sync + 'static> BlockMatrix<T> {
    /// An empty matrix; storage is allocated by [`initialize`](Self::initialize).
    pub fn new() -> Self {
        Self {
            pattern: None,
            nvar: 0,
            neqn: 0,
            values: Vec::new(),
            kernels: Box::new(NativeKernels),
        }
    }

    /// Swap in an accelerated dense backend. Meant to be called at startup,
    /// before the first build; the backends agree to floating-point
    /// tolerance so a later swap is legal but pointless.
    pub fn set_kernels(&mut self, kernels: Box<dyn DenseKernels<T> + Send + Sync>) {
        self.kernels = kernels;
    }

    /// Size value storage from the injected pattern. May only be called
    /// once per instance.
    pub fn initialize(
        &mut self,
        pattern: Arc<SparsityPattern>,
        nvar: usize,
        neqn: usize,
    ) -> Result<(), FmError> {
        if self.pattern.is_some() {
            return Err(FmError::DoubleInit);
        }
        self.values = vec![T::zero(); pattern.nnz() * nvar * neqn];
        self.nvar = nvar;
        self.neqn = neqn;
        self.pattern = Some(pattern);
        Ok(())
    }
}

impl<T: Float> BlockMatrix<T> {
    fn pat(&self) -> &SparsityPattern {
        self.pattern.as_ref().expect("matrix not initialized")
    }

    pub fn pattern(&self) -> &Arc<SparsityPattern> {
        self.pattern.as_ref().expect("matrix not initialized")
    }

    pub fn kernels(&self) -> &(dyn DenseKernels<T> + Send + Sync) {
        &*self.kernels
    }

    pub fn nvar(&self) -> usize {
        self.nvar
    }

    pub fn neqn(&self) -> usize {
        self.neqn
    }

    pub fn n_points(&self) -> usize {
        self.pat().n_points()
    }

    pub fn n_point_domain(&self) -> usize {
        self.pat().n_point_domain()
    }

    fn block_size(&self) -> usize {
        self.nvar * self.neqn
    }

    /// Contiguous view of the block stored at `index`.
    pub fn block_at(&self, index: usize) -> &[T] {
        debug_assert!(index < self.pat().nnz());
        let bs = self.block_size();
        &self.values[index * bs..(index + 1) * bs]
    }

    fn block_at_mut(&mut self, index: usize) -> &mut [T] {
        debug_assert!(index < self.pat().nnz());
        let bs = self.block_size();
        &mut self.values[index * bs..(index + 1) * bs]
    }

    /// Block `(i, j)`, or `None` if outside the pattern.
    pub fn block(&self, i: usize, j: usize) -> Option<&[T]> {
        self.pat().index_of(i, j).map(|k| {
            let bs = self.block_size();
            &self.values[k * bs..(k + 1) * bs]
        })
    }

    pub fn block_mut(&mut self, i: usize, j: usize) -> Option<&mut [T]> {
        let bs = self.block_size();
        match self.pat().index_of(i, j) {
            Some(k) => Some(&mut self.values[k * bs..(k + 1) * bs]),
            None => None,
        }
    }

    /// Overwrite block `(i, j)`; no-op if the entry is outside the pattern.
    pub fn set_block(&mut self, i: usize, j: usize, block: &[T]) {
        if let Some(dst) = self.block_mut(i, j) {
            dst.copy_from_slice(&block[..dst.len()]);
        }
    }

    pub fn add_block(&mut self, i: usize, j: usize, block: &[T]) {
        if let Some(dst) = self.block_mut(i, j) {
            for (d, &s) in dst.iter_mut().zip(block) {
                *d = *d + s;
            }
        }
    }

    pub fn sub_block(&mut self, i: usize, j: usize, block: &[T]) {
        if let Some(dst) = self.block_mut(i, j) {
            for (d, &s) in dst.iter_mut().zip(block) {
                *d = *d - s;
            }
        }
    }

    /// Store the transpose of `block` at `(i, j)`. Square blocks only.
    pub fn set_block_transposed(&mut self, i: usize, j: usize, block: &[T]) {
        let n = self.nvar;
        debug_assert_eq!(self.nvar, self.neqn);
        if let Some(dst) = self.block_mut(i, j) {
            for r in 0..n {
                for c in 0..n {
                    dst[r * n + c] = block[c * n + r];
                }
            }
        }
    }

    /// Add `val` to every scalar on the diagonal of diagonal block `i`
    /// (implicit time stepping adds `vol / dt` here).
    pub fn add_to_diag(&mut self, i: usize, val: T) {
        let k = self.pat().dia(i);
        let neqn = self.neqn;
        let dst = self.block_at_mut(k);
        for v in 0..neqn.min(dst.len() / neqn) {
            dst[v * neqn + v] = dst[v * neqn + v] + val;
        }
    }

    pub fn set_zero(&mut self) {
        self.values.iter_mut().for_each(|v| *v = T::zero());
    }

    /// Zero one scalar row (a single unknown, not a whole node) across all
    /// blocks of its matrix row, leaving 1 on the diagonal scalar. Used to
    /// impose essential boundary conditions at the unknown level.
    pub fn delete_row(&mut self, scalar_row: usize) {
        let nvar = self.nvar;
        let neqn = self.neqn;
        let bs = self.block_size();
        let block_i = scalar_row / nvar;
        let row = scalar_row - block_i * nvar;

        for index in self.pat().row_span(block_i) {
            let on_diag = self.pat().col_at(index) == block_i;
            let dst = &mut self.values[index * bs + row * neqn..index * bs + (row + 1) * neqn];
            dst.iter_mut().for_each(|v| *v = T::zero());
            if on_diag {
                dst[row] = T::one();
            }
        }
    }

    /// Impose `x = value` at node `i`: zero row and column `i` (the diagonal
    /// block becomes identity), move the known column contributions to the
    /// right-hand side, and set `rhs[i] = value`. Eliminating both row and
    /// column preserves any symmetry of the remaining system. One full
    /// matrix scan, O(nnz).
    pub fn enforce_solution_at_node(
        &mut self,
        node: usize,
        value: &[T],
        rhs: &mut BlockVector<T>,
    ) -> Result<(), FmError> {
        if rhs.nvar() != self.nvar {
            return Err(FmError::DimensionMismatch { expected: self.nvar, found: rhs.nvar() });
        }
        if rhs.n_points() != self.n_points() {
            return Err(FmError::DimensionMismatch {
                expected: self.n_points(),
                found: rhs.n_points(),
            });
        }
        if value.len() != self.nvar {
            return Err(FmError::DimensionMismatch { expected: self.nvar, found: value.len() });
        }
        let nvar = self.nvar;
        let neqn = self.neqn;
        let bs = self.block_size();
        let n_points = self.n_points();

        // Whole row first.
        for index in self.pat().row_span(node) {
            self.values[index * bs..(index + 1) * bs]
                .iter_mut()
                .for_each(|v| *v = T::zero());
        }

        // Update the rhs with the column product, then delete the column.
        for i in 0..n_points {
            let Some(index) = self.pat().index_of(i, node) else { continue };
            let start = index * bs;
            for iv in 0..nvar {
                let mut acc = T::zero();
                for jv in 0..neqn {
                    acc = acc + self.values[start + iv * neqn + jv] * value[jv];
                }
                rhs[i * nvar + iv] = rhs[i * nvar + iv] - acc;
            }
            if i == node {
                for iv in 0..nvar {
                    self.values[start + iv * (neqn + 1)] = T::one();
                }
            } else {
                self.values[start..start + bs].iter_mut().for_each(|v| *v = T::zero());
            }
        }

        for iv in 0..nvar {
            rhs[node * nvar + iv] = value[iv];
        }
        Ok(())
    }

    /// out = (block-row `row`) * x over the full column span.
    pub fn row_product(&self, x: &BlockVector<T>, row: usize, out: &mut [T]) {
        out.iter_mut().for_each(|v| *v = T::zero());
        for index in self.pat().row_span(row) {
            let col = self.pat().col_at(index);
            self.kernels
                .mat_vec(self.nvar, self.neqn, self.block_at(index), x.block(col), out, Accum::Add);
        }
    }

    /// out = L * x, the strictly-lower part of block-row `row`.
    pub fn lower_product(&self, x: &BlockVector<T>, row: usize, out: &mut [T]) {
        out.iter_mut().for_each(|v| *v = T::zero());
        for index in self.pat().row_span(row) {
            let col = self.pat().col_at(index);
            if col < row {
                self.kernels.mat_vec(
                    self.nvar,
                    self.neqn,
                    self.block_at(index),
                    x.block(col),
                    out,
                    Accum::Add,
                );
            }
        }
    }

    /// out = U * x, the strictly-upper part of block-row `row`.
    pub fn upper_product(&self, x: &BlockVector<T>, row: usize, out: &mut [T]) {
        out.iter_mut().for_each(|v| *v = T::zero());
        for index in self.pat().row_span(row) {
            let col = self.pat().col_at(index);
            if col > row {
                self.kernels.mat_vec(
                    self.nvar,
                    self.neqn,
                    self.block_at(index),
                    x.block(col),
                    out,
                    Accum::Add,
                );
            }
        }
    }

    /// out = D * x, the diagonal block of `row` alone.
    pub fn diag_product(&self, x: &BlockVector<T>, row: usize, out: &mut [T]) {
        out.iter_mut().for_each(|v| *v = T::zero());
        let index = self.pat().dia(row);
        self.kernels
            .mat_vec(self.nvar, self.neqn, self.block_at(index), x.block(row), out, Accum::Add);
    }

    fn check_operands(&self, x: &BlockVector<T>, y: &BlockVector<T>) -> Result<(), FmError> {
        let n_points = self.n_points();
        if x.n_points() != n_points || y.n_points() != n_points {
            return Err(FmError::DimensionMismatch {
                expected: n_points,
                found: x.n_points().max(y.n_points()),
            });
        }
        if x.nvar() != self.neqn || y.nvar() != self.nvar {
            return Err(FmError::DimensionMismatch { expected: self.nvar, found: x.nvar() });
        }
        Ok(())
    }

    /// y = A * x over the owned rows, then a forward halo exchange so that
    /// neighboring partitions see the halo entries they own.
    pub fn mat_vec_product(
        &self,
        x: &BlockVector<T>,
        y: &mut BlockVector<T>,
        ex: &mut dyn HaloExchange<T>,
    ) -> Result<(), FmError> {
        self.check_operands(x, y)?;
        y.set_zero();
        for row in 0..self.n_point_domain() {
            for index in self.pat().row_span(row) {
                let col = self.pat().col_at(index);
                self.kernels.mat_vec(
                    self.nvar,
                    self.neqn,
                    self.block_at(index),
                    x.block(col),
                    y.block_mut(row),
                    Accum::Add,
                );
            }
        }
        ex.exchange(y, ExchangeMode::Forward)
    }

    /// y = A^T * x; contributions land on the column nodes, and the halo
    /// exchange runs in reverse so partial sums are accumulated by the
    /// owning partitions.
    pub fn mat_vec_product_transposed(
        &self,
        x: &BlockVector<T>,
        y: &mut BlockVector<T>,
        ex: &mut dyn HaloExchange<T>,
    ) -> Result<(), FmError> {
        self.check_operands(y, x)?;
        y.set_zero();
        for row in 0..self.n_point_domain() {
            for index in self.pat().row_span(row) {
                let col = self.pat().col_at(index);
                self.kernels.mat_vec_transp(
                    self.nvar,
                    self.neqn,
                    self.block_at(index),
                    x.block(row),
                    y.block_mut(col),
                );
            }
        }
        ex.exchange(y, ExchangeMode::Reverse)
    }

    /// r = A * x - f, owned rows only. No exchange: residual reduction is
    /// the caller's responsibility.
    pub fn compute_residual(
        &self,
        x: &BlockVector<T>,
        f: &BlockVector<T>,
        r: &mut BlockVector<T>,
    ) -> Result<(), FmError> {
        self.check_operands(x, r)?;
        let nvar = self.nvar;
        let mut row_sum = vec![T::zero(); nvar];
        for row in 0..self.n_point_domain() {
            self.row_product(x, row, &mut row_sum);
            let fi = f.block(row);
            for (v, out) in r.block_mut(row).iter_mut().enumerate() {
                *out = row_sum[v] - fi[v];
            }
        }
        Ok(())
    }
}

#[cfg(feature = "rayon")]
impl<T: Float + Send + Sync + 'static> BlockMatrix<T> {
    /// Rayon-parallel variant of [`mat_vec_product`](Self::mat_vec_product);
    /// rows are independent so the owned range is split across threads.
    pub fn mat_vec_product_parallel(
        &self,
        x: &BlockVector<T>,
        y: &mut BlockVector<T>,
        ex: &mut dyn HaloExchange<T>,
    ) -> Result<(), FmError> {
        use rayon::prelude::*;

        self.check_operands(x, y)?;
        y.set_zero();
        let nvar = self.nvar;
        let neqn = self.neqn;
        let pattern = self.pat();
        let owned = self.n_point_domain() * nvar;
        y.as_mut_slice()[..owned]
            .par_chunks_mut(nvar)
            .enumerate()
            .for_each(|(row, out)| {
                for index in pattern.row_span(row) {
                    let col = pattern.col_at(index);
                    self.kernels.mat_vec(
                        nvar,
                        neqn,
                        self.block_at(index),
                        x.block(col),
                        out,
                        Accum::Add,
                    );
                }
            });
        ex.exchange(y, ExchangeMode::Forward)
    }
}

impl<T: Float + Send + Sync + 'static> Default for BlockMatrix<T> {
    fn default() -> Self {
        Self::new()
    }
}
