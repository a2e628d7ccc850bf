//! Read-only block sparsity pattern, shared by reference.
//!
//! The pattern is produced once by the mesh/geometry layer and injected into
//! every structure that needs it: the matrix itself, and separately the
//! extended (fill-in) pattern of the ILU factorization. It is immutable
//! after construction and shared through an [`Arc`], never copied.

use std::sync::Arc;

use crate::error::FmError;

/// Block CSR structure: row offsets, column indices, diagonal positions.
///
/// Row `i`'s entries span `row_ptr[i]..row_ptr[i + 1]` in `col_idx`; entries
/// may be unordered within the row. Every row carries exactly one diagonal
/// entry, located by `dia_ptr[i]`.
#[derive(Debug)]
pub struct SparsityPattern {
    n_points: usize,
    n_point_domain: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    dia_ptr: Vec<usize>,
}

impl SparsityPattern {
    /// Validate and build a pattern from raw CSR arrays.
    pub fn new_checked(
        n_point_domain: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
    ) -> Result<Self, FmError> {
        if row_ptr.is_empty() {
            return Err(FmError::InvalidPattern("row_ptr must not be empty"));
        }
        let n_points = row_ptr.len() - 1;
        if n_point_domain > n_points {
            return Err(FmError::InvalidPattern("owned range exceeds point count"));
        }
        if row_ptr[0] != 0 || *row_ptr.last().unwrap() != col_idx.len() {
            return Err(FmError::InvalidPattern("row_ptr does not span col_idx"));
        }
        if row_ptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(FmError::InvalidPattern("row_ptr must be ascending"));
        }

        let mut dia_ptr = Vec::with_capacity(n_points);
        for i in 0..n_points {
            let row = &col_idx[row_ptr[i]..row_ptr[i + 1]];
            if row.iter().any(|&j| j >= n_points) {
                return Err(FmError::InvalidPattern("column index out of range"));
            }
            for (a, &ja) in row.iter().enumerate() {
                if row[a + 1..].contains(&ja) {
                    return Err(FmError::InvalidPattern("duplicate column within a row"));
                }
            }
            match row.iter().position(|&j| j == i) {
                Some(p) => dia_ptr.push(row_ptr[i] + p),
                None => return Err(FmError::InvalidPattern("row is missing its diagonal entry")),
            }
        }

        Ok(Self { n_points, n_point_domain, row_ptr, col_idx, dia_ptr })
    }

    /// Build a pattern from a node adjacency list (diagonal added per row).
    ///
    /// Convenience for the mesh side and for tests; each row holds the node
    /// itself plus its neighbors, sorted.
    pub fn from_adjacency(
        n_point_domain: usize,
        neighbors: &[Vec<usize>],
    ) -> Result<Arc<Self>, FmError> {
        let n = neighbors.len();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::new();
        row_ptr.push(0);
        for (i, nbrs) in neighbors.iter().enumerate() {
            let mut row: Vec<usize> = nbrs.clone();
            row.push(i);
            row.sort_unstable();
            row.dedup();
            col_idx.extend_from_slice(&row);
            row_ptr.push(col_idx.len());
        }
        Ok(Arc::new(Self::new_checked(n_point_domain, row_ptr, col_idx)?))
    }

    pub fn n_points(&self) -> usize {
        self.n_points
    }

    pub fn n_point_domain(&self) -> usize {
        self.n_point_domain
    }

    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// Index span of row `i` into `col_idx` and the block value array.
    pub fn row_span(&self, i: usize) -> std::ops::Range<usize> {
        self.row_ptr[i]..self.row_ptr[i + 1]
    }

    /// Column indices of row `i`.
    pub fn cols(&self, i: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[i]..self.row_ptr[i + 1]]
    }

    /// Position of row `i`'s diagonal entry.
    pub fn dia(&self, i: usize) -> usize {
        self.dia_ptr[i]
    }

    /// Column stored at entry `index`.
    pub fn col_at(&self, index: usize) -> usize {
        self.col_idx[index]
    }

    /// Position of entry `(i, j)`, or `None` if absent from the pattern.
    pub fn index_of(&self, i: usize, j: usize) -> Option<usize> {
        self.row_span(i).find(|&k| self.col_idx[k] == j)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_diagonal() {
        // Row 1 has no entry with column 1.
        let err = SparsityPattern::new_checked(2, vec![0, 1, 2], vec![0, 0]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_duplicate_column() {
        let err = SparsityPattern::new_checked(1, vec![0, 2], vec![0, 0]);
        assert!(err.is_err());
    }

    #[test]
    fn lookup_matches_row_span() {
        let p = SparsityPattern::from_adjacency(3, &[vec![1], vec![0, 2], vec![1]]).unwrap();
        assert_eq!(p.nnz(), 7);
        for i in 0..3 {
            for j in 0..3 {
                let present = p.cols(i).contains(&j);
                assert_eq!(p.index_of(i, j).is_some(), present);
            }
        }
        assert_eq!(p.col_at(p.dia(1)), 1);
    }
}
