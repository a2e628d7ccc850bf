//! Distributed block vector.

use std::ops::{Index, IndexMut};

use num_traits::Float;

use crate::error::FmError;

/// A vector of `n_points * nvar` scalars, split between locally owned nodes
/// (`0..n_point_domain`) and halo nodes cached from neighboring partitions
/// (`n_point_domain..n_points`).
#[derive(Debug, Clone)]
pub struct BlockVector<T> {
    nvar: usize,
    n_points: usize,
    n_point_domain: usize,
    data: Vec<T>,
}

impl<T: Float> BlockVector<T> {
    pub fn new(n_points: usize, n_point_domain: usize, nvar: usize) -> Self {
        Self { nvar, n_points, n_point_domain, data: vec![T::zero(); n_points * nvar] }
    }

    /// Wrap existing scalar data; length must match the layout.
    pub fn from_slice(
        n_points: usize,
        n_point_domain: usize,
        nvar: usize,
        data: &[T],
    ) -> Result<Self, FmError> {
        if data.len() != n_points * nvar {
            return Err(FmError::DimensionMismatch {
                expected: n_points * nvar,
                found: data.len(),
            });
        }
        Ok(Self { nvar, n_points, n_point_domain, data: data.to_vec() })
    }

    pub fn nvar(&self) -> usize {
        self.nvar
    }

    pub fn n_points(&self) -> usize {
        self.n_points
    }

    pub fn n_point_domain(&self) -> usize {
        self.n_point_domain
    }

    /// Number of scalars in the owned range.
    pub fn owned_len(&self) -> usize {
        self.n_point_domain * self.nvar
    }

    pub fn block(&self, i: usize) -> &[T] {
        &self.data[i * self.nvar..(i + 1) * self.nvar]
    }

    pub fn block_mut(&mut self, i: usize) -> &mut [T] {
        &mut self.data[i * self.nvar..(i + 1) * self.nvar]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn set_zero(&mut self) {
        self.data.iter_mut().for_each(|v| *v = T::zero());
    }
}

impl<T> Index<usize> for BlockVector<T> {
    type Output = T;
    fn index(&self, i: usize) -> &T {
        &self.data[i]
    }
}

impl<T> IndexMut<usize> for BlockVector<T> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.data[i]
    }
}
