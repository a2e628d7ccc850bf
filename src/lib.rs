//! flowmat: block-sparse linear algebra for distributed flow solvers
//!
//! This crate provides the block-compressed-sparse-row (BCSR) matrix, its
//! matrix-vector products, and the preconditioner family (Jacobi, ILU(n),
//! symmetric Gauss-Seidel, linelet, direct factorization) used by implicit
//! unstructured-mesh CFD solvers, together with the point-to-point halo
//! exchange that keeps distributed vectors consistent across partitions.

pub mod parallel;

pub mod config;
pub mod dense;
pub mod error;
pub mod matrix;
pub mod mesh;
pub mod pattern;
pub mod precond;
pub mod vector;

// Re-exports for convenience
pub use config::*;
pub use dense::*;
pub use error::*;
pub use matrix::*;
pub use mesh::*;
pub use parallel::*;
pub use pattern::*;
pub use precond::*;
pub use vector::*;
