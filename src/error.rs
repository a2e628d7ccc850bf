//! Error types for matrix assembly, preconditioning, and exchange.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FmError {
    /// `initialize` was called on an already-initialized matrix.
    #[error("matrix storage already initialized")]
    DoubleInit,

    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The injected sparsity pattern failed validation.
    #[error("invalid sparsity pattern: {0}")]
    InvalidPattern(&'static str),

    /// `apply` was called before a successful `build`.
    #[error("preconditioner applied before build")]
    NotBuilt,

    /// Direct factorization requested without the `direct` feature.
    #[error("direct solver support not compiled in")]
    DirectUnavailable,

    /// A halo message did not match the exchange plan.
    #[error("halo message inconsistent with the exchange plan")]
    PlanMismatch,
}
