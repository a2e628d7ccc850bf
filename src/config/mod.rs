//! Configuration for matrix storage and preconditioner selection.

pub mod options;

pub use options::{BoundaryKind, LineletOptions, PrecondKind, SolverOptions};
