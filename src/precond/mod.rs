//! Preconditioner family for the block-sparse matrix.
//!
//! Every preconditioner splits its work into a `build` phase, run once per
//! matrix assembly, and an `apply` phase, run once per Krylov iteration.
//! `apply` computes `y = M^{-1} x` and ends with a forward halo exchange so
//! the result is consistent across partitions. Building against one matrix
//! and applying with another of the same structure is legal; the apply uses
//! whatever was captured at build time plus whatever it reads live.

use std::sync::Arc;

use num_traits::Float;

use crate::config::{PrecondKind, SolverOptions};
use crate::error::FmError;
use crate::matrix::BlockMatrix;
use crate::mesh::MeshGraph;
use crate::parallel::HaloExchange;
use crate::pattern::SparsityPattern;
use crate::vector::BlockVector;

pub mod direct;
pub mod ilu;
pub mod jacobi;
pub mod linelet;
pub mod sgs;

pub use direct::DirectPrecond;
pub use ilu::BlockIlu;
pub use jacobi::BlockJacobi;
pub use linelet::{LineletPrecond, LineletStats};
pub use sgs::{SweepSet, SymGaussSeidel};

/// Two-phase preconditioner contract.
pub trait Precond<T> {
    /// Capture whatever the apply phase needs from the assembled matrix.
    /// Called again after every reassembly.
    fn build(&mut self, a: &BlockMatrix<T>) -> Result<(), FmError>;

    /// y = M^{-1} x, halo-consistent on return.
    fn apply(
        &mut self,
        a: &BlockMatrix<T>,
        x: &BlockVector<T>,
        y: &mut BlockVector<T>,
        ex: &mut dyn HaloExchange<T>,
    ) -> Result<(), FmError>;
}

/// Closed set of preconditioners selectable from the solver configuration.
pub enum Pc<T> {
    Jacobi(BlockJacobi<T>),
    Ilu(BlockIlu<T>),
    Sgs(SymGaussSeidel<T>),
    Linelet(LineletPrecond<T>),
    Direct(DirectPrecond<T>),
}

impl<T: Float> Pc<T> {
    /// Instantiate from solver options. `extended` is the ILU fill-in
    /// pattern; pass `None` to factor on the primary pattern (fill 0).
    pub fn from_options(
        opts: &SolverOptions,
        primary: &Arc<SparsityPattern>,
        extended: Option<Arc<SparsityPattern>>,
    ) -> Result<Self, FmError> {
        Ok(match opts.precond {
            PrecondKind::Jacobi => Pc::Jacobi(BlockJacobi::new()),
            PrecondKind::Ilu => {
                let pattern = extended.unwrap_or_else(|| Arc::clone(primary));
                Pc::Ilu(BlockIlu::new(pattern, opts.ilu_fill))
            }
            PrecondKind::Sgs => Pc::Sgs(SymGaussSeidel::new()),
            PrecondKind::Linelet => Pc::Linelet(LineletPrecond::new(opts.linelet.clone())),
            PrecondKind::Direct => {
                if !cfg!(feature = "direct") {
                    return Err(FmError::DirectUnavailable);
                }
                Pc::Direct(DirectPrecond::new())
            }
        })
    }

    /// Run the linelet structure pass; `None` for every other kind.
    pub fn build_linelet_structure(&mut self, mesh: &dyn MeshGraph) -> Option<LineletStats> {
        match self {
            Pc::Linelet(p) => Some(p.build_structure(mesh)),
            _ => None,
        }
    }
}

impl<T> Precond<T> for Pc<T>
where
    T: Float + faer::traits::ComplexField + faer::traits::RealField,
{
    fn build(&mut self, a: &BlockMatrix<T>) -> Result<(), FmError> {
        match self {
            Pc::Jacobi(p) => p.build(a),
            Pc::Ilu(p) => p.build(a),
            Pc::Sgs(p) => p.build(a),
            Pc::Linelet(p) => p.build(a),
            Pc::Direct(p) => p.build(a),
        }
    }

    fn apply(
        &mut self,
        a: &BlockMatrix<T>,
        x: &BlockVector<T>,
        y: &mut BlockVector<T>,
        ex: &mut dyn HaloExchange<T>,
    ) -> Result<(), FmError> {
        match self {
            Pc::Jacobi(p) => p.apply(a, x, y, ex),
            Pc::Ilu(p) => p.apply(a, x, y, ex),
            Pc::Sgs(p) => p.apply(a, x, y, ex),
            Pc::Linelet(p) => p.apply(a, x, y, ex),
            Pc::Direct(p) => p.apply(a, x, y, ex),
        }
    }
}
