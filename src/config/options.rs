//! Options injected by the solver configuration layer.
//!
//! The preconditioner kind is a closed set fixed per solver configuration;
//! switching kinds at runtime is unsupported (it would require a full
//! rebuild, which is legal but never done automatically).

/// Preconditioner selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecondKind {
    /// Per-node inverse of the diagonal block.
    Jacobi,
    /// Incomplete block LU factorization on a possibly-extended pattern.
    Ilu,
    /// Symmetric Gauss-Seidel sweeps on the live matrix.
    Sgs,
    /// Anisotropy-following line solves with Jacobi fallback.
    Linelet,
    /// Exact factorization through the direct-solver adapter.
    Direct,
}

/// Boundary condition kinds, used to select the markers that seed linelets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    HeatFlux,
    Isothermal,
    EulerWall,
    Displacement,
    Farfield,
    Symmetry,
}

/// Tuning knobs for linelet construction.
///
/// `alpha` and `isotropy_limit` are heuristics carried over from production
/// runs; there is no documented derivation for either value.
#[derive(Debug, Clone)]
pub struct LineletOptions {
    /// A neighbor extends a line when its edge weight exceeds `alpha` times
    /// the strongest eligible edge at the current endpoint.
    pub alpha: f64,
    /// More than this many qualifying neighbors means the line has reached
    /// an isotropic zone and stops growing.
    pub isotropy_limit: usize,
    /// Boundary kinds whose marker points seed lines.
    pub seed_kinds: Vec<BoundaryKind>,
}

impl Default for LineletOptions {
    fn default() -> Self {
        Self {
            alpha: 0.9,
            isotropy_limit: 1,
            seed_kinds: vec![
                BoundaryKind::HeatFlux,
                BoundaryKind::Isothermal,
                BoundaryKind::EulerWall,
                BoundaryKind::Displacement,
            ],
        }
    }
}

/// Linear-solver options relevant to this subsystem.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Which preconditioner the matrix will be asked to build.
    pub precond: PrecondKind,
    /// ILU fill level `n >= 0`; 0 reuses the primary nonzero structure.
    pub ilu_fill: usize,
    /// Linelet construction parameters.
    pub linelet: LineletOptions,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            precond: PrecondKind::Ilu,
            ilu_fill: 0,
            linelet: LineletOptions::default(),
        }
    }
}
