//! Linelet preconditioner for anisotropic meshes.
//!
//! Boundary-layer meshes stack thin cells normal to walls; implicit
//! coupling along those stacks dominates the spectrum. The structure pass
//! walks the mesh graph from wall seeds, following the strongest edge as
//! long as it stays dominant, and records each walk as a line. The apply
//! pass solves the block-tridiagonal system restricted to each line with
//! the Thomas algorithm and falls back to block Jacobi everywhere else.
//!
//! Structure depends only on the mesh, so it is built once; the numeric
//! build refreshes the diagonal inverses every time the matrix changes.

use num_traits::Float;

use crate::config::LineletOptions;
use crate::dense::Accum;
use crate::error::FmError;
use crate::matrix::BlockMatrix;
use crate::mesh::MeshGraph;
use crate::parallel::{ExchangeMode, HaloExchange};
use crate::precond::Precond;
use crate::vector::BlockVector;

/// Summary of the structure pass, local to this partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineletStats {
    pub n_lines: usize,
    pub n_line_points: usize,
}

impl LineletStats {
    pub fn mean_points(&self) -> f64 {
        if self.n_lines == 0 {
            0.0
        } else {
            self.n_line_points as f64 / self.n_lines as f64
        }
    }
}

pub struct LineletPrecond<T> {
    opts: LineletOptions,
    lines: Vec<Vec<usize>>,
    in_line: Vec<bool>,
    structured: bool,
    /// Jacobi inverses for every owned node; line nodes reuse them as the
    /// pivot inverses of the Thomas forward sweep.
    inv_m: Vec<T>,
    line_diag: Vec<T>,
    line_rhs: Vec<T>,
    max_len: usize,
    nvar: usize,
    built: bool,
}

impl<T: Float> LineletPrecond<T> {
    pub fn new(opts: LineletOptions) -> Self {
        Self {
            opts,
            lines: Vec::new(),
            in_line: Vec::new(),
            structured: false,
            inv_m: Vec::new(),
            line_diag: Vec::new(),
            line_rhs: Vec::new(),
            max_len: 0,
            nvar: 0,
            built: false,
        }
    }

    pub fn lines(&self) -> &[Vec<usize>] {
        &self.lines
    }

    /// Walk the mesh once and record the lines. Seeds come from the marker
    /// kinds in the options; each line grows away from its seed while one
    /// neighbor edge clearly dominates the rest.
    pub fn build_structure(&mut self, mesh: &dyn MeshGraph) -> LineletStats {
        let npd = mesh.n_point_domain();
        self.lines.clear();
        self.in_line = vec![false; npd];

        for seed in mesh.seed_points(&self.opts.seed_kinds) {
            if seed >= npd || self.in_line[seed] {
                continue;
            }
            let mut line = vec![seed];
            self.in_line[seed] = true;
            let mut tip = seed;
            let mut prev = None;

            loop {
                let mut max_w = 0.0_f64;
                for &nb in mesh.neighbors(tip) {
                    if nb >= npd || self.in_line[nb] {
                        continue;
                    }
                    max_w = max_w.max(mesh.edge_weight(tip, nb));
                }
                if max_w <= 0.0 {
                    break;
                }

                // Count neighbors within alpha of the strongest edge; more
                // than the isotropy limit means the stack has opened up.
                let mut counter = 0usize;
                let mut next = tip;
                for &nb in mesh.neighbors(tip) {
                    if nb >= npd || self.in_line[nb] || Some(nb) == prev {
                        continue;
                    }
                    if mesh.edge_weight(tip, nb) > self.opts.alpha * max_w {
                        counter += 1;
                        next = nb;
                    }
                }
                if counter == 0 || counter > self.opts.isotropy_limit {
                    break;
                }

                self.in_line[next] = true;
                line.push(next);
                prev = Some(tip);
                tip = next;
            }

            // A one-point line is plain Jacobi; do not keep it.
            if line.len() > 1 {
                self.lines.push(line);
            } else {
                self.in_line[seed] = false;
            }
        }

        self.structured = true;
        self.built = false;
        LineletStats {
            n_lines: self.lines.len(),
            n_line_points: self.lines.iter().map(Vec::len).sum(),
        }
    }
}

impl<T: Float> Precond<T> for LineletPrecond<T> {
    fn build(&mut self, a: &BlockMatrix<T>) -> Result<(), FmError> {
        let nvar = a.nvar();
        if nvar != a.neqn() {
            return Err(FmError::DimensionMismatch { expected: nvar, found: a.neqn() });
        }
        let npd = a.n_point_domain();
        let bs = nvar * nvar;
        self.nvar = nvar;

        // Without a structure pass every node falls back to Jacobi.
        if !self.structured {
            self.lines.clear();
            self.in_line = vec![false; npd];
        }
        if self.in_line.len() != npd {
            return Err(FmError::DimensionMismatch { expected: npd, found: self.in_line.len() });
        }

        if self.inv_m.len() != npd * bs {
            self.inv_m = vec![T::zero(); npd * bs];
        }
        let mut diag = vec![T::zero(); bs];
        for i in 0..npd {
            diag.copy_from_slice(a.block_at(a.pattern().dia(i)));
            a.kernels().invert(nvar, &diag, &mut self.inv_m[i * bs..(i + 1) * bs]);
        }

        self.max_len = self.lines.iter().map(Vec::len).max().unwrap_or(0);
        if self.line_diag.len() != self.max_len * bs {
            self.line_diag = vec![T::zero(); self.max_len * bs];
        }
        if self.line_rhs.len() != self.max_len * nvar {
            self.line_rhs = vec![T::zero(); self.max_len * nvar];
        }

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

        // Jacobi on everything off the lines.
        for i in 0..npd {
            if self.in_line[i] {
                continue;
            }
            kernels.mat_vec(
                nvar,
                nvar,
                &self.inv_m[i * bs..(i + 1) * bs],
                x.block(i),
                y.block_mut(i),
                Accum::Overwrite,
            );
        }
        ex.exchange(y, ExchangeMode::Forward)?;

        let missing =
            FmError::InvalidPattern("linelet neighbors must be adjacent in the matrix pattern");

        let mut weight = vec![T::zero(); bs];
        let mut prod = vec![T::zero(); bs];
        let mut inv = vec![T::zero(); bs];
        let mut aux = vec![T::zero(); nvar];

        for line in &self.lines {
            let n = line.len();

            for (k, &p) in line.iter().enumerate() {
                self.line_rhs[k * nvar..(k + 1) * nvar].copy_from_slice(x.block(p));
            }
            self.line_diag[..bs].copy_from_slice(a.block_at(a.pattern().dia(line[0])));

            // Forward elimination: each step folds row k - 1 into row k and
            // leaves the pivot inverse in its slot for the back pass.
            for k in 1..n {
                let (pk, pk1) = (line[k], line[k - 1]);
                let lower = a.block(pk, pk1).ok_or(missing.clone())?;
                let upper = a.block(pk1, pk).ok_or(missing.clone())?;

                kernels.invert(nvar, &self.line_diag[(k - 1) * bs..k * bs], &mut inv);
                self.line_diag[(k - 1) * bs..k * bs].copy_from_slice(&inv);

                kernels.mat_mat(nvar, lower, &inv, &mut weight);
                kernels.mat_mat(nvar, &weight, upper, &mut prod);
                let dk = &mut self.line_diag[k * bs..(k + 1) * bs];
                dk.copy_from_slice(a.block_at(a.pattern().dia(pk)));
                for (d, &p) in dk.iter_mut().zip(&prod) {
                    *d = *d - p;
                }

                let (head, tail) = self.line_rhs.split_at_mut(k * nvar);
                kernels.mat_vec(
                    nvar,
                    nvar,
                    &weight,
                    &head[(k - 1) * nvar..k * nvar],
                    &mut tail[..nvar],
                    Accum::Sub,
                );
            }

            // Back substitution; the last pivot has not been inverted yet.
            let mut last = vec![T::zero(); bs];
            last.copy_from_slice(&self.line_diag[(n - 1) * bs..n * bs]);
            kernels.gauss_solve(nvar, &mut last, &mut self.line_rhs[(n - 1) * nvar..n * nvar]);

            for k in (1..n).rev() {
                let upper = a.block(line[k - 1], line[k]).ok_or(missing.clone())?;
                let (head, tail) = self.line_rhs.split_at_mut(k * nvar);
                aux.copy_from_slice(&head[(k - 1) * nvar..k * nvar]);
                kernels.mat_vec(nvar, nvar, upper, &tail[..nvar], &mut aux, Accum::Sub);
                kernels.mat_vec(
                    nvar,
                    nvar,
                    &self.line_diag[(k - 1) * bs..k * bs],
                    &aux,
                    &mut head[(k - 1) * nvar..k * nvar],
                    Accum::Overwrite,
                );
            }

            for (k, &p) in line.iter().enumerate() {
                y.block_mut(p).copy_from_slice(&self.line_rhs[k * nvar..(k + 1) * nvar]);
            }
        }

        ex.exchange(y, ExchangeMode::Forward)
    }
}
