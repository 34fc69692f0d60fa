//! Preconditioned Krylov solver family (C5, §4.5).
//!
//! Every solver shares one outer contract: on return, the caller's `x`
//! slice holds the best iterate found (the safe net always writes that
//! back before returning, success or failure), and `Result<SolverStats>`
//! reports whether the run actually converged. This keeps the
//! "salvaged solution is always usable as a restart point" propagation
//! policy structural rather than relying on callers to unpack a bespoke
//! success/failure wrapper.

pub mod bicgstab;
pub mod cg;
pub mod gcg;
pub mod gmres;

use crate::error::Result;
use crate::matrix::SparseOp;
use crate::params::{ItsParam, SolverKind};
use crate::types::{Precision, StoppingCriterion, MAX_RESTART, MAX_STAG, SMALLREAL, STAG_RATIO};
use crate::vecalg;

/// A (possibly nonlinear) preconditioner: `z <- M^-1 r`.
///
/// `&mut self` lets preconditioners carry internal scratch state across
/// calls (an AMG cycle reusing its hierarchy's working vectors, §4.7) or
/// vary their action between calls (a flexible/nonlinear preconditioner,
/// tolerated by the `Variable*` solver variants).
pub trait Preconditioner {
    /// Apply the preconditioner action to `r`, writing the result into `z`.
    fn apply(&mut self, r: &[Precision], z: &mut [Precision]) -> Result<()>;
}

/// `M = I`: no preconditioning.
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn apply(&mut self, r: &[Precision], z: &mut [Precision]) -> Result<()> {
        vecalg::copy(r, z)
    }
}

/// Outcome of a converged or exhausted Krylov solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverStats {
    /// Number of outer iterations performed.
    pub iterations: usize,
    /// Final relative residual under the configured stopping criterion.
    pub final_residual: Precision,
    /// Number of stagnation-triggered restarts taken.
    pub stagnation_restarts: usize,
    /// Number of false-convergence restarts taken.
    pub false_convergence_restarts: usize,
}

/// Dispatch to the solver named by `param.solver`.
pub fn solve(
    a: &dyn SparseOp,
    b: &[Precision],
    x: &mut [Precision],
    m: &mut dyn Preconditioner,
    param: &ItsParam,
) -> Result<SolverStats> {
    match param.solver {
        SolverKind::Cg => cg::solve(a, b, x, m, param),
        SolverKind::BiCgStab => bicgstab::solve(a, b, x, m, param, false),
        SolverKind::VariableBiCgStab => bicgstab::solve(a, b, x, m, param, true),
        SolverKind::Gmres => gmres::solve(a, b, x, m, param, false),
        SolverKind::VariableGmres => gmres::solve(a, b, x, m, param, true),
        SolverKind::Gcg => gcg::solve(a, b, x, m, param),
    }
}

/// Tracks the best iterate seen so far and the safe-net restart counters
/// shared by every solver's outer loop (§4.5's state-machine fields).
pub(crate) struct SafeNet {
    pub x_best: Vec<Precision>,
    pub absres_best: Precision,
    pub stag_count: usize,
    pub restart_count: usize,
}

impl SafeNet {
    pub fn new(x0: &[Precision], absres0: Precision) -> Self {
        Self {
            x_best: x0.to_vec(),
            absres_best: absres0,
            stag_count: 0,
            restart_count: 0,
        }
    }

    /// Save `x` as the new best iterate if `absres` improves on the
    /// current best by more than `maxdiff`.
    pub fn maybe_update(&mut self, x: &[Precision], absres: Precision, maxdiff: Precision) {
        if absres < self.absres_best - maxdiff {
            self.absres_best = absres;
            self.x_best.copy_from_slice(x);
        }
    }

    /// On exit, restore the best iterate into `x` if the final residual is
    /// worse than the best by more than `maxdiff` (§4.5 exit rule).
    pub fn finalize(&self, x: &mut [Precision], final_absres: Precision, maxdiff: Precision) {
        if final_absres > self.absres_best + maxdiff {
            x.copy_from_slice(&self.x_best);
        }
    }
}

pub(crate) fn maxdiff(tol: Precision) -> Precision {
    tol * STAG_RATIO
}

/// `tol * STAG_RATIO` threshold for relative-update stagnation detection.
pub(crate) fn is_stagnating(update_norm: Precision, x_norm: Precision, tol: Precision) -> bool {
    x_norm > SMALLREAL && update_norm / x_norm < tol * STAG_RATIO
}

/// Relative residual under the chosen stopping criterion (§4.5).
pub(crate) fn relative_residual(
    sc: StoppingCriterion,
    absres: Precision,
    precond_inner: Option<Precision>,
    denom: Precision,
) -> Precision {
    let denom = denom.max(SMALLREAL);
    match sc {
        StoppingCriterion::RelRes | StoppingCriterion::ModRelRes => absres / denom,
        StoppingCriterion::RelPrecRes => precond_inner.unwrap_or(absres).max(0.0).sqrt() / denom,
    }
}

pub(crate) fn solution_collapsed(x: &[Precision]) -> bool {
    vecalg::norm_inf(x) < SMALLREAL
}

pub(crate) const fn max_stag() -> usize {
    MAX_STAG
}

pub(crate) const fn max_restart() -> usize {
    MAX_RESTART
}
