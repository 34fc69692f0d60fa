//! Preconditioned Generalized Conjugate Gradient (§4.5), grounded in
//! `fasp_solver_dcsr_pgcg`: a steepest-descent first step, then a growing
//! set of search directions `p_0, p_1, ...` kept A-orthogonal to every
//! earlier direction (Concus-Golub-O'Leary GCG), rather than the two-term
//! CG recurrence. Every direction generated is stored for the life of the
//! solve, so its memory cost grows with the iteration count the way the
//! source's preallocated `MaxIt * n` work buffer does.

use super::{is_stagnating, maxdiff, relative_residual, solution_collapsed, SafeNet, Preconditioner, SolverStats};
use crate::error::{Result, SolverError};
use crate::matrix::SparseOp;
use crate::params::ItsParam;
use crate::types::{Precision, SMALLREAL};
use crate::vecalg;

/// `u' * (A v)`, the A-inner-product used to orthogonalize GCG directions.
fn vmv(a: &dyn SparseOp, u: &[Precision], v: &[Precision], scratch: &mut [Precision]) -> Result<Precision> {
    vecalg::zero(scratch);
    a.spmv(1.0, v, scratch)?;
    vecalg::dot(u, scratch)
}

pub fn solve(
    a: &dyn SparseOp,
    b: &[Precision],
    x: &mut [Precision],
    m: &mut dyn Preconditioner,
    param: &ItsParam,
) -> Result<SolverStats> {
    let name = "gcg";
    let n = a.rows();
    let tol = param.tolerance;
    let md = maxdiff(tol);
    let b_norm = vecalg::norm2(b);
    let denom = b_norm.max(SMALLREAL);

    let mut r = b.to_vec();
    a.spmv(-1.0, x, &mut r)?;
    let absres0 = vecalg::norm2(&r);

    let mut net = SafeNet::new(x, absres0);
    let mut stagnation_restarts = 0usize;
    let false_convergence_restarts = 0usize;
    let mut scratch = vec![0.0; n];

    let mut relres = relative_residual(param.stopping_criterion, absres0, None, denom);
    if relres < tol {
        return Ok(SolverStats {
            iterations: 0,
            final_residual: relres,
            stagnation_restarts: 0,
            false_convergence_restarts: 0,
        });
    }

    // 1st iteration: steepest descent, p_0 = M^-1 r.
    let mut p: Vec<Vec<Precision>> = Vec::with_capacity(param.max_iterations + 1);
    let mut p0 = vec![0.0; n];
    m.apply(&r, &mut p0)?;
    let pap0 = vmv(a, &p0, &p0, &mut scratch)?;
    if pap0.abs() < SMALLREAL {
        net.finalize(x, absres0, md);
        return Err(SolverError::DivisionByZero {
            denom: pap0,
            iteration: 0,
            solver: name.to_string(),
        });
    }
    let alpha0 = vecalg::dot(&r, &p0)? / pap0;
    vecalg::axpy(alpha0, &p0, x)?;
    a.spmv(-alpha0, &p0, &mut r)?;
    p.push(p0);

    let mut absres = vecalg::norm2(&r);
    relres = relative_residual(param.stopping_criterion, absres, None, denom);
    net.maybe_update(x, absres, md);

    let mut iter = 1usize;
    while relres >= tol && iter < param.max_iterations {
        let mut br = vec![0.0; n];
        m.apply(&r, &mut br)?;

        let mut p_iter = br.clone();
        for pj in &p {
            let num = vmv(a, &br, pj, &mut scratch)?;
            let den = vmv(a, pj, pj, &mut scratch)?;
            if den.abs() < SMALLREAL {
                net.finalize(x, absres, md);
                return Err(SolverError::DivisionByZero {
                    denom: den,
                    iteration: iter,
                    solver: name.to_string(),
                });
            }
            let beta = -num / den;
            vecalg::axpy(beta, pj, &mut p_iter)?;
        }

        let pap = vmv(a, &p_iter, &p_iter, &mut scratch)?;
        if pap.abs() < SMALLREAL {
            net.finalize(x, absres, md);
            return Err(SolverError::DivisionByZero {
                denom: pap,
                iteration: iter,
                solver: name.to_string(),
            });
        }
        let alpha = vecalg::dot(&r, &p_iter)? / pap;

        let update_norm = (alpha * vecalg::norm2(&p_iter)).abs();
        vecalg::axpy(alpha, &p_iter, x)?;
        a.spmv(-alpha, &p_iter, &mut r)?;
        let x_norm = vecalg::norm2(x).max(SMALLREAL);

        p.push(p_iter);

        if x.iter().any(|v| v.is_nan()) {
            net.finalize(x, Precision::MAX, md);
            return Err(SolverError::DivisionByZero {
                denom: Precision::NAN,
                iteration: iter,
                solver: name.to_string(),
            });
        }

        absres = vecalg::norm2(&r);
        relres = relative_residual(param.stopping_criterion, absres, None, denom);
        net.maybe_update(x, absres, md);

        if solution_collapsed(x) {
            net.finalize(x, absres, md);
            return Err(SolverError::SolutionStagnation {
                iteration: iter,
                norm: vecalg::norm_inf(x),
                solver: name.to_string(),
            });
        }

        if relres >= tol && is_stagnating(update_norm, x_norm, tol) {
            stagnation_restarts += 1;
            net.stag_count = stagnation_restarts;
            if stagnation_restarts > super::max_stag() {
                net.finalize(x, absres, md);
                return Err(SolverError::Stagnation {
                    stag_count: stagnation_restarts,
                    iteration: iter,
                    solver: name.to_string(),
                });
            }
        }

        iter += 1;
    }

    net.finalize(x, absres, md);

    if relres >= tol {
        return Err(SolverError::MaxIterations {
            iterations: iter,
            residual: relres,
            solver: name.to_string(),
        });
    }

    Ok(SolverStats {
        iterations: iter,
        final_residual: relres,
        stagnation_restarts,
        false_convergence_restarts,
    })
}
