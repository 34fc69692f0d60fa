//! Preconditioned Conjugate Gradient (§4.5). Requires `A` and `M`
//! symmetric positive definite (documented, not runtime-checked beyond the
//! ordinary `DivisionByZero`/NaN guards the safe net already performs).

use super::{is_stagnating, maxdiff, relative_residual, solution_collapsed, SafeNet, Preconditioner, SolverStats};
use crate::error::{Result, SolverError};
use crate::matrix::SparseOp;
use crate::params::ItsParam;
use crate::types::{Precision, SMALLREAL};
use crate::vecalg;

pub fn solve(
    a: &dyn SparseOp,
    b: &[Precision],
    x: &mut [Precision],
    m: &mut dyn Preconditioner,
    param: &ItsParam,
) -> Result<SolverStats> {
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

    let mut z = vec![0.0; n];
    m.apply(&r, &mut z)?;
    let mut p = z.clone();
    let mut rz = vecalg::dot(&r, &z)?;

    let mut relres = relative_residual(param.stopping_criterion, absres0, Some(rz), denom);
    let mut iter = 0usize;
    let mut absres = absres0;

    if relres >= tol {
        let mut ap = vec![0.0; n];
        while iter < param.max_iterations {
            iter += 1;
            vecalg::zero(&mut ap);
            a.spmv(1.0, &p, &mut ap)?;
            let pap = vecalg::dot(&p, &ap)?;
            if pap.abs() < SMALLREAL {
                net.finalize(x, absres, md);
                return Err(SolverError::DivisionByZero {
                    denom: pap,
                    iteration: iter,
                    solver: "cg".to_string(),
                });
            }
            let alpha = rz / pap;

            vecalg::axpy(alpha, &p, x)?;
            vecalg::axpy(-alpha, &ap, &mut r)?;

            let update_norm = (alpha * vecalg::norm2(&p)).abs();
            let x_norm = vecalg::norm2(x);

            if x.iter().any(|v| v.is_nan()) {
                net.finalize(x, Precision::MAX, md);
                return Err(SolverError::DivisionByZero {
                    denom: Precision::NAN,
                    iteration: iter,
                    solver: "cg".to_string(),
                });
            }

            m.apply(&r, &mut z)?;
            let rz_new = vecalg::dot(&r, &z)?;
            absres = vecalg::norm2(&r);
            relres = relative_residual(param.stopping_criterion, absres, Some(rz_new), denom);

            net.maybe_update(x, absres, md);

            if solution_collapsed(x) {
                net.finalize(x, absres, md);
                return Err(SolverError::SolutionStagnation {
                    iteration: iter,
                    norm: vecalg::norm_inf(x),
                    solver: "cg".to_string(),
                });
            }

            if relres < tol {
                break;
            }

            if is_stagnating(update_norm, x_norm, tol) {
                stagnation_restarts += 1;
                net.stag_count = stagnation_restarts;
                let mut r_true = b.to_vec();
                a.spmv(-1.0, x, &mut r_true)?;
                let absres_true = vecalg::norm2(&r_true);
                let relres_true = relative_residual(param.stopping_criterion, absres_true, None, denom);
                if relres_true < tol {
                    absres = absres_true;
                    relres = relres_true;
                    break;
                }
                if stagnation_restarts > super::max_stag() {
                    net.finalize(x, absres, md);
                    return Err(SolverError::Stagnation {
                        stag_count: stagnation_restarts,
                        iteration: iter,
                        solver: "cg".to_string(),
                    });
                }
                r = r_true;
                m.apply(&r, &mut z)?;
                p = z.clone();
                rz = vecalg::dot(&r, &z)?;
                continue;
            }

            let beta = rz_new / rz.max(SMALLREAL);
            vecalg::axpby(1.0, &z, beta, &mut p)?;
            rz = rz_new;
        }
    }

    net.finalize(x, absres, md);

    if relres >= tol {
        return Err(SolverError::MaxIterations {
            iterations: iter,
            residual: relres,
            solver: "cg".to_string(),
        });
    }

    Ok(SolverStats {
        iterations: iter,
        final_residual: relres,
        stagnation_restarts,
        false_convergence_restarts,
    })
}
