//! ILU(0) smoother (§4.4): no-fill incomplete LU factorization on the
//! existing sparsity pattern, applied via triangular forward/backward
//! substitution. `ILU(k)` for `k > 0` is not supported; requesting it
//! degrades to `ILU(0)` with a logged warning (an explicit scope
//! narrowing, not a silent one).

use crate::block;
use crate::error::{Result, SolverError};
use crate::matrix::{Bsr, Csr};
use crate::types::Precision;

/// No-fill incomplete LU factorization of a CSR matrix, stored in place
/// over the original sparsity pattern: strictly-lower entries become `L`
/// multipliers, the diagonal and strictly-upper entries become `U`.
#[derive(Debug, Clone)]
pub struct IluSetup {
    factored: Csr,
}

impl IluSetup {
    /// Factor `a` at level `requested_level`. Only level 0 is implemented;
    /// higher levels degrade to level 0 with a warning.
    pub fn new(a: &Csr, requested_level: usize) -> Result<Self> {
        if requested_level > 0 {
            log::warn!(
                "ilu: level {requested_level} requested but only ILU(0) is implemented; degrading to ILU(0)"
            );
        }
        let mut f = a.clone();
        f.sort_rows();

        for i in 0..f.row {
            let row_start = f.ia[i] as usize;
            let row_end = f.ia[i + 1] as usize;
            for k in row_start..row_end {
                let col_k = f.ja[k] as usize;
                if col_k >= i {
                    break;
                }
                let diag_k = f.diag_index(col_k).ok_or_else(|| SolverError::AlgorithmError {
                    component: "ilu setup".to_string(),
                    message: format!("row {col_k} has no diagonal entry"),
                })?;
                let pivot = f.val[diag_k];
                if pivot.abs() < crate::types::SMALLREAL {
                    return Err(SolverError::AlgorithmError {
                        component: "ilu setup".to_string(),
                        message: format!("zero pivot factoring row {col_k}"),
                    });
                }
                let multiplier = f.val[k] / pivot;
                f.val[k] = multiplier;

                let k_start = f.ia[col_k] as usize;
                let k_end = f.ia[col_k + 1] as usize;
                for kk in k_start..k_end {
                    let col_kk = f.ja[kk] as usize;
                    if col_kk <= col_k {
                        continue;
                    }
                    if let Some(pos) = (row_start..row_end).find(|&p| f.ja[p] as usize == col_kk) {
                        f.val[pos] -= multiplier * f.val[kk];
                    }
                }
            }
        }

        Ok(Self { factored: f })
    }

    /// Solve `(L U) x = b` via forward then backward substitution, writing
    /// the result into `x`.
    pub fn apply(&self, b: &[Precision], x: &mut [Precision]) -> Result<()> {
        let f = &self.factored;
        let n = f.row;
        let mut y = vec![0.0; n];
        for i in 0..n {
            let start = f.ia[i] as usize;
            let end = f.ia[i + 1] as usize;
            let mut acc = b[i];
            for k in start..end {
                let j = f.ja[k] as usize;
                if j < i {
                    acc -= f.val[k] * y[j];
                } else {
                    break;
                }
            }
            y[i] = acc;
        }
        for i in (0..n).rev() {
            let start = f.ia[i] as usize;
            let end = f.ia[i + 1] as usize;
            let mut acc = y[i];
            let mut diag = 0.0;
            for k in start..end {
                let j = f.ja[k] as usize;
                if j == i {
                    diag = f.val[k];
                } else if j > i {
                    acc -= f.val[k] * x[j];
                }
            }
            if diag.abs() < crate::types::SMALLREAL {
                return Err(SolverError::DivisionByZero {
                    denom: diag,
                    iteration: i,
                    solver: "ilu backsolve".to_string(),
                });
            }
            x[i] = acc / diag;
        }
        Ok(())
    }
}

/// Block-triangular ILU(0) on a BSR matrix: the scalar recurrence above,
/// generalized so each multiplier and update is an `nb x nb` dense block
/// operation dispatched to the C1 kernels.
#[derive(Debug, Clone)]
pub struct BsrIluSetup {
    factored: Bsr,
}

impl BsrIluSetup {
    /// Factor `a` at block level `requested_level` (only level 0 supported).
    pub fn new(a: &Bsr, requested_level: usize) -> Result<Self> {
        if requested_level > 0 {
            log::warn!(
                "ilu: level {requested_level} requested but only block ILU(0) is implemented; degrading to ILU(0)"
            );
        }
        let nb = a.nb;
        let ia = a.ia.clone();
        let ja = a.ja.clone();
        let mut val = a.val.clone();
        let row = a.row;

        let block_at = |ia: &[crate::types::Index], ja: &[crate::types::Index], r: usize, c: usize| -> Option<usize> {
            let start = ia[r] as usize;
            let end = ia[r + 1] as usize;
            (start..end).find(|&p| ja[p] as usize == c)
        };

        for i in 0..row {
            let row_start = ia[i] as usize;
            let row_end = ia[i + 1] as usize;
            for k in row_start..row_end {
                let col_k = ja[k] as usize;
                if col_k >= i {
                    break;
                }
                let diag_pos = block_at(&ia, &ja, col_k, col_k).ok_or_else(|| SolverError::AlgorithmError {
                    component: "bsr ilu setup".to_string(),
                    message: format!("block row {col_k} has no diagonal block"),
                })?;
                let mut diag_inv = val[diag_pos * nb * nb..(diag_pos + 1) * nb * nb].to_vec();
                block::invert(nb, &mut diag_inv)?;

                let a_ik = val[k * nb * nb..(k + 1) * nb * nb].to_vec();
                let mut multiplier = vec![0.0; nb * nb];
                block::matmul(nb, &a_ik, &diag_inv, &mut multiplier);
                val[k * nb * nb..(k + 1) * nb * nb].copy_from_slice(&multiplier);

                let k_start = ia[col_k] as usize;
                let k_end = ia[col_k + 1] as usize;
                for kk in k_start..k_end {
                    let col_kk = ja[kk] as usize;
                    if col_kk <= col_k {
                        continue;
                    }
                    if let Some(pos) = (row_start..row_end).find(|&p| ja[p] as usize == col_kk) {
                        let a_k_j = val[kk * nb * nb..(kk + 1) * nb * nb].to_vec();
                        let mut update = vec![0.0; nb * nb];
                        block::matmul(nb, &multiplier, &a_k_j, &mut update);
                        for (dst, u) in val[pos * nb * nb..(pos + 1) * nb * nb].iter_mut().zip(update.iter()) {
                            *dst -= u;
                        }
                    }
                }
            }
        }

        let factored = Bsr {
            row: a.row,
            col: a.col,
            nb,
            storage_manner: crate::matrix::StorageManner::RowMajor,
            ia,
            ja,
            val,
        };
        Ok(Self { factored })
    }

    /// Solve the block-triangular system via forward/backward substitution.
    pub fn apply(&self, b: &[Precision], x: &mut [Precision]) -> Result<()> {
        let f = &self.factored;
        let nb = f.nb;
        let n = f.row;
        let mut y = vec![0.0; n * nb];
        for i in 0..n {
            let start = f.ia[i] as usize;
            let end = f.ia[i + 1] as usize;
            let mut acc = b[i * nb..i * nb + nb].to_vec();
            for k in start..end {
                let j = f.ja[k] as usize;
                if j < i {
                    let blk = &f.val[k * nb * nb..(k + 1) * nb * nb];
                    block::matvec_sub(nb, blk, &y[j * nb..j * nb + nb], &mut acc);
                } else {
                    break;
                }
            }
            y[i * nb..i * nb + nb].copy_from_slice(&acc);
        }
        for i in (0..n).rev() {
            let start = f.ia[i] as usize;
            let end = f.ia[i + 1] as usize;
            let mut acc = y[i * nb..i * nb + nb].to_vec();
            let mut diag_blk = None;
            for k in start..end {
                let j = f.ja[k] as usize;
                if j == i {
                    diag_blk = Some(f.val[k * nb * nb..(k + 1) * nb * nb].to_vec());
                } else if j > i {
                    let blk = &f.val[k * nb * nb..(k + 1) * nb * nb];
                    block::matvec_sub(nb, blk, &x[j * nb..j * nb + nb], &mut acc);
                }
            }
            let mut diag_inv = diag_blk.ok_or_else(|| SolverError::AlgorithmError {
                component: "bsr ilu backsolve".to_string(),
                message: format!("block row {i} has no diagonal block"),
            })?;
            block::invert(nb, &mut diag_inv)?;
            let mut sol = vec![0.0; nb];
            block::matvec(nb, &diag_inv, &acc, &mut sol);
            x[i * nb..i * nb + nb].copy_from_slice(&sol);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Coo;

    fn laplacian(n: usize) -> Csr {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 2.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                t.push((i, i + 1, -1.0));
            }
        }
        Coo::from_triplets(n, n, t).to_csr().unwrap()
    }

    #[test]
    fn ilu0_solves_tridiagonal_exactly() {
        let a = laplacian(10);
        let setup = IluSetup::new(&a, 0).unwrap();
        let x_true = vec![1.0; 10];
        let mut b = vec![0.0; 10];
        a.spmv(1.0, &x_true, &mut b).unwrap();
        let mut x = vec![0.0; 10];
        setup.apply(&b, &mut x).unwrap();
        for (got, want) in x.iter().zip(x_true.iter()) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn degrades_requested_level_without_error() {
        let a = laplacian(6);
        assert!(IluSetup::new(&a, 2).is_ok());
    }

    #[test]
    fn bsr_ilu0_solves_block_system_exactly() {
        let csr = laplacian(8);
        let bsr = Bsr::from_csr(&csr, 2).unwrap();
        let setup = BsrIluSetup::new(&bsr, 0).unwrap();
        let x_true = vec![1.0; 8];
        let mut b = vec![0.0; 8];
        bsr.spmv(1.0, &x_true, &mut b).unwrap();
        let mut x = vec![0.0; 8];
        setup.apply(&b, &mut x).unwrap();
        for (got, want) in x.iter().zip(x_true.iter()) {
            assert!((got - want).abs() < 1e-8);
        }
    }
}
