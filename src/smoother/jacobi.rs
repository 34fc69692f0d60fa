//! Jacobi smoother (§4.4): `x <- x + D^-1 (b - A x)`.

use crate::error::{Result, SolverError};
use crate::matrix::Csr;
use crate::types::Precision;

/// Pre-inverted diagonal for the Jacobi smoother, computed once at setup.
#[derive(Debug, Clone)]
pub struct JacobiSetup {
    inv_diag: Vec<Precision>,
}

impl JacobiSetup {
    /// Invert the diagonal of `a`, failing if any diagonal entry is singular.
    pub fn new(a: &Csr) -> Result<Self> {
        let diag = a.diagonal();
        let mut inv_diag = Vec::with_capacity(diag.len());
        for (i, &d) in diag.iter().enumerate() {
            if d.abs() < crate::types::SMALLREAL {
                return Err(SolverError::AlgorithmError {
                    component: "jacobi setup".to_string(),
                    message: format!("singular diagonal at row {i}"),
                });
            }
            inv_diag.push(1.0 / d);
        }
        Ok(Self { inv_diag })
    }

    /// Apply `sweeps` Jacobi relaxations to `a x = b`, updating `x` in place.
    pub fn apply(&self, a: &Csr, b: &[Precision], x: &mut [Precision], sweeps: usize) -> Result<()> {
        let n = a.row;
        let mut r = vec![0.0; n];
        for _ in 0..sweeps {
            r.copy_from_slice(b);
            a.spmv(-1.0, x, &mut r)?;
            for i in 0..n {
                x[i] += self.inv_diag[i] * r[i];
            }
        }
        Ok(())
    }
}
