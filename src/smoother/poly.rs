//! Polynomial smoother (§4.4): a fixed-degree Chebyshev-like polynomial
//! approximation to `A^-1` built from the inverse diagonal, applied as an
//! MG smoother. Grounded in the recurrence of `fasp_smoother_dcsr_poly` /
//! its `Rr` helper.

use crate::error::{Result, SolverError};
use crate::matrix::Csr;
use crate::types::Precision;

/// Setup for the polynomial smoother: inverse diagonal plus the five
/// recurrence coefficients derived from an estimate of the spectrum of
/// `D^-1 A`.
#[derive(Debug, Clone)]
pub struct PolySetup {
    inv_diag: Vec<Precision>,
    k: [Precision; 6],
    /// Polynomial degree.
    pub degree: usize,
}

impl PolySetup {
    /// Build the smoother for matrix `a` at polynomial degree `degree`.
    ///
    /// `mu0`/`mu1` bracket the spectrum of `D^-1 A` using the infinity norm
    /// of `D^-1 A` as an upper bound, exactly as the source does: `mu0 = 1 /
    /// ||D^-1 A||_inf`, `mu1 = 4 mu0`.
    pub fn new(a: &Csr, degree: usize) -> Result<Self> {
        if degree == 0 {
            return Err(SolverError::AlgorithmError {
                component: "poly smoother setup".to_string(),
                message: "polynomial degree must be at least 1".to_string(),
            });
        }
        let diag = a.diagonal();
        let mut inv_diag = Vec::with_capacity(diag.len());
        for (i, &d) in diag.iter().enumerate() {
            if d.abs() < crate::types::SMALLREAL {
                return Err(SolverError::AlgorithmError {
                    component: "poly smoother setup".to_string(),
                    message: format!("singular diagonal at row {i}"),
                });
            }
            inv_diag.push(1.0 / d);
        }

        let mut dinv_a_norm_inf: Precision = 0.0;
        for i in 0..a.row {
            let start = a.ia[i] as usize;
            let end = a.ia[i + 1] as usize;
            let row_sum: Precision = a.val[start..end].iter().map(|v| v.abs()).sum();
            dinv_a_norm_inf = dinv_a_norm_inf.max(inv_diag[i].abs() * row_sum);
        }
        if dinv_a_norm_inf < crate::types::SMALLREAL {
            return Err(SolverError::AlgorithmError {
                component: "poly smoother setup".to_string(),
                message: "D^-1 A has zero infinity norm".to_string(),
            });
        }

        let mu0 = 1.0 / dinv_a_norm_inf;
        let mu1 = 4.0 * mu0;
        let smu0 = mu0.sqrt();
        let smu1 = mu1.sqrt();

        let mut k = [0.0; 6];
        k[1] = (mu0 + mu1) / 2.0;
        k[2] = (smu0 + smu1) * (smu0 + smu1) / 2.0;
        k[3] = mu0 * mu1;
        k[4] = 2.0 * k[3] / k[2];
        k[5] = (mu1 - 2.0 * smu0 * smu1 + mu0) / (mu1 + 2.0 * smu0 * smu1 + mu0);

        Ok(Self { inv_diag, k, degree })
    }

    /// Action of `R = q_degree(D^-1 A) D^-1` on `r`, the recurrence from
    /// the source's `Rr` helper.
    fn apply_r(&self, a: &Csr, r: &[Precision]) -> Result<Vec<Precision>> {
        let n = a.row;
        let mut rbar: Vec<Precision> = (0..n).map(|i| self.inv_diag[i] * r[i]).collect();

        let mut v1 = vec![0.0; n];
        a.spmv(1.0, &rbar, &mut v1)?;
        for i in 0..n {
            v1[i] *= self.inv_diag[i];
        }
        let mut v0 = vec![0.0; n];
        for i in 0..n {
            v0[i] = self.k[1] * rbar[i];
            v1[i] = self.k[2] * rbar[i] - self.k[3] * v1[i];
        }

        for _ in 1..self.degree {
            rbar.iter_mut().for_each(|v| *v = 0.0);
            a.spmv(1.0, &v1, &mut rbar)?;
            let mut vnew = vec![0.0; n];
            for i in 0..n {
                let rb = (r[i] - rbar[i]) * self.inv_diag[i];
                vnew[i] = v1[i] + self.k[5] * (v1[i] - v0[i]) + self.k[4] * rb;
            }
            v0 = v1;
            v1 = vnew;
        }
        Ok(v1)
    }

    /// Apply `sweeps` polynomial-smoother relaxations to `a x = b`.
    pub fn apply(&self, a: &Csr, b: &[Precision], x: &mut [Precision], sweeps: usize) -> Result<()> {
        let n = a.row;
        for _ in 0..sweeps {
            let mut r = b.to_vec();
            a.spmv(-1.0, x, &mut r)?;
            let correction = self.apply_r(a, &r)?;
            for i in 0..n {
                x[i] += correction[i];
            }
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
    fn reduces_residual_on_laplacian() {
        let a = laplacian(20);
        let b = vec![1.0; 20];
        let mut x = vec![0.0; 20];
        let setup = PolySetup::new(&a, 3).unwrap();
        let r0 = {
            let mut r = b.clone();
            a.spmv(-1.0, &x, &mut r).unwrap();
            crate::vecalg::norm2(&r)
        };
        // This low-degree polynomial smoother only damps at a modest rate
        // per sweep (it targets high-frequency error, not fast overall
        // convergence), so enough sweeps are needed to see it cross 0.5*r0.
        setup.apply(&a, &b, &mut x, 30).unwrap();
        let r1 = {
            let mut r = b.clone();
            a.spmv(-1.0, &x, &mut r).unwrap();
            crate::vecalg::norm2(&r)
        };
        assert!(r1 < r0 * 0.5);
    }

    #[test]
    fn rejects_zero_degree() {
        let a = laplacian(4);
        assert!(PolySetup::new(&a, 0).is_err());
    }

    #[test]
    fn rejects_singular_diagonal() {
        let a = Coo::from_triplets(2, 2, vec![(0, 0, 0.0), (1, 1, 1.0)]).to_csr().unwrap();
        assert!(PolySetup::new(&a, 2).is_err());
    }
}
