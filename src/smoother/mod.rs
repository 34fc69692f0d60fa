//! Relaxation methods (C4, §4.4): point/block smoothers used both
//! standalone and as pre/post-smoothers inside the AMG cycle (C7).

pub mod gauss_seidel;
pub mod ilu;
pub mod jacobi;
pub mod poly;
pub mod schwarz;
pub mod sor;

use crate::error::Result;
use crate::matrix::Csr;
use crate::types::Precision;

/// One Gauss-Seidel sweep over the F-points only, leaving every C-point
/// fixed at its current value — the relaxation compatible relaxation is
/// named for (it is the identity on `C`, a smoother on `F`).
fn relax_f_points(a: &Csr, is_coarse: &[bool], u: &mut [Precision]) {
    for i in 0..a.row {
        if is_coarse[i] {
            continue;
        }
        let start = a.ia[i] as usize;
        let end = a.ia[i + 1] as usize;
        let mut acc = 0.0;
        let mut diag = 0.0;
        for k in start..end {
            let j = a.ja[k] as usize;
            if j == i {
                diag = a.val[k];
            } else {
                acc -= a.val[k] * u[j];
            }
        }
        if diag.abs() > crate::types::SMALLREAL {
            u[i] = acc / diag;
        }
    }
}

/// Compatible-relaxation convergence measure (Brannick-Falgout CR, §4.6):
/// relax `u = 1` on F-points / `0` on C-points against the homogeneous
/// system `A u = 0`, holding every C-point fixed throughout, and report
/// the ratio of the F-point norm after one extra sweep to the norm from
/// the sweep before it. A slowly shrinking ratio (close to 1) means the
/// current C-set does not control F-point error well; a ratio near 0
/// means it does. Grounded in `fasp_amg_coarsening_cr`'s `rho` measure.
pub fn compatible_relaxation_rho(a: &Csr, is_coarse: &[bool], sweeps: usize) -> Result<Precision> {
    let mut u: Vec<Precision> = is_coarse.iter().map(|&c| if c { 0.0 } else { 1.0 }).collect();
    let f_count = is_coarse.iter().filter(|&&c| !c).count();
    if f_count == 0 || sweeps == 0 {
        return Ok(0.0);
    }

    let norm_over_f = |v: &[Precision]| -> Precision {
        v.iter()
            .zip(is_coarse.iter())
            .filter(|&(_, &c)| !c)
            .map(|(&x, _)| x * x)
            .sum::<Precision>()
            .sqrt()
    };

    for _ in 0..sweeps.saturating_sub(1) {
        relax_f_points(a, is_coarse, &mut u);
    }
    let temp0 = norm_over_f(&u);
    relax_f_points(a, is_coarse, &mut u);
    let temp1 = norm_over_f(&u);
    Ok(if temp0 > crate::types::SMALLREAL { temp1 / temp0 } else { 0.0 })
}

/// Whether a CF-splitting is adequate under compatible relaxation: the
/// contraction ratio must fall at or below `threshold` (default `0.8`,
/// `AmgParam::cr_threshold`).
pub fn is_splitting_adequate(a: &Csr, is_coarse: &[bool], threshold: Precision, sweeps: usize) -> Result<bool> {
    Ok(compatible_relaxation_rho(a, is_coarse, sweeps)? <= threshold)
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
    fn alternating_cf_gives_low_contraction() {
        let a = laplacian(16);
        let is_coarse: Vec<bool> = (0..16).map(|i| i % 2 == 0).collect();
        let rho = compatible_relaxation_rho(&a, &is_coarse, 3).unwrap();
        assert!(rho.is_finite());
        assert!(rho >= 0.0);
    }

    #[test]
    fn all_fine_never_contracts() {
        let a = laplacian(8);
        let is_coarse = vec![false; 8];
        let rho = compatible_relaxation_rho(&a, &is_coarse, 3).unwrap();
        assert!(rho > 0.5);
        assert!(!is_splitting_adequate(&a, &is_coarse, 0.8, 3).unwrap());
    }

    #[test]
    fn alternating_cf_is_adequate_on_laplacian() {
        let a = laplacian(20);
        let is_coarse: Vec<bool> = (0..20).map(|i| i % 2 == 0).collect();
        assert!(is_splitting_adequate(&a, &is_coarse, 0.8, 5).unwrap());
    }
}
