//! Gauss-Seidel smoother over CSR (§4.4): forward/backward sweeps with
//! ascending, descending, user-ordered, and CF-ordered variants.

use crate::block;
use crate::error::Result;
use crate::matrix::{Csr, Str};
use crate::types::{Precision, SweepOrder};

/// Apply `sweeps` Gauss-Seidel relaxations to `a x = b` in the given order.
pub fn apply(a: &Csr, b: &[Precision], x: &mut [Precision], sweeps: usize, order: &SweepOrder) -> Result<()> {
    for _ in 0..sweeps {
        match order {
            SweepOrder::Ascending => sweep(a, b, x, 0..a.row),
            SweepOrder::Descending => sweep(a, b, x, (0..a.row).rev().collect::<Vec<_>>().into_iter()),
            SweepOrder::UserOrdered(perm) => sweep(a, b, x, perm.iter().copied().collect::<Vec<_>>().into_iter()),
            SweepOrder::CfOrdered { is_coarse, coarse_first } => {
                let (first, second): (Vec<usize>, Vec<usize>) = if *coarse_first {
                    ((0..a.row).filter(|&i| is_coarse[i]).collect(), (0..a.row).filter(|&i| !is_coarse[i]).collect())
                } else {
                    ((0..a.row).filter(|&i| !is_coarse[i]).collect(), (0..a.row).filter(|&i| is_coarse[i]).collect())
                };
                sweep(a, b, x, first.into_iter());
                sweep(a, b, x, second.into_iter());
            }
        }
    }
    Ok(())
}

/// Symmetric sweep: one forward pass then one backward pass, used as the
/// AMG default smoother (§4.10's `SmootherKind::GaussSeidelSymmetric`).
pub fn apply_symmetric(a: &Csr, b: &[Precision], x: &mut [Precision], sweeps: usize) -> Result<()> {
    for _ in 0..sweeps {
        sweep(a, b, x, 0..a.row);
        sweep(a, b, x, (0..a.row).rev().collect::<Vec<_>>().into_iter());
    }
    Ok(())
}

fn sweep(a: &Csr, b: &[Precision], x: &mut [Precision], order: impl Iterator<Item = usize>) {
    for i in order {
        let start = a.ia[i] as usize;
        let end = a.ia[i + 1] as usize;
        let mut acc = b[i];
        let mut diag = 0.0;
        for k in start..end {
            let j = a.ja[k] as usize;
            if j == i {
                diag = a.val[k];
            } else {
                acc -= a.val[k] * x[j];
            }
        }
        if diag.abs() > crate::types::SMALLREAL {
            x[i] = acc / diag;
        }
    }
}

/// Forward-ascending Gauss-Seidel over a structured grid matrix, visiting
/// grid points in natural order and solving each `nc x nc` diagonal block
/// exactly via [`block::invert_lu`] (§4.4 "Gauss-Seidel (CSR and STR)").
pub fn apply_str(a: &Str, b: &[Precision], x: &mut [Precision], sweeps: usize) -> Result<()> {
    let ngrid = a.ngrid();
    let nc = a.nc;
    for _ in 0..sweeps {
        for i in 0..ngrid {
            let mut local_b = b[i * nc..i * nc + nc].to_vec();
            for (band_idx, &d) in a.offsets.iter().enumerate() {
                let lo = (-d).max(0) as usize;
                let hi = (ngrid as i64).min(ngrid as i64 - d) as usize;
                if i < lo || i >= hi {
                    continue;
                }
                let other = (i as i64 + d) as usize;
                let k = i - lo;
                let band = &a.offdiag[band_idx];
                let blk = &band[k * nc * nc..(k + 1) * nc * nc];
                block::matvec_sub(nc, blk, &x[other * nc..other * nc + nc], &mut local_b);
            }
            let mut diag_inv = a.diag[i * nc * nc..(i + 1) * nc * nc].to_vec();
            block::invert_lu(nc, &mut diag_inv)?;
            let mut correction = vec![0.0; nc];
            block::matvec(nc, &diag_inv, &local_b, &mut correction);
            x[i * nc..i * nc + nc].copy_from_slice(&correction);
        }
    }
    Ok(())
}
