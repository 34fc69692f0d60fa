//! SOR smoother (§4.4): the Gauss-Seidel sweep body parameterized by a
//! relaxation weight `omega`; `omega = 1` delegates straight to GS rather
//! than duplicating the sweep.

use crate::error::Result;
use crate::matrix::Csr;
use crate::types::{Precision, SweepOrder};

/// Apply `sweeps` SOR relaxations with weight `omega` in `(0, 2)`.
pub fn apply(
    a: &Csr,
    b: &[Precision],
    x: &mut [Precision],
    sweeps: usize,
    omega: Precision,
    order: &SweepOrder,
) -> Result<()> {
    if (omega - 1.0).abs() < Precision::EPSILON {
        return super::gauss_seidel::apply(a, b, x, sweeps, order);
    }
    for _ in 0..sweeps {
        let rows: Vec<usize> = match order {
            SweepOrder::Ascending => (0..a.row).collect(),
            SweepOrder::Descending => (0..a.row).rev().collect(),
            SweepOrder::UserOrdered(perm) => perm.clone(),
            SweepOrder::CfOrdered { is_coarse, coarse_first } => {
                if *coarse_first {
                    (0..a.row)
                        .filter(|&i| is_coarse[i])
                        .chain((0..a.row).filter(|&i| !is_coarse[i]))
                        .collect()
                } else {
                    (0..a.row)
                        .filter(|&i| !is_coarse[i])
                        .chain((0..a.row).filter(|&i| is_coarse[i]))
                        .collect()
                }
            }
        };
        for i in rows {
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
                let gs_update = acc / diag;
                x[i] = (1.0 - omega) * x[i] + omega * gs_update;
            }
        }
    }
    Ok(())
}
