//! Interpolation sparsity and direct-interpolation weights (§4.6),
//! grounded in `generate_sparsity_P` (`core/src/coarsening_rs.c`) for the
//! pattern; the classical Ruge-Stuben direct-interpolation weight formula
//! (Briggs/Henson/McCormick) fills the values, since no direct-interpolation
//! source file ships in this pack's `original_source/`. A fine row whose
//! strength row is empty (every coupling declared weak by the zero-row-sum
//! escape hatch in `generate_s`) falls back to the raw operator's coarse
//! neighbors, and failing that to an empty P row relying on the smoother —
//! neither case has a source file to ground against either.

use super::splitting::CfMark;
use super::strength::Strength;
use crate::error::{Result, SolverError};
use crate::matrix::Csr;
use crate::types::{Index, Precision, SMALLREAL};

/// Coarse-grid column index for every coarse row, `None` for fine/isolated.
pub fn coarse_index_map(mark: &[CfMark]) -> (Vec<Option<usize>>, usize) {
    let mut map = vec![None; mark.len()];
    let mut next = 0usize;
    for (i, m) in mark.iter().enumerate() {
        if m.is_coarse() {
            map[i] = Some(next);
            next += 1;
        }
    }
    (map, next)
}

/// Build `P` (fine-level rows, coarse-level columns): sparsity from
/// `generate_sparsity_P`, weights from classical direct interpolation.
///
/// For a fine row `i`, let `C_i` be its strong coarse neighbors and
/// `F_i` its strong fine neighbors; every other neighbor (weak, or not in
/// `S_i` at all) is lumped into the diagonal. For `k in C_i`:
///
/// ```text
/// w_ik = -( a_ik + sum_{j in F_i} a_ij * a_jk / sum_{l in C_i} a_jl ) / a_ii~
/// ```
///
/// where `a_ii~ = a_ii + sum of lumped weak entries`, and a fine neighbor
/// `j` contributes nothing if `sum_{l in C_i} a_jl` is itself singular
/// (its mass is lumped into the diagonal instead).
pub fn build(a: &Csr, s: &Strength, mark: &[CfMark]) -> Result<Csr> {
    let n = a.row;
    let (coarse_index, ncoarse) = coarse_index_map(mark);

    let mut ia = vec![0 as Index; n + 1];
    let mut ja = Vec::new();
    let mut val = Vec::new();

    for i in 0..n {
        match mark[i] {
            CfMark::Isolated => {}
            CfMark::Coarse => {
                ja.push(coarse_index[i].unwrap() as Index);
                val.push(1.0);
            }
            CfMark::Fine => {
                let strong_set: std::collections::HashSet<usize> = s.row(i).iter().copied().collect();
                let mut c_i: Vec<usize> = s.row(i).iter().copied().filter(|&j| mark[j].is_coarse()).collect();
                let f_i: Vec<usize> = s.row(i).iter().copied().filter(|&j| mark[j] == CfMark::Fine).collect();

                // A row whose theta_max escape hatch declared every coupling
                // weak (generate_s's "zero row-sum" case) has no entry in S
                // at all, strong or otherwise. Such a point can't be fixed
                // by CF-splitting's phase two since there's nothing for it
                // to share with a neighbor; fall back to direct
                // interpolation from the raw operator's coarse neighbors
                // instead of the strength-filtered set.
                if c_i.is_empty() {
                    c_i = a
                        .row_entries(i)
                        .filter(|&(j, _)| j != i && mark[j].is_coarse())
                        .map(|(j, _)| j)
                        .collect();
                }

                // Still nothing: this point has no coarse connection of any
                // kind (raw or strong). Leave its P row empty so the cycle's
                // smoother, not interpolation, carries the correction here.
                if c_i.is_empty() {
                    ia[i + 1] = ja.len() as Index;
                    continue;
                }

                let a_ii = a.get(i, i).unwrap_or(0.0);
                let mut a_ii_tilde = a_ii;
                let mut row_weak_sum = 0.0;
                for (j, v) in a.row_entries(i) {
                    if j != i && !strong_set.contains(&j) {
                        row_weak_sum += v;
                    }
                }
                a_ii_tilde += row_weak_sum;

                let mut w: Vec<Precision> = c_i.iter().map(|&k| -a.get(i, k).unwrap_or(0.0)).collect();
                for &j in &f_i {
                    let a_ij = a.get(i, j).unwrap_or(0.0);
                    let sum_l: Precision = c_i.iter().map(|&l| a.get(j, l).unwrap_or(0.0)).sum();
                    if sum_l.abs() < SMALLREAL {
                        a_ii_tilde += a_ij;
                        continue;
                    }
                    for (slot, &k) in c_i.iter().enumerate() {
                        let a_jk = a.get(j, k).unwrap_or(0.0);
                        if a_jk != 0.0 {
                            w[slot] -= a_ij * a_jk / sum_l;
                        }
                    }
                }

                if a_ii_tilde.abs() < SMALLREAL {
                    return Err(SolverError::DivisionByZero {
                        denom: a_ii_tilde,
                        iteration: i,
                        solver: "amg interpolation".to_string(),
                    });
                }
                for (&k, wk) in c_i.iter().zip(w.iter()) {
                    ja.push(coarse_index[k].unwrap() as Index);
                    val.push(wk / a_ii_tilde);
                }
            }
        }
        ia[i + 1] = ja.len() as Index;
    }

    Csr::try_new(n, ncoarse, ia, ja, val)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Coo;
    use crate::params::StrengthPolicy;

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
    fn interpolation_rows_sum_near_one_for_constant_vector() {
        // Interior rows of the 1D Laplacian have zero row-sum, so direct
        // interpolation exactly reproduces the constant vector there; the
        // two Dirichlet-boundary rows (nonzero row-sum) are excluded.
        let a = laplacian(20);
        let s = super::super::strength::generate_s(&a, StrengthPolicy::Modified, 0.25, 0.9);
        let mark = super::super::splitting::cf_splitting_rs(&a, &s);
        let p = build(&a, &s, &mark).unwrap();
        for i in 1..19 {
            if mark[i] != crate::amg::splitting::CfMark::Fine {
                continue;
            }
            let row_sum: Precision = p.row_entries(i).map(|(_, v)| v).sum();
            assert!((row_sum - 1.0).abs() < 1e-8, "row {i} sum {row_sum}");
        }
    }

    #[test]
    fn coarse_rows_are_unit_injections() {
        let a = laplacian(10);
        let s = super::super::strength::generate_s(&a, StrengthPolicy::Modified, 0.25, 0.9);
        let mark = super::super::splitting::cf_splitting_rs(&a, &s);
        let p = build(&a, &s, &mark).unwrap();
        for i in 0..10 {
            if mark[i].is_coarse() {
                let entries: Vec<_> = p.row_entries(i).collect();
                assert_eq!(entries.len(), 1);
                assert!((entries[0].1 - 1.0).abs() < 1e-12);
            }
        }
    }
}
