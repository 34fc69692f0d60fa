//! Strength-of-connection graph `S` (§4.6), grounded in `generate_S` /
//! `generate_S_rs` (`core/src/coarsening_rs.c`).

use crate::matrix::Csr;
use crate::params::StrengthPolicy;
use crate::types::{Precision, SMALLREAL};

/// `S` as a plain adjacency list: row `i` lists the columns `i` strongly
/// depends on. Unlike [`Csr`] this carries no values — strength is a
/// yes/no relation used only to drive CF-splitting and interpolation.
#[derive(Debug, Clone)]
pub struct Strength {
    ia: Vec<usize>,
    ja: Vec<usize>,
    pub(crate) n: usize,
}

impl Strength {
    pub fn row(&self, i: usize) -> &[usize] {
        &self.ja[self.ia[i]..self.ia[i + 1]]
    }

    /// Transpose of the strength relation: row `i` lists the vertices that
    /// strongly depend on `i` (`S^T`, used by the λ-measure in pass 1).
    pub fn transpose(&self) -> Strength {
        let mut counts = vec![0usize; self.n + 1];
        for &j in &self.ja {
            counts[j + 1] += 1;
        }
        for i in 1..counts.len() {
            counts[i] += counts[i - 1];
        }
        let mut ja_t = vec![0usize; self.ja.len()];
        let mut cursor = counts.clone();
        for i in 0..self.n {
            for &j in self.row(i) {
                ja_t[cursor[j]] = i;
                cursor[j] += 1;
            }
        }
        Strength { ia: counts, ja: ja_t, n: self.n }
    }
}

/// Build `S` from `a` under the chosen [`StrengthPolicy`].
///
/// `Modified` mirrors `generate_S`: a row's off-diagonal `a_ij` is strong
/// iff `a_ij <= theta_str * row_scale` where `row_scale = min_j a_ij` over
/// the row's off-diagonals (both are typically negative for an M-matrix,
/// so this keeps couplings at least `theta_str` as strong, in magnitude,
/// as the row's strongest coupling). A row whose `|row_sum / a_ii|`
/// exceeds `theta_max` has every dependency declared weak (it is nearly a
/// zero-row-sum row and should be smoothed, not coarsened, through).
/// `ClassicalNegative`/`ClassicalAbsolute` mirror `generate_S_rs`: strength
/// is measured against the row's largest negative (resp. absolute)
/// off-diagonal magnitude directly, with no row-sum escape hatch.
pub fn generate_s(a: &Csr, policy: StrengthPolicy, theta_str: Precision, theta_max: Precision) -> Strength {
    match policy {
        StrengthPolicy::Modified => generate_s_modified(a, theta_str, theta_max),
        StrengthPolicy::ClassicalNegative => generate_s_classical(a, theta_str, false),
        StrengthPolicy::ClassicalAbsolute => generate_s_classical(a, theta_str, true),
    }
}

fn generate_s_modified(a: &Csr, theta_str: Precision, theta_max: Precision) -> Strength {
    let n = a.row;
    let diag = a.diagonal();
    let mut ia = vec![0usize; n + 1];
    let mut rows: Vec<Vec<usize>> = Vec::with_capacity(n);

    for i in 0..n {
        let mut row_scale: Precision = 0.0;
        let mut row_sum = 0.0;
        for (_, v) in a.row_entries(i) {
            row_scale = row_scale.min(v);
            row_sum += v;
        }
        let weak_all = theta_max < 1.0 && (row_sum.abs() / diag[i].abs().max(SMALLREAL)) > theta_max;

        let mut strong = Vec::new();
        if !weak_all {
            for (j, v) in a.row_entries(i) {
                if j != i && v <= theta_str * row_scale {
                    strong.push(j);
                }
            }
        }
        ia[i + 1] = ia[i] + strong.len();
        rows.push(strong);
    }

    Strength { ia, ja: rows.into_iter().flatten().collect(), n }
}

fn generate_s_classical(a: &Csr, theta_str: Precision, absolute: bool) -> Strength {
    let n = a.row;
    let mut amax = vec![0.0; n];
    for i in 0..n {
        for (j, v) in a.row_entries(i) {
            if j == i {
                continue;
            }
            let m = if absolute { v.abs() } else { -v };
            if m > amax[i] {
                amax[i] = m;
            }
        }
    }

    let mut ia = vec![0usize; n + 1];
    let mut rows: Vec<Vec<usize>> = Vec::with_capacity(n);
    for i in 0..n {
        let mut strong = Vec::new();
        for (j, v) in a.row_entries(i) {
            if j == i {
                continue;
            }
            let m = if absolute { v.abs() } else { -v };
            if m >= theta_str * amax[i] {
                strong.push(j);
            }
        }
        ia[i + 1] = ia[i] + strong.len();
        rows.push(strong);
    }
    Strength { ia, ja: rows.into_iter().flatten().collect(), n }
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
    fn modified_marks_all_laplacian_couplings_strong() {
        let a = laplacian(10);
        let s = generate_s(&a, StrengthPolicy::Modified, 0.25, 0.9);
        assert_eq!(s.row(0), &[1]);
        assert_eq!(s.row(5).len(), 2);
    }

    #[test]
    fn classical_negative_matches_modified_on_symmetric_laplacian() {
        let a = laplacian(10);
        let s = generate_s(&a, StrengthPolicy::ClassicalNegative, 0.25, 0.9);
        assert_eq!(s.row(5).len(), 2);
    }

    #[test]
    fn strength_transpose_is_involutive() {
        let a = laplacian(8);
        let s = generate_s(&a, StrengthPolicy::Modified, 0.25, 0.9);
        let st = s.transpose();
        let stt = st.transpose();
        for i in 0..8 {
            let mut a_row = s.row(i).to_vec();
            let mut b_row = stt.row(i).to_vec();
            a_row.sort_unstable();
            b_row.sort_unstable();
            assert_eq!(a_row, b_row);
        }
    }
}
