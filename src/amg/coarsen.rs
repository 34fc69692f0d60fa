//! Galerkin coarsening `A_{l+1} = P^T A_l P` (§4.6): two sparse-sparse
//! products via hash-accumulated rows, using the teacher's `fnv`
//! dependency the way a from-scratch AMG setup typically does (there is
//! no single "RAP" file in `original_source` to ground this against line
//! for line; the symbolic-then-numeric hash-row product is standard
//! practice for Galerkin coarsening in this family of solvers).

use crate::error::Result;
use crate::matrix::Csr;
use crate::types::{Index, Precision};
use fnv::FnvHashMap;

/// Sparse-sparse product `A * B`, row by row, accumulating each output
/// row in a hash map keyed by column before flattening to CSR.
fn spgemm(a: &Csr, b: &Csr) -> Csr {
    let mut ia = vec![0 as Index; a.row + 1];
    let mut ja = Vec::new();
    let mut val = Vec::new();

    for i in 0..a.row {
        let mut row: FnvHashMap<usize, Precision> = FnvHashMap::default();
        for (k, aik) in a.row_entries(i) {
            for (j, bkj) in b.row_entries(k) {
                *row.entry(j).or_insert(0.0) += aik * bkj;
            }
        }
        let mut cols: Vec<usize> = row.keys().copied().collect();
        cols.sort_unstable();
        for c in cols {
            ja.push(c as Index);
            val.push(row[&c]);
        }
        ia[i + 1] = ja.len() as Index;
    }

    Csr { row: a.row, col: b.col, ia, ja, val }
}

/// `A_{l+1} = P^T A_l P`, computed as `P^T (A_l P)`.
pub fn galerkin(a: &Csr, p: &Csr) -> Result<Csr> {
    let ap = spgemm(a, p);
    let pt = p.transpose();
    Ok(spgemm(&pt, &ap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Coo;

    #[test]
    fn galerkin_of_identity_interpolation_is_unchanged() {
        let a = Coo::from_triplets(3, 3, vec![(0, 0, 2.0), (1, 1, 3.0), (2, 2, 4.0)]).to_csr().unwrap();
        let p = Coo::from_triplets(3, 3, vec![(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0)]).to_csr().unwrap();
        let coarse = galerkin(&a, &p).unwrap();
        for i in 0..3 {
            assert_eq!(coarse.get(i, i), a.get(i, i));
        }
    }

    #[test]
    fn galerkin_of_1d_laplacian_injection_halves_rows() {
        // P injects every even fine point to a coarse point (identity on
        // the even rows, zero elsewhere): A_coarse should keep the 2.0
        // diagonal contribution from the corresponding fine row.
        let mut t = Vec::new();
        for i in 0..6 {
            t.push((i, i, 2.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            if i + 1 < 6 {
                t.push((i, i + 1, -1.0));
            }
        }
        let a = Coo::from_triplets(6, 6, t).to_csr().unwrap();
        let p = Coo::from_triplets(6, 3, vec![(0, 0, 1.0), (2, 1, 1.0), (4, 2, 1.0)]).to_csr().unwrap();
        let coarse = galerkin(&a, &p).unwrap();
        assert_eq!(coarse.row, 3);
        assert_eq!(coarse.col, 3);
        assert_eq!(coarse.get(0, 0), Some(2.0));
    }
}
