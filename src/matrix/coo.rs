//! Coordinate (COO) storage (§3) — triple lists, no ordering requirement.
//! The construction format of choice; every other schema is built by
//! converting through CSR, which in turn is usually built from COO.

use super::csr::Csr;
use crate::error::Result;
use crate::types::{Index, Precision};

/// Coordinate-format matrix: parallel `i`, `j`, `val` arrays.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coo {
    /// Number of rows.
    pub row: usize,
    /// Number of columns.
    pub col: usize,
    /// Row indices, length `nnz`.
    pub i: Vec<Index>,
    /// Column indices, length `nnz`.
    pub j: Vec<Index>,
    /// Values, length `nnz`.
    pub val: Vec<Precision>,
}

impl Coo {
    /// Number of stored triples (duplicates counted separately until conversion).
    pub fn nnz(&self) -> usize {
        self.val.len()
    }

    /// Build from a list of `(row, col, value)` triplets.
    pub fn from_triplets(row: usize, col: usize, triplets: Vec<(usize, usize, Precision)>) -> Self {
        let mut i = Vec::with_capacity(triplets.len());
        let mut j = Vec::with_capacity(triplets.len());
        let mut val = Vec::with_capacity(triplets.len());
        for (r, c, v) in triplets {
            i.push(r as Index);
            j.push(c as Index);
            val.push(v);
        }
        Self { row, col, i, j, val }
    }

    /// Convert to CSR, summing duplicate `(i,j)` entries (§4.3 conversion contract).
    pub fn to_csr(&self) -> Result<Csr> {
        let mut entries: Vec<(usize, usize, Precision)> = self
            .i
            .iter()
            .zip(self.j.iter())
            .zip(self.val.iter())
            .map(|((&r, &c), &v)| (r as usize, c as usize, v))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut ia = vec![0 as Index; self.row + 1];
        let mut ja = Vec::new();
        let mut val = Vec::new();

        let mut idx = 0;
        while idx < entries.len() {
            let (r, c, mut v) = entries[idx];
            idx += 1;
            while idx < entries.len() && entries[idx].0 == r && entries[idx].1 == c {
                v += entries[idx].2;
                idx += 1;
            }
            ja.push(c as Index);
            val.push(v);
            ia[r + 1] += 1;
        }
        for k in 0..self.row {
            ia[k + 1] += ia[k];
        }
        Csr::try_new(self.row, self.col, ia, ja, val)
    }
}
