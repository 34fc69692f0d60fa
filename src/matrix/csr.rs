//! Compressed Sparse Row storage (§3): the canonical schema every other
//! format converts through.

use super::coo::Coo;
use crate::error::{Result, SolverError};
use crate::types::{Index, Precision};

/// Compressed Sparse Row matrix.
///
/// `ia[i]` is the offset in `ja`/`val` where row `i` begins; `ia[row] = nnz`.
/// Column indices within a row may be unsorted; each `(i,j)` pair appears at
/// most once post-construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Csr {
    /// Number of rows.
    pub row: usize,
    /// Number of columns.
    pub col: usize,
    /// Row pointers, length `row + 1`.
    pub ia: Vec<Index>,
    /// Column indices, length `nnz`.
    pub ja: Vec<Index>,
    /// Nonzero values, length `nnz`.
    pub val: Vec<Precision>,
}

impl Csr {
    /// Number of stored nonzeros.
    pub fn nnz(&self) -> usize {
        self.val.len()
    }

    /// Build and validate a CSR matrix from raw buffers (§3 invariants).
    pub fn try_new(row: usize, col: usize, ia: Vec<Index>, ja: Vec<Index>, val: Vec<Precision>) -> Result<Self> {
        if ia.len() != row + 1 {
            return Err(SolverError::InvalidSparseMatrix {
                reason: format!("ia has length {} but row+1 = {}", ia.len(), row + 1),
                position: None,
            });
        }
        if ia[0] != 0 {
            return Err(SolverError::InvalidSparseMatrix {
                reason: "ia[0] must be 0".to_string(),
                position: None,
            });
        }
        for w in ia.windows(2) {
            if w[1] < w[0] {
                return Err(SolverError::InvalidSparseMatrix {
                    reason: "ia must be non-decreasing".to_string(),
                    position: None,
                });
            }
        }
        let nnz = *ia.last().unwrap() as usize;
        if nnz != ja.len() || nnz != val.len() {
            return Err(SolverError::InvalidSparseMatrix {
                reason: format!("ia[row]={nnz} disagrees with ja/val lengths ({}, {})", ja.len(), val.len()),
                position: None,
            });
        }
        for (k, &j) in ja.iter().enumerate() {
            if j < 0 || j as usize >= col {
                return Err(SolverError::InvalidSparseMatrix {
                    reason: format!("column index {j} out of range [0, {col})"),
                    position: Some((0, k)),
                });
            }
        }
        Ok(Self { row, col, ia, ja, val })
    }

    /// An empty `row x col` matrix with no nonzeros.
    pub fn zeros(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            ia: vec![0; row + 1],
            ja: Vec::new(),
            val: Vec::new(),
        }
    }

    /// Iterate over the `(col, val)` pairs of row `i`.
    pub fn row_entries(&self, i: usize) -> impl Iterator<Item = (usize, Precision)> + '_ {
        let start = self.ia[i] as usize;
        let end = self.ia[i + 1] as usize;
        self.ja[start..end]
            .iter()
            .zip(self.val[start..end].iter())
            .map(|(&j, &v)| (j as usize, v))
    }

    /// Element access by `(row, col)`; `O(row length)`.
    pub fn get(&self, i: usize, j: usize) -> Option<Precision> {
        self.row_entries(i).find(|&(c, _)| c == j).map(|(_, v)| v)
    }

    /// `y <- alpha * A * x + y` (§4.3 SpMV contract).
    pub fn spmv(&self, alpha: Precision, x: &[Precision], y: &mut [Precision]) -> Result<()> {
        if x.len() != self.col {
            return Err(SolverError::DimensionMismatch {
                expected: self.col,
                actual: x.len(),
                operation: "Csr::spmv x".to_string(),
            });
        }
        if y.len() != self.row {
            return Err(SolverError::DimensionMismatch {
                expected: self.row,
                actual: y.len(),
                operation: "Csr::spmv y".to_string(),
            });
        }
        for i in 0..self.row {
            let start = self.ia[i] as usize;
            let end = self.ia[i + 1] as usize;
            let mut acc = 0.0;
            for k in start..end {
                acc += self.val[k] * x[self.ja[k] as usize];
            }
            y[i] += alpha * acc;
        }
        Ok(())
    }

    /// Dense diagonal extraction; missing diagonals become zero without a
    /// warning (§4.3 — smoothers perform their own zero-diagonal checks).
    pub fn diagonal(&self) -> Vec<Precision> {
        let n = self.row.min(self.col);
        let mut d = vec![0.0; n];
        for i in 0..n {
            if let Some(v) = self.get(i, i) {
                d[i] = v;
            }
        }
        d
    }

    /// Index of the diagonal entry in `ja`/`val` for row `i`, or `None`.
    pub fn diag_index(&self, i: usize) -> Option<usize> {
        let start = self.ia[i] as usize;
        let end = self.ia[i + 1] as usize;
        (start..end).find(|&k| self.ja[k] as usize == i)
    }

    /// Transpose, with column indices sorted within each row (§4.3).
    pub fn transpose(&self) -> Self {
        let mut counts = vec![0i64; self.col + 1];
        for &j in &self.ja {
            counts[j as usize + 1] += 1;
        }
        for i in 1..counts.len() {
            counts[i] += counts[i - 1];
        }
        let nnz = self.nnz();
        let mut ja_t = vec![0 as Index; nnz];
        let mut val_t = vec![0.0; nnz];
        let mut cursor = counts.clone();
        for i in 0..self.row {
            let start = self.ia[i] as usize;
            let end = self.ia[i + 1] as usize;
            for k in start..end {
                let j = self.ja[k] as usize;
                let dest = cursor[j] as usize;
                ja_t[dest] = i as Index;
                val_t[dest] = self.val[k];
                cursor[j] += 1;
            }
        }
        let ia_t: Vec<Index> = counts.iter().map(|&c| c as Index).collect();
        // Sort column indices (the original row index, here) within each row.
        let mut out = Self {
            row: self.col,
            col: self.row,
            ia: ia_t,
            ja: ja_t,
            val: val_t,
        };
        out.sort_rows();
        out
    }

    /// Sort column indices (and co-permute values) within every row.
    pub fn sort_rows(&mut self) {
        for i in 0..self.row {
            let start = self.ia[i] as usize;
            let end = self.ia[i + 1] as usize;
            let mut idx: Vec<usize> = (start..end).collect();
            idx.sort_by_key(|&k| self.ja[k]);
            let ja_row: Vec<Index> = idx.iter().map(|&k| self.ja[k]).collect();
            let val_row: Vec<Precision> = idx.iter().map(|&k| self.val[k]).collect();
            self.ja[start..end].copy_from_slice(&ja_row);
            self.val[start..end].copy_from_slice(&val_row);
        }
    }

    /// Whether the matrix is structurally symmetric: `(i,j)` stored iff `(j,i)` stored.
    pub fn is_structurally_symmetric(&self) -> bool {
        if self.row != self.col {
            return false;
        }
        for i in 0..self.row {
            for (j, _) in self.row_entries(i) {
                if self.get(j, i).is_none() {
                    return false;
                }
            }
        }
        true
    }

    /// Convert to COO.
    pub fn to_coo(&self) -> Coo {
        let mut i_idx = Vec::with_capacity(self.nnz());
        let mut j_idx = Vec::with_capacity(self.nnz());
        let mut val = Vec::with_capacity(self.nnz());
        for i in 0..self.row {
            for (j, v) in self.row_entries(i) {
                i_idx.push(i as Index);
                j_idx.push(j as Index);
                val.push(v);
            }
        }
        Coo {
            row: self.row,
            col: self.col,
            i: i_idx,
            j: j_idx,
            val,
        }
    }
}
