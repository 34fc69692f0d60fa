//! "Sorted-by-row-length" CSR (§3): rows are permuted into groups of equal
//! nonzero count so that a vectorized SpMV kernel can process each group
//! with a fixed, branch-free inner loop length.

use super::csr::Csr;
use crate::error::Result;
use crate::types::{Index, Precision};

/// CSR with rows grouped by nonzero count.
#[derive(Debug, Clone, PartialEq)]
pub struct Csrl {
    /// Number of rows.
    pub row: usize,
    /// Number of columns.
    pub col: usize,
    /// Number of distinct row lengths present.
    pub nzdifnum: usize,
    /// `rowindex[k]` is the original row number of permuted row `k`.
    pub rowindex: Vec<usize>,
    /// `rowstart[g]` is the first permuted-row index of length-group `g`;
    /// `rowstart[nzdifnum] = row`.
    pub rowstart: Vec<usize>,
    /// Row length of each group, parallel to `rowstart` (length `nzdifnum`).
    pub rowlength: Vec<usize>,
    /// Column indices, grouped and row-major within the permuted order.
    pub ja: Vec<Index>,
    /// Values, same layout as `ja`.
    pub val: Vec<Precision>,
}

impl Csrl {
    /// Build from a CSR matrix (§4.3 CSR->CSRL conversion).
    pub fn from_csr(csr: &Csr) -> Self {
        let mut by_len: Vec<(usize, usize)> = (0..csr.row)
            .map(|i| (i, (csr.ia[i + 1] - csr.ia[i]) as usize))
            .collect();
        by_len.sort_by_key(|&(_, len)| len);

        let mut rowindex = Vec::with_capacity(csr.row);
        let mut rowstart = Vec::new();
        let mut rowlength = Vec::new();
        let mut ja = Vec::new();
        let mut val = Vec::new();

        let mut k = 0;
        while k < by_len.len() {
            let len = by_len[k].1;
            rowstart.push(rowindex.len());
            rowlength.push(len);
            while k < by_len.len() && by_len[k].1 == len {
                let orig_row = by_len[k].0;
                rowindex.push(orig_row);
                let start = csr.ia[orig_row] as usize;
                let end = csr.ia[orig_row + 1] as usize;
                ja.extend_from_slice(&csr.ja[start..end]);
                val.extend_from_slice(&csr.val[start..end]);
                k += 1;
            }
        }
        rowstart.push(csr.row);

        Self {
            row: csr.row,
            col: csr.col,
            nzdifnum: rowlength.len(),
            rowindex,
            rowstart,
            rowlength,
            ja,
            val,
        }
    }

    /// `y <- alpha * A * x + y`, processing each length-group with a fixed
    /// inner-loop trip count.
    pub fn spmv(&self, alpha: Precision, x: &[Precision], y: &mut [Precision]) -> Result<()> {
        if x.len() != self.col || y.len() != self.row {
            return Err(crate::error::SolverError::DimensionMismatch {
                expected: self.row,
                actual: y.len(),
                operation: "Csrl::spmv".to_string(),
            });
        }
        let mut cursor = 0usize;
        for g in 0..self.nzdifnum {
            let len = self.rowlength[g];
            let group_start = self.rowstart[g];
            let group_end = self.rowstart[g + 1];
            for perm_row in group_start..group_end {
                let orig_row = self.rowindex[perm_row];
                let mut acc = 0.0;
                for k in 0..len {
                    acc += self.val[cursor + k] * x[self.ja[cursor + k] as usize];
                }
                y[orig_row] += alpha * acc;
                cursor += len;
            }
        }
        Ok(())
    }

    /// Convert back to plain CSR.
    pub fn to_csr(&self) -> Csr {
        let mut ia = vec![0 as Index; self.row + 1];
        let mut ja = vec![0 as Index; self.ja.len()];
        let mut val = vec![0.0; self.val.len()];
        // First pass: row lengths by original row.
        let mut lengths = vec![0usize; self.row];
        let mut cursor = 0usize;
        for g in 0..self.nzdifnum {
            let len = self.rowlength[g];
            for perm_row in self.rowstart[g]..self.rowstart[g + 1] {
                lengths[self.rowindex[perm_row]] = len;
                cursor += len;
            }
        }
        let _ = cursor;
        for i in 0..self.row {
            ia[i + 1] = ia[i] + lengths[i] as Index;
        }
        cursor = 0;
        for g in 0..self.nzdifnum {
            let len = self.rowlength[g];
            for perm_row in self.rowstart[g]..self.rowstart[g + 1] {
                let orig_row = self.rowindex[perm_row];
                let dest = ia[orig_row] as usize;
                ja[dest..dest + len].copy_from_slice(&self.ja[cursor..cursor + len]);
                val[dest..dest + len].copy_from_slice(&self.val[cursor..cursor + len]);
                cursor += len;
            }
        }
        Csr {
            row: self.row,
            col: self.col,
            ia,
            ja,
            val,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::coo::Coo;

    fn sample() -> Csr {
        Coo::from_triplets(
            4,
            4,
            vec![
                (0, 0, 1.0),
                (1, 0, 2.0),
                (1, 1, 3.0),
                (2, 2, 4.0),
                (3, 0, 5.0),
                (3, 1, 6.0),
                (3, 2, 7.0),
            ],
        )
        .to_csr()
        .unwrap()
    }

    #[test]
    fn groups_rows_by_length() {
        let csrl = Csrl::from_csr(&sample());
        assert_eq!(csrl.nzdifnum, 3); // lengths 1, 2, 3
        assert_eq!(csrl.rowstart.last().copied().unwrap(), 4);
    }

    #[test]
    fn spmv_matches_csr() {
        let csr = sample();
        let csrl = Csrl::from_csr(&csr);
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let mut y_csr = vec![0.0; 4];
        csr.spmv(1.0, &x, &mut y_csr).unwrap();
        let mut y_csrl = vec![0.0; 4];
        csrl.spmv(1.0, &x, &mut y_csrl).unwrap();
        assert_eq!(y_csr, y_csrl);
    }

    #[test]
    fn roundtrip_to_csr_preserves_entries() {
        let csr = sample();
        let csrl = Csrl::from_csr(&csr);
        let back = csrl.to_csr();
        assert_eq!(csr, back);
    }
}
