//! Block Compressed Sparse Row storage (§3): like CSR, but each stored
//! "nonzero" is an `nb x nb` dense block.

use super::csr::Csr;
use crate::block;
use crate::error::{Result, SolverError};
use crate::types::{Index, Precision};

/// In-block value layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StorageManner {
    /// Row-major within each block (default).
    #[default]
    RowMajor,
    /// Column-major within each block.
    ColMajor,
}

/// Block-CSR matrix: `row`/`col` count block-rows/block-columns, `nb` is
/// the block side length, and `val` has length `nnz * nb * nb`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bsr {
    /// Block-rows.
    pub row: usize,
    /// Block-columns.
    pub col: usize,
    /// Block side length.
    pub nb: usize,
    /// In-block storage order.
    pub storage_manner: StorageManner,
    /// Block-row pointers, length `row + 1`.
    pub ia: Vec<Index>,
    /// Block-column indices, length `nnz`.
    pub ja: Vec<Index>,
    /// Block values, length `nnz * nb * nb`, each block stored contiguously
    /// in row-major order internally regardless of `storage_manner` (the
    /// manner only affects how `val` is interpreted when read from/written
    /// to disk, §6 format 6).
    pub val: Vec<Precision>,
}

impl Bsr {
    /// Number of stored blocks.
    pub fn nnz_blocks(&self) -> usize {
        self.ja.len()
    }

    /// Validate storage invariants (§3).
    pub fn try_new(
        row: usize,
        col: usize,
        nb: usize,
        storage_manner: StorageManner,
        ia: Vec<Index>,
        ja: Vec<Index>,
        val: Vec<Precision>,
    ) -> Result<Self> {
        if ia.len() != row + 1 || ia[0] != 0 {
            return Err(SolverError::InvalidSparseMatrix {
                reason: "bsr ia must have length row+1 and start at 0".to_string(),
                position: None,
            });
        }
        let nnz = *ia.last().unwrap() as usize;
        if nnz != ja.len() || val.len() != nnz * nb * nb {
            return Err(SolverError::InvalidSparseMatrix {
                reason: format!("bsr val length {} != nnz*nb^2 = {}", val.len(), nnz * nb * nb),
                position: None,
            });
        }
        Ok(Self {
            row,
            col,
            nb,
            storage_manner,
            ia,
            ja,
            val,
        })
    }

    /// Block at position `k` in storage order, row-major regardless of `storage_manner`.
    fn block(&self, k: usize) -> Vec<Precision> {
        let raw = &self.val[k * self.nb * self.nb..(k + 1) * self.nb * self.nb];
        match self.storage_manner {
            StorageManner::RowMajor => raw.to_vec(),
            StorageManner::ColMajor => {
                let n = self.nb;
                let mut out = vec![0.0; n * n];
                for r in 0..n {
                    for c in 0..n {
                        out[r * n + c] = raw[c * n + r];
                    }
                }
                out
            }
        }
    }

    /// `y <- alpha * A * x + y`, `x`/`y` in the full (unblocked) vector space.
    pub fn spmv(&self, alpha: Precision, x: &[Precision], y: &mut [Precision]) -> Result<()> {
        let nb = self.nb;
        if x.len() != self.col * nb || y.len() != self.row * nb {
            return Err(SolverError::DimensionMismatch {
                expected: self.row * nb,
                actual: y.len(),
                operation: "Bsr::spmv".to_string(),
            });
        }
        let mut acc = vec![0.0; nb];
        for br in 0..self.row {
            let start = self.ia[br] as usize;
            let end = self.ia[br + 1] as usize;
            acc.iter_mut().for_each(|v| *v = 0.0);
            for k in start..end {
                let bc = self.ja[k] as usize;
                let block = self.block(k);
                block::matvec_add(nb, &block, &x[bc * nb..bc * nb + nb], &mut acc);
            }
            for r in 0..nb {
                y[br * nb + r] += alpha * acc[r];
            }
        }
        Ok(())
    }

    /// Convert to a `(row*nb) x (col*nb)` CSR matrix by expanding each block.
    pub fn to_csr(&self) -> Result<Csr> {
        let nb = self.nb;
        let mut ia = vec![0 as Index; self.row * nb + 1];
        let mut ja = Vec::new();
        let mut val = Vec::new();
        for br in 0..self.row {
            let start = self.ia[br] as usize;
            let end = self.ia[br + 1] as usize;
            let blocks: Vec<(usize, Vec<Precision>)> =
                (start..end).map(|k| (self.ja[k] as usize, self.block(k))).collect();
            for r in 0..nb {
                for &(bc, ref block) in &blocks {
                    for c in 0..nb {
                        let v = block[r * nb + c];
                        ja.push((bc * nb + c) as Index);
                        val.push(v);
                    }
                }
                ia[br * nb + r + 1] = ja.len() as Index;
            }
        }
        Csr::try_new(self.row * nb, self.col * nb, ia, ja, val)
    }

    /// Convert a CSR matrix to BSR; requires `row % nb == 0` and `col % nb == 0` (§4.3).
    pub fn from_csr(csr: &Csr, nb: usize) -> Result<Self> {
        if csr.row % nb != 0 || csr.col % nb != 0 {
            return Err(SolverError::InvalidSparseMatrix {
                reason: format!("csr dimensions ({}, {}) are not multiples of nb={nb}", csr.row, csr.col),
                position: None,
            });
        }
        let brows = csr.row / nb;
        let bcols = csr.col / nb;
        let mut block_map: std::collections::BTreeMap<(usize, usize), Vec<Precision>> =
            std::collections::BTreeMap::new();
        for i in 0..csr.row {
            let br = i / nb;
            let ir = i % nb;
            for (j, v) in csr.row_entries(i) {
                let bc = j / nb;
                let ic = j % nb;
                let entry = block_map.entry((br, bc)).or_insert_with(|| vec![0.0; nb * nb]);
                entry[ir * nb + ic] = v;
            }
        }
        let mut ia = vec![0 as Index; brows + 1];
        let mut ja = Vec::new();
        let mut val = Vec::new();
        for br in 0..brows {
            for bc in 0..bcols {
                if let Some(block) = block_map.get(&(br, bc)) {
                    ja.push(bc as Index);
                    val.extend_from_slice(block);
                }
            }
            ia[br + 1] = ja.len() as Index;
        }
        Self::try_new(brows, bcols, nb, StorageManner::RowMajor, ia, ja, val)
    }
}
