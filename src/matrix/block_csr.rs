//! Two-level block-CSR-of-CSR storage (§3), used for saddle-point systems
//! such as `[[K, B^T], [B, 0]]`.

use super::csr::Csr;
use crate::error::{Result, SolverError};
use crate::types::Precision;

/// A `brow x bcol` grid of optional CSR blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockCsr {
    /// Number of block-rows.
    pub brow: usize,
    /// Number of block-columns.
    pub bcol: usize,
    /// Row-major `brow * bcol` grid; `None` marks a structurally-zero block.
    pub blocks: Vec<Option<Csr>>,
}

impl BlockCsr {
    /// Construct from a row-major block grid, checking conformal dimensions
    /// (every block in a block-row shares its row count; every block in a
    /// block-column shares its column count).
    pub fn try_new(brow: usize, bcol: usize, blocks: Vec<Option<Csr>>) -> Result<Self> {
        if blocks.len() != brow * bcol {
            return Err(SolverError::InvalidSparseMatrix {
                reason: format!("expected {} blocks, got {}", brow * bcol, blocks.len()),
                position: None,
            });
        }
        let mut row_dims = vec![None; brow];
        let mut col_dims = vec![None; bcol];
        for br in 0..brow {
            for bc in 0..bcol {
                if let Some(b) = &blocks[br * bcol + bc] {
                    match row_dims[br] {
                        None => row_dims[br] = Some(b.row),
                        Some(r) if r != b.row => {
                            return Err(SolverError::InvalidSparseMatrix {
                                reason: format!("block-row {br} has inconsistent row counts"),
                                position: None,
                            })
                        }
                        _ => {}
                    }
                    match col_dims[bc] {
                        None => col_dims[bc] = Some(b.col),
                        Some(c) if c != b.col => {
                            return Err(SolverError::InvalidSparseMatrix {
                                reason: format!("block-col {bc} has inconsistent col counts"),
                                position: None,
                            })
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(Self { brow, bcol, blocks })
    }

    fn block(&self, br: usize, bc: usize) -> &Option<Csr> {
        &self.blocks[br * self.bcol + bc]
    }

    fn row_dims(&self) -> Vec<usize> {
        (0..self.brow)
            .map(|br| {
                (0..self.bcol)
                    .find_map(|bc| self.block(br, bc).as_ref().map(|b| b.row))
                    .unwrap_or(0)
            })
            .collect()
    }

    fn col_dims(&self) -> Vec<usize> {
        (0..self.bcol)
            .map(|bc| {
                (0..self.brow)
                    .find_map(|br| self.block(br, bc).as_ref().map(|b| b.col))
                    .unwrap_or(0)
            })
            .collect()
    }

    /// `y <- alpha * A * x + y` over the flattened vector space (row blocks
    /// concatenated in block order, same for `x` over column blocks).
    pub fn spmv(&self, alpha: Precision, x: &[Precision], y: &mut [Precision]) -> Result<()> {
        let row_dims = self.row_dims();
        let col_dims = self.col_dims();
        let row_offsets: Vec<usize> = std::iter::once(0)
            .chain(row_dims.iter().scan(0, |acc, &d| {
                *acc += d;
                Some(*acc)
            }))
            .collect();
        let col_offsets: Vec<usize> = std::iter::once(0)
            .chain(col_dims.iter().scan(0, |acc, &d| {
                *acc += d;
                Some(*acc)
            }))
            .collect();
        let total_rows: usize = row_dims.iter().sum();
        let total_cols: usize = col_dims.iter().sum();
        if x.len() != total_cols || y.len() != total_rows {
            return Err(SolverError::DimensionMismatch {
                expected: total_rows,
                actual: y.len(),
                operation: "BlockCsr::spmv".to_string(),
            });
        }
        for br in 0..self.brow {
            let rs = row_offsets[br];
            let re = row_offsets[br + 1];
            for bc in 0..self.bcol {
                if let Some(block) = self.block(br, bc) {
                    let cs = col_offsets[bc];
                    let ce = col_offsets[bc + 1];
                    block.spmv(alpha, &x[cs..ce], &mut y[rs..re])?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::coo::Coo;

    fn eye(n: usize, scale: Precision) -> Csr {
        Coo::from_triplets(n, n, (0..n).map(|i| (i, i, scale)).collect())
            .to_csr()
            .unwrap()
    }

    #[test]
    fn saddle_point_spmv_matches_manual_computation() {
        // A = [[2I_2, 0], [0, 3I_1]] acting blockwise.
        let k = eye(2, 2.0);
        let s = eye(1, 3.0);
        let a = BlockCsr::try_new(2, 2, vec![Some(k), None, None, Some(s)]).unwrap();
        let x = vec![1.0, 1.0, 1.0];
        let mut y = vec![0.0; 3];
        a.spmv(1.0, &x, &mut y).unwrap();
        assert_eq!(y, [2.0, 2.0, 3.0]);
    }

    #[test]
    fn rejects_inconsistent_block_row_dims() {
        let a = eye(2, 1.0);
        let b = eye(3, 1.0);
        assert!(BlockCsr::try_new(1, 2, vec![Some(a), Some(b)]).is_err());
    }
}
