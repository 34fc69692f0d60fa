//! Sparse matrix storage schemas, conversions, and SpMV (C3, §4.3).
//!
//! Every schema represents the same mathematical object `A` with distinct
//! memory layouts (§3). The Krylov engine (C5) and smoother suite (C4) are
//! written once against the [`SparseOp`] trait / [`AnyMatrix`] dispatch
//! enum rather than duplicated per schema, per §9's dynamic-dispatch note.

pub mod block_csr;
pub mod bsr;
pub mod coo;
pub mod csr;
pub mod csrl;
pub mod structured;

pub use block_csr::BlockCsr;
pub use bsr::{Bsr, StorageManner};
pub use coo::Coo;
pub use csr::Csr;
pub use csrl::Csrl;
pub use structured::Str;

use crate::error::Result;
use crate::types::Precision;

/// Common operator contract every sparse schema implements: `y <- alpha * A * x + y`.
pub trait SparseOp {
    /// Number of rows of the operator.
    fn rows(&self) -> usize;
    /// Number of columns of the operator.
    fn cols(&self) -> usize;
    /// `y <- alpha * A * x + y`.
    fn spmv(&self, alpha: Precision, x: &[Precision], y: &mut [Precision]) -> Result<()>;
}

impl SparseOp for Csr {
    fn rows(&self) -> usize {
        self.row
    }
    fn cols(&self) -> usize {
        self.col
    }
    fn spmv(&self, alpha: Precision, x: &[Precision], y: &mut [Precision]) -> Result<()> {
        Csr::spmv(self, alpha, x, y)
    }
}

impl SparseOp for Bsr {
    fn rows(&self) -> usize {
        self.row * self.nb
    }
    fn cols(&self) -> usize {
        self.col * self.nb
    }
    fn spmv(&self, alpha: Precision, x: &[Precision], y: &mut [Precision]) -> Result<()> {
        Bsr::spmv(self, alpha, x, y)
    }
}

impl SparseOp for Str {
    fn rows(&self) -> usize {
        self.ngrid() * self.nc
    }
    fn cols(&self) -> usize {
        self.ngrid() * self.nc
    }
    fn spmv(&self, alpha: Precision, x: &[Precision], y: &mut [Precision]) -> Result<()> {
        Str::spmv(self, alpha, x, y)
    }
}

impl SparseOp for BlockCsr {
    fn rows(&self) -> usize {
        (0..self.brow)
            .map(|br| {
                (0..self.bcol)
                    .find_map(|bc| self.blocks[br * self.bcol + bc].as_ref().map(|b| b.row))
                    .unwrap_or(0)
            })
            .sum()
    }
    fn cols(&self) -> usize {
        (0..self.bcol)
            .map(|bc| {
                (0..self.brow)
                    .find_map(|br| self.blocks[br * self.bcol + bc].as_ref().map(|b| b.col))
                    .unwrap_or(0)
            })
            .sum()
    }
    fn spmv(&self, alpha: Precision, x: &[Precision], y: &mut [Precision]) -> Result<()> {
        BlockCsr::spmv(self, alpha, x, y)
    }
}

/// Tagged union over the schemas the Krylov engine and AMG cycle operate on
/// directly (CSR, BSR, STR, block-CSR-of-CSR); CSRL and COO are
/// conversion/vectorization formats rather than solve-time operators, so
/// they are reached through [`Csr`] conversion rather than a variant here.
#[derive(Debug, Clone)]
pub enum AnyMatrix {
    /// Compressed sparse row.
    Csr(Csr),
    /// Block compressed sparse row.
    Bsr(Bsr),
    /// Structured banded.
    Str(Str),
    /// Two-level block-CSR-of-CSR.
    BlockCsr(BlockCsr),
}

impl SparseOp for AnyMatrix {
    fn rows(&self) -> usize {
        match self {
            AnyMatrix::Csr(m) => m.rows(),
            AnyMatrix::Bsr(m) => m.rows(),
            AnyMatrix::Str(m) => m.rows(),
            AnyMatrix::BlockCsr(m) => m.rows(),
        }
    }
    fn cols(&self) -> usize {
        match self {
            AnyMatrix::Csr(m) => m.cols(),
            AnyMatrix::Bsr(m) => m.cols(),
            AnyMatrix::Str(m) => m.cols(),
            AnyMatrix::BlockCsr(m) => m.cols(),
        }
    }
    fn spmv(&self, alpha: Precision, x: &[Precision], y: &mut [Precision]) -> Result<()> {
        match self {
            AnyMatrix::Csr(m) => m.spmv(alpha, x, y),
            AnyMatrix::Bsr(m) => m.spmv(alpha, x, y),
            AnyMatrix::Str(m) => m.spmv(alpha, x, y),
            AnyMatrix::BlockCsr(m) => m.spmv(alpha, x, y),
        }
    }
}

impl AnyMatrix {
    /// Borrow the CSR representation directly, converting on the fly for
    /// schemas that are not already CSR. Used by AMG setup, which always
    /// operates on CSR.
    pub fn to_csr(&self) -> Result<Csr> {
        match self {
            AnyMatrix::Csr(m) => Ok(m.clone()),
            AnyMatrix::Bsr(m) => m.to_csr(),
            AnyMatrix::Str(m) => m.to_csr(),
            AnyMatrix::BlockCsr(_) => Err(crate::error::SolverError::AlgorithmError {
                component: "AnyMatrix::to_csr".to_string(),
                message: "block-CSR-of-CSR has no single flat CSR representation".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matrix_dispatches_to_underlying_spmv() {
        let csr = Coo::from_triplets(2, 2, vec![(0, 0, 2.0), (1, 1, 3.0)]).to_csr().unwrap();
        let any = AnyMatrix::Csr(csr);
        let x = vec![1.0, 1.0];
        let mut y = vec![0.0; 2];
        any.spmv(1.0, &x, &mut y).unwrap();
        assert_eq!(y, [2.0, 3.0]);
    }
}
