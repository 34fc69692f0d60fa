//! Structured, grid-aligned banded storage (§3) — used for matrices arising
//! from regular finite-difference stencils on an `nx x ny x nz` grid.

use super::csr::Csr;
use crate::block;
use crate::error::{Result, SolverError};
use crate::types::Precision;

/// Structured banded matrix. Each grid point carries an `nc x nc` block;
/// `diag` stores all diagonal blocks consecutively. Each off-diagonal band
/// at offset `d` (positive or negative) stores blocks at grid-index pairs
/// `(i, i+d)` for `max(0,-d) <= i < min(ngrid, ngrid-d)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Str {
    /// Grid extent in x.
    pub nx: usize,
    /// Grid extent in y.
    pub ny: usize,
    /// Grid extent in z.
    pub nz: usize,
    /// Block size at each grid point.
    pub nc: usize,
    /// Band offsets (distinct, `|offset| < ngrid`).
    pub offsets: Vec<i64>,
    /// Diagonal blocks, length `ngrid * nc^2`.
    pub diag: Vec<Precision>,
    /// Off-diagonal band values; band `b` has length `(ngrid - |offsets[b]|) * nc^2`.
    pub offdiag: Vec<Vec<Precision>>,
}

impl Str {
    /// `nx * ny * nz`.
    pub fn ngrid(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// `nx * ny`, the xy-plane size used to compute 3-D band offsets.
    pub fn nxy(&self) -> usize {
        self.nx * self.ny
    }

    /// Validate storage invariants (§3).
    pub fn try_new(
        nx: usize,
        ny: usize,
        nz: usize,
        nc: usize,
        offsets: Vec<i64>,
        diag: Vec<Precision>,
        offdiag: Vec<Vec<Precision>>,
    ) -> Result<Self> {
        let ngrid = nx * ny * nz;
        if diag.len() != ngrid * nc * nc {
            return Err(SolverError::InvalidSparseMatrix {
                reason: format!("str diag length {} != ngrid*nc^2 = {}", diag.len(), ngrid * nc * nc),
                position: None,
            });
        }
        if offsets.len() != offdiag.len() {
            return Err(SolverError::InvalidSparseMatrix {
                reason: "str offsets and offdiag band count disagree".to_string(),
                position: None,
            });
        }
        let mut seen = std::collections::HashSet::new();
        for (b, &d) in offsets.iter().enumerate() {
            if d.unsigned_abs() as usize >= ngrid {
                return Err(SolverError::InvalidSparseMatrix {
                    reason: format!("band offset {d} exceeds ngrid {ngrid}"),
                    position: None,
                });
            }
            if !seen.insert(d) {
                return Err(SolverError::InvalidSparseMatrix {
                    reason: format!("duplicate band offset {d}"),
                    position: None,
                });
            }
            let expected = (ngrid - d.unsigned_abs() as usize) * nc * nc;
            if offdiag[b].len() != expected {
                return Err(SolverError::InvalidSparseMatrix {
                    reason: format!("band {d} has length {} but expected {expected}", offdiag[b].len()),
                    position: None,
                });
            }
        }
        Ok(Self {
            nx,
            ny,
            nz,
            nc,
            offsets,
            diag,
            offdiag,
        })
    }

    /// `y <- alpha * A * x + y` (§4.3): iterates band by band, each storing
    /// the `(i, i+d)` pair list; never reads out of `[0, ngrid)` at band
    /// edges because the loop bound is `max(0,-d)..min(ngrid, ngrid-d)`.
    pub fn spmv(&self, alpha: Precision, x: &[Precision], y: &mut [Precision]) -> Result<()> {
        let ngrid = self.ngrid();
        let nc = self.nc;
        if x.len() != ngrid * nc || y.len() != ngrid * nc {
            return Err(SolverError::DimensionMismatch {
                expected: ngrid * nc,
                actual: x.len(),
                operation: "Str::spmv".to_string(),
            });
        }
        let mut acc = vec![0.0; nc];
        for i in 0..ngrid {
            let blk = &self.diag[i * nc * nc..(i + 1) * nc * nc];
            block::matvec(nc, blk, &x[i * nc..i * nc + nc], &mut acc);
            for r in 0..nc {
                y[i * nc + r] += alpha * acc[r];
            }
        }
        for (b, &d) in self.offsets.iter().enumerate() {
            let lo = (-d).max(0) as usize;
            let hi = (ngrid as i64).min(ngrid as i64 - d) as usize;
            let band = &self.offdiag[b];
            for i in lo..hi {
                let other = (i as i64 + d) as usize;
                let k = i - lo;
                let blk = &band[k * nc * nc..(k + 1) * nc * nc];
                block::matvec(nc, blk, &x[other * nc..other * nc + nc], &mut acc);
                for r in 0..nc {
                    y[i * nc + r] += alpha * acc[r];
                }
            }
        }
        Ok(())
    }

    /// Dense diagonal entries (the block-diagonal's own diagonal elements).
    pub fn diagonal(&self) -> Vec<Precision> {
        let ngrid = self.ngrid();
        let nc = self.nc;
        let mut d = vec![0.0; ngrid * nc];
        for i in 0..ngrid {
            for c in 0..nc {
                d[i * nc + c] = self.diag[i * nc * nc + c * nc + c];
            }
        }
        d
    }

    /// Expand to an equivalent CSR matrix over the `ngrid*nc` unblocked index space.
    pub fn to_csr(&self) -> Result<Csr> {
        let ngrid = self.ngrid();
        let nc = self.nc;
        let n = ngrid * nc;
        let mut rows: Vec<Vec<(usize, Precision)>> = vec![Vec::new(); n];
        for i in 0..ngrid {
            let blk = &self.diag[i * nc * nc..(i + 1) * nc * nc];
            for r in 0..nc {
                for c in 0..nc {
                    let v = blk[r * nc + c];
                    if v != 0.0 {
                        rows[i * nc + r].push((i * nc + c, v));
                    }
                }
            }
        }
        for (b, &d) in self.offsets.iter().enumerate() {
            let lo = (-d).max(0) as usize;
            let hi = (ngrid as i64).min(ngrid as i64 - d) as usize;
            let band = &self.offdiag[b];
            for i in lo..hi {
                let other = (i as i64 + d) as usize;
                let k = i - lo;
                let blk = &band[k * nc * nc..(k + 1) * nc * nc];
                for r in 0..nc {
                    for c in 0..nc {
                        let v = blk[r * nc + c];
                        if v != 0.0 {
                            rows[i * nc + r].push((other * nc + c, v));
                        }
                    }
                }
            }
        }
        let mut ia = vec![0 as crate::types::Index; n + 1];
        let mut ja = Vec::new();
        let mut val = Vec::new();
        for (i, row) in rows.into_iter().enumerate() {
            for (c, v) in row {
                ja.push(c as crate::types::Index);
                val.push(v);
            }
            ia[i + 1] = ja.len() as crate::types::Index;
        }
        Csr::try_new(n, n, ia, ja, val)
    }
}
