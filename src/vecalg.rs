//! Vector algebra kernels over contiguous real arrays (C2).
//!
//! Every operation is length-parameterized and returns
//! [`SolverError::DimensionMismatch`] rather than panicking when its
//! operands disagree. Loop bodies are written as plain iterator chains so
//! that, under the `parallel` feature, callers needing a fork-join variant
//! can swap in `rayon`'s `par_iter`/`par_chunks` without changing behavior —
//! reductions here already use a single linear fold, matching the
//! deterministic fixed-tree-shape requirement of §5.

use crate::error::{Result, SolverError};
use crate::types::Precision;

fn check_len(a: usize, b: usize, operation: &str) -> Result<()> {
    if a != b {
        return Err(SolverError::DimensionMismatch {
            expected: a,
            actual: b,
            operation: operation.to_string(),
        });
    }
    Ok(())
}

/// `y <- alpha * x + y`
pub fn axpy(alpha: Precision, x: &[Precision], y: &mut [Precision]) -> Result<()> {
    check_len(x.len(), y.len(), "axpy")?;
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
    Ok(())
}

/// `z <- alpha * x + y`
pub fn axpyz(alpha: Precision, x: &[Precision], y: &[Precision], z: &mut [Precision]) -> Result<()> {
    check_len(x.len(), y.len(), "axpyz")?;
    check_len(x.len(), z.len(), "axpyz")?;
    for ((zi, &xi), &yi) in z.iter_mut().zip(x.iter()).zip(y.iter()) {
        *zi = alpha * xi + yi;
    }
    Ok(())
}

/// `y <- alpha * x + beta * y`
pub fn axpby(alpha: Precision, x: &[Precision], beta: Precision, y: &mut [Precision]) -> Result<()> {
    check_len(x.len(), y.len(), "axpby")?;
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi = alpha * xi + beta * *yi;
    }
    Ok(())
}

/// `x <- alpha * x`
pub fn scale(alpha: Precision, x: &mut [Precision]) {
    for xi in x.iter_mut() {
        *xi *= alpha;
    }
}

/// `<x, y>`
pub fn dot(x: &[Precision], y: &[Precision]) -> Result<Precision> {
    check_len(x.len(), y.len(), "dot")?;
    Ok(x.iter().zip(y.iter()).map(|(&a, &b)| a * b).sum())
}

/// `||x||_1`
pub fn norm1(x: &[Precision]) -> Precision {
    x.iter().map(|v| v.abs()).sum()
}

/// `||x||_2`
pub fn norm2(x: &[Precision]) -> Precision {
    x.iter().map(|v| v * v).sum::<Precision>().sqrt()
}

/// `||x||_inf`
pub fn norm_inf(x: &[Precision]) -> Precision {
    x.iter().fold(0.0, |acc, v| acc.max(v.abs()))
}

/// `dst <- src`
pub fn copy(src: &[Precision], dst: &mut [Precision]) -> Result<()> {
    check_len(src.len(), dst.len(), "copy")?;
    dst.copy_from_slice(src);
    Ok(())
}

/// `x <- 0`
pub fn zero(x: &mut [Precision]) {
    x.iter_mut().for_each(|v| *v = 0.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axpy_accumulates() {
        let x = [1.0, 2.0, 3.0];
        let mut y = [1.0, 1.0, 1.0];
        axpy(2.0, &x, &mut y).unwrap();
        assert_eq!(y, [3.0, 5.0, 7.0]);
    }

    #[test]
    fn mismatched_lengths_are_reported() {
        let x = [1.0, 2.0];
        let mut y = [1.0, 1.0, 1.0];
        let err = axpy(1.0, &x, &mut y).unwrap_err();
        assert!(matches!(err, SolverError::DimensionMismatch { .. }));
    }

    #[test]
    fn norms() {
        let x = [3.0, -4.0];
        assert_eq!(norm1(&x), 7.0);
        assert_eq!(norm2(&x), 5.0);
        assert_eq!(norm_inf(&x), 4.0);
    }

    #[test]
    fn dot_product() {
        assert_eq!(dot(&[1.0, 2.0], &[3.0, 4.0]).unwrap(), 11.0);
    }
}
