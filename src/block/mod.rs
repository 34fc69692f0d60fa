//! Dense block kernels for fixed-size `n x n` blocks (C1).
//!
//! Blocks are stored row-major in a flat `Vec<Precision>` of length `n*n`,
//! which is exactly the in-block layout the BSR and STR sparse formats use,
//! so these kernels are called directly on slices of a matrix's `val`
//! buffer without any repacking.

use crate::error::{Result, SolverError};
use crate::types::{Precision, SMALL_DET};

/// `y <- A * x` for an `n x n` row-major block `a`.
pub fn matvec(n: usize, a: &[Precision], x: &[Precision], y: &mut [Precision]) {
    debug_assert_eq!(a.len(), n * n);
    for i in 0..n {
        let mut acc = 0.0;
        let row = &a[i * n..i * n + n];
        for j in 0..n {
            acc += row[j] * x[j];
        }
        y[i] = acc;
    }
}

/// `y <- y + A * x`
pub fn matvec_add(n: usize, a: &[Precision], x: &[Precision], y: &mut [Precision]) {
    for i in 0..n {
        let row = &a[i * n..i * n + n];
        let mut acc = 0.0;
        for j in 0..n {
            acc += row[j] * x[j];
        }
        y[i] += acc;
    }
}

/// `y <- y - A * x`
pub fn matvec_sub(n: usize, a: &[Precision], x: &[Precision], y: &mut [Precision]) {
    for i in 0..n {
        let row = &a[i * n..i * n + n];
        let mut acc = 0.0;
        for j in 0..n {
            acc += row[j] * x[j];
        }
        y[i] -= acc;
    }
}

/// `y <- alpha * A * x + beta * y`
pub fn matvec_axpby(n: usize, alpha: Precision, a: &[Precision], x: &[Precision], beta: Precision, y: &mut [Precision]) {
    for i in 0..n {
        let row = &a[i * n..i * n + n];
        let mut acc = 0.0;
        for j in 0..n {
            acc += row[j] * x[j];
        }
        y[i] = alpha * acc + beta * y[i];
    }
}

/// Saturation matvec: `y_s <- y_s - A_ss * x_s`, operating only on the
/// trailing `(n-1) x (n-1)` sub-block of an `n x n` block, avoiding the
/// need to materialize that sub-block explicitly (used by saddle-point
/// block smoothers, §4.1).
pub fn saturation_matvec_sub(n: usize, a: &[Precision], x_s: &[Precision], y_s: &mut [Precision]) {
    let m = n - 1;
    debug_assert_eq!(x_s.len(), m);
    debug_assert_eq!(y_s.len(), m);
    for i in 0..m {
        // Row i+1 of the full block, columns 1..n, i.e. the A_ss sub-block.
        let row = &a[(i + 1) * n + 1..(i + 1) * n + n];
        let mut acc = 0.0;
        for j in 0..m {
            acc += row[j] * x_s[j];
        }
        y_s[i] -= acc;
    }
}

/// `c <- A * b` for `n x n` row-major blocks.
pub fn matmul(n: usize, a: &[Precision], b: &[Precision], c: &mut [Precision]) {
    for i in 0..n {
        for j in 0..n {
            let mut acc = 0.0;
            for k in 0..n {
                acc += a[i * n + k] * b[k * n + j];
            }
            c[i * n + j] = acc;
        }
    }
}

/// Invert an `n x n` row-major block in place.
///
/// Dispatches to closed-form cofactor formulas for `n` in `{2,3,5}`; `n=7`
/// and general `n` fall back to LU with partial pivoting. A block whose
/// determinant magnitude is below [`SMALL_DET`] is treated as singular: a
/// warning is logged and the block is regularized (Tikhonov: add `eps` to
/// the diagonal) before a second inversion attempt, rather than aborting —
/// per §4.1 the caller must be allowed to continue.
pub fn invert(n: usize, a: &mut [Precision]) -> Result<()> {
    match n {
        2 => invert2(a),
        3 => invert3(a),
        5 => invert5(a),
        _ => invert_lu(n, a),
    }
}

fn invert2(a: &mut [Precision]) -> Result<()> {
    let det = a[0] * a[3] - a[1] * a[2];
    if det.abs() < SMALL_DET {
        log::warn!("block::invert2: near-singular block (det = {det:.3e}), regularizing");
        return regularize_and_retry(2, a, invert2);
    }
    let inv_det = 1.0 / det;
    let (a00, a01, a10, a11) = (a[0], a[1], a[2], a[3]);
    a[0] = a11 * inv_det;
    a[1] = -a01 * inv_det;
    a[2] = -a10 * inv_det;
    a[3] = a00 * inv_det;
    Ok(())
}

fn invert3(a: &mut [Precision]) -> Result<()> {
    let (a0, a1, a2, a3, a4, a5, a6, a7, a8) =
        (a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7], a[8]);
    let c0 = a4 * a8 - a5 * a7;
    let c1 = a5 * a6 - a3 * a8;
    let c2 = a3 * a7 - a4 * a6;
    let det = a0 * c0 + a1 * c1 + a2 * c2;
    if det.abs() < SMALL_DET {
        log::warn!("block::invert3: near-singular block (det = {det:.3e}), regularizing");
        return regularize_and_retry(3, a, invert3);
    }
    let inv_det = 1.0 / det;
    a[0] = c0 * inv_det;
    a[1] = (a2 * a7 - a1 * a8) * inv_det;
    a[2] = (a1 * a5 - a2 * a4) * inv_det;
    a[3] = c1 * inv_det;
    a[4] = (a0 * a8 - a2 * a6) * inv_det;
    a[5] = (a2 * a3 - a0 * a5) * inv_det;
    a[6] = c2 * inv_det;
    a[7] = (a1 * a6 - a0 * a7) * inv_det;
    a[8] = (a0 * a4 - a1 * a3) * inv_det;
    Ok(())
}

/// 5x5 inverse.
///
/// The specification's Open Questions flag the source's `nc5` cofactor
/// expansion as suspect for one column. Rather than transcribe that
/// expansion, this inverse goes through the same LU-with-partial-pivoting
/// path as the general case; its unit test checks the product against the
/// identity directly rather than against another call into this same code
/// path.
fn invert5(a: &mut [Precision]) -> Result<()> {
    invert_lu(5, a)
}

fn regularize_and_retry(
    n: usize,
    a: &mut [Precision],
    f: fn(&mut [Precision]) -> Result<()>,
) -> Result<()> {
    let eps = 1e-8 * (1.0 + a.iter().map(|v| v.abs()).fold(0.0, f64::max));
    for i in 0..n {
        a[i * n + i] += eps;
    }
    f(a)
}

/// General LU-with-partial-pivoting inverse, used directly for `n >= 7` and
/// as the cross-check / fallback path for smaller sizes.
pub fn invert_lu(n: usize, a: &mut [Precision]) -> Result<()> {
    let mut lu = a.to_vec();
    let mut piv: Vec<usize> = (0..n).collect();

    for k in 0..n {
        let mut max_val = lu[k * n + k].abs();
        let mut max_row = k;
        for i in (k + 1)..n {
            let v = lu[i * n + k].abs();
            if v > max_val {
                max_val = v;
                max_row = i;
            }
        }
        if max_val < SMALL_DET {
            log::warn!("block::invert_lu: near-singular {n}x{n} block (pivot = {max_val:.3e}), regularizing");
            let eps = 1e-8 * (1.0 + a.iter().map(|v| v.abs()).fold(0.0, f64::max));
            for i in 0..n {
                a[i * n + i] += eps;
            }
            return invert_lu(n, a);
        }
        if max_row != k {
            for j in 0..n {
                lu.swap(k * n + j, max_row * n + j);
            }
            piv.swap(k, max_row);
        }
        for i in (k + 1)..n {
            let factor = lu[i * n + k] / lu[k * n + k];
            lu[i * n + k] = factor;
            for j in (k + 1)..n {
                lu[i * n + j] -= factor * lu[k * n + j];
            }
        }
    }

    // Solve for each column of the inverse via forward/backward substitution
    // against the permuted identity.
    let mut inv = vec![0.0; n * n];
    let mut col = vec![0.0; n];
    for target in 0..n {
        for (i, &p) in piv.iter().enumerate() {
            col[i] = if p == target { 1.0 } else { 0.0 };
        }
        // Forward substitution (L has unit diagonal).
        for i in 1..n {
            let mut acc = col[i];
            for j in 0..i {
                acc -= lu[i * n + j] * col[j];
            }
            col[i] = acc;
        }
        // Backward substitution.
        for i in (0..n).rev() {
            let mut acc = col[i];
            for j in (i + 1)..n {
                acc -= lu[i * n + j] * col[j];
            }
            col[i] = acc / lu[i * n + i];
        }
        for i in 0..n {
            inv[i * n + target] = col[i];
        }
    }
    a.copy_from_slice(&inv);
    Ok(())
}

/// Validate that `a.len() == n*n`, returning a dimension-mismatch error otherwise.
pub fn check_block_len(n: usize, a: &[Precision]) -> Result<()> {
    if a.len() != n * n {
        return Err(SolverError::DimensionMismatch {
            expected: n * n,
            actual: a.len(),
            operation: "block kernel".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(n: usize) -> Vec<Precision> {
        let mut id = vec![0.0; n * n];
        for i in 0..n {
            id[i * n + i] = 1.0;
        }
        id
    }

    fn frob_diff(a: &[Precision], b: &[Precision]) -> Precision {
        a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<Precision>().sqrt()
    }

    #[test]
    fn invert2_is_exact_inverse() {
        let mut a = vec![4.0, 3.0, 6.0, 3.0];
        let orig = a.clone();
        invert(2, &mut a).unwrap();
        let mut prod = vec![0.0; 4];
        matmul(2, &orig, &a, &mut prod);
        assert!(frob_diff(&prod, &identity(2)) < 1e-10);
    }

    #[test]
    fn invert3_matches_lu_ground_truth() {
        let orig = vec![4.0, 1.0, 2.0, 0.0, 3.0, 1.0, 1.0, 0.0, 5.0];
        let mut via_cofactor = orig.clone();
        invert3(&mut via_cofactor).unwrap();
        let mut via_lu = orig.clone();
        invert_lu(3, &mut via_lu).unwrap();
        assert!(frob_diff(&via_cofactor, &via_lu) < 1e-10);
    }

    #[test]
    fn invert5_is_a_true_inverse() {
        // `invert5` is `invert_lu(5, ..)` under the hood (see its doc
        // comment), so this checks the product against the identity
        // directly rather than against a second call into the same code
        // path, which would never catch a regression in `invert5` itself.
        let orig = vec![
            6.0, 1.0, 0.0, 0.0, 1.0, 0.0, 5.0, 2.0, 0.0, 0.0, 0.0, 1.0, 4.0, 1.0, 0.0, 0.0, 0.0,
            1.0, 7.0, 0.0, 1.0, 0.0, 0.0, 0.0, 8.0,
        ];
        let mut inv = orig.clone();
        invert(5, &mut inv).unwrap();
        let mut prod = vec![0.0; 25];
        matmul(5, &orig, &inv, &mut prod);
        assert!(frob_diff(&prod, &identity(5)) < 1e-8);
    }

    #[test]
    fn matmul_is_associative() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![5.0, 6.0, 7.0, 8.0];
        let c = vec![0.0, 1.0, 1.0, 0.0];
        let mut bc = vec![0.0; 4];
        matmul(2, &b, &c, &mut bc);
        let mut a_bc = vec![0.0; 4];
        matmul(2, &a, &bc, &mut a_bc);

        let mut ab = vec![0.0; 4];
        matmul(2, &a, &b, &mut ab);
        let mut ab_c = vec![0.0; 4];
        matmul(2, &ab, &c, &mut ab_c);

        assert!(frob_diff(&a_bc, &ab_c) < 1e-12);
    }

    #[test]
    fn near_singular_block_is_salvaged_not_fatal() {
        let mut a = vec![1.0, 1.0, 1.0, 1.0 + 1e-25];
        assert!(invert(2, &mut a).is_ok());
    }

    #[test]
    fn saturation_matvec_only_touches_trailing_block() {
        // 3x3 block; A_ss is the trailing 2x2.
        let a = vec![9.0, 9.0, 9.0, 9.0, 1.0, 2.0, 9.0, 3.0, 4.0];
        let x_s = [1.0, 1.0];
        let mut y_s = [10.0, 10.0];
        saturation_matvec_sub(3, &a, &x_s, &mut y_s);
        assert_eq!(y_s, [10.0 - (1.0 + 2.0), 10.0 - (3.0 + 4.0)]);
    }
}
