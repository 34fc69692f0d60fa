//! Block-Schwarz smoother (§4.4): each unknown `i` is relaxed jointly with
//! its graph neighbors by solving the small dense subproblem restricted to
//! `{i} u neighbors(i)` exactly, via [`block::invert_lu`], then scattering
//! the local correction back.

use crate::block;
use crate::error::Result;
use crate::matrix::Csr;
use crate::types::Precision;

/// How subdomains are visited during an application sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubdomainOrder {
    /// `0..n` in index order.
    Natural,
    /// A caller-supplied permutation of subdomain (= row) indices.
    UserOrdered(Vec<usize>),
    /// Greedy coloring: subdomains sharing a column with an already-picked
    /// subdomain in the same sweep are deferred to a later color, so a
    /// whole color class can in principle be applied independently.
    GreedyColored,
}

/// A single overlapping subdomain: its member indices and the LU-inverted
/// local dense matrix restricted to those indices (row-major, `len x len`).
struct Subdomain {
    members: Vec<usize>,
    local_inv: Vec<Precision>,
}

/// Precomputed local factorizations for every row's one-ring subdomain.
pub struct SchwarzSetup {
    subdomains: Vec<Subdomain>,
    order: Vec<usize>,
}

impl SchwarzSetup {
    /// Build the subdomain decomposition and factor each local block.
    /// Subdomain `i` is `{i} u {j : a[i][j] != 0 or a[j][i] != 0}`.
    pub fn new(a: &Csr, order: SubdomainOrder) -> Result<Self> {
        let n = a.row;
        let at = a.transpose();
        let mut subdomains = Vec::with_capacity(n);
        for i in 0..n {
            let mut members: Vec<usize> = std::iter::once(i)
                .chain(a.row_entries(i).map(|(j, _)| j))
                .chain(at.row_entries(i).map(|(j, _)| j))
                .collect();
            members.sort_unstable();
            members.dedup();

            let len = members.len();
            let mut local = vec![0.0; len * len];
            for (r, &gr) in members.iter().enumerate() {
                for (c, &gc) in members.iter().enumerate() {
                    if let Some(v) = a.get(gr, gc) {
                        local[r * len + c] = v;
                    }
                }
            }
            block::invert_lu(len, &mut local)?;
            subdomains.push(Subdomain { members, local_inv: local });
        }

        let visit_order = match order {
            SubdomainOrder::Natural => (0..n).collect(),
            SubdomainOrder::UserOrdered(perm) => perm,
            SubdomainOrder::GreedyColored => greedy_color_order(a),
        };

        Ok(Self { subdomains, order: visit_order })
    }

    /// One multiplicative Schwarz sweep: for each subdomain (in setup
    /// order), solve the local residual problem exactly and overwrite the
    /// subdomain's unknowns in `x`.
    pub fn apply(&self, a: &Csr, b: &[Precision], x: &mut [Precision], sweeps: usize) -> Result<()> {
        let n = a.row;
        for _ in 0..sweeps {
            let mut r = b.to_vec();
            a.spmv(-1.0, x, &mut r)?;
            for &s in &self.order {
                let sub = &self.subdomains[s];
                let len = sub.members.len();
                let local_r: Vec<Precision> = sub.members.iter().map(|&m| r[m]).collect();
                let mut correction = vec![0.0; len];
                block::matvec(len, &sub.local_inv, &local_r, &mut correction);
                for (k, &m) in sub.members.iter().enumerate() {
                    x[m] += correction[k];
                }
                // Refresh the residual against the updated iterate before
                // the next subdomain (multiplicative, not additive, Schwarz).
                r = b.to_vec();
                a.spmv(-1.0, x, &mut r)?;
            }
        }
        let _ = n;
        Ok(())
    }
}

/// Greedy graph coloring of subdomain indices by adjacency, so that
/// subdomains of the same color can be visited (and, outside this crate's
/// scope, applied in parallel) without interfering.
fn greedy_color_order(a: &Csr) -> Vec<usize> {
    let n = a.row;
    let mut color = vec![usize::MAX; n];
    let mut order = Vec::with_capacity(n);
    for i in 0..n {
        let mut used = std::collections::HashSet::new();
        for (j, _) in a.row_entries(i) {
            if color[j] != usize::MAX {
                used.insert(color[j]);
            }
        }
        let mut c = 0;
        while used.contains(&c) {
            c += 1;
        }
        color[i] = c;
    }
    let max_color = color.iter().copied().max().unwrap_or(0);
    for c in 0..=max_color {
        for i in 0..n {
            if color[i] == c {
                order.push(i);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Coo;

    fn laplacian(n: usize) -> Csr {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 2.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                t.push((i, i + 1, -1.0));
            }
        }
        Coo::from_triplets(n, n, t).to_csr().unwrap()
    }

    #[test]
    fn natural_order_reduces_residual() {
        let a = laplacian(12);
        let b = vec![1.0; 12];
        let mut x = vec![0.0; 12];
        let setup = SchwarzSetup::new(&a, SubdomainOrder::Natural).unwrap();
        let r0 = {
            let mut r = b.clone();
            a.spmv(-1.0, &x, &mut r).unwrap();
            crate::vecalg::norm2(&r)
        };
        setup.apply(&a, &b, &mut x, 15).unwrap();
        let r1 = {
            let mut r = b.clone();
            a.spmv(-1.0, &x, &mut r).unwrap();
            crate::vecalg::norm2(&r)
        };
        assert!(r1 < r0 * 0.1);
    }

    #[test]
    fn greedy_colored_order_is_a_permutation() {
        let a = laplacian(9);
        let setup = SchwarzSetup::new(&a, SubdomainOrder::GreedyColored).unwrap();
        let mut seen: Vec<usize> = setup.order.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn user_ordered_subdomains_still_converge() {
        let a = laplacian(6);
        let b = vec![1.0; 6];
        let mut x = vec![0.0; 6];
        let perm: Vec<usize> = (0..6).rev().collect();
        let setup = SchwarzSetup::new(&a, SubdomainOrder::UserOrdered(perm)).unwrap();
        setup.apply(&a, &b, &mut x, 15).unwrap();
        let mut r = b.clone();
        a.spmv(-1.0, &x, &mut r).unwrap();
        assert!(crate::vecalg::norm2(&r) < 1e-6);
    }
}
