//! Coarse/fine splitting (§4.6), grounded in `form_coarse_level` and the
//! two-phase commented "Coarsening Phase ONE/TWO" structure of
//! `core/src/coarsening_rs.c`.

use super::strength::Strength;
use crate::error::Result;
use crate::matrix::Csr;
use crate::smoother;
use crate::types::Precision;
use std::collections::VecDeque;

/// Per-vertex CF marker (`ISPT`/`UNPT`/`FGPT`/`CGPT` in the source).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfMark {
    Coarse,
    Fine,
    Isolated,
}

impl CfMark {
    pub fn is_coarse(self) -> bool {
        matches!(self, CfMark::Coarse)
    }
}

/// Max-first bucket queue over λ-measures (the source's doubly linked
/// "list of lists"): `pop_max` returns the most-recently-entered vertex
/// among those with the largest λ (LIFO within a bucket).
struct BucketQueue {
    buckets: Vec<VecDeque<usize>>,
    location: Vec<Option<usize>>,
    max_lambda: usize,
}

impl BucketQueue {
    fn new(n: usize) -> Self {
        Self { buckets: vec![VecDeque::new(); n + 1], location: vec![None; n], max_lambda: 0 }
    }

    fn insert(&mut self, lambda: usize, v: usize) {
        self.buckets[lambda].push_front(v);
        self.location[v] = Some(lambda);
        self.max_lambda = self.max_lambda.max(lambda);
    }

    fn remove(&mut self, v: usize) {
        if let Some(l) = self.location[v].take() {
            if let Some(pos) = self.buckets[l].iter().position(|&x| x == v) {
                self.buckets[l].remove(pos);
            }
        }
    }

    fn pop_max(&mut self) -> Option<usize> {
        while self.max_lambda > 0 && self.buckets[self.max_lambda].is_empty() {
            self.max_lambda -= 1;
        }
        if self.buckets[self.max_lambda].is_empty() {
            return None;
        }
        let v = self.buckets[self.max_lambda].pop_front().unwrap();
        self.location[v] = None;
        Some(v)
    }
}

/// Classical two-pass Ruge-Stuben CF-splitting.
pub fn cf_splitting_rs(a: &Csr, s: &Strength) -> Vec<CfMark> {
    let n = a.row;
    let st = s.transpose();

    let mut lambda: Vec<i64> = (0..n).map(|i| st.row(i).len() as i64).collect();
    let mut mark = vec![CfMark::Fine; n];
    let mut undecided = vec![true; n];
    let mut num_left = 0usize;

    for i in 0..n {
        if a.row_entries(i).count() <= 1 {
            mark[i] = CfMark::Isolated;
            undecided[i] = false;
            lambda[i] = 0;
        } else {
            num_left += 1;
        }
    }

    let mut queue = BucketQueue::new(n);

    // Seed the bucket queue; vertices with non-positive measure become F
    // immediately, propagating λ increments to their own dependencies.
    for i in 0..n {
        if mark[i] == CfMark::Isolated {
            continue;
        }
        if lambda[i] > 0 {
            queue.insert(lambda[i] as usize, i);
        } else {
            undecided[i] = false;
            num_left -= 1;
            for &j in s.row(i) {
                if mark[j] == CfMark::Isolated || !undecided[j] {
                    continue;
                }
                if j < i {
                    queue.remove(j);
                    lambda[j] += 1;
                    queue.insert(lambda[j] as usize, j);
                } else {
                    lambda[j] += 1;
                }
            }
        }
    }

    while num_left > 0 {
        let Some(maxnode) = queue.pop_max() else { break };
        mark[maxnode] = CfMark::Coarse;
        undecided[maxnode] = false;
        lambda[maxnode] = 0;
        num_left -= 1;

        for &j in st.row(maxnode) {
            if !undecided[j] {
                continue;
            }
            mark[j] = CfMark::Fine;
            undecided[j] = false;
            queue.remove(j);
            num_left -= 1;
            for &k in s.row(j) {
                if undecided[k] {
                    queue.remove(k);
                    lambda[k] += 1;
                    queue.insert(lambda[k] as usize, k);
                }
            }
        }

        for &j in s.row(maxnode) {
            if !undecided[j] {
                continue;
            }
            queue.remove(j);
            lambda[j] -= 1;
            if lambda[j] > 0 {
                queue.insert(lambda[j] as usize, j);
            } else {
                mark[j] = CfMark::Fine;
                undecided[j] = false;
                num_left -= 1;
                for &k in s.row(j) {
                    if undecided[k] {
                        queue.remove(k);
                        lambda[k] += 1;
                        queue.insert(lambda[k] as usize, k);
                    }
                }
            }
        }
    }

    // Pass 2: every F-point must share a common coarse neighbor with each
    // of its strong F-neighbors; otherwise promote a candidate to coarse.
    // `i` is reprocessed (not advanced) right after its first promotion,
    // since that promotion can turn a previously-failing pair into a
    // passing one once the new coarse point is registered in `graph_of`.
    let mut graph_of: Vec<i64> = vec![-1; n];
    let mut i = 0usize;
    while i < n {
        if mark[i] != CfMark::Fine {
            i += 1;
            continue;
        }
        for &j in s.row(i) {
            if mark[j] == CfMark::Coarse {
                graph_of[j] = i as i64;
            }
        }

        let mut reprocess = false;
        for &j in s.row(i) {
            if mark[j] != CfMark::Fine {
                continue;
            }
            let has_common = s.row(j).iter().any(|&k| graph_of[k] == i as i64);
            if has_common {
                continue;
            }
            mark[j] = CfMark::Coarse;
            reprocess = true;
            break;
        }
        if reprocess {
            continue;
        }
        i += 1;
    }

    mark
}

/// Compatible-relaxation splitting (§4.6): start from an alternating
/// guess and greedily flip a fine point to coarse wherever it still fails
/// the CR contraction threshold, until the splitting is adequate or no
/// more flips help.
pub fn cf_splitting_cr(a: &Csr, threshold: Precision, sweeps: usize) -> Result<Vec<CfMark>> {
    let n = a.row;
    let mut is_coarse: Vec<bool> = (0..n).map(|i| i % 2 == 0).collect();

    let mut guard = 0usize;
    while !smoother::is_splitting_adequate(a, &is_coarse, threshold, sweeps)? && guard < n {
        let worst = (0..n)
            .filter(|&i| !is_coarse[i])
            .max_by(|&i, &j| {
                let ri: Precision = a.row_entries(i).map(|(_, v)| v.abs()).sum();
                let rj: Precision = a.row_entries(j).map(|(_, v)| v.abs()).sum();
                ri.partial_cmp(&rj).unwrap()
            });
        match worst {
            Some(i) => is_coarse[i] = true,
            None => break,
        }
        guard += 1;
    }

    Ok(is_coarse
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            if a.row_entries(i).count() <= 1 {
                CfMark::Isolated
            } else if c {
                CfMark::Coarse
            } else {
                CfMark::Fine
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Coo;
    use crate::params::StrengthPolicy;

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
    fn rs_splitting_has_no_two_adjacent_fine_points_without_common_coarse() {
        let a = laplacian(20);
        let s = super::super::strength::generate_s(&a, StrengthPolicy::Modified, 0.25, 0.9);
        let mark = cf_splitting_rs(&a, &s);
        let num_coarse = mark.iter().filter(|m| m.is_coarse()).count();
        assert!(num_coarse > 0 && num_coarse < 20);
        for i in 0..20 {
            if mark[i] != CfMark::Fine {
                continue;
            }
            for &j in s.row(i) {
                if mark[j] != CfMark::Fine {
                    continue;
                }
                let common = s.row(i).iter().any(|&k| mark[k] == CfMark::Coarse && s.row(j).contains(&k));
                assert!(common, "F-points {i} and {j} share no common coarse neighbor");
            }
        }
    }

    #[test]
    fn rs_splitting_has_no_two_adjacent_fine_points_without_common_coarse_at_scale() {
        let a = laplacian(800);
        let s = super::super::strength::generate_s(&a, StrengthPolicy::Modified, 0.25, 0.9);
        let mark = cf_splitting_rs(&a, &s);
        for i in 0..800 {
            if mark[i] != CfMark::Fine {
                continue;
            }
            for &j in s.row(i) {
                if mark[j] != CfMark::Fine {
                    continue;
                }
                let common = s.row(i).iter().any(|&k| mark[k] == CfMark::Coarse && s.row(j).contains(&k));
                assert!(common, "F-points {i} and {j} share no common coarse neighbor");
            }
        }
    }

    #[test]
    fn cr_splitting_is_adequate() {
        let a = laplacian(16);
        let mark = cf_splitting_cr(&a, 0.8, 4).unwrap();
        let is_coarse: Vec<bool> = mark.iter().map(|m| m.is_coarse()).collect();
        assert!(smoother::is_splitting_adequate(&a, &is_coarse, 0.8, 4).unwrap());
    }
}
