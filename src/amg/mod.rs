//! Algebraic Multigrid: setup (C6) and cycling (C7), §4.6-4.7.
//!
//! [`AmgHierarchy::setup`] builds the level sequence (strength graph,
//! CF-splitting, interpolation, Galerkin coarsening) down to a coarsest
//! level small enough to factor directly; [`AmgHierarchy::cycle`] runs
//! one V/W/FMG/nonlinear-AMLI cycle in place, and
//! [`AmgPreconditioner`] wraps the hierarchy as a [`crate::solver::Preconditioner`]
//! so it can drive a CG or GMRES outer loop.

pub mod coarsen;
pub mod interpolation;
pub mod splitting;
pub mod strength;

use crate::block;
use crate::error::{Result, SolverError};
use crate::matrix::Csr;
use crate::params::{AmgParam, CycleType, SmootherKind};
use crate::smoother::{gauss_seidel, ilu::IluSetup, jacobi::JacobiSetup, poly::PolySetup, sor};
use crate::solver::{self, Preconditioner};
use crate::types::{Precision, SweepOrder, SMALLREAL};
use crate::vecalg;

/// One level of the hierarchy: its operator, the interpolation to the
/// next coarser level (`None` at the coarsest), and reusable scratch
/// vectors (§4.7's "the cycle leaves them in a reset state" contract).
struct Level {
    a: Csr,
    p: Option<Csr>,
    x: Vec<Precision>,
    b: Vec<Precision>,
}

impl Level {
    fn n(&self) -> usize {
        self.a.row
    }
}

/// A built multigrid hierarchy, immutable after [`AmgHierarchy::setup`]
/// except for the per-level scratch vectors a cycle writes through.
pub struct AmgHierarchy {
    levels: Vec<Level>,
    param: AmgParam,
    coarsest_lu: Vec<Precision>,
}

impl AmgHierarchy {
    /// Build the full level sequence from the fine-grid operator `a`.
    pub fn setup(a: &Csr, param: &AmgParam) -> Result<Self> {
        let mut levels = Vec::new();
        let mut current = a.clone();

        loop {
            let n = current.row;
            let is_coarsest = n <= param.coarsest_size || levels.len() + 1 >= param.max_levels;
            if is_coarsest {
                levels.push(Level { a: current.clone(), p: None, x: vec![0.0; n], b: vec![0.0; n] });
                break;
            }

            let s = strength::generate_s(&current, param.strength_policy, param.theta_str, param.theta_max);
            let mark = match param.splitting {
                crate::params::SplittingKind::RugeStuben => splitting::cf_splitting_rs(&current, &s),
                crate::params::SplittingKind::CompatibleRelaxation => {
                    splitting::cf_splitting_cr(&current, param.cr_threshold, 2)?
                }
            };
            let num_coarse = mark.iter().filter(|m| m.is_coarse()).count();
            if num_coarse == 0 || num_coarse == n {
                levels.push(Level { a: current.clone(), p: None, x: vec![0.0; n], b: vec![0.0; n] });
                break;
            }

            let p = interpolation::build(&current, &s, &mark)?;
            let coarse_a = coarsen::galerkin(&current, &p)?;

            levels.push(Level { a: current.clone(), p: Some(p), x: vec![0.0; n], b: vec![0.0; n] });
            current = coarse_a;
        }

        let coarsest_n = levels.last().unwrap().n();
        let mut coarsest_lu = vec![0.0; coarsest_n * coarsest_n];
        for (i, row) in coarsest_lu.chunks_mut(coarsest_n).enumerate() {
            for (j, slot) in row.iter_mut().enumerate() {
                *slot = levels.last().unwrap().a.get(i, j).unwrap_or(0.0);
            }
        }
        block::invert_lu(coarsest_n, &mut coarsest_lu)?;

        Ok(Self { levels, param: param.clone(), coarsest_lu })
    }

    /// Number of levels built, coarsest inclusive.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Run one cycle starting from level 0, using `levels[0].b` as the
    /// right-hand side and leaving the correction in `levels[0].x`.
    pub fn cycle(&mut self) -> Result<()> {
        self.cycle_at(0)
    }

    fn cycle_at(&mut self, l: usize) -> Result<()> {
        if l + 1 == self.levels.len() {
            let n = self.levels[l].n();
            let mut x = vec![0.0; n];
            block::matvec(n, &self.coarsest_lu, &self.levels[l].b, &mut x);
            self.levels[l].x = x;
            return Ok(());
        }

        self.presmooth(l)?;

        let n = self.levels[l].n();
        let mut r = self.levels[l].b.clone();
        self.levels[l].a.spmv(-1.0, &self.levels[l].x, &mut r)?;

        let p = self.levels[l].p.as_ref().unwrap();
        let nc = p.col;
        let mut rc = vec![0.0; nc];
        let pt = p.transpose();
        pt.spmv(1.0, &r, &mut rc)?;
        self.levels[l + 1].b = rc;
        self.levels[l + 1].x = vec![0.0; nc];
        let _ = n;

        match self.param.cycle_type {
            CycleType::V => self.cycle_at(l + 1)?,
            CycleType::W => {
                self.cycle_at(l + 1)?;
                self.cycle_at(l + 1)?;
            }
            CycleType::Full => self.fmg_cycle_at(l + 1)?,
            CycleType::NonlinearAmli { degree } => self.nonlinear_amli_at(l + 1, degree)?,
        }

        let p = self.levels[l].p.take().unwrap();
        let correction = self.levels[l + 1].x.clone();
        p.spmv(1.0, &correction, &mut self.levels[l].x)?;
        self.levels[l].p = Some(p);

        self.postsmooth(l)?;
        Ok(())
    }

    fn fmg_cycle_at(&mut self, l: usize) -> Result<()> {
        if l + 1 == self.levels.len() {
            return self.cycle_at(l);
        }
        let n = self.levels[l].n();
        let r = self.levels[l].b.clone();
        let p = self.levels[l].p.as_ref().unwrap();
        let nc = p.col;
        let mut rc = vec![0.0; nc];
        let pt = p.transpose();
        pt.spmv(1.0, &r, &mut rc)?;
        self.levels[l + 1].b = rc;
        self.levels[l + 1].x = vec![0.0; nc];
        self.fmg_cycle_at(l + 1)?;

        let p = self.levels[l].p.as_ref().unwrap();
        let interpolated = self.levels[l + 1].x.clone();
        let mut x0 = vec![0.0; n];
        p.spmv(1.0, &interpolated, &mut x0)?;
        self.levels[l].x = x0;

        self.cycle_at(l)
    }

    /// Nonlinear-AMLI coarse solve: `degree` inner GCG iterations, using
    /// the coarser cycle (§4.7) itself as the (possibly nonlinear)
    /// preconditioner.
    fn nonlinear_amli_at(&mut self, l: usize, degree: usize) -> Result<()> {
        if l + 1 == self.levels.len() {
            return self.cycle_at(l);
        }
        let n = self.levels[l].n();
        let b = self.levels[l].b.clone();
        let a = self.levels[l].a.clone();
        let mut x = vec![0.0; n];
        let mut pc = AmliCoarsePreconditioner { hierarchy: self, level: l + 1 };
        let param = crate::params::ItsParam {
            solver: crate::params::SolverKind::Gcg,
            tolerance: 1e-2,
            max_iterations: degree,
            ..Default::default()
        };
        match solver::gcg::solve(&a, &b, &mut x, &mut pc, &param) {
            Ok(_) | Err(SolverError::MaxIterations { .. }) => {}
            Err(e) => return Err(e),
        }
        self.levels[l].x = x;
        Ok(())
    }

    fn presmooth(&mut self, l: usize) -> Result<()> {
        self.smooth(l, self.param.presmooth_sweeps, true)
    }

    fn postsmooth(&mut self, l: usize) -> Result<()> {
        self.smooth(l, self.param.postsmooth_sweeps, false)
    }

    fn smooth(&mut self, l: usize, sweeps: usize, forward: bool) -> Result<()> {
        let a = self.levels[l].a.clone();
        let b = self.levels[l].b.clone();
        let x = &mut self.levels[l].x;
        match self.param.smoother {
            SmootherKind::Jacobi => JacobiSetup::new(&a)?.apply(&a, &b, x, sweeps),
            SmootherKind::GaussSeidelForward => {
                let order = if forward { SweepOrder::Ascending } else { SweepOrder::Descending };
                gauss_seidel::apply(&a, &b, x, sweeps, &order)
            }
            SmootherKind::GaussSeidelSymmetric => gauss_seidel::apply_symmetric(&a, &b, x, sweeps),
            SmootherKind::Sor => sor::apply(&a, &b, x, sweeps, 1.2, &SweepOrder::Ascending),
            SmootherKind::Polynomial => PolySetup::new(&a, 2)?.apply(&a, &b, x, sweeps),
            SmootherKind::Ilu => {
                let setup = IluSetup::new(&a, 0)?;
                let n = a.row;
                let mut r = vec![0.0; n];
                let mut dx = vec![0.0; n];
                for _ in 0..sweeps {
                    r.copy_from_slice(&b);
                    a.spmv(-1.0, x, &mut r)?;
                    setup.apply(&r, &mut dx)?;
                    vecalg::axpy(1.0, &dx, x)?;
                }
                Ok(())
            }
        }
    }
}

/// The cycle from one AMG level down as a [`Preconditioner`], used by
/// nonlinear AMLI's inner GCG solve: `apply` runs one cycle of the
/// hierarchy rooted at `level` and reports the correction.
struct AmliCoarsePreconditioner<'a> {
    hierarchy: &'a mut AmgHierarchy,
    level: usize,
}

impl Preconditioner for AmliCoarsePreconditioner<'_> {
    fn apply(&mut self, r: &[Precision], z: &mut [Precision]) -> Result<()> {
        self.hierarchy.levels[self.level].b.copy_from_slice(r);
        self.hierarchy.levels[self.level].x = vec![0.0; r.len()];
        self.hierarchy.cycle_at(self.level)?;
        z.copy_from_slice(&self.hierarchy.levels[self.level].x);
        Ok(())
    }
}

/// Wraps a full hierarchy as a [`Preconditioner`]: `apply(r, z) = M^-1 r`
/// via one AMG cycle rooted at level 0 (§4.7's preconditioner adapter).
pub struct AmgPreconditioner {
    hierarchy: AmgHierarchy,
}

impl AmgPreconditioner {
    pub fn new(hierarchy: AmgHierarchy) -> Self {
        Self { hierarchy }
    }

    pub fn hierarchy(&self) -> &AmgHierarchy {
        &self.hierarchy
    }
}

impl Preconditioner for AmgPreconditioner {
    fn apply(&mut self, r: &[Precision], z: &mut [Precision]) -> Result<()> {
        self.hierarchy.levels[0].b.copy_from_slice(r);
        vecalg::zero(&mut self.hierarchy.levels[0].x);
        self.hierarchy.cycle()?;
        z.copy_from_slice(&self.hierarchy.levels[0].x);
        Ok(())
    }
}

/// Solve `a x = b` with AMG as a stand-alone solver: repeated cycles
/// until the relative residual falls below `tol` or `max_cycles` is hit.
pub fn solve(a: &Csr, b: &[Precision], x: &mut [Precision], param: &AmgParam, tol: Precision, max_cycles: usize) -> Result<usize> {
    let mut hierarchy = AmgHierarchy::setup(a, param)?;
    let b_norm = vecalg::norm2(b).max(SMALLREAL);

    for cycle_no in 0..max_cycles {
        let mut r = b.to_vec();
        a.spmv(-1.0, x, &mut r)?;
        if vecalg::norm2(&r) / b_norm < tol {
            return Ok(cycle_no);
        }
        hierarchy.levels[0].b.copy_from_slice(&r);
        vecalg::zero(&mut hierarchy.levels[0].x);
        hierarchy.cycle()?;
        let correction = hierarchy.levels[0].x.clone();
        vecalg::axpy(1.0, &correction, x)?;
    }

    let mut r = b.to_vec();
    a.spmv(-1.0, x, &mut r)?;
    let relres = vecalg::norm2(&r) / b_norm;
    if relres < tol {
        return Ok(max_cycles);
    }
    Err(SolverError::MaxIterations { iterations: max_cycles, residual: relres, solver: "amg".to_string() })
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
    fn setup_builds_a_shrinking_hierarchy() {
        let a = laplacian(64);
        let hierarchy = AmgHierarchy::setup(&a, &AmgParam::default()).unwrap();
        assert!(hierarchy.depth() >= 2);
        assert!(hierarchy.levels[1].n() < hierarchy.levels[0].n());
        assert!(hierarchy.levels.last().unwrap().n() <= AmgParam::default().coarsest_size);
    }

    #[test]
    fn v_cycle_reduces_residual() {
        let a = laplacian(64);
        let param = AmgParam::standalone_solver();
        let mut hierarchy = AmgHierarchy::setup(&a, &param).unwrap();
        let b = vec![1.0; 64];
        let x0 = vec![0.0; 64];
        let r0 = {
            let mut r = b.clone();
            a.spmv(-1.0, &x0, &mut r).unwrap();
            vecalg::norm2(&r)
        };
        hierarchy.levels[0].b.copy_from_slice(&b);
        hierarchy.levels[0].x = x0;
        hierarchy.cycle().unwrap();
        let x1 = hierarchy.levels[0].x.clone();
        let r1 = {
            let mut r = b.clone();
            a.spmv(-1.0, &x1, &mut r).unwrap();
            vecalg::norm2(&r)
        };
        assert!(r1 < r0 * 0.5);
    }

    #[test]
    fn standalone_amg_solve_converges() {
        let a = laplacian(50);
        let x_true: Vec<Precision> = (0..50).map(|i| (i as Precision).sin()).collect();
        let mut b = vec![0.0; 50];
        a.spmv(1.0, &x_true, &mut b).unwrap();
        let mut x = vec![0.0; 50];
        let cycles = solve(&a, &b, &mut x, &AmgParam::standalone_solver(), 1e-8, 50).unwrap();
        assert!(cycles <= 50);
        let mut r = b.clone();
        a.spmv(-1.0, &x, &mut r).unwrap();
        assert!(vecalg::norm2(&r) / vecalg::norm2(&b) < 1e-7);
    }

    #[test]
    fn amg_as_cg_preconditioner_converges_fast() {
        let a = laplacian(80);
        let x_true: Vec<Precision> = (0..80).map(|i| 1.0 + 0.01 * i as Precision).collect();
        let mut b = vec![0.0; 80];
        a.spmv(1.0, &x_true, &mut b).unwrap();
        let mut x = vec![0.0; 80];
        let hierarchy = AmgHierarchy::setup(&a, &AmgParam::preconditioner()).unwrap();
        let mut pc = AmgPreconditioner::new(hierarchy);
        let param = crate::params::ItsParam::cg(1e-10, 100);
        let stats = solver::solve(&a, &b, &mut x, &mut pc, &param).unwrap();
        assert!(stats.iterations < 30);
    }

    /// Deep hierarchies on large 1D Laplacians eventually coarsen down to
    /// rows whose every coupling is declared weak by the strength
    /// criterion's zero-row-sum escape hatch; setup must still complete and
    /// the resulting preconditioner must still converge.
    #[test]
    fn setup_and_solve_succeed_on_a_deep_hierarchy() {
        for size in [800usize, 3200] {
            let a = laplacian(size);
            let b: Vec<Precision> = (0..size).map(|i| 1.0 + i as Precision * 0.1).collect();
            let mut x = vec![0.0; size];
            let hierarchy = AmgHierarchy::setup(&a, &AmgParam::default()).unwrap();
            let mut pc = AmgPreconditioner::new(hierarchy);
            let param = crate::params::ItsParam::cg(1e-8, 200);
            let stats = solver::solve(&a, &b, &mut x, &mut pc, &param).unwrap();
            assert!(stats.final_residual < 1e-7, "size {size} residual {}", stats.final_residual);
        }
    }
}
