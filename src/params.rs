//! Immutable configuration records for Krylov solvers and AMG setup.
//!
//! Mirrors the teacher's `SolverOptions` preset-constructor pattern: each
//! record is a plain value type with a `Default` impl plus named presets,
//! and solvers take `&ItsParam`/`&AmgParam` so mutating a configuration
//! mid-solve is a type error rather than a runtime hazard (§9).

use crate::types::{Precision, StoppingCriterion, Verbosity};

/// Which Krylov method to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    /// Preconditioned Conjugate Gradient.
    Cg,
    /// Preconditioned BiCGStab with the safe-net.
    BiCgStab,
    /// Variable (nonlinear-preconditioner-tolerant) BiCGStab.
    VariableBiCgStab,
    /// Restarted GMRES.
    Gmres,
    /// Variable (nonlinear-preconditioner-tolerant) GMRES.
    VariableGmres,
    /// Generalized Conjugate Gradient.
    Gcg,
}

/// Configuration for one Krylov solve (`ITS_param` in the source).
#[derive(Debug, Clone, PartialEq)]
pub struct ItsParam {
    /// Which solver to run.
    pub solver: SolverKind,
    /// Convergence tolerance.
    pub tolerance: Precision,
    /// Maximum number of outer iterations.
    pub max_iterations: usize,
    /// Stopping criterion used to evaluate convergence.
    pub stopping_criterion: StoppingCriterion,
    /// Restart length for GMRES-family solvers (ignored otherwise).
    pub restart: usize,
    /// Iteration logging verbosity.
    pub verbosity: Verbosity,
}

impl Default for ItsParam {
    fn default() -> Self {
        Self {
            solver: SolverKind::Cg,
            tolerance: 1e-8,
            max_iterations: 1000,
            stopping_criterion: StoppingCriterion::RelRes,
            restart: 30,
            verbosity: Verbosity::None,
        }
    }
}

impl ItsParam {
    /// Parameters for a plain preconditioned CG solve.
    pub fn cg(tolerance: Precision, max_iterations: usize) -> Self {
        Self {
            solver: SolverKind::Cg,
            tolerance,
            max_iterations,
            ..Default::default()
        }
    }

    /// Parameters for a BiCGStab solve with the safe net enabled.
    pub fn bicgstab(tolerance: Precision, max_iterations: usize) -> Self {
        Self {
            solver: SolverKind::BiCgStab,
            tolerance,
            max_iterations,
            ..Default::default()
        }
    }

    /// Parameters for a restarted GMRES solve.
    pub fn gmres(tolerance: Precision, max_iterations: usize, restart: usize) -> Self {
        Self {
            solver: SolverKind::Gmres,
            tolerance,
            max_iterations,
            restart,
            ..Default::default()
        }
    }

    /// High-precision preset: tight tolerance, generous iteration cap.
    pub fn high_precision() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: 5000,
            ..Default::default()
        }
    }
}

/// Which strength-of-connection policy AMG setup should use (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthPolicy {
    /// Modified Ruge-Stuben: row-scale by the minimum off-diagonal.
    Modified,
    /// Classical Ruge-Stuben, counting only negative couplings as strong.
    ClassicalNegative,
    /// Classical Ruge-Stuben, counting couplings by absolute value.
    ClassicalAbsolute,
}

/// Which CF-splitting algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplittingKind {
    /// Classical two-pass Ruge-Stuben splitting (§4.6 Pass 1/2).
    RugeStuben,
    /// Compatible-relaxation splitting driven by Gauss-Seidel contraction.
    CompatibleRelaxation,
}

/// Which smoother the AMG hierarchy should use at each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmootherKind {
    /// Weighted/unweighted Jacobi.
    Jacobi,
    /// Forward Gauss-Seidel.
    GaussSeidelForward,
    /// Symmetric (forward-then-backward) Gauss-Seidel.
    GaussSeidelSymmetric,
    /// SOR with a caller-supplied relaxation weight.
    Sor,
    /// Chebyshev-like polynomial smoother.
    Polynomial,
    /// ILU(0) apply.
    Ilu,
}

/// Which multigrid cycle shape to drive (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleType {
    /// One recursive coarse-level call per level.
    V,
    /// Two recursive coarse-level calls per level.
    W,
    /// Full multigrid: solve coarsest first, nest V-cycles going up.
    Full,
    /// Nonlinear AMLI: `degree` inner flexible-Krylov iterations per level.
    NonlinearAmli {
        /// Number of inner GCG iterations used as the coarse-level solve.
        degree: usize,
    },
}

/// Configuration for AMG setup and cycling (`AMG_param` in the source).
#[derive(Debug, Clone, PartialEq)]
pub struct AmgParam {
    /// Strength-of-connection policy.
    pub strength_policy: StrengthPolicy,
    /// CF-splitting algorithm.
    pub splitting: SplittingKind,
    /// Strength threshold `theta_str` (§4.6).
    pub theta_str: Precision,
    /// Zero-row-sum threshold `theta_max` (§4.6).
    pub theta_max: Precision,
    /// Maximum number of levels to build.
    pub max_levels: usize,
    /// Stop coarsening once a level has at most this many rows.
    pub coarsest_size: usize,
    /// Smoother used for pre/post-smoothing.
    pub smoother: SmootherKind,
    /// Pre-smoothing sweep count `nu1`.
    pub presmooth_sweeps: usize,
    /// Post-smoothing sweep count `nu2`.
    pub postsmooth_sweeps: usize,
    /// Cycle shape.
    pub cycle_type: CycleType,
    /// Compatible-relaxation contraction threshold `theta` (default 0.8).
    pub cr_threshold: Precision,
}

impl Default for AmgParam {
    fn default() -> Self {
        Self {
            strength_policy: StrengthPolicy::Modified,
            splitting: SplittingKind::RugeStuben,
            theta_str: 0.25,
            theta_max: 0.9,
            max_levels: 20,
            coarsest_size: 20,
            smoother: SmootherKind::GaussSeidelSymmetric,
            presmooth_sweeps: 1,
            postsmooth_sweeps: 1,
            cycle_type: CycleType::V,
            cr_threshold: 0.8,
        }
    }
}

impl AmgParam {
    /// Preset tuned for a classical V-cycle solve used as a CG preconditioner.
    pub fn preconditioner() -> Self {
        Self {
            presmooth_sweeps: 1,
            postsmooth_sweeps: 1,
            cycle_type: CycleType::V,
            ..Default::default()
        }
    }

    /// Preset tuned for AMG used directly as a stand-alone solver.
    pub fn standalone_solver() -> Self {
        Self {
            presmooth_sweeps: 2,
            postsmooth_sweeps: 2,
            cycle_type: CycleType::V,
            ..Default::default()
        }
    }
}
