//! Common scalar and index types used throughout the solver.
//!
//! This module defines the fundamental numeric types for the sparse
//! linear-algebra core, along with the small enumerations shared by the
//! matrix, smoother, solver, and AMG layers.

use std::fmt;

/// Floating-point precision type.
///
/// Fixed to `f64` — the crate performs no mixed-precision arithmetic.
pub type Precision = f64;

/// Signed index type used for rows, columns, and nonzero counts.
///
/// Negative values are used as sentinels (e.g. `-1` for "no diagonal found").
pub type Index = i32;

/// Smallest real distinguishable from zero for division guards.
pub const SMALLREAL: Precision = 1e-20;

/// Largest real used as a "practically infinite" sentinel.
pub const BIGREAL: Precision = 1e36;

/// Threshold below which a dense block is treated as numerically singular.
pub const SMALL_DET: Precision = 1e-22;

/// Ratio of the tolerance used to detect stagnation (`STAG_RATIO` in the source).
pub const STAG_RATIO: Precision = 1e-2;

/// Maximum number of stagnation restarts before a solver gives up.
pub const MAX_STAG: usize = 20;

/// Maximum number of false-convergence restarts before a solver gives up.
pub const MAX_RESTART: usize = 20;

/// Logging verbosity for iterative solvers, independent of the process-wide
/// `log` filter: a caller can request [`Verbosity::Most`] while `RUST_LOG`
/// still suppresses `debug`-level records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Verbosity {
    /// No iteration output at all.
    #[default]
    None,
    /// Only a final summary line.
    Min,
    /// Per-iteration `iter relres absres factor` line.
    Some,
    /// `Some` plus restarts, stagnations, and real-residual recomputations.
    More,
    /// Everything, including AMG setup diagnostics.
    Most,
}

impl Verbosity {
    /// Whether per-iteration lines should be emitted.
    pub fn logs_iterations(self) -> bool {
        self >= Verbosity::Some
    }

    /// Whether restart/stagnation diagnostics should be emitted.
    pub fn logs_diagnostics(self) -> bool {
        self >= Verbosity::More
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verbosity::None => "NONE",
            Verbosity::Min => "MIN",
            Verbosity::Some => "SOME",
            Verbosity::More => "MORE",
            Verbosity::Most => "MOST",
        };
        write!(f, "{name}")
    }
}

/// Stopping criteria for the Krylov engine (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StoppingCriterion {
    /// `||r|| / ||b||`
    RelRes,
    /// `sqrt(<r, M^-1 r>) / ||b||`
    RelPrecRes,
    /// `||r|| / ||x||`
    ModRelRes,
}

impl Default for StoppingCriterion {
    fn default() -> Self {
        StoppingCriterion::RelRes
    }
}

/// Row/column sweep order for Gauss-Seidel-family smoothers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOrder {
    /// `0 -> n-1`
    Ascending,
    /// `n-1 -> 0`
    Descending,
    /// Caller-supplied permutation.
    UserOrdered(Vec<usize>),
    /// Coarse/fine half-sweeps driven by a CF marker vector.
    CfOrdered {
        /// `true` for coarse, `false` for fine.
        is_coarse: Vec<bool>,
        /// Process coarse points before fine points.
        coarse_first: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_ordering() {
        assert!(Verbosity::None < Verbosity::Min);
        assert!(Verbosity::Some < Verbosity::More);
        assert!(Verbosity::More < Verbosity::Most);
    }

    #[test]
    fn verbosity_gates() {
        assert!(!Verbosity::Min.logs_iterations());
        assert!(Verbosity::Some.logs_iterations());
        assert!(!Verbosity::Some.logs_diagnostics());
        assert!(Verbosity::More.logs_diagnostics());
    }
}
