//! Error types and handling for the sparse solver core.
//!
//! This module defines every error condition that can occur during matrix
//! construction, smoother setup, I/O, and solver execution, mapped onto the
//! fixed error taxonomy of the specification (§7).

use crate::types::Precision;

/// Result type alias for solver operations.
pub type Result<T> = std::result::Result<T, SolverError>;

/// Comprehensive error type for all solver operations.
///
/// Variant names follow the specification's taxonomy (`MAXIT`, `SOLSTAG`,
/// `STAG`, `TOLSMALL`, `DIVZERO`, `MISC`, `PRECTYPE`, `SOLVER_TYPE`,
/// `ALLOC_MEM`, `WRONG_FILE`/`OPEN_FILE`).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverError {
    /// Matrix construction violated a storage invariant (§3).
    #[error("invalid sparse matrix: {reason}{}", position.map(|(r, c)| format!(" at ({r}, {c})")).unwrap_or_default())]
    InvalidSparseMatrix {
        /// Description of the invalid data.
        reason: String,
        /// Position where the invalid data was found, if applicable.
        position: Option<(usize, usize)>,
    },

    /// Two operands had incompatible lengths or dimensions.
    #[error("dimension mismatch in {operation}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension found.
        actual: usize,
        /// Operation in which the mismatch occurred.
        operation: String,
    },

    /// Iteration cap reached without convergence (`MAXIT`).
    #[error("{solver}: reached the iteration cap ({iterations}) with relative residual {residual:.3e}")]
    MaxIterations {
        /// Iterations performed.
        iterations: usize,
        /// Final relative residual.
        residual: Precision,
        /// Name of the solver that gave up.
        solver: String,
    },

    /// Solution magnitude collapsed below the zero-solution floor (`SOLSTAG`).
    #[error("{solver}: solution norm {norm:.3e} fell below the zero-solution floor at iteration {iteration}")]
    SolutionStagnation {
        /// Iteration at which the collapse was detected.
        iteration: usize,
        /// Infinity norm of the solution at that point.
        norm: Precision,
        /// Name of the solver.
        solver: String,
    },

    /// Residual stagnated and the restart budget was exhausted (`STAG`).
    #[error("{solver}: residual stagnated after {stag_count} restarts at iteration {iteration}")]
    Stagnation {
        /// Number of stagnation restarts attempted.
        stag_count: usize,
        /// Iteration at which the budget was exhausted.
        iteration: usize,
        /// Name of the solver.
        solver: String,
    },

    /// The requested tolerance is below attainable floating-point precision (`TOLSMALL`).
    #[error("{solver}: tolerance {tolerance:.3e} is unreachable (best residual {best_residual:.3e})")]
    ToleranceUnreachable {
        /// Requested tolerance.
        tolerance: Precision,
        /// Best residual actually attained.
        best_residual: Precision,
        /// Name of the solver.
        solver: String,
    },

    /// A Krylov inner-product denominator vanished (`DIVZERO`).
    #[error("{solver}: division by a near-zero denominator ({denom:.3e}) at iteration {iteration}")]
    DivisionByZero {
        /// The offending denominator.
        denom: Precision,
        /// Iteration at which it occurred.
        iteration: usize,
        /// Name of the solver.
        solver: String,
    },

    /// Smoother or factorization internal failure, e.g. a singular block (`MISC`).
    #[error("{component}: {message}")]
    AlgorithmError {
        /// Component that failed (smoother, factorization, setup stage, ...).
        component: String,
        /// Description of the failure.
        message: String,
    },

    /// An unrecognized preconditioner selector was requested (`PRECTYPE`).
    #[error("unknown preconditioner selector: {selector}")]
    UnknownPreconditioner {
        /// The selector string or code that was not recognized.
        selector: String,
    },

    /// An unrecognized solver selector was requested (`SOLVER_TYPE`).
    #[error("unknown solver selector: {selector}")]
    UnknownSolver {
        /// The selector string or code that was not recognized.
        selector: String,
    },

    /// A required allocation would exceed the caller's configured cap (`ALLOC_MEM`).
    #[error("allocation of {requested_bytes} bytes exceeds the configured cap")]
    AllocationFailure {
        /// Requested allocation size in bytes.
        requested_bytes: usize,
    },

    /// Failure to open or read a matrix/vector file (`OPEN_FILE`).
    #[error("I/O error reading '{path}': {message}")]
    Io {
        /// Path that could not be opened or read.
        path: String,
        /// Underlying I/O error message.
        message: String,
    },

    /// A file was opened but its contents did not parse as the expected format (`WRONG_FILE`).
    #[error("malformed {format} data: {message}")]
    ParseError {
        /// Name of the format being parsed.
        format: String,
        /// Description of the parse failure.
        message: String,
    },
}

impl SolverError {
    /// Whether this error indicates a recoverable, iteration-phase condition.
    ///
    /// Recoverable errors are caught by the Krylov safe-net and returned
    /// alongside the best-ever iterate rather than aborting the caller's
    /// solution vector (§7 propagation policy).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SolverError::MaxIterations { .. }
                | SolverError::SolutionStagnation { .. }
                | SolverError::Stagnation { .. }
                | SolverError::ToleranceUnreachable { .. }
                | SolverError::DivisionByZero { .. }
        )
    }
}

impl From<std::io::Error> for SolverError {
    fn from(err: std::io::Error) -> Self {
        SolverError::Io {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_vs_fatal() {
        let recoverable = SolverError::MaxIterations {
            iterations: 100,
            residual: 1e-3,
            solver: "cg".to_string(),
        };
        assert!(recoverable.is_recoverable());

        let fatal = SolverError::DimensionMismatch {
            expected: 10,
            actual: 5,
            operation: "axpy".to_string(),
        };
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn display_includes_context() {
        let err = SolverError::InvalidSparseMatrix {
            reason: "column index out of range".to_string(),
            position: Some((2, 7)),
        };
        let msg = err.to_string();
        assert!(msg.contains("(2, 7)"));
    }
}
