//! # FAMG-Solver
//!
//! A sparse linear-algebra toolkit: sparse matrix storage (CSR, COO, BSR,
//! structured-grid, and block-of-CSR layouts), a preconditioned Krylov
//! solver family (CG, BiCGStab/VBiCGStab, GMRES/VGMRES, Generalized CG),
//! and an algebraic multigrid core (Ruge-Stuben coarsening, classical
//! direct interpolation, Galerkin coarsening, and multilevel cycles) that
//! can run standalone or as a Krylov preconditioner.
//!
//! ## Quick Start
//!
//! ```rust
//! use famg_solver::matrix::{Coo, SparseOp};
//! use famg_solver::params::ItsParam;
//! use famg_solver::solver::{self, IdentityPreconditioner};
//!
//! // A small SPD system.
//! let a = Coo::from_triplets(2, 2, vec![(0, 0, 5.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 7.0)])
//!     .to_csr()
//!     .unwrap();
//! let b = vec![6.0, 9.0];
//! let mut x = vec![0.0, 0.0];
//!
//! let param = ItsParam::default();
//! let mut m = IdentityPreconditioner;
//! let stats = solver::solve(&a, &b, &mut x, &mut m, &param)?;
//! println!("converged in {} iterations", stats.iterations);
//! # Ok::<(), famg_solver::SolverError>(())
//! ```

#![warn(clippy::all)]
#![allow(clippy::float_cmp)] // Numerical code often requires exact comparisons

pub use error::{Result, SolverError};
pub use types::Precision;

pub mod amg;
pub mod block;
pub mod error;
pub mod io;
pub mod matrix;
pub mod params;
pub mod smoother;
pub mod solver;
pub mod types;
pub mod vecalg;

/// Library version, exposed for diagnostics and bug reports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library's logging backend.
///
/// Call once at the start of your application to route the crate's
/// `log` output (setup diagnostics, near-singular-pivot warnings, ...)
/// through `env_logger`.
#[cfg(feature = "std")]
pub fn init() {
    env_logger::try_init().ok();
}

/// No-op fallback when the `std` feature (and its `env_logger` backend) is disabled.
#[cfg(not(feature = "std"))]
pub fn init() {}
