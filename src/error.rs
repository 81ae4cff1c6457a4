//! Errors of the elasticity pipeline.
//!
//! Configuration errors are raised before any numerics run,
//! convergence errors are raised by the iterative solver.
//! Writes outside of the sparsity pattern are programming errors and panic instead.

use crate::{dof::DofIdx, mesh::CellIdx, Dim};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
  #[error("dimension mismatch: expected {expected} entries, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },

  #[error("spatial dimension {0} is not implemented")]
  UnsupportedDimension(Dim),

  #[error("element degree {0} is not implemented")]
  UnsupportedDegree(usize),

  #[error("SSOR relaxation {0} does not lie in (0,2)")]
  InvalidRelaxation(f64),

  #[error("cell {0} has a degenerate geometry")]
  DegenerateCell(CellIdx),

  #[error("constraint on dof {0} depends on itself")]
  CyclicConstraint(DofIdx),

  #[error(
    "iterative solver did not converge: residual {residual:e} after {iterations} iterations"
  )]
  IterativeSolverDidNotConverge { iterations: usize, residual: f64 },

  #[error("direct solver failed: {0}")]
  DirectSolver(String),

  #[error("vtk export failed: {0}")]
  Vtk(#[from] vtkio::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  pub fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
      Ok(())
    } else {
      Err(Self::DimensionMismatch { expected, actual })
    }
  }
}
