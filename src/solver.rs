//! Solvers for the assembled system.
//!
//! The conjugate gradient method with a symmetric preconditioner is the
//! default. A sparse Cholesky factorization serves as reference.

use crate::{linalg::Vector, sparse::SparseMatrix, Error, Result};

use faer::solvers::SpSolver;

/// Stopping criterion of the iterative solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverControl {
  pub max_iterations: usize,
  /// Absolute bound on the $l^2$ norm of the residual.
  pub tolerance: f64,
}
impl Default for SolverControl {
  fn default() -> Self {
    Self {
      max_iterations: 1_000_000,
      tolerance: 1e-12,
    }
  }
}
impl SolverControl {
  pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
    self.max_iterations = max_iterations;
    self
  }
  pub fn with_tolerance(mut self, tolerance: f64) -> Self {
    self.tolerance = tolerance;
    self
  }
}

/// Outcome of an iterative solve.
///
/// `residual` is the norm of the recursively updated residual the stopping
/// criterion is evaluated on. In floating point arithmetic it may drift below
/// the true residual $norm(b - A x)$.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverStats {
  pub iterations: usize,
  pub residual: f64,
}

/// Approximate inverse $z = M^(-1) r$.
pub trait Preconditioner {
  fn apply(&self, r: &Vector, z: &mut Vector);
}

pub struct IdentityPreconditioner;
impl Preconditioner for IdentityPreconditioner {
  fn apply(&self, r: &Vector, z: &mut Vector) {
    z.copy_from(r);
  }
}

pub struct JacobiPreconditioner {
  diagonal_inv: Vector,
}
impl JacobiPreconditioner {
  pub fn new(matrix: &SparseMatrix) -> Self {
    let diagonal_inv = matrix
      .diagonal()
      .map(|d| if d.abs() > 0.0 { 1.0 / d } else { 1.0 });
    Self { diagonal_inv }
  }
}
impl Preconditioner for JacobiPreconditioner {
  fn apply(&self, r: &Vector, z: &mut Vector) {
    z.zip_zip_apply(r, &self.diagonal_inv, |zi, ri, di| *zi = ri * di);
  }
}

/// Symmetric successive over-relaxation.
///
/// $M = omega / (2 - omega) (D/omega + L) D^(-1) (D/omega + U)$,
/// applied as a forward sweep, a diagonal scaling and a backward sweep.
pub struct SsorPreconditioner<'a> {
  matrix: &'a SparseMatrix,
  diagonal: Vector,
  relaxation: f64,
}
impl<'a> SsorPreconditioner<'a> {
  pub fn check_relaxation(relaxation: f64) -> Result<()> {
    if relaxation > 0.0 && relaxation < 2.0 {
      Ok(())
    } else {
      Err(Error::InvalidRelaxation(relaxation))
    }
  }

  pub fn new(matrix: &'a SparseMatrix, relaxation: f64) -> Result<Self> {
    Self::check_relaxation(relaxation)?;
    let diagonal = matrix.diagonal();
    assert!(
      diagonal.iter().all(|&d| d != 0.0),
      "SSOR needs a nonzero diagonal"
    );
    Ok(Self {
      matrix,
      diagonal,
      relaxation,
    })
  }
}
impl Preconditioner for SsorPreconditioner<'_> {
  fn apply(&self, r: &Vector, z: &mut Vector) {
    let omega = self.relaxation;
    let n = self.matrix.nrows();

    for i in 0..n {
      let (cols, values) = self.matrix.row(i);
      let lower: f64 = cols
        .iter()
        .zip(values)
        .take_while(|&(&j, _)| j < i)
        .map(|(&j, &v)| v * z[j])
        .sum();
      z[i] = (r[i] - lower) * omega / self.diagonal[i];
    }

    let scale = (2.0 - omega) / omega;
    for i in 0..n {
      z[i] *= scale * self.diagonal[i];
    }

    for i in (0..n).rev() {
      let (cols, values) = self.matrix.row(i);
      let upper: f64 = cols
        .iter()
        .zip(values)
        .filter(|&(&j, _)| j > i)
        .map(|(&j, &v)| v * z[j])
        .sum();
      z[i] = (z[i] - upper) * omega / self.diagonal[i];
    }
  }
}

/// Preconditioned conjugate gradient method for symmetric positive definite systems.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConjugateGradient {
  control: SolverControl,
}
impl ConjugateGradient {
  pub fn new(control: SolverControl) -> Self {
    Self { control }
  }

  /// Solves $A x = b$ starting from the given `x`.
  ///
  /// Convergence is measured on the recursively updated residual.
  pub fn solve(
    &self,
    matrix: &SparseMatrix,
    x: &mut Vector,
    b: &Vector,
    preconditioner: &impl Preconditioner,
  ) -> Result<SolverStats> {
    let n = b.len();
    Error::check_len(matrix.nrows(), n)?;
    Error::check_len(n, x.len())?;
    let SolverControl {
      max_iterations,
      tolerance,
    } = self.control;

    let mut r = b - matrix.mul_vec(x);
    let mut residual = r.norm();
    tracing::debug!("cg initial residual {residual:e}");
    if residual <= tolerance {
      return Ok(SolverStats {
        iterations: 0,
        residual,
      });
    }

    let mut z = Vector::zeros(n);
    preconditioner.apply(&r, &mut z);
    let mut p = z.clone();
    let mut q = Vector::zeros(n);
    let mut rz = r.dot(&z);

    for iteration in 1..=max_iterations {
      matrix.apply(&p, &mut q);
      let pq = p.dot(&q);
      if pq <= 0.0 || !pq.is_finite() {
        tracing::warn!("cg breakdown after {} iterations", iteration - 1);
        return Err(Error::IterativeSolverDidNotConverge {
          iterations: iteration - 1,
          residual,
        });
      }
      let alpha = rz / pq;
      x.axpy(alpha, &p, 1.0);
      r.axpy(-alpha, &q, 1.0);

      residual = r.norm();
      if iteration % 100 == 0 {
        tracing::debug!("cg iteration {iteration}: residual {residual:e}");
      }
      if residual <= tolerance {
        tracing::info!("cg converged in {iteration} iterations, residual {residual:e}");
        return Ok(SolverStats {
          iterations: iteration,
          residual,
        });
      }

      preconditioner.apply(&r, &mut z);
      let rz_new = r.dot(&z);
      let beta = rz_new / rz;
      rz = rz_new;
      p.axpy(1.0, &z, beta);
    }

    tracing::warn!("cg did not converge in {max_iterations} iterations, residual {residual:e}");
    Err(Error::IterativeSolverDidNotConverge {
      iterations: max_iterations,
      residual,
    })
  }
}

pub struct FaerCholesky {
  raw: faer::sparse::linalg::solvers::Cholesky<usize, f64>,
}
impl FaerCholesky {
  pub fn new(matrix: &SparseMatrix) -> Result<Self> {
    let csc = matrix.to_nalgebra_csc();
    let nrows = csc.nrows();
    let ncols = csc.ncols();
    let (col_ptrs, row_indices, values) = csc.disassemble();

    let symbolic =
      faer::sparse::SymbolicSparseColMat::new_checked(nrows, ncols, col_ptrs, None, row_indices);
    let raw = faer::sparse::SparseColMat::new(symbolic, values)
      .sp_cholesky(faer::Side::Upper)
      .map_err(|err| Error::DirectSolver(format!("{err:?}")))?;
    Ok(Self { raw })
  }

  pub fn solve(&self, b: &Vector) -> Vector {
    let b = faer::col::from_slice(b.as_slice());
    Vector::from_vec(self.raw.solve(b).as_slice().to_vec())
  }
}
