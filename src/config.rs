use crate::{solver::SolverControl, Dim};

/// Preconditioner used by the conjugate gradient solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PreconditionerKind {
  Identity,
  Jacobi,
  Ssor { relaxation: f64 },
}
impl Default for PreconditionerKind {
  fn default() -> Self {
    Self::Ssor { relaxation: 1.2 }
  }
}

/// Parameters of a clamped elasticity run on a box.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticityConfig {
  pub dim: Dim,
  /// The domain is the hyper cube $[left, right]^d$.
  pub left: f64,
  pub right: f64,
  pub nrefinements: usize,
  pub degree: usize,
  pub mu: f64,
  pub lambda: f64,
  pub solver: SolverControl,
  pub preconditioner: PreconditionerKind,
}

impl Default for ElasticityConfig {
  fn default() -> Self {
    Self {
      dim: 2,
      left: -1.0,
      right: 1.0,
      nrefinements: 4,
      degree: 2,
      mu: 1.0,
      lambda: 1e7,
      solver: SolverControl::default(),
      preconditioner: PreconditionerKind::default(),
    }
  }
}

impl ElasticityConfig {
  pub fn with_dim(mut self, dim: Dim) -> Self {
    self.dim = dim;
    self
  }
  pub fn with_domain(mut self, left: f64, right: f64) -> Self {
    self.left = left;
    self.right = right;
    self
  }
  pub fn with_refinements(mut self, nrefinements: usize) -> Self {
    self.nrefinements = nrefinements;
    self
  }
  pub fn with_degree(mut self, degree: usize) -> Self {
    self.degree = degree;
    self
  }
  pub fn with_lame(mut self, mu: f64, lambda: f64) -> Self {
    self.mu = mu;
    self.lambda = lambda;
    self
  }
  pub fn with_solver(mut self, solver: SolverControl) -> Self {
    self.solver = solver;
    self
  }
  pub fn with_preconditioner(mut self, preconditioner: PreconditionerKind) -> Self {
    self.preconditioner = preconditioner;
    self
  }
}
