use crate::{
  linalg::{CoordRef, Matrix, Vector},
  mesh::cartesian::linear_index2cartesian_index,
  Dim,
};

use std::f64::consts::PI;

/// A quadrature rule defined on the reference cell $[0,1]^d$.
#[derive(Debug, Clone)]
pub struct QuadRule {
  /// One column per quadrature point.
  nodes: Matrix,
  weights: Vector,
}
impl QuadRule {
  pub fn new(nodes: Matrix, weights: Vector) -> Self {
    assert_eq!(nodes.ncols(), weights.len());
    Self { nodes, weights }
  }

  /// Tensor product Gauss-Legendre rule with `npoints` per direction.
  ///
  /// Integrates polynomials of degree $2 npoints - 1$ exactly in every variable.
  pub fn gauss(dim: Dim, npoints: usize) -> Self {
    let (nodes1d, weights1d) = gauss_legendre_1d(npoints);

    let nqpoints = npoints.pow(dim as u32);
    let mut nodes = Matrix::zeros(dim, nqpoints);
    let mut weights = Vector::zeros(nqpoints);
    for iq in 0..nqpoints {
      let cart = linear_index2cartesian_index(iq, npoints, dim);
      weights[iq] = cart.iter().map(|&i| weights1d[i]).product();
      for (d, &i) in cart.iter().enumerate() {
        nodes[(d, iq)] = nodes1d[i];
      }
    }
    Self { nodes, weights }
  }

  pub fn dim(&self) -> Dim {
    self.nodes.nrows()
  }
  pub fn npoints(&self) -> usize {
    self.weights.len()
  }
  pub fn nodes(&self) -> &Matrix {
    &self.nodes
  }
  pub fn node(&self, iq: usize) -> CoordRef {
    self.nodes.column(iq)
  }
  pub fn weights(&self) -> &Vector {
    &self.weights
  }

  pub fn apply_ref<F>(&self, f: F) -> f64
  where
    F: Fn(CoordRef) -> f64,
  {
    self
      .nodes
      .column_iter()
      .zip(self.weights.iter())
      .map(|(n, w)| w * f(n))
      .sum()
  }
}

/// Gauss-Legendre nodes and weights on $[0,1]$.
///
/// The roots of the Legendre polynomial are found by Newton iteration
/// starting from the Chebyshev-like guess $cos(pi (i + 3/4) / (n + 1/2))$.
pub fn gauss_legendre_1d(npoints: usize) -> (Vec<f64>, Vec<f64>) {
  assert!(npoints > 0, "quadrature needs at least one point");
  let n = npoints;

  let mut nodes = vec![0.0; n];
  let mut weights = vec![0.0; n];
  for i in 0..n.div_ceil(2) {
    let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
    for _ in 0..100 {
      let (p, dp) = legendre_with_derivative(n, x);
      let dx = p / dp;
      x -= dx;
      if dx.abs() <= 1e-15 {
        break;
      }
    }
    let (_, dp) = legendre_with_derivative(n, x);
    let w = 2.0 / ((1.0 - x * x) * dp * dp);

    // map from [-1,1] to [0,1]
    nodes[i] = 0.5 * (1.0 - x);
    nodes[n - 1 - i] = 0.5 * (1.0 + x);
    weights[i] = 0.5 * w;
    weights[n - 1 - i] = 0.5 * w;
  }
  (nodes, weights)
}

/// $P_n(x)$ and $P_n'(x)$ by the three term recurrence.
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
  let mut p0 = 1.0;
  let mut p1 = x;
  if n == 0 {
    return (1.0, 0.0);
  }
  for k in 2..=n {
    let k = k as f64;
    let p2 = ((2.0 * k - 1.0) * x * p1 - (k - 1.0) * p0) / k;
    p0 = p1;
    p1 = p2;
  }
  let dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
  (p1, dp)
}

#[cfg(test)]
mod test {
  use super::{gauss_legendre_1d, QuadRule};

  use approx::assert_relative_eq;

  #[test]
  fn two_point_rule() {
    let (nodes, weights) = gauss_legendre_1d(2);
    let offset = 0.5 / 3f64.sqrt();
    assert_relative_eq!(nodes[0], 0.5 - offset, epsilon = 1e-14);
    assert_relative_eq!(nodes[1], 0.5 + offset, epsilon = 1e-14);
    assert_relative_eq!(weights[0], 0.5, epsilon = 1e-14);
    assert_relative_eq!(weights[1], 0.5, epsilon = 1e-14);
  }

  #[test]
  fn odd_rule_has_midpoint() {
    let (nodes, weights) = gauss_legendre_1d(3);
    assert_relative_eq!(nodes[1], 0.5, epsilon = 1e-14);
    assert_relative_eq!(weights[1], 4.0 / 9.0, epsilon = 1e-14);
    assert_relative_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
  }

  #[test]
  fn exact_for_maximal_degree() {
    for npoints in 1..=6 {
      let (nodes, weights) = gauss_legendre_1d(npoints);
      let degree = 2 * npoints - 1;
      for p in 0..=degree {
        let integral: f64 = nodes
          .iter()
          .zip(&weights)
          .map(|(x, w)| w * x.powi(p as i32))
          .sum();
        assert_relative_eq!(integral, 1.0 / (p + 1) as f64, epsilon = 1e-13);
      }
    }
  }

  #[test]
  fn tensor_rule_2d() {
    let rule = QuadRule::gauss(2, 3);
    assert_eq!(rule.npoints(), 9);
    assert_eq!(rule.dim(), 2);
    let integral = rule.apply_ref(|x| x[0].powi(4) * x[1].powi(5));
    assert_relative_eq!(integral, 1.0 / 30.0, epsilon = 1e-14);
  }
}
