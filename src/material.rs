//! Lamé coefficients and body forces.

use crate::{
  linalg::{CoordRef, Matrix, Vector},
  Dim, Error, Result,
};

/// Scalar function of the position.
pub trait Coefficient: Sync {
  fn value(&self, x: CoordRef) -> f64;

  /// Evaluates at every column of `points`.
  fn value_list(&self, points: &Matrix, values: &mut [f64]) -> Result<()> {
    Error::check_len(points.ncols(), values.len())?;
    for (value, x) in values.iter_mut().zip(points.column_iter()) {
      *value = self.value(x);
    }
    Ok(())
  }
}

impl<F> Coefficient for F
where
  F: Fn(CoordRef) -> f64 + Sync,
{
  fn value(&self, x: CoordRef) -> f64 {
    self(x)
  }
}

#[derive(Debug, Clone, Copy)]
pub struct ConstantCoefficient(pub f64);
impl Coefficient for ConstantCoefficient {
  fn value(&self, _x: CoordRef) -> f64 {
    self.0
  }
}

/// Shear modulus $mu$ and volumetric modulus $lambda$.
pub struct LameParameters {
  pub mu: Box<dyn Coefficient>,
  pub lambda: Box<dyn Coefficient>,
}
impl LameParameters {
  pub fn new(mu: impl Coefficient + 'static, lambda: impl Coefficient + 'static) -> Self {
    Self {
      mu: Box::new(mu),
      lambda: Box::new(lambda),
    }
  }
  pub fn constant(mu: f64, lambda: f64) -> Self {
    Self::new(ConstantCoefficient(mu), ConstantCoefficient(lambda))
  }

  pub fn value_lists(&self, points: &Matrix, mu: &mut [f64], lambda: &mut [f64]) -> Result<()> {
    self.mu.value_list(points, mu)?;
    self.lambda.value_list(points, lambda)
  }
}
impl Default for LameParameters {
  /// Nearly incompressible material.
  fn default() -> Self {
    Self::constant(1.0, 1e7)
  }
}

/// Vector valued volume load $f$.
pub trait BodyForce: Sync {
  fn vector_value(&self, x: CoordRef) -> Vector;

  fn vector_value_list(&self, points: &Matrix, values: &mut [Vector]) -> Result<()> {
    Error::check_len(points.ncols(), values.len())?;
    for (value, x) in values.iter_mut().zip(points.column_iter()) {
      *value = self.vector_value(x);
    }
    Ok(())
  }
}

impl<F> BodyForce for F
where
  F: Fn(CoordRef) -> Vector + Sync,
{
  fn vector_value(&self, x: CoordRef) -> Vector {
    self(x)
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroBodyForce;
impl BodyForce for ZeroBodyForce {
  fn vector_value(&self, x: CoordRef) -> Vector {
    Vector::zeros(x.len())
  }
}

/// Unit loads on small disks.
///
/// The x-component is one on the disks around $(plus.minus 1/2, 0)$,
/// the y-component is one on the disk around the origin.
#[derive(Debug, Clone, Copy)]
pub struct TwoDiskSource {
  pub radius: f64,
  pub offset: f64,
}
impl Default for TwoDiskSource {
  fn default() -> Self {
    Self {
      radius: 0.2,
      offset: 0.5,
    }
  }
}
impl TwoDiskSource {
  fn check_dim(dim: Dim) -> Result<()> {
    if dim < 2 {
      Err(Error::UnsupportedDimension(dim))
    } else {
      Ok(())
    }
  }

  fn eval(&self, x: CoordRef) -> Vector {
    let r2 = self.radius * self.radius;
    let dist2 = |center_x: f64| {
      (x[0] - center_x).powi(2) + x.iter().skip(1).map(|c| c * c).sum::<f64>()
    };

    let mut value = Vector::zeros(x.len());
    if dist2(self.offset) < r2 || dist2(-self.offset) < r2 {
      value[0] = 1.0;
    }
    if x.norm_squared() < r2 {
      value[1] = 1.0;
    }
    value
  }
}
impl BodyForce for TwoDiskSource {
  /// Panics for points of dimension below two, use [`BodyForce::vector_value_list`]
  /// for a checked evaluation.
  fn vector_value(&self, x: CoordRef) -> Vector {
    assert!(x.len() >= 2, "two disk source needs at least two dimensions");
    self.eval(x)
  }

  fn vector_value_list(&self, points: &Matrix, values: &mut [Vector]) -> Result<()> {
    Error::check_len(points.ncols(), values.len())?;
    Self::check_dim(points.nrows())?;
    for (value, x) in values.iter_mut().zip(points.column_iter()) {
      *value = self.eval(x);
    }
    Ok(())
  }
}
