pub type Vector<T = f64> = na::DVector<T>;
pub type Matrix<T = f64> = na::DMatrix<T>;
pub type CoordRef<'a> = na::DVectorView<'a, f64>;

pub trait DMatrixExt {
  fn is_symmetric(&self, eps: f64) -> bool;
  fn is_spd(&self) -> bool;
}
impl DMatrixExt for Matrix {
  fn is_symmetric(&self, eps: f64) -> bool {
    self.is_square() && (self - self.transpose()).amax() <= eps * self.amax().max(1.0)
  }
  fn is_spd(&self) -> bool {
    self.is_symmetric(1e-12) && na::Cholesky::new(self.clone()).is_some()
  }
}

#[cfg(test)]
mod test {
  use super::{DMatrixExt, Matrix};

  #[test]
  fn spd_detection() {
    #[rustfmt::skip]
    let spd = Matrix::from_row_slice(2, 2, &[
       2.0, -1.0,
      -1.0,  2.0,
    ]);
    assert!(spd.is_spd());

    #[rustfmt::skip]
    let indefinite = Matrix::from_row_slice(2, 2, &[
      1.0, 2.0,
      2.0, 1.0,
    ]);
    assert!(indefinite.is_symmetric(0.0));
    assert!(!indefinite.is_spd());
  }
}
