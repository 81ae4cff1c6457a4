//! Sparsity patterns and the global linear system.

use crate::{
  constraints::AffineConstraints,
  dof::{DofHandler, DofIdx},
  linalg::{Matrix, Vector},
};

use rayon::prelude::*;
use std::collections::BTreeSet;

/// Growable sparsity pattern, one sorted column set per row.
#[derive(Debug, Clone, Default)]
pub struct DynamicSparsityPattern {
  rows: Vec<BTreeSet<DofIdx>>,
}
impl DynamicSparsityPattern {
  pub fn new(n: usize) -> Self {
    Self {
      rows: vec![BTreeSet::new(); n],
    }
  }

  pub fn nrows(&self) -> usize {
    self.rows.len()
  }
  pub fn nnz(&self) -> usize {
    self.rows.iter().map(BTreeSet::len).sum()
  }
  pub fn contains(&self, r: DofIdx, c: DofIdx) -> bool {
    self.rows[r].contains(&c)
  }
  pub fn row(&self, r: DofIdx) -> &BTreeSet<DofIdx> {
    &self.rows[r]
  }

  pub fn add(&mut self, r: DofIdx, c: DofIdx) {
    assert!(c < self.nrows(), "column {c} out of bounds");
    self.rows[r].insert(c);
  }
  pub fn add_entries(&mut self, r: DofIdx, cols: impl IntoIterator<Item = DofIdx>) {
    for c in cols {
      self.add(r, c);
    }
  }

  pub fn to_pattern(&self) -> nas::pattern::SparsityPattern {
    let n = self.nrows();
    let mut offsets = Vec::with_capacity(n + 1);
    let mut indices = Vec::with_capacity(self.nnz());
    offsets.push(0);
    for row in &self.rows {
      indices.extend(row.iter().copied());
      offsets.push(indices.len());
    }
    nas::pattern::SparsityPattern::try_from_offsets_and_indices(n, n, offsets, indices)
      .expect("rows are sorted and in bounds")
  }
}

/// Couplings of the cell dofs after elimination of the constrained dofs.
///
/// Every row contains its diagonal.
pub fn make_sparsity_pattern(
  dofh: &DofHandler,
  constraints: &AffineConstraints,
) -> DynamicSparsityPattern {
  let mut pattern = DynamicSparsityPattern::new(dofh.ndofs());
  for idof in 0..dofh.ndofs() {
    pattern.add(idof, idof);
  }
  for icell in 0..dofh.ncells() {
    constraints.add_entries_local_to_global(dofh.cell_dofs(icell), &mut pattern);
  }
  tracing::info!(
    "sparsity pattern with {} nonzeros for {} dofs",
    pattern.nnz(),
    pattern.nrows()
  );
  pattern
}

/// Square CSR matrix with a fixed sparsity pattern.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
  csr: nas::CsrMatrix<f64>,
}

impl SparseMatrix {
  pub fn new(pattern: &DynamicSparsityPattern) -> Self {
    let pattern = pattern.to_pattern();
    let values = vec![0.0; pattern.nnz()];
    let csr = nas::CsrMatrix::try_from_pattern_and_values(pattern, values)
      .expect("values match pattern");
    Self { csr }
  }

  pub fn nrows(&self) -> usize {
    self.csr.nrows()
  }
  pub fn ncols(&self) -> usize {
    self.csr.ncols()
  }
  pub fn nnz(&self) -> usize {
    self.csr.nnz()
  }
  pub fn csr(&self) -> &nas::CsrMatrix<f64> {
    &self.csr
  }

  /// Adds to an entry of the pattern.
  ///
  /// Panics for entries outside of the pattern.
  pub fn add(&mut self, r: usize, c: usize, v: f64) {
    match self.csr.get_entry_mut(r, c) {
      Some(nas::SparseEntryMut::NonZero(entry)) => *entry += v,
      _ => panic!("entry ({r},{c}) is outside of the sparsity pattern"),
    }
  }

  pub fn get(&self, r: usize, c: usize) -> f64 {
    self
      .csr
      .get_entry(r, c)
      .map(|entry| entry.into_value())
      .unwrap_or(0.0)
  }

  pub fn set_zero(&mut self) {
    self.csr.values_mut().fill(0.0);
  }

  pub fn diagonal(&self) -> Vector {
    Vector::from_iterator(self.nrows(), (0..self.nrows()).map(|i| self.get(i, i)))
  }

  /// Row `r` as column indices and values.
  pub fn row(&self, r: usize) -> (&[usize], &[f64]) {
    let offsets = self.csr.row_offsets();
    let range = offsets[r]..offsets[r + 1];
    (
      &self.csr.col_indices()[range.clone()],
      &self.csr.values()[range],
    )
  }

  /// $y = A x$, parallel over the rows.
  pub fn apply(&self, x: &Vector, y: &mut Vector) {
    assert_eq!(x.len(), self.ncols());
    assert_eq!(y.len(), self.nrows());
    y.as_mut_slice()
      .par_iter_mut()
      .enumerate()
      .for_each(|(r, yr)| {
        let (cols, values) = self.row(r);
        *yr = cols.iter().zip(values).map(|(&c, &v)| v * x[c]).sum();
      });
  }

  pub fn mul_vec(&self, x: &Vector) -> Vector {
    let mut y = Vector::zeros(self.nrows());
    self.apply(x, &mut y);
    y
  }

  pub fn is_symmetric(&self, eps: f64) -> bool {
    (0..self.nrows()).all(|r| {
      let (cols, values) = self.row(r);
      cols
        .iter()
        .zip(values)
        .all(|(&c, &v)| (v - self.get(c, r)).abs() <= eps * v.abs().max(1.0))
    })
  }

  pub fn to_dense(&self) -> Matrix {
    Matrix::from(&self.csr)
  }

  pub fn to_nalgebra_csc(&self) -> nas::CscMatrix<f64> {
    nas::CscMatrix::from(&self.csr)
  }
}

/// Global stiffness matrix and load vector that the cell systems are distributed into.
#[derive(Debug, Clone)]
pub struct LinearSystem {
  pub matrix: SparseMatrix,
  pub rhs: Vector,
}
impl LinearSystem {
  pub fn new(pattern: &DynamicSparsityPattern) -> Self {
    Self {
      matrix: SparseMatrix::new(pattern),
      rhs: Vector::zeros(pattern.nrows()),
    }
  }
  pub fn ndofs(&self) -> usize {
    self.rhs.len()
  }
  pub fn set_zero(&mut self) {
    self.matrix.set_zero();
    self.rhs.fill(0.0);
  }
}

#[cfg(test)]
pub(crate) mod test {
  use super::{make_sparsity_pattern, DynamicSparsityPattern, SparseMatrix};
  use crate::{
    constraints::{make_zero_boundary_constraints, AffineConstraints},
    dof::DofHandler,
    fe::VectorElement,
    linalg::{Matrix, Vector},
    mesh::cartesian::CartesianMeshInfo,
  };

  /// Stiffness matrix of the 1D Laplacian.
  pub fn tridiagonal(n: usize) -> SparseMatrix {
    let mut pattern = DynamicSparsityPattern::new(n);
    for i in 0..n {
      pattern.add_entries(i, i.saturating_sub(1)..(i + 2).min(n));
    }
    let mut matrix = SparseMatrix::new(&pattern);
    for i in 0..n {
      matrix.add(i, i, 2.0);
      if i > 0 {
        matrix.add(i, i - 1, -1.0);
        matrix.add(i - 1, i, -1.0);
      }
    }
    matrix
  }

  #[test]
  fn matvec_matches_dense() {
    let matrix = tridiagonal(6);
    assert_eq!(matrix.nnz(), 6 + 2 * 5);
    assert!(matrix.is_symmetric(0.0));
    let x = Vector::from_fn(6, |i, _| i as f64 - 1.5);
    assert_eq!(matrix.mul_vec(&x), matrix.to_dense() * &x);
    assert_eq!(matrix.diagonal(), Vector::from_element(6, 2.0));
  }

  #[test]
  #[should_panic(expected = "outside of the sparsity pattern")]
  fn writes_outside_of_pattern_panic() {
    let mut matrix = tridiagonal(4);
    matrix.add(0, 3, 1.0);
  }

  #[test]
  fn set_zero_keeps_pattern() {
    let mut matrix = tridiagonal(3);
    matrix.set_zero();
    assert_eq!(matrix.nnz(), 7);
    assert_eq!(matrix.to_dense(), Matrix::zeros(3, 3));
  }

  #[test]
  fn constrained_rows_hold_only_the_diagonal() {
    let mesh = CartesianMeshInfo::new_unit(2, 2).compute_mesh().unwrap();
    let dofh = DofHandler::new(&mesh, VectorElement::lagrange(2, 2).unwrap()).unwrap();
    let mut constraints = AffineConstraints::new(dofh.ndofs());
    make_zero_boundary_constraints(&dofh, &mut constraints);
    constraints.close().unwrap();

    let pattern = make_sparsity_pattern(&dofh, &constraints);
    for idof in 0..dofh.ndofs() {
      assert!(pattern.contains(idof, idof));
      if constraints.is_constrained(idof) {
        assert_eq!(pattern.row(idof).len(), 1);
      } else {
        assert!(pattern
          .row(idof)
          .iter()
          .all(|&jdof| !constraints.is_constrained(jdof)));
      }
    }
    // pattern is symmetric
    for idof in 0..dofh.ndofs() {
      for &jdof in pattern.row(idof) {
        assert!(pattern.contains(jdof, idof));
      }
    }
  }
}
