//! Tensor-product Lagrange elements on quadrilaterals
//! and their values on mapped cells.

use crate::{
  linalg::{CoordRef, Matrix, Vector},
  mesh::{CellIdx, NVERTICES_PER_CELL},
  quadrature::QuadRule,
  Dim, Error, Result,
};

pub type ElMat = Matrix;
pub type ElVec = Vector;

/// Lagrange basis on $[0,1]$.
///
/// Nodes are ordered endpoints first, interior nodes last.
#[derive(Debug, Clone)]
pub struct LagrangeBasis1d {
  nodes: Vec<f64>,
}
impl LagrangeBasis1d {
  pub fn new(degree: usize) -> Result<Self> {
    let nodes = match degree {
      1 => vec![0.0, 1.0],
      2 => vec![0.0, 1.0, 0.5],
      _ => return Err(Error::UnsupportedDegree(degree)),
    };
    Ok(Self { nodes })
  }

  pub fn degree(&self) -> usize {
    self.nodes.len() - 1
  }
  pub fn nodes(&self) -> &[f64] {
    &self.nodes
  }

  pub fn value(&self, k: usize, x: f64) -> f64 {
    let xk = self.nodes[k];
    self
      .nodes
      .iter()
      .enumerate()
      .filter(|&(m, _)| m != k)
      .map(|(_, &xm)| (x - xm) / (xk - xm))
      .product()
  }

  pub fn derivative(&self, k: usize, x: f64) -> f64 {
    let xk = self.nodes[k];
    let mut sum = 0.0;
    for (l, &xl) in self.nodes.iter().enumerate() {
      if l == k {
        continue;
      }
      let mut prod = 1.0 / (xk - xl);
      for (m, &xm) in self.nodes.iter().enumerate() {
        if m != k && m != l {
          prod *= (x - xm) / (xk - xm);
        }
      }
      sum += prod;
    }
    sum
  }
}

/// Scalar Lagrange element $Q_p$ on the reference square $[0,1]^2$.
///
/// Local node order: the four vertices (lexicographic),
/// then the nodes on edges x=0, x=1, y=0, y=1, then the interior nodes.
#[derive(Debug, Clone)]
pub struct TensorLagrange {
  basis1d: LagrangeBasis1d,
  /// 1D node index in x and y for every local node.
  tensor_idxs: Vec<[usize; 2]>,
}
impl TensorLagrange {
  pub fn new(degree: usize) -> Result<Self> {
    let basis1d = LagrangeBasis1d::new(degree)?;

    let mut tensor_idxs = vec![[0, 0], [1, 0], [0, 1], [1, 1]];
    let interior: Vec<usize> = (2..=degree).collect();
    for &i in &interior {
      tensor_idxs.push([0, i]);
    }
    for &i in &interior {
      tensor_idxs.push([1, i]);
    }
    for &i in &interior {
      tensor_idxs.push([i, 0]);
    }
    for &i in &interior {
      tensor_idxs.push([i, 1]);
    }
    for &j in &interior {
      for &i in &interior {
        tensor_idxs.push([i, j]);
      }
    }

    Ok(Self {
      basis1d,
      tensor_idxs,
    })
  }

  pub fn dim(&self) -> Dim {
    2
  }
  pub fn degree(&self) -> usize {
    self.basis1d.degree()
  }
  pub fn basis1d(&self) -> &LagrangeBasis1d {
    &self.basis1d
  }
  pub fn ndofs(&self) -> usize {
    self.tensor_idxs.len()
  }
  pub fn ndofs_per_vertex(&self) -> usize {
    1
  }
  pub fn ndofs_per_edge(&self) -> usize {
    self.degree() - 1
  }
  pub fn ndofs_per_interior(&self) -> usize {
    self.ndofs_per_edge().pow(2)
  }

  pub fn unit_support_point(&self, idof: usize) -> [f64; 2] {
    let [i, j] = self.tensor_idxs[idof];
    let nodes = self.basis1d.nodes();
    [nodes[i], nodes[j]]
  }

  pub fn eval_value(&self, idof: usize, x: CoordRef) -> f64 {
    let [i, j] = self.tensor_idxs[idof];
    self.basis1d.value(i, x[0]) * self.basis1d.value(j, x[1])
  }
  pub fn eval_values(&self, x: CoordRef) -> Vector {
    Vector::from_iterator(self.ndofs(), (0..self.ndofs()).map(|i| self.eval_value(i, x)))
  }

  /// Reference gradients, one column per local node.
  pub fn eval_gradients(&self, x: CoordRef) -> Matrix {
    let mut grads = Matrix::zeros(self.dim(), self.ndofs());
    for (idof, &[i, j]) in self.tensor_idxs.iter().enumerate() {
      let (vi, vj) = (self.basis1d.value(i, x[0]), self.basis1d.value(j, x[1]));
      grads[(0, idof)] = self.basis1d.derivative(i, x[0]) * vj;
      grads[(1, idof)] = vi * self.basis1d.derivative(j, x[1]);
    }
    grads
  }
}

/// Vector-valued element: one scalar element copied for every component.
///
/// The dofs of the components are interleaved per support point:
/// local index `i` is scalar node `i / ncomponents` of component `i % ncomponents`.
#[derive(Debug, Clone)]
pub struct VectorElement {
  scalar: TensorLagrange,
  ncomponents: usize,
}
impl VectorElement {
  pub fn new(scalar: TensorLagrange, ncomponents: usize) -> Self {
    Self {
      scalar,
      ncomponents,
    }
  }
  pub fn lagrange(degree: usize, ncomponents: usize) -> Result<Self> {
    Ok(Self::new(TensorLagrange::new(degree)?, ncomponents))
  }

  pub fn scalar(&self) -> &TensorLagrange {
    &self.scalar
  }
  pub fn degree(&self) -> usize {
    self.scalar.degree()
  }
  pub fn ncomponents(&self) -> usize {
    self.ncomponents
  }
  pub fn ndofs(&self) -> usize {
    self.scalar.ndofs() * self.ncomponents
  }

  pub fn component(&self, ilocal: usize) -> usize {
    ilocal % self.ncomponents
  }
  pub fn scalar_index(&self, ilocal: usize) -> usize {
    ilocal / self.ncomponents
  }
  pub fn system_index(&self, iscalar: usize, icomp: usize) -> usize {
    iscalar * self.ncomponents + icomp
  }
}

/// Shape function values, gradients and integration weights
/// of a vector element on the current cell.
///
/// The geometry is the bilinear map of the four cell vertices.
#[derive(Debug, Clone)]
pub struct CellValues {
  element: VectorElement,
  quad: QuadRule,

  /// Reference values of the scalar basis, one column per quadrature point.
  ref_values: Matrix,
  ref_gradients: Vec<Matrix>,
  mapping_values: Matrix,
  mapping_gradients: Vec<Matrix>,

  quadrature_points: Matrix,
  gradients: Vec<Matrix>,
  jxw: Vector,
}

impl CellValues {
  pub fn new(element: VectorElement, quad: QuadRule) -> Result<Self> {
    let dim = quad.dim();
    if dim != element.scalar().dim() {
      return Err(Error::UnsupportedDimension(dim));
    }
    if element.ncomponents() != dim {
      return Err(Error::DimensionMismatch {
        expected: dim,
        actual: element.ncomponents(),
      });
    }

    let mapping = TensorLagrange::new(1)?;
    let scalar = element.scalar();
    let nq = quad.npoints();

    let mut ref_values = Matrix::zeros(scalar.ndofs(), nq);
    let mut mapping_values = Matrix::zeros(NVERTICES_PER_CELL, nq);
    let mut ref_gradients = Vec::with_capacity(nq);
    let mut mapping_gradients = Vec::with_capacity(nq);
    for iq in 0..nq {
      let x = quad.node(iq);
      ref_values.set_column(iq, &scalar.eval_values(x));
      mapping_values.set_column(iq, &mapping.eval_values(x));
      ref_gradients.push(scalar.eval_gradients(x));
      mapping_gradients.push(mapping.eval_gradients(x));
    }

    let gradients = ref_gradients.clone();
    Ok(Self {
      element,
      quad,
      ref_values,
      ref_gradients,
      mapping_values,
      mapping_gradients,
      quadrature_points: Matrix::zeros(dim, nq),
      gradients,
      jxw: Vector::zeros(nq),
    })
  }

  /// Recomputes the mapped quantities for a cell given by its vertex coordinates.
  pub fn reinit(&mut self, icell: CellIdx, cell_coords: &Matrix) -> Result<()> {
    assert_eq!(cell_coords.ncols(), NVERTICES_PER_CELL);

    self.quadrature_points = cell_coords * &self.mapping_values;
    for iq in 0..self.nqpoints() {
      let jacobian = cell_coords * self.mapping_gradients[iq].transpose();
      let det = jacobian.determinant();
      let inv = jacobian.try_inverse().filter(|_| det.abs() > 0.0);
      let Some(inv) = inv else {
        tracing::warn!("degenerate jacobian on cell {icell}");
        return Err(Error::DegenerateCell(icell));
      };
      self.gradients[iq] = inv.transpose() * &self.ref_gradients[iq];
      self.jxw[iq] = det.abs() * self.quad.weights()[iq];
    }
    Ok(())
  }

  pub fn element(&self) -> &VectorElement {
    &self.element
  }
  pub fn dim(&self) -> Dim {
    self.quad.dim()
  }
  pub fn ndofs(&self) -> usize {
    self.element.ndofs()
  }
  pub fn nqpoints(&self) -> usize {
    self.quad.npoints()
  }
  pub fn quadrature_points(&self) -> &Matrix {
    &self.quadrature_points
  }
  pub fn jxw(&self, iq: usize) -> f64 {
    self.jxw[iq]
  }

  /// Value of the nonzero component of shape function `ilocal`.
  pub fn shape_value(&self, ilocal: usize, iq: usize) -> f64 {
    self.ref_values[(self.element.scalar_index(ilocal), iq)]
  }
  /// Gradient of the nonzero component of shape function `ilocal`.
  pub fn shape_grad(&self, ilocal: usize, iq: usize) -> CoordRef {
    self.gradients[iq].column(self.element.scalar_index(ilocal))
  }
}
