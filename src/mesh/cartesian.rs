use super::{QuadMesh, VertexIdx, NVERTICES_PER_CELL};
use crate::{
  linalg::{Matrix, Vector},
  Dim, Error, Result,
};

/// converts linear index to cartesian index
///
/// converts linear index in 0..dim_len^d to cartesian index in (0)^d..(dim_len)^d
pub fn linear_index2cartesian_index(
  mut lin_idx: usize,
  dim_len: usize,
  dim: usize,
) -> Vector<usize> {
  let mut cart_idx = Vector::zeros(dim);
  for icomp in 0..dim {
    cart_idx[icomp] = lin_idx % dim_len;
    lin_idx /= dim_len;
  }
  cart_idx
}

/// converts cartesian index to linear index
///
/// converts cartesian index in (0)^d..(dim_len)^d to linear index in 0..dim_len^d
pub fn cartesian_index2linear_index(cart_idx: Vector<usize>, dim_len: usize) -> usize {
  let dim = cart_idx.len();
  let mut lin_idx = 0;
  for icomp in (0..dim).rev() {
    lin_idx *= dim_len;
    lin_idx += cart_idx[icomp];
  }
  lin_idx
}

pub struct Rect {
  min: Vector,
  max: Vector,
}

impl Rect {
  pub fn new_min_max(min: Vector, max: Vector) -> Self {
    assert!(min.len() == max.len());
    Self { min, max }
  }
  pub fn new_unit_cube(dim: Dim) -> Self {
    Self::new_hyper_cube(dim, 0.0, 1.0)
  }
  pub fn new_hyper_cube(dim: Dim, left: f64, right: f64) -> Self {
    let min = Vector::from_element(dim, left);
    let max = Vector::from_element(dim, right);
    Self { min, max }
  }

  pub fn dim(&self) -> usize {
    self.min.len()
  }
  pub fn min(&self) -> &Vector {
    &self.min
  }
  pub fn max(&self) -> &Vector {
    &self.max
  }
  pub fn side_lengths(&self) -> Vector {
    &self.max - &self.min
  }
}

/// Tensor-product box mesh of quadrilaterals.
///
/// Stands in for a mesh generator with uniform global refinement:
/// every refinement splits each cell into $2^d$ children.
pub struct CartesianMeshInfo {
  rect: Rect,
  ncells_axis: usize,
}
// constructors
impl CartesianMeshInfo {
  pub fn new_min_max(min: Vector, max: Vector, ncells_axis: usize) -> Self {
    let rect = Rect::new_min_max(min, max);
    Self { rect, ncells_axis }
  }
  pub fn new_unit(dim: Dim, ncells_axis: usize) -> Self {
    let rect = Rect::new_unit_cube(dim);
    Self { rect, ncells_axis }
  }
  /// The single cell $[left, right]^d$.
  pub fn new_hyper_cube(dim: Dim, left: f64, right: f64) -> Self {
    let rect = Rect::new_hyper_cube(dim, left, right);
    Self {
      rect,
      ncells_axis: 1,
    }
  }

  pub fn refine_global(&mut self, nrefinements: usize) {
    self.ncells_axis *= 2usize.pow(nrefinements as u32);
  }
  pub fn refined(mut self, nrefinements: usize) -> Self {
    self.refine_global(nrefinements);
    self
  }
}
// getters
impl CartesianMeshInfo {
  pub fn rect(&self) -> &Rect {
    &self.rect
  }
  pub fn dim(&self) -> usize {
    self.rect.dim()
  }
  pub fn ncells_axis(&self) -> usize {
    self.ncells_axis
  }
  pub fn nvertices_axis(&self) -> usize {
    self.ncells_axis + 1
  }
  pub fn ncells(&self) -> usize {
    self.ncells_axis.pow(self.dim() as u32)
  }
  pub fn nvertices(&self) -> usize {
    self.nvertices_axis().pow(self.dim() as u32)
  }
  pub fn vertex_cart_idx(&self, ivertex: VertexIdx) -> Vector<usize> {
    linear_index2cartesian_index(ivertex, self.nvertices_axis(), self.dim())
  }
  pub fn vertex_pos(&self, ivertex: VertexIdx) -> Vector {
    (self.vertex_cart_idx(ivertex).cast::<f64>() / self.ncells_axis as f64)
      .component_mul(&self.rect.side_lengths())
      + self.rect.min()
  }
}

impl CartesianMeshInfo {
  pub fn compute_mesh(&self) -> Result<QuadMesh> {
    let dim = self.dim();
    if dim != 2 {
      return Err(Error::UnsupportedDimension(dim));
    }

    let mut coords = Matrix::zeros(dim, self.nvertices());
    for (ivertex, mut coord) in coords.column_iter_mut().enumerate() {
      coord.copy_from(&self.vertex_pos(ivertex));
    }

    let cells = (0..self.ncells())
      .map(|icell| {
        let origin = linear_index2cartesian_index(icell, self.ncells_axis, dim);

        // lexicographic order of the box corners
        let mut cell = [0; NVERTICES_PER_CELL];
        for (ilocal, vertex) in cell.iter_mut().enumerate() {
          let shift = linear_index2cartesian_index(ilocal, 2, dim);
          *vertex = cartesian_index2linear_index(&origin + shift, self.nvertices_axis());
        }
        cell
      })
      .collect();

    QuadMesh::new(coords, cells)
  }
}

#[cfg(test)]
mod test {
  use super::CartesianMeshInfo;
  use crate::linalg::Matrix;

  #[test]
  fn unit_square_mesh() {
    let mesh = CartesianMeshInfo::new_unit(2, 2).compute_mesh().unwrap();

    #[rustfmt::skip]
    let expected_coords = Matrix::from_column_slice(2, 9, &[
      0.0, 0.0,
      0.5, 0.0,
      1.0, 0.0,
      0.0, 0.5,
      0.5, 0.5,
      1.0, 0.5,
      0.0, 1.0,
      0.5, 1.0,
      1.0, 1.0,
    ]);
    assert_eq!(*mesh.coords(), expected_coords);

    let expected_cells = vec![[0, 1, 3, 4], [1, 2, 4, 5], [3, 4, 6, 7], [4, 5, 7, 8]];
    assert_eq!(mesh.cells(), expected_cells);

    assert_eq!(mesh.nedges(), 12);
    assert!(mesh.hanging_edges().is_empty());
    assert_eq!(mesh.boundary_edges().len(), 8);
    assert_eq!(mesh.boundary_vertices(), [0, 1, 2, 3, 5, 6, 7, 8]);
  }

  #[test]
  fn global_refinement() {
    let mut info = CartesianMeshInfo::new_hyper_cube(2, -1.0, 1.0);
    info.refine_global(4);
    assert_eq!(info.ncells_axis(), 16);
    assert_eq!(info.ncells(), 256);

    let mesh = info.compute_mesh().unwrap();
    assert_eq!(mesh.ncells(), 256);
    assert_eq!(mesh.nvertices(), 17 * 17);
    assert_eq!(mesh.boundary_vertices().len(), 4 * 16);
    approx::assert_relative_eq!(mesh.mesh_width_max(), 2.0 / 16.0);
    assert_eq!(mesh.vertex_coord(0)[0], -1.0);
    assert_eq!(mesh.vertex_coord(mesh.nvertices() - 1)[1], 1.0);
  }

  #[test]
  fn only_two_dimensions() {
    let info = CartesianMeshInfo::new_unit(3, 1);
    assert!(matches!(
      info.compute_mesh(),
      Err(crate::Error::UnsupportedDimension(3))
    ));
  }
}
