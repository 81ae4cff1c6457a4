//! Quadrilateral meshes.
//!
//! The mesh is a fixed collaborator of the solver: it only exposes
//! the active cells, their vertices and the edge topology that is needed
//! for numbering the degrees of freedom and for finding the boundary and
//! non-conforming (hanging) interfaces.

pub mod cartesian;

use crate::{
  linalg::{CoordRef, Matrix, Vector},
  Dim, Error, Result,
};

use indexmap::IndexMap;
use itertools::Itertools;

pub type VertexIdx = usize;
pub type EdgeIdx = usize;
pub type CellIdx = usize;

pub const NVERTICES_PER_CELL: usize = 4;
pub const NEDGES_PER_CELL: usize = 4;

/// Local vertices of the cell edges.
///
/// Cell vertices are ordered lexicographically on the reference square:
/// (0,0), (1,0), (0,1), (1,1).
/// The edges are ordered x=0, x=1, y=0, y=1.
pub const CELL_EDGES: [[usize; 2]; NEDGES_PER_CELL] = [[0, 2], [1, 3], [0, 1], [2, 3]];

/// A coarse edge that is refined on its other side.
///
/// `fine[0]` joins the first vertex of the coarse edge with `midpoint`,
/// `fine[1]` joins `midpoint` with the second vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HangingEdge {
  pub coarse: EdgeIdx,
  pub midpoint: VertexIdx,
  pub fine: [EdgeIdx; 2],
}

#[derive(Debug, Clone)]
pub struct QuadMesh {
  /// Vertex coordinates, one column per vertex.
  coords: Matrix,
  cells: Vec<[VertexIdx; NVERTICES_PER_CELL]>,
  /// Sorted vertex pair of every edge and the cells containing it.
  edges: IndexMap<[VertexIdx; 2], Vec<CellIdx>>,
  cell_edges: Vec<[EdgeIdx; NEDGES_PER_CELL]>,
  hanging_edges: Vec<HangingEdge>,
  boundary_edges: Vec<EdgeIdx>,
}

impl QuadMesh {
  pub fn new(coords: Matrix, cells: Vec<[VertexIdx; NVERTICES_PER_CELL]>) -> Result<Self> {
    let dim = coords.nrows();
    if dim != 2 {
      return Err(Error::UnsupportedDimension(dim));
    }
    let nvertices = coords.ncols();
    assert!(
      cells.iter().flatten().all(|&v| v < nvertices),
      "cell refers to vertex outside of mesh"
    );

    let mut edges: IndexMap<[VertexIdx; 2], Vec<CellIdx>> = IndexMap::new();
    let mut cell_edges = Vec::with_capacity(cells.len());
    for (icell, cell) in cells.iter().enumerate() {
      let mut this_edges = [0; NEDGES_PER_CELL];
      for (iedge, [a, b]) in CELL_EDGES.iter().enumerate() {
        let key = sorted_pair(cell[*a], cell[*b]);
        let entry = edges.entry(key);
        this_edges[iedge] = entry.index();
        entry.or_default().push(icell);
      }
      cell_edges.push(this_edges);
    }

    let mut mesh = Self {
      coords,
      cells,
      edges,
      cell_edges,
      hanging_edges: Vec::new(),
      boundary_edges: Vec::new(),
    };
    mesh.hanging_edges = mesh.find_hanging_edges();

    let mut interface_edges = vec![false; mesh.nedges()];
    for hanging in &mesh.hanging_edges {
      interface_edges[hanging.coarse] = true;
      interface_edges[hanging.fine[0]] = true;
      interface_edges[hanging.fine[1]] = true;
    }
    mesh.boundary_edges = (0..mesh.nedges())
      .filter(|&iedge| mesh.edge_cells(iedge).len() == 1 && !interface_edges[iedge])
      .collect();

    Ok(mesh)
  }

  /// Edges with a single adjacent cell whose midpoint is a vertex
  /// splitting two other single-cell edges.
  fn find_hanging_edges(&self) -> Vec<HangingEdge> {
    let single_cell_edges: Vec<EdgeIdx> = (0..self.nedges())
      .filter(|&iedge| self.edge_cells(iedge).len() == 1)
      .collect();

    let mut neighbours = vec![Vec::new(); self.nvertices()];
    for &iedge in &single_cell_edges {
      let [a, b] = self.edge_vertices(iedge);
      neighbours[a].push(b);
      neighbours[b].push(a);
    }

    let mut hanging_edges = Vec::new();
    for &iedge in &single_cell_edges {
      let [a, b] = self.edge_vertices(iedge);
      let midpoint = (self.vertex_coord(a) + self.vertex_coord(b)) / 2.0;
      let tol = 1e-10 * (self.vertex_coord(a) - self.vertex_coord(b)).norm();

      let found = neighbours[a].iter().copied().find(|&h| {
        h != b
          && neighbours[b].contains(&h)
          && (self.vertex_coord(h) - &midpoint).norm() <= tol
      });
      if let Some(h) = found {
        let fine = [
          self.edges.get_index_of(&sorted_pair(a, h)),
          self.edges.get_index_of(&sorted_pair(h, b)),
        ];
        if let [Some(fine0), Some(fine1)] = fine {
          hanging_edges.push(HangingEdge {
            coarse: iedge,
            midpoint: h,
            fine: [fine0, fine1],
          });
        }
      }
    }
    if !hanging_edges.is_empty() {
      tracing::info!("mesh has {} hanging edges", hanging_edges.len());
    }
    hanging_edges
  }
}

// getters
impl QuadMesh {
  pub fn dim(&self) -> Dim {
    self.coords.nrows()
  }
  pub fn nvertices(&self) -> usize {
    self.coords.ncols()
  }
  pub fn nedges(&self) -> usize {
    self.edges.len()
  }
  pub fn ncells(&self) -> usize {
    self.cells.len()
  }
  pub fn coords(&self) -> &Matrix {
    &self.coords
  }
  pub fn vertex_coord(&self, ivertex: VertexIdx) -> CoordRef {
    self.coords.column(ivertex)
  }
  pub fn cells(&self) -> &[[VertexIdx; NVERTICES_PER_CELL]] {
    &self.cells
  }
  pub fn cell_vertices(&self, icell: CellIdx) -> &[VertexIdx; NVERTICES_PER_CELL] {
    &self.cells[icell]
  }
  pub fn cell_edges(&self, icell: CellIdx) -> &[EdgeIdx; NEDGES_PER_CELL] {
    &self.cell_edges[icell]
  }
  /// Vertex coordinates of a cell, one column per local vertex.
  pub fn cell_coords(&self, icell: CellIdx) -> Matrix {
    let vertices = self.cell_vertices(icell);
    Matrix::from_fn(self.dim(), NVERTICES_PER_CELL, |r, c| {
      self.coords[(r, vertices[c])]
    })
  }
  pub fn edge_vertices(&self, iedge: EdgeIdx) -> [VertexIdx; 2] {
    *self.edges.get_index(iedge).expect("edge index in range").0
  }
  pub fn edge_cells(&self, iedge: EdgeIdx) -> &[CellIdx] {
    self.edges.get_index(iedge).expect("edge index in range").1
  }
  pub fn hanging_edges(&self) -> &[HangingEdge] {
    &self.hanging_edges
  }
  pub fn boundary_edges(&self) -> &[EdgeIdx] {
    &self.boundary_edges
  }
  pub fn boundary_vertices(&self) -> Vec<VertexIdx> {
    self
      .boundary_edges
      .iter()
      .flat_map(|&iedge| self.edge_vertices(iedge))
      .sorted_unstable()
      .dedup()
      .collect()
  }

  pub fn edge_length(&self, iedge: EdgeIdx) -> f64 {
    let [a, b] = self.edge_vertices(iedge);
    (self.vertex_coord(a) - self.vertex_coord(b)).norm()
  }
  pub fn mesh_width_max(&self) -> f64 {
    (0..self.nedges())
      .map(|iedge| self.edge_length(iedge))
      .fold(0.0, f64::max)
  }

  pub fn cell_barycenter(&self, icell: CellIdx) -> Vector {
    self.cell_coords(icell).column_mean()
  }
}

fn sorted_pair(a: VertexIdx, b: VertexIdx) -> [VertexIdx; 2] {
  if a < b {
    [a, b]
  } else {
    [b, a]
  }
}

#[cfg(test)]
pub(crate) mod test {
  use super::QuadMesh;
  use crate::linalg::Matrix;

  /// One coarse cell on `[0,1]x[0,2]` next to two fine cells on `[1,2]x[0,2]`.
  pub fn nonconforming_mesh() -> QuadMesh {
    #[rustfmt::skip]
    let coords = Matrix::from_column_slice(2, 8, &[
      0.0, 0.0,
      1.0, 0.0,
      0.0, 2.0,
      1.0, 2.0,
      1.0, 1.0,
      2.0, 0.0,
      2.0, 1.0,
      2.0, 2.0,
    ]);
    let cells = vec![[0, 1, 2, 3], [1, 5, 4, 6], [4, 6, 3, 7]];
    QuadMesh::new(coords, cells).unwrap()
  }

  #[test]
  fn hanging_edge_detection() {
    let mesh = nonconforming_mesh();
    assert_eq!(mesh.hanging_edges().len(), 1);
    let hanging = &mesh.hanging_edges()[0];
    assert_eq!(mesh.edge_vertices(hanging.coarse), [1, 3]);
    assert_eq!(hanging.midpoint, 4);
    assert_eq!(mesh.edge_vertices(hanging.fine[0]), [1, 4]);
    assert_eq!(mesh.edge_vertices(hanging.fine[1]), [3, 4]);

    assert_eq!(mesh.boundary_edges().len(), 7);
    assert_eq!(mesh.boundary_vertices(), [0, 1, 2, 3, 5, 6, 7]);
  }

  #[test]
  fn edges_are_shared() {
    let mesh = nonconforming_mesh();
    // 4 + 4 + 4 cell edges, fine cells share edge (4,6)
    assert_eq!(mesh.nedges(), 11);
    let shared = mesh.cell_edges(1)[3];
    assert_eq!(mesh.cell_edges(2)[2], shared);
    assert_eq!(mesh.edge_cells(shared), [1, 2]);
  }

  #[test]
  fn only_planar_meshes() {
    let coords = Matrix::zeros(3, 4);
    assert!(matches!(
      QuadMesh::new(coords, vec![[0, 1, 2, 3]]),
      Err(crate::Error::UnsupportedDimension(3))
    ));
  }
}
