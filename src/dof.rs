//! Global numbering of the degrees of freedom.
//!
//! Scalar Lagrange nodes are numbered vertices first, then edges, then cell interiors.
//! Each scalar node carries one dof per vector component, interleaved like the local dofs.

use crate::{
  fe::{TensorLagrange, VectorElement},
  linalg::{Matrix, Vector},
  mesh::{CellIdx, EdgeIdx, QuadMesh, VertexIdx},
  util, Error, Result,
};

pub type DofIdx = usize;
pub type ScalarNodeIdx = usize;

pub struct DofHandler {
  element: VectorElement,
  nvertices: usize,
  nedges: usize,
  nscalar_nodes: usize,
  cell_dofs: Vec<Vec<DofIdx>>,
  /// Position of every scalar node, one column per node.
  support_points: Matrix,
  boundary_scalar_nodes: Vec<ScalarNodeIdx>,
}

impl DofHandler {
  pub fn new(mesh: &QuadMesh, element: VectorElement) -> Result<Self> {
    if element.ncomponents() != mesh.dim() {
      return Err(Error::DimensionMismatch {
        expected: mesh.dim(),
        actual: element.ncomponents(),
      });
    }
    let scalar = element.scalar();
    // edge dofs would need an orientation beyond one per edge
    assert!(scalar.ndofs_per_edge() <= 1);

    let nvertices = mesh.nvertices();
    let nedges = mesh.nedges();
    let ninterior = scalar.ndofs_per_interior();
    let nscalar_nodes = nvertices + nedges * scalar.ndofs_per_edge() + mesh.ncells() * ninterior;

    let mapping = TensorLagrange::new(1)?;
    let mut support_points = Matrix::zeros(mesh.dim(), nscalar_nodes);
    let mut cell_dofs = Vec::with_capacity(mesh.ncells());
    for icell in 0..mesh.ncells() {
      let scalar_nodes = Self::cell_scalar_nodes_impl(mesh, scalar, nvertices, icell);
      let coords = mesh.cell_coords(icell);
      for (ilocal, &inode) in scalar_nodes.iter().enumerate() {
        let xref = Vector::from_column_slice(&scalar.unit_support_point(ilocal));
        let x = &coords * mapping.eval_values(xref.as_view());
        support_points.set_column(inode, &x);
      }

      let dofs = (0..element.ndofs())
        .map(|ilocal| {
          scalar_nodes[element.scalar_index(ilocal)] * element.ncomponents()
            + element.component(ilocal)
        })
        .collect();
      cell_dofs.push(dofs);
    }

    let mut boundary_scalar_nodes = Vec::new();
    for &iedge in mesh.boundary_edges() {
      boundary_scalar_nodes.extend(Self::edge_scalar_nodes_impl(
        mesh, scalar, nvertices, iedge,
      ));
    }
    let boundary_flags = util::indicies_to_flags(&boundary_scalar_nodes, nscalar_nodes);
    let boundary_scalar_nodes = util::flags_to_indicies(&boundary_flags);

    let this = Self {
      element,
      nvertices,
      nedges,
      nscalar_nodes,
      cell_dofs,
      support_points,
      boundary_scalar_nodes,
    };
    tracing::info!(
      "distributed {} dofs on {} cells ({} per cell)",
      this.ndofs(),
      mesh.ncells(),
      this.element.ndofs()
    );
    Ok(this)
  }

  fn cell_scalar_nodes_impl(
    mesh: &QuadMesh,
    scalar: &TensorLagrange,
    nvertices: usize,
    icell: CellIdx,
  ) -> Vec<ScalarNodeIdx> {
    let nedge_dofs = scalar.ndofs_per_edge();
    let ninterior = scalar.ndofs_per_interior();
    let interior_offset = nvertices + mesh.nedges() * nedge_dofs;

    let mut nodes = Vec::with_capacity(scalar.ndofs());
    nodes.extend(mesh.cell_vertices(icell).iter().copied());
    for &iedge in mesh.cell_edges(icell) {
      nodes.extend((0..nedge_dofs).map(|k| nvertices + iedge * nedge_dofs + k));
    }
    nodes.extend((0..ninterior).map(|k| interior_offset + icell * ninterior + k));
    nodes
  }

  fn edge_scalar_nodes_impl(
    mesh: &QuadMesh,
    scalar: &TensorLagrange,
    nvertices: usize,
    iedge: EdgeIdx,
  ) -> Vec<ScalarNodeIdx> {
    let nedge_dofs = scalar.ndofs_per_edge();
    let mut nodes = mesh.edge_vertices(iedge).to_vec();
    nodes.extend((0..nedge_dofs).map(|k| nvertices + iedge * nedge_dofs + k));
    nodes
  }
}

impl DofHandler {
  pub fn element(&self) -> &VectorElement {
    &self.element
  }
  pub fn ncomponents(&self) -> usize {
    self.element.ncomponents()
  }
  pub fn ndofs(&self) -> usize {
    self.nscalar_nodes * self.ncomponents()
  }
  pub fn ndofs_per_cell(&self) -> usize {
    self.element.ndofs()
  }
  pub fn nscalar_nodes(&self) -> usize {
    self.nscalar_nodes
  }
  pub fn ncells(&self) -> usize {
    self.cell_dofs.len()
  }
  pub fn nedges(&self) -> usize {
    self.nedges
  }

  pub fn cell_dofs(&self, icell: CellIdx) -> &[DofIdx] {
    &self.cell_dofs[icell]
  }

  pub fn dof(&self, inode: ScalarNodeIdx, icomp: usize) -> DofIdx {
    inode * self.ncomponents() + icomp
  }
  pub fn dof_component(&self, idof: DofIdx) -> usize {
    idof % self.ncomponents()
  }
  pub fn dof_scalar_node(&self, idof: DofIdx) -> ScalarNodeIdx {
    idof / self.ncomponents()
  }
  pub fn vertex_node(&self, ivertex: VertexIdx) -> ScalarNodeIdx {
    assert!(ivertex < self.nvertices);
    ivertex
  }

  /// Scalar nodes of an edge in the order of the 1D Lagrange nodes:
  /// first vertex, second vertex, interior.
  pub fn edge_scalar_nodes(&self, mesh: &QuadMesh, iedge: EdgeIdx) -> Vec<ScalarNodeIdx> {
    Self::edge_scalar_nodes_impl(mesh, self.element.scalar(), self.nvertices, iedge)
  }

  pub fn support_points(&self) -> &Matrix {
    &self.support_points
  }
  pub fn dof_support_point(&self, idof: DofIdx) -> na::DVectorView<f64> {
    self.support_points.column(self.dof_scalar_node(idof))
  }

  pub fn boundary_scalar_nodes(&self) -> &[ScalarNodeIdx] {
    &self.boundary_scalar_nodes
  }
  pub fn boundary_dofs(&self) -> Vec<DofIdx> {
    self
      .boundary_scalar_nodes
      .iter()
      .flat_map(|&inode| (0..self.ncomponents()).map(move |icomp| (inode, icomp)))
      .map(|(inode, icomp)| self.dof(inode, icomp))
      .collect()
  }
}
