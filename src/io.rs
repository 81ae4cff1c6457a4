//! Output of the displacement field.

use crate::{dof::DofHandler, linalg::Vector, Dim, Error, Result};

use std::path::Path;
use vtkio::{
  model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, ElementType,
    UnstructuredGridPiece, Version, VertexNumbers, Vtk,
  },
  IOBuffer,
};

/// Names of the displacement components.
pub fn component_names(dim: Dim) -> Result<Vec<String>> {
  let names: &[&str] = match dim {
    1 => &["displacement"],
    2 => &["x_displacement", "y_displacement"],
    3 => &["x_displacement", "y_displacement", "z_displacement"],
    _ => return Err(Error::UnsupportedDimension(dim)),
  };
  Ok(names.iter().map(|s| s.to_string()).collect())
}

/// Solution coefficients together with the names of the components.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementField {
  pub values: Vector,
  pub names: Vec<String>,
}
impl DisplacementField {
  pub fn new(values: Vector, dim: Dim) -> Result<Self> {
    let names = component_names(dim)?;
    if values.len() % names.len() != 0 {
      return Err(Error::DimensionMismatch {
        expected: values.len().next_multiple_of(names.len()),
        actual: values.len(),
      });
    }
    Ok(Self { values, names })
  }

  pub fn ncomponents(&self) -> usize {
    self.names.len()
  }
  pub fn len(&self) -> usize {
    self.values.len()
  }
  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

/// Unstructured grid of the scalar nodes, every cell subdivided into
/// `degree x degree` linear quadrilaterals.
pub fn displacement_to_vtk(dofh: &DofHandler, field: &DisplacementField) -> Result<Vtk> {
  Error::check_len(dofh.ndofs(), field.len())?;
  Error::check_len(dofh.ncomponents(), field.ncomponents())?;
  let scalar = dofh.element().scalar();
  let degree = scalar.degree();
  let ncomps = dofh.ncomponents();
  let nnodes = dofh.nscalar_nodes();

  let support_points = dofh.support_points();
  let mut points = Vec::with_capacity(3 * nnodes);
  for x in support_points.column_iter() {
    points.extend((0..3).map(|d| if d < x.len() { x[d] } else { 0.0 }));
  }

  // local scalar node at every lattice position of the reference cell
  let mut lattice = vec![0; (degree + 1) * (degree + 1)];
  for ilocal in 0..scalar.ndofs() {
    let [sx, sy] = scalar.unit_support_point(ilocal);
    let (i, j) = (
      (sx * degree as f64).round() as usize,
      (sy * degree as f64).round() as usize,
    );
    lattice[j * (degree + 1) + i] = ilocal;
  }

  let ncells = dofh.ncells() * degree * degree;
  let mut vertices = Vec::with_capacity(5 * ncells);
  for icell in 0..dofh.ncells() {
    let cell_dofs = dofh.cell_dofs(icell);
    let node = |i: usize, j: usize| {
      let ilocal = lattice[j * (degree + 1) + i];
      dofh.dof_scalar_node(cell_dofs[dofh.element().system_index(ilocal, 0)]) as u32
    };
    for b in 0..degree {
      for a in 0..degree {
        vertices.extend([
          4,
          node(a, b),
          node(a + 1, b),
          node(a + 1, b + 1),
          node(a, b + 1),
        ]);
      }
    }
  }
  let cells = Cells {
    cell_verts: VertexNumbers::Legacy {
      num_cells: ncells as u32,
      vertices,
    },
    types: vec![CellType::Quad; ncells],
  };

  let mut point_attributes = Vec::with_capacity(ncomps + 1);
  for (icomp, name) in field.names.iter().enumerate() {
    let data: Vec<f64> = (0..nnodes)
      .map(|inode| field.values[dofh.dof(inode, icomp)])
      .collect();
    point_attributes.push(Attribute::DataArray(DataArray {
      name: name.clone(),
      elem: ElementType::Scalars {
        num_comp: 1,
        lookup_table: None,
      },
      data: IOBuffer::new(data),
    }));
  }
  let vectors: Vec<f64> = (0..nnodes)
    .flat_map(|inode| {
      (0..3).map(move |d| {
        if d < ncomps {
          field.values[dofh.dof(inode, d)]
        } else {
          0.0
        }
      })
    })
    .collect();
  point_attributes.push(Attribute::DataArray(DataArray {
    name: "displacement".to_string(),
    elem: ElementType::Vectors,
    data: IOBuffer::new(vectors),
  }));

  let grid = UnstructuredGridPiece {
    points: IOBuffer::new(points),
    cells,
    data: Attributes {
      point: point_attributes,
      cell: Vec::new(),
    },
  };

  Ok(Vtk {
    version: Version::new((4, 2)),
    title: String::from("Lamesolve displacement"),
    byte_order: ByteOrder::native(),
    data: grid.into(),
    file_path: None,
  })
}

pub fn write_vtk(path: impl AsRef<Path>, dofh: &DofHandler, field: &DisplacementField) -> Result<()> {
  let path = path.as_ref();
  let vtk = displacement_to_vtk(dofh, field)?;
  vtk.export_ascii(path)?;
  tracing::info!("wrote {}", path.display());
  Ok(())
}
