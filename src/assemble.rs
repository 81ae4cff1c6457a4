//! Cell systems of linear elasticity and their assembly into the global system.

use crate::{
  constraints::AffineConstraints,
  dof::DofHandler,
  fe::{CellValues, ElMat, ElVec},
  linalg::Vector,
  material::{BodyForce, LameParameters},
  mesh::{CellIdx, QuadMesh},
  sparse::LinearSystem,
  Error, Result,
};

use rayon::prelude::*;

/// Number of cells whose local systems are computed in parallel
/// before they are distributed into the global system.
pub const ASSEMBLY_CHUNK_SIZE: usize = 256;

/// Computes the local matrix and load vector on the current cell.
pub trait ElSystemProvider: Sync {
  fn eval(&self, values: &CellValues) -> Result<(ElMat, ElVec)>;
}

/// Lamé bilinear form and body force load.
///
/// $a(u, v) = integral mu (nabla u : nabla v + nabla u : nabla v^T) + lambda (div u)(div v)$
/// and $l(v) = integral f dot v$.
pub struct ElasticityElSystem<'a> {
  pub lame: &'a LameParameters,
  pub body_force: &'a dyn BodyForce,
}
impl<'a> ElasticityElSystem<'a> {
  pub fn new(lame: &'a LameParameters, body_force: &'a dyn BodyForce) -> Self {
    Self { lame, body_force }
  }
}

impl ElSystemProvider for ElasticityElSystem<'_> {
  fn eval(&self, values: &CellValues) -> Result<(ElMat, ElVec)> {
    let dim = values.dim();
    if dim != 2 {
      return Err(Error::UnsupportedDimension(dim));
    }
    let element = values.element();
    let ndofs = values.ndofs();
    let nq = values.nqpoints();
    let points = values.quadrature_points();

    let mut mu = vec![0.0; nq];
    let mut lambda = vec![0.0; nq];
    self.lame.value_lists(points, &mut mu, &mut lambda)?;
    let mut force = vec![Vector::zeros(dim); nq];
    self.body_force.vector_value_list(points, &mut force)?;

    let mut elmat = ElMat::zeros(ndofs, ndofs);
    let mut elvec = ElVec::zeros(ndofs);
    for i in 0..ndofs {
      let ci = element.component(i);
      for j in i..ndofs {
        let cj = element.component(j);
        let mut kij = 0.0;
        for q in 0..nq {
          let grad_i = values.shape_grad(i, q);
          let grad_j = values.shape_grad(j, q);
          let mut integrand = mu[q] * grad_i[cj] * grad_j[ci];
          if ci == cj {
            integrand += mu[q] * grad_i.dot(&grad_j);
          }
          integrand += lambda[q] * grad_i[ci] * grad_j[cj];
          kij += integrand * values.jxw(q);
        }
        elmat[(i, j)] = kij;
        elmat[(j, i)] = kij;
      }

      elvec[i] = (0..nq)
        .map(|q| values.shape_value(i, q) * force[q][ci] * values.jxw(q))
        .sum();
    }
    Ok((elmat, elvec))
  }
}

/// Assembles the global system from all cells.
///
/// The cell systems of a chunk of cells are computed in parallel,
/// then distributed in cell order, which makes the result independent
/// of the thread scheduling.
pub fn assemble_system(
  mesh: &QuadMesh,
  dofh: &DofHandler,
  constraints: &AffineConstraints,
  cell_values: &CellValues,
  elsystem: &impl ElSystemProvider,
  system: &mut LinearSystem,
) -> Result<()> {
  Error::check_len(dofh.ndofs(), system.ndofs())?;
  system.set_zero();

  let cells: Vec<CellIdx> = (0..mesh.ncells()).collect();
  for chunk in cells.chunks(ASSEMBLY_CHUNK_SIZE) {
    let local_systems: Vec<Result<(ElMat, ElVec)>> = chunk
      .par_iter()
      .map_init(
        || cell_values.clone(),
        |values, &icell| {
          values.reinit(icell, &mesh.cell_coords(icell))?;
          elsystem.eval(values)
        },
      )
      .collect();

    for (&icell, local_system) in chunk.iter().zip(local_systems) {
      let (elmat, elvec) = local_system?;
      constraints.distribute_local_to_global(&elmat, &elvec, dofh.cell_dofs(icell), system);
    }
  }

  tracing::info!(
    "assembled system with {} dofs and {} nonzeros",
    system.ndofs(),
    system.matrix.nnz()
  );
  Ok(())
}

#[cfg(test)]
mod test {
  use super::{assemble_system, ElSystemProvider, ElasticityElSystem};
  use crate::{
    constraints::{make_zero_boundary_constraints, AffineConstraints},
    dof::DofHandler,
    fe::{CellValues, TensorLagrange, VectorElement},
    linalg::{CoordRef, DMatrixExt, Matrix, Vector},
    material::{BodyForce, LameParameters, TwoDiskSource, ZeroBodyForce},
    mesh::{cartesian::CartesianMeshInfo, QuadMesh},
    quadrature::QuadRule,
    sparse::{make_sparsity_pattern, LinearSystem},
    Error,
  };

  use approx::assert_relative_eq;

  #[rustfmt::skip]
  fn skewed_cell() -> Matrix {
    Matrix::from_column_slice(2, 4, &[
      0.0, 0.0,
      1.0, 0.1,
      0.2, 1.0,
      1.1, 1.3,
    ])
  }

  fn q2_cell_values() -> CellValues {
    let element = VectorElement::lagrange(2, 2).unwrap();
    CellValues::new(element, QuadRule::gauss(2, 3)).unwrap()
  }

  fn unit_force(_x: CoordRef) -> Vector {
    Vector::from_vec(vec![1.0, 0.0])
  }

  #[test]
  fn rigid_motions_are_in_the_kernel() {
    let mut values = q2_cell_values();
    let coords = skewed_cell();
    values.reinit(0, &coords).unwrap();
    let lame = LameParameters::constant(1.0, 3.0);
    let (elmat, elvec) = ElasticityElSystem::new(&lame, &ZeroBodyForce)
      .eval(&values)
      .unwrap();

    assert!(elmat.is_symmetric(0.0));
    assert!(elmat.diagonal().iter().all(|&d| d > 0.0));
    assert_eq!(elvec, Vector::zeros(18));

    let element = values.element().clone();
    let mapping = TensorLagrange::new(1).unwrap();
    let support = |ilocal: usize| {
      let xref = element.scalar().unit_support_point(element.scalar_index(ilocal));
      &coords * mapping.eval_values(Vector::from_column_slice(&xref).as_view())
    };
    let translation = Vector::from_fn(18, |i, _| (element.component(i) == 0) as u8 as f64);
    let rotation = Vector::from_fn(18, |i, _| {
      let x = support(i);
      if element.component(i) == 0 {
        -x[1]
      } else {
        x[0]
      }
    });
    for mode in [translation, rotation] {
      let residual = &elmat * mode;
      assert!(residual.norm() < 1e-12 * elmat.norm());
    }
  }

  #[test]
  fn load_integrates_force() {
    let mut values = q2_cell_values();
    values.reinit(0, &skewed_cell()).unwrap();
    let lame = LameParameters::default();
    let (_, elvec) = ElasticityElSystem::new(&lame, &unit_force)
      .eval(&values)
      .unwrap();

    let area: f64 = (0..values.nqpoints()).map(|q| values.jxw(q)).sum();
    let x_load: f64 = elvec.iter().step_by(2).sum();
    let y_load: f64 = elvec.iter().skip(1).step_by(2).sum();
    assert_relative_eq!(x_load, area, epsilon = 1e-13);
    assert_eq!(y_load, 0.0);
  }

  #[test]
  fn force_point_count_mismatch_is_an_error() {
    struct ShortForce;
    impl BodyForce for ShortForce {
      fn vector_value(&self, x: CoordRef) -> Vector {
        Vector::zeros(x.len())
      }
      fn vector_value_list(&self, points: &Matrix, values: &mut [Vector]) -> crate::Result<()> {
        Error::check_len(points.ncols() + 1, values.len())
      }
    }

    let mut values = q2_cell_values();
    values.reinit(0, &skewed_cell()).unwrap();
    let lame = LameParameters::default();
    let result = ElasticityElSystem::new(&lame, &ShortForce).eval(&values);
    assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
  }

  struct Setup {
    mesh: QuadMesh,
    dofh: DofHandler,
    constraints: AffineConstraints,
    cell_values: CellValues,
  }
  impl Setup {
    fn new(refinements: usize) -> Self {
      let mesh = CartesianMeshInfo::new_hyper_cube(2, -1.0, 1.0)
        .refined(refinements)
        .compute_mesh()
        .unwrap();
      let element = VectorElement::lagrange(2, 2).unwrap();
      let dofh = DofHandler::new(&mesh, element.clone()).unwrap();
      let mut constraints = AffineConstraints::new(dofh.ndofs());
      make_zero_boundary_constraints(&dofh, &mut constraints);
      constraints.close().unwrap();
      let cell_values = CellValues::new(element, QuadRule::gauss(2, 3)).unwrap();
      Self {
        mesh,
        dofh,
        constraints,
        cell_values,
      }
    }

    fn new_system(&self) -> LinearSystem {
      LinearSystem::new(&make_sparsity_pattern(&self.dofh, &self.constraints))
    }

    fn assemble(&self, force: &dyn BodyForce, system: &mut LinearSystem) {
      let lame = LameParameters::default();
      let elsystem = ElasticityElSystem::new(&lame, force);
      assemble_system(
        &self.mesh,
        &self.dofh,
        &self.constraints,
        &self.cell_values,
        &elsystem,
        system,
      )
      .unwrap();
    }
  }

  fn assembled_system(refinements: usize, force: &dyn BodyForce) -> LinearSystem {
    let setup = Setup::new(refinements);
    let mut system = setup.new_system();
    setup.assemble(force, &mut system);
    system
  }

  #[test]
  fn reassembly_is_bit_identical() {
    let first = assembled_system(3, &TwoDiskSource::default());
    let second = assembled_system(3, &TwoDiskSource::default());
    assert_eq!(first.matrix.csr().values(), second.matrix.csr().values());
    assert_eq!(first.rhs, second.rhs);
    assert!(first.matrix.is_symmetric(1e-12));
    assert!(first.rhs.iter().any(|&b| b != 0.0));
  }

  #[test]
  fn reassembly_into_the_same_system_overwrites_it() {
    let setup = Setup::new(3);
    let mut system = setup.new_system();
    setup.assemble(&TwoDiskSource::default(), &mut system);
    let matrix = system.matrix.csr().values().to_vec();
    let rhs = system.rhs.clone();

    setup.assemble(&TwoDiskSource::default(), &mut system);
    assert_eq!(system.matrix.csr().values(), matrix.as_slice());
    assert_eq!(system.rhs, rhs);

    setup.assemble(&ZeroBodyForce, &mut system);
    assert_eq!(system.matrix.csr().values(), matrix.as_slice());
    assert!(system.rhs.iter().all(|&b| b == 0.0));
  }

  #[test]
  fn zero_force_gives_zero_load() {
    let system = assembled_system(2, &ZeroBodyForce);
    assert!(system.rhs.iter().all(|&b| b == 0.0));
    assert!(system.matrix.diagonal().iter().all(|&d| d > 0.0));
    assert!(system.matrix.to_dense().is_spd());
  }
}
