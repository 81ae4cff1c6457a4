//! Affine constraints between degrees of freedom.
//!
//! A constrained dof $x_i$ is given by $x_i = sum_j c_(i j) x_j + g_i$.
//! Constrained dofs are eliminated while the local systems are
//! distributed into the global one, and are reconstructed from the
//! free dofs after the solve.

use crate::{
  dof::{DofHandler, DofIdx, ScalarNodeIdx},
  fe::{ElMat, ElVec},
  linalg::{CoordRef, Vector},
  mesh::QuadMesh,
  sparse::{DynamicSparsityPattern, LinearSystem},
  Error, Result,
};

use itertools::Itertools;

/// Coefficients below this magnitude are dropped from constraint lines.
const COEFF_TOL: f64 = 1e-14;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintLine {
  pub entries: Vec<(DofIdx, f64)>,
  pub inhomogeneity: f64,
}

#[derive(Debug, Clone)]
pub struct AffineConstraints {
  lines: Vec<Option<ConstraintLine>>,
  closed: bool,
}

impl AffineConstraints {
  pub fn new(ndofs: usize) -> Self {
    Self {
      lines: vec![None; ndofs],
      closed: false,
    }
  }

  pub fn ndofs(&self) -> usize {
    self.lines.len()
  }
  pub fn nconstraints(&self) -> usize {
    self.lines.iter().filter(|l| l.is_some()).count()
  }
  pub fn is_closed(&self) -> bool {
    self.closed
  }
  pub fn is_constrained(&self, idof: DofIdx) -> bool {
    self.lines[idof].is_some()
  }
  pub fn line(&self, idof: DofIdx) -> Option<&ConstraintLine> {
    self.lines[idof].as_ref()
  }
  pub fn constrained_dofs(&self) -> impl Iterator<Item = DofIdx> + '_ {
    self
      .lines
      .iter()
      .enumerate()
      .filter_map(|(idof, line)| line.as_ref().map(|_| idof))
  }

  /// Constrains `idof` to zero. Existing lines are kept.
  pub fn add_line(&mut self, idof: DofIdx) {
    assert!(!self.closed, "constraints are already closed");
    self.lines[idof].get_or_insert_with(ConstraintLine::default);
  }
  pub fn add_entry(&mut self, idof: DofIdx, jdof: DofIdx, coeff: f64) {
    assert!(!self.closed, "constraints are already closed");
    assert!(jdof < self.ndofs());
    let line = self.lines[idof]
      .as_mut()
      .expect("add_line must be called before add_entry");
    line.entries.push((jdof, coeff));
  }
  pub fn set_inhomogeneity(&mut self, idof: DofIdx, value: f64) {
    assert!(!self.closed, "constraints are already closed");
    let line = self.lines[idof]
      .as_mut()
      .expect("add_line must be called before set_inhomogeneity");
    line.inhomogeneity = value;
  }

  /// Resolves chains of constraints, such that every line only refers to free dofs.
  ///
  /// Lines are substituted into each other pass by pass.
  /// A line that still refers to constrained dofs after as many passes as there are
  /// constraints, or that refers to its own dof, is part of a cycle.
  pub fn close(&mut self) -> Result<()> {
    if self.closed {
      return Ok(());
    }
    let constrained: Vec<DofIdx> = self.constrained_dofs().collect();
    let max_passes = constrained.len();

    for &idof in &constrained {
      let Some(mut line) = self.lines[idof].clone() else {
        continue;
      };
      let mut npasses = 0;
      while line.entries.iter().any(|&(j, _)| self.is_constrained(j)) {
        if npasses == max_passes || line.entries.iter().any(|&(j, _)| j == idof) {
          tracing::warn!("cyclic constraint on dof {idof}");
          return Err(Error::CyclicConstraint(idof));
        }
        let mut entries = Vec::with_capacity(line.entries.len());
        for (j, c) in std::mem::take(&mut line.entries) {
          match &self.lines[j] {
            Some(other) => {
              line.inhomogeneity += c * other.inhomogeneity;
              entries.extend(other.entries.iter().map(|&(k, ck)| (k, c * ck)));
            }
            None => entries.push((j, c)),
          }
        }
        line.entries = merge_entries(entries);
        npasses += 1;
      }
      line.entries = merge_entries(line.entries);
      self.lines[idof] = Some(line);
    }

    self.closed = true;
    tracing::info!("closed {} constraints", constrained.len());
    Ok(())
  }

  /// Global dofs and weights that a dof contributes to, together with its inhomogeneity.
  ///
  /// A free dof contributes to itself with weight one.
  pub fn resolve(&self, idof: DofIdx) -> (Vec<(DofIdx, f64)>, f64) {
    match &self.lines[idof] {
      Some(line) => (line.entries.clone(), line.inhomogeneity),
      None => (vec![(idof, 1.0)], 0.0),
    }
  }

  /// Marks all global pairs written by [`Self::distribute_local_to_global`] for a cell.
  pub fn add_entries_local_to_global(&self, dofs: &[DofIdx], pattern: &mut DynamicSparsityPattern) {
    let resolved: Vec<_> = dofs.iter().map(|&idof| self.resolve(idof).0).collect();
    for (&idof, targets_i) in dofs.iter().zip(&resolved) {
      pattern.add(idof, idof);
      for &(gi, _) in targets_i {
        for targets_j in &resolved {
          pattern.add_entries(gi, targets_j.iter().map(|&(gj, _)| gj));
        }
      }
    }
  }

  /// Adds a cell system to the global one while eliminating the constrained dofs.
  ///
  /// Constrained rows and columns receive no coupling entries. Instead every
  /// constrained row gets the mean absolute diagonal of the cell matrix on its
  /// diagonal and the matching multiple of its inhomogeneity on the right hand side.
  pub fn distribute_local_to_global(
    &self,
    elmat: &ElMat,
    elvec: &ElVec,
    dofs: &[DofIdx],
    system: &mut LinearSystem,
  ) {
    assert!(self.closed, "constraints must be closed before distribution");
    let n = dofs.len();
    assert_eq!(elmat.nrows(), n);
    assert_eq!(elmat.ncols(), n);
    assert_eq!(elvec.len(), n);

    let resolved: Vec<_> = dofs.iter().map(|&idof| self.resolve(idof)).collect();

    let mean_diagonal = elmat.diagonal().abs().sum() / n as f64;
    let constrained_diagonal = if mean_diagonal > 0.0 {
      mean_diagonal
    } else {
      1.0
    };

    for (i, (targets_i, _)) in resolved.iter().enumerate() {
      for &(gi, ci) in targets_i {
        system.rhs[gi] += ci * elvec[i];
        for (j, (targets_j, inhomogeneity_j)) in resolved.iter().enumerate() {
          let kij = elmat[(i, j)];
          for &(gj, cj) in targets_j {
            system.matrix.add(gi, gj, ci * cj * kij);
          }
          system.rhs[gi] -= ci * kij * inhomogeneity_j;
        }
      }

      if let Some(line) = self.line(dofs[i]) {
        system.matrix.add(dofs[i], dofs[i], constrained_diagonal);
        system.rhs[dofs[i]] += constrained_diagonal * line.inhomogeneity;
      }
    }
  }

  /// Sets every constrained entry of `solution` from the free entries.
  pub fn distribute(&self, solution: &mut Vector) {
    assert!(self.closed, "constraints must be closed before distribution");
    assert_eq!(solution.len(), self.ndofs());
    for (idof, line) in self.lines.iter().enumerate() {
      if let Some(line) = line {
        solution[idof] = line.inhomogeneity
          + line
            .entries
            .iter()
            .map(|&(j, c)| c * solution[j])
            .sum::<f64>();
      }
    }
  }

  /// Sets every constrained entry of `vector` to zero.
  pub fn set_zero(&self, vector: &mut Vector) {
    for idof in self.constrained_dofs() {
      vector[idof] = 0.0;
    }
  }
}

/// Sums duplicate dofs and drops vanishing coefficients.
fn merge_entries(entries: Vec<(DofIdx, f64)>) -> Vec<(DofIdx, f64)> {
  entries
    .into_iter()
    .sorted_by_key(|&(j, _)| j)
    .coalesce(|(a, ca), (b, cb)| {
      if a == b {
        Ok((a, ca + cb))
      } else {
        Err(((a, ca), (b, cb)))
      }
    })
    .filter(|&(_, c)| c.abs() > COEFF_TOL)
    .collect()
}

/// Constrains the nodes on the fine side of every hanging edge
/// to the trace of the coarse side.
///
/// A fine node at parameter $t$ along the coarse edge gets the values of the
/// coarse 1D Lagrange basis at $t$ as coefficients.
/// Nodes that are already constrained are left untouched.
pub fn make_hanging_node_constraints(
  mesh: &QuadMesh,
  dofh: &DofHandler,
  constraints: &mut AffineConstraints,
) {
  let basis = dofh.element().scalar().basis1d().clone();
  let support_points = dofh.support_points();
  let mut nconstrained = 0;

  for hanging in mesh.hanging_edges() {
    let coarse_nodes = dofh.edge_scalar_nodes(mesh, hanging.coarse);
    let (a, b) = (coarse_nodes[0], coarse_nodes[1]);
    let xa = support_points.column(a);
    let tangent = support_points.column(b) - xa;

    let fine_nodes: Vec<ScalarNodeIdx> = hanging
      .fine
      .iter()
      .flat_map(|&iedge| dofh.edge_scalar_nodes(mesh, iedge))
      .filter(|&inode| inode != a && inode != b)
      .unique()
      .collect();

    for inode in fine_nodes {
      let t = (support_points.column(inode) - xa).dot(&tangent) / tangent.norm_squared();
      for icomp in 0..dofh.ncomponents() {
        let idof = dofh.dof(inode, icomp);
        if constraints.is_constrained(idof) {
          continue;
        }
        constraints.add_line(idof);
        for (k, &knode) in coarse_nodes.iter().enumerate() {
          let coeff = basis.value(k, t);
          if coeff.abs() > COEFF_TOL {
            constraints.add_entry(idof, dofh.dof(knode, icomp), coeff);
          }
        }
        nconstrained += 1;
      }
    }
  }
  if nconstrained > 0 {
    tracing::info!("constrained {nconstrained} hanging dofs");
  }
}

/// Constrains every boundary dof to `boundary_value(x, component)`
/// evaluated at its support point.
///
/// Dofs that are already constrained are skipped.
pub fn interpolate_boundary_values<F>(
  dofh: &DofHandler,
  boundary_value: F,
  constraints: &mut AffineConstraints,
) where
  F: Fn(CoordRef, usize) -> f64,
{
  let mut nconstrained = 0;
  for idof in dofh.boundary_dofs() {
    if constraints.is_constrained(idof) {
      continue;
    }
    let value = boundary_value(dofh.dof_support_point(idof), dofh.dof_component(idof));
    constraints.add_line(idof);
    constraints.set_inhomogeneity(idof, value);
    nconstrained += 1;
  }
  tracing::info!("constrained {nconstrained} boundary dofs");
}

/// Clamps the whole boundary.
pub fn make_zero_boundary_constraints(dofh: &DofHandler, constraints: &mut AffineConstraints) {
  interpolate_boundary_values(dofh, |_, _| 0.0, constraints);
}

#[cfg(test)]
mod test {
  use super::{
    interpolate_boundary_values, make_hanging_node_constraints, make_zero_boundary_constraints,
    AffineConstraints,
  };
  use crate::{
    dof::DofHandler,
    fe::VectorElement,
    linalg::{Matrix, Vector},
    mesh::{cartesian::CartesianMeshInfo, test::nonconforming_mesh},
    sparse::{DynamicSparsityPattern, LinearSystem},
    Error,
  };

  use approx::assert_relative_eq;

  #[test]
  fn distribute_sets_inhomogeneities() {
    let mut constraints = AffineConstraints::new(4);
    constraints.add_line(0);
    constraints.set_inhomogeneity(0, 2.0);
    constraints.add_line(3);
    constraints.add_entry(3, 1, 0.5);
    constraints.add_entry(3, 2, 0.5);
    constraints.set_inhomogeneity(3, 1.0);
    assert!(!constraints.is_closed());
    constraints.close().unwrap();
    assert!(constraints.is_closed());
    assert_eq!(constraints.nconstraints(), 2);

    let mut x = Vector::zeros(4);
    constraints.distribute(&mut x);
    assert_eq!(x.as_slice(), [2.0, 0.0, 0.0, 1.0]);

    let mut x = Vector::from_vec(vec![7.0, 2.0, 4.0, 7.0]);
    constraints.distribute(&mut x);
    assert_eq!(x.as_slice(), [2.0, 2.0, 4.0, 4.0]);
  }

  #[test]
  fn chains_are_resolved() {
    let mut constraints = AffineConstraints::new(4);
    constraints.add_line(0);
    constraints.add_entry(0, 1, 2.0);
    constraints.add_line(1);
    constraints.add_entry(1, 2, 3.0);
    constraints.add_entry(1, 3, 1.0);
    constraints.set_inhomogeneity(1, 1.0);
    constraints.add_line(3);
    constraints.add_entry(3, 2, -1.0);
    constraints.close().unwrap();

    let line = constraints.line(0).unwrap();
    assert_eq!(line.entries.len(), 1);
    assert_eq!(line.entries[0].0, 2);
    assert_relative_eq!(line.entries[0].1, 4.0);
    assert_relative_eq!(line.inhomogeneity, 2.0);
    for idof in constraints.constrained_dofs() {
      let line = constraints.line(idof).unwrap();
      assert!(line.entries.iter().all(|&(j, _)| !constraints.is_constrained(j)));
    }
  }

  #[test]
  fn cycles_are_detected() {
    let mut constraints = AffineConstraints::new(3);
    constraints.add_line(0);
    constraints.add_entry(0, 1, 1.0);
    constraints.add_line(1);
    constraints.add_entry(1, 0, 0.5);
    assert!(matches!(
      constraints.close(),
      Err(Error::CyclicConstraint(0))
    ));
  }

  #[test]
  fn constrained_column_is_eliminated() {
    let mut constraints = AffineConstraints::new(2);
    constraints.add_line(1);
    constraints.set_inhomogeneity(1, 3.0);
    constraints.close().unwrap();

    let dofs = [0, 1];
    let mut pattern = DynamicSparsityPattern::new(2);
    constraints.add_entries_local_to_global(&dofs, &mut pattern);
    assert_eq!(pattern.nnz(), 2);

    let mut system = LinearSystem::new(&pattern);
    let elmat = Matrix::from_row_slice(2, 2, &[2.0, -1.0, -1.0, 2.0]);
    let elvec = Vector::from_vec(vec![1.0, 1.0]);
    constraints.distribute_local_to_global(&elmat, &elvec, &dofs, &mut system);

    let dense = system.matrix.to_dense();
    assert_eq!(dense, Matrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 2.0]));
    assert_eq!(system.rhs.as_slice(), [4.0, 6.0]);
  }

  #[test]
  fn hanging_nodes_interpolate_coarse_trace() {
    let mesh = nonconforming_mesh();
    let dofh = DofHandler::new(&mesh, VectorElement::lagrange(2, 2).unwrap()).unwrap();
    let mut constraints = AffineConstraints::new(dofh.ndofs());
    make_hanging_node_constraints(&mesh, &dofh, &mut constraints);
    // midpoint vertex and the two fine edge nodes, two components each
    assert_eq!(constraints.nconstraints(), 6);

    let hanging = &mesh.hanging_edges()[0];
    let coarse_nodes = dofh.edge_scalar_nodes(&mesh, hanging.coarse);
    let line = constraints.line(dofh.dof(dofh.vertex_node(hanging.midpoint), 1)).unwrap();
    assert_eq!(line.entries, [(dofh.dof(coarse_nodes[2], 1), 1.0)]);

    let fine_node = dofh.edge_scalar_nodes(&mesh, hanging.fine[0])[2];
    let line = constraints.line(dofh.dof(fine_node, 0)).unwrap();
    let expected = [
      (dofh.dof(coarse_nodes[0], 0), 0.375),
      (dofh.dof(coarse_nodes[1], 0), -0.125),
      (dofh.dof(coarse_nodes[2], 0), 0.75),
    ];
    for ((j, c), (ej, ec)) in line.entries.iter().zip(expected) {
      assert_eq!(*j, ej);
      assert_relative_eq!(*c, ec, epsilon = 1e-14);
    }

    constraints.close().unwrap();
    let field = |x: f64, y: f64| [y * y - x, 2.0 * y];
    let mut u = Vector::zeros(dofh.ndofs());
    for idof in 0..dofh.ndofs() {
      let x = dofh.dof_support_point(idof);
      u[idof] = field(x[0], x[1])[dofh.dof_component(idof)];
    }
    let exact = u.clone();
    constraints.set_zero(&mut u);
    constraints.distribute(&mut u);
    for idof in 0..dofh.ndofs() {
      assert_relative_eq!(u[idof], exact[idof], epsilon = 1e-12);
    }
  }

  #[test]
  fn boundary_values_skip_constrained_dofs() {
    let mesh = CartesianMeshInfo::new_unit(2, 2).compute_mesh().unwrap();
    let dofh = DofHandler::new(&mesh, VectorElement::lagrange(1, 2).unwrap()).unwrap();
    let mut constraints = AffineConstraints::new(dofh.ndofs());
    let first = dofh.boundary_dofs()[0];
    constraints.add_line(first);
    constraints.set_inhomogeneity(first, -1.0);

    interpolate_boundary_values(&dofh, |x, icomp| x[icomp] + 1.0, &mut constraints);
    assert_eq!(constraints.nconstraints(), dofh.boundary_dofs().len());
    constraints.close().unwrap();

    let mut u = Vector::zeros(dofh.ndofs());
    constraints.distribute(&mut u);
    assert_eq!(u[first], -1.0);
    for idof in dofh.boundary_dofs().into_iter().skip(1) {
      let x = dofh.dof_support_point(idof);
      assert_eq!(u[idof], x[dofh.dof_component(idof)] + 1.0);
    }
  }

  #[test]
  fn clamped_boundary_distributes_to_zero() {
    let mesh = CartesianMeshInfo::new_hyper_cube(2, -1.0, 1.0)
      .refined(2)
      .compute_mesh()
      .unwrap();
    let dofh = DofHandler::new(&mesh, VectorElement::lagrange(2, 2).unwrap()).unwrap();
    let mut constraints = AffineConstraints::new(dofh.ndofs());
    make_hanging_node_constraints(&mesh, &dofh, &mut constraints);
    assert_eq!(constraints.nconstraints(), 0);
    make_zero_boundary_constraints(&dofh, &mut constraints);
    constraints.close().unwrap();

    let mut u = Vector::from_element(dofh.ndofs(), 5.0);
    constraints.distribute(&mut u);
    for idof in dofh.boundary_dofs() {
      assert_eq!(u[idof], 0.0);
    }
    assert_eq!(u.iter().filter(|&&v| v == 5.0).count(), 2 * 7 * 7);
  }
}
