//! Linear elastostatics of a clamped body.
//!
//! Find the displacement $u$ with $-div sigma(u) = f$ in $Omega$ and $u = 0$ on $diff Omega$,
//! where $sigma(u) = mu (nabla u + nabla u^T) + lambda (div u) I$.

use crate::{
  assemble::{self, ElasticityElSystem},
  config::{ElasticityConfig, PreconditionerKind},
  constraints::{self, AffineConstraints},
  dof::DofHandler,
  fe::{CellValues, VectorElement},
  io::DisplacementField,
  linalg::{CoordRef, Vector},
  material::{BodyForce, LameParameters, TwoDiskSource},
  mesh::{cartesian::CartesianMeshInfo, CellIdx, QuadMesh},
  quadrature::QuadRule,
  solver::{
    ConjugateGradient, FaerCholesky, IdentityPreconditioner, JacobiPreconditioner, SolverStats,
    SsorPreconditioner,
  },
  sparse::{self, LinearSystem},
  Error, Result,
};

pub struct ElasticProblem {
  config: ElasticityConfig,
  mesh: QuadMesh,
  dofh: DofHandler,
  constraints: AffineConstraints,
  system: LinearSystem,
  solution: Vector,
  lame: LameParameters,
  body_force: Box<dyn BodyForce>,
}

impl ElasticProblem {
  /// Clamped box of the configuration, loaded by the two disk source.
  pub fn new(config: ElasticityConfig) -> Result<Self> {
    let lame = LameParameters::constant(config.mu, config.lambda);
    Self::with_coefficients(config, lame, TwoDiskSource::default())
  }

  pub fn with_coefficients(
    config: ElasticityConfig,
    lame: LameParameters,
    body_force: impl BodyForce + 'static,
  ) -> Result<Self> {
    let mesh = CartesianMeshInfo::new_hyper_cube(config.dim, config.left, config.right)
      .refined(config.nrefinements)
      .compute_mesh()?;
    Self::from_mesh(mesh, config, lame, body_force)
  }

  /// Problem on a given mesh, which may contain hanging edges.
  ///
  /// The box and refinement of `config` are ignored.
  pub fn from_mesh(
    mesh: QuadMesh,
    config: ElasticityConfig,
    lame: LameParameters,
    body_force: impl BodyForce + 'static,
  ) -> Result<Self> {
    if let PreconditionerKind::Ssor { relaxation } = config.preconditioner {
      SsorPreconditioner::check_relaxation(relaxation)?;
    }
    tracing::info!("number of active cells: {}", mesh.ncells());
    let element = VectorElement::lagrange(config.degree, mesh.dim())?;
    let dofh = DofHandler::new(&mesh, element)?;

    let (constraints, system) = Self::setup_system(&mesh, &dofh)?;
    let solution = Vector::zeros(dofh.ndofs());
    Ok(Self {
      config,
      mesh,
      dofh,
      constraints,
      system,
      solution,
      lame,
      body_force: Box::new(body_force),
    })
  }

  fn setup_system(mesh: &QuadMesh, dofh: &DofHandler) -> Result<(AffineConstraints, LinearSystem)> {
    let mut constraints = AffineConstraints::new(dofh.ndofs());
    constraints::make_hanging_node_constraints(mesh, dofh, &mut constraints);
    constraints::make_zero_boundary_constraints(dofh, &mut constraints);
    constraints.close()?;

    let pattern = sparse::make_sparsity_pattern(dofh, &constraints);
    let system = LinearSystem::new(&pattern);
    Ok((constraints, system))
  }

  fn cell_values(&self, npoints: usize) -> Result<CellValues> {
    let quad = QuadRule::gauss(self.mesh.dim(), npoints);
    CellValues::new(self.dofh.element().clone(), quad)
  }

  pub fn assemble_system(&mut self) -> Result<()> {
    let cell_values = self.cell_values(self.config.degree + 1)?;
    let elsystem = ElasticityElSystem::new(&self.lame, self.body_force.as_ref());
    assemble::assemble_system(
      &self.mesh,
      &self.dofh,
      &self.constraints,
      &cell_values,
      &elsystem,
      &mut self.system,
    )
  }

  /// Conjugate gradients from a zero initial guess,
  /// followed by the reconstruction of the constrained dofs.
  pub fn solve(&mut self) -> Result<SolverStats> {
    let cg = ConjugateGradient::new(self.config.solver);
    let matrix = &self.system.matrix;
    let rhs = &self.system.rhs;
    let mut x = Vector::zeros(self.dofh.ndofs());
    let stats = match self.config.preconditioner {
      PreconditionerKind::Identity => cg.solve(matrix, &mut x, rhs, &IdentityPreconditioner),
      PreconditionerKind::Jacobi => {
        cg.solve(matrix, &mut x, rhs, &JacobiPreconditioner::new(matrix))
      }
      PreconditionerKind::Ssor { relaxation } => {
        cg.solve(matrix, &mut x, rhs, &SsorPreconditioner::new(matrix, relaxation)?)
      }
    }?;
    self.constraints.distribute(&mut x);
    self.solution = x;
    Ok(stats)
  }

  /// Sparse Cholesky solve of the assembled system.
  pub fn solve_direct(&mut self) -> Result<()> {
    let mut x = FaerCholesky::new(&self.system.matrix)?.solve(&self.system.rhs);
    self.constraints.distribute(&mut x);
    self.solution = x;
    Ok(())
  }

  pub fn output(&self) -> Result<DisplacementField> {
    DisplacementField::new(self.solution.clone(), self.mesh.dim())
  }

  pub fn run(&mut self) -> Result<DisplacementField> {
    tracing::info!("number of degrees of freedom: {}", self.dofh.ndofs());
    self.assemble_system()?;
    self.solve()?;
    self.output()
  }
}

// post-processing
impl ElasticProblem {
  /// $norm(u - u_h)_(L^2)$ by quadrature with two more points per direction
  /// than the assembly.
  pub fn l2_error<F>(&self, exact: F) -> Result<f64>
  where
    F: Fn(CoordRef) -> Vector,
  {
    let mut values = self.cell_values(self.config.degree + 3)?;
    let element = self.dofh.element().clone();
    let mut error2 = 0.0;
    for icell in 0..self.mesh.ncells() {
      values.reinit(icell, &self.mesh.cell_coords(icell))?;
      let dofs = self.dofh.cell_dofs(icell);
      for q in 0..values.nqpoints() {
        let mut diff = exact(values.quadrature_points().column(q));
        Error::check_len(self.mesh.dim(), diff.len())?;
        for (i, &idof) in dofs.iter().enumerate() {
          diff[element.component(i)] -= values.shape_value(i, q) * self.solution[idof];
        }
        error2 += diff.norm_squared() * values.jxw(q);
      }
    }
    Ok(error2.sqrt())
  }

  /// Displacement at the point of a cell with reference coordinates `xref`.
  pub fn displacement_at(&self, icell: CellIdx, xref: CoordRef) -> Vector {
    let element = self.dofh.element();
    let shape_values = element.scalar().eval_values(xref);
    let mut value = Vector::zeros(element.ncomponents());
    for (i, &idof) in self.dofh.cell_dofs(icell).iter().enumerate() {
      value[element.component(i)] += shape_values[element.scalar_index(i)] * self.solution[idof];
    }
    value
  }
}

// getters
impl ElasticProblem {
  pub fn config(&self) -> &ElasticityConfig {
    &self.config
  }
  pub fn mesh(&self) -> &QuadMesh {
    &self.mesh
  }
  pub fn dof_handler(&self) -> &DofHandler {
    &self.dofh
  }
  pub fn constraints(&self) -> &AffineConstraints {
    &self.constraints
  }
  pub fn system(&self) -> &LinearSystem {
    &self.system
  }
  pub fn solution(&self) -> &Vector {
    &self.solution
  }
  pub fn ncells(&self) -> usize {
    self.mesh.ncells()
  }
  pub fn ndofs(&self) -> usize {
    self.dofh.ndofs()
  }
}

/// Runs the clamped problem of the configuration.
pub fn run(config: ElasticityConfig) -> Result<DisplacementField> {
  ElasticProblem::new(config)?.run()
}
