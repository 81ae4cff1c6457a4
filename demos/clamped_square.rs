//! Clamped square $[-1,1]^2$ made of a nearly incompressible material,
//! loaded on three small disks.
//!
//! Writes the displacement to `solution.vtk`.

use lamesolve::{
  config::ElasticityConfig, io, problems::elasticity::ElasticProblem, Result,
};

use std::process::ExitCode;

fn run() -> Result<()> {
  let config = ElasticityConfig::default();
  let mut problem = ElasticProblem::new(config)?;
  println!("Number of active cells:       {}", problem.ncells());
  println!("Number of degrees of freedom: {}", problem.ndofs());

  problem.assemble_system()?;
  let stats = problem.solve()?;
  println!(
    "CG converged in {} iterations, residual {:e}",
    stats.iterations, stats.residual
  );

  let field = problem.output()?;
  io::write_vtk("solution.vtk", problem.dof_handler(), &field)
}

fn main() -> ExitCode {
  tracing_subscriber::fmt::init();

  match run() {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      let separator = "-".repeat(52);
      eprintln!("\n\n{separator}");
      eprintln!("Exception on processing:\n{err}\nAborting!");
      eprintln!("{separator}");
      ExitCode::FAILURE
    }
  }
}
