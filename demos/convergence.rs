//! Solves a manufactured elasticity problem on the unit square
//! and determines the algebraic convergence rate of Q1 and Q2.

use lamesolve::{
  config::ElasticityConfig,
  linalg::{CoordRef, Vector},
  material::LameParameters,
  problems::elasticity::ElasticProblem,
  util::algebraic_convergence_rate,
  Result,
};

use std::f64::consts::PI;

const MU: f64 = 1.0;
const LAMBDA: f64 = 10.0;

/// $u_x = u_y = sin(pi x) sin(pi y)$
fn exact_displacement(x: CoordRef) -> Vector {
  let s = (PI * x[0]).sin() * (PI * x[1]).sin();
  Vector::from_vec(vec![s, s])
}

fn manufactured_load(x: CoordRef) -> Vector {
  let (sx, cx) = (PI * x[0]).sin_cos();
  let (sy, cy) = (PI * x[1]).sin_cos();
  let f = PI * PI * ((3.0 * MU + LAMBDA) * sx * sy - (MU + LAMBDA) * cx * cy);
  Vector::from_vec(vec![f, f])
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  for degree in 1..=2 {
    println!("Solving with Q{degree} elements.");
    measure_convergence(degree, 6)?;
  }
  Ok(())
}

fn measure_convergence(degree: usize, nrefinements: usize) -> Result<()> {
  fn print_seperator() {
    let nchar = 56;
    println!("{}", "-".repeat(nchar));
  }

  print_seperator();
  println!(
    "| {:>2} | {:>10} | {:>8} | {:>9} | {:>9} |",
    "k", "mesh width", "ndofs", "L2 error", "conv rate"
  );
  print_seperator();

  let mut errors = Vec::with_capacity(nrefinements);
  for refinement in 1..=nrefinements {
    let config = ElasticityConfig::default()
      .with_domain(0.0, 1.0)
      .with_refinements(refinement)
      .with_degree(degree)
      .with_lame(MU, LAMBDA);
    let lame = LameParameters::constant(MU, LAMBDA);
    let mut problem = ElasticProblem::with_coefficients(config, lame, manufactured_load)?;
    problem.run()?;

    let error = problem.l2_error(exact_displacement)?;
    let conv_rate = errors
      .last()
      .map(|&prev| algebraic_convergence_rate(error, prev))
      .unwrap_or(f64::INFINITY);
    errors.push(error);

    println!(
      "| {:>2} | {:>10.3e} | {:>8} | {:>9.3e} | {:>9.2} |",
      refinement,
      problem.mesh().mesh_width_max(),
      problem.ndofs(),
      error,
      conv_rate
    );
  }
  print_seperator();
  Ok(())
}
