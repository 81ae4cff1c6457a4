extern crate nalgebra as na;
extern crate nalgebra_sparse as nas;

pub mod assemble;
pub mod config;
pub mod constraints;
pub mod dof;
pub mod error;
pub mod fe;
pub mod io;
pub mod linalg;
pub mod material;
pub mod mesh;
pub mod problems;
pub mod quadrature;
pub mod solver;
pub mod sparse;
pub mod util;

pub use error::{Error, Result};

pub type Dim = usize;
