pub mod elasticity;
