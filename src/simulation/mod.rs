//! Monte Carlo engine: exact Gaussian sampling, antithetic GBM paths and the
//! empirical risk profile of a multi-leg strategy.
pub mod gaussian;
pub mod gbm;
pub mod metrics;
pub mod monte_carlo;

pub use monte_carlo::{run_monte_carlo, SimulationParams, SimulationResult};
