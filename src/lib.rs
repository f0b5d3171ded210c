pub mod config;
pub mod errors;
pub mod execution;
pub mod models;
pub mod optimizer;
pub mod risk;
pub mod server;
pub mod simulation;
pub mod state;
