pub mod config;
pub mod crossover;
pub mod degradation;
pub mod demos;
pub mod electrode_kinetics;
pub mod errors;
pub mod protocols;
pub mod redox_flow_cell;
pub mod results;
pub mod simulation;
pub mod solver;
pub mod units;
