//! # Simulation configuration files
//!
//! ## Purpose
//! A whole run (cell, protocol, duration and the optional physics) described as one JSON
//! document, so that simulations can be kept next to their results and replayed.
//!
//! ## Main Components
//! - [`SimulationConfig`]: the document itself
//! - [`SimulationConfig::from_file`] / [`SimulationConfig::from_json_str`]: parsing with
//!   line/column reporting of malformed input
//! - [`SimulationConfig::run`]: builds the cell, runs the protocol, returns cell and results
//!
//! ## Format
//! Protocols and mechanisms are externally tagged by their type name:
//! ```json
//! {
//!   "cell": { "volume_cls": 0.005, "volume_ncls": 0.05, "c_ox_cls": 0.01, "c_red_cls": 0.01,
//!             "c_ox_ncls": 0.01, "c_red_ncls": 0.01, "ocv_50_soc": 0.0, "resistance": 1.0,
//!             "k_0_cls": 0.001, "k_0_ncls": 0.001 },
//!   "protocol": { "ConstantCurrent": { "voltage_limit_charge": 0.2,
//!                 "voltage_limit_discharge": -0.2, "current_charge": 0.05,
//!                 "current_discharge": -0.05 } },
//!   "duration": 1000.0,
//!   "cls_degradation": { "ChemicalDegradationReduced": { "rate_order": 1,
//!                        "rate_constant": 0.0001 } }
//! }
//! ```
//! Cell fields with defaults (electrons, time step, transfer coefficients, geometry) may be
//! left out, as may every run option.
//!
//! ## Non-Obvious Features & Tips
//! - nothing is validated while parsing; validation happens in [`SimulationConfig::run`]
//!   so a config can be loaded, edited in code and only then checked
use crate::errors::{ConfigError, ConfigResult};
use crate::protocols::{CyclingProtocol, CyclingProtocolTrait};
use crate::redox_flow_cell::{CellModel, CellParameters};
use crate::results::CyclingResults;
use crate::simulation::RunOptions;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub cell: CellParameters,
    pub protocol: CyclingProtocol,
    /// s
    pub duration: f64,
    #[serde(flatten)]
    pub options: RunOptions,
}

impl SimulationConfig {
    pub fn new(cell: CellParameters, protocol: impl Into<CyclingProtocol>, duration: f64) -> Self {
        SimulationConfig {
            cell,
            protocol: protocol.into(),
            duration,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            error!(
                "Error parsing simulation config at line {}, column {}: {}",
                e.line(),
                e.column(),
                e
            );
            if let Some(problem_line) = json.lines().nth(e.line().saturating_sub(1)) {
                error!("Problematic line: {}", problem_line);
                if e.column() >= 1 && e.column() <= problem_line.len() + 1 {
                    error!("{}", " ".repeat(e.column() - 1) + "^");
                }
            }
            ConfigError::Parse(e)
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            error!("Failed to open file '{}': {}", path.display(), e);
            ConfigError::Io(e)
        })?;
        let config = Self::from_json_str(&json)?;
        info!(
            "Successfully parsed simulation config from file '{}'",
            path.display()
        );
        Ok(config)
    }

    pub fn to_json_string(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        fs::write(path.as_ref(), self.to_json_string()?)?;
        Ok(())
    }

    /// Builds a fresh cell and runs the protocol on it.
    pub fn run(&self) -> ConfigResult<(CellModel, CyclingResults)> {
        let mut cell = CellModel::from_parameters(self.cell.clone())?;
        let results = self.protocol.run(&mut cell, self.duration, &self.options)?;
        Ok((cell, results))
    }
}
