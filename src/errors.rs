//! Error types shared by the cell model, mechanisms, protocols and the driver.
//!
//! Two families are kept apart: [`ConfigError`] is raised before any stepping happens
//! (bad parameters, conflicting options, unreadable configuration), while
//! [`SimulationError`] describes a failure in the middle of a run and ends up in
//! [`crate::results::Termination::Failed`] next to the partial time series.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("conflicting options: {0}")]
    Conflict(String),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Root-finder failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("root is not bracketed: f({lower}) = {f_lower}, f({upper}) = {f_upper}")]
    NotBracketed {
        lower: f64,
        upper: f64,
        f_lower: f64,
        f_upper: f64,
    },
    #[error("no convergence after {iterations} iterations (last estimate {estimate})")]
    NoConvergence { iterations: usize, estimate: f64 },
    #[error("non-finite value encountered at x = {0}")]
    NonFinite(f64),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("current {current} A reaches the limiting current {limit} A")]
    LimitingCurrent { current: f64, limit: f64 },
    #[error("open-circuit voltage is not finite: a redox species is exhausted")]
    ExhaustedSpecies,
    #[error("voltage/current solve failed: {0}")]
    Solver(#[from] SolverError),
    #[error("protocol made no progress after {0} state changes within one time step")]
    ProtocolStalled(usize),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SimulationResult<T> = Result<T, SimulationError>;

/// Fails with `InvalidParameter` unless `value` is finite and strictly positive.
pub fn require_positive(name: &'static str, value: f64) -> ConfigResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::invalid(
            name,
            format!("must be a positive finite number, got {}", value),
        ))
    }
}

/// Fails with `InvalidParameter` unless `value` is finite and not negative.
pub fn require_non_negative(name: &'static str, value: f64) -> ConfigResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::invalid(
            name,
            format!("must be a finite non-negative number, got {}", value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positivity_checks() {
        assert!(require_positive("resistance", 1.0).is_ok());
        assert!(require_positive("resistance", 0.0).is_err());
        assert!(require_positive("resistance", f64::NAN).is_err());
        assert!(require_non_negative("c_ox_cls", 0.0).is_ok());
        assert!(require_non_negative("c_ox_cls", -1e-9).is_err());
    }

    #[test]
    fn messages_name_the_parameter() {
        let err = require_positive("k_0_cls", -1.0).unwrap_err();
        assert!(err.to_string().contains("k_0_cls"));
        let err = SimulationError::from(SolverError::NonFinite(1.0));
        assert!(err.to_string().contains("non-finite"));
    }
}
