//! # Cycling protocols
//!
//! State machines that decide, step by step, what the cell is driven with and when the
//! direction changes.
//!
//! ## Main Components
//! - [`CyclingProtocolTrait`]: per-step decision ([`CyclingProtocolTrait::evaluate`]), post-step
//!   transition ([`CyclingProtocolTrait::after_step`]) and the [`CyclingProtocolTrait::run`]
//!   entry point shared by every protocol
//! - [`CyclingProtocol`]: enum over [`ConstantCurrent`], [`ConstantCurrentConstantVoltage`] and
//!   [`ConstantVoltage`], dispatched with `enum_dispatch` and deserializable from JSON
//! - [`ProtocolState`]: CC/CV charge/discharge; each protocol uses the subset it needs
//!
//! ## Key Features
//! - Positive current is charge. Charge currents and cutoffs are positive, discharge currents and
//!   cutoffs negative.
//! - A step is either taken ([`StepDecision::Apply`]) or replaced by a state change
//!   ([`StepDecision::Transition`]) after which the driver asks again within the same step.
//!   The driver allows at most [`crate::simulation::MAX_TRANSITIONS_PER_STEP`] of those.
//!
//! ## Non-Obvious Features & Tips
//! - Constant current: the step whose voltage crosses the limit is recorded and the direction
//!   flips from the next step on. A step that would exceed the limiting current or exhaust a
//!   reactant is never taken; the direction flips at once.
//! - Constant current + constant voltage: a CC step that would cross the voltage limit is not
//!   taken, the step is redone in CV at the limit, so recorded voltages never pass the limit.
//! - In CV the current is solved from the held voltage and the hold ends once the signed current
//!   passes the cutoff (falls to or below it when charging, rises to or above it when
//!   discharging).
//! - A hold also ends, without taking the step, when its current would exhaust a reactant within
//!   the step or when the held voltage cannot be reached below the limiting current.
use crate::errors::{ConfigError, ConfigResult, SimulationError, SimulationResult, SolverError};
use crate::redox_flow_cell::{CellModel, CellPotential};
use crate::results::CyclingResults;
use crate::simulation::{RunOptions, drive};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

pub mod constant_current;
pub mod constant_current_constant_voltage;
pub mod constant_voltage;

pub use constant_current::ConstantCurrent;
pub use constant_current_constant_voltage::ConstantCurrentConstantVoltage;
pub use constant_voltage::ConstantVoltage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Charge,
    Discharge,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Charge => Direction::Discharge,
            Direction::Discharge => Direction::Charge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolState {
    CcCharge,
    CvCharge,
    CcDischarge,
    CvDischarge,
}

impl ProtocolState {
    pub fn constant_current(direction: Direction) -> Self {
        match direction {
            Direction::Charge => ProtocolState::CcCharge,
            Direction::Discharge => ProtocolState::CcDischarge,
        }
    }

    pub fn constant_voltage(direction: Direction) -> Self {
        match direction {
            Direction::Charge => ProtocolState::CvCharge,
            Direction::Discharge => ProtocolState::CvDischarge,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            ProtocolState::CcCharge | ProtocolState::CvCharge => Direction::Charge,
            ProtocolState::CcDischarge | ProtocolState::CvDischarge => Direction::Discharge,
        }
    }

    pub fn is_constant_voltage(self) -> bool {
        matches!(self, ProtocolState::CvCharge | ProtocolState::CvDischarge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepDecision {
    /// take the step at this operating point
    Apply(CellPotential),
    /// change state and decide again
    Transition(ProtocolState),
}

#[enum_dispatch]
pub trait CyclingProtocolTrait {
    fn name(&self) -> String;
    fn validate(&self) -> ConfigResult<()>;
    fn initial_state(&self) -> ProtocolState;
    /// What to do with the next step of length `dt` in `state`.
    fn evaluate(
        &self,
        state: ProtocolState,
        cell: &CellModel,
        dt: f64,
    ) -> SimulationResult<StepDecision>;
    /// State for the next step once a step at `potential` has been taken.
    fn after_step(&self, state: ProtocolState, _potential: &CellPotential) -> ProtocolState {
        state
    }
    /// Cycles `cell` for `duration` seconds.
    fn run(
        &self,
        cell: &mut CellModel,
        duration: f64,
        options: &RunOptions,
    ) -> ConfigResult<CyclingResults> {
        drive(self, cell, duration, options)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[enum_dispatch(CyclingProtocolTrait)]
pub enum CyclingProtocol {
    ConstantCurrent(ConstantCurrent),
    ConstantCurrentConstantVoltage(ConstantCurrentConstantVoltage),
    ConstantVoltage(ConstantVoltage),
}

////////////////////////////// SHARED STEP LOGIC //////////////////////////////

/// Operating point for a constant-current step, `None` if the step cannot be taken because the
/// current reaches the limiting current or would exhaust a reactant.
pub(crate) fn constant_current_step(
    cell: &CellModel,
    current: f64,
    dt: f64,
) -> SimulationResult<Option<CellPotential>> {
    if !cell.step_is_feasible(current, dt) {
        return Ok(None);
    }
    match cell.cell_potential(current) {
        Ok(potential) => Ok(Some(potential)),
        Err(SimulationError::LimitingCurrent { .. }) => Ok(None),
        Err(other) => Err(other),
    }
}

/// Holds `voltage` for a step of length `dt` and decides between taking the step and leaving
/// the hold for `next`.
pub(crate) fn constant_voltage_step(
    cell: &CellModel,
    voltage: f64,
    direction: Direction,
    current_cutoff: f64,
    dt: f64,
    next: ProtocolState,
) -> SimulationResult<StepDecision> {
    let potential = match cell.potential_at_voltage(voltage) {
        Ok(potential) => potential,
        // only reachable at the mass-transport limit
        Err(SimulationError::Solver(SolverError::NotBracketed { .. })) => {
            return Ok(StepDecision::Transition(next));
        }
        Err(other) => return Err(other),
    };
    let passed_cutoff = match direction {
        Direction::Charge => potential.current <= current_cutoff,
        Direction::Discharge => potential.current >= current_cutoff,
    };
    let hold_ended = passed_cutoff || !cell.step_is_feasible(potential.current, dt);
    if hold_ended {
        Ok(StepDecision::Transition(next))
    } else {
        Ok(StepDecision::Apply(potential))
    }
}

pub(crate) fn validate_voltage_limits(charge: f64, discharge: f64) -> ConfigResult<()> {
    if !charge.is_finite() || !discharge.is_finite() {
        return Err(ConfigError::invalid(
            "voltage_limit",
            "voltage limits must be finite",
        ));
    }
    if charge <= discharge {
        return Err(ConfigError::invalid(
            "voltage_limit_charge",
            format!(
                "must be above voltage_limit_discharge ({} <= {})",
                charge, discharge
            ),
        ));
    }
    Ok(())
}

pub(crate) fn validate_signed(
    name: &'static str,
    value: f64,
    direction: Direction,
) -> ConfigResult<()> {
    let ok = value.is_finite()
        && match direction {
            Direction::Charge => value > 0.0,
            Direction::Discharge => value < 0.0,
        };
    if ok {
        Ok(())
    } else {
        let expected = match direction {
            Direction::Charge => "positive",
            Direction::Discharge => "negative",
        };
        Err(ConfigError::invalid(
            name,
            format!("must be {} and finite, got {}", expected, value),
        ))
    }
}

/// cutoff magnitude must stay below the constant-current magnitude
pub(crate) fn validate_cutoff(name: &'static str, cutoff: f64, current: f64) -> ConfigResult<()> {
    if cutoff.abs() >= current.abs() {
        return Err(ConfigError::invalid(
            name,
            format!(
                "cutoff magnitude {} must be below the current magnitude {}",
                cutoff.abs(),
                current.abs()
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_know_their_direction() {
        assert_eq!(ProtocolState::CvCharge.direction(), Direction::Charge);
        assert_eq!(ProtocolState::CcDischarge.direction(), Direction::Discharge);
        assert!(ProtocolState::CvDischarge.is_constant_voltage());
        assert!(!ProtocolState::CcCharge.is_constant_voltage());
        assert_eq!(
            ProtocolState::constant_current(Direction::Charge.opposite()),
            ProtocolState::CcDischarge
        );
    }

    #[test]
    fn validation_helpers() {
        assert!(validate_voltage_limits(0.2, -0.2).is_ok());
        assert!(validate_voltage_limits(-0.2, 0.2).is_err());
        assert!(validate_signed("current_charge", 0.1, Direction::Charge).is_ok());
        assert!(validate_signed("current_discharge", 0.1, Direction::Discharge).is_err());
        assert!(validate_cutoff("current_cutoff_charge", 0.01, 0.1).is_ok());
        assert!(validate_cutoff("current_cutoff_charge", 0.1, 0.1).is_err());
    }

    #[test]
    fn protocols_deserialize_by_name() {
        let json = r#"{"ConstantVoltage": {
            "voltage_limit_charge": 0.2, "voltage_limit_discharge": -0.2,
            "current_cutoff_charge": 0.005, "current_cutoff_discharge": -0.005
        }}"#;
        let protocol: CyclingProtocol = serde_json::from_str(json).unwrap();
        assert!(protocol.validate().is_ok());
        assert_eq!(protocol.initial_state(), ProtocolState::CvCharge);
    }
}
