//! Constant-current cycling between two voltage limits.
use super::{
    CyclingProtocolTrait, Direction, ProtocolState, StepDecision, constant_current_step,
    validate_signed, validate_voltage_limits,
};
use crate::errors::{ConfigResult, SimulationResult};
use crate::redox_flow_cell::{CellModel, CellPotential};
use serde::{Deserialize, Serialize};

/// Charges at `current_charge` until the voltage reaches `voltage_limit_charge`, then
/// discharges at `current_discharge` until it reaches `voltage_limit_discharge`, and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantCurrent {
    pub voltage_limit_charge: f64,
    pub voltage_limit_discharge: f64,
    /// A, > 0
    pub current_charge: f64,
    /// A, < 0
    pub current_discharge: f64,
    #[serde(default)]
    pub start: Direction,
}

impl ConstantCurrent {
    /// Same current magnitude in both directions.
    pub fn new(
        voltage_limit_charge: f64,
        voltage_limit_discharge: f64,
        current: f64,
    ) -> ConfigResult<Self> {
        Self::asymmetric(
            voltage_limit_charge,
            voltage_limit_discharge,
            current.abs(),
            -current.abs(),
        )
    }

    pub fn asymmetric(
        voltage_limit_charge: f64,
        voltage_limit_discharge: f64,
        current_charge: f64,
        current_discharge: f64,
    ) -> ConfigResult<Self> {
        let protocol = ConstantCurrent {
            voltage_limit_charge,
            voltage_limit_discharge,
            current_charge,
            current_discharge,
            start: Direction::Charge,
        };
        protocol.validate()?;
        Ok(protocol)
    }

    pub fn starting_with(mut self, direction: Direction) -> Self {
        self.start = direction;
        self
    }

    fn current(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Charge => self.current_charge,
            Direction::Discharge => self.current_discharge,
        }
    }
}

impl CyclingProtocolTrait for ConstantCurrent {
    fn name(&self) -> String {
        "ConstantCurrent".to_string()
    }

    fn validate(&self) -> ConfigResult<()> {
        validate_voltage_limits(self.voltage_limit_charge, self.voltage_limit_discharge)?;
        validate_signed("current_charge", self.current_charge, Direction::Charge)?;
        validate_signed("current_discharge", self.current_discharge, Direction::Discharge)?;
        Ok(())
    }

    fn initial_state(&self) -> ProtocolState {
        ProtocolState::constant_current(self.start)
    }

    fn evaluate(
        &self,
        state: ProtocolState,
        cell: &CellModel,
        dt: f64,
    ) -> SimulationResult<StepDecision> {
        let direction = state.direction();
        match constant_current_step(cell, self.current(direction), dt)? {
            Some(potential) => Ok(StepDecision::Apply(potential)),
            None => Ok(StepDecision::Transition(ProtocolState::constant_current(
                direction.opposite(),
            ))),
        }
    }

    fn after_step(&self, state: ProtocolState, potential: &CellPotential) -> ProtocolState {
        let limit_reached = match state.direction() {
            Direction::Charge => potential.voltage >= self.voltage_limit_charge,
            Direction::Discharge => potential.voltage <= self.voltage_limit_discharge,
        };
        if limit_reached {
            ProtocolState::constant_current(state.direction().opposite())
        } else {
            state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> CellModel {
        CellModel::new(0.005, 0.05, 0.01, 0.01, 0.01, 0.01, 0.0, 1.0, 1e-3, 1e-3).unwrap()
    }

    #[test]
    fn symmetric_constructor_signs_currents() {
        let protocol = ConstantCurrent::new(0.2, -0.2, -0.05).unwrap();
        assert_eq!(protocol.current_charge, 0.05);
        assert_eq!(protocol.current_discharge, -0.05);
        assert_eq!(protocol.initial_state(), ProtocolState::CcCharge);
        let protocol = protocol.starting_with(Direction::Discharge);
        assert_eq!(protocol.initial_state(), ProtocolState::CcDischarge);
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(ConstantCurrent::new(-0.2, 0.2, 0.05).is_err());
        assert!(ConstantCurrent::new(0.2, -0.2, 0.0).is_err());
        assert!(ConstantCurrent::asymmetric(0.2, -0.2, 0.05, 0.05).is_err());
    }

    #[test]
    fn flips_after_the_limit_crossing_step() {
        let protocol = ConstantCurrent::new(0.2, -0.2, 0.05).unwrap();
        let cell = cell();
        let decision = protocol.evaluate(ProtocolState::CcCharge, &cell, 1.0).unwrap();
        let StepDecision::Apply(potential) = decision else {
            panic!("expected a step, got {:?}", decision);
        };
        assert_eq!(potential.current, 0.05);
        assert_eq!(
            protocol.after_step(ProtocolState::CcCharge, &potential),
            ProtocolState::CcCharge
        );
        let over = CellPotential {
            voltage: 0.21,
            ..potential
        };
        assert_eq!(
            protocol.after_step(ProtocolState::CcCharge, &over),
            ProtocolState::CcDischarge
        );
    }

    #[test]
    fn infeasible_step_flips_immediately() {
        // enough current to empty the CLS reduced species in one step
        let protocol = ConstantCurrent::new(10.0, -10.0, 5.0).unwrap();
        let decision = protocol.evaluate(ProtocolState::CcCharge, &cell(), 1.0).unwrap();
        assert_eq!(
            decision,
            StepDecision::Transition(ProtocolState::CcDischarge)
        );
    }
}
