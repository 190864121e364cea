//! Potentiostatic cycling: alternate holds at the two voltage limits.
use super::{
    CyclingProtocolTrait, Direction, ProtocolState, StepDecision, constant_voltage_step,
    validate_signed, validate_voltage_limits,
};
use crate::errors::{ConfigResult, SimulationResult};
use crate::redox_flow_cell::CellModel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantVoltage {
    pub voltage_limit_charge: f64,
    pub voltage_limit_discharge: f64,
    /// A, > 0
    pub current_cutoff_charge: f64,
    /// A, < 0
    pub current_cutoff_discharge: f64,
    #[serde(default)]
    pub start: Direction,
}

impl ConstantVoltage {
    /// Same cutoff magnitude in both directions.
    pub fn new(
        voltage_limit_charge: f64,
        voltage_limit_discharge: f64,
        current_cutoff: f64,
    ) -> ConfigResult<Self> {
        Self::asymmetric(
            voltage_limit_charge,
            voltage_limit_discharge,
            current_cutoff.abs(),
            -current_cutoff.abs(),
        )
    }

    pub fn asymmetric(
        voltage_limit_charge: f64,
        voltage_limit_discharge: f64,
        current_cutoff_charge: f64,
        current_cutoff_discharge: f64,
    ) -> ConfigResult<Self> {
        let protocol = ConstantVoltage {
            voltage_limit_charge,
            voltage_limit_discharge,
            current_cutoff_charge,
            current_cutoff_discharge,
            start: Direction::Charge,
        };
        protocol.validate()?;
        Ok(protocol)
    }

    pub fn starting_with(mut self, direction: Direction) -> Self {
        self.start = direction;
        self
    }
}

impl CyclingProtocolTrait for ConstantVoltage {
    fn name(&self) -> String {
        "ConstantVoltage".to_string()
    }

    fn validate(&self) -> ConfigResult<()> {
        validate_voltage_limits(self.voltage_limit_charge, self.voltage_limit_discharge)?;
        validate_signed(
            "current_cutoff_charge",
            self.current_cutoff_charge,
            Direction::Charge,
        )?;
        validate_signed(
            "current_cutoff_discharge",
            self.current_cutoff_discharge,
            Direction::Discharge,
        )?;
        Ok(())
    }

    fn initial_state(&self) -> ProtocolState {
        ProtocolState::constant_voltage(self.start)
    }

    fn evaluate(
        &self,
        state: ProtocolState,
        cell: &CellModel,
        dt: f64,
    ) -> SimulationResult<StepDecision> {
        let direction = state.direction();
        let (limit, cutoff) = match direction {
            Direction::Charge => (self.voltage_limit_charge, self.current_cutoff_charge),
            Direction::Discharge => (self.voltage_limit_discharge, self.current_cutoff_discharge),
        };
        constant_voltage_step(
            cell,
            limit,
            direction,
            cutoff,
            dt,
            ProtocolState::constant_voltage(direction.opposite()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_alternate() {
        let protocol = ConstantVoltage::new(0.2, -0.2, 0.005).unwrap();
        assert_eq!(protocol.current_cutoff_discharge, -0.005);
        let cell =
            CellModel::new(0.005, 0.05, 0.01, 0.01, 0.01, 0.01, 0.0, 1.0, 1e-3, 1e-3).unwrap();
        let StepDecision::Apply(charge) = protocol
            .evaluate(ProtocolState::CvCharge, &cell, 1.0)
            .unwrap()
        else {
            panic!("charge hold should be taken");
        };
        assert!(charge.current > 0.005);
        let StepDecision::Apply(discharge) = protocol
            .evaluate(ProtocolState::CvDischarge, &cell, 1.0)
            .unwrap()
        else {
            panic!("discharge hold should be taken");
        };
        assert!((discharge.current + charge.current).abs() < 1e-9);
    }

    #[test]
    fn hold_that_would_exhaust_a_reactant_is_not_taken() {
        // about 0.57 A at 0.7 V, the CLS holds 4.8 C of either species
        let protocol = ConstantVoltage::new(0.7, -0.7, 0.005).unwrap();
        let cell =
            CellModel::new(0.005, 0.05, 0.01, 0.01, 0.01, 0.01, 0.0, 1.0, 1e-3, 1e-3).unwrap();
        assert!(matches!(
            protocol.evaluate(ProtocolState::CvCharge, &cell, 1.0).unwrap(),
            StepDecision::Apply(_)
        ));
        assert_eq!(
            protocol.evaluate(ProtocolState::CvCharge, &cell, 10.0).unwrap(),
            StepDecision::Transition(ProtocolState::CvDischarge)
        );
    }

    #[test]
    fn unreachable_hold_voltage_ends_the_hold() {
        // with 1 µM of reduced CLS the charge voltage tops out near 0.84 V
        let protocol = ConstantVoltage::new(1.5, -1.5, 0.005).unwrap();
        let cell =
            CellModel::new(0.005, 0.05, 0.01, 1e-6, 0.01, 0.01, 0.0, 1.0, 1e-3, 1e-3).unwrap();
        assert_eq!(
            protocol.evaluate(ProtocolState::CvCharge, &cell, 1.0).unwrap(),
            StepDecision::Transition(ProtocolState::CvDischarge)
        );
    }

    #[test]
    fn rejects_wrong_cutoff_signs() {
        assert!(ConstantVoltage::asymmetric(0.2, -0.2, -0.005, -0.005).is_err());
        assert!(ConstantVoltage::new(0.2, 0.2, 0.005).is_err());
    }
}
