//! Constant current followed by a constant-voltage hold, in both directions.
use super::{
    CyclingProtocolTrait, Direction, ProtocolState, StepDecision, constant_current_step,
    constant_voltage_step, validate_cutoff, validate_signed, validate_voltage_limits,
};
use crate::errors::{ConfigResult, SimulationResult};
use crate::redox_flow_cell::CellModel;
use serde::{Deserialize, Serialize};

/// CC charge → CV hold at `voltage_limit_charge` until the current falls to
/// `current_cutoff_charge` → CC discharge → CV hold at `voltage_limit_discharge` until the
/// current rises to `current_cutoff_discharge` → CC charge ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantCurrentConstantVoltage {
    pub voltage_limit_charge: f64,
    pub voltage_limit_discharge: f64,
    pub current_charge: f64,
    pub current_discharge: f64,
    pub current_cutoff_charge: f64,
    pub current_cutoff_discharge: f64,
    #[serde(default)]
    pub start: Direction,
}

impl ConstantCurrentConstantVoltage {
    /// Same current and cutoff magnitudes in both directions.
    pub fn new(
        voltage_limit_charge: f64,
        voltage_limit_discharge: f64,
        current: f64,
        current_cutoff: f64,
    ) -> ConfigResult<Self> {
        Self::asymmetric(
            voltage_limit_charge,
            voltage_limit_discharge,
            current.abs(),
            -current.abs(),
            current_cutoff.abs(),
            -current_cutoff.abs(),
        )
    }

    pub fn asymmetric(
        voltage_limit_charge: f64,
        voltage_limit_discharge: f64,
        current_charge: f64,
        current_discharge: f64,
        current_cutoff_charge: f64,
        current_cutoff_discharge: f64,
    ) -> ConfigResult<Self> {
        let protocol = ConstantCurrentConstantVoltage {
            voltage_limit_charge,
            voltage_limit_discharge,
            current_charge,
            current_discharge,
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

impl CyclingProtocolTrait for ConstantCurrentConstantVoltage {
    fn name(&self) -> String {
        "ConstantCurrentConstantVoltage".to_string()
    }

    fn validate(&self) -> ConfigResult<()> {
        validate_voltage_limits(self.voltage_limit_charge, self.voltage_limit_discharge)?;
        validate_signed("current_charge", self.current_charge, Direction::Charge)?;
        validate_signed("current_discharge", self.current_discharge, Direction::Discharge)?;
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
        validate_cutoff(
            "current_cutoff_charge",
            self.current_cutoff_charge,
            self.current_charge,
        )?;
        validate_cutoff(
            "current_cutoff_discharge",
            self.current_cutoff_discharge,
            self.current_discharge,
        )?;
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
        let (current, limit, cutoff) = match direction {
            Direction::Charge => (
                self.current_charge,
                self.voltage_limit_charge,
                self.current_cutoff_charge,
            ),
            Direction::Discharge => (
                self.current_discharge,
                self.voltage_limit_discharge,
                self.current_cutoff_discharge,
            ),
        };
        if state.is_constant_voltage() {
            return constant_voltage_step(
                cell,
                limit,
                direction,
                cutoff,
                dt,
                ProtocolState::constant_current(direction.opposite()),
            );
        }
        let to_hold = StepDecision::Transition(ProtocolState::constant_voltage(direction));
        match constant_current_step(cell, current, dt)? {
            Some(potential) => {
                let below_limit = match direction {
                    Direction::Charge => potential.voltage < limit,
                    Direction::Discharge => potential.voltage > limit,
                };
                if below_limit {
                    Ok(StepDecision::Apply(potential))
                } else {
                    Ok(to_hold)
                }
            }
            None => Ok(to_hold),
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
    fn cutoff_must_stay_below_current() {
        assert!(ConstantCurrentConstantVoltage::new(0.2, -0.2, 0.05, 0.005).is_ok());
        assert!(ConstantCurrentConstantVoltage::new(0.2, -0.2, 0.05, 0.05).is_err());
        assert!(ConstantCurrentConstantVoltage::new(0.2, -0.2, 0.05, 0.0).is_err());
        assert!(
            ConstantCurrentConstantVoltage::asymmetric(0.2, -0.2, 0.05, -0.05, 0.005, 0.005)
                .is_err()
        );
    }

    #[test]
    fn cc_step_that_would_cross_the_limit_switches_to_hold() {
        let protocol = ConstantCurrentConstantVoltage::new(0.05, -0.05, 0.05, 0.005).unwrap();
        let cell = cell();
        // 0.05 A at half charge already needs more than 0.05 V
        assert!(cell.solve_voltage_for_current(0.05).unwrap() > 0.05);
        assert_eq!(
            protocol.evaluate(ProtocolState::CcCharge, &cell, 1.0).unwrap(),
            StepDecision::Transition(ProtocolState::CvCharge)
        );
        let StepDecision::Apply(held) = protocol
            .evaluate(ProtocolState::CvCharge, &cell, 1.0)
            .unwrap()
        else {
            panic!("hold should be taken");
        };
        assert!((held.voltage - 0.05).abs() < 1e-9);
        assert!(held.current > 0.005 && held.current < 0.05);
    }

    #[test]
    fn hold_ends_at_the_cutoff() {
        let protocol = ConstantCurrentConstantVoltage::new(0.2, -0.2, 0.05, 0.04).unwrap();
        let cell = cell();
        // holding 0.01 V at half charge drives only a small current
        let protocol = ConstantCurrentConstantVoltage {
            voltage_limit_charge: 0.01,
            ..protocol
        };
        assert_eq!(
            protocol.evaluate(ProtocolState::CvCharge, &cell, 1.0).unwrap(),
            StepDecision::Transition(ProtocolState::CcDischarge)
        );
    }
}
