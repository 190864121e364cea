//! Conservation tests for full cycling runs.
//!
//! These tests check bookkeeping that must hold whatever the protocol does:
//! - charge passed through the cell matches the change of the CLS composition
//! - side reactions only ever remove active material
//! - half-cycle capacities add up to the charge actually passed

use approx::assert_relative_eq;
use rfb_sim::degradation::{ChemicalDegradationOxidized, ChemicalDegradationReduced};
use rfb_sim::protocols::{
    ConstantCurrent, ConstantCurrentConstantVoltage, CyclingProtocol, CyclingProtocolTrait,
    ProtocolState,
};
use rfb_sim::redox_flow_cell::{CellModel, CellParameters};
use rfb_sim::results::CyclingResults;
use rfb_sim::simulation::RunOptions;
use rfb_sim::units::FARADAY;

const VOLUME_CLS: f64 = 0.005;

fn cell(time_step: f64) -> CellModel {
    CellModel::from_parameters(
        CellParameters::new(VOLUME_CLS, 0.05, 0.01, 0.01, 0.01, 0.01, 0.0, 1.0, 1e-3, 1e-3)
            .time_step(time_step),
    )
    .unwrap()
}

fn run(protocol: impl Into<CyclingProtocol>, dt: f64, options: &RunOptions) -> CyclingResults {
    let protocol: CyclingProtocol = protocol.into();
    protocol.run(&mut cell(dt), 1500.0, options).unwrap()
}

mod charge_balance {
    use super::*;

    /// Every coulomb passed oxidizes `1/(nF)` mol of the CLS reduced species.
    #[test]
    fn test_cls_composition_follows_passed_charge() {
        let dt = 0.5;
        let protocol = ConstantCurrentConstantVoltage::new(0.2, -0.2, 0.05, 0.005).unwrap();
        let results = run(protocol, dt, &RunOptions::new());
        assert!(results.is_complete());

        let mut passed = 0.0;
        for i in 0..results.len() {
            passed += results.current[i] * dt;
            assert_relative_eq!(
                results.c_ox_cls[i] - 0.01,
                passed / (FARADAY * VOLUME_CLS),
                epsilon = 1e-12
            );
        }
    }

    /// Closed half cycles never account for more charge than was passed.
    #[test]
    fn test_half_cycles_add_up_to_passed_charge() {
        let dt = 0.5;
        let protocol = ConstantCurrent::new(0.2, -0.2, 0.05).unwrap();
        let results = run(protocol, dt, &RunOptions::new());

        let passed: f64 = results.current.iter().map(|i| i.abs() * dt).sum();
        let closed: f64 = results.half_cycle_capacity.iter().sum();
        let by_direction: f64 = results
            .charge_cycle_capacity
            .iter()
            .chain(results.discharge_cycle_capacity.iter())
            .sum();
        assert!(closed <= passed);
        assert_relative_eq!(closed, by_direction, epsilon = 1e-9);
        // the open half cycle is shorter than a full one
        assert!(passed - closed < 9.7);
    }

    /// State of charge moves in the direction of the current.
    #[test]
    fn test_state_of_charge_follows_current() {
        let protocol = ConstantCurrent::new(0.2, -0.2, 0.05).unwrap();
        let results = run(protocol, 1.0, &RunOptions::new());
        for i in 1..results.len() {
            assert!(results.soc_cls[i] >= 0.0 && results.soc_cls[i] <= 100.0);
            if results.state[i] == ProtocolState::CcCharge {
                assert!(results.soc_cls[i] > results.soc_cls[i - 1]);
                assert!(results.soc_ncls[i] > results.soc_ncls[i - 1]);
            } else {
                assert!(results.soc_cls[i] < results.soc_cls[i - 1]);
            }
        }
    }
}

mod side_reactions {
    use super::*;

    /// Degradation on both sides only removes material, step after step.
    #[test]
    fn test_active_material_never_increases() {
        let options = RunOptions::new().degradation(ChemicalDegradationOxidized::new(1, 1e-4).unwrap());
        let protocol = ConstantCurrent::new(0.2, -0.2, 0.05).unwrap();
        let results = run(protocol, 1.0, &options);

        let mut previous_cls = 0.02;
        let mut previous_ncls = 0.02;
        for i in 0..results.len() {
            let cls = results.c_ox_cls[i] + results.c_red_cls[i];
            let ncls = results.c_ox_ncls[i] + results.c_red_ncls[i];
            assert!(cls <= previous_cls + 1e-15);
            assert!(ncls <= previous_ncls + 1e-15);
            previous_cls = cls;
            previous_ncls = ncls;
        }
        assert!(previous_cls < 0.02 && previous_ncls < 0.02);
        assert_eq!(results.clamp_count(), 0);
    }

    /// Losing CLS material shortens the half cycles.
    #[test]
    fn test_capacity_fades_with_degradation() {
        let options =
            RunOptions::new().cls_degradation(ChemicalDegradationReduced::new(1, 5e-4).unwrap());
        let protocol = ConstantCurrent::new(0.2, -0.2, 0.05).unwrap();
        let results = run(protocol, 0.5, &options);

        let discharges = &results.discharge_cycle_capacity;
        assert!(discharges.len() >= 2, "{:?}", results.half_cycle_capacity);
        for pair in discharges.windows(2) {
            assert!(pair[1] < pair[0], "{:?}", discharges);
        }
        // the first charge starts from half charge, later ones from discharged
        let charges = &results.charge_cycle_capacity;
        for pair in charges[1..].windows(2) {
            assert!(pair[1] < pair[0], "{:?}", charges);
        }
    }
}
