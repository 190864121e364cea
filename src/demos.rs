use crate::config::SimulationConfig;
use crate::crossover::Crossover;
use crate::degradation::{
    AutoOxidation, ChemicalDegradationReduced, DegradationMechanism, Dimerization,
    MultiDegradationMechanism,
};
use crate::errors::ConfigResult;
use crate::protocols::{
    ConstantCurrent, ConstantCurrentConstantVoltage, ConstantVoltage, CyclingProtocolTrait,
    Direction,
};
use crate::redox_flow_cell::{CellModel, CellParameters};
use crate::simulation::RunOptions;
use log::warn;

fn symmetric_cell(time_step: f64) -> CellParameters {
    // 5 mL capacity limiting side against a 50 mL non-capacity limiting side
    CellParameters::new(0.005, 0.05, 0.01, 0.01, 0.01, 0.01, 0.0, 1.0, 1e-3, 1e-3)
        .time_step(time_step)
}

fn print_capacities(capacities: &[f64], times: &[f64]) {
    for (i, (q, t)) in capacities.iter().zip(times.iter()).enumerate() {
        println!("half cycle {}: {:.4} C, closed at {:.1} s", i + 1, q, t);
    }
}

/// Runs the numbered demo, printing results to the terminal.
pub fn cycling_demos(task: usize) -> ConfigResult<()> {
    //
    match task {
        0 => {
            // constant current cycling of a symmetric cell
            let mut cell = CellModel::from_parameters(symmetric_cell(0.01))?;
            let protocol = ConstantCurrent::new(0.2, -0.2, 0.05)?;
            let results = protocol.run(&mut cell, 1000.0, &RunOptions::new())?;
            results.pretty_print();
            print_capacities(&results.half_cycle_capacity, &results.half_cycle_time);
        }
        1 => {
            // CCCV with a slow first order decay of the reduced CLS species
            let mut cell = CellModel::from_parameters(symmetric_cell(0.1))?;
            let protocol = ConstantCurrentConstantVoltage::new(0.2, -0.2, 0.05, 0.005)?;
            let options =
                RunOptions::new().cls_degradation(ChemicalDegradationReduced::new(1, 1e-4)?);
            let results = protocol.run(&mut cell, 3000.0, &options)?;
            results.pretty_print();
            println!("charge capacities: {:?}", results.charge_cycle_capacity);
            println!("discharge capacities: {:?}", results.discharge_cycle_capacity);
            println!(
                "CLS active material left: {:.6} M",
                cell.c_ox_cls() + cell.c_red_cls()
            );
        }
        2 => {
            // potentiostatic cycling with membrane crossover, starting on discharge
            let mut cell = CellModel::from_parameters(symmetric_cell(0.1))?;
            let protocol = ConstantVoltage::new(0.2, -0.2, 0.005)?.starting_with(Direction::Discharge);
            let options = RunOptions::new().crossover(Crossover::new(183.0, 5e-6, 2e-6)?);
            let results = protocol.run(&mut cell, 2000.0, &options)?;
            results.pretty_print();
            print_capacities(&results.half_cycle_capacity, &results.half_cycle_time);
            println!(
                "CLS: ox {:.6} M, red {:.6} M; NCLS: ox {:.6} M, red {:.6} M",
                cell.c_ox_cls(),
                cell.c_red_cls(),
                cell.c_ox_ncls(),
                cell.c_red_ncls()
            );
        }
        3 => {
            // several mechanisms at once, order matters
            let mechanisms: Vec<DegradationMechanism> = vec![
                AutoOxidation::new(5e-5)?.into(),
                ChemicalDegradationReduced::new(2, 1e-2)?.into(),
                Dimerization::new(0.05, 0.005)?.into(),
            ];
            let mut cell = CellModel::from_parameters(symmetric_cell(0.5))?;
            let protocol = ConstantCurrent::new(0.2, -0.2, 0.05)?;
            let options = RunOptions::new()
                .cls_degradation(MultiDegradationMechanism::new(mechanisms)?);
            let results = protocol.run(&mut cell, 2000.0, &options)?;
            results.pretty_print();
            println!(
                "dimer at the end: {:.3e} M",
                results.c_dimer_cls.last().copied().unwrap_or_default()
            );
            print_capacities(&results.half_cycle_capacity, &results.half_cycle_time);
        }
        4 => {
            // the same run, stored as JSON and replayed
            let config = SimulationConfig::new(
                symmetric_cell(1.0),
                ConstantCurrent::new(0.2, -0.2, 0.05)?,
                500.0,
            )
            .with_options(
                RunOptions::new().degradation(ChemicalDegradationReduced::new(1, 1e-4)?),
            );
            let json = config.to_json_string()?;
            println!("{}", json);
            let (_cell, results) = SimulationConfig::from_json_str(&json)?.run()?;
            results.pretty_print();
        }
        _ => {
            warn!("no such demo: {}", task);
        }
    }
    Ok(())
}
