//! # Cycling results
//!
//! In-memory time series produced by one protocol run, plus per-half-cycle aggregates.
//!
//! ## Main Components
//! - [`CyclingResults`]: one entry per recorded step in every per-step vector, one entry per
//!   completed half cycle in the cycle vectors
//! - [`Termination`]: why the run stopped; a failed run keeps every step taken before the failure
//!
//! ## Non-Obvious Features & Tips
//! - A half cycle closes when the protocol changes direction. Its capacity is `Σ |I| dt` over its
//!   steps and its time is the simulation time at which it closed. The half cycle still open
//!   when the run stops is not reported.
//! - `clamped[i]` is `true` when any concentration had to be clamped at zero during step `i`.
//! - `soc_cls` is the oxidized fraction of the CLS, `soc_ncls` the reduced fraction of the
//!   NCLS, both in percent.
use crate::crossover::CrossoverTransfer;
use crate::errors::SimulationError;
use crate::protocols::{Direction, ProtocolState};
use crate::redox_flow_cell::{CellModel, CellPotential, Side};
use prettytable::{Cell, Row, Table};

#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// ran for the whole requested duration
    Completed,
    /// stopped by `RunOptions::max_steps`
    StepCapReached,
    Failed(SimulationError),
}

#[derive(Debug, Clone, PartialEq)]
struct OpenHalfCycle {
    direction: Direction,
    capacity: f64,
    steps: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CyclingResults {
    pub protocol: String,
    pub time_step: f64,
    pub termination: Termination,

    pub step_time: Vec<f64>,
    pub cell_v: Vec<f64>,
    pub current: Vec<f64>,
    pub state: Vec<ProtocolState>,
    pub ocv: Vec<f64>,
    pub ohmic_overpotential: Vec<f64>,
    pub activation_overpotential: Vec<f64>,
    pub mass_transport_overpotential: Vec<f64>,
    pub total_overpotential: Vec<f64>,
    pub c_ox_cls: Vec<f64>,
    pub c_red_cls: Vec<f64>,
    pub c_ox_ncls: Vec<f64>,
    pub c_red_ncls: Vec<f64>,
    pub c_dimer_cls: Vec<f64>,
    pub c_dimer_ncls: Vec<f64>,
    pub soc_cls: Vec<f64>,
    pub soc_ncls: Vec<f64>,
    pub crossed_ox_mols: Vec<f64>,
    pub crossed_red_mols: Vec<f64>,
    pub clamped: Vec<bool>,

    pub half_cycle_capacity: Vec<f64>,
    pub half_cycle_time: Vec<f64>,
    pub charge_cycle_capacity: Vec<f64>,
    pub charge_cycle_time: Vec<f64>,
    pub discharge_cycle_capacity: Vec<f64>,
    pub discharge_cycle_time: Vec<f64>,

    open: OpenHalfCycle,
}

impl CyclingResults {
    pub fn new(protocol: &str, time_step: f64, direction: Direction, capacity: usize) -> Self {
        CyclingResults {
            protocol: protocol.to_string(),
            time_step,
            termination: Termination::Completed,
            step_time: Vec::with_capacity(capacity),
            cell_v: Vec::with_capacity(capacity),
            current: Vec::with_capacity(capacity),
            state: Vec::with_capacity(capacity),
            ocv: Vec::with_capacity(capacity),
            ohmic_overpotential: Vec::with_capacity(capacity),
            activation_overpotential: Vec::with_capacity(capacity),
            mass_transport_overpotential: Vec::with_capacity(capacity),
            total_overpotential: Vec::with_capacity(capacity),
            c_ox_cls: Vec::with_capacity(capacity),
            c_red_cls: Vec::with_capacity(capacity),
            c_ox_ncls: Vec::with_capacity(capacity),
            c_red_ncls: Vec::with_capacity(capacity),
            c_dimer_cls: Vec::with_capacity(capacity),
            c_dimer_ncls: Vec::with_capacity(capacity),
            soc_cls: Vec::with_capacity(capacity),
            soc_ncls: Vec::with_capacity(capacity),
            crossed_ox_mols: Vec::with_capacity(capacity),
            crossed_red_mols: Vec::with_capacity(capacity),
            clamped: Vec::with_capacity(capacity),
            half_cycle_capacity: Vec::new(),
            half_cycle_time: Vec::new(),
            charge_cycle_capacity: Vec::new(),
            charge_cycle_time: Vec::new(),
            discharge_cycle_capacity: Vec::new(),
            discharge_cycle_time: Vec::new(),
            open: OpenHalfCycle {
                direction,
                capacity: 0.0,
                steps: 0,
            },
        }
    }

    /// Records a step that has already been applied to `cell`.
    pub fn record_step(
        &mut self,
        cell: &CellModel,
        state: ProtocolState,
        potential: &CellPotential,
        transfer: &CrossoverTransfer,
        clamped: bool,
    ) {
        let cls = cell.reservoir(Side::Cls);
        let ncls = cell.reservoir(Side::Ncls);
        self.step_time.push(cell.time());
        self.cell_v.push(potential.voltage);
        self.current.push(potential.current);
        self.state.push(state);
        self.ocv.push(potential.ocv);
        self.ohmic_overpotential.push(potential.ohmic);
        self.activation_overpotential.push(potential.activation);
        self.mass_transport_overpotential
            .push(potential.mass_transport);
        self.total_overpotential.push(potential.overpotential);
        self.c_ox_cls.push(cls.c_ox);
        self.c_red_cls.push(cls.c_red);
        self.c_ox_ncls.push(ncls.c_ox);
        self.c_red_ncls.push(ncls.c_red);
        self.c_dimer_cls.push(cls.c_dimer);
        self.c_dimer_ncls.push(ncls.c_dimer);
        self.soc_cls.push(cell.state_of_charge_cls());
        self.soc_ncls.push(cell.state_of_charge_ncls());
        self.crossed_ox_mols.push(transfer.ox_mols);
        self.crossed_red_mols.push(transfer.red_mols);
        self.clamped.push(clamped);

        self.open.capacity += potential.current.abs() * self.time_step;
        self.open.steps += 1;
    }

    /// Closes the open half cycle at `time` if `direction` differs from its direction.
    /// Returns `true` if a half cycle with at least one step was closed.
    pub fn change_direction(&mut self, direction: Direction, time: f64) -> bool {
        if direction == self.open.direction {
            return false;
        }
        let finished = std::mem::replace(
            &mut self.open,
            OpenHalfCycle {
                direction,
                capacity: 0.0,
                steps: 0,
            },
        );
        if finished.steps == 0 {
            return false;
        }
        self.half_cycle_capacity.push(finished.capacity);
        self.half_cycle_time.push(time);
        match finished.direction {
            Direction::Charge => {
                self.charge_cycle_capacity.push(finished.capacity);
                self.charge_cycle_time.push(time);
            }
            Direction::Discharge => {
                self.discharge_cycle_capacity.push(finished.capacity);
                self.discharge_cycle_time.push(time);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.step_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.step_time.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Completed
    }

    pub fn failure(&self) -> Option<&SimulationError> {
        match &self.termination {
            Termination::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn clamp_count(&self) -> usize {
        self.clamped.iter().filter(|&&c| c).count()
    }

    pub fn pretty_print(&self) {
        let mut table = Table::new();
        table.add_row(Row::new(vec![Cell::new("protocol"), Cell::new(&self.protocol)]));
        table.add_row(Row::new(vec![
            Cell::new("termination"),
            Cell::new(&format!("{:?}", self.termination)),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("steps"),
            Cell::new(&self.len().to_string()),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("clamped steps"),
            Cell::new(&self.clamp_count().to_string()),
        ]));
        if let (Some(t), Some(v)) = (self.step_time.last(), self.cell_v.last()) {
            table.add_row(Row::new(vec![
                Cell::new("final time, s"),
                Cell::new(&format!("{:.2}", t)),
            ]));
            table.add_row(Row::new(vec![
                Cell::new("final voltage, V"),
                Cell::new(&format!("{:.5}", v)),
            ]));
        }
        table.printstd();

        let mut cycles = Table::new();
        cycles.add_row(Row::new(vec![
            Cell::new("half cycle"),
            Cell::new("capacity, C"),
            Cell::new("end time, s"),
        ]));
        for (i, (capacity, time)) in self
            .half_cycle_capacity
            .iter()
            .zip(self.half_cycle_time.iter())
            .enumerate()
        {
            cycles.add_row(Row::new(vec![
                Cell::new(&(i + 1).to_string()),
                Cell::new(&format!("{:.5}", capacity)),
                Cell::new(&format!("{:.2}", time)),
            ]));
        }
        cycles.printstd();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cell() -> CellModel {
        CellModel::new(0.005, 0.05, 0.01, 0.01, 0.01, 0.01, 0.0, 1.0, 1e-3, 1e-3).unwrap()
    }

    fn potential(current: f64) -> CellPotential {
        CellPotential {
            current,
            ..Default::default()
        }
    }

    #[test]
    fn half_cycles_accumulate_and_split_by_direction() {
        let cell = cell();
        let mut results = CyclingResults::new("test", 0.5, Direction::Charge, 4);
        let none = CrossoverTransfer::default();
        results.record_step(&cell, ProtocolState::CcCharge, &potential(0.1), &none, false);
        results.record_step(&cell, ProtocolState::CcCharge, &potential(0.1), &none, false);
        assert!(results.change_direction(Direction::Discharge, 1.0));
        results.record_step(&cell, ProtocolState::CcDischarge, &potential(-0.2), &none, true);
        assert!(results.change_direction(Direction::Charge, 1.5));
        // still open at the end, not reported
        results.record_step(&cell, ProtocolState::CcCharge, &potential(0.1), &none, false);

        assert_eq!(results.len(), 4);
        assert_eq!(results.half_cycle_capacity.len(), 2);
        assert_relative_eq!(results.half_cycle_capacity[0], 0.1);
        assert_relative_eq!(results.half_cycle_capacity[1], 0.1);
        assert_eq!(results.half_cycle_time, vec![1.0, 1.5]);
        assert_eq!(results.charge_cycle_capacity.len(), 1);
        assert_eq!(results.discharge_cycle_time, vec![1.5]);
        assert_eq!(results.clamp_count(), 1);
    }

    #[test]
    fn same_direction_or_empty_half_cycle_is_not_closed() {
        let mut results = CyclingResults::new("test", 1.0, Direction::Charge, 0);
        assert!(!results.change_direction(Direction::Charge, 0.0));
        assert!(!results.change_direction(Direction::Discharge, 0.0));
        assert!(results.half_cycle_capacity.is_empty());
        assert!(results.is_empty());
        assert!(results.is_complete());
        assert!(results.failure().is_none());
    }
}
