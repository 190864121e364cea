//! # Simulation driver
//!
//! The time loop shared by every protocol. Each step runs in a fixed order:
//!
//! 1. the protocol decides the operating point (possibly after a few state changes)
//! 2. Faraday update of both reservoirs ([`CellModel::advance`])
//! 3. CLS degradation, then NCLS degradation
//! 4. membrane crossover
//! 5. the step is recorded and the protocol may change state for the next step
//!
//! Configuration problems (bad duration, bad mechanism, both `degradation` and a per-side
//! mechanism given) are returned as [`ConfigError`] before the first step. Problems in the
//! middle of the run stop the loop and are kept in [`CyclingResults::termination`] together
//! with every step already recorded.
use crate::crossover::{Crossover, CrossoverTransfer};
use crate::degradation::{Degradation, DegradationMechanism};
use crate::errors::{ConfigError, ConfigResult, SimulationError, SimulationResult};
use crate::protocols::{CyclingProtocolTrait, ProtocolState, StepDecision};
use crate::redox_flow_cell::{CellModel, CellPotential, Side};
use crate::results::{CyclingResults, Termination};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

/// more state changes than this within one step means the protocol is stuck
pub const MAX_TRANSITIONS_PER_STEP: usize = 4;

/// Optional physics and limits of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// applied to both reservoirs
    #[serde(default)]
    pub degradation: Option<DegradationMechanism>,
    #[serde(default)]
    pub cls_degradation: Option<DegradationMechanism>,
    #[serde(default)]
    pub ncls_degradation: Option<DegradationMechanism>,
    #[serde(default)]
    pub crossover: Option<Crossover>,
    /// stop after this many steps even if the duration is not reached
    #[serde(default)]
    pub max_steps: Option<usize>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn degradation(mut self, mechanism: impl Into<DegradationMechanism>) -> Self {
        self.degradation = Some(mechanism.into());
        self
    }

    pub fn cls_degradation(mut self, mechanism: impl Into<DegradationMechanism>) -> Self {
        self.cls_degradation = Some(mechanism.into());
        self
    }

    pub fn ncls_degradation(mut self, mechanism: impl Into<DegradationMechanism>) -> Self {
        self.ncls_degradation = Some(mechanism.into());
        self
    }

    pub fn crossover(mut self, crossover: Crossover) -> Self {
        self.crossover = Some(crossover);
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.degradation.is_some()
            && (self.cls_degradation.is_some() || self.ncls_degradation.is_some())
        {
            return Err(ConfigError::Conflict(
                "`degradation` applies to both sides and cannot be combined with \
                 `cls_degradation` or `ncls_degradation`"
                    .to_string(),
            ));
        }
        for mechanism in [
            &self.degradation,
            &self.cls_degradation,
            &self.ncls_degradation,
        ]
        .into_iter()
        .flatten()
        {
            mechanism.validate()?;
        }
        if let Some(crossover) = &self.crossover {
            crossover.validate()?;
        }
        Ok(())
    }

    /// (CLS, NCLS) mechanisms
    pub fn side_mechanisms(
        &self,
    ) -> (Option<&DegradationMechanism>, Option<&DegradationMechanism>) {
        match &self.degradation {
            Some(both) => (Some(both), Some(both)),
            None => (self.cls_degradation.as_ref(), self.ncls_degradation.as_ref()),
        }
    }
}

/// Number of steps covering `duration` with steps of `dt`.
pub fn step_count(duration: f64, dt: f64) -> usize {
    (duration / dt).round() as usize
}

/// Asks the protocol for the operating point of the next step, following state changes.
fn resolve_step<P: CyclingProtocolTrait + ?Sized>(
    protocol: &P,
    state: &mut ProtocolState,
    cell: &CellModel,
    dt: f64,
    results: &mut CyclingResults,
) -> SimulationResult<CellPotential> {
    let mut transitions = 0;
    loop {
        match protocol.evaluate(*state, cell, dt)? {
            StepDecision::Apply(potential) => return Ok(potential),
            StepDecision::Transition(next) => {
                transitions += 1;
                if transitions > MAX_TRANSITIONS_PER_STEP {
                    return Err(SimulationError::ProtocolStalled(transitions));
                }
                enter_state(state, next, cell.time(), results);
            }
        }
    }
}

fn enter_state(
    state: &mut ProtocolState,
    next: ProtocolState,
    time: f64,
    results: &mut CyclingResults,
) {
    debug!("t = {:.3} s: {:?} -> {:?}", time, state, next);
    if results.change_direction(next.direction(), time) {
        debug!(
            "half cycle {} closed at t = {:.3} s",
            results.half_cycle_capacity.len(),
            time
        );
    }
    *state = next;
}

/// Runs `protocol` on `cell` for `duration` seconds.
pub fn drive<P: CyclingProtocolTrait + ?Sized>(
    protocol: &P,
    cell: &mut CellModel,
    duration: f64,
    options: &RunOptions,
) -> ConfigResult<CyclingResults> {
    protocol.validate()?;
    options.validate()?;
    if !duration.is_finite() || duration < 0.0 {
        return Err(ConfigError::invalid(
            "duration",
            format!("must be a finite non-negative number of seconds, got {}", duration),
        ));
    }
    let dt = cell.time_step();
    let total_steps = step_count(duration, dt);
    let steps = options
        .max_steps
        .map_or(total_steps, |cap| cap.min(total_steps));
    let (cls_mechanism, ncls_mechanism) = options.side_mechanisms();

    let mut state = protocol.initial_state();
    let mut results = CyclingResults::new(&protocol.name(), dt, state.direction(), steps);
    info!(
        "{}: {} steps of {} s, starting in {:?}",
        protocol.name(),
        steps,
        dt,
        state
    );

    for _ in 0..steps {
        let potential = match resolve_step(protocol, &mut state, cell, dt, &mut results) {
            Ok(potential) => potential,
            Err(e) => {
                error!("run stopped at t = {:.3} s: {}", cell.time(), e);
                results.termination = Termination::Failed(e);
                break;
            }
        };

        let mut clamped = cell.advance(potential.current, dt);
        if let Some(mechanism) = cls_mechanism {
            clamped |= cell.degrade(Side::Cls, mechanism, dt);
        }
        if let Some(mechanism) = ncls_mechanism {
            clamped |= cell.degrade(Side::Ncls, mechanism, dt);
        }
        let transfer = match &options.crossover {
            Some(crossover) => {
                let (transfer, crossover_clamped) = cell.cross_membrane(crossover, dt);
                clamped |= crossover_clamped;
                transfer
            }
            None => CrossoverTransfer::default(),
        };
        results.record_step(cell, state, &potential, &transfer, clamped);

        let next = protocol.after_step(state, &potential);
        if next != state {
            enter_state(&mut state, next, cell.time(), &mut results);
        }
    }

    if results.is_complete() && steps < total_steps {
        results.termination = Termination::StepCapReached;
    }
    info!(
        "{} finished after {} steps ({:?}), {} half cycles, {} clamped steps",
        protocol.name(),
        results.len(),
        results.termination,
        results.half_cycle_capacity.len(),
        results.clamp_count()
    );
    Ok(results)
}
