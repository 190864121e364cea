//! # Zero-Dimensional Redox Flow Cell
//!
//! Lumped-parameter model of a redox flow cell with two well-mixed reservoirs: the
//! capacity-limiting side (CLS) and the non-capacity-limiting side (NCLS). The model owns the
//! mutable concentration state and knows how to turn a current into a voltage, a voltage into a
//! current, and a current into a concentration change.
//!
//! ## Main Components
//! - [`CellParameters`]: serde-enabled description of the cell (the ten required values plus
//!   optional electron counts, time step, transfer coefficients and electrode geometry)
//! - [`CellModel`]: validated parameters + [`Reservoir`] state of both sides + simulation clock
//! - [`CellPotential`]: one operating point (current, OCV, overpotential breakdown, voltage)
//! - [`Reservoir`], [`ReservoirDelta`]: per-side concentrations and increments; every change of
//!   state (Faraday step, degradation, crossover) goes through [`Reservoir::apply`]
//!
//! ## Key Methods
//! - **Setup**: `CellParameters::new()` → builder methods → `CellModel::from_parameters()`
//!   (or the positional `CellModel::new()`)
//! - **Electrochemistry**: `open_circuit_voltage()`, `cell_potential()`,
//!   `solve_voltage_for_current()`, `solve_current_for_voltage()`
//! - **State update**: `coulombic_current_to_concentration_delta()`, `advance()`, `degrade()`,
//!   `cross_membrane()`
//!
//! ## Non-Obvious Features & Tips
//!
//! ### Sign convention
//! - Positive current charges the cell: the CLS is oxidized (red → ox) and the NCLS is reduced
//!   (ox → red). The CLS therefore plays the positive electrolyte and
//!   `OCV = E50 + RT/(n_cls F) ln(ox_cls/red_cls) - RT/(n_ncls F) ln(ox_ncls/red_ncls)`.
//! - `V(I) = OCV + sign(I) (|I| R + η_act,cls + η_act,ncls + η_mt,cls + η_mt,ncls)`.
//!
//! ### Negative concentrations
//! - Concentrations are clamped at zero. A clamp logs a warning and is reported back to the
//!   caller as `true`, the driver records it per step.
//! - `step_is_feasible()` lets protocols avoid a constant-current step that would exhaust a
//!   reactant instead of relying on the clamp.
//!
//! ### Voltage → current
//! - Solved on the current magnitude between 0 and just below the smaller limiting current of
//!   the two electrodes, with the analytic derivative `dV/dI = R + Σ dη/dI`. A target voltage
//!   that cannot be reached below the limiting current is a solver error.
use crate::crossover::{Crossover, CrossoverTransfer};
use crate::degradation::{Degradation, DegradationMechanism};
use crate::electrode_kinetics::{ElectrodeKinetics, ElectrodeResponse, Reaction};
use crate::errors::{
    ConfigError, ConfigResult, SimulationError, SimulationResult, require_positive,
};
use crate::solver::{SolverOptions, find_root};
use crate::units::{FARADAY, nernst_slope};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// relative distance kept from the limiting current when bracketing the voltage solve
const LIMIT_MARGIN: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Cls,
    Ncls,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Cls => write!(f, "CLS"),
            Side::Ncls => write!(f, "NCLS"),
        }
    }
}

/// Concentrations (M) of one reservoir
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reservoir {
    pub c_ox: f64,
    pub c_red: f64,
    /// dimer formed by [`crate::degradation::Dimerization`]
    pub c_dimer: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReservoirDelta {
    pub d_ox: f64,
    pub d_red: f64,
    pub d_dimer: f64,
}

fn clamped_add(value: &mut f64, delta: f64, species: &str, context: &str) -> bool {
    let updated = *value + delta;
    if updated < 0.0 {
        warn!(
            "{}: {} would become negative ({:e} M), clamped to zero",
            context, species, updated
        );
        *value = 0.0;
        true
    } else {
        *value = updated;
        false
    }
}

impl Reservoir {
    pub fn new(c_ox: f64, c_red: f64) -> Self {
        Reservoir {
            c_ox,
            c_red,
            c_dimer: 0.0,
        }
    }

    /// Adds `delta`, clamping every concentration at zero. Returns `true` if anything was
    /// clamped.
    pub fn apply(&mut self, delta: &ReservoirDelta, context: &str) -> bool {
        let ox = clamped_add(&mut self.c_ox, delta.d_ox, "c_ox", context);
        let red = clamped_add(&mut self.c_red, delta.d_red, "c_red", context);
        let dimer = clamped_add(&mut self.c_dimer, delta.d_dimer, "c_dimer", context);
        ox || red || dimer
    }

    /// `self - earlier`
    pub fn delta_from(&self, earlier: &Reservoir) -> ReservoirDelta {
        ReservoirDelta {
            d_ox: self.c_ox - earlier.c_ox,
            d_red: self.c_red - earlier.c_red,
            d_dimer: self.c_dimer - earlier.c_dimer,
        }
    }

    pub fn total_active(&self) -> f64 {
        self.c_ox + self.c_red
    }
}

/// Faraday's-law change of the four active concentrations over one step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConcentrationDelta {
    pub d_ox_cls: f64,
    pub d_red_cls: f64,
    pub d_ox_ncls: f64,
    pub d_red_ncls: f64,
}

impl ConcentrationDelta {
    pub fn cls(&self) -> ReservoirDelta {
        ReservoirDelta {
            d_ox: self.d_ox_cls,
            d_red: self.d_red_cls,
            d_dimer: 0.0,
        }
    }
    pub fn ncls(&self) -> ReservoirDelta {
        ReservoirDelta {
            d_ox: self.d_ox_ncls,
            d_red: self.d_red_ncls,
            d_dimer: 0.0,
        }
    }
}

/// One operating point of the cell. Overpotentials are magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CellPotential {
    pub current: f64,
    pub ocv: f64,
    pub ohmic: f64,
    pub activation: f64,
    pub mass_transport: f64,
    pub overpotential: f64,
    pub voltage: f64,
}

impl CellPotential {
    fn at_rest(ocv: f64) -> Self {
        CellPotential {
            ocv,
            voltage: ocv,
            ..Default::default()
        }
    }
}

fn default_electrons() -> u32 {
    1
}
fn default_time_step() -> f64 {
    1.0
}
fn default_alpha() -> f64 {
    0.5
}
fn default_geometric_area() -> f64 {
    5.0
}
fn default_electrode_thickness() -> f64 {
    0.4
}
fn default_specific_area() -> f64 {
    100.0
}
fn default_mass_transfer_coefficient() -> f64 {
    0.05
}

/// Everything needed to build a [`CellModel`].
///
/// Units: volumes L, concentrations M, `ocv_50_soc` V, `resistance` Ω, rate constants cm/s,
/// `time_step` s, `geometric_area` cm², `electrode_thickness` cm, `specific_area` cm⁻¹,
/// `mass_transfer_coefficient` cm/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellParameters {
    pub volume_cls: f64,
    pub volume_ncls: f64,
    pub c_ox_cls: f64,
    pub c_red_cls: f64,
    pub c_ox_ncls: f64,
    pub c_red_ncls: f64,
    pub ocv_50_soc: f64,
    pub resistance: f64,
    pub k_0_cls: f64,
    pub k_0_ncls: f64,
    #[serde(default = "default_electrons")]
    pub num_electrons_cls: u32,
    #[serde(default = "default_electrons")]
    pub num_electrons_ncls: u32,
    #[serde(default = "default_time_step")]
    pub time_step: f64,
    #[serde(default = "default_alpha")]
    pub alpha_cls: f64,
    #[serde(default = "default_alpha")]
    pub alpha_ncls: f64,
    #[serde(default = "default_geometric_area")]
    pub geometric_area: f64,
    #[serde(default = "default_electrode_thickness")]
    pub electrode_thickness: f64,
    #[serde(default = "default_specific_area")]
    pub specific_area: f64,
    #[serde(default = "default_mass_transfer_coefficient")]
    pub mass_transfer_coefficient: f64,
}

impl CellParameters {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        volume_cls: f64,
        volume_ncls: f64,
        c_ox_cls: f64,
        c_red_cls: f64,
        c_ox_ncls: f64,
        c_red_ncls: f64,
        ocv_50_soc: f64,
        resistance: f64,
        k_0_cls: f64,
        k_0_ncls: f64,
    ) -> Self {
        CellParameters {
            volume_cls,
            volume_ncls,
            c_ox_cls,
            c_red_cls,
            c_ox_ncls,
            c_red_ncls,
            ocv_50_soc,
            resistance,
            k_0_cls,
            k_0_ncls,
            num_electrons_cls: default_electrons(),
            num_electrons_ncls: default_electrons(),
            time_step: default_time_step(),
            alpha_cls: default_alpha(),
            alpha_ncls: default_alpha(),
            geometric_area: default_geometric_area(),
            electrode_thickness: default_electrode_thickness(),
            specific_area: default_specific_area(),
            mass_transfer_coefficient: default_mass_transfer_coefficient(),
        }
    }

    pub fn num_electrons(mut self, cls: u32, ncls: u32) -> Self {
        self.num_electrons_cls = cls;
        self.num_electrons_ncls = ncls;
        self
    }

    pub fn time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn alpha(mut self, cls: f64, ncls: f64) -> Self {
        self.alpha_cls = cls;
        self.alpha_ncls = ncls;
        self
    }

    pub fn geometry(
        mut self,
        geometric_area: f64,
        electrode_thickness: f64,
        specific_area: f64,
    ) -> Self {
        self.geometric_area = geometric_area;
        self.electrode_thickness = electrode_thickness;
        self.specific_area = specific_area;
        self
    }

    pub fn mass_transfer_coefficient(mut self, mass_transfer_coefficient: f64) -> Self {
        self.mass_transfer_coefficient = mass_transfer_coefficient;
        self
    }

    /// electrochemically active area of one electrode, cm²
    pub fn electrode_area(&self) -> f64 {
        self.geometric_area * self.electrode_thickness * self.specific_area
    }

    pub fn validate(&self) -> ConfigResult<()> {
        require_positive("volume_cls", self.volume_cls)?;
        require_positive("volume_ncls", self.volume_ncls)?;
        // the Nernst potential is undefined for an empty species
        require_positive("c_ox_cls", self.c_ox_cls)?;
        require_positive("c_red_cls", self.c_red_cls)?;
        require_positive("c_ox_ncls", self.c_ox_ncls)?;
        require_positive("c_red_ncls", self.c_red_ncls)?;
        if !self.ocv_50_soc.is_finite() {
            return Err(ConfigError::invalid("ocv_50_soc", "must be finite"));
        }
        require_positive("resistance", self.resistance)?;
        require_positive("k_0_cls", self.k_0_cls)?;
        require_positive("k_0_ncls", self.k_0_ncls)?;
        if self.num_electrons_cls < 1 {
            return Err(ConfigError::invalid("num_electrons_cls", "must be at least 1"));
        }
        if self.num_electrons_ncls < 1 {
            return Err(ConfigError::invalid("num_electrons_ncls", "must be at least 1"));
        }
        require_positive("time_step", self.time_step)?;
        for (name, alpha) in [("alpha_cls", self.alpha_cls), ("alpha_ncls", self.alpha_ncls)] {
            if !(alpha > 0.0 && alpha < 1.0) {
                return Err(ConfigError::invalid(
                    name,
                    format!("must lie strictly between 0 and 1, got {}", alpha),
                ));
            }
        }
        require_positive("geometric_area", self.geometric_area)?;
        require_positive("electrode_thickness", self.electrode_thickness)?;
        require_positive("specific_area", self.specific_area)?;
        require_positive("mass_transfer_coefficient", self.mass_transfer_coefficient)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellModel {
    volume_cls: f64,
    volume_ncls: f64,
    ocv_50_soc: f64,
    resistance: f64,
    geometric_area: f64,
    time_step: f64,
    cls_kinetics: ElectrodeKinetics,
    ncls_kinetics: ElectrodeKinetics,
    cls: Reservoir,
    ncls: Reservoir,
    time: f64,
    solver_options: SolverOptions,
}

impl CellModel {
    /// Cell with default electron counts (1), time step (1 s), transfer coefficients and
    /// electrode geometry.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        volume_cls: f64,
        volume_ncls: f64,
        c_ox_cls: f64,
        c_red_cls: f64,
        c_ox_ncls: f64,
        c_red_ncls: f64,
        ocv_50_soc: f64,
        resistance: f64,
        k_0_cls: f64,
        k_0_ncls: f64,
    ) -> ConfigResult<Self> {
        Self::from_parameters(CellParameters::new(
            volume_cls, volume_ncls, c_ox_cls, c_red_cls, c_ox_ncls, c_red_ncls, ocv_50_soc,
            resistance, k_0_cls, k_0_ncls,
        ))
    }

    pub fn from_parameters(params: CellParameters) -> ConfigResult<Self> {
        params.validate()?;
        let electrode_area = params.electrode_area();
        Ok(CellModel {
            volume_cls: params.volume_cls,
            volume_ncls: params.volume_ncls,
            ocv_50_soc: params.ocv_50_soc,
            resistance: params.resistance,
            geometric_area: params.geometric_area,
            time_step: params.time_step,
            cls_kinetics: ElectrodeKinetics {
                num_electrons: params.num_electrons_cls,
                rate_constant: params.k_0_cls,
                alpha: params.alpha_cls,
                electrode_area,
                mass_transfer_coefficient: params.mass_transfer_coefficient,
            },
            ncls_kinetics: ElectrodeKinetics {
                num_electrons: params.num_electrons_ncls,
                rate_constant: params.k_0_ncls,
                alpha: params.alpha_ncls,
                electrode_area,
                mass_transfer_coefficient: params.mass_transfer_coefficient,
            },
            cls: Reservoir::new(params.c_ox_cls, params.c_red_cls),
            ncls: Reservoir::new(params.c_ox_ncls, params.c_red_ncls),
            time: 0.0,
            solver_options: SolverOptions::default(),
        })
    }

    pub fn with_solver_options(mut self, options: SolverOptions) -> Self {
        self.solver_options = options;
        self
    }

    ///////////////////////////// STATE ACCESS /////////////////////////////

    pub fn time(&self) -> f64 {
        self.time
    }
    pub fn time_step(&self) -> f64 {
        self.time_step
    }
    pub fn volume_cls(&self) -> f64 {
        self.volume_cls
    }
    pub fn volume_ncls(&self) -> f64 {
        self.volume_ncls
    }
    pub fn geometric_area(&self) -> f64 {
        self.geometric_area
    }
    pub fn resistance(&self) -> f64 {
        self.resistance
    }
    pub fn c_ox_cls(&self) -> f64 {
        self.cls.c_ox
    }
    pub fn c_red_cls(&self) -> f64 {
        self.cls.c_red
    }
    pub fn c_ox_ncls(&self) -> f64 {
        self.ncls.c_ox
    }
    pub fn c_red_ncls(&self) -> f64 {
        self.ncls.c_red
    }

    pub fn reservoir(&self, side: Side) -> &Reservoir {
        match side {
            Side::Cls => &self.cls,
            Side::Ncls => &self.ncls,
        }
    }

    fn reservoir_mut(&mut self, side: Side) -> &mut Reservoir {
        match side {
            Side::Cls => &mut self.cls,
            Side::Ncls => &mut self.ncls,
        }
    }

    pub fn kinetics(&self, side: Side) -> &ElectrodeKinetics {
        match side {
            Side::Cls => &self.cls_kinetics,
            Side::Ncls => &self.ncls_kinetics,
        }
    }

    /// oxidized fraction of the CLS, %
    pub fn state_of_charge_cls(&self) -> f64 {
        let total = self.cls.total_active();
        if total > 0.0 {
            100.0 * self.cls.c_ox / total
        } else {
            0.0
        }
    }

    /// reduced fraction of the NCLS, %
    pub fn state_of_charge_ncls(&self) -> f64 {
        let total = self.ncls.total_active();
        if total > 0.0 {
            100.0 * self.ncls.c_red / total
        } else {
            0.0
        }
    }

    ///////////////////////////// ELECTROCHEMISTRY /////////////////////////////

    pub fn open_circuit_voltage(&self) -> f64 {
        self.ocv_50_soc
            + nernst_slope(self.cls_kinetics.num_electrons) * (self.cls.c_ox / self.cls.c_red).ln()
            - nernst_slope(self.ncls_kinetics.num_electrons)
                * (self.ncls.c_ox / self.ncls.c_red).ln()
    }

    fn finite_ocv(&self) -> SimulationResult<f64> {
        let ocv = self.open_circuit_voltage();
        if ocv.is_finite() {
            Ok(ocv)
        } else {
            Err(SimulationError::ExhaustedSpecies)
        }
    }

    /// Smaller of the two electrodes' limiting currents for the given direction.
    pub fn limiting_current(&self, charging: bool) -> f64 {
        let (cls_reaction, ncls_reaction) = reactions(charging);
        let cls = self.cls_kinetics.limiting_current(ElectrodeKinetics::reactant(
            cls_reaction,
            self.cls.c_ox,
            self.cls.c_red,
        ));
        let ncls = self.ncls_kinetics.limiting_current(ElectrodeKinetics::reactant(
            ncls_reaction,
            self.ncls.c_ox,
            self.ncls.c_red,
        ));
        cls.min(ncls)
    }

    fn electrode_responses(
        &self,
        magnitude: f64,
        charging: bool,
    ) -> SimulationResult<(ElectrodeResponse, ElectrodeResponse)> {
        let (cls_reaction, ncls_reaction) = reactions(charging);
        let cls = self.cls_kinetics.response(
            magnitude,
            self.cls.c_ox,
            self.cls.c_red,
            cls_reaction,
            &self.solver_options,
        )?;
        let ncls = self.ncls_kinetics.response(
            magnitude,
            self.ncls.c_ox,
            self.ncls.c_red,
            ncls_reaction,
            &self.solver_options,
        )?;
        Ok((cls, ncls))
    }

    /// Full operating point at `current` (A, positive = charge).
    pub fn cell_potential(&self, current: f64) -> SimulationResult<CellPotential> {
        let ocv = self.finite_ocv()?;
        if current == 0.0 {
            return Ok(CellPotential::at_rest(ocv));
        }
        let magnitude = current.abs();
        let (cls, ncls) = self.electrode_responses(magnitude, current > 0.0)?;
        let ohmic = magnitude * self.resistance;
        let activation = cls.activation + ncls.activation;
        let mass_transport = cls.mass_transport + ncls.mass_transport;
        let overpotential = ohmic + activation + mass_transport;
        Ok(CellPotential {
            current,
            ocv,
            ohmic,
            activation,
            mass_transport,
            overpotential,
            voltage: ocv + current.signum() * overpotential,
        })
    }

    pub fn solve_voltage_for_current(&self, current: f64) -> SimulationResult<f64> {
        Ok(self.cell_potential(current)?.voltage)
    }

    /// Operating point whose voltage is `target`.
    pub fn potential_at_voltage(&self, target: f64) -> SimulationResult<CellPotential> {
        let ocv = self.finite_ocv()?;
        let gap = target - ocv;
        if gap == 0.0 {
            return Ok(CellPotential::at_rest(ocv));
        }
        let charging = gap > 0.0;
        let upper = self.limiting_current(charging) * (1.0 - LIMIT_MARGIN);
        if upper <= 0.0 {
            return Err(SimulationError::ExhaustedSpecies);
        }
        let resistance = self.resistance;
        let magnitude = find_root(
            |magnitude| match self.electrode_responses(magnitude, charging) {
                Ok((cls, ncls)) => (
                    magnitude * resistance
                        + cls.activation
                        + ncls.activation
                        + cls.mass_transport
                        + ncls.mass_transport
                        - gap.abs(),
                    resistance
                        + cls.d_activation
                        + ncls.d_activation
                        + cls.d_mass_transport
                        + ncls.d_mass_transport,
                ),
                Err(_) => (f64::NAN, f64::NAN),
            },
            0.0,
            upper,
            &self.solver_options,
        )?;
        self.cell_potential(gap.signum() * magnitude)
    }

    pub fn solve_current_for_voltage(&self, target: f64) -> SimulationResult<f64> {
        Ok(self.potential_at_voltage(target)?.current)
    }

    ///////////////////////////// STATE UPDATE /////////////////////////////

    /// Faraday's law: concentration changes produced by `current` flowing for `dt`.
    pub fn coulombic_current_to_concentration_delta(
        &self,
        current: f64,
        dt: f64,
    ) -> ConcentrationDelta {
        let d_cls =
            current * dt / (self.cls_kinetics.num_electrons as f64 * FARADAY * self.volume_cls);
        let d_ncls =
            current * dt / (self.ncls_kinetics.num_electrons as f64 * FARADAY * self.volume_ncls);
        ConcentrationDelta {
            d_ox_cls: d_cls,
            d_red_cls: -d_cls,
            d_ox_ncls: -d_ncls,
            d_red_ncls: d_ncls,
        }
    }

    /// `true` if the Faraday update for `current` over `dt` leaves every active species
    /// strictly positive.
    pub fn step_is_feasible(&self, current: f64, dt: f64) -> bool {
        let delta = self.coulombic_current_to_concentration_delta(current, dt);
        self.cls.c_ox + delta.d_ox_cls > 0.0
            && self.cls.c_red + delta.d_red_cls > 0.0
            && self.ncls.c_ox + delta.d_ox_ncls > 0.0
            && self.ncls.c_red + delta.d_red_ncls > 0.0
    }

    /// Applies the Faraday update and advances the clock. Returns `true` if a concentration had
    /// to be clamped at zero.
    pub fn advance(&mut self, current: f64, dt: f64) -> bool {
        let delta = self.coulombic_current_to_concentration_delta(current, dt);
        let cls = self.cls.apply(&delta.cls(), "CLS Faraday step");
        let ncls = self.ncls.apply(&delta.ncls(), "NCLS Faraday step");
        self.time += dt;
        cls || ncls
    }

    /// Applies one step of `mechanism` to the reservoir of `side`. Returns `true` if a
    /// concentration had to be clamped at zero, including inside a composite mechanism.
    pub fn degrade(&mut self, side: Side, mechanism: &DegradationMechanism, dt: f64) -> bool {
        let context = format!("{} degradation", side);
        mechanism.apply_in_place(self.reservoir_mut(side), dt, &context)
    }

    /// Moves material across the membrane for one step.
    pub fn cross_membrane(&mut self, crossover: &Crossover, dt: f64) -> (CrossoverTransfer, bool) {
        let transfer = crossover.transfer(&self.cls, &self.ncls, self.geometric_area, dt);
        let (cls_delta, ncls_delta) = transfer.deltas(self.volume_cls, self.volume_ncls);
        let cls = self.cls.apply(&cls_delta, "CLS crossover");
        let ncls = self.ncls.apply(&ncls_delta, "NCLS crossover");
        (transfer, cls || ncls)
    }
}

/// (CLS, NCLS) electrode reactions for the current direction
fn reactions(charging: bool) -> (Reaction, Reaction) {
    if charging {
        (Reaction::Oxidation, Reaction::Reduction)
    } else {
        (Reaction::Reduction, Reaction::Oxidation)
    }
}
