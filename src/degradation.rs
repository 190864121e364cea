//! # Degradation mechanisms
//!
//! Side reactions that change the concentrations of one reservoir independently of the applied
//! current. Each mechanism is a pure function of the reservoir state and the time step: it
//! returns a [`ReservoirDelta`]. [`Degradation::apply_in_place`] applies it to a reservoir and
//! reports whether anything was clamped at zero, composites included (see
//! [`crate::redox_flow_cell::CellModel::degrade`]).
//!
//! ## Main Components
//! - [`Degradation`]: the common trait, dispatched statically over [`DegradationMechanism`]
//! - [`ChemicalDegradationOxidized`], [`ChemicalDegradationReduced`]: first or second order decay
//!   of one species into an untracked product
//! - [`AutoOxidation`], [`AutoReduction`]: pseudo-first-order red → ox / ox → red conversion
//! - [`Dimerization`]: reversible `2 M ⇌ D` of one species, the dimer is tracked in
//!   [`Reservoir::c_dimer`]
//! - [`MultiDegradationMechanism`]: ordered composition of any of the above
//!
//! ## Non-Obvious Features & Tips
//! - All rate laws are explicit Euler increments over one step: `Δc = -k c^order dt`.
//! - `MultiDegradationMechanism` is sequential, not simultaneous: each mechanism sees the
//!   concentrations left by the previous one in the same step, so the order of the list changes
//!   the result.
//! - Mechanisms deserialize without going through their constructors; the driver calls
//!   [`Degradation::validate`] before the first step.
use crate::errors::{ConfigError, ConfigResult, require_positive};
use crate::redox_flow_cell::{Reservoir, ReservoirDelta};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

#[enum_dispatch]
pub trait Degradation {
    /// concentration change of `reservoir` over `dt`
    fn apply(&self, reservoir: &Reservoir, dt: f64) -> ReservoirDelta;
    /// Applies one step to `reservoir`. Returns `true` if a concentration was clamped at zero.
    fn apply_in_place(&self, reservoir: &mut Reservoir, dt: f64, context: &str) -> bool {
        let delta = self.apply(reservoir, dt);
        reservoir.apply(&delta, context)
    }
    fn validate(&self) -> ConfigResult<()>;
    fn name(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[enum_dispatch(Degradation)]
pub enum DegradationMechanism {
    ChemicalDegradationOxidized(ChemicalDegradationOxidized),
    ChemicalDegradationReduced(ChemicalDegradationReduced),
    AutoOxidation(AutoOxidation),
    AutoReduction(AutoReduction),
    Dimerization(Dimerization),
    MultiDegradationMechanism(MultiDegradationMechanism),
}

/// Redox state of an active species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Species {
    Oxidized,
    #[default]
    Reduced,
}

fn validate_order(rate_order: u32) -> ConfigResult<u32> {
    match rate_order {
        1 | 2 => Ok(rate_order),
        other => Err(ConfigError::invalid(
            "rate_order",
            format!("must be 1 or 2, got {}", other),
        )),
    }
}

fn decay(c: f64, rate_order: u32, rate_constant: f64, dt: f64) -> f64 {
    -rate_constant * c.powi(rate_order as i32) * dt
}

////////////////////////////// CHEMICAL DEGRADATION //////////////////////////////

/// Decay of the oxidized species, `Δc_ox = -k c_ox^order dt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemicalDegradationOxidized {
    pub rate_order: u32,
    /// 1/s or 1/(M s)
    pub rate_constant: f64,
}

impl ChemicalDegradationOxidized {
    pub fn new(rate_order: u32, rate_constant: f64) -> ConfigResult<Self> {
        let mechanism = Self {
            rate_order,
            rate_constant,
        };
        mechanism.validate()?;
        Ok(mechanism)
    }
}

impl Degradation for ChemicalDegradationOxidized {
    fn apply(&self, reservoir: &Reservoir, dt: f64) -> ReservoirDelta {
        ReservoirDelta {
            d_ox: decay(reservoir.c_ox, self.rate_order, self.rate_constant, dt),
            ..Default::default()
        }
    }
    fn validate(&self) -> ConfigResult<()> {
        validate_order(self.rate_order)?;
        require_positive("rate_constant", self.rate_constant)?;
        Ok(())
    }
    fn name(&self) -> String {
        format!("chemical degradation (oxidized, order {})", self.rate_order)
    }
}

/// Decay of the reduced species, `Δc_red = -k c_red^order dt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemicalDegradationReduced {
    pub rate_order: u32,
    pub rate_constant: f64,
}

impl ChemicalDegradationReduced {
    pub fn new(rate_order: u32, rate_constant: f64) -> ConfigResult<Self> {
        let mechanism = Self {
            rate_order,
            rate_constant,
        };
        mechanism.validate()?;
        Ok(mechanism)
    }
}

impl Degradation for ChemicalDegradationReduced {
    fn apply(&self, reservoir: &Reservoir, dt: f64) -> ReservoirDelta {
        ReservoirDelta {
            d_red: decay(reservoir.c_red, self.rate_order, self.rate_constant, dt),
            ..Default::default()
        }
    }
    fn validate(&self) -> ConfigResult<()> {
        validate_order(self.rate_order)?;
        require_positive("rate_constant", self.rate_constant)?;
        Ok(())
    }
    fn name(&self) -> String {
        format!("chemical degradation (reduced, order {})", self.rate_order)
    }
}

////////////////////////////// SELF-DISCHARGE //////////////////////////////

/// Reduced species converted to oxidized at `k c_red dt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoOxidation {
    /// 1/s
    pub rate_constant: f64,
}

impl AutoOxidation {
    pub fn new(rate_constant: f64) -> ConfigResult<Self> {
        let mechanism = Self { rate_constant };
        mechanism.validate()?;
        Ok(mechanism)
    }
}

impl Degradation for AutoOxidation {
    fn apply(&self, reservoir: &Reservoir, dt: f64) -> ReservoirDelta {
        let converted = self.rate_constant * reservoir.c_red * dt;
        ReservoirDelta {
            d_ox: converted,
            d_red: -converted,
            d_dimer: 0.0,
        }
    }
    fn validate(&self) -> ConfigResult<()> {
        require_positive("rate_constant", self.rate_constant)?;
        Ok(())
    }
    fn name(&self) -> String {
        "auto-oxidation".to_string()
    }
}

/// Oxidized species converted to reduced at `k c_ox dt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoReduction {
    pub rate_constant: f64,
}

impl AutoReduction {
    pub fn new(rate_constant: f64) -> ConfigResult<Self> {
        let mechanism = Self { rate_constant };
        mechanism.validate()?;
        Ok(mechanism)
    }
}

impl Degradation for AutoReduction {
    fn apply(&self, reservoir: &Reservoir, dt: f64) -> ReservoirDelta {
        let converted = self.rate_constant * reservoir.c_ox * dt;
        ReservoirDelta {
            d_ox: -converted,
            d_red: converted,
            d_dimer: 0.0,
        }
    }
    fn validate(&self) -> ConfigResult<()> {
        require_positive("rate_constant", self.rate_constant)?;
        Ok(())
    }
    fn name(&self) -> String {
        "auto-reduction".to_string()
    }
}

////////////////////////////// DIMERIZATION //////////////////////////////

/// Reversible `2 M ⇌ D`.
///
/// Forward: `kf c_M² dt` of dimer formed, twice that of monomer consumed.
/// Backward: `kb c_D dt` of dimer split back into two monomers.
/// `c_M + 2 c_D` is conserved by this mechanism alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimerization {
    /// 1/(M s)
    pub forward_rate_constant: f64,
    /// 1/s
    pub backward_rate_constant: f64,
    #[serde(default)]
    pub species: Species,
}

impl Dimerization {
    pub fn new(forward_rate_constant: f64, backward_rate_constant: f64) -> ConfigResult<Self> {
        let mechanism = Self {
            forward_rate_constant,
            backward_rate_constant,
            species: Species::Reduced,
        };
        mechanism.validate()?;
        Ok(mechanism)
    }

    pub fn of_species(mut self, species: Species) -> Self {
        self.species = species;
        self
    }
}

impl Degradation for Dimerization {
    fn apply(&self, reservoir: &Reservoir, dt: f64) -> ReservoirDelta {
        let monomer = match self.species {
            Species::Oxidized => reservoir.c_ox,
            Species::Reduced => reservoir.c_red,
        };
        let formed = self.forward_rate_constant * monomer * monomer * dt;
        let split = self.backward_rate_constant * reservoir.c_dimer * dt;
        let d_monomer = 2.0 * (split - formed);
        let d_dimer = formed - split;
        match self.species {
            Species::Oxidized => ReservoirDelta {
                d_ox: d_monomer,
                d_red: 0.0,
                d_dimer,
            },
            Species::Reduced => ReservoirDelta {
                d_ox: 0.0,
                d_red: d_monomer,
                d_dimer,
            },
        }
    }
    fn validate(&self) -> ConfigResult<()> {
        require_positive("forward_rate_constant", self.forward_rate_constant)?;
        require_positive("backward_rate_constant", self.backward_rate_constant)?;
        Ok(())
    }
    fn name(&self) -> String {
        format!("dimerization ({:?})", self.species)
    }
}

////////////////////////////// COMPOSITION //////////////////////////////

/// Mechanisms applied one after another within each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiDegradationMechanism {
    pub mechanisms: Vec<DegradationMechanism>,
}

impl MultiDegradationMechanism {
    pub fn new(mechanisms: Vec<DegradationMechanism>) -> ConfigResult<Self> {
        let mechanism = Self { mechanisms };
        mechanism.validate()?;
        Ok(mechanism)
    }
}

impl Degradation for MultiDegradationMechanism {
    fn apply(&self, reservoir: &Reservoir, dt: f64) -> ReservoirDelta {
        let mut local = *reservoir;
        self.apply_in_place(&mut local, dt, "composite degradation");
        local.delta_from(reservoir)
    }
    fn apply_in_place(&self, reservoir: &mut Reservoir, dt: f64, context: &str) -> bool {
        let mut clamped = false;
        for mechanism in &self.mechanisms {
            clamped |= mechanism.apply_in_place(reservoir, dt, context);
        }
        clamped
    }
    fn validate(&self) -> ConfigResult<()> {
        if self.mechanisms.is_empty() {
            return Err(ConfigError::invalid(
                "mechanisms",
                "a composite mechanism needs at least one entry",
            ));
        }
        for mechanism in &self.mechanisms {
            mechanism.validate()?;
        }
        Ok(())
    }
    fn name(&self) -> String {
        let names: Vec<String> = self.mechanisms.iter().map(|m| m.name()).collect();
        names.join(" -> ")
    }
}

//////////////////////////////////TESTS////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reservoir() -> Reservoir {
        Reservoir::new(0.02, 0.01)
    }

    #[test]
    fn first_and_second_order_decay() {
        let first = ChemicalDegradationReduced::new(1, 1e-3).unwrap();
        let delta = first.apply(&reservoir(), 2.0);
        assert_relative_eq!(delta.d_red, -1e-3 * 0.01 * 2.0);
        assert_eq!(delta.d_ox, 0.0);

        let second = ChemicalDegradationOxidized::new(2, 0.5).unwrap();
        let delta = second.apply(&reservoir(), 1.0);
        assert_relative_eq!(delta.d_ox, -0.5 * 0.02 * 0.02);
        assert_eq!(delta.d_red, 0.0);
    }

    #[test]
    fn self_discharge_conserves_active_material() {
        let r = reservoir();
        let ox = AutoOxidation::new(0.1).unwrap().apply(&r, 1.0);
        assert_relative_eq!(ox.d_ox, 0.1 * 0.01);
        assert_relative_eq!(ox.d_ox + ox.d_red, 0.0);
        let red = AutoReduction::new(0.1).unwrap().apply(&r, 1.0);
        assert_relative_eq!(red.d_red, 0.1 * 0.02);
        assert_relative_eq!(red.d_ox + red.d_red, 0.0);
    }

    #[test]
    fn dimerization_conserves_monomer_units() {
        let dimer = Dimerization::new(0.5, 0.01).unwrap();
        let mut r = reservoir();
        let initial = r.c_red + 2.0 * r.c_dimer;
        for _ in 0..1000 {
            let delta = dimer.apply(&r, 1.0);
            r.apply(&delta, "test");
        }
        assert!(r.c_dimer > 0.0);
        assert_relative_eq!(r.c_red + 2.0 * r.c_dimer, initial, epsilon = 1e-13);
        assert_eq!(r.c_ox, 0.02);

        let ox_dimer = Dimerization::new(0.5, 0.01)
            .unwrap()
            .of_species(Species::Oxidized);
        let delta = ox_dimer.apply(&reservoir(), 1.0);
        assert_relative_eq!(delta.d_ox, -2.0 * 0.5 * 0.02 * 0.02);
        assert_eq!(delta.d_red, 0.0);
    }

    #[test]
    fn dimerization_backward_reaction() {
        let dimer = Dimerization::new(1e-9, 0.1).unwrap();
        let r = Reservoir {
            c_ox: 0.0,
            c_red: 0.0,
            c_dimer: 0.01,
        };
        let delta = dimer.apply(&r, 1.0);
        assert_relative_eq!(delta.d_dimer, -0.1 * 0.01);
        assert_relative_eq!(delta.d_red, 2.0 * 0.1 * 0.01);
    }

    #[test]
    fn composition_is_sequential_and_order_sensitive() {
        let auto: DegradationMechanism = AutoOxidation::new(0.1).unwrap().into();
        let chem: DegradationMechanism = ChemicalDegradationReduced::new(1, 0.1).unwrap().into();
        let r = reservoir();

        let auto_first = MultiDegradationMechanism::new(vec![auto.clone(), chem.clone()]).unwrap();
        let delta = auto_first.apply(&r, 1.0);
        // auto-oxidation leaves 0.009 M reduced, chemical decay then removes 10% of that
        assert_relative_eq!(delta.d_red, -0.001 - 0.0009, epsilon = 1e-15);
        assert_relative_eq!(delta.d_ox, 0.001, epsilon = 1e-15);

        let chem_first = MultiDegradationMechanism::new(vec![chem, auto]).unwrap();
        let reordered = chem_first.apply(&r, 1.0);
        assert_relative_eq!(reordered.d_ox, 0.0009, epsilon = 1e-15);
        assert!(reordered != delta);
    }

    #[test]
    fn clamp_inside_a_composite_is_reported() {
        let decay: DegradationMechanism = ChemicalDegradationReduced::new(1, 2.0).unwrap().into();
        let mut single = reservoir();
        assert!(decay.apply_in_place(&mut single, 1.0, "single"));
        assert_eq!(single.c_red, 0.0);

        let composite: DegradationMechanism =
            MultiDegradationMechanism::new(vec![decay.clone()]).unwrap().into();
        let mut nested = reservoir();
        assert!(composite.apply_in_place(&mut nested, 1.0, "composite"));
        assert_eq!(nested, single);

        // a later mechanism that does not clamp keeps the flag raised
        let gentle: DegradationMechanism = AutoReduction::new(0.1).unwrap().into();
        let mixed = MultiDegradationMechanism::new(vec![decay, gentle.clone()]).unwrap();
        let mut r = reservoir();
        assert!(mixed.apply_in_place(&mut r, 1.0, "mixed"));

        let only_gentle = MultiDegradationMechanism::new(vec![gentle]).unwrap();
        let mut untouched = reservoir();
        assert!(!only_gentle.apply_in_place(&mut untouched, 1.0, "gentle"));
    }

    #[test]
    fn invalid_constants_are_rejected() {
        assert!(ChemicalDegradationReduced::new(3, 1e-3).is_err());
        assert!(ChemicalDegradationOxidized::new(1, 0.0).is_err());
        assert!(AutoOxidation::new(-1.0).is_err());
        assert!(Dimerization::new(0.1, 0.0).is_err());
        assert!(MultiDegradationMechanism::new(vec![]).is_err());
        let nested_bad = MultiDegradationMechanism {
            mechanisms: vec![DegradationMechanism::AutoReduction(AutoReduction {
                rate_constant: -1.0,
            })],
        };
        assert!(nested_bad.validate().is_err());
    }

    #[test]
    fn serde_round_trip_keeps_variant() {
        let mechanism: DegradationMechanism =
            MultiDegradationMechanism::new(vec![Dimerization::new(0.1, 0.01).unwrap().into()])
                .unwrap()
                .into();
        let json = serde_json::to_string(&mechanism).unwrap();
        assert!(json.contains("MultiDegradationMechanism"));
        let back: DegradationMechanism = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mechanism);
    }
}
