//! # Electrode kinetics of one half-cell
//!
//! Butler-Volmer activation and mass-transport overpotentials of a single redox couple on a
//! porous electrode. Everything here works with current magnitudes: the cell model decides the
//! sign, and which species is consumed, from the direction of the current.
//!
//! ## Main Components
//! - [`ElectrodeKinetics`]: electron count, standard rate constant, transfer coefficient,
//!   electrochemically active area and mass-transfer coefficient of one side
//! - [`Reaction`]: oxidation consumes the reduced species, reduction the oxidized one
//! - [`ElectrodeResponse`]: overpotentials at a given current plus their derivatives with
//!   respect to the current, used by the voltage -> current solve
//!
//! ## Non-Obvious Features & Tips
//! - The exchange current is `i0 = n F A k0 c_ox^(1-α) c_red^α` with concentrations in mol/cm³,
//!   so k0 in cm/s and A in cm² give amperes.
//! - For the symmetric case α = 0.5 the Butler-Volmer equation inverts analytically
//!   (`η = 2RT/(nF) asinh(I/(2 i0))`); any other α goes through [`crate::solver::find_root`].
//! - A current at or above the limiting current has no finite mass-transport overpotential and
//!   is reported as [`SimulationError::LimitingCurrent`].
use crate::errors::{SimulationError, SimulationResult, SolverError};
use crate::solver::{SolverOptions, find_root};
use crate::units::{FARADAY, molar_to_mol_per_cm3, nernst_slope};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reaction {
    Oxidation,
    Reduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElectrodeKinetics {
    pub num_electrons: u32,
    /// standard rate constant k0, cm/s
    pub rate_constant: f64,
    /// charge transfer coefficient α
    pub alpha: f64,
    /// electrochemically active area, cm²
    pub electrode_area: f64,
    /// cm/s
    pub mass_transfer_coefficient: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElectrodeResponse {
    pub activation: f64,
    pub mass_transport: f64,
    /// dη_act/dI
    pub d_activation: f64,
    /// dη_mt/dI
    pub d_mass_transport: f64,
}

impl ElectrodeKinetics {
    fn f(&self) -> f64 {
        1.0 / nernst_slope(self.num_electrons)
    }

    pub fn exchange_current(&self, c_ox: f64, c_red: f64) -> f64 {
        self.num_electrons as f64
            * FARADAY
            * self.electrode_area
            * self.rate_constant
            * molar_to_mol_per_cm3(c_ox).powf(1.0 - self.alpha)
            * molar_to_mol_per_cm3(c_red).powf(self.alpha)
    }

    /// limiting current for a reactant at concentration `c_reactant` (M)
    pub fn limiting_current(&self, c_reactant: f64) -> f64 {
        self.num_electrons as f64
            * FARADAY
            * self.mass_transfer_coefficient
            * self.electrode_area
            * molar_to_mol_per_cm3(c_reactant)
    }

    pub fn reactant(reaction: Reaction, c_ox: f64, c_red: f64) -> f64 {
        match reaction {
            Reaction::Oxidation => c_red,
            Reaction::Reduction => c_ox,
        }
    }

    /// Overpotential magnitude that drives `current` (≥ 0) through an electrode with
    /// exchange current `i0`.
    pub fn activation_overpotential(
        &self,
        current: f64,
        i0: f64,
        options: &SolverOptions,
    ) -> Result<f64, SolverError> {
        if current == 0.0 {
            return Ok(0.0);
        }
        let f = self.f();
        let alpha = self.alpha;
        if (alpha - 0.5).abs() < f64::EPSILON {
            let eta = 2.0 / f * (current / (2.0 * i0)).asinh();
            return if eta.is_finite() {
                Ok(eta)
            } else {
                Err(SolverError::NonFinite(current))
            };
        }
        // exp((1-α)fη) - exp(-αfη) >= current/i0 is guaranteed at this η
        let upper = (1.0 + current / i0).ln() / ((1.0 - alpha) * f);
        if !upper.is_finite() {
            return Err(SolverError::NonFinite(current));
        }
        find_root(
            |eta| {
                let anodic = ((1.0 - alpha) * f * eta).exp();
                let cathodic = (-alpha * f * eta).exp();
                (
                    i0 * (anodic - cathodic) - current,
                    i0 * f * ((1.0 - alpha) * anodic + alpha * cathodic),
                )
            },
            0.0,
            upper,
            options,
        )
    }

    /// dη_act/dI at overpotential `eta`
    pub fn activation_derivative(&self, eta: f64, i0: f64) -> f64 {
        let f = self.f();
        let alpha = self.alpha;
        let slope = i0
            * f
            * ((1.0 - alpha) * ((1.0 - alpha) * f * eta).exp() + alpha * (-alpha * f * eta).exp());
        1.0 / slope
    }

    pub fn mass_transport_overpotential(&self, current: f64, i_lim: f64) -> f64 {
        -nernst_slope(self.num_electrons) * (1.0 - current / i_lim).ln()
    }

    pub fn mass_transport_derivative(&self, current: f64, i_lim: f64) -> f64 {
        nernst_slope(self.num_electrons) / (i_lim - current)
    }

    /// Overpotentials of this electrode carrying `current` (magnitude) for `reaction`.
    pub fn response(
        &self,
        current: f64,
        c_ox: f64,
        c_red: f64,
        reaction: Reaction,
        options: &SolverOptions,
    ) -> SimulationResult<ElectrodeResponse> {
        if current == 0.0 {
            return Ok(ElectrodeResponse::default());
        }
        let i_lim = self.limiting_current(Self::reactant(reaction, c_ox, c_red));
        if current >= i_lim {
            return Err(SimulationError::LimitingCurrent {
                current,
                limit: i_lim,
            });
        }
        let i0 = self.exchange_current(c_ox, c_red);
        if i0 <= 0.0 {
            return Err(SimulationError::ExhaustedSpecies);
        }
        let activation = self.activation_overpotential(current, i0, options)?;
        Ok(ElectrodeResponse {
            activation,
            mass_transport: self.mass_transport_overpotential(current, i_lim),
            d_activation: self.activation_derivative(activation, i0),
            d_mass_transport: self.mass_transport_derivative(current, i_lim),
        })
    }
}
