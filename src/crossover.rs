//! Diffusive crossover of active species through the membrane.
//!
//! For each species independently the molar transfer over one step is
//! `n = P A (c_cls - c_ncls) dt / L`, positive from the CLS into the NCLS. `P` is in cm²/s,
//! `A` (the geometric membrane area) in cm², `L` is given in µm and concentrations in M.
//! Reservoir volumes are constant, so the moles leaving one side are exactly the moles
//! arriving on the other one.
use crate::errors::{ConfigError, ConfigResult, require_non_negative, require_positive};
use crate::redox_flow_cell::{Reservoir, ReservoirDelta};
use crate::units::{micrometers_to_cm, molar_to_mol_per_cm3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crossover {
    /// µm
    pub membrane_thickness: f64,
    /// cm²/s
    pub permeability_ox: f64,
    /// cm²/s
    pub permeability_red: f64,
}

/// Moles moved from CLS to NCLS in one step (negative: NCLS to CLS)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CrossoverTransfer {
    pub ox_mols: f64,
    pub red_mols: f64,
}

impl Crossover {
    pub fn new(
        membrane_thickness: f64,
        permeability_ox: f64,
        permeability_red: f64,
    ) -> ConfigResult<Self> {
        let crossover = Crossover {
            membrane_thickness,
            permeability_ox,
            permeability_red,
        };
        crossover.validate()?;
        Ok(crossover)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        require_positive("membrane_thickness", self.membrane_thickness)?;
        require_non_negative("permeability_ox", self.permeability_ox)?;
        require_non_negative("permeability_red", self.permeability_red)?;
        if self.permeability_ox == 0.0 && self.permeability_red == 0.0 {
            return Err(ConfigError::invalid(
                "permeability",
                "at least one species must permeate the membrane",
            ));
        }
        Ok(())
    }

    fn flux(&self, permeability: f64, c_cls: f64, c_ncls: f64, area: f64) -> f64 {
        permeability * area * molar_to_mol_per_cm3(c_cls - c_ncls)
            / micrometers_to_cm(self.membrane_thickness)
    }

    pub fn transfer(
        &self,
        cls: &Reservoir,
        ncls: &Reservoir,
        area: f64,
        dt: f64,
    ) -> CrossoverTransfer {
        CrossoverTransfer {
            ox_mols: self.flux(self.permeability_ox, cls.c_ox, ncls.c_ox, area) * dt,
            red_mols: self.flux(self.permeability_red, cls.c_red, ncls.c_red, area) * dt,
        }
    }
}

impl CrossoverTransfer {
    /// (CLS, NCLS) concentration changes for reservoirs of the given volumes (L)
    pub fn deltas(&self, volume_cls: f64, volume_ncls: f64) -> (ReservoirDelta, ReservoirDelta) {
        (
            ReservoirDelta {
                d_ox: -self.ox_mols / volume_cls,
                d_red: -self.red_mols / volume_cls,
                d_dimer: 0.0,
            },
            ReservoirDelta {
                d_ox: self.ox_mols / volume_ncls,
                d_red: self.red_mols / volume_ncls,
                d_dimer: 0.0,
            },
        )
    }
}
