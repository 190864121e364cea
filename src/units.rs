//! Physical constants and the unit convention used across the crate.
//!
//! Volumes are in liters, concentrations in mol/L (M), time in seconds, current in amperes,
//! potentials in volts, resistance in ohms. Electrode geometry is in cm (areas in cm²,
//! rate constants and mass-transfer coefficients in cm/s). Membrane thickness is given in µm and
//! permeabilities in cm²/s.

/// Faraday constant, C/mol
pub const FARADAY: f64 = 96485.33212;
/// Molar gas constant, J/(mol K)
pub const GAS_CONSTANT: f64 = 8.314462618;
/// Cell temperature, K
pub const TEMPERATURE: f64 = 298.15;

/// Thermal voltage RT/F, V
pub fn thermal_voltage() -> f64 {
    GAS_CONSTANT * TEMPERATURE / FARADAY
}

/// RT/(nF) for a redox couple exchanging `n` electrons
pub fn nernst_slope(n: u32) -> f64 {
    thermal_voltage() / n as f64
}

/// mol/L -> mol/cm³
pub fn molar_to_mol_per_cm3(c: f64) -> f64 {
    c / 1000.0
}

/// µm -> cm
pub fn micrometers_to_cm(x: f64) -> f64 {
    x * 1e-4
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn thermal_voltage_at_room_temperature() {
        assert_relative_eq!(thermal_voltage(), 0.025693, epsilon = 1e-6);
        assert_relative_eq!(nernst_slope(2), thermal_voltage() / 2.0);
    }

    #[test]
    fn conversions() {
        assert_relative_eq!(molar_to_mol_per_cm3(1.0), 1e-3);
        assert_relative_eq!(micrometers_to_cm(100.0), 0.01);
    }
}
