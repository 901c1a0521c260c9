// Overpressure - Hopkinson-Cranz blast scaling and thermal fluence radii
// Piecewise log-log fit approximating the Kingery-Bulmash curves

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{PhysicsError, PhysicsResult};

/// Joules per kilogram of TNT
pub const JOULES_PER_KG_TNT: f64 = 4.184e6;

/// Sea-level ambient pressure (kPa)
pub const AMBIENT_PRESSURE_KPA: f64 = 101.325;

pub const KPA_PER_PSI: f64 = 6.894757;

/// Fraction of impact energy radiated as heat
pub const THERMAL_EFFICIENCY: f64 = 0.35;

/// 1 cal/cm² in J/m²
pub const J_PER_M2_PER_CAL_CM2: f64 = 41_840.0;

/// Scaled distances (m/kg^(1/3)) tabulated in every profile
pub const PROFILE_SCALED_DISTANCES: [f64; 12] =
    [0.5, 1.0, 2.0, 3.0, 5.0, 7.0, 10.0, 15.0, 20.0, 30.0, 50.0, 100.0];

/// Thresholds reported as critical radii (psi)
pub const CRITICAL_PSI_LEVELS: [f64; 5] = [100.0, 20.0, 5.0, 1.0, 0.5];

const SEARCH_Z_MIN: f64 = 0.01;
const SEARCH_Z_MAX: f64 = 1000.0;
const SEARCH_MAX_ITERATIONS: u32 = 50;
const SEARCH_TOLERANCE_PSI: f64 = 0.01;

// Thermal thresholds (cal/cm²)
const IGNITION_CAL_CM2: f64 = 15.0;
const THIRD_DEGREE_CAL_CM2: f64 = 10.0;
const SECOND_DEGREE_CAL_CM2: f64 = 5.0;

// =============================================================================
// BLAST FIT
// =============================================================================

/// Peak side-on overpressure (kPa) at scaled distance `z`.
pub fn overpressure_kpa(z: f64) -> f64 {
    let log_z = z.log10();
    let log_p = if z < 1.0 {
        3.05 - 1.9 * log_z
    } else if z < 10.0 {
        3.05 - 2.2 * log_z
    } else {
        2.25 - 1.4 * log_z
    };
    10f64.powf(log_p)
}

pub fn overpressure_psi(z: f64) -> f64 {
    overpressure_kpa(z) / KPA_PER_PSI
}

/// Q = 2.5 Ps² / (7 P0 + Ps), both in kPa
pub fn dynamic_pressure_kpa(overpressure_kpa: f64) -> f64 {
    2.5 * overpressure_kpa * overpressure_kpa / (7.0 * AMBIENT_PRESSURE_KPA + overpressure_kpa)
}

pub fn damage_description(psi: f64) -> &'static str {
    match psi {
        p if p >= 100.0 => "Total destruction, reinforced concrete structures destroyed",
        p if p >= 20.0 => "Heavily built concrete buildings severely damaged or demolished",
        p if p >= 10.0 => "Reinforced buildings heavily damaged, widespread fatalities",
        p if p >= 5.0 => "Most residential buildings collapse",
        p if p >= 2.0 => "Moderate damage to houses, serious injuries common",
        p if p >= 1.0 => "Window glass shatters, light injuries from debris",
        p if p >= 0.5 => "Minor glass breakage",
        _ => "Negligible structural damage",
    }
}

// =============================================================================
// PROFILE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverpressureRow {
    pub scaled_distance: f64,
    pub distance_m: f64,
    pub overpressure_kpa: f64,
    pub overpressure_psi: f64,
    pub dynamic_pressure_kpa: f64,
    pub damage: String,
}

/// Distances (m) at which the overpressure drops to each level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct CriticalRadii {
    pub psi_100_m: f64,
    pub psi_20_m: f64,
    pub psi_5_m: f64,
    pub psi_1_m: f64,
    pub psi_0_5_m: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ThermalRadii {
    pub fireball_radius_m: f64,
    pub ignition_m: f64,
    pub third_degree_burn_m: f64,
    pub second_degree_burn_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverpressureProfile {
    pub energy_j: f64,
    pub tnt_kg: f64,
    pub rows: Vec<OverpressureRow>,
    pub critical_radii: CriticalRadii,
    pub thermal: ThermalRadii,
}

/// Blast and thermal profile for a surface release of `energy_j`.
pub fn overpressure_profile(energy_j: f64) -> PhysicsResult<OverpressureProfile> {
    if !(energy_j.is_finite() && energy_j >= 0.0) {
        return Err(PhysicsError::invalid_input(
            "energy_j",
            format!("must be a non-negative finite energy, got {}", energy_j),
        ));
    }
    if energy_j == 0.0 {
        return Ok(OverpressureProfile {
            energy_j,
            tnt_kg: 0.0,
            rows: Vec::new(),
            critical_radii: CriticalRadii::default(),
            thermal: ThermalRadii::default(),
        });
    }

    let tnt_kg = energy_j / JOULES_PER_KG_TNT;
    let yield_scale = tnt_kg.cbrt();

    let rows = PROFILE_SCALED_DISTANCES
        .iter()
        .map(|&z| {
            let kpa = overpressure_kpa(z);
            let psi = kpa / KPA_PER_PSI;
            OverpressureRow {
                scaled_distance: z,
                distance_m: z * yield_scale,
                overpressure_kpa: kpa,
                overpressure_psi: psi,
                dynamic_pressure_kpa: dynamic_pressure_kpa(kpa),
                damage: damage_description(psi).to_string(),
            }
        })
        .collect();

    let radius_at = |psi: f64| scaled_distance_for_psi(psi) * yield_scale;
    let critical_radii = CriticalRadii {
        psi_100_m: radius_at(CRITICAL_PSI_LEVELS[0]),
        psi_20_m: radius_at(CRITICAL_PSI_LEVELS[1]),
        psi_5_m: radius_at(CRITICAL_PSI_LEVELS[2]),
        psi_1_m: radius_at(CRITICAL_PSI_LEVELS[3]),
        psi_0_5_m: radius_at(CRITICAL_PSI_LEVELS[4]),
    };

    Ok(OverpressureProfile {
        energy_j,
        tnt_kg,
        rows,
        critical_radii,
        thermal: thermal_radii(energy_j),
    })
}

/// Bisection over Z; the fit decreases monotonically with distance.
pub fn scaled_distance_for_psi(target_psi: f64) -> f64 {
    let mut lo = SEARCH_Z_MIN;
    let mut hi = SEARCH_Z_MAX;
    if overpressure_psi(lo) <= target_psi {
        return lo;
    }
    if overpressure_psi(hi) >= target_psi {
        return hi;
    }

    let mut mid = 0.5 * (lo + hi);
    for _ in 0..SEARCH_MAX_ITERATIONS {
        mid = 0.5 * (lo + hi);
        let psi = overpressure_psi(mid);
        if (psi - target_psi).abs() < SEARCH_TOLERANCE_PSI {
            break;
        }
        if psi > target_psi {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    mid
}

/// Inverse-square fluence radii R = sqrt(E_th / (4π F)).
pub fn thermal_radii(energy_j: f64) -> ThermalRadii {
    if energy_j <= 0.0 {
        return ThermalRadii::default();
    }
    let thermal_j = THERMAL_EFFICIENCY * energy_j;
    let radius_for = |cal_cm2: f64| (thermal_j / (4.0 * PI * cal_cm2 * J_PER_M2_PER_CAL_CM2)).sqrt();

    ThermalRadii {
        fireball_radius_m: 0.002 * energy_j.cbrt(),
        ignition_m: radius_for(IGNITION_CAL_CM2),
        third_degree_burn_m: radius_for(THIRD_DEGREE_CAL_CM2),
        second_degree_burn_m: radius_for(SECOND_DEGREE_CAL_CM2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ONE_MEGATON_J: f64 = 4.184e15;

    #[test]
    fn test_fit_is_continuous_at_breakpoints() {
        for z in [1.0f64, 10.0] {
            let below = overpressure_kpa(z * (1.0 - 1e-12));
            let at = overpressure_kpa(z);
            assert_relative_eq!(below, at, max_relative = 1e-9);
        }
        assert_relative_eq!(overpressure_kpa(1.0), 10f64.powf(3.05), max_relative = 1e-12);
    }

    #[test]
    fn test_overpressure_decreases_with_distance() {
        let mut last = f64::INFINITY;
        for z in PROFILE_SCALED_DISTANCES {
            let p = overpressure_psi(z);
            assert!(p < last);
            last = p;
        }
    }

    #[test]
    fn test_dynamic_pressure_formula() {
        let ps = 200.0;
        let expected = 2.5 * ps * ps / (7.0 * 101.325 + ps);
        assert_relative_eq!(dynamic_pressure_kpa(ps), expected);
    }

    #[test]
    fn test_profile_rows_scale_with_yield() {
        let one = overpressure_profile(ONE_MEGATON_J).unwrap();
        let eight = overpressure_profile(8.0 * ONE_MEGATON_J).unwrap();

        assert_eq!(one.rows.len(), PROFILE_SCALED_DISTANCES.len());
        assert_relative_eq!(one.tnt_kg, 1.0e9, max_relative = 1e-12);
        for (a, b) in one.rows.iter().zip(&eight.rows) {
            assert_relative_eq!(b.distance_m, 2.0 * a.distance_m, max_relative = 1e-12);
            assert_eq!(a.overpressure_psi, b.overpressure_psi);
        }
        assert_relative_eq!(one.rows[1].distance_m, 1000.0, max_relative = 1e-12);
    }

    #[test]
    fn test_critical_radii_hit_their_levels() {
        let profile = overpressure_profile(ONE_MEGATON_J).unwrap();
        let w13 = profile.tnt_kg.cbrt();
        let radii = profile.critical_radii;
        let levels = [
            (100.0, radii.psi_100_m),
            (20.0, radii.psi_20_m),
            (5.0, radii.psi_5_m),
            (1.0, radii.psi_1_m),
            (0.5, radii.psi_0_5_m),
        ];
        for (psi, radius) in levels {
            let found = overpressure_psi(radius / w13);
            assert!((found - psi).abs() < 0.05 * psi.max(1.0), "{} psi -> {}", psi, found);
        }
        assert!(radii.psi_100_m < radii.psi_20_m);
        assert!(radii.psi_20_m < radii.psi_5_m);
        assert!(radii.psi_5_m < radii.psi_1_m);
        assert!(radii.psi_1_m < radii.psi_0_5_m);
    }

    #[test]
    fn test_thermal_radii() {
        let thermal = thermal_radii(ONE_MEGATON_J);
        let expected = (0.35 * ONE_MEGATON_J / (4.0 * PI * 10.0 * 41_840.0)).sqrt();
        assert_relative_eq!(thermal.third_degree_burn_m, expected, max_relative = 1e-12);
        assert!(thermal.ignition_m < thermal.third_degree_burn_m);
        assert!(thermal.third_degree_burn_m < thermal.second_degree_burn_m);
        assert_relative_eq!(thermal.fireball_radius_m, 0.002 * ONE_MEGATON_J.cbrt());
    }

    #[test]
    fn test_damage_descriptions_follow_pressure() {
        assert!(damage_description(150.0).starts_with("Total destruction"));
        assert_eq!(damage_description(5.0), "Most residential buildings collapse");
        assert_eq!(damage_description(0.1), "Negligible structural damage");
    }

    #[test]
    fn test_zero_and_invalid_energy() {
        let empty = overpressure_profile(0.0).unwrap();
        assert!(empty.rows.is_empty());
        assert_eq!(empty.critical_radii, CriticalRadii::default());
        assert_eq!(empty.thermal.second_degree_burn_m, 0.0);

        assert!(overpressure_profile(-1.0).is_err());
        assert!(overpressure_profile(f64::NAN).is_err());
        assert!(overpressure_profile(f64::INFINITY).is_err());
    }
}
