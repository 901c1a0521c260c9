// Deflection - impulsive delta-v perturbation and deflection feasibility
// A burn produces a NEW element set; the input elements are never touched

use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};
use crate::physics_engine::{
    CartesianState, OrbitalElements, Vector3, MU_SUN, R_EARTH_MEAN, SECONDS_PER_DAY,
};

/// Julian year in seconds
pub const SECONDS_PER_YEAR: f64 = 3.15576e7;

/// Fraction of eccentricity removed per burn by the heuristic update
pub const HEURISTIC_ECCENTRICITY_REDUCTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BurnDirection {
    /// Along the heliocentric velocity
    Prograde,
    Retrograde,
    /// Along the Sun -> asteroid line
    Radial,
}

/// How the post-burn eccentricity is obtained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EccentricityUpdate {
    /// Full osculating elements from the perturbed state vector
    #[default]
    Osculating,
    /// New `a` from energy, `e' = 0.9 e`, angles and epoch kept
    Heuristic,
}

impl BurnDirection {
    fn unit_vector(&self, state: &CartesianState) -> Vector3 {
        match self {
            BurnDirection::Prograde => state.velocity.normalize(),
            BurnDirection::Retrograde => state.velocity.normalize().scale(-1.0),
            BurnDirection::Radial => state.position.normalize(),
        }
    }
}

/// Apply an impulsive delta-v at `burn_jd` and return the resulting orbit.
///
/// A zero delta-v returns the input unchanged. With
/// [`EccentricityUpdate::Osculating`] the result's epoch is `burn_jd`.
pub fn apply_delta_v(
    elements: &OrbitalElements,
    delta_v_m_s: f64,
    direction: BurnDirection,
    burn_jd: f64,
    update: EccentricityUpdate,
) -> PhysicsResult<OrbitalElements> {
    elements.validate()?;
    if !(delta_v_m_s.is_finite() && delta_v_m_s >= 0.0) {
        return Err(PhysicsError::invalid_input(
            "delta_v_m_s",
            format!("must be a non-negative magnitude, got {}", delta_v_m_s),
        ));
    }
    if delta_v_m_s == 0.0 {
        return Ok(*elements);
    }

    let state = elements.state_at(burn_jd)?;
    let impulse = direction.unit_vector(&state).scale(delta_v_m_s);
    let perturbed = CartesianState::new(burn_jd, state.position, state.velocity.add(&impulse));

    log::debug!(
        "Applying {:.4} m/s {:?} burn at JD {:.3}",
        delta_v_m_s,
        direction,
        burn_jd
    );

    match update {
        EccentricityUpdate::Osculating => OrbitalElements::from_state(&perturbed),
        EccentricityUpdate::Heuristic => {
            let energy = perturbed.specific_energy();
            if energy >= 0.0 {
                return Err(PhysicsError::UnboundOrbit { energy });
            }
            let updated = OrbitalElements {
                semi_major_axis_m: -MU_SUN / (2.0 * energy),
                eccentricity: elements.eccentricity * (1.0 - HEURISTIC_ECCENTRICITY_REDUCTION),
                ..*elements
            };
            updated.validate()?;
            Ok(updated)
        }
    }
}

// =============================================================================
// DEFLECTION FEASIBILITY
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DeflectionParams {
    pub delta_v_m_s: f64,
    pub direction: BurnDirection,
    /// Days between the burn and the predicted impact
    pub lead_time_days: f64,
    pub impact_jd: f64,
    pub asteroid_mass_kg: f64,
    #[serde(default)]
    pub eccentricity_update: EccentricityUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeflectionResult {
    pub delta_v_m_s: f64,
    pub direction: BurnDirection,
    pub burn_jd: f64,
    pub new_elements: OrbitalElements,
    /// Separation between nominal and deflected positions at impact time
    pub deflection_distance_km: f64,
    /// Deflection distance exceeds one Earth radius
    pub success: bool,
    /// First-order along-track shift Δv·t
    pub linear_shift_km: f64,
    /// Δv needed for a one-Earth-radius shift with this lead time
    pub required_delta_v_m_s: f64,
    /// Momentum change the deflector must deliver (β = 1)
    pub impulse_n_s: f64,
}

pub fn evaluate_deflection(
    elements: &OrbitalElements,
    params: &DeflectionParams,
) -> PhysicsResult<DeflectionResult> {
    if !(params.lead_time_days.is_finite() && params.lead_time_days > 0.0) {
        return Err(PhysicsError::invalid_input(
            "lead_time_days",
            format!("must be positive, got {}", params.lead_time_days),
        ));
    }
    if !(params.asteroid_mass_kg.is_finite() && params.asteroid_mass_kg > 0.0) {
        return Err(PhysicsError::invalid_input(
            "asteroid_mass_kg",
            format!("must be positive, got {}", params.asteroid_mass_kg),
        ));
    }
    if !params.impact_jd.is_finite() {
        return Err(PhysicsError::invalid_input("impact_jd", "must be finite"));
    }

    let burn_jd = params.impact_jd - params.lead_time_days;
    let new_elements = apply_delta_v(
        elements,
        params.delta_v_m_s,
        params.direction,
        burn_jd,
        params.eccentricity_update,
    )?;

    let deflection_distance_m = if params.delta_v_m_s == 0.0 {
        0.0
    } else {
        let nominal = elements.state_at(params.impact_jd)?;
        let deflected = new_elements.state_at(params.impact_jd)?;
        nominal.position.distance_to(&deflected.position)
    };

    let lead_time_s = params.lead_time_days * SECONDS_PER_DAY;
    let success = deflection_distance_m > R_EARTH_MEAN;

    log::info!(
        "Deflection {:.4} m/s {:?}, {:.0} days lead: miss shift {:.0} km ({})",
        params.delta_v_m_s,
        params.direction,
        params.lead_time_days,
        deflection_distance_m / 1000.0,
        if success { "success" } else { "insufficient" }
    );

    Ok(DeflectionResult {
        delta_v_m_s: params.delta_v_m_s,
        direction: params.direction,
        burn_jd,
        new_elements,
        deflection_distance_km: deflection_distance_m / 1000.0,
        success,
        linear_shift_km: shift_from_delta_v(params.delta_v_m_s, lead_time_s) / 1000.0,
        required_delta_v_m_s: required_delta_v_for_shift(R_EARTH_MEAN, lead_time_s)?,
        impulse_n_s: params.asteroid_mass_kg * params.delta_v_m_s,
    })
}

// =============================================================================
// FIRST-ORDER DELTA-V RULES OF THUMB
// =============================================================================

/// Δv ≈ S / t for an along-track shift `shift_m` achieved over `lead_time_s`.
pub fn required_delta_v_for_shift(shift_m: f64, lead_time_s: f64) -> PhysicsResult<f64> {
    if !(lead_time_s.is_finite() && lead_time_s > 0.0) {
        return Err(PhysicsError::invalid_input(
            "lead_time_s",
            "must be positive",
        ));
    }
    Ok(shift_m / lead_time_s)
}

/// S ≈ Δv · t
pub fn shift_from_delta_v(delta_v_m_s: f64, lead_time_s: f64) -> f64 {
    delta_v_m_s * lead_time_s
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeltaVExample {
    pub scenario: String,
    pub shift_m: f64,
    pub lead_time_years: u32,
    pub delta_v_m_s: f64,
    pub delta_v_cm_s: f64,
    pub delta_v_mm_s: f64,
}

/// Reference table: one Earth radius and 100 km shifts at 1, 5 and 10 years.
pub fn deflection_examples() -> Vec<DeltaVExample> {
    let shifts = [
        ("1 Earth radius", R_EARTH_MEAN),
        ("100 km", 100_000.0),
    ];

    shifts
        .iter()
        .flat_map(|(label, shift_m)| {
            [1u32, 5, 10].into_iter().map(move |years| {
                let delta_v = shift_m / (years as f64 * SECONDS_PER_YEAR);
                DeltaVExample {
                    scenario: format!("Shift by {} ({} year lead)", label, years),
                    shift_m: *shift_m,
                    lead_time_years: years,
                    delta_v_m_s: delta_v,
                    delta_v_cm_s: delta_v * 100.0,
                    delta_v_mm_s: delta_v * 1000.0,
                }
            })
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
