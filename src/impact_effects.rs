// Impact Effects - energy, crater and damage radii from asteroid size/speed
// Empirical scaling only; atmospheric entry is not modelled

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{PhysicsError, PhysicsResult};
use crate::physics_engine::GeoLocation;
use crate::trajectory::CollisionReport;

/// Joules per ton of TNT
pub const JOULES_PER_TON_TNT: f64 = 4.184e9;

/// Joules per megaton of TNT
pub const JOULES_PER_MEGATON: f64 = 4.184e15;

/// Reference target density for pi-scaling (kg/m³)
pub const REFERENCE_TARGET_DENSITY: f64 = 2700.0;

/// Crater diameters above this are complex craters (m)
pub const COMPLEX_CRATER_THRESHOLD_M: f64 = 2000.0;

// Multipliers on crater diameter (m -> km) and their caps (km)
const BLAST_FACTOR: f64 = 10.0;
const BLAST_CAP_KM: f64 = 1000.0;
const THERMAL_FACTOR: f64 = 5.0;
const THERMAL_CAP_KM: f64 = 500.0;
const SEISMIC_FACTOR: f64 = 20.0;
const SEISMIC_CAP_KM: f64 = 2000.0;
const TSUNAMI_FACTOR: f64 = 15.0;
const TSUNAMI_CAP_KM: f64 = 800.0;

/// Rough ocean areas as (lat_min, lat_max, lng_min, lng_max) in degrees.
/// Not a coastline mask.
const OCEAN_BOXES: [(&str, [f64; 4]); 6] = [
    ("Pacific", [-60.0, 60.0, 150.0, 180.0]),
    ("Pacific", [0.0, 60.0, -180.0, -125.0]),
    ("Pacific", [-60.0, 0.0, -180.0, -80.0]),
    ("Atlantic", [0.0, 60.0, -60.0, -10.0]),
    ("Atlantic", [-60.0, 0.0, -35.0, 10.0]),
    ("Indian", [-50.0, 10.0, 50.0, 100.0]),
];

// =============================================================================
// INPUT PARAMETERS
// =============================================================================

/// Spherical impactor. Velocity is in m/s.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AsteroidPhysicalParams {
    pub radius_m: f64,
    pub density_kg_m3: f64,
    pub velocity_m_s: f64,
}

impl AsteroidPhysicalParams {
    pub fn new(radius_m: f64, density_kg_m3: f64, velocity_m_s: f64) -> Self {
        Self {
            radius_m,
            density_kg_m3,
            velocity_m_s,
        }
    }

    /// Build from the UI units: radius in meters, velocity in km/s.
    pub fn from_km_s(radius_m: f64, density_kg_m3: f64, velocity_km_s: f64) -> Self {
        Self::new(radius_m, density_kg_m3, velocity_km_s * 1000.0)
    }

    pub fn validate(&self) -> PhysicsResult<()> {
        if !(self.radius_m.is_finite() && self.radius_m >= 0.0) {
            return Err(PhysicsError::invalid_input(
                "radius_m",
                format!("must be a non-negative length, got {}", self.radius_m),
            ));
        }
        if !(self.density_kg_m3.is_finite() && self.density_kg_m3 > 0.0) {
            return Err(PhysicsError::invalid_input(
                "density_kg_m3",
                format!("must be positive, got {}", self.density_kg_m3),
            ));
        }
        if !(self.velocity_m_s.is_finite() && self.velocity_m_s >= 0.0) {
            return Err(PhysicsError::invalid_input(
                "velocity_m_s",
                format!("must be non-negative, got {}", self.velocity_m_s),
            ));
        }
        Ok(())
    }

    /// m = 4/3 π r³ ρ
    pub fn mass_kg(&self) -> f64 {
        (4.0 / 3.0) * PI * self.radius_m.powi(3) * self.density_kg_m3
    }

    /// E = ½ m v²
    pub fn kinetic_energy_j(&self) -> f64 {
        0.5 * self.mass_kg() * self.velocity_m_s * self.velocity_m_s
    }

    /// D = 2r · 1.61 · (ρ/2700)^(1/3) · (v/1000)^(2/3)
    pub fn crater_diameter_m(&self) -> f64 {
        2.0 * self.radius_m
            * 1.61
            * (self.density_kg_m3 / REFERENCE_TARGET_DENSITY).cbrt()
            * (self.velocity_m_s / 1000.0).powf(2.0 / 3.0)
    }
}

// =============================================================================
// DERIVED OUTPUTS
// =============================================================================

/// Capped damage radii derived from crater diameter (km).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DamageRadii {
    pub blast_radius_km: f64,
    pub thermal_radius_km: f64,
    pub seismic_radius_km: f64,
    /// Only meaningful for ocean impacts
    pub tsunami_radius_km: f64,
}

pub fn damage_radii_km(crater_diameter_m: f64) -> DamageRadii {
    let scaled = |factor: f64, cap: f64| (crater_diameter_m * factor / 1000.0).min(cap);
    DamageRadii {
        blast_radius_km: scaled(BLAST_FACTOR, BLAST_CAP_KM),
        thermal_radius_km: scaled(THERMAL_FACTOR, THERMAL_CAP_KM),
        seismic_radius_km: scaled(SEISMIC_FACTOR, SEISMIC_CAP_KM),
        tsunami_radius_km: scaled(TSUNAMI_FACTOR, TSUNAMI_CAP_KM),
    }
}

/// Moment-magnitude equivalent M = (log10 E − 4.8) / 1.5, floored at 0.
pub fn earthquake_magnitude(energy_j: f64) -> f64 {
    if energy_j <= 0.0 {
        return 0.0;
    }
    ((energy_j.log10() - 4.8) / 1.5).max(0.0)
}

/// Simple craters are about D/5 deep, complex ones D/10.
pub fn crater_depth_m(crater_diameter_m: f64) -> f64 {
    if crater_diameter_m < COMPLEX_CRATER_THRESHOLD_M {
        crater_diameter_m / 5.0
    } else {
        crater_diameter_m / 10.0
    }
}

/// Name of the ocean box containing `location`, if any.
pub fn ocean_at(location: &GeoLocation) -> Option<&'static str> {
    OCEAN_BOXES
        .iter()
        .find(|(_, [lat_min, lat_max, lng_min, lng_max])| {
            (*lat_min..=*lat_max).contains(&location.latitude_deg)
                && (*lng_min..=*lng_max).contains(&location.longitude_deg)
        })
        .map(|(name, _)| *name)
}

pub fn is_ocean(location: &GeoLocation) -> bool {
    ocean_at(location).is_some()
}

/// Snapshot of everything derived from one impactor at one location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImpactEffects {
    pub mass_kg: f64,
    pub kinetic_energy_j: f64,
    pub tnt_tons: f64,
    pub tnt_megatons: f64,
    pub crater_diameter_m: f64,
    pub crater_depth_m: f64,
    pub blast_radius_km: f64,
    pub thermal_radius_km: f64,
    pub seismic_radius_km: f64,
    pub earthquake_magnitude: f64,
    /// Present only when the impact location is oceanic
    pub tsunami_radius_km: Option<f64>,
    pub impact_location: GeoLocation,
    pub is_ocean: bool,
    pub collision_predicted: bool,
}

pub fn compute_effects(
    params: &AsteroidPhysicalParams,
    location: GeoLocation,
) -> PhysicsResult<ImpactEffects> {
    params.validate()?;
    location.validate()?;

    let mass_kg = params.mass_kg();
    let kinetic_energy_j = params.kinetic_energy_j();
    let crater_diameter_m = params.crater_diameter_m();
    let radii = damage_radii_km(crater_diameter_m);
    let ocean = is_ocean(&location);

    Ok(ImpactEffects {
        mass_kg,
        kinetic_energy_j,
        tnt_tons: kinetic_energy_j / JOULES_PER_TON_TNT,
        tnt_megatons: kinetic_energy_j / JOULES_PER_MEGATON,
        crater_diameter_m,
        crater_depth_m: crater_depth_m(crater_diameter_m),
        blast_radius_km: radii.blast_radius_km,
        thermal_radius_km: radii.thermal_radius_km,
        seismic_radius_km: radii.seismic_radius_km,
        earthquake_magnitude: earthquake_magnitude(kinetic_energy_j),
        tsunami_radius_km: ocean.then_some(radii.tsunami_radius_km),
        impact_location: location,
        is_ocean: ocean,
        collision_predicted: false,
    })
}

/// Effects at the detector's impact point, or at `fallback` when no
/// collision was found.
pub fn compute_effects_for_collision(
    params: &AsteroidPhysicalParams,
    report: &CollisionReport,
    fallback: GeoLocation,
) -> PhysicsResult<ImpactEffects> {
    let location = match (report.collision, report.impact_location) {
        (true, Some(location)) => location,
        _ => fallback,
    };
    let mut effects = compute_effects(params, location)?;
    effects.collision_predicted = report.collision;
    Ok(effects)
}

// =============================================================================
// TESTS
// =============================================================================
