// Tsunami - energy-coupled initial wave, spreading and coastal exposure
// Flat-ocean approximation; no bathymetry

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{PhysicsError, PhysicsResult};
use crate::physics_engine::GeoLocation;

/// Sea water density (kg/m³)
pub const SEAWATER_DENSITY: f64 = 1025.0;

/// Standard gravity (m/s²)
pub const G_EARTH: f64 = 9.81;

/// Initial wave amplitude cap (m)
pub const MAX_INITIAL_WAVE_HEIGHT_M: f64 = 1000.0;

/// e-folding distance of the dispersion term (km)
const ATTENUATION_LENGTH_KM: f64 = 5000.0;

/// Reference coastal city with an approximate metro population.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CoastalCity {
    pub name: &'static str,
    pub location: GeoLocation,
    pub population: u64,
}

const fn city(name: &'static str, latitude_deg: f64, longitude_deg: f64, population: u64) -> CoastalCity {
    CoastalCity {
        name,
        location: GeoLocation {
            latitude_deg,
            longitude_deg,
        },
        population,
    }
}

pub const REFERENCE_CITIES: [CoastalCity; 16] = [
    city("Tokyo", 35.68, 139.65, 14_000_000),
    city("Miami", 25.76, -80.19, 6_100_000),
    city("New York", 40.71, -74.01, 8_300_000),
    city("Los Angeles", 34.05, -118.24, 3_900_000),
    city("Shanghai", 31.23, 121.47, 24_900_000),
    city("Mumbai", 19.08, 72.88, 20_400_000),
    city("Sydney", -33.87, 151.21, 5_300_000),
    city("Rio de Janeiro", -22.91, -43.17, 6_700_000),
    city("Lisbon", 38.72, -9.14, 2_900_000),
    city("Honolulu", 21.31, -157.86, 1_000_000),
    city("Jakarta", -6.21, 106.85, 10_600_000),
    city("Cape Town", -33.92, 18.42, 4_600_000),
    city("Lima", -12.05, -77.04, 9_700_000),
    city("Manila", 14.60, 120.98, 13_500_000),
    city("Hong Kong", 22.32, 114.17, 7_500_000),
    city("Chennai", 13.08, 80.27, 7_100_000),
];

/// Missing fields take their defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TsunamiSettings {
    /// Share of impact energy that goes into the wave
    pub coupling_efficiency: f64,
    /// Beach slope used for the runup factor (degrees)
    pub shore_slope_deg: f64,
    /// Onshore terrain slope used for inundation distance (degrees)
    pub terrain_slope_deg: f64,
    pub sample_distances_km: Vec<f64>,
    /// Cities seeing a smaller wave are not reported
    pub min_coastal_wave_height_m: f64,
    /// Share of a city's population living on exposed coast
    pub coastal_fraction: f64,
}

impl Default for TsunamiSettings {
    fn default() -> Self {
        Self {
            coupling_efficiency: 0.01,
            shore_slope_deg: 1.0,
            terrain_slope_deg: 0.5,
            sample_distances_km: vec![
                10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 3000.0, 5000.0,
            ],
            min_coastal_wave_height_m: 0.1,
            coastal_fraction: 0.1,
        }
    }
}

impl TsunamiSettings {
    pub fn validate(&self) -> PhysicsResult<()> {
        if !(self.coupling_efficiency > 0.0 && self.coupling_efficiency <= 1.0) {
            return Err(PhysicsError::invalid_input(
                "coupling_efficiency",
                format!("{} is outside (0, 1]", self.coupling_efficiency),
            ));
        }
        for (field, slope) in [
            ("shore_slope_deg", self.shore_slope_deg),
            ("terrain_slope_deg", self.terrain_slope_deg),
        ] {
            if !(slope > 0.0 && slope < 90.0) {
                return Err(PhysicsError::invalid_input(field, format!("{} is outside (0, 90)", slope)));
            }
        }
        if self
            .sample_distances_km
            .iter()
            .any(|d| !(d.is_finite() && *d >= 0.0))
        {
            return Err(PhysicsError::invalid_input(
                "sample_distances_km",
                "distances must be finite and non-negative",
            ));
        }
        if !(self.min_coastal_wave_height_m.is_finite() && self.min_coastal_wave_height_m >= 0.0) {
            return Err(PhysicsError::invalid_input("min_coastal_wave_height_m", "must be non-negative"));
        }
        if !(self.coastal_fraction >= 0.0 && self.coastal_fraction <= 1.0) {
            return Err(PhysicsError::invalid_input(
                "coastal_fraction",
                format!("{} is outside [0, 1]", self.coastal_fraction),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TsunamiProfilePoint {
    pub distance_km: f64,
    pub arrival_time_min: f64,
    pub wave_height_m: f64,
    pub runup_m: f64,
    pub inundation_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AffectedCoast {
    pub name: String,
    pub location: GeoLocation,
    pub distance_km: f64,
    pub arrival_time_min: f64,
    pub wave_height_m: f64,
    pub runup_m: f64,
    pub population: u64,
    pub population_at_risk: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TsunamiResult {
    pub impact_location: GeoLocation,
    pub initial_wave_height_m: f64,
    /// Shallow-water speed sqrt(g h)
    pub wave_speed_m_s: f64,
    pub tsunami_energy_j: f64,
    pub profile: Vec<TsunamiProfilePoint>,
    /// Sorted nearest first
    pub affected_coasts: Vec<AffectedCoast>,
    pub total_population_at_risk: u64,
}

/// Input validated once, then reused for every distance query.
struct WaveSource {
    initial_height_m: f64,
    source_radius_m: f64,
    speed_m_s: f64,
}

impl WaveSource {
    fn height_at(&self, distance_km: f64) -> f64 {
        let distance_m = distance_km * 1000.0;
        if distance_m <= self.source_radius_m {
            return self.initial_height_m;
        }
        self.initial_height_m
            * (self.source_radius_m / distance_m).sqrt()
            * (-distance_km / ATTENUATION_LENGTH_KM).exp()
    }

    fn arrival_time_min(&self, distance_km: f64) -> f64 {
        distance_km * 1000.0 / self.speed_m_s / 60.0
    }
}

/// Runup = h · (2 + 3 sin(slope))
pub fn runup_m(wave_height_m: f64, shore_slope_deg: f64) -> f64 {
    wave_height_m * (2.0 + 3.0 * shore_slope_deg.to_radians().sin())
}

/// Horizontal reach of the runup over terrain of the given slope
pub fn inundation_m(runup_m: f64, terrain_slope_deg: f64) -> f64 {
    runup_m / terrain_slope_deg.to_radians().tan()
}

pub fn simulate_tsunami(
    impact_location: GeoLocation,
    energy_j: f64,
    crater_diameter_m: f64,
    water_depth_m: f64,
    impact_angle_deg: f64,
    settings: &TsunamiSettings,
) -> PhysicsResult<TsunamiResult> {
    impact_location.validate()?;
    settings.validate()?;
    if !(energy_j.is_finite() && energy_j >= 0.0) {
        return Err(PhysicsError::invalid_input("energy_j", "must be non-negative and finite"));
    }
    if !(crater_diameter_m.is_finite() && crater_diameter_m > 0.0) {
        return Err(PhysicsError::invalid_input("crater_diameter_m", "must be positive"));
    }
    if !(water_depth_m.is_finite() && water_depth_m > 0.0) {
        return Err(PhysicsError::invalid_input("water_depth_m", "must be positive"));
    }
    if !(impact_angle_deg > 0.0 && impact_angle_deg <= 90.0) {
        return Err(PhysicsError::invalid_input(
            "impact_angle_deg",
            format!("{} is outside (0, 90]", impact_angle_deg),
        ));
    }

    let depth_ratio = (water_depth_m / crater_diameter_m).min(1.0);
    let tsunami_energy_j =
        energy_j * settings.coupling_efficiency * depth_ratio * impact_angle_deg.to_radians().sin();

    let source_radius_m = crater_diameter_m / 2.0;
    let impact_area_m2 = PI * source_radius_m * source_radius_m;
    let initial_height_m = (tsunami_energy_j / (SEAWATER_DENSITY * G_EARTH * impact_area_m2))
        .sqrt()
        .min(MAX_INITIAL_WAVE_HEIGHT_M);

    let source = WaveSource {
        initial_height_m,
        source_radius_m,
        speed_m_s: (G_EARTH * water_depth_m).sqrt(),
    };

    let profile = settings
        .sample_distances_km
        .iter()
        .map(|&distance_km| {
            let wave_height_m = source.height_at(distance_km);
            let runup = runup_m(wave_height_m, settings.shore_slope_deg);
            TsunamiProfilePoint {
                distance_km,
                arrival_time_min: source.arrival_time_min(distance_km),
                wave_height_m,
                runup_m: runup,
                inundation_m: inundation_m(runup, settings.terrain_slope_deg),
            }
        })
        .collect();

    let mut affected_coasts: Vec<AffectedCoast> = REFERENCE_CITIES
        .iter()
        .filter_map(|city| {
            let distance_km = impact_location.distance_km(&city.location);
            let wave_height_m = source.height_at(distance_km);
            if wave_height_m < settings.min_coastal_wave_height_m {
                return None;
            }
            let exposure = (wave_height_m / 10.0).min(1.0) * settings.coastal_fraction;
            Some(AffectedCoast {
                name: city.name.to_string(),
                location: city.location,
                distance_km,
                arrival_time_min: source.arrival_time_min(distance_km),
                wave_height_m,
                runup_m: runup_m(wave_height_m, settings.shore_slope_deg),
                population: city.population,
                population_at_risk: (city.population as f64 * exposure).round() as u64,
            })
        })
        .collect();
    affected_coasts.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    let total_population_at_risk = affected_coasts.iter().map(|c| c.population_at_risk).sum();

    log::debug!(
        "Tsunami: H0 {:.1} m, {} coastal cities above {:.1} m",
        initial_height_m,
        affected_coasts.len(),
        settings.min_coastal_wave_height_m
    );

    Ok(TsunamiResult {
        impact_location,
        initial_wave_height_m: initial_height_m,
        wave_speed_m_s: source.speed_m_s,
        tsunami_energy_j,
        profile,
        affected_coasts,
        total_population_at_risk,
    })
}
