// Physics Engine - Two-body orbital mechanics
// Kepler solver, Keplerian elements <-> heliocentric ecliptic Cartesian state

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

use crate::error::{PhysicsError, PhysicsResult};

// =============================================================================
// PHYSICAL CONSTANTS (SI Units)
// =============================================================================

/// Astronomical Unit in meters
pub const AU: f64 = 1.495978707e11;

/// Sun's gravitational parameter μ = G * M_sun (m³/s²)
pub const MU_SUN: f64 = 1.32712440018e20;

/// Earth's mean radius (m), used for collision and deflection thresholds
pub const R_EARTH_MEAN: f64 = 6.371e6;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Julian Date of the J2000 epoch (2000-01-01 12:00 TT)
pub const J2000_JD: f64 = 2_451_545.0;

/// Asteroid density by spectral type (kg/m³)
/// References: Carry (2012), DeMeo & Carry (2013)
pub mod asteroid_density {
    pub const C_TYPE: f64 = 1700.0; // Carbonaceous
    pub const S_TYPE: f64 = 2700.0; // Silicaceous
    pub const M_TYPE: f64 = 4000.0; // Metallic
    pub const DEFAULT: f64 = 2000.0; // Rubble pile average
}

// Below these the orbit is treated as circular / equatorial when recovering elements
const CIRCULAR_ECCENTRICITY: f64 = 1e-11;
const EQUATORIAL_NODE_RATIO: f64 = 1e-11;

// =============================================================================
// 3D VECTOR MATHEMATICS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 1e-15 {
            Self {
                x: self.x / mag,
                y: self.y / mag,
                z: self.z / mag,
            }
        } else {
            Self::zero()
        }
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn scale(&self, s: f64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    pub fn distance_to(&self, other: &Vector3) -> f64 {
        self.sub(other).magnitude()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// =============================================================================
// CARTESIAN STATE (Position + Velocity at a time)
// =============================================================================

/// Heliocentric ecliptic state. Derived from elements, never mutated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CartesianState {
    pub time_jd: f64,
    pub position: Vector3, // meters (SI)
    pub velocity: Vector3, // m/s (SI)
}

impl CartesianState {
    pub fn new(time_jd: f64, position: Vector3, velocity: Vector3) -> Self {
        Self {
            time_jd,
            position,
            velocity,
        }
    }

    /// Specific orbital energy v²/2 - μ/r (J/kg)
    pub fn specific_energy(&self) -> f64 {
        let v = self.velocity.magnitude();
        0.5 * v * v - MU_SUN / self.position.magnitude()
    }
}

/// Geographic point in degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
}

impl GeoLocation {
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
        }
    }

    pub fn validate(&self) -> PhysicsResult<()> {
        if !(self.latitude_deg.is_finite() && (-90.0..=90.0).contains(&self.latitude_deg)) {
            return Err(PhysicsError::invalid_input(
                "latitude_deg",
                format!("{} is outside [-90, 90]", self.latitude_deg),
            ));
        }
        if !(self.longitude_deg.is_finite() && (-180.0..=180.0).contains(&self.longitude_deg)) {
            return Err(PhysicsError::invalid_input(
                "longitude_deg",
                format!("{} is outside [-180, 180]", self.longitude_deg),
            ));
        }
        Ok(())
    }

    /// Direct spherical projection: latitude = asin(z/r), longitude = atan2(y, x).
    ///
    /// Applied to heliocentric coordinates this is an intentional simplification;
    /// it does not go through an Earth-fixed frame.
    pub fn from_cartesian(point: &Vector3) -> Self {
        let r = point.magnitude();
        if r < 1e-15 {
            return Self::new(0.0, 0.0);
        }
        let latitude = (point.z / r).clamp(-1.0, 1.0).asin();
        let longitude = point.y.atan2(point.x);
        Self::new(latitude.to_degrees(), longitude.to_degrees())
    }

    /// Great-circle (haversine) distance on a sphere of mean Earth radius, in km
    pub fn distance_km(&self, other: &GeoLocation) -> f64 {
        let lat1 = self.latitude_deg.to_radians();
        let lat2 = other.latitude_deg.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude_deg - self.longitude_deg).to_radians();

        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * R_EARTH_MEAN * h.sqrt().min(1.0).asin() / 1000.0
    }
}

// =============================================================================
// KEPLER EQUATION SOLVER
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct KeplerSettings {
    /// Stop when |ΔE| falls below this (radians)
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for KeplerSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct KeplerSolution {
    /// Eccentric anomaly E in [0, 2π) neighbourhood (radians)
    pub eccentric_anomaly: f64,
    /// Newton steps taken
    pub iterations: u32,
    /// False when the iteration budget ran out; E is then the best estimate
    pub converged: bool,
}

/// Solve Kepler's equation M = E - e*sin(E) using Newton-Raphson.
///
/// The mean anomaly is normalised into [0, 2π) first. The starting guess is
/// `M` below e = 0.8 and `π` above it, which keeps Newton from overshooting
/// near periapsis on very eccentric orbits.
pub fn solve_kepler(
    mean_anomaly: f64,
    eccentricity: f64,
    settings: &KeplerSettings,
) -> PhysicsResult<KeplerSolution> {
    if !mean_anomaly.is_finite() {
        return Err(PhysicsError::invalid_input(
            "mean_anomaly",
            "must be finite",
        ));
    }
    if !(0.0..1.0).contains(&eccentricity) {
        return Err(PhysicsError::InvalidElements(format!(
            "eccentricity {} is outside [0, 1)",
            eccentricity
        )));
    }
    Ok(newton_kepler(mean_anomaly, eccentricity, settings))
}

fn newton_kepler(mean_anomaly: f64, eccentricity: f64, settings: &KeplerSettings) -> KeplerSolution {
    let m = mean_anomaly.rem_euclid(TAU);
    let mut e_anom = if eccentricity < 0.8 { m } else { PI };

    for iteration in 1..=settings.max_iterations {
        let f = e_anom - eccentricity * e_anom.sin() - m;
        let f_prime = 1.0 - eccentricity * e_anom.cos();
        let delta = f / f_prime;
        e_anom -= delta;

        if delta.abs() < settings.tolerance {
            return KeplerSolution {
                eccentric_anomaly: e_anom,
                iterations: iteration,
                converged: true,
            };
        }
    }

    KeplerSolution {
        eccentric_anomaly: e_anom,
        iterations: settings.max_iterations,
        converged: false,
    }
}

// =============================================================================
// KEPLERIAN ORBITAL ELEMENTS
// =============================================================================

/// Heliocentric Keplerian elements. SI lengths, radians, Julian Date epoch.
///
/// Treated as an immutable value: perturbations produce a new set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OrbitalElements {
    /// Semi-major axis (meters)
    pub semi_major_axis_m: f64,
    /// Eccentricity (0-1 for elliptical)
    pub eccentricity: f64,
    /// Inclination (radians)
    pub inclination_rad: f64,
    /// Longitude of ascending node (radians)
    pub longitude_ascending_node_rad: f64,
    /// Argument of perihelion (radians)
    pub argument_perihelion_rad: f64,
    /// Mean anomaly at epoch (radians)
    pub mean_anomaly_rad: f64,
    /// Epoch (Julian Date)
    pub epoch_jd: f64,
}

impl OrbitalElements {
    /// Build from the units NASA publishes: AU and degrees.
    pub fn from_au_degrees(
        semi_major_axis_au: f64,
        eccentricity: f64,
        inclination_deg: f64,
        longitude_ascending_node_deg: f64,
        argument_perihelion_deg: f64,
        mean_anomaly_deg: f64,
        epoch_jd: f64,
    ) -> PhysicsResult<Self> {
        let elements = Self {
            semi_major_axis_m: semi_major_axis_au * AU,
            eccentricity,
            inclination_rad: inclination_deg.to_radians(),
            longitude_ascending_node_rad: longitude_ascending_node_deg.to_radians(),
            argument_perihelion_rad: argument_perihelion_deg.to_radians(),
            mean_anomaly_rad: mean_anomaly_deg.to_radians(),
            epoch_jd,
        };
        elements.validate()?;
        Ok(elements)
    }

    /// Fail fast on anything that would propagate to NaN/Infinity.
    pub fn validate(&self) -> PhysicsResult<()> {
        let fields = [
            ("semi_major_axis_m", self.semi_major_axis_m),
            ("eccentricity", self.eccentricity),
            ("inclination_rad", self.inclination_rad),
            ("longitude_ascending_node_rad", self.longitude_ascending_node_rad),
            ("argument_perihelion_rad", self.argument_perihelion_rad),
            ("mean_anomaly_rad", self.mean_anomaly_rad),
            ("epoch_jd", self.epoch_jd),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PhysicsError::InvalidElements(format!(
                "{} is not finite ({})",
                name, value
            )));
        }
        if self.semi_major_axis_m <= 0.0 {
            return Err(PhysicsError::InvalidElements(format!(
                "semi-major axis must be positive, got {} m",
                self.semi_major_axis_m
            )));
        }
        if self.eccentricity < 0.0 {
            return Err(PhysicsError::InvalidElements(format!(
                "eccentricity must be non-negative, got {}",
                self.eccentricity
            )));
        }
        if self.eccentricity >= 1.0 {
            return Err(PhysicsError::InvalidElements(format!(
                "eccentricity {} describes a parabolic/hyperbolic orbit; only e < 1 is supported",
                self.eccentricity
            )));
        }
        Ok(())
    }

    /// Mean motion n = sqrt(μ/a³) (rad/s)
    pub fn mean_motion_rad_s(&self) -> f64 {
        (MU_SUN / self.semi_major_axis_m.powi(3)).sqrt()
    }

    pub fn orbital_period_s(&self) -> f64 {
        TAU / self.mean_motion_rad_s()
    }

    pub fn orbital_period_days(&self) -> f64 {
        self.orbital_period_s() / SECONDS_PER_DAY
    }

    pub fn perihelion_m(&self) -> f64 {
        self.semi_major_axis_m * (1.0 - self.eccentricity)
    }

    /// Mean anomaly at `target_jd`, normalised into [0, 2π)
    pub fn mean_anomaly_at(&self, target_jd: f64) -> f64 {
        let dt = (target_jd - self.epoch_jd) * SECONDS_PER_DAY;
        (self.mean_anomaly_rad + self.mean_motion_rad_s() * dt).rem_euclid(TAU)
    }

    /// Convert orbital elements to Cartesian state vector at `target_jd`
    pub fn state_at(&self, target_jd: f64) -> PhysicsResult<CartesianState> {
        self.state_at_with(target_jd, &KeplerSettings::default())
    }

    pub fn state_at_with(
        &self,
        target_jd: f64,
        settings: &KeplerSettings,
    ) -> PhysicsResult<CartesianState> {
        self.validate()?;
        if !target_jd.is_finite() {
            return Err(PhysicsError::invalid_input("target_jd", "must be finite"));
        }
        Ok(self.propagate_validated(target_jd, settings))
    }

    /// Propagation for elements that already passed `validate`.
    pub(crate) fn propagate_validated(
        &self,
        target_jd: f64,
        settings: &KeplerSettings,
    ) -> CartesianState {
        let a = self.semi_major_axis_m;
        let e = self.eccentricity;
        let m = self.mean_anomaly_at(target_jd);

        let solution = newton_kepler(m, e, settings);
        if !solution.converged {
            log::warn!(
                "Kepler solver did not converge (M={:.6}, e={:.6}, {} iterations); using best estimate",
                m,
                e,
                solution.iterations
            );
        }
        let eccentric_anomaly = solution.eccentric_anomaly;

        // True Anomaly
        let cos_e = eccentric_anomaly.cos();
        let sin_e = eccentric_anomaly.sin();
        let true_anomaly = ((1.0 - e * e).sqrt() * sin_e).atan2(cos_e - e);

        // Distance from focus
        let r = a * (1.0 - e * cos_e);

        // Position in orbital plane (perifocal frame)
        let cos_nu = true_anomaly.cos();
        let sin_nu = true_anomaly.sin();
        let x_orb = r * cos_nu;
        let y_orb = r * sin_nu;

        // Velocity in orbital plane
        let sqrt_mu_p = (MU_SUN / (a * (1.0 - e * e))).sqrt();
        let vx_orb = -sqrt_mu_p * sin_nu;
        let vy_orb = sqrt_mu_p * (e + cos_nu);

        let rotation = PerifocalRotation::new(
            self.longitude_ascending_node_rad,
            self.argument_perihelion_rad,
            self.inclination_rad,
        );

        CartesianState {
            time_jd: target_jd,
            position: rotation.apply(x_orb, y_orb),
            velocity: rotation.apply(vx_orb, vy_orb),
        }
    }

    /// Recover osculating elements from a heliocentric state; the state's
    /// time becomes `epoch_jd` of the result.
    pub fn from_state(state: &CartesianState) -> PhysicsResult<Self> {
        let r_vec = state.position;
        let v_vec = state.velocity;
        let r = r_vec.magnitude();
        let v = v_vec.magnitude();

        if !(r_vec.is_finite() && v_vec.is_finite() && state.time_jd.is_finite()) {
            return Err(PhysicsError::invalid_input("state", "contains non-finite values"));
        }
        if r < 1.0 {
            return Err(PhysicsError::invalid_input(
                "state.position",
                "body is at the Sun's centre",
            ));
        }

        let energy = 0.5 * v * v - MU_SUN / r;
        if energy >= 0.0 {
            return Err(PhysicsError::UnboundOrbit { energy });
        }

        let h_vec = r_vec.cross(&v_vec);
        let h = h_vec.magnitude();
        if h <= 1e-12 * r * v {
            return Err(PhysicsError::InvalidElements(
                "rectilinear state has no orbital plane".to_string(),
            ));
        }

        let semi_major_axis_m = -MU_SUN / (2.0 * energy);

        // Eccentricity vector points at perihelion
        let e_vec = r_vec
            .scale(v * v - MU_SUN / r)
            .sub(&v_vec.scale(r_vec.dot(&v_vec)))
            .scale(1.0 / MU_SUN);
        let e = e_vec.magnitude();
        if e >= 1.0 {
            return Err(PhysicsError::UnboundOrbit { energy });
        }

        let inclination_rad = (h_vec.z / h).clamp(-1.0, 1.0).acos();
        let node = Vector3::new(-h_vec.y, h_vec.x, 0.0);
        let n = node.magnitude();

        let equatorial = n <= EQUATORIAL_NODE_RATIO * h;
        let circular = e <= CIRCULAR_ECCENTRICITY;

        let longitude_ascending_node_rad = if equatorial {
            0.0
        } else {
            node.y.atan2(node.x).rem_euclid(TAU)
        };

        let anomaly_from_periapsis = || {
            let nu = (e_vec.dot(&r_vec) / (e * r)).clamp(-1.0, 1.0).acos();
            if r_vec.dot(&v_vec) < 0.0 {
                TAU - nu
            } else {
                nu
            }
        };

        let (argument_perihelion_rad, true_anomaly) = match (circular, equatorial) {
            (false, false) => {
                let w = (node.dot(&e_vec) / (n * e)).clamp(-1.0, 1.0).acos();
                let w = if e_vec.z < 0.0 { TAU - w } else { w };
                (w, anomaly_from_periapsis())
            }
            (false, true) => {
                let w = e_vec.y.atan2(e_vec.x);
                let w = if h_vec.z < 0.0 { -w } else { w };
                (w.rem_euclid(TAU), anomaly_from_periapsis())
            }
            (true, false) => {
                // Argument of latitude stands in for the true anomaly
                let u = (node.dot(&r_vec) / (n * r)).clamp(-1.0, 1.0).acos();
                (0.0, if r_vec.z < 0.0 { TAU - u } else { u })
            }
            (true, true) => {
                let l = r_vec.y.atan2(r_vec.x);
                let l = if h_vec.z < 0.0 { -l } else { l };
                (0.0, l.rem_euclid(TAU))
            }
        };

        let eccentric_anomaly = 2.0
            * ((1.0 - e).sqrt() * (true_anomaly / 2.0).sin())
                .atan2((1.0 + e).sqrt() * (true_anomaly / 2.0).cos());
        let mean_anomaly_rad = (eccentric_anomaly - e * eccentric_anomaly.sin()).rem_euclid(TAU);

        Ok(Self {
            semi_major_axis_m,
            eccentricity: e,
            inclination_rad,
            longitude_ascending_node_rad,
            argument_perihelion_rad,
            mean_anomaly_rad,
            epoch_jd: state.time_jd,
        })
    }
}

/// Convert elements to a heliocentric ecliptic state at `target_jd`.
pub fn to_cartesian(elements: &OrbitalElements, target_jd: f64) -> PhysicsResult<CartesianState> {
    elements.state_at(target_jd)
}

/// 3-1-3 rotation (ω, i, Ω) from the perifocal plane to the ecliptic frame.
struct PerifocalRotation {
    r11: f64,
    r12: f64,
    r21: f64,
    r22: f64,
    r31: f64,
    r32: f64,
}

impl PerifocalRotation {
    fn new(omega_big: f64, omega_small: f64, i: f64) -> Self {
        let cos_omega = omega_big.cos();
        let sin_omega = omega_big.sin();
        let cos_w = omega_small.cos();
        let sin_w = omega_small.sin();
        let cos_i = i.cos();
        let sin_i = i.sin();

        Self {
            r11: cos_omega * cos_w - sin_omega * sin_w * cos_i,
            r12: -cos_omega * sin_w - sin_omega * cos_w * cos_i,
            r21: sin_omega * cos_w + cos_omega * sin_w * cos_i,
            r22: -sin_omega * sin_w + cos_omega * cos_w * cos_i,
            r31: sin_w * sin_i,
            r32: cos_w * sin_i,
        }
    }

    fn apply(&self, x: f64, y: f64) -> Vector3 {
        Vector3::new(
            self.r11 * x + self.r12 * y,
            self.r21 * x + self.r22 * y,
            self.r31 * x + self.r32 * y,
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
