// Trajectory - sampling, Earth ephemeris and collision detection
// Works on analytic two-body propagation; no numerical integration involved

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::error::{PhysicsError, PhysicsResult};
use crate::physics_engine::{
    GeoLocation, KeplerSettings, OrbitalElements, Vector3, AU, J2000_JD, R_EARTH_MEAN,
    SECONDS_PER_DAY,
};

/// Default collision threshold: twice Earth's radius, to cover the gap
/// between discrete samples and the true closest approach.
pub const DEFAULT_COLLISION_THRESHOLD_M: f64 = 2.0 * R_EARTH_MEAN;

/// Upper bound on points one sampler may produce
pub const MAX_SAMPLES: usize = 1_000_000;

/// Earth's sidereal year (days)
pub const EARTH_SIDEREAL_YEAR_DAYS: f64 = 365.256363;

/// Earth's mean longitude at J2000 (degrees)
pub const EARTH_MEAN_LONGITUDE_J2000_DEG: f64 = 100.464;

// =============================================================================
// TRAJECTORY SAMPLER
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Sampling {
    /// Evenly spaced points, both ends included
    Count(usize),
    /// Fixed step in days; the end time is always included
    StepDays(f64),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrajectoryPoint {
    pub time_jd: f64,
    pub position: Vector3, // meters
    pub velocity: Vector3, // m/s
}

/// Pure, restartable sampler: every `iter()` recomputes from the elements.
#[derive(Debug, Clone)]
pub struct TrajectorySampler {
    elements: OrbitalElements,
    start_jd: f64,
    end_jd: f64,
    sampling: Sampling,
    count: usize,
    settings: KeplerSettings,
}

impl TrajectorySampler {
    pub fn new(
        elements: OrbitalElements,
        start_jd: f64,
        end_jd: f64,
        sampling: Sampling,
    ) -> PhysicsResult<Self> {
        elements.validate()?;
        if !(start_jd.is_finite() && end_jd.is_finite()) {
            return Err(PhysicsError::invalid_input("time range", "must be finite"));
        }
        if end_jd < start_jd {
            return Err(PhysicsError::invalid_input(
                "time range",
                format!("end {} precedes start {}", end_jd, start_jd),
            ));
        }
        match sampling {
            Sampling::Count(n) if n < 2 => {
                return Err(PhysicsError::invalid_input(
                    "sampling",
                    "at least 2 samples are required",
                ))
            }
            Sampling::StepDays(step) if !(step.is_finite() && step > 0.0) => {
                return Err(PhysicsError::invalid_input(
                    "sampling",
                    format!("step must be positive, got {}", step),
                ))
            }
            _ => {}
        }
        let count = sample_count(end_jd - start_jd, sampling).ok_or_else(|| {
            PhysicsError::invalid_input(
                "sampling",
                format!("would produce more than {} points", MAX_SAMPLES),
            )
        })?;

        Ok(Self {
            elements,
            start_jd,
            end_jd,
            sampling,
            count,
            settings: KeplerSettings::default(),
        })
    }

    pub fn with_kepler_settings(mut self, settings: KeplerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn time_at(&self, index: usize) -> f64 {
        match self.sampling {
            Sampling::Count(n) => {
                if index + 1 == n {
                    self.end_jd
                } else {
                    let span = self.end_jd - self.start_jd;
                    self.start_jd + span * index as f64 / (n - 1) as f64
                }
            }
            Sampling::StepDays(step) => (self.start_jd + step * index as f64).min(self.end_jd),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = TrajectoryPoint> + '_ {
        (0..self.len()).map(move |i| {
            let state = self
                .elements
                .propagate_validated(self.time_at(i), &self.settings);
            TrajectoryPoint {
                time_jd: state.time_jd,
                position: state.position,
                velocity: state.velocity,
            }
        })
    }

    pub fn collect_points(&self) -> Vec<TrajectoryPoint> {
        self.iter().collect()
    }
}

/// Number of points for `sampling` over `span_days`, or `None` above [`MAX_SAMPLES`].
fn sample_count(span_days: f64, sampling: Sampling) -> Option<usize> {
    let count = match sampling {
        Sampling::Count(n) => n,
        Sampling::StepDays(step) => {
            let steps = (span_days / step).floor();
            if !(steps.is_finite() && steps < MAX_SAMPLES as f64) {
                return None;
            }
            let full_steps = steps as usize;
            // Trailing partial step still ends exactly on end_jd
            let extra = if (full_steps as f64) * step < span_days { 2 } else { 1 };
            full_steps.checked_add(extra)?
        }
    };
    (count <= MAX_SAMPLES).then_some(count)
}

/// Eager convenience wrapper around [`TrajectorySampler`].
pub fn sample_trajectory(
    elements: &OrbitalElements,
    start_jd: f64,
    end_jd: f64,
    sampling: Sampling,
) -> PhysicsResult<Vec<TrajectoryPoint>> {
    Ok(TrajectorySampler::new(*elements, start_jd, end_jd, sampling)?.collect_points())
}

// =============================================================================
// EARTH EPHEMERIS (simplified)
// =============================================================================

/// Earth's heliocentric position at a Julian Date.
pub trait EarthEphemeris {
    fn earth_position(&self, time_jd: f64) -> Vector3;
}

impl<F> EarthEphemeris for F
where
    F: Fn(f64) -> Vector3,
{
    fn earth_position(&self, time_jd: f64) -> Vector3 {
        self(time_jd)
    }
}

/// Earth on a circular 1 AU orbit in the ecliptic plane.
/// Not a real ephemeris: eccentricity and perturbations are ignored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircularEarthOrbit {
    pub radius_m: f64,
    pub period_days: f64,
    pub longitude_at_j2000_rad: f64,
}

impl Default for CircularEarthOrbit {
    fn default() -> Self {
        Self {
            radius_m: AU,
            period_days: EARTH_SIDEREAL_YEAR_DAYS,
            longitude_at_j2000_rad: EARTH_MEAN_LONGITUDE_J2000_DEG.to_radians(),
        }
    }
}

impl CircularEarthOrbit {
    pub fn velocity(&self, time_jd: f64) -> Vector3 {
        let angle = self.longitude_at(time_jd);
        let speed = TAU * self.radius_m / (self.period_days * SECONDS_PER_DAY);
        Vector3::new(-speed * angle.sin(), speed * angle.cos(), 0.0)
    }

    fn longitude_at(&self, time_jd: f64) -> f64 {
        self.longitude_at_j2000_rad + TAU * (time_jd - J2000_JD) / self.period_days
    }
}

impl EarthEphemeris for CircularEarthOrbit {
    fn earth_position(&self, time_jd: f64) -> Vector3 {
        let angle = self.longitude_at(time_jd);
        Vector3::new(
            self.radius_m * angle.cos(),
            self.radius_m * angle.sin(),
            0.0,
        )
    }
}

// =============================================================================
// COLLISION DETECTION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollisionReport {
    pub collision: bool,
    /// First sample inside the threshold
    pub impact_time_jd: Option<f64>,
    pub impact_point: Option<Vector3>,
    /// Spherical projection of the heliocentric impact point (approximation)
    pub impact_location: Option<GeoLocation>,
    pub closest_approach_m: f64,
    pub closest_approach_jd: f64,
}

/// Scan a sampled trajectory against Earth's position at the same instants.
pub fn check_collision<E: EarthEphemeris + ?Sized>(
    trajectory: &[TrajectoryPoint],
    ephemeris: &E,
    threshold_m: f64,
) -> PhysicsResult<CollisionReport> {
    if trajectory.is_empty() {
        return Err(PhysicsError::invalid_input("trajectory", "is empty"));
    }
    if !(threshold_m.is_finite() && threshold_m > 0.0) {
        return Err(PhysicsError::invalid_input(
            "threshold_m",
            format!("must be positive, got {}", threshold_m),
        ));
    }

    let mut closest_approach_m = f64::MAX;
    let mut closest_approach_jd = trajectory[0].time_jd;
    let mut first_hit: Option<&TrajectoryPoint> = None;

    for point in trajectory {
        let distance = point
            .position
            .distance_to(&ephemeris.earth_position(point.time_jd));

        if distance < closest_approach_m {
            closest_approach_m = distance;
            closest_approach_jd = point.time_jd;
        }
        if first_hit.is_none() && distance < threshold_m {
            first_hit = Some(point);
        }
    }

    if let Some(hit) = first_hit {
        log::info!(
            "Collision predicted at JD {:.3} (closest approach {:.0} km)",
            hit.time_jd,
            closest_approach_m / 1000.0
        );
    }

    Ok(CollisionReport {
        collision: first_hit.is_some(),
        impact_time_jd: first_hit.map(|p| p.time_jd),
        impact_point: first_hit.map(|p| p.position),
        impact_location: first_hit.map(|p| GeoLocation::from_cartesian(&p.position)),
        closest_approach_m,
        closest_approach_jd,
    })
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ClosestApproach {
    pub time_jd: f64,
    pub distance_m: f64,
}

/// Resample densely around a suspected close approach, since coarse
/// sampling can step over the true minimum.
pub fn refine_closest_approach<E: EarthEphemeris + ?Sized>(
    elements: &OrbitalElements,
    ephemeris: &E,
    around_jd: f64,
    half_window_days: f64,
    samples: usize,
) -> PhysicsResult<ClosestApproach> {
    if !(half_window_days.is_finite() && half_window_days > 0.0) {
        return Err(PhysicsError::invalid_input(
            "half_window_days",
            "must be positive",
        ));
    }
    let sampler = TrajectorySampler::new(
        *elements,
        around_jd - half_window_days,
        around_jd + half_window_days,
        Sampling::Count(samples.max(3)),
    )?;

    let best = sampler
        .iter()
        .map(|p| ClosestApproach {
            time_jd: p.time_jd,
            distance_m: p.position.distance_to(&ephemeris.earth_position(p.time_jd)),
        })
        .fold(None::<ClosestApproach>, |best, c| match best {
            Some(b) if b.distance_m <= c.distance_m => Some(b),
            _ => Some(c),
        });

    best.ok_or_else(|| PhysicsError::invalid_input("samples", "produced no points"))
}

// =============================================================================
// STRAIGHT-LINE APPROACH GEOMETRY (Earth-centred)
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ApproachDeflection {
    pub delta_v_m_s: f64,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApproachResult {
    pub will_hit: bool,
    /// Unit travel direction after any deflection
    pub direction: Vector3,
    pub start_point: Vector3,
    pub impact_point: Option<Vector3>,
    pub impact_location: Option<GeoLocation>,
    /// Path length from start to surface (m)
    pub path_length_m: Option<f64>,
}

pub fn unit_vector_from_az_el(azimuth_deg: f64, elevation_deg: f64) -> Vector3 {
    let az = azimuth_deg.to_radians();
    let el = elevation_deg.to_radians();
    Vector3::new(el.cos() * az.cos(), el.cos() * az.sin(), el.sin()).normalize()
}

/// Nearest non-negative intersection of `p0 + s·u` with a sphere of `radius_m`.
pub fn line_sphere_intersection(p0: &Vector3, u: &Vector3, radius_m: f64) -> Option<(f64, Vector3)> {
    let b = 2.0 * p0.dot(u);
    let c = p0.dot(p0) - radius_m * radius_m;
    let disc = b * b - 4.0 * c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let s = [(-b - sqrt_disc) / 2.0, (-b + sqrt_disc) / 2.0]
        .into_iter()
        .filter(|s| *s >= 0.0)
        .fold(None::<f64>, |acc, s| Some(acc.map_or(s, |a| a.min(s))))?;
    Some((s, p0.add(&u.scale(s))))
}

/// A body heading at Earth along (azimuth, elevation) from `start_distance_m`
/// away, optionally nudged by a delta-v, and where it meets the surface.
pub fn approach_impact(
    azimuth_deg: f64,
    elevation_deg: f64,
    start_distance_m: f64,
    speed_m_s: f64,
    deflection: Option<ApproachDeflection>,
) -> PhysicsResult<ApproachResult> {
    if !(start_distance_m.is_finite() && start_distance_m > R_EARTH_MEAN) {
        return Err(PhysicsError::invalid_input(
            "start_distance_m",
            "must lie outside the Earth",
        ));
    }
    if !(speed_m_s.is_finite() && speed_m_s > 0.0) {
        return Err(PhysicsError::invalid_input("speed_m_s", "must be positive"));
    }

    let u = unit_vector_from_az_el(azimuth_deg, elevation_deg);
    let start_point = u.scale(-start_distance_m);

    let direction = match deflection {
        Some(dv) if dv.delta_v_m_s != 0.0 => {
            let dv_vec = unit_vector_from_az_el(dv.azimuth_deg, dv.elevation_deg).scale(dv.delta_v_m_s);
            u.scale(speed_m_s).add(&dv_vec).normalize()
        }
        _ => u,
    };

    let hit = line_sphere_intersection(&start_point, &direction, R_EARTH_MEAN);
    Ok(ApproachResult {
        will_hit: hit.is_some(),
        direction,
        start_point,
        impact_point: hit.map(|(_, p)| p),
        impact_location: hit.map(|(_, p)| GeoLocation::from_cartesian(&p)),
        path_length_m: hit.map(|(s, _)| s),
    })
}

// =============================================================================
// MONTE CARLO IMPACT PROBABILITY
// =============================================================================

/// 1-sigma uncertainties applied to the nominal elements.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ElementUncertainty {
    pub semi_major_axis_m: f64,
    pub eccentricity: f64,
    pub angles_rad: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MonteCarloSettings {
    pub num_runs: u32,
    pub start_jd: f64,
    pub window_days: f64,
    pub step_days: f64,
    pub threshold_m: f64,
    pub seed: u64,
}

/// Result of a Monte Carlo impact probability simulation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonteCarloResult {
    pub num_runs: u32,
    pub num_impacts: u32,
    /// Impact probability (0.0 - 1.0)
    pub impact_probability: f64,
    /// Mean closest approach distance (km)
    pub mean_miss_km: f64,
    pub std_miss_km: f64,
    pub min_miss_km: f64,
    pub palermo_scale: f64,
}

/// Box-Muller on top of rand's uniform sampler
fn gaussian(rng: &mut StdRng, sigma: f64) -> f64 {
    if sigma == 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    sigma * (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Sample the element uncertainty, propagate each clone over the window
/// and count how many pass inside the collision threshold.
pub fn monte_carlo_impact_probability<E: EarthEphemeris + ?Sized>(
    nominal: &OrbitalElements,
    uncertainty: &ElementUncertainty,
    settings: &MonteCarloSettings,
    ephemeris: &E,
) -> PhysicsResult<MonteCarloResult> {
    nominal.validate()?;
    if settings.num_runs == 0 {
        return Err(PhysicsError::invalid_input("num_runs", "must be at least 1"));
    }
    if !(settings.window_days.is_finite() && settings.window_days > 0.0) {
        return Err(PhysicsError::invalid_input("window_days", "must be positive"));
    }
    if !(settings.step_days.is_finite() && settings.step_days > 0.0) {
        return Err(PhysicsError::invalid_input(
            "step_days",
            format!("must be positive, got {}", settings.step_days),
        ));
    }
    if sample_count(settings.window_days, Sampling::StepDays(settings.step_days)).is_none() {
        return Err(PhysicsError::invalid_input(
            "step_days",
            format!("window would need more than {} samples", MAX_SAMPLES),
        ));
    }
    if !(settings.threshold_m.is_finite() && settings.threshold_m > 0.0) {
        return Err(PhysicsError::invalid_input(
            "threshold_m",
            format!("must be positive, got {}", settings.threshold_m),
        ));
    }
    let sigmas = [
        uncertainty.semi_major_axis_m,
        uncertainty.eccentricity,
        uncertainty.angles_rad,
    ];
    if sigmas.iter().any(|s| !(s.is_finite() && *s >= 0.0)) {
        return Err(PhysicsError::invalid_input(
            "uncertainty",
            "sigmas must be finite and non-negative",
        ));
    }

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut impacts = 0u32;
    let mut valid_runs = 0u32;
    let mut miss_sum = 0.0f64;
    let mut miss_sq_sum = 0.0f64;
    let mut min_miss = f64::MAX;

    for _ in 0..settings.num_runs {
        let sample = OrbitalElements {
            semi_major_axis_m: nominal.semi_major_axis_m
                + gaussian(&mut rng, uncertainty.semi_major_axis_m),
            eccentricity: nominal.eccentricity + gaussian(&mut rng, uncertainty.eccentricity),
            inclination_rad: nominal.inclination_rad + gaussian(&mut rng, uncertainty.angles_rad),
            longitude_ascending_node_rad: nominal.longitude_ascending_node_rad
                + gaussian(&mut rng, uncertainty.angles_rad),
            argument_perihelion_rad: nominal.argument_perihelion_rad
                + gaussian(&mut rng, uncertainty.angles_rad),
            mean_anomaly_rad: nominal.mean_anomaly_rad + gaussian(&mut rng, uncertainty.angles_rad),
            epoch_jd: nominal.epoch_jd,
        };

        // Clones that land outside the elliptic domain are skipped
        let sampler = match TrajectorySampler::new(
            sample,
            settings.start_jd,
            settings.start_jd + settings.window_days,
            Sampling::StepDays(settings.step_days),
        ) {
            Ok(s) => s,
            Err(e) => {
                log::debug!("Skipping Monte Carlo clone: {}", e);
                continue;
            }
        };

        let report = check_collision(&sampler.collect_points(), ephemeris, settings.threshold_m)?;
        valid_runs += 1;
        if report.collision {
            impacts += 1;
        }

        let miss_km = report.closest_approach_m / 1000.0;
        miss_sum += miss_km;
        miss_sq_sum += miss_km * miss_km;
        min_miss = min_miss.min(miss_km);
    }

    if valid_runs == 0 {
        return Err(PhysicsError::invalid_input(
            "uncertainty",
            "no sampled clone produced a bound orbit",
        ));
    }

    let n = valid_runs as f64;
    let impact_probability = impacts as f64 / n;
    let mean_miss_km = miss_sum / n;
    let variance = (miss_sq_sum / n) - (mean_miss_km * mean_miss_km);

    // PS = log10(P / (fB * Δt)) with background rate fB ≈ 1e-8 per year
    let years = settings.window_days / 365.25;
    let background = 1e-8 * years;
    let palermo_scale = if impact_probability > 0.0 {
        (impact_probability / background).log10()
    } else {
        -10.0
    };

    Ok(MonteCarloResult {
        num_runs: valid_runs,
        num_impacts: impacts,
        impact_probability,
        mean_miss_km,
        std_miss_km: variance.max(0.0).sqrt(),
        min_miss_km: min_miss,
        palermo_scale,
    })
}

// =============================================================================
// TESTS
// =============================================================================
