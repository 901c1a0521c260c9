//! Property-based tests for the orbit and impact models using proptest.
//!
//! These check invariants across a wide range of elements and impactors
//! rather than single hand-picked cases.

use proptest::prelude::*;
use std::f64::consts::TAU;

use crate::deflection::{apply_delta_v, BurnDirection, EccentricityUpdate};
use crate::impact_effects::{damage_radii_km, AsteroidPhysicalParams};
use crate::overpressure::overpressure_kpa;
use crate::physics_engine::{
    solve_kepler, CartesianState, KeplerSettings, OrbitalElements, J2000_JD, MU_SUN,
};
use crate::trajectory::{Sampling, TrajectorySampler};

fn elements(a_au: f64, e: f64, i_deg: f64, node_deg: f64, peri_deg: f64, m_deg: f64) -> OrbitalElements {
    OrbitalElements::from_au_degrees(a_au, e, i_deg, node_deg, peri_deg, m_deg, J2000_JD)
        .expect("generated elements are valid")
}

fn relative_gap(a: &CartesianState, b: &CartesianState) -> f64 {
    a.position.distance_to(&b.position) / a.position.magnitude()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Newton iteration satisfies E - e·sin(E) = M to well below the tolerance.
    #[test]
    fn prop_kepler_residual(
        mean_anomaly in 0.0f64..TAU,
        eccentricity in 0.0f64..0.99,
    ) {
        let solution = solve_kepler(mean_anomaly, eccentricity, &KeplerSettings::default()).unwrap();
        let e_anom = solution.eccentric_anomaly;
        let residual = e_anom - eccentricity * e_anom.sin() - mean_anomaly;

        prop_assert!(solution.converged, "no convergence for M={}, e={}", mean_anomaly, eccentricity);
        prop_assert!(
            residual.abs() < 1e-9,
            "residual {:e} for M={}, e={}", residual, mean_anomaly, eccentricity
        );
    }

    /// Elements -> state -> elements -> state reproduces the same position.
    #[test]
    fn prop_state_round_trip(
        a_au in 0.5f64..5.0,
        eccentricity in 0.01f64..0.9,
        inclination in 1.0f64..170.0,
        node in 0.0f64..360.0,
        perihelion in 0.0f64..360.0,
        mean_anomaly in 0.0f64..360.0,
    ) {
        let original = elements(a_au, eccentricity, inclination, node, perihelion, mean_anomaly);
        let state = original.state_at(J2000_JD).unwrap();
        let recovered = OrbitalElements::from_state(&state).unwrap();

        prop_assert!((recovered.semi_major_axis_m / original.semi_major_axis_m - 1.0).abs() < 1e-9);
        prop_assert!((recovered.eccentricity - original.eccentricity).abs() < 1e-9);

        // Compare a later epoch so angle conventions cannot hide an error
        let later = J2000_JD + 123.0;
        let gap = relative_gap(
            &original.state_at(later).unwrap(),
            &recovered.state_at(later).unwrap(),
        );
        prop_assert!(gap < 1e-7, "position gap {:e} after round trip", gap);
    }

    /// Sampling exactly one period returns to the starting point.
    #[test]
    fn prop_trajectory_closes(
        a_au in 0.6f64..4.0,
        eccentricity in 0.0f64..0.8,
        inclination in 0.0f64..60.0,
        samples in 3usize..50,
    ) {
        let el = elements(a_au, eccentricity, inclination, 40.0, 70.0, 10.0);
        let end = J2000_JD + el.orbital_period_days();
        let points = TrajectorySampler::new(el, J2000_JD, end, Sampling::Count(samples))
            .unwrap()
            .collect_points();

        prop_assert_eq!(points.len(), samples);
        let first = points[0].position;
        let last = points[samples - 1].position;
        prop_assert!(first.distance_to(&last) / first.magnitude() < 1e-8);
    }

    /// Specific orbital energy is the same at every sampled point.
    #[test]
    fn prop_sampled_energy_constant(
        a_au in 0.6f64..4.0,
        eccentricity in 0.0f64..0.9,
    ) {
        let el = elements(a_au, eccentricity, 12.0, 100.0, 200.0, 0.0);
        let expected = -MU_SUN / (2.0 * el.semi_major_axis_m);
        let sampler = TrajectorySampler::new(el, J2000_JD, J2000_JD + 400.0, Sampling::Count(25)).unwrap();

        for point in sampler.iter() {
            let r = point.position.magnitude();
            let v = point.velocity.magnitude();
            let energy = 0.5 * v * v - MU_SUN / r;
            prop_assert!(((energy - expected) / expected).abs() < 1e-9);
        }
    }

    /// A prograde burn always raises the orbit, a retrograde one lowers it.
    #[test]
    fn prop_burn_direction_sets_energy_change(
        a_au in 0.8f64..3.0,
        eccentricity in 0.05f64..0.7,
        delta_v in 0.001f64..10.0,
    ) {
        let el = elements(a_au, eccentricity, 5.0, 30.0, 60.0, 90.0);
        let up = apply_delta_v(&el, delta_v, BurnDirection::Prograde, J2000_JD, EccentricityUpdate::Osculating).unwrap();
        let down = apply_delta_v(&el, delta_v, BurnDirection::Retrograde, J2000_JD, EccentricityUpdate::Osculating).unwrap();

        prop_assert!(up.semi_major_axis_m > el.semi_major_axis_m);
        prop_assert!(down.semi_major_axis_m < el.semi_major_axis_m);
    }

    /// Bigger impactors release more energy and dig bigger craters.
    #[test]
    fn prop_impact_monotonic_in_radius(
        radius in 1.0f64..5000.0,
        growth in 1.01f64..3.0,
        density in 1000.0f64..8000.0,
        velocity_km_s in 11.0f64..72.0,
    ) {
        let small = AsteroidPhysicalParams::from_km_s(radius, density, velocity_km_s);
        let large = AsteroidPhysicalParams::from_km_s(radius * growth, density, velocity_km_s);

        prop_assert!(large.kinetic_energy_j() > small.kinetic_energy_j());
        prop_assert!(large.crater_diameter_m() > small.crater_diameter_m());

        let small_radii = damage_radii_km(small.crater_diameter_m());
        let large_radii = damage_radii_km(large.crater_diameter_m());
        prop_assert!(large_radii.blast_radius_km >= small_radii.blast_radius_km);
        prop_assert!(large_radii.thermal_radius_km >= small_radii.thermal_radius_km);
        prop_assert!(large_radii.seismic_radius_km >= small_radii.seismic_radius_km);
    }

    /// Overpressure falls off with scaled distance across all three fit ranges.
    #[test]
    fn prop_overpressure_decreasing(
        z in 0.05f64..500.0,
        step in 1.001f64..2.0,
    ) {
        prop_assert!(overpressure_kpa(z * step) < overpressure_kpa(z));
    }
}
