// End-to-end scenario through the public API:
// catalog -> trajectory -> collision -> effects -> blast/tsunami -> deflection -> dispatcher

use impactsim_lib::api_client::{fallback_asteroids, CacheManager, CatalogSource, NeoCatalog, NeoWsClient};
use impactsim_lib::config::SimulatorConfig;
use impactsim_lib::deflection::{evaluate_deflection, BurnDirection, DeflectionParams, EccentricityUpdate};
use impactsim_lib::impact_effects::{compute_effects, compute_effects_for_collision, AsteroidPhysicalParams};
use impactsim_lib::overpressure::overpressure_profile;
use impactsim_lib::physics_engine::{GeoLocation, OrbitalElements, J2000_JD};
use impactsim_lib::state_manager::{AppState, WorkerResponse};
use impactsim_lib::trajectory::{
    check_collision, sample_trajectory, CircularEarthOrbit, EarthEphemeris, Sampling,
    DEFAULT_COLLISION_THRESHOLD_M,
};
use impactsim_lib::tsunami::{simulate_tsunami, TsunamiSettings};
use std::time::Duration;

const MEET_JD: f64 = J2000_JD + 200.0;

/// Orbit whose perihelion touches Earth's circular orbit at `MEET_JD`.
fn earth_crossing_orbit() -> OrbitalElements {
    let target = CircularEarthOrbit::default().earth_position(MEET_JD);
    let mut elements =
        OrbitalElements::from_au_degrees(1.3, 3.0 / 13.0, 0.0, 0.0, 0.0, 0.0, MEET_JD).unwrap();
    elements.argument_perihelion_rad = target.y.atan2(target.x);
    elements
}

fn window(elements: &OrbitalElements) -> Vec<impactsim_lib::trajectory::TrajectoryPoint> {
    sample_trajectory(elements, MEET_JD - 20.0, MEET_JD + 20.0, Sampling::StepDays(0.01)).unwrap()
}

#[test]
fn test_impact_scenario_end_to_end() {
    let earth = CircularEarthOrbit::default();
    let impactor = fallback_asteroids()
        .into_iter()
        .find(|r| r.name == "Impactor-2025")
        .unwrap();
    let params = impactor.physical_params();

    // Trajectory and collision
    let elements = earth_crossing_orbit();
    let report = check_collision(&window(&elements), &earth, DEFAULT_COLLISION_THRESHOLD_M).unwrap();
    assert!(report.collision);
    assert!((report.impact_time_jd.unwrap() - MEET_JD).abs() < 1.0);

    // Effects at the predicted point
    let effects = compute_effects_for_collision(&params, &report, GeoLocation::new(0.0, 0.0)).unwrap();
    assert!(effects.collision_predicted);
    assert_eq!(Some(effects.impact_location), report.impact_location);
    assert!(effects.kinetic_energy_j > 0.0);
    assert!(effects.crater_diameter_m > 0.0);

    // Blast and thermal profile from the same energy
    let blast = overpressure_profile(effects.kinetic_energy_j).unwrap();
    assert_eq!(blast.rows.len(), 12);
    assert!(blast.critical_radii.psi_1_m > blast.critical_radii.psi_5_m);
    assert!(blast.thermal.ignition_m > 0.0);

    // Same impactor dropped into the Pacific
    let ocean = GeoLocation::new(34.0, 160.0);
    let wet = compute_effects(&params, ocean).unwrap();
    assert!(wet.is_ocean);
    let tsunami = simulate_tsunami(
        ocean,
        wet.kinetic_energy_j,
        wet.crater_diameter_m,
        4000.0,
        45.0,
        &TsunamiSettings::default(),
    )
    .unwrap();
    assert!(tsunami.initial_wave_height_m > 0.0);
    assert!(tsunami
        .profile
        .windows(2)
        .all(|w| w[1].wave_height_m <= w[0].wave_height_m));
}

#[test]
fn test_deflection_turns_hit_into_miss() {
    let earth = CircularEarthOrbit::default();
    let elements = earth_crossing_orbit();

    let result = evaluate_deflection(
        &elements,
        &DeflectionParams {
            delta_v_m_s: 1.0,
            direction: BurnDirection::Prograde,
            lead_time_days: 3652.5,
            impact_jd: MEET_JD,
            asteroid_mass_kg: 1.4e9,
            eccentricity_update: EccentricityUpdate::Osculating,
        },
    )
    .unwrap();
    assert!(result.success);
    assert!(result.deflection_distance_km > 6371.0);
    assert!((result.impulse_n_s - 1.4e9).abs() < 1.0);

    let report = check_collision(
        &window(&result.new_elements),
        &earth,
        DEFAULT_COLLISION_THRESHOLD_M,
    )
    .unwrap();
    assert!(!report.collision);
    assert!(report.closest_approach_m > DEFAULT_COLLISION_THRESHOLD_M);
}

#[tokio::test]
async fn test_offline_catalog_falls_back() {
    let client = NeoWsClient::new(
        "DEMO_KEY".to_string(),
        "http://127.0.0.1:9".to_string(),
        Duration::from_secs(2),
    )
    .unwrap();
    let catalog = NeoCatalog::new(client, CacheManager::new());

    let (records, source) = catalog.load_or_fallback().await;
    assert_eq!(source, CatalogSource::Fallback);
    assert!(records.iter().any(|r| r.name == "99942 Apophis"));
    for record in &records {
        assert!(record.orbital_elements.validate().is_ok());
    }
}

#[tokio::test]
async fn test_dispatcher_json_protocol() {
    let state = AppState::new(SimulatorConfig::default()).unwrap();
    state.start().unwrap();

    let params = AsteroidPhysicalParams::from_km_s(50.0, 2600.0, 17.0);
    let request = serde_json::json!({
        "type": "recalculate_impact",
        "id": 42,
        "payload": {
            "params": params,
            "location": {"latitude_deg": 38.5, "longitude_deg": -98.0}
        }
    });
    let raw = state.dispatcher.handle_json(&request.to_string()).await;
    let response: WorkerResponse = serde_json::from_str(&raw).unwrap();

    assert_eq!(response.id, 42);
    assert_eq!(response.op_type, "recalculate_impact");
    assert!(response.error.is_none());
    let direct = compute_effects(&params, GeoLocation::new(38.5, -98.0)).unwrap();
    let energy = response.payload["kinetic_energy_j"].as_f64().unwrap();
    assert!((energy / direct.kinetic_energy_j - 1.0).abs() < 1e-12);

    // Bad input comes back as an error response, not a panic
    let bad = r#"{"type":"overpressure_profile","payload":{"energy_j":-1.0},"id":43}"#;
    let response: WorkerResponse = serde_json::from_str(&state.dispatcher.handle_json(bad).await).unwrap();
    assert_eq!(response.id, 43);
    assert!(response.error.unwrap().contains("energy_j"));

    state.shutdown();
}
