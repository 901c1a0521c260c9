// ImpactSim - Asteroid orbit, deflection and impact-effects engine
// Library entry point; `run()` drives the command-line binary

pub mod api_client;
pub mod config;
pub mod deflection;
pub mod error;
pub mod impact_effects;
pub mod overpressure;
pub mod physics_engine;
pub mod state_manager;
pub mod trajectory;
pub mod tsunami;

#[cfg(test)]
mod proptest_orbits;

use serde_json::json;
use std::io::{self, BufRead, Write};

use api_client::{CatalogSource, NeoRecord};
use config::SimulatorConfig;
use deflection::required_delta_v_for_shift;
use impact_effects::compute_effects_for_collision;
use physics_engine::{GeoLocation, SECONDS_PER_DAY, R_EARTH_MEAN};
use state_manager::{AppState, CollisionRequest, Operation, WorkerResponse};
use trajectory::{CollisionReport, Sampling};

/// Days scanned after each asteroid's epoch when looking for an Earth encounter
const SCAN_WINDOW_DAYS: f64 = 365.25;
const LEAD_TIME_DAYS: f64 = 3652.5;

pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match SimulatorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    let serve = std::env::args().any(|arg| arg == "--serve");

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    let result = runtime.block_on(async move {
        let state = AppState::new(config)?;
        state.start()?;
        if serve {
            serve_stdin(&state).await?;
        } else {
            report_catalog(&state).await;
        }
        state.shutdown();
        Ok::<(), Box<dyn std::error::Error>>(())
    });

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn build_runtime() -> io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

/// JSON-lines worker protocol: one request per stdin line, one response per stdout line.
async fn serve_stdin(state: &AppState) -> io::Result<()> {
    log::info!("Reading requests from stdin");
    let mut out = io::stdout().lock();
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = state.dispatcher.handle_json(&line).await;
        writeln!(out, "{}", response)?;
        out.flush()?;
    }
    Ok(())
}

async fn report_catalog(state: &AppState) {
    let (records, source) = state.catalog.load_or_fallback().await;
    match source {
        CatalogSource::Live => log::info!("Loaded {} asteroids from NeoWs", records.len()),
        CatalogSource::Cached => log::info!("Using {} cached asteroids", records.len()),
        CatalogSource::Fallback => log::info!("Using {} built-in asteroids", records.len()),
    }

    for record in &records {
        let report = assess(state, record).await;
        println!("{}", report);
    }
}

async fn assess(state: &AppState, record: &NeoRecord) -> serde_json::Value {
    let start_jd = record.orbital_elements.epoch_jd;
    let collision_op = Operation::CheckCollision(CollisionRequest {
        elements: record.orbital_elements,
        start_jd,
        end_jd: start_jd + SCAN_WINDOW_DAYS,
        sampling: Sampling::StepDays(0.25),
        threshold_m: None,
    });
    let response = state.dispatcher.execute_operation(&collision_op).await;
    let collision = decode::<CollisionReport>(&record.name, &response);

    let params = record.physical_params();
    let effects = collision
        .as_ref()
        .map(|report| compute_effects_for_collision(&params, report, GeoLocation::new(0.0, 0.0)));
    let effects = match effects {
        Some(Ok(effects)) => Some(effects),
        Some(Err(e)) => {
            log::warn!("{}: impact effects unavailable: {}", record.name, e);
            None
        }
        None => None,
    };

    let required_dv = required_delta_v_for_shift(R_EARTH_MEAN, LEAD_TIME_DAYS * SECONDS_PER_DAY).ok();

    json!({
        "id": record.id,
        "name": record.name,
        "hazardous": record.is_potentially_hazardous,
        "diameter_m": record.estimated_diameter_m,
        "collision": collision,
        "effects": effects,
        "required_delta_v_10yr_m_s": required_dv,
    })
}

fn decode<T: serde::de::DeserializeOwned>(name: &str, response: &WorkerResponse) -> Option<T> {
    if let Some(error) = &response.error {
        log::warn!("{}: {} failed: {}", name, response.op_type, error);
        return None;
    }
    match serde_json::from_value(response.payload.clone()) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("{}: unreadable {} payload: {}", name, response.op_type, e);
            None
        }
    }
}
