// Configuration - runtime settings loaded from the environment (.env supported)

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::physics_engine::KeplerSettings;

pub const DEFAULT_API_KEY: &str = "DEMO_KEY";
pub const DEFAULT_NEO_BASE_URL: &str = "https://api.nasa.gov/neo/rest/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// NASA api.nasa.gov key
    pub api_key: String,
    pub neo_base_url: String,
    pub fetch_timeout_secs: u64,
    /// Per-request budget for the background compute worker
    pub worker_timeout_ms: u64,
    pub kepler: KeplerSettings,
    /// Collision threshold expressed in Earth radii
    pub collision_threshold_earth_radii: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            neo_base_url: DEFAULT_NEO_BASE_URL.to_string(),
            fetch_timeout_secs: 10,
            worker_timeout_ms: 2_000,
            kepler: KeplerSettings::default(),
            collision_threshold_earth_radii: 2.0,
        }
    }
}

impl SimulatorConfig {
    /// Load from process environment, reading a `.env` file first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenv::dotenv().is_ok() {
            log::debug!("Loaded settings from .env");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("NASA_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .unwrap_or(defaults.api_key);
        let neo_base_url = lookup("NEO_API_BASE_URL").unwrap_or(defaults.neo_base_url);

        let fetch_timeout_secs = parse_var(&lookup, "NEO_FETCH_TIMEOUT_SECS")?
            .unwrap_or(defaults.fetch_timeout_secs);
        let worker_timeout_ms =
            parse_var(&lookup, "WORKER_TIMEOUT_MS")?.unwrap_or(defaults.worker_timeout_ms);

        let tolerance: f64 =
            parse_var(&lookup, "KEPLER_TOLERANCE")?.unwrap_or(defaults.kepler.tolerance);
        if !(tolerance > 0.0 && tolerance < 1e-2) {
            return Err(invalid("KEPLER_TOLERANCE", tolerance, "must be in (0, 1e-2)"));
        }
        let max_iterations: u32 = parse_var(&lookup, "KEPLER_MAX_ITERATIONS")?
            .unwrap_or(defaults.kepler.max_iterations);
        if max_iterations == 0 {
            return Err(invalid("KEPLER_MAX_ITERATIONS", 0, "must be at least 1"));
        }

        let collision_threshold_earth_radii: f64 =
            parse_var(&lookup, "COLLISION_THRESHOLD_EARTH_RADII")?
                .unwrap_or(defaults.collision_threshold_earth_radii);
        if !(collision_threshold_earth_radii.is_finite() && collision_threshold_earth_radii > 0.0)
        {
            return Err(invalid(
                "COLLISION_THRESHOLD_EARTH_RADII",
                collision_threshold_earth_radii,
                "must be a positive number",
            ));
        }

        Ok(Self {
            api_key,
            neo_base_url,
            fetch_timeout_secs,
            worker_timeout_ms,
            kepler: KeplerSettings {
                tolerance,
                max_iterations,
            },
            collision_threshold_earth_radii,
        })
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn collision_threshold_m(&self) -> f64 {
        self.collision_threshold_earth_radii * crate::physics_engine::R_EARTH_MEAN
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn invalid(key: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = SimulatorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.api_key, DEFAULT_API_KEY);
        assert_eq!(config.worker_timeout_ms, 2_000);
        assert_eq!(config.kepler.max_iterations, 50);
        assert!((config.collision_threshold_m() - 2.0 * 6.371e6).abs() < 1e-6);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = SimulatorConfig::from_lookup(lookup_from(&[
            ("NASA_API_KEY", "abc123"),
            ("WORKER_TIMEOUT_MS", "250"),
            ("KEPLER_TOLERANCE", "1e-8"),
            ("KEPLER_MAX_ITERATIONS", "100"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "abc123");
        assert_eq!(config.worker_timeout(), Duration::from_millis(250));
        assert_eq!(config.kepler.tolerance, 1e-8);
        assert_eq!(config.kepler.max_iterations, 100);
    }

    #[test]
    fn test_blank_api_key_falls_back_to_demo() {
        let config = SimulatorConfig::from_lookup(lookup_from(&[("NASA_API_KEY", "  ")])).unwrap();
        assert_eq!(config.api_key, DEFAULT_API_KEY);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SimulatorConfig::from_lookup(lookup_from(&[("WORKER_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "WORKER_TIMEOUT_MS", .. }));

        let err = SimulatorConfig::from_lookup(lookup_from(&[(
            "COLLISION_THRESHOLD_EARTH_RADII",
            "-1",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "COLLISION_THRESHOLD_EARTH_RADII",
                ..
            }
        ));
    }
}
