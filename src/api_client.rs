// NASA NeoWs API Client
// Fetches Near-Earth Object data and converts it to SI orbital elements

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SimulatorConfig;
use crate::error::ApiError;
use crate::impact_effects::AsteroidPhysicalParams;
use crate::physics_engine::{asteroid_density, OrbitalElements, J2000_JD};

/// Used when a record carries no osculation epoch
pub const DEFAULT_EPOCH_JD: f64 = 2_460_000.5;

/// Used when no close-approach speed is known (m/s)
pub const DEFAULT_IMPACT_VELOCITY_M_S: f64 = 17_000.0;

/// Used when neither a diameter nor an absolute magnitude is published (m)
pub const DEFAULT_DIAMETER_M: f64 = 100.0;

/// Geometric albedo assumed for the H -> diameter conversion
pub const ASSUMED_ALBEDO: f64 = 0.15;

const UNIX_EPOCH_JD: f64 = 2_440_587.5;

// =============================================================================
// API RESPONSE TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    pub links: Option<Links>,
    pub element_count: Option<i32>,
    pub near_earth_objects: Option<HashMap<String, Vec<NeoObject>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Links {
    pub next: Option<String>,
    pub prev: Option<String>,
    #[serde(rename = "self")]
    pub self_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeoObject {
    pub id: String,
    pub name: String,
    pub absolute_magnitude_h: Option<f64>,
    pub estimated_diameter: Option<EstimatedDiameter>,
    pub is_potentially_hazardous_asteroid: Option<bool>,
    pub close_approach_data: Option<Vec<CloseApproachData>>,
    pub orbital_data: Option<OrbitalData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatedDiameter {
    pub meters: Option<DiameterRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiameterRange {
    pub estimated_diameter_min: f64,
    pub estimated_diameter_max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseApproachData {
    pub close_approach_date: Option<String>,
    pub relative_velocity: Option<RelativeVelocity>,
    pub miss_distance: Option<MissDistance>,
    pub orbiting_body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelativeVelocity {
    pub kilometers_per_second: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissDistance {
    pub kilometers: Option<String>,
}

/// NeoWs publishes every number as a string: AU, degrees, JD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitalData {
    pub epoch_osculation: Option<String>,
    pub eccentricity: Option<String>,
    pub semi_major_axis: Option<String>,
    pub inclination: Option<String>,
    pub ascending_node_longitude: Option<String>,
    pub perihelion_argument: Option<String>,
    pub mean_anomaly: Option<String>,
    pub orbit_class: Option<OrbitClass>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitClass {
    pub orbit_class_type: Option<String>,
}

// =============================================================================
// BROWSE API RESPONSE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseResponse {
    pub links: Option<Links>,
    pub page: Option<PageInfo>,
    pub near_earth_objects: Vec<NeoObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    pub size: i32,
    pub total_elements: i32,
    pub total_pages: i32,
    pub number: i32,
}

// =============================================================================
// PROCESSED ASTEROID DATA (SI)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NeoRecord {
    pub id: String,
    pub name: String,
    pub orbital_elements: OrbitalElements,
    pub estimated_diameter_m: f64,
    pub density_kg_m3: f64,
    pub estimated_mass_kg: f64,
    /// Relative speed at the first listed close approach
    pub velocity_m_s: Option<f64>,
    pub is_potentially_hazardous: bool,
    pub absolute_magnitude: Option<f64>,
    pub orbit_class: String,
    pub close_approaches: Vec<CloseApproach>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloseApproach {
    pub date: String,
    pub miss_distance_m: Option<f64>,
    pub velocity_m_s: Option<f64>,
    pub orbiting_body: String,
}

impl NeoRecord {
    /// Impactor parameters for the effects calculator
    pub fn physical_params(&self) -> AsteroidPhysicalParams {
        AsteroidPhysicalParams::new(
            self.estimated_diameter_m / 2.0,
            self.density_kg_m3,
            self.velocity_m_s.unwrap_or(DEFAULT_IMPACT_VELOCITY_M_S),
        )
    }
}

/// Estimate asteroid density based on spectral/orbit class
/// References: Carry (2012), DeMeo & Carry (2013)
pub fn estimate_density(orbit_class: &str) -> f64 {
    match orbit_class.to_uppercase().as_str() {
        // NEA orbital classes - use mixed default
        "AMO" | "APO" | "ATE" | "IEO" => asteroid_density::DEFAULT,

        // Spectral-based estimates
        s if s.contains('C') => asteroid_density::C_TYPE,
        s if s.contains('B') => 1500.0, // B-type: primitive
        s if s.contains('D') => 1200.0, // D-type: organic-rich
        s if s.contains('P') => 1300.0, // P-type: primitive
        s if s.contains('S') => asteroid_density::S_TYPE,
        s if s.contains('Q') => 2500.0, // Q-type: ordinary chondrite
        s if s.contains('V') => 3200.0, // V-type: basaltic (Vesta-like)
        s if s.contains('M') => asteroid_density::M_TYPE,
        s if s.contains('X') => 3500.0, // X-type: unknown metal-rich

        _ => asteroid_density::DEFAULT,
    }
}

fn sphere_mass(diameter_m: f64, density_kg_m3: f64) -> f64 {
    let radius = diameter_m / 2.0;
    density_kg_m3 * (4.0 / 3.0) * PI * radius.powi(3)
}

/// D(km) = 1329 / sqrt(p) · 10^(−H/5)
pub fn diameter_from_absolute_magnitude(h: f64, albedo: f64) -> f64 {
    1329.0 / albedo.sqrt() * 10f64.powf(-h / 5.0) * 1000.0
}

pub fn jd_from_datetime(datetime: &DateTime<Utc>) -> f64 {
    let seconds = datetime.timestamp() as f64 + datetime.timestamp_subsec_nanos() as f64 * 1e-9;
    UNIX_EPOCH_JD + seconds / 86_400.0
}

/// Epochs arrive either as a Julian Date or as an ISO date/datetime.
pub fn parse_epoch_jd(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Ok(jd) = raw.parse::<f64>() {
        return jd.is_finite().then_some(jd);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(jd_from_datetime(&datetime.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%b-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(jd_from_datetime(&naive.and_utc()));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| jd_from_datetime(&naive.and_utc()))
}

fn parse_number(raw: Option<&String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

impl NeoObject {
    /// Convert the NASA record to SI, validating the orbit.
    pub fn to_record(&self) -> Result<NeoRecord, ApiError> {
        let missing = |field: &'static str| ApiError::MissingField {
            id: self.id.clone(),
            field,
        };
        let orbital_data = self
            .orbital_data
            .as_ref()
            .ok_or_else(|| missing("orbital_data"))?;
        let field = |value: Option<&String>, name: &'static str| {
            parse_number(value).ok_or_else(|| missing(name))
        };

        let epoch_jd = match orbital_data.epoch_osculation.as_deref() {
            Some(raw) => parse_epoch_jd(raw).ok_or_else(|| missing("epoch_osculation"))?,
            None => {
                log::debug!("NEO {} has no epoch; assuming JD {}", self.id, DEFAULT_EPOCH_JD);
                DEFAULT_EPOCH_JD
            }
        };

        let orbital_elements = OrbitalElements::from_au_degrees(
            field(orbital_data.semi_major_axis.as_ref(), "semi_major_axis")?,
            field(orbital_data.eccentricity.as_ref(), "eccentricity")?,
            field(orbital_data.inclination.as_ref(), "inclination")?,
            field(orbital_data.ascending_node_longitude.as_ref(), "ascending_node_longitude")?,
            field(orbital_data.perihelion_argument.as_ref(), "perihelion_argument")?,
            field(orbital_data.mean_anomaly.as_ref(), "mean_anomaly")?,
            epoch_jd,
        )?;

        // Published range midpoint, then absolute magnitude, then a default
        let estimated_diameter_m = self
            .estimated_diameter
            .as_ref()
            .and_then(|d| d.meters.as_ref())
            .map(|m| (m.estimated_diameter_min + m.estimated_diameter_max) / 2.0)
            .or_else(|| {
                self.absolute_magnitude_h
                    .map(|h| diameter_from_absolute_magnitude(h, ASSUMED_ALBEDO))
            })
            .unwrap_or(DEFAULT_DIAMETER_M);

        let orbit_class = orbital_data
            .orbit_class
            .as_ref()
            .and_then(|c| c.orbit_class_type.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let density_kg_m3 = estimate_density(&orbit_class);

        let close_approaches: Vec<CloseApproach> = self
            .close_approach_data
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|ca| CloseApproach {
                date: ca.close_approach_date.clone().unwrap_or_default(),
                miss_distance_m: parse_number(
                    ca.miss_distance.as_ref().and_then(|m| m.kilometers.as_ref()),
                )
                .map(|km| km * 1000.0),
                velocity_m_s: parse_number(
                    ca.relative_velocity
                        .as_ref()
                        .and_then(|v| v.kilometers_per_second.as_ref()),
                )
                .map(|km_s| km_s * 1000.0),
                orbiting_body: ca
                    .orbiting_body
                    .clone()
                    .unwrap_or_else(|| "Earth".to_string()),
            })
            .collect();

        Ok(NeoRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            orbital_elements,
            estimated_diameter_m,
            density_kg_m3,
            estimated_mass_kg: sphere_mass(estimated_diameter_m, density_kg_m3),
            velocity_m_s: close_approaches.iter().find_map(|ca| ca.velocity_m_s),
            is_potentially_hazardous: self.is_potentially_hazardous_asteroid.unwrap_or(false),
            absolute_magnitude: self.absolute_magnitude_h,
            orbit_class,
            close_approaches,
        })
    }
}

impl FeedResponse {
    /// Records in date order. An object seen on several days is kept once.
    pub fn into_records(self) -> Vec<NeoRecord> {
        let mut days: Vec<(String, Vec<NeoObject>)> =
            self.near_earth_objects.unwrap_or_default().into_iter().collect();
        days.sort_by(|a, b| a.0.cmp(&b.0));

        let mut seen = HashSet::new();
        collect_records(
            days.into_iter()
                .flat_map(|(_, objects)| objects)
                .filter(|neo| seen.insert(neo.id.clone())),
        )
    }
}

/// Parse a NeoWs response body
fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    Ok(serde_json::from_str(body)?)
}

/// Keep usable records, log and drop the rest
fn collect_records(objects: impl IntoIterator<Item = NeoObject>) -> Vec<NeoRecord> {
    objects
        .into_iter()
        .filter_map(|neo| match neo.to_record() {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping NEO {}: {}", neo.id, e);
                None
            }
        })
        .collect()
}

// =============================================================================
// API CLIENT
// =============================================================================

pub struct NeoWsClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl NeoWsClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &SimulatorConfig) -> Result<Self, ApiError> {
        Self::new(
            config.api_key.clone(),
            config.neo_base_url.clone(),
            config.fetch_timeout(),
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, ApiError> {
        let separator = if path_and_query.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}{}{}api_key={}",
            self.base_url, path_and_query, separator, self.api_key
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        let body = response.text().await?;
        decode_body(&body)
    }

    /// Fetch NEOs that approach Earth in a date range
    pub async fn fetch_feed(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<NeoRecord>, ApiError> {
        let data: FeedResponse = self
            .get_json(&format!(
                "/feed?start_date={}&end_date={}",
                start_date.format("%Y-%m-%d"),
                end_date.format("%Y-%m-%d")
            ))
            .await?;

        Ok(data.into_records())
    }

    /// Browse all NEOs with pagination
    pub async fn browse(&self, page: i32, size: i32) -> Result<(Vec<NeoRecord>, i32), ApiError> {
        let data: BrowseResponse = self
            .get_json(&format!("/neo/browse?page={}&size={}", page, size))
            .await?;

        let total_pages = data.page.map(|p| p.total_pages).unwrap_or(1);
        Ok((collect_records(data.near_earth_objects), total_pages))
    }

    /// Fetch a specific NEO by ID
    pub async fn fetch_neo(&self, neo_id: &str) -> Result<NeoRecord, ApiError> {
        let neo: NeoObject = self.get_json(&format!("/neo/{}", neo_id)).await?;
        neo.to_record()
    }
}

// =============================================================================
// OFFLINE FALLBACK
// =============================================================================

fn fallback_record(
    id: &str,
    name: &str,
    elements: [f64; 6],
    diameter_m: f64,
    velocity_km_s: f64,
    density_kg_m3: f64,
) -> Option<NeoRecord> {
    let [a, e, i, node, peri, m] = elements;
    let orbital_elements = OrbitalElements::from_au_degrees(a, e, i, node, peri, m, J2000_JD).ok()?;
    Some(NeoRecord {
        id: id.to_string(),
        name: name.to_string(),
        orbital_elements,
        estimated_diameter_m: diameter_m,
        density_kg_m3,
        estimated_mass_kg: sphere_mass(diameter_m, density_kg_m3),
        velocity_m_s: Some(velocity_km_s * 1000.0),
        is_potentially_hazardous: true,
        absolute_magnitude: None,
        orbit_class: "APO".to_string(),
        close_approaches: Vec::new(),
    })
}

/// Built-in asteroids so the simulator keeps working offline.
pub fn fallback_asteroids() -> Vec<NeoRecord> {
    [
        fallback_record(
            "impactor-2025",
            "Impactor-2025",
            [1.05, 0.12, 2.0, 0.0, 0.0, 0.0],
            100.0,
            17.0,
            2600.0,
        ),
        fallback_record(
            "99942",
            "99942 Apophis",
            [0.9224, 0.1914, 3.339, 204.43, 126.6, 180.0],
            370.0,
            12.0,
            2600.0,
        ),
        fallback_record(
            "101955",
            "101955 Bennu",
            [1.126, 0.2037, 6.035, 2.06, 66.22, 101.7],
            500.0,
            10.0,
            1200.0,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

// =============================================================================
// CACHE MANAGER
// =============================================================================

pub struct CacheManager {
    asteroids: Arc<RwLock<Vec<NeoRecord>>>,
    last_fetch: Arc<RwLock<Option<Instant>>>,
    cache_duration: Duration,
}

impl CacheManager {
    pub fn new() -> Self {
        Self::with_duration(Duration::from_secs(3600)) // 1 hour cache
    }

    pub fn with_duration(cache_duration: Duration) -> Self {
        Self {
            asteroids: Arc::new(RwLock::new(Vec::new())),
            last_fetch: Arc::new(RwLock::new(None)),
            cache_duration,
        }
    }

    pub fn get_asteroids(&self) -> Vec<NeoRecord> {
        self.asteroids.read().clone()
    }

    pub fn find(&self, id: &str) -> Option<NeoRecord> {
        self.asteroids.read().iter().find(|a| a.id == id).cloned()
    }

    pub fn set_asteroids(&self, asteroids: Vec<NeoRecord>) {
        *self.asteroids.write() = asteroids;
        *self.last_fetch.write() = Some(Instant::now());
    }

    pub fn is_cache_valid(&self) -> bool {
        if let Some(last) = *self.last_fetch.read() {
            last.elapsed() < self.cache_duration
        } else {
            false
        }
    }

    pub fn asteroid_count(&self) -> usize {
        self.asteroids.read().len()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CATALOG (fetch + cache + fallback)
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    Live,
    Cached,
    Fallback,
}

pub struct NeoCatalog {
    client: NeoWsClient,
    cache: CacheManager,
    page_size: i32,
}

impl NeoCatalog {
    pub fn new(client: NeoWsClient, cache: CacheManager) -> Self {
        Self {
            client,
            cache,
            page_size: 20,
        }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Cached data if fresh, else the first browse page, else the built-in set.
    /// Fetch failures never propagate.
    pub async fn load_or_fallback(&self) -> (Vec<NeoRecord>, CatalogSource) {
        if self.cache.is_cache_valid() {
            return (self.cache.get_asteroids(), CatalogSource::Cached);
        }

        match self.client.browse(0, self.page_size).await {
            Ok((asteroids, _total_pages)) if !asteroids.is_empty() => {
                log::info!("Loaded {} NEOs from NeoWs", asteroids.len());
                self.cache.set_asteroids(asteroids.clone());
                (asteroids, CatalogSource::Live)
            }
            Ok(_) => {
                log::warn!("NeoWs returned no usable NEOs; using built-in asteroids");
                (fallback_asteroids(), CatalogSource::Fallback)
            }
            Err(e) => {
                log::warn!("NeoWs unavailable ({}); using built-in asteroids", e);
                (fallback_asteroids(), CatalogSource::Fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics_engine::AU;
    use approx::assert_relative_eq;

    const BROWSE_FIXTURE: &str = r#"{
        "links": {"self": "http://example/neo/browse?page=0&size=2"},
        "page": {"size": 2, "total_elements": 2, "total_pages": 1, "number": 0},
        "near_earth_objects": [
            {
                "id": "2000433",
                "name": "433 Eros (A898 PA)",
                "absolute_magnitude_h": 10.41,
                "estimated_diameter": {
                    "meters": {"estimated_diameter_min": 22000.0, "estimated_diameter_max": 50000.0}
                },
                "is_potentially_hazardous_asteroid": false,
                "close_approach_data": [
                    {
                        "close_approach_date": "1900-12-27",
                        "relative_velocity": {"kilometers_per_second": "5.5786191875"},
                        "miss_distance": {"kilometers": "47112732.928149391"},
                        "orbiting_body": "Earth"
                    }
                ],
                "orbital_data": {
                    "epoch_osculation": "2461000.5",
                    "eccentricity": ".2228359407071628",
                    "semi_major_axis": "1.458120998474684",
                    "inclination": "10.82846651399785",
                    "ascending_node_longitude": "304.2701025753316",
                    "perihelion_argument": "178.9297536744151",
                    "mean_anomaly": "310.5543277370992",
                    "orbit_class": {"orbit_class_type": "AMO"}
                }
            },
            {
                "id": "broken",
                "name": "No orbit",
                "orbital_data": {"eccentricity": "0.1"}
            }
        ]
    }"#;

    #[test]
    fn test_browse_fixture_converts_to_si() {
        let data: BrowseResponse = serde_json::from_str(BROWSE_FIXTURE).unwrap();
        let records = collect_records(data.near_earth_objects);
        assert_eq!(records.len(), 1);

        let eros = &records[0];
        let el = &eros.orbital_elements;
        assert_relative_eq!(el.semi_major_axis_m, 1.458120998474684 * AU, max_relative = 1e-15);
        assert_relative_eq!(el.eccentricity, 0.2228359407071628);
        assert_relative_eq!(el.inclination_rad, 10.82846651399785f64.to_radians());
        assert_eq!(el.epoch_jd, 2461000.5);
        assert_relative_eq!(eros.estimated_diameter_m, 36_000.0);
        assert_eq!(eros.density_kg_m3, asteroid_density::DEFAULT);
        assert_relative_eq!(eros.velocity_m_s.unwrap(), 5578.6191875, max_relative = 1e-12);
        assert_relative_eq!(
            eros.close_approaches[0].miss_distance_m.unwrap(),
            47112732.928149391 * 1000.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_missing_field_reported() {
        let data: BrowseResponse = serde_json::from_str(BROWSE_FIXTURE).unwrap();
        let err = data.near_earth_objects[1].to_record().unwrap_err();
        assert!(matches!(
            err,
            ApiError::MissingField { field: "semi_major_axis", .. }
        ));
    }

    #[test]
    fn test_unbound_orbit_rejected() {
        let mut data: BrowseResponse = serde_json::from_str(BROWSE_FIXTURE).unwrap();
        let neo = &mut data.near_earth_objects[0];
        if let Some(orbit) = neo.orbital_data.as_mut() {
            orbit.eccentricity = Some("1.2".to_string());
        }
        assert!(matches!(neo.to_record(), Err(ApiError::InvalidData(_))));
    }

    #[test]
    fn test_epoch_formats() {
        assert_eq!(parse_epoch_jd("2451545.0"), Some(2451545.0));
        assert_eq!(parse_epoch_jd("2000-01-01T12:00:00Z"), Some(2451545.0));
        assert_eq!(parse_epoch_jd("2000-01-01 12:00"), Some(2451545.0));
        assert_eq!(parse_epoch_jd("2000-01-01"), Some(2451544.5));
        assert_eq!(parse_epoch_jd("yesterday"), None);
    }

    #[test]
    fn test_diameter_from_magnitude_fallback() {
        // H = 22 at albedo 0.15 is roughly 140 m
        let d = diameter_from_absolute_magnitude(22.0, ASSUMED_ALBEDO);
        assert!((d - 136.5).abs() < 1.0, "got {}", d);

        let mut data: BrowseResponse = serde_json::from_str(BROWSE_FIXTURE).unwrap();
        let mut neo = data.near_earth_objects.remove(0);
        neo.estimated_diameter = None;
        let record = neo.to_record().unwrap();
        assert_relative_eq!(
            record.estimated_diameter_m,
            diameter_from_absolute_magnitude(10.41, ASSUMED_ALBEDO)
        );
    }

    #[test]
    fn test_density_estimates() {
        assert_eq!(estimate_density("APO"), 2000.0);
        assert_eq!(estimate_density("C"), 1700.0);
        assert_eq!(estimate_density("s"), 2700.0);
        assert_eq!(estimate_density("unknown"), 2000.0);
    }

    #[test]
    fn test_fallback_catalog_is_valid() {
        let fallback = fallback_asteroids();
        assert_eq!(fallback.len(), 3);
        assert_eq!(fallback[0].name, "Impactor-2025");
        for record in &fallback {
            assert!(record.orbital_elements.validate().is_ok());
            assert!(record.physical_params().validate().is_ok());
        }
        let apophis = &fallback[1];
        assert_relative_eq!(apophis.physical_params().radius_m, 185.0);
        assert_relative_eq!(apophis.physical_params().velocity_m_s, 12_000.0);
    }

    #[test]
    fn test_cache_validity() {
        let cache = CacheManager::with_duration(Duration::from_secs(60));
        assert!(!cache.is_cache_valid());
        cache.set_asteroids(fallback_asteroids());
        assert!(cache.is_cache_valid());
        assert_eq!(cache.asteroid_count(), 3);
        assert!(cache.find("101955").is_some());

        let expired = CacheManager::with_duration(Duration::ZERO);
        expired.set_asteroids(fallback_asteroids());
        assert!(!expired.is_cache_valid());
    }

    #[tokio::test]
    async fn test_unreachable_api_falls_back() {
        // Nothing listens on the discard port
        let client = NeoWsClient::new(
            "DEMO_KEY".to_string(),
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();
        let catalog = NeoCatalog::new(client, CacheManager::new());

        let (asteroids, source) = catalog.load_or_fallback().await;
        assert_eq!(source, CatalogSource::Fallback);
        assert_eq!(asteroids.len(), 3);
        assert_eq!(catalog.cache().asteroid_count(), 0);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_network() {
        let client = NeoWsClient::new(
            "DEMO_KEY".to_string(),
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();
        let cache = CacheManager::new();
        cache.set_asteroids(fallback_asteroids()[..1].to_vec());
        let catalog = NeoCatalog::new(client, cache);

        let (asteroids, source) = catalog.load_or_fallback().await;
        assert_eq!(source, CatalogSource::Cached);
        assert_eq!(asteroids.len(), 1);
    }
    const FEED_FIXTURE: &str = r#"{
        "links": {"self": "http://example/feed?start_date=2029-04-12&end_date=2029-04-13"},
        "element_count": 3,
        "near_earth_objects": {
            "2029-04-13": [
                {
                    "id": "2099942",
                    "name": "99942 Apophis (2004 MN4)",
                    "absolute_magnitude_h": 19.09,
                    "is_potentially_hazardous_asteroid": true,
                    "close_approach_data": [
                        {
                            "close_approach_date": "2029-04-13",
                            "relative_velocity": {"kilometers_per_second": "7.42"},
                            "miss_distance": {"kilometers": "38012.0"},
                            "orbiting_body": "Earth"
                        }
                    ],
                    "orbital_data": {
                        "epoch_osculation": "2461000.5",
                        "eccentricity": ".1911",
                        "semi_major_axis": ".9224",
                        "inclination": "3.339",
                        "ascending_node_longitude": "203.96",
                        "perihelion_argument": "126.65",
                        "mean_anomaly": "142.86",
                        "orbit_class": {"orbit_class_type": "ATE"}
                    }
                }
            ],
            "2029-04-12": [
                {
                    "id": "3000001",
                    "name": "(2029 AA)",
                    "absolute_magnitude_h": 24.0,
                    "orbital_data": {
                        "epoch_osculation": "2029-04-12",
                        "eccentricity": "0.3",
                        "semi_major_axis": "1.2",
                        "inclination": "5.0",
                        "ascending_node_longitude": "10.0",
                        "perihelion_argument": "20.0",
                        "mean_anomaly": "30.0"
                    }
                },
                {
                    "id": "2099942",
                    "name": "99942 Apophis (2004 MN4)",
                    "orbital_data": {
                        "epoch_osculation": "2461000.5",
                        "eccentricity": ".1911",
                        "semi_major_axis": ".9224",
                        "inclination": "3.339",
                        "ascending_node_longitude": "203.96",
                        "perihelion_argument": "126.65",
                        "mean_anomaly": "142.86"
                    }
                }
            ]
        }
    }"#;

    const LOOKUP_FIXTURE: &str = r#"{
        "id": "2101955",
        "name": "101955 Bennu (1999 RQ36)",
        "absolute_magnitude_h": 20.21,
        "estimated_diameter": {
            "meters": {"estimated_diameter_min": 480.0, "estimated_diameter_max": 500.0}
        },
        "is_potentially_hazardous_asteroid": true,
        "orbital_data": {
            "epoch_osculation": "2461000.5",
            "eccentricity": ".2037",
            "semi_major_axis": "1.1264",
            "inclination": "6.035",
            "ascending_node_longitude": "1.96",
            "perihelion_argument": "66.22",
            "mean_anomaly": "101.7",
            "orbit_class": {"orbit_class_type": "APO"}
        }
    }"#;

    #[test]
    fn test_feed_fixture_in_date_order_without_repeats() {
        let data: FeedResponse = decode_body(FEED_FIXTURE).unwrap();
        let records = data.into_records();

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["3000001", "2099942"]);

        let small = &records[0];
        assert_relative_eq!(small.orbital_elements.semi_major_axis_m, 1.2 * AU, max_relative = 1e-15);
        assert_eq!(small.orbital_elements.epoch_jd, parse_epoch_jd("2029-04-12").unwrap());
        assert_relative_eq!(
            small.estimated_diameter_m,
            diameter_from_absolute_magnitude(24.0, ASSUMED_ALBEDO)
        );
        assert!(!small.is_potentially_hazardous);

        // The earlier day's listing of a repeated object wins
        let apophis = &records[1];
        assert!(!apophis.is_potentially_hazardous);
        assert_eq!(apophis.velocity_m_s, None);
        assert_relative_eq!(apophis.orbital_elements.eccentricity, 0.1911);
    }

    #[test]
    fn test_empty_feed_has_no_records() {
        let data: FeedResponse = decode_body(r#"{"element_count": 0}"#).unwrap();
        assert!(data.into_records().is_empty());
    }

    #[test]
    fn test_lookup_fixture_converts_to_si() {
        let neo: NeoObject = decode_body(LOOKUP_FIXTURE).unwrap();
        let bennu = neo.to_record().unwrap();

        assert_eq!(bennu.id, "2101955");
        assert_relative_eq!(bennu.orbital_elements.semi_major_axis_m, 1.1264 * AU, max_relative = 1e-15);
        assert_relative_eq!(bennu.orbital_elements.inclination_rad, 6.035f64.to_radians());
        assert_relative_eq!(bennu.estimated_diameter_m, 490.0);
        assert_eq!(bennu.velocity_m_s, None);
        assert!(bennu.close_approaches.is_empty());
    }

    #[test]
    fn test_malformed_body_is_a_parse_error() {
        let result: Result<NeoObject, ApiError> = decode_body(r#"{"id": 7}"#);
        assert!(matches!(result, Err(ApiError::Parse(_))));
    }

    #[tokio::test]
    async fn test_unreachable_api_reports_errors() {
        let client = NeoWsClient::new(
            "DEMO_KEY".to_string(),
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();
        let day = NaiveDate::from_ymd_opt(2029, 4, 12).unwrap();

        assert!(client.fetch_feed(day, day).await.is_err());
        assert!(client.fetch_neo("2099942").await.is_err());
        assert!(client.browse(0, 20).await.is_err());
    }
}
