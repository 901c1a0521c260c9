// State Manager - Application state and background computation dispatch
// Requests travel as {type, payload, id}; responses are routed back by id

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::api_client::{CacheManager, NeoCatalog, NeoWsClient};
use crate::config::SimulatorConfig;
use crate::deflection::{
    apply_delta_v, evaluate_deflection, BurnDirection, DeflectionParams, DeflectionResult,
    EccentricityUpdate,
};
use crate::error::{ApiError, DispatchError, PhysicsError, PhysicsResult};
use crate::impact_effects::{compute_effects, AsteroidPhysicalParams, ImpactEffects};
use crate::overpressure::{overpressure_profile, OverpressureProfile};
use crate::physics_engine::{GeoLocation, KeplerSettings, OrbitalElements};
use crate::trajectory::{
    check_collision, monte_carlo_impact_probability, CircularEarthOrbit, CollisionReport,
    ElementUncertainty, MonteCarloResult, MonteCarloSettings, Sampling, TrajectoryPoint,
    TrajectorySampler,
};
use crate::tsunami::{simulate_tsunami, TsunamiResult, TsunamiSettings};

// =============================================================================
// OPERATIONS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagateRequest {
    pub elements: OrbitalElements,
    pub start_jd: f64,
    pub end_jd: f64,
    pub sampling: Sampling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaVRequest {
    pub elements: OrbitalElements,
    pub delta_v_m_s: f64,
    pub direction: BurnDirection,
    pub burn_jd: f64,
    #[serde(default)]
    pub eccentricity_update: EccentricityUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactRequest {
    pub params: AsteroidPhysicalParams,
    pub location: GeoLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub scenarios: Vec<ImpactRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeflectionRequest {
    pub elements: OrbitalElements,
    pub params: DeflectionParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionRequest {
    pub elements: OrbitalElements,
    pub start_jd: f64,
    pub end_jd: f64,
    pub sampling: Sampling,
    /// Falls back to the configured threshold
    pub threshold_m: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverpressureRequest {
    pub energy_j: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TsunamiRequest {
    pub location: GeoLocation,
    pub energy_j: f64,
    pub crater_diameter_m: f64,
    pub water_depth_m: f64,
    pub impact_angle_deg: f64,
    #[serde(default)]
    pub settings: TsunamiSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilityRequest {
    pub elements: OrbitalElements,
    pub uncertainty: ElementUncertainty,
    pub settings: MonteCarloSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Operation {
    PropagateOrbit(PropagateRequest),
    ApplyDeltaV(DeltaVRequest),
    RecalculateImpact(ImpactRequest),
    BatchCalculate(BatchRequest),
    AnalyzeDeflection(DeflectionRequest),
    CheckCollision(CollisionRequest),
    OverpressureProfile(OverpressureRequest),
    SimulateTsunami(TsunamiRequest),
    ImpactProbability(ProbabilityRequest),
}

impl Operation {
    pub fn type_name(&self) -> &'static str {
        match self {
            Operation::PropagateOrbit(_) => "propagate_orbit",
            Operation::ApplyDeltaV(_) => "apply_delta_v",
            Operation::RecalculateImpact(_) => "recalculate_impact",
            Operation::BatchCalculate(_) => "batch_calculate",
            Operation::AnalyzeDeflection(_) => "analyze_deflection",
            Operation::CheckCollision(_) => "check_collision",
            Operation::OverpressureProfile(_) => "overpressure_profile",
            Operation::SimulateTsunami(_) => "simulate_tsunami",
            Operation::ImpactProbability(_) => "impact_probability",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchItem {
    pub index: usize,
    pub effects: Option<ImpactEffects>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum OperationOutput {
    Trajectory(Vec<TrajectoryPoint>),
    Elements(OrbitalElements),
    Impact(ImpactEffects),
    Batch(Vec<BatchItem>),
    Deflection(DeflectionResult),
    Collision(CollisionReport),
    Overpressure(OverpressureProfile),
    Tsunami(TsunamiResult),
    Probability(MonteCarloResult),
}

/// Settings every computation reads; copied into each worker task.
#[derive(Debug, Clone, Copy)]
pub struct ComputeContext {
    pub kepler: KeplerSettings,
    pub collision_threshold_m: f64,
}

impl ComputeContext {
    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self {
            kepler: config.kepler,
            collision_threshold_m: config.collision_threshold_m(),
        }
    }
}

impl Default for ComputeContext {
    fn default() -> Self {
        Self::from_config(&SimulatorConfig::default())
    }
}

fn check_finite(values: &[(&'static str, f64)]) -> PhysicsResult<()> {
    match values.iter().find(|(_, v)| !v.is_finite()) {
        Some((name, _)) => Err(PhysicsError::NonFinite(*name)),
        None => Ok(()),
    }
}

fn check_effects(effects: &ImpactEffects) -> PhysicsResult<()> {
    check_finite(&[
        ("mass_kg", effects.mass_kg),
        ("kinetic_energy_j", effects.kinetic_energy_j),
        ("crater_diameter_m", effects.crater_diameter_m),
        ("blast_radius_km", effects.blast_radius_km),
        ("thermal_radius_km", effects.thermal_radius_km),
        ("seismic_radius_km", effects.seismic_radius_km),
        ("earthquake_magnitude", effects.earthquake_magnitude),
    ])
}

fn check_tsunami(result: &TsunamiResult) -> PhysicsResult<()> {
    check_finite(&[
        ("initial_wave_height_m", result.initial_wave_height_m),
        ("wave_speed_m_s", result.wave_speed_m_s),
        ("tsunami_energy_j", result.tsunami_energy_j),
    ])?;
    for point in &result.profile {
        check_finite(&[
            ("profile.arrival_time_min", point.arrival_time_min),
            ("profile.wave_height_m", point.wave_height_m),
            ("profile.runup_m", point.runup_m),
            ("profile.inundation_m", point.inundation_m),
        ])?;
    }
    for coast in &result.affected_coasts {
        check_finite(&[
            ("affected_coasts.distance_km", coast.distance_km),
            ("affected_coasts.arrival_time_min", coast.arrival_time_min),
            ("affected_coasts.wave_height_m", coast.wave_height_m),
            ("affected_coasts.runup_m", coast.runup_m),
        ])?;
    }
    Ok(())
}

impl OperationOutput {
    /// NaN/Infinity never reaches the caller as a number
    fn ensure_finite(&self) -> PhysicsResult<()> {
        match self {
            OperationOutput::Trajectory(points) => {
                if points.iter().all(|p| p.position.is_finite() && p.velocity.is_finite()) {
                    Ok(())
                } else {
                    Err(PhysicsError::NonFinite("trajectory"))
                }
            }
            OperationOutput::Elements(elements) => elements
                .validate()
                .map_err(|_| PhysicsError::NonFinite("elements")),
            OperationOutput::Impact(effects) => check_effects(effects),
            // Per-scenario failures are already reported inside the batch
            OperationOutput::Batch(_) => Ok(()),
            OperationOutput::Deflection(result) => check_finite(&[
                ("deflection_distance_km", result.deflection_distance_km),
                ("semi_major_axis_m", result.new_elements.semi_major_axis_m),
                ("eccentricity", result.new_elements.eccentricity),
            ]),
            OperationOutput::Collision(report) => {
                check_finite(&[("closest_approach_m", report.closest_approach_m)])
            }
            OperationOutput::Overpressure(profile) => check_finite(&[
                ("tnt_kg", profile.tnt_kg),
                ("psi_0_5_m", profile.critical_radii.psi_0_5_m),
                ("second_degree_burn_m", profile.thermal.second_degree_burn_m),
            ]),
            OperationOutput::Tsunami(result) => check_tsunami(result),
            OperationOutput::Probability(result) => check_finite(&[
                ("impact_probability", result.impact_probability),
                ("mean_miss_km", result.mean_miss_km),
            ]),
        }
    }
}

/// Run one operation synchronously on the calling thread.
pub fn compute(operation: &Operation, ctx: &ComputeContext) -> PhysicsResult<OperationOutput> {
    let output = match operation {
        Operation::PropagateOrbit(req) => OperationOutput::Trajectory(
            TrajectorySampler::new(req.elements, req.start_jd, req.end_jd, req.sampling)?
                .with_kepler_settings(ctx.kepler)
                .collect_points(),
        ),
        Operation::ApplyDeltaV(req) => OperationOutput::Elements(apply_delta_v(
            &req.elements,
            req.delta_v_m_s,
            req.direction,
            req.burn_jd,
            req.eccentricity_update,
        )?),
        Operation::RecalculateImpact(req) => {
            OperationOutput::Impact(compute_effects(&req.params, req.location)?)
        }
        Operation::BatchCalculate(req) => OperationOutput::Batch(
            req.scenarios
                .iter()
                .enumerate()
                .map(|(index, scenario)| {
                    match compute_effects(&scenario.params, scenario.location)
                        .and_then(|e| check_effects(&e).map(|_| e))
                    {
                        Ok(effects) => BatchItem {
                            index,
                            effects: Some(effects),
                            error: None,
                        },
                        Err(e) => BatchItem {
                            index,
                            effects: None,
                            error: Some(e.to_string()),
                        },
                    }
                })
                .collect(),
        ),
        Operation::AnalyzeDeflection(req) => {
            OperationOutput::Deflection(evaluate_deflection(&req.elements, &req.params)?)
        }
        Operation::CheckCollision(req) => {
            let points = TrajectorySampler::new(req.elements, req.start_jd, req.end_jd, req.sampling)?
                .with_kepler_settings(ctx.kepler)
                .collect_points();
            let threshold = req.threshold_m.unwrap_or(ctx.collision_threshold_m);
            OperationOutput::Collision(check_collision(
                &points,
                &CircularEarthOrbit::default(),
                threshold,
            )?)
        }
        Operation::OverpressureProfile(req) => {
            OperationOutput::Overpressure(overpressure_profile(req.energy_j)?)
        }
        Operation::SimulateTsunami(req) => OperationOutput::Tsunami(simulate_tsunami(
            req.location,
            req.energy_j,
            req.crater_diameter_m,
            req.water_depth_m,
            req.impact_angle_deg,
            &req.settings,
        )?),
        Operation::ImpactProbability(req) => {
            OperationOutput::Probability(monte_carlo_impact_probability(
                &req.elements,
                &req.uncertainty,
                &req.settings,
                &CircularEarthOrbit::default(),
            )?)
        }
    };

    output.ensure_finite()?;
    Ok(output)
}

// =============================================================================
// WIRE MESSAGES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerRequest {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub payload: Value,
    pub id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerResponse {
    #[serde(rename = "type")]
    pub op_type: String,
    pub payload: Value,
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerRequest {
    pub fn new(id: u64, operation: &Operation) -> Result<Self, DispatchError> {
        let mut encoded =
            serde_json::to_value(operation).map_err(|e| DispatchError::Malformed(e.to_string()))?;
        let payload = encoded.get_mut("payload").map(Value::take).unwrap_or(Value::Null);
        Ok(Self {
            op_type: operation.type_name().to_string(),
            payload,
            id,
        })
    }

    pub fn operation(&self) -> Result<Operation, DispatchError> {
        let tagged = serde_json::json!({ "type": self.op_type, "payload": self.payload });
        serde_json::from_value(tagged)
            .map_err(|e| DispatchError::Malformed(format!("{} request: {}", self.op_type, e)))
    }
}

impl WorkerResponse {
    pub fn failure(id: u64, op_type: &str, error: impl Into<String>) -> Self {
        Self {
            op_type: op_type.to_string(),
            payload: Value::Null,
            id,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Decode, compute and encode one request. Never panics on bad input.
pub fn handle_request(request: &WorkerRequest, ctx: &ComputeContext) -> WorkerResponse {
    let operation = match request.operation() {
        Ok(op) => op,
        Err(e) => return WorkerResponse::failure(request.id, &request.op_type, e.to_string()),
    };

    match compute(&operation, ctx) {
        Ok(output) => match serde_json::to_value(&output) {
            Ok(payload) => WorkerResponse {
                op_type: request.op_type.clone(),
                payload,
                id: request.id,
                error: None,
            },
            Err(e) => WorkerResponse::failure(request.id, &request.op_type, e.to_string()),
        },
        Err(e) => {
            log::debug!("Request {} ({}) failed: {}", request.id, request.op_type, e);
            WorkerResponse::failure(request.id, &request.op_type, e.to_string())
        }
    }
}

// =============================================================================
// COMPUTE DISPATCHER (background worker)
// =============================================================================

// Keyed by a dispatcher-issued ticket, never by the caller's id
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<WorkerResponse>>>>;
type Job = (u64, WorkerRequest);

pub struct ComputeDispatcher {
    ctx: ComputeContext,
    timeout: Duration,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pending: PendingMap,
    next_id: AtomicU64,
    next_ticket: AtomicU64,
}

impl ComputeDispatcher {
    pub fn new(ctx: ComputeContext, timeout: Duration) -> Self {
        Self {
            ctx,
            timeout,
            sender: Mutex::new(None),
            worker: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Spawn the worker loop on the current Tokio runtime.
    pub fn start(&self) -> Result<(), DispatchError> {
        let mut sender_slot = self.sender.lock();
        if sender_slot.is_some() {
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DispatchError::Worker(format!("no async runtime: {}", e)))?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let pending = Arc::clone(&self.pending);
        let ctx = self.ctx;

        let handle = runtime.spawn(async move {
            while let Some((ticket, request)) = rx.recv().await {
                let pending = Arc::clone(&pending);
                tokio::spawn(async move {
                    let id = request.id;
                    let op_type = request.op_type.clone();
                    let response =
                        match tokio::task::spawn_blocking(move || handle_request(&request, &ctx))
                            .await
                        {
                            Ok(response) => response,
                            Err(e) => WorkerResponse::failure(
                                id,
                                &op_type,
                                format!("compute task failed: {}", e),
                            ),
                        };
                    deliver(&pending, ticket, response);
                });
            }
            log::debug!("Compute worker stopped");
        });

        *sender_slot = Some(tx);
        *self.worker.lock() = Some(handle);
        log::info!("Compute worker started (timeout {} ms)", self.timeout.as_millis());
        Ok(())
    }

    /// Stop accepting work; in-flight callers see their request fail.
    pub fn shutdown(&self) {
        if self.sender.lock().take().is_none() {
            return;
        }
        let dropped = {
            let mut pending = self.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };
        if let Some(handle) = self.worker.lock().take() {
            handle.abort();
        }
        log::info!("Compute worker shut down ({} pending requests dropped)", dropped);
    }

    /// Send to the worker and wait at most the configured timeout.
    pub async fn submit(&self, request: WorkerRequest) -> Result<WorkerResponse, DispatchError> {
        let id = request.id;
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(ticket, tx);

        let sent = match self.sender.lock().as_ref() {
            Some(sender) => sender.send((ticket, request)).is_ok(),
            None => false,
        };
        if !sent {
            self.pending.lock().remove(&ticket);
            return Err(DispatchError::Closed);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(DispatchError::Worker(format!(
                "request {} was abandoned by the worker",
                id
            ))),
            Err(_) => {
                self.pending.lock().remove(&ticket);
                Err(DispatchError::Timeout {
                    id,
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Like `submit`, but any transport failure runs the computation inline.
    pub async fn execute(&self, request: WorkerRequest) -> WorkerResponse {
        match self.submit(request.clone()).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!(
                    "Worker dispatch failed for request {} ({}): {}; computing inline",
                    request.id,
                    request.op_type,
                    e
                );
                handle_request(&request, &self.ctx)
            }
        }
    }

    pub async fn execute_operation(&self, operation: &Operation) -> WorkerResponse {
        let id = self.next_request_id();
        match WorkerRequest::new(id, operation) {
            Ok(request) => self.execute(request).await,
            Err(e) => WorkerResponse::failure(id, operation.type_name(), e.to_string()),
        }
    }

    /// JSON in, JSON out.
    pub async fn handle_json(&self, raw: &str) -> String {
        let response = match serde_json::from_str::<WorkerRequest>(raw) {
            Ok(request) => self.execute(request).await,
            Err(e) => WorkerResponse::failure(
                0,
                "error",
                DispatchError::Malformed(e.to_string()).to_string(),
            ),
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","payload":null,"id":{},"error":"{}"}}"#,
                response.id, e
            )
        })
    }
}

impl Drop for ComputeDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn deliver(pending: &PendingMap, ticket: u64, response: WorkerResponse) {
    let waiter = pending.lock().remove(&ticket);
    match waiter {
        Some(tx) => {
            if tx.send(response).is_err() {
                log::debug!("Caller went away before its response arrived");
            }
        }
        None => log::debug!("Discarding stale response for request {}", response.id),
    }
}

// =============================================================================
// GLOBAL STATE
// =============================================================================

/// Composition root: owns configuration, the dispatcher and the NEO catalog.
pub struct AppState {
    pub config: SimulatorConfig,
    pub dispatcher: Arc<ComputeDispatcher>,
    pub catalog: Arc<NeoCatalog>,
    pub is_running: Arc<RwLock<bool>>,
}

impl AppState {
    pub fn new(config: SimulatorConfig) -> Result<Self, ApiError> {
        let client = NeoWsClient::from_config(&config)?;
        let dispatcher = ComputeDispatcher::new(
            ComputeContext::from_config(&config),
            config.worker_timeout(),
        );

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            catalog: Arc::new(NeoCatalog::new(client, CacheManager::new())),
            config,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    pub fn start(&self) -> Result<(), DispatchError> {
        self.dispatcher.start()?;
        *self.is_running.write() = true;
        Ok(())
    }

    pub fn shutdown(&self) {
        self.dispatcher.shutdown();
        *self.is_running.write() = false;
    }
}
