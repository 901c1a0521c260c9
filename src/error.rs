// Error types shared across the engine
// Physics, NEO data source, dispatch transport and configuration failures

use thiserror::Error;

/// Failures raised by the pure computation core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    #[error("invalid orbital elements: {0}")]
    InvalidElements(String),

    #[error("state is not on a bound orbit (specific energy {energy:.6e} J/kg)")]
    UnboundOrbit { energy: f64 },

    #[error("invalid input `{field}`: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("result unavailable: `{0}` is not finite")]
    NonFinite(&'static str),
}

impl PhysicsError {
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

/// Failures talking to the NASA NeoWs service.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned status: {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("NEO {id} is missing usable orbital field `{field}`")]
    MissingField { id: String, field: &'static str },

    #[error("invalid NEO data: {0}")]
    InvalidData(#[from] PhysicsError),
}

/// Failures of the background computation transport.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("compute worker is not running")]
    Closed,

    #[error("compute request {id} timed out after {timeout_ms} ms")]
    Timeout { id: u64, timeout_ms: u64 },

    #[error("compute request failed: {0}")]
    Worker(String),

    #[error("malformed request: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("environment variable {key} has invalid value {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;
