//! Typed failures for each collaborator and for a controller tick

use thiserror::Error;

/// Boxed underlying cause, so mock implementations need not fake client errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Invalid startup configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid replica bounds [{min}, {max}]: {reason}")]
    InvalidBounds {
        min: u32,
        max: u32,
        reason: &'static str,
    },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("invalid URL for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Why a metrics query produced no value
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("metrics backend returned HTTP {0}")]
    Status(u16),

    #[error("metrics query reported status {0:?}")]
    QueryFailed(String),

    #[error("metrics query returned no samples")]
    EmptyResult,

    #[error("metrics sample {0:?} is not a usable number")]
    NotNumeric(String),
}

/// Failure talking to the orchestration API
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("failed to establish orchestration session: {0}")]
    Session(#[source] BoxError),

    #[error("failed to read {target}: {source}")]
    Read {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to patch {target}: {source}")]
    Write {
        target: String,
        #[source]
        source: BoxError,
    },
}

/// The decision oracle could not be consulted
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle endpoint is not configured")]
    MissingEndpoint,

    #[error("oracle API key is not configured")]
    MissingCredentials,

    #[error("oracle request timed out")]
    Timeout,

    #[error("oracle request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OracleError::Timeout
        } else {
            OracleError::Transport(err)
        }
    }
}

/// Failure that ends a single controller tick
#[derive(Debug, Error)]
pub enum TickError {
    #[error("could not read workload: {0}")]
    OrchestrationRead(#[source] OrchestrationError),

    #[error("decision oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),

    #[error("actuation failed: {0}")]
    OrchestrationWrite(#[source] OrchestrationError),
}

impl TickError {
    /// Classify a failed actuation; a read made while preparing the patch
    /// stays a read failure
    pub fn from_actuation(error: OrchestrationError) -> Self {
        match error {
            OrchestrationError::Read { .. } => TickError::OrchestrationRead(error),
            other => TickError::OrchestrationWrite(other),
        }
    }

    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            TickError::OrchestrationRead(_) => "orchestration_read",
            TickError::OracleUnavailable(_) => "oracle_unavailable",
            TickError::OrchestrationWrite(_) => "orchestration_write",
        }
    }
}
