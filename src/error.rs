//! Error taxonomy.
//!
//! Leaves only ever propagate their own kind (spec §7): transient-external
//! and quality failures are absorbed by the orchestrator, graph invariant
//! violations and not-found cases reach the controller layer and are
//! mapped to HTTP status codes there.

use thiserror::Error;

/// Errors a data-source provider can raise. Caught by the orchestrator and
/// turned into a fallback decision; never surfaces past it.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connection error contacting remote catalog: {0}")]
    Connection(String),
    #[error("timed out contacting remote catalog after {0:?}")]
    Timeout(std::time::Duration),
    #[error("remote catalog returned invalid data: {0}")]
    Invalid(String),
}

/// Errors the graph can raise on a mutation that would violate an invariant.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum InvalidEdge {
    #[error("edge endpoint `{0}` is not a known node")]
    UnknownEndpoint(String),
    #[error("edge weight must be a finite number > 0, got {0}")]
    NonPositiveWeight(String),
    #[error("self-loop rejected for node `{0}`")]
    SelfLoop(String),
}

/// Failure kinds a path-finder call can return, matching spec §4.8/§7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("No stops found for city: {0}")]
    StopsNotFound(String),
    #[error("stops for `{from}`/`{to}` are registered in the catalog but missing from the live graph (out of sync)")]
    GraphOutOfSync { from: String, to: String },
    #[error("no route found between `{from}` and `{to}`")]
    RoutesNotFound { from: String, to: String },
    #[error("graph failed invariant validation: {0}")]
    GraphInvalid(String),
    #[error("graph is not available")]
    GraphUnavailable,
}

impl SearchError {
    /// The stable error code used on the HTTP boundary (§6 error shape).
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::StopsNotFound(_) => "STOPS_NOT_FOUND",
            SearchError::GraphOutOfSync { .. } => "GRAPH_OUT_OF_SYNC",
            SearchError::RoutesNotFound { .. } => "ROUTES_NOT_FOUND",
            SearchError::GraphInvalid(_) => "GRAPH_INVALID",
            SearchError::GraphUnavailable => "GRAPH_UNAVAILABLE",
        }
    }
}

/// Errors surfaced by graph-manager lifecycle operations.
#[derive(Debug, Error, Clone)]
pub enum ManagerError {
    #[error("initialization failed: {0}")]
    InitFailed(String),
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// A single field-level validation failure, per §6's `{path, message}` shape.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

/// 400-class input validation failure at the HTTP boundary.
#[derive(Debug, Error)]
#[error("validation failed: {0:?}")]
pub struct ValidationError(pub Vec<FieldError>);

impl ValidationError {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError(vec![FieldError {
            path: path.into(),
            message: message.into(),
        }])
    }
}
