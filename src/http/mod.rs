//! Thin HTTP controller (spec §6 "External interfaces").
//!
//! Axum routes map 1:1 onto the documented surface; all search/risk/graph
//! logic lives in `pathfinder`, `risk`, and `manager` respectively. Every
//! error response follows `{error:{code,message,details?}}`.

pub mod dto;

use crate::error::{ManagerError, SearchError, ValidationError};
use crate::manager::{GraphManager, ManagerState};
use crate::observability::Metrics;
use crate::risk;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use dto::*;
use std::sync::Arc;

pub struct AppState {
    pub manager: Arc<GraphManager>,
    pub metrics: Arc<Metrics>,
    pub search_k_alternatives: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/routes/search", get(search_routes))
        .route("/api/v1/routes/risk/assess", post(assess_risk))
        .route("/api/v1/cities", get(list_cities))
        .route("/health", get(health))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .with_state(state)
}

async fn search_routes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    if query.from.trim().is_empty() {
        return Err(ApiError::Validation(ValidationError::single("from", "must not be empty")));
    }
    if query.to.trim().is_empty() {
        return Err(ApiError::Validation(ValidationError::single("to", "must not be empty")));
    }
    if let Some(passengers) = query.passengers {
        if !(1..=9).contains(&passengers) {
            return Err(ApiError::Validation(ValidationError::single("passengers", "must be between 1 and 9")));
        }
    }

    let date = parse_date(query.date.as_deref())?;

    let outcome = state.manager.search(&query.from, &query.to, date, state.search_k_alternatives).await?;
    if let Some(error) = outcome.error {
        return Err(ApiError::Search(error));
    }

    state.metrics.record_search_duration_ms(outcome.execution_time_ms);

    Ok(Json(SearchResponse {
        success: outcome.success,
        routes: outcome.routes.iter().map(RouteDto::from).collect(),
        alternatives: outcome.alternatives.iter().map(RouteDto::from).collect(),
        execution_time_ms: outcome.execution_time_ms,
    }))
}

fn parse_date(raw: Option<&str>) -> Result<DateTime<Utc>, ApiError> {
    match raw {
        None => Ok(Utc::now()),
        Some(s) => {
            let naive = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| ApiError::Validation(ValidationError::single("date", "must be YYYY-MM-DD")))?;
            let ndt = naive
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| ApiError::Validation(ValidationError::single("date", "must be YYYY-MM-DD")))?;
            Utc.from_local_datetime(&ndt)
                .single()
                .ok_or_else(|| ApiError::Validation(ValidationError::single("date", "must be YYYY-MM-DD")))
        }
    }
}

async fn assess_risk(
    State(_state): State<Arc<AppState>>,
    Json(request): Json<RiskAssessRequest>,
) -> Result<Json<RiskAssessResponse>, ApiError> {
    if request.route_id.trim().is_empty() {
        return Err(ApiError::Validation(ValidationError::single("route_id", "must not be empty")));
    }

    let assessment = risk::assess(request.route_id, request.factors.into());

    Ok(Json(RiskAssessResponse {
        route_id: assessment.route_id,
        risk_score: assessment.risk_score,
        factors: assessment.factors,
        recommendations: assessment.recommendations,
    }))
}

async fn list_cities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CitiesQuery>,
) -> Result<Json<CitiesResponse>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(50).min(100);
    if query.limit.map(|l| l > 100).unwrap_or(false) {
        return Err(ApiError::Validation(ValidationError::single("limit", "must be <= 100")));
    }

    let graph = state.manager.get_graph().await?;
    let cities = graph.list_cities();
    let total = cities.len();
    let start = (page - 1) * limit;
    let page_slice = cities.into_iter().skip(start).take(limit).collect();

    Ok(Json(CitiesResponse { success: true, data: page_slice, pagination: Pagination { page, limit, total } }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (manager_state, _stats) = state.manager.stats().await;
    Json(HealthResponse {
        status: if manager_state == ManagerState::Ready { "ok" } else { "degraded" },
        graph: graph_state_label(manager_state),
    })
}

fn graph_state_label(state: ManagerState) -> &'static str {
    match state {
        ManagerState::Uninitialized => "uninitialized",
        ManagerState::Initializing => "initializing",
        ManagerState::Ready => "ready",
        ManagerState::Stale => "stale",
    }
}

async fn health_live() -> StatusCode {
    StatusCode::OK
}

async fn health_ready(State(state): State<Arc<AppState>>) -> StatusCode {
    let (manager_state, _stats) = state.manager.stats().await;
    if manager_state == ManagerState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// HTTP-boundary error wrapper; maps domain errors onto spec §6/§7's status
/// codes and `{error:{code,message,details?}}` body.
enum ApiError {
    Validation(ValidationError),
    Search(SearchError),
    Manager(ManagerError),
}

impl From<ManagerError> for ApiError {
    fn from(e: ManagerError) -> Self {
        ApiError::Manager(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ApiError::Validation(ValidationError(fields)) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR".to_string(),
                "request failed validation".to_string(),
                Some(fields.into_iter().map(|f| FieldErrorDto { path: f.path, message: f.message }).collect()),
            ),
            ApiError::Search(e) => (status_for_search_error(&e), e.code().to_string(), e.to_string(), None),
            ApiError::Manager(ManagerError::Search(e)) => {
                (status_for_search_error(&e), e.code().to_string(), e.to_string(), None)
            }
            ApiError::Manager(ManagerError::InitFailed(message)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "GRAPH_UNAVAILABLE".to_string(), message, None)
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message, details } })).into_response()
    }
}

fn status_for_search_error(e: &SearchError) -> StatusCode {
    match e {
        SearchError::StopsNotFound(_) | SearchError::RoutesNotFound { .. } => StatusCode::NOT_FOUND,
        SearchError::GraphInvalid(_) | SearchError::GraphUnavailable | SearchError::GraphOutOfSync { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
