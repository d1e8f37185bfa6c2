//! Wire-level request/response shapes for the HTTP surface (spec §6).
//!
//! Kept separate from the domain types in `model`/`pathfinder`/`risk` so a
//! wire-format change never ripples into the search/scoring logic.

use crate::model::{RiskFactors, RiskScore};
use crate::pathfinder::{RouteResult, Segment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub from: String,
    pub to: String,
    pub date: Option<String>,
    pub passengers: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub routes: Vec<RouteDto>,
    pub alternatives: Vec<RouteDto>,
    pub execution_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct RouteDto {
    pub segments: Vec<Segment>,
    pub total_duration_minutes: f64,
    pub stop_sequence: Vec<String>,
}

impl From<&RouteResult> for RouteDto {
    fn from(route: &RouteResult) -> Self {
        RouteDto {
            segments: route.segments.clone(),
            total_duration_minutes: route.total_duration_minutes,
            stop_sequence: route.stop_sequence.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RiskAssessRequest {
    pub route_id: String,
    pub factors: RiskFactorsDto,
}

#[derive(Debug, Deserialize, Default)]
pub struct RiskFactorsDto {
    pub transfer_count: u32,
    pub average_delay_90_days: Option<f64>,
    pub cancellation_rate_90_days: Option<f64>,
    pub delay_frequency: Option<f64>,
    pub average_occupancy: Option<f64>,
}

impl From<RiskFactorsDto> for RiskFactors {
    fn from(dto: RiskFactorsDto) -> Self {
        RiskFactors {
            transfer_count: dto.transfer_count,
            average_delay_90_days: dto.average_delay_90_days,
            cancellation_rate_90_days: dto.cancellation_rate_90_days,
            delay_frequency: dto.delay_frequency,
            average_occupancy: dto.average_occupancy,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RiskAssessResponse {
    pub route_id: String,
    pub risk_score: RiskScore,
    pub factors: RiskFactors,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CitiesQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CitiesResponse {
    pub success: bool,
    pub data: Vec<String>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldErrorDto>>,
}

#[derive(Debug, Serialize)]
pub struct FieldErrorDto {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub graph: &'static str,
}
