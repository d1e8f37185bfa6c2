//! Risk scorer (C9, spec §4.9).
//!
//! A pure additive function of a reconstructed route and optional
//! historical factors. Grounded on the teacher's `ConstraintResult`
//! vocabulary (`constraint_id`/threshold-driven `message`) from
//! `constraints/mod.rs`, generalized from pass/fail gates into one
//! continuous score with threshold-triggered recommendations.

use crate::model::{RiskAssessment, RiskFactors, RiskLevel, RiskScore};
use crate::pathfinder::RouteResult;

/// Computes `transferCount` from a reconstructed route: the number of
/// transitions between collapsed segments.
pub fn transfer_count(route: &RouteResult) -> u32 {
    route.segments.len().saturating_sub(1) as u32
}

/// Scores a route, spec §4.9's additive formula. `factors.transfer_count`
/// is expected to already be populated, typically via `transfer_count()`.
pub fn assess(route_id: impl Into<String>, factors: RiskFactors) -> RiskAssessment {
    let mut value = 1.0;
    value += factors.transfer_count as f64 * 0.8;

    if let Some(avg_delay) = factors.average_delay_90_days {
        value += (avg_delay / 20.0).min(3.0);
    }
    if let Some(frequency) = factors.delay_frequency {
        value += frequency * 2.0;
    }
    if let Some(cancellation) = factors.cancellation_rate_90_days {
        value += cancellation * 3.0;
    }
    if let Some(occupancy) = factors.average_occupancy {
        if occupancy > 0.9 {
            value += 1.0;
        }
    }

    let value = (value.clamp(1.0, 10.0) * 10.0).round() / 10.0;
    let level = level_for(value);
    let description = description_for(level);
    let recommendations = recommendations_for(&factors, value);

    RiskAssessment {
        route_id: route_id.into(),
        risk_score: RiskScore { value, level, description },
        factors,
        recommendations,
    }
}

fn level_for(value: f64) -> RiskLevel {
    if value <= 2.0 {
        RiskLevel::VeryLow
    } else if value <= 4.0 {
        RiskLevel::Low
    } else if value <= 6.0 {
        RiskLevel::Medium
    } else if value <= 8.0 {
        RiskLevel::High
    } else {
        RiskLevel::VeryHigh
    }
}

fn description_for(level: RiskLevel) -> String {
    match level {
        RiskLevel::VeryLow => "Very low risk: this route has a strong on-time history and few transfers.".to_string(),
        RiskLevel::Low => "Low risk: minor disruptions are possible but unlikely to affect the trip.".to_string(),
        RiskLevel::Medium => "Medium risk: plan for some buffer time around transfers.".to_string(),
        RiskLevel::High => "High risk: delays or cancellations have affected this route recently.".to_string(),
        RiskLevel::VeryHigh => "Very high risk: this route has a poor reliability record, consider an alternative.".to_string(),
    }
}

fn recommendations_for(factors: &RiskFactors, value: f64) -> Vec<String> {
    let mut out = Vec::new();
    if factors.transfer_count >= 2 {
        out.push("Consider fewer transfers if an alternative route is available.".to_string());
    }
    if factors.cancellation_rate_90_days.unwrap_or(0.0) > 0.1 {
        out.push("This route has a notable cancellation history; check for a backup option.".to_string());
    }
    if factors.average_delay_90_days.unwrap_or(0.0) > 30.0 {
        out.push("Typical delays exceed 30 minutes; build in extra buffer time.".to_string());
    }
    if factors.average_occupancy.unwrap_or(0.0) > 0.9 {
        out.push("This route runs near capacity; book seats in advance.".to_string());
    }
    if value >= 8.0 {
        out.push("Overall risk is high; review alternatives before booking.".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinder::{RouteResult, Segment};
    use chrono::Utc;

    fn dummy_route(segment_count: usize) -> RouteResult {
        let segments = (0..segment_count)
            .map(|i| Segment {
                segment_id: format!("segment-{i}"),
                from: format!("stop-{i}"),
                to: format!("stop-{}", i + 1),
                transport_type: "bus",
                departure_time: Utc::now(),
                arrival_time: Utc::now(),
                duration_minutes: 60.0,
                route_id: Some("r1".to_string()),
                flight_id: None,
            })
            .collect();
        RouteResult { segments, total_duration_minutes: 60.0 * segment_count as f64, stop_sequence: Vec::new() }
    }

    #[test]
    fn base_score_with_no_factors_is_floor() {
        let assessment = assess("r1", RiskFactors::default());
        assert_eq!(assessment.risk_score.value, 1.0);
        assert_eq!(assessment.risk_score.level, RiskLevel::VeryLow);
    }

    #[test]
    fn transfers_and_cancellations_push_score_up() {
        let route = dummy_route(3);
        let factors = RiskFactors {
            transfer_count: transfer_count(&route),
            cancellation_rate_90_days: Some(0.3),
            ..RiskFactors::default()
        };
        let assessment = assess("r1", factors);
        assert!(assessment.risk_score.value > 1.0);
        assert!(assessment.recommendations.iter().any(|r| r.contains("transfers")));
    }

    #[test]
    fn score_clamps_at_ten() {
        let factors = RiskFactors {
            transfer_count: 20,
            average_delay_90_days: Some(200.0),
            delay_frequency: Some(5.0),
            cancellation_rate_90_days: Some(1.0),
            average_occupancy: Some(0.95),
        };
        let assessment = assess("r1", factors);
        assert_eq!(assessment.risk_score.value, 10.0);
        assert_eq!(assessment.risk_score.level, RiskLevel::VeryHigh);
    }
}
