//! Quality validator (C1, spec §4.1).
//!
//! Pure, side-effect-free: a `QualityReport` is a pure function of a
//! `Dataset`. Never fails — an empty dataset yields zero scores, not an
//! error, per the failure model.

use crate::config::Config;
use crate::model::{Dataset, DatasetMode, QualityReport};
use chrono::Utc;
use std::collections::HashMap;

pub struct QualityValidator<'a> {
    config: &'a Config,
}

impl<'a> QualityValidator<'a> {
    pub fn new(config: &'a Config) -> Self {
        QualityValidator { config }
    }

    pub fn validate(&self, dataset: &Dataset) -> QualityReport {
        let routes_score = self.routes_score(dataset);
        let stops_score = self.stops_score(dataset);
        let coordinates_score = self.coordinates_score(dataset);
        let schedules_score = self.schedules_score(dataset);

        let overall_score =
            (0.4 * routes_score + 0.3 * stops_score + 0.2 * coordinates_score + 0.1 * schedules_score)
                .round();

        let mut missing_fields = Vec::new();
        if routes_score < 100.0 {
            missing_fields.push("routes".to_string());
        }
        if stops_score < 100.0 {
            missing_fields.push("stops".to_string());
        }
        if coordinates_score < 100.0 {
            missing_fields.push("coordinates".to_string());
        }
        if schedules_score < 100.0 {
            missing_fields.push("schedules".to_string());
        }

        let mut recommendations = Vec::new();
        if coordinates_score < self.config.coordinates_threshold as f64 {
            recommendations.push("recover_coordinates".to_string());
        }
        if schedules_score < self.config.schedules_threshold as f64 {
            recommendations.push("generate_schedules".to_string());
        }
        if stops_score < 100.0 || routes_score < 100.0 {
            recommendations.push("fill_missing_names".to_string());
        }

        let mut details = HashMap::new();
        details.insert("routes".to_string(), routes_score);
        details.insert("stops".to_string(), stops_score);
        details.insert("coordinates".to_string(), coordinates_score);
        details.insert("schedules".to_string(), schedules_score);

        QualityReport {
            overall_score,
            routes_score,
            stops_score,
            coordinates_score,
            schedules_score,
            missing_fields,
            recommendations,
            validated_at: Utc::now(),
            details,
        }
    }

    /// `RECOVERY` band per thresholds: `[recovery_threshold, real_threshold)`.
    pub fn should_recover(&self, report: &QualityReport) -> bool {
        let lo = self.config.quality_threshold_recovery as f64;
        let hi = self.config.quality_threshold_real as f64;
        report.overall_score >= lo && report.overall_score < hi
    }

    pub fn mode_for_score(&self, score: f64) -> DatasetMode {
        if score < self.config.quality_threshold_recovery as f64 {
            DatasetMode::Mock
        } else if score < self.config.quality_threshold_real as f64 {
            DatasetMode::Recovery
        } else {
            DatasetMode::Real
        }
    }

    fn routes_score(&self, dataset: &Dataset) -> f64 {
        let valid = dataset
            .routes
            .iter()
            .filter(|r| !r.route_id.is_empty() && !r.name.is_empty() && r.stops.len() >= 2)
            .count();
        percentage(valid, dataset.routes.len())
    }

    fn stops_score(&self, dataset: &Dataset) -> f64 {
        let valid = dataset
            .stops
            .iter()
            .filter(|s| !s.stop_id.is_empty() && !s.name.is_empty())
            .count();
        percentage(valid, dataset.stops.len())
    }

    fn coordinates_score(&self, dataset: &Dataset) -> f64 {
        let valid = dataset
            .stops
            .iter()
            .filter(|s| s.coordinates.map(|c| c.is_valid()).unwrap_or(false))
            .count();
        percentage(valid, dataset.stops.len())
    }

    fn schedules_score(&self, dataset: &Dataset) -> f64 {
        let valid = dataset
            .routes
            .iter()
            .filter(|r| dataset.flights.iter().any(|f| f.route_id == r.route_id))
            .count();
        percentage(valid, dataset.routes.len())
    }
}

fn percentage(valid: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (valid as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Route, Stop, TransportType};
    use rust_decimal::Decimal;

    fn cfg() -> Config {
        Config::default()
    }

    #[test]
    fn empty_dataset_scores_zero() {
        let config = cfg();
        let validator = QualityValidator::new(&config);
        let dataset = Dataset::empty("test");
        let report = validator.validate(&dataset);
        assert_eq!(report.overall_score, 0.0);
    }

    #[test]
    fn full_quality_dataset_scores_perfectly() {
        let config = cfg();
        let validator = QualityValidator::new(&config);

        let mut dataset = Dataset::empty("test");
        dataset.stops.push(Stop::new_real("s1", "Stop One", "city-a"));
        dataset.stops[0].coordinates = Some(crate::model::Coordinates::new(60.0, 130.0));
        dataset.stops.push(Stop::new_real("s2", "Stop Two", "city-b"));
        dataset.stops[1].coordinates = Some(crate::model::Coordinates::new(61.0, 131.0));

        let route = Route {
            route_id: "r1".to_string(),
            name: "Route One".to_string(),
            stops: vec!["s1".to_string(), "s2".to_string()],
            transport_type: TransportType::Bus,
            base_fare: Decimal::from(10),
            operator: None,
            duration_minutes: Some(120.0),
            metadata: HashMap::new(),
        };
        dataset.routes.push(route);

        dataset.flights.push(crate::model::Flight {
            flight_id: "f1".to_string(),
            route_id: "r1".to_string(),
            from_stop_id: "s1".to_string(),
            to_stop_id: "s2".to_string(),
            departure: Utc::now(),
            arrival: Utc::now() + chrono::Duration::hours(2),
            price: Decimal::from(10),
            seats: 40,
            transport_type_override: None,
        });

        let report = validator.validate(&dataset);
        assert_eq!(report.overall_score, 100.0);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn should_recover_is_band_membership() {
        let config = cfg();
        let validator = QualityValidator::new(&config);
        let mut report = validator.validate(&Dataset::empty("x"));
        report.overall_score = 70.0;
        assert!(validator.should_recover(&report));
        report.overall_score = 95.0;
        assert!(!validator.should_recover(&report));
        report.overall_score = 10.0;
        assert!(!validator.should_recover(&report));
    }
}
