//! Data orchestrator (C5, spec §4.5).
//!
//! The single public entry point `load_data()`. Implements the decision
//! tree: invalidate stale cache -> cache hit -> provider selection -> fetch
//! -> validate -> recover -> fallback. Every step is logged and metered;
//! transient failures degrade to fallback rather than propagating.

use crate::cache::DatasetCache;
use crate::config::Config;
use crate::model::{Dataset, DatasetMode};
use crate::observability::Metrics;
use crate::providers::Provider;
use crate::quality::QualityValidator;
use crate::recovery::RecoveryService;
use chrono::Utc;
use tracing::{info, warn};

pub struct DataOrchestrator<'a> {
    config: &'a Config,
    cache: &'a DatasetCache,
    primary: &'a dyn Provider,
    fallback: &'a dyn Provider,
    metrics: &'a Metrics,
}

impl<'a> DataOrchestrator<'a> {
    pub fn new(
        config: &'a Config,
        cache: &'a DatasetCache,
        primary: &'a dyn Provider,
        fallback: &'a dyn Provider,
        metrics: &'a Metrics,
    ) -> Self {
        DataOrchestrator { config, cache, primary, fallback, metrics }
    }

    pub async fn load_data(&self) -> Dataset {
        // Drop any previously-cached dataset with unstable ids before
        // attempting a cache hit, per spec step 0.
        self.cache.invalidate(&self.config.cache_key).await;

        if let Some(cached) = self.cache.get(&self.config.cache_key).await {
            info!(source = "cache", "dataset loaded from cache");
            self.metrics.record_request(cached.mode.as_str(), true);
            return cached;
        }
        self.metrics.record_request("pending", false);

        let provider: &dyn Provider = if self.primary.available().await {
            self.primary
        } else {
            warn!(reason = "primary_unavailable", "primary provider unavailable, using fallback");
            self.fallback
        };

        let mut dataset = match provider.load().await {
            Ok(d) => d,
            Err(e) => {
                warn!(reason = "primary_load_failed", error = %e, "provider load failed, falling back");
                self.metrics.record_error("provider_load");
                match self.fallback.load().await {
                    Ok(d) => d,
                    Err(e) => {
                        self.metrics.record_error("fallback_load");
                        warn!(reason = "fallback_load_failed", error = %e, "fallback load failed, using empty dataset");
                        Dataset::empty("fallback")
                    }
                }
            }
        };

        let validator = QualityValidator::new(self.config);
        let report = validator.validate(&dataset);
        self.metrics.record_quality(report.overall_score);
        let mut mode = validator.mode_for_score(report.overall_score);

        if mode == DatasetMode::Recovery {
            let recovery = RecoveryService::new(self.config);
            let (recovered, recovery_report) = recovery.recover(&dataset, &report);
            info!(
                coordinates = recovery_report.coordinates_recovered,
                flights = recovery_report.flights_synthesized,
                names = recovery_report.names_filled,
                virtual_stops = recovery_report.virtual_stops_created,
                hub_routes = recovery_report.hub_routes_created,
                mesh_routes = recovery_report.mesh_routes_created,
                bridges = recovery_report.bridge_routes_created,
                "recovery applied"
            );
            let report2 = validator.validate(&recovered);
            if report2.overall_score < self.config.quality_threshold_recovery as f64 {
                warn!(reason = "recovery_insufficient", "recovered dataset still below recovery threshold, using fallback");
                dataset = self.final_resort_fallback().await;
                mode = DatasetMode::Mock;
            } else {
                dataset = recovered;
            }
        } else if mode == DatasetMode::Mock && provider.name() != self.fallback.name() {
            dataset = self.final_resort_fallback().await;
            // Still run recovery to create virtual stops/mesh on top of the
            // fallback data, per spec: "still run recovery ... synthetic-report-100".
            let recovery = RecoveryService::new(self.config);
            let synthetic_report = validator.validate(&dataset);
            let (recovered, _) = recovery.recover(&dataset, &synthetic_report);
            dataset = recovered;
        }

        dataset.mode = mode;
        dataset.quality = validator.validate(&dataset).overall_score;
        dataset.loaded_at = Utc::now();

        self.cache.set(&self.config.cache_key, &dataset, self.config.cache_ttl_seconds).await;
        self.metrics.record_request(dataset.mode.as_str(), false);
        dataset
    }

    async fn final_resort_fallback(&self) -> Dataset {
        match self.fallback.load().await {
            Ok(d) => d,
            Err(e) => {
                self.metrics.record_error("final_fallback_load");
                warn!(reason = "final_fallback_failed", error = %e, "final-resort fallback failed, using empty dataset");
                Dataset::empty("fallback")
            }
        }
    }
}
