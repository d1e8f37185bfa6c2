//! Sync worker (C11, spec §4.11).
//!
//! Periodic compare-by-hash re-sync from the primary provider. Grounded on
//! the orchestrator's own provider-call shape (`primary.load()`, warn+skip
//! on transient failure) plus `recovery`'s use of a canonical, order-stable
//! serialization for anything that must hash or compare deterministically.

use crate::db::{DatasetRecord, DatasetRepository, DbError};
use crate::error::FetchError;
use crate::model::Dataset;
use crate::observability::Metrics;
use crate::providers::Provider;
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Outcome of one `run()` pass, for logging/tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    SkippedTooSoon,
    NoChanges,
    Updated { content_hash: String },
    FetchFailed,
    RolledBack,
}

/// Broadcast payload that tells the graph manager a new dataset is
/// available, so it can `update_graph()` without a full re-initialize
/// (spec §4.11 step 5, "signal the next worker in the chain").
#[derive(Debug, Clone)]
pub struct DatasetChanged {
    pub content_hash: String,
}

pub struct SyncWorker<'a> {
    dataset_id: String,
    primary: &'a dyn Provider,
    repository: &'a dyn DatasetRepository,
    metrics: &'a Metrics,
    min_interval: Duration,
    last_run: Mutex<Option<Instant>>,
    signal: broadcast::Sender<DatasetChanged>,
}

impl<'a> SyncWorker<'a> {
    pub fn new(
        dataset_id: impl Into<String>,
        primary: &'a dyn Provider,
        repository: &'a dyn DatasetRepository,
        metrics: &'a Metrics,
        min_interval_seconds: u64,
    ) -> Self {
        let (signal, _) = broadcast::channel(8);
        SyncWorker {
            dataset_id: dataset_id.into(),
            primary,
            repository,
            metrics,
            min_interval: Duration::from_secs(min_interval_seconds),
            last_run: Mutex::new(None),
            signal,
        }
    }

    /// Subscribes to dataset-change notifications, for the graph manager to
    /// listen on.
    pub fn subscribe(&self) -> broadcast::Receiver<DatasetChanged> {
        self.signal.subscribe()
    }

    /// `canRun()`: true if at least `min_interval` has elapsed since the
    /// last run, or no run has happened yet.
    pub fn can_run(&self) -> bool {
        match *self.last_run.lock().unwrap() {
            None => true,
            Some(last) => last.elapsed() >= self.min_interval,
        }
    }

    pub async fn run(&self) -> SyncOutcome {
        if !self.can_run() {
            return SyncOutcome::SkippedTooSoon;
        }

        let outcome = self.run_once().await;
        *self.last_run.lock().unwrap() = Some(Instant::now());
        outcome
    }

    async fn run_once(&self) -> SyncOutcome {
        let dataset = match self.primary.load().await {
            Ok(d) => d,
            Err(e) => {
                self.report_fetch_failure(&e);
                return SyncOutcome::FetchFailed;
            }
        };

        let new_hash = content_hash(&dataset);
        let previous = self.repository.latest(&self.dataset_id).await;

        if previous.as_ref().map(|p| p.content_hash.as_str()) == Some(new_hash.as_str()) {
            info!(dataset_id = %self.dataset_id, "sync worker: no changes");
            return SyncOutcome::NoChanges;
        }

        let next_version = previous.as_ref().map(|p| p.version + 1).unwrap_or(1);
        let record = DatasetRecord::from_dataset(self.dataset_id.clone(), next_version, &dataset, new_hash.clone());

        match self.repository.insert(record).await {
            Ok(()) => {
                info!(dataset_id = %self.dataset_id, content_hash = %new_hash, "sync worker: dataset updated");
                let _ = self.signal.send(DatasetChanged { content_hash: new_hash.clone() });
                SyncOutcome::Updated { content_hash: new_hash }
            }
            Err(e) => {
                self.report_batch_failure(&e);
                if self.repository.rollback_latest(&self.dataset_id).await.is_ok() {
                    SyncOutcome::RolledBack
                } else {
                    SyncOutcome::FetchFailed
                }
            }
        }
    }

    fn report_fetch_failure(&self, e: &FetchError) {
        self.metrics.record_error("sync_worker_fetch");
        warn!(dataset_id = %self.dataset_id, error = %e, "sync worker: remote fetch failed, persistent state untouched");
    }

    fn report_batch_failure(&self, e: &DbError) {
        self.metrics.record_error("sync_worker_batch");
        warn!(dataset_id = %self.dataset_id, error = %e, "sync worker: partial batch error, rolling back dataset record");
    }
}

/// Stable sha-256 hash over a canonical serialization: collections sorted
/// by id, fields in fixed order, timestamps in ISO-8601 UTC (spec §6
/// "Content hash").
fn content_hash(dataset: &Dataset) -> String {
    let mut stops: Vec<&crate::model::Stop> = dataset.stops.iter().collect();
    stops.sort_by(|a, b| a.stop_id.cmp(&b.stop_id));

    let mut routes: Vec<&crate::model::Route> = dataset.routes.iter().collect();
    routes.sort_by(|a, b| a.route_id.cmp(&b.route_id));

    let mut flights: Vec<&crate::model::Flight> = dataset.flights.iter().collect();
    flights.sort_by(|a, b| a.flight_id.cmp(&b.flight_id));

    let mut canonical = String::new();
    for stop in &stops {
        canonical.push_str(&format!(
            "stop|{}|{}|{}|{}\n",
            stop.stop_id,
            stop.name,
            stop.city_id,
            stop.coordinates.map(|c| format!("{},{}", c.lat, c.lon)).unwrap_or_default()
        ));
    }
    for route in &routes {
        canonical.push_str(&format!(
            "route|{}|{}|{}|{}\n",
            route.route_id,
            route.name,
            route.transport_type.as_str(),
            route.stops.join(",")
        ));
    }
    for flight in &flights {
        canonical.push_str(&format!(
            "flight|{}|{}|{}|{}\n",
            flight.flight_id,
            flight.route_id,
            flight.departure.to_rfc3339(),
            flight.arrival.to_rfc3339()
        ));
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDatasetRepository;
    use crate::model::{Coordinates, DatasetMode, Stop};
    use async_trait::async_trait;

    struct StubProvider(Mutex<Vec<Dataset>>);

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }
        async fn available(&self) -> bool {
            true
        }
        async fn load(&self) -> Result<Dataset, FetchError> {
            let mut datasets = self.0.lock().unwrap();
            Ok(datasets.remove(0))
        }
    }

    fn dataset_with_stop(name: &str) -> Dataset {
        let mut dataset = Dataset::empty("stub");
        let mut stop = Stop::new_real("s1", name, "city");
        stop.coordinates = Some(Coordinates::new(1.0, 2.0));
        dataset.stops.push(stop);
        dataset.mode = DatasetMode::Real;
        dataset
    }

    #[tokio::test]
    async fn identical_content_reports_no_changes() {
        let provider = StubProvider(Mutex::new(vec![dataset_with_stop("Stop A"), dataset_with_stop("Stop A")]));
        let repo = InMemoryDatasetRepository::new();
        let metrics = Metrics::new();
        let worker = SyncWorker::new("d1", &provider, &repo, &metrics, 0);

        assert!(matches!(worker.run().await, SyncOutcome::Updated { .. }));
        assert_eq!(worker.run().await, SyncOutcome::NoChanges);
    }

    #[tokio::test]
    async fn changed_content_upserts_and_signals() {
        let provider = StubProvider(Mutex::new(vec![dataset_with_stop("Stop A"), dataset_with_stop("Stop B")]));
        let repo = InMemoryDatasetRepository::new();
        let metrics = Metrics::new();
        let worker = SyncWorker::new("d1", &provider, &repo, &metrics, 0);
        let mut rx = worker.subscribe();

        worker.run().await;
        let second = worker.run().await;
        assert!(matches!(second, SyncOutcome::Updated { .. }));

        let signal = rx.recv().await.unwrap();
        assert!(!signal.content_hash.is_empty());
    }

    #[tokio::test]
    async fn too_soon_is_skipped() {
        let provider = StubProvider(Mutex::new(vec![dataset_with_stop("Stop A")]));
        let repo = InMemoryDatasetRepository::new();
        let metrics = Metrics::new();
        let worker = SyncWorker::new("d1", &provider, &repo, &metrics, 3600);

        worker.run().await;
        assert_eq!(worker.run().await, SyncOutcome::SkippedTooSoon);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_state_untouched() {
        struct AlwaysFails;
        #[async_trait]
        impl Provider for AlwaysFails {
            fn name(&self) -> &'static str {
                "always-fails"
            }
            async fn available(&self) -> bool {
                false
            }
            async fn load(&self) -> Result<Dataset, FetchError> {
                Err(FetchError::Connection("down".to_string()))
            }
        }

        let provider = AlwaysFails;
        let repo = InMemoryDatasetRepository::new();
        let metrics = Metrics::new();
        let worker = SyncWorker::new("d1", &provider, &repo, &metrics, 0);

        assert_eq!(worker.run().await, SyncOutcome::FetchFailed);
        assert!(repo.latest("d1").await.is_none());
    }
}
