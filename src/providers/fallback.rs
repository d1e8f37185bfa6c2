//! Fallback (static demonstration) provider, spec §4.3.
//!
//! Reads three JSON blobs from a local directory. Never fails if the files
//! exist; always reports `mode=MOCK`, `quality=100`, `source="fallback"`.

use super::Provider;
use crate::error::FetchError;
use crate::model::{Dataset, DatasetMode, Flight, Route, Stop};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;

pub struct FallbackProvider {
    data_dir: PathBuf,
}

impl FallbackProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        FallbackProvider { data_dir: data_dir.into() }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, filename: &str) -> Result<Vec<T>, FetchError> {
        let path = self.data_dir.join(filename);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| FetchError::Invalid(format!("{filename}: {e}"))),
            Err(_) => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Provider for FallbackProvider {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn available(&self) -> bool {
        true
    }

    async fn load(&self) -> Result<Dataset, FetchError> {
        let stops: Vec<Stop> = self.read_json("stops.json").await?;
        let routes: Vec<Route> = self.read_json("routes.json").await?;
        let flights: Vec<Flight> = self.read_json("flights.json").await?;

        let (mut stops, routes, flights) = if stops.is_empty() && routes.is_empty() {
            demo_dataset()
        } else {
            (stops, routes, flights)
        };
        super::tag_facility_types(&mut stops);

        Ok(Dataset {
            routes,
            stops,
            flights,
            mode: DatasetMode::Mock,
            quality: 100.0,
            loaded_at: Utc::now(),
            source: "fallback".to_string(),
            metadata: Default::default(),
        })
    }
}

/// A tiny in-memory demo dataset used when no on-disk fixtures are present,
/// so the fallback provider is always usable even on a bare checkout.
fn demo_dataset() -> (Vec<Stop>, Vec<Route>, Vec<Flight>) {
    use crate::model::{Coordinates, TransportType};
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    let mut yakutsk = Stop::new_real("demo-yakutsk-bus", "Автовокзал Якутск", "якутск");
    yakutsk.coordinates = Some(Coordinates::new(62.0281, 129.7326));
    let mut olekminsk = Stop::new_real("demo-olekminsk-bus", "Автостанция Олёкминск", "олекминск");
    olekminsk.coordinates = Some(Coordinates::new(60.3725, 120.4264));

    let route = Route {
        route_id: "demo-route-yak-olek".to_string(),
        name: "Якутск - Олёкминск".to_string(),
        stops: vec!["demo-yakutsk-bus".to_string(), "demo-olekminsk-bus".to_string()],
        transport_type: TransportType::Bus,
        base_fare: Decimal::from(1500),
        operator: Some("Демоперевозчик".to_string()),
        duration_minutes: Some(240.0),
        metadata: HashMap::new(),
    };

    let flight = Flight {
        flight_id: "demo-flight-1".to_string(),
        route_id: route.route_id.clone(),
        from_stop_id: "demo-yakutsk-bus".to_string(),
        to_stop_id: "demo-olekminsk-bus".to_string(),
        departure: Utc::now(),
        arrival: Utc::now() + chrono::Duration::minutes(240),
        price: Decimal::from(1500),
        seats: 40,
        transport_type_override: None,
    };

    (vec![yakutsk, olekminsk], vec![route], vec![flight])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fallback_never_fails_and_reports_mock() {
        let provider = FallbackProvider::new("/nonexistent/path/for/tests");
        assert!(provider.available().await);
        let dataset = provider.load().await.unwrap();
        assert_eq!(dataset.mode, DatasetMode::Mock);
        assert_eq!(dataset.quality, 100.0);
        assert!(!dataset.stops.is_empty());
    }
}
