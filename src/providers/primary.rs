//! Primary (remote catalog) provider, spec §4.3.
//!
//! Probes a remote catalog with a handshake; loads three collections
//! (stops, routes, flights) and maps them into a `Dataset` with
//! `source="primary"`, `mode=UNKNOWN`.

use super::Provider;
use crate::error::FetchError;
use crate::model::{Dataset, DatasetMode, Flight, Route, Stop};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

pub struct PrimaryProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl PrimaryProvider {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        PrimaryProvider {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    async fn get_collection<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, FetchError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(FetchError::Invalid(format!("{path} returned {}", response.status())));
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| FetchError::Invalid(format!("{path}: {e}")))
    }
}

#[async_trait]
impl Provider for PrimaryProvider {
    fn name(&self) -> &'static str {
        "primary"
    }

    /// Returns true only if a handshake against the catalog's health
    /// endpoint succeeds.
    async fn available(&self) -> bool {
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        self.client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn load(&self) -> Result<Dataset, FetchError> {
        let mut stops: Vec<Stop> = self.get_collection("stops").await?;
        let routes: Vec<Route> = self.get_collection("routes").await?;
        let flights: Vec<Flight> = self.get_collection("flights").await?;

        super::tag_facility_types(&mut stops);

        Ok(Dataset {
            routes,
            stops,
            flights,
            mode: DatasetMode::Unknown,
            quality: 0.0,
            loaded_at: Utc::now(),
            source: "primary".to_string(),
            metadata: Default::default(),
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(Duration::from_secs(0))
    } else if e.is_connect() {
        FetchError::Connection(e.to_string())
    } else {
        FetchError::Invalid(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_catalog_reports_false() {
        let provider = PrimaryProvider::new("http://127.0.0.1:1", 1);
        assert!(!provider.available().await);
    }
}
