//! Core data model (spec §3).
//!
//! Plain value types shared by every component; no behavior beyond small
//! derived helpers lives here. `Dataset` is the only type recovery mutates,
//! and it does so by producing a new snapshot rather than mutating in
//! place (Design Notes: "each step returns a new dataset snapshot").

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// WGS-84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coordinates { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance in kilometers (haversine).
    pub fn haversine_km(&self, other: &Coordinates) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        EARTH_RADIUS_KM * c
    }

    /// Euclidean distance in degrees, used by hub-detection's coordinate window (§4.2 step 5).
    pub fn euclidean_deg(&self, other: &Coordinates) -> f64 {
        ((self.lat - other.lat).powi(2) + (self.lon - other.lon).powi(2)).sqrt()
    }
}

/// Transport mode, spec §3 ("transportType").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Bus,
    Airplane,
    Train,
    Ferry,
    Taxi,
    Unknown,
}

impl TransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Bus => "bus",
            TransportType::Airplane => "airplane",
            TransportType::Train => "train",
            TransportType::Ferry => "ferry",
            TransportType::Taxi => "taxi",
            TransportType::Unknown => "unknown",
        }
    }

    /// Maps provider/carrier vocabulary onto the canonical enum
    /// (`PLANE -> airplane`, `BUS -> bus`, etc., spec §4.8 step 3).
    pub fn parse_loose(raw: &str) -> TransportType {
        match raw.to_ascii_uppercase().as_str() {
            "BUS" | "COACH" => TransportType::Bus,
            "PLANE" | "AIRPLANE" | "AIR" | "FLIGHT" => TransportType::Airplane,
            "TRAIN" | "RAIL" | "RAILWAY" => TransportType::Train,
            "FERRY" | "BOAT" | "SHIP" | "MARITIME" => TransportType::Ferry,
            "TAXI" | "CAB" => TransportType::Taxi,
            _ => TransportType::Unknown,
        }
    }
}

/// A stop (real or virtual), spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    pub name: String,
    pub coordinates: Option<Coordinates>,
    pub city_id: String,
    pub is_airport: bool,
    pub is_railway: bool,
    pub is_ferry_terminal: bool,
    pub is_virtual: bool,
    pub metadata: HashMap<String, String>,
}

impl Stop {
    pub fn new_real(stop_id: impl Into<String>, name: impl Into<String>, city_id: impl Into<String>) -> Self {
        Stop {
            stop_id: stop_id.into(),
            name: name.into(),
            coordinates: None,
            city_id: city_id.into(),
            is_airport: false,
            is_railway: false,
            is_ferry_terminal: false,
            is_virtual: false,
            metadata: HashMap::new(),
        }
    }

    /// Deterministic id for a virtual stop: `virtual-stop-<normalized-city>`.
    pub fn virtual_id_for_city(normalized_city: &str) -> String {
        format!("virtual-stop-{normalized_city}")
    }
}

/// A route: an ordered sequence of stops served by one or more carriers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub name: String,
    pub stops: Vec<String>,
    pub transport_type: TransportType,
    pub base_fare: Decimal,
    pub operator: Option<String>,
    pub duration_minutes: Option<f64>,
    pub metadata: HashMap<String, String>,
}

impl Route {
    pub fn is_well_formed(&self) -> bool {
        !self.route_id.is_empty() && self.stops.len() >= 2
    }

    /// Deterministic id for a synthesized virtual route.
    pub fn virtual_id(from_stop_id: &str, to_stop_id: &str) -> String {
        format!("virtual-route-{from_stop_id}-{to_stop_id}")
    }

    pub fn adjacent_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.stops.windows(2).map(|w| (w[0].as_str(), w[1].as_str()))
    }
}

/// A single concrete departure on a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub flight_id: String,
    pub route_id: String,
    pub from_stop_id: String,
    pub to_stop_id: String,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub price: Decimal,
    pub seats: u32,
    pub transport_type_override: Option<TransportType>,
}

impl Flight {
    pub fn duration_minutes(&self) -> f64 {
        (self.arrival - self.departure).num_seconds() as f64 / 60.0
    }

    pub fn is_valid(&self) -> bool {
        self.arrival > self.departure
    }
}

/// Dataset lifecycle mode, spec §3/GLOSSARY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetMode {
    Real,
    Recovery,
    Mock,
    Unknown,
}

impl DatasetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetMode::Real => "REAL",
            DatasetMode::Recovery => "RECOVERY",
            DatasetMode::Mock => "MOCK",
            DatasetMode::Unknown => "UNKNOWN",
        }
    }
}

/// The full dataset handed between orchestrator, recovery, and the builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub routes: Vec<Route>,
    pub stops: Vec<Stop>,
    pub flights: Vec<Flight>,
    pub mode: DatasetMode,
    pub quality: f64,
    pub loaded_at: DateTime<Utc>,
    pub source: String,
    pub metadata: HashMap<String, String>,
}

impl Dataset {
    pub fn empty(source: impl Into<String>) -> Self {
        Dataset {
            routes: Vec::new(),
            stops: Vec::new(),
            flights: Vec::new(),
            mode: DatasetMode::Unknown,
            quality: 0.0,
            loaded_at: Utc::now(),
            source: source.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn stop_by_id(&self, stop_id: &str) -> Option<&Stop> {
        self.stops.iter().find(|s| s.stop_id == stop_id)
    }

    pub fn routes_containing_stop<'a>(&'a self, stop_id: &'a str) -> impl Iterator<Item = &'a Route> {
        self.routes.iter().filter(move |r| r.stops.iter().any(|s| s == stop_id))
    }

    pub fn flights_for_route<'a>(&'a self, route_id: &'a str) -> impl Iterator<Item = &'a Flight> {
        self.flights.iter().filter(move |f| f.route_id == route_id)
    }
}

/// Quality report, spec §3/§4.1. Pure function of a `Dataset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub overall_score: f64,
    pub routes_score: f64,
    pub stops_score: f64,
    pub coordinates_score: f64,
    pub schedules_score: f64,
    pub missing_fields: Vec<String>,
    pub recommendations: Vec<String>,
    pub validated_at: DateTime<Utc>,
    pub details: HashMap<String, f64>,
}

/// Risk assessment, spec §3/§4.9.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub route_id: String,
    pub risk_score: RiskScore,
    pub factors: RiskFactors,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScore {
    pub value: f64,
    pub level: RiskLevel,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::VeryLow => "very-low",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very-high",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskFactors {
    pub transfer_count: u32,
    pub average_delay_90_days: Option<f64>,
    pub cancellation_rate_90_days: Option<f64>,
    pub delay_frequency: Option<f64>,
    pub average_occupancy: Option<f64>,
}
