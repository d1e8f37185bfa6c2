//! Recovery service (C2, spec §4.2).
//!
//! Consumes a `Dataset` and `QualityReport`, returns a new `Dataset`
//! snapshot plus the count of operations applied by each step. Each step
//! is idempotent over re-run and any step's failure is logged and skipped
//! (the dataset proceeds with partial recovery), per the failure model.

pub mod city;
pub mod region;

use crate::config::Config;
use crate::model::{Coordinates, Dataset, Flight, QualityReport, Route, Stop, TransportType};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};

/// Counts of entities touched by each recovery step, for logging/metrics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RecoveryReport {
    pub coordinates_recovered: usize,
    pub flights_synthesized: usize,
    pub names_filled: usize,
    pub virtual_stops_created: usize,
    pub hub_routes_created: usize,
    pub mesh_routes_created: usize,
    pub bridge_routes_created: usize,
    pub skipped_steps: Vec<String>,
}

/// A schedule-synthesis template, spec §4.2 step 2 table.
struct ScheduleTemplate {
    flights_per_day: u32,
    windows: &'static [(u32, u32)],
    duration_minutes: i64,
}

fn template_for(transport_type: TransportType) -> ScheduleTemplate {
    match transport_type {
        TransportType::Airplane => ScheduleTemplate { flights_per_day: 2, windows: &[(8, 10), (16, 18)], duration_minutes: 120 },
        TransportType::Bus => ScheduleTemplate { flights_per_day: 4, windows: &[(6, 8), (10, 12), (14, 16), (18, 20)], duration_minutes: 240 },
        TransportType::Train => ScheduleTemplate { flights_per_day: 3, windows: &[(7, 9), (13, 15), (19, 21)], duration_minutes: 180 },
        TransportType::Ferry => ScheduleTemplate { flights_per_day: 2, windows: &[(9, 11), (15, 17)], duration_minutes: 180 },
        TransportType::Taxi => ScheduleTemplate { flights_per_day: 1, windows: &[(0, 24)], duration_minutes: 60 },
        TransportType::Unknown => ScheduleTemplate { flights_per_day: 2, windows: &[(9, 11), (15, 17)], duration_minutes: 120 },
    }
}

pub struct RecoveryService<'a> {
    config: &'a Config,
}

impl<'a> RecoveryService<'a> {
    pub fn new(config: &'a Config) -> Self {
        RecoveryService { config }
    }

    /// Runs all recovery steps in order, returning the recovered dataset
    /// snapshot and a report of what each step did.
    pub fn recover(&self, dataset: &Dataset, _report: &QualityReport) -> (Dataset, RecoveryReport) {
        let mut current = dataset.clone();
        let mut recovery_report = RecoveryReport::default();

        recovery_report.coordinates_recovered = self.recover_coordinates(&mut current);
        recovery_report.flights_synthesized = self.synthesize_schedules(&mut current);
        recovery_report.names_filled = self.fill_missing_names(&mut current);
        recovery_report.virtual_stops_created = self.create_virtual_stops(&mut current);
        recovery_report.hub_routes_created = self.create_hub_routes(&mut current);
        recovery_report.mesh_routes_created = self.create_virtual_mesh(&mut current);
        recovery_report.bridge_routes_created = self.create_real_virtual_bridges(&mut current);

        (current, recovery_report)
    }

    /// Step 1: coordinate recovery via nearest-neighbor interpolation along
    /// a route, falling back to a single-sided offset, then region center.
    fn recover_coordinates(&self, dataset: &mut Dataset) -> usize {
        let missing: Vec<String> = dataset
            .stops
            .iter()
            .filter(|s| s.coordinates.is_none())
            .map(|s| s.stop_id.clone())
            .collect();

        if missing.is_empty() {
            return 0;
        }

        let mut recovered = 0usize;
        for stop_id in missing {
            let coords = self.interpolate_coordinates(dataset, &stop_id);
            if let Some(stop) = dataset.stops.iter_mut().find(|s| s.stop_id == stop_id) {
                if stop.coordinates.is_none() {
                    stop.coordinates = Some(coords);
                    recovered += 1;
                }
            }
        }
        recovered
    }

    fn interpolate_coordinates(&self, dataset: &Dataset, stop_id: &str) -> Coordinates {
        for route in dataset.routes_containing_stop(stop_id) {
            let Some(idx) = route.stops.iter().position(|s| s == stop_id) else {
                continue;
            };

            let left = route.stops[..idx]
                .iter()
                .rev()
                .find_map(|s| dataset.stop_by_id(s).and_then(|st| st.coordinates));
            let right = route.stops[idx + 1..]
                .iter()
                .find_map(|s| dataset.stop_by_id(s).and_then(|st| st.coordinates));

            match (left, right) {
                (Some(l), Some(r)) => {
                    return Coordinates::new((l.lat + r.lat) / 2.0, (l.lon + r.lon) / 2.0);
                }
                (Some(l), None) => return Coordinates::new(l.lat + 0.01, l.lon + 0.01),
                (None, Some(r)) => return Coordinates::new(r.lat - 0.01, r.lon - 0.01),
                (None, None) => continue,
            }
        }

        Coordinates::new(self.config.region_center_lat, self.config.region_center_lon)
    }

    /// Step 2: generate one year of flights for every route that has none.
    fn synthesize_schedules(&self, dataset: &mut Dataset) -> usize {
        let routes_without_flights: Vec<Route> = dataset
            .routes
            .iter()
            .filter(|r| !dataset.flights.iter().any(|f| f.route_id == r.route_id))
            .cloned()
            .collect();

        let mut created = 0usize;
        for route in routes_without_flights {
            created += self.synthesize_route_schedule(dataset, &route);
        }
        created
    }

    fn synthesize_route_schedule(&self, dataset: &mut Dataset, route: &Route) -> usize {
        if route.stops.len() < 2 {
            return 0;
        }
        let template = template_for(route.transport_type);
        let mut rng = deterministic_rng(&route.route_id);
        let mut created = 0usize;

        let base_day = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap();

        for day in 0..365i64 {
            let date = base_day + ChronoDuration::days(day);
            for slot in 0..template.flights_per_day {
                let window = template.windows[(slot as usize) % template.windows.len()];
                let departure_hour = rng.gen_range(window.0..window.1.max(window.0 + 1));
                let departure_minute = rng.gen_range(0..60u32);
                let Some(departure) = date
                    .date_naive()
                    .and_hms_opt(departure_hour.min(23), departure_minute, 0)
                    .and_then(|ndt| Utc.from_local_datetime(&ndt).single())
                else {
                    continue;
                };

                for (from_stop, to_stop) in route.adjacent_pairs() {
                    let arrival = departure + ChronoDuration::minutes(template.duration_minutes);
                    dataset.flights.push(Flight {
                        flight_id: format!("synth-{}-{}-{}-{}", route.route_id, day, slot, from_stop),
                        route_id: route.route_id.clone(),
                        from_stop_id: from_stop.to_string(),
                        to_stop_id: to_stop.to_string(),
                        departure,
                        arrival,
                        price: route.base_fare,
                        seats: 0,
                        transport_type_override: None,
                    });
                    created += 1;
                }
            }
        }
        created
    }

    /// Step 3: `Stop #<index+1>` for stops without a name.
    fn fill_missing_names(&self, dataset: &mut Dataset) -> usize {
        let mut filled = 0usize;
        for (idx, stop) in dataset.stops.iter_mut().enumerate() {
            if stop.name.trim().is_empty() {
                stop.name = format!("Stop #{}", idx + 1);
                filled += 1;
            }
        }
        filled
    }

    /// Step 4: insert a virtual stop for every region-table city not
    /// already present (compared by normalized city name).
    fn create_virtual_stops(&self, dataset: &mut Dataset) -> usize {
        let present: HashSet<String> = dataset
            .stops
            .iter()
            .map(|s| city::normalize(&s.city_id))
            .chain(dataset.stops.iter().map(|s| city::normalize(&city::extract_city(&s.name))))
            .collect();

        let mut created = 0usize;
        for entry in region::REGION_CITIES {
            let normalized = city::normalize(entry.name);
            if present.contains(&normalized) {
                continue;
            }
            let stop_id = Stop::virtual_id_for_city(&normalized);
            if dataset.stops.iter().any(|s| s.stop_id == stop_id) {
                continue;
            }

            let mut stop = Stop::new_real(stop_id, entry.name, normalized.clone());
            stop.is_virtual = true;
            stop.coordinates = Some(region::coordinates_for(entry));
            dataset.stops.push(stop);
            created += 1;
        }
        created
    }

    /// Step 5: ensure bidirectional virtual routes between the hub and
    /// every other city-stop.
    fn create_hub_routes(&self, dataset: &mut Dataset) -> usize {
        let Some(hub_id) = self.find_hub(dataset) else {
            return 0;
        };

        let city_stop_ids: Vec<String> = dataset
            .stops
            .iter()
            .filter(|s| s.stop_id != hub_id)
            .filter(|s| region_city_for(&city::normalize(&s.city_id)).is_some())
            .map(|s| s.stop_id.clone())
            .collect();

        let mut created = 0usize;
        for city_stop_id in city_stop_ids {
            created += self.ensure_virtual_route(dataset, &hub_id, &city_stop_id, TransportType::Bus, true);
            created += self.ensure_virtual_route(dataset, &city_stop_id, &hub_id, TransportType::Bus, true);
        }
        created
    }

    /// Step 6: full bidirectional mesh between every pair of virtual stops.
    /// Route existence and haversine-derived weight only; the spec does not
    /// call for schedule synthesis at mesh scale (only the hub star does).
    fn create_virtual_mesh(&self, dataset: &mut Dataset) -> usize {
        let virtual_ids: Vec<String> = dataset
            .stops
            .iter()
            .filter(|s| s.is_virtual)
            .map(|s| s.stop_id.clone())
            .collect();

        let mut created = 0usize;
        for a in &virtual_ids {
            for b in &virtual_ids {
                if a == b {
                    continue;
                }
                created += self.ensure_virtual_route(dataset, a, b, TransportType::Bus, false);
            }
        }
        created
    }

    /// Step 7: bridge every (real stop, virtual stop) pair in both directions.
    fn create_real_virtual_bridges(&self, dataset: &mut Dataset) -> usize {
        let real_ids: Vec<String> = dataset.stops.iter().filter(|s| !s.is_virtual).map(|s| s.stop_id.clone()).collect();
        let virtual_ids: Vec<String> = dataset.stops.iter().filter(|s| s.is_virtual).map(|s| s.stop_id.clone()).collect();

        let mut created = 0usize;
        for real in &real_ids {
            for virt in &virtual_ids {
                created += self.ensure_virtual_route(dataset, real, virt, TransportType::Bus, false);
                created += self.ensure_virtual_route(dataset, virt, real, TransportType::Bus, false);
            }
        }
        created
    }

    /// Creates `virtual-route-<from>-<to>` with a haversine-derived weight
    /// if it doesn't already exist. Idempotent: returns 0 if the route
    /// already exists. Only synthesizes a year of bus-template flights when
    /// `synthesize_flights` is set (the hub star, per spec step 5).
    fn ensure_virtual_route(
        &self,
        dataset: &mut Dataset,
        from: &str,
        to: &str,
        transport_type: TransportType,
        synthesize_flights: bool,
    ) -> usize {
        let route_id = Route::virtual_id(from, to);
        if dataset.routes.iter().any(|r| r.route_id == route_id) {
            return 0;
        }

        let Some(from_coords) = dataset.stop_by_id(from).and_then(|s| s.coordinates) else {
            return 0;
        };
        let Some(to_coords) = dataset.stop_by_id(to).and_then(|s| s.coordinates) else {
            return 0;
        };

        let distance_km = from_coords.haversine_km(&to_coords);
        let minutes = ((distance_km / 60.0) * 60.0 * 1.3).max(1.0);

        let route = Route {
            route_id: route_id.clone(),
            name: format!("Virtual route {from}-{to}"),
            stops: vec![from.to_string(), to.to_string()],
            transport_type,
            base_fare: rust_decimal::Decimal::ZERO,
            operator: None,
            duration_minutes: Some(minutes),
            metadata: HashMap::new(),
        };
        dataset.routes.push(route.clone());
        if synthesize_flights {
            self.synthesize_route_schedule(dataset, &route);
        }
        1
    }

    /// Hub selection: the stop whose normalized city equals the configured
    /// hub name, or the nearest stop within 0.5° of the configured hub
    /// coordinate.
    fn find_hub(&self, dataset: &Dataset) -> Option<String> {
        let hub_name = city::normalize(&self.config.hub_city_name);
        if let Some(stop) = dataset.stops.iter().find(|s| city::normalize(&s.city_id) == hub_name) {
            return Some(stop.stop_id.clone());
        }

        let hub_coords = Coordinates::new(self.config.region_center_lat, self.config.region_center_lon);
        dataset
            .stops
            .iter()
            .filter_map(|s| s.coordinates.map(|c| (s, c.euclidean_deg(&hub_coords))))
            .filter(|(_, dist)| *dist <= 0.5)
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(s, _)| s.stop_id.clone())
    }
}

fn region_city_for(normalized_name: &str) -> Option<&'static region::RegionCity> {
    region::REGION_CITIES.iter().find(|c| city::normalize(c.name) == normalized_name)
}

/// Seeds a RNG from the route id so schedule synthesis is deterministic and
/// `recover(recover(D))` is idempotent (U2), rather than relying on
/// process-local entropy (an open question in the source spec).
fn deterministic_rng(seed_key: &str) -> ChaCha8Rng {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    seed_key.hash(&mut hasher);
    ChaCha8Rng::seed_from_u64(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dataset;

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn coordinate_interpolation_midpoint() {
        let cfg = config();
        let service = RecoveryService::new(&cfg);

        let mut dataset = Dataset::empty("test");
        let mut a = Stop::new_real("a", "A", "city-a");
        a.coordinates = Some(Coordinates::new(60.0, 130.0));
        let mid = Stop::new_real("mid", "Mid", "city-mid");
        let mut c = Stop::new_real("c", "C", "city-c");
        c.coordinates = Some(Coordinates::new(62.0, 132.0));
        dataset.stops.push(a);
        dataset.stops.push(mid);
        dataset.stops.push(c);

        dataset.routes.push(Route {
            route_id: "r1".to_string(),
            name: "R1".to_string(),
            stops: vec!["a".to_string(), "mid".to_string(), "c".to_string()],
            transport_type: TransportType::Bus,
            base_fare: rust_decimal::Decimal::ZERO,
            operator: None,
            duration_minutes: None,
            metadata: HashMap::new(),
        });

        let report = crate::quality::QualityValidator::new(&cfg).validate(&dataset);
        let (recovered, _) = service.recover(&dataset, &report);

        let mid_stop = recovered.stop_by_id("mid").unwrap();
        let coords = mid_stop.coordinates.unwrap();
        assert!((coords.lat - 61.0).abs() < 1e-9);
        assert!((coords.lon - 131.0).abs() < 1e-9);
    }

    #[test]
    fn recover_is_idempotent_by_counts() {
        let cfg = config();
        let service = RecoveryService::new(&cfg);
        let dataset = Dataset::empty("test");
        let report = crate::quality::QualityValidator::new(&cfg).validate(&dataset);

        let (once, _) = service.recover(&dataset, &report);
        let report2 = crate::quality::QualityValidator::new(&cfg).validate(&once);
        let (twice, _) = service.recover(&once, &report2);

        assert_eq!(once.stops.len(), twice.stops.len());
        assert_eq!(once.routes.len(), twice.routes.len());
        assert_eq!(once.flights.len(), twice.flights.len());
    }

    #[test]
    fn virtual_mesh_is_fully_connected() {
        let cfg = config();
        let service = RecoveryService::new(&cfg);
        let dataset = Dataset::empty("test");
        let report = crate::quality::QualityValidator::new(&cfg).validate(&dataset);
        let (recovered, _) = service.recover(&dataset, &report);

        let virtual_ids: Vec<&String> = recovered.stops.iter().filter(|s| s.is_virtual).map(|s| &s.stop_id).collect();
        assert!(virtual_ids.len() >= region::REGION_CITIES.len());

        for a in &virtual_ids {
            for b in &virtual_ids {
                if a == b {
                    continue;
                }
                let route_id = Route::virtual_id(a, b);
                assert!(recovered.routes.iter().any(|r| &r.route_id == &route_id), "missing {route_id}");
            }
        }
    }
}
