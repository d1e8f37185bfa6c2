//! Dataset -> graph builder (C6, spec §4.6).
//!
//! Transforms a `Dataset` into a `TransportGraph`. City-name derivation
//! here must call the exact same `recovery::city::extract_city` that
//! recovery uses to key its own virtual-stop ids — the two sides
//! disagreeing on a city name for the same stop would silently fracture
//! the graph's transfer detection (the U7/U8 equivalence invariant).

use super::{EdgeKind, GraphEdge, GraphNode, TransportGraph, TRANSFER_EDGE_WEIGHT};
use crate::model::{Dataset, Route, Stop, TransportType};
use crate::recovery::city;
use std::collections::HashMap;

/// Builds a fresh `TransportGraph` from a dataset snapshot. Never mutates
/// the dataset; always produces a graph from scratch (callers that need an
/// incremental rebuild call `clear()` first, which this does internally).
pub fn build(dataset: &Dataset) -> TransportGraph {
    let mut graph = TransportGraph::new();

    for stop in &dataset.stops {
        graph.add_node(node_for_stop(stop));
    }

    for route in &dataset.routes {
        if !route.is_well_formed() {
            continue;
        }
        add_route_edges(&mut graph, dataset, route);
    }

    add_transfer_edges(&mut graph, &dataset.stops);

    graph
}

fn node_for_stop(stop: &Stop) -> GraphNode {
    let city_name = city::extract_city(&stop.name);
    GraphNode {
        stop_id: stop.stop_id.clone(),
        stop_name: stop.name.clone(),
        city_name,
        coordinates: stop.coordinates,
        is_virtual: stop.is_virtual,
    }
}

fn add_route_edges(graph: &mut TransportGraph, dataset: &Dataset, route: &Route) {
    let flights: Vec<&crate::model::Flight> = dataset.flights_for_route(&route.route_id).collect();
    let pair_count = route.stops.len().saturating_sub(1).max(1);

    for (from_id, to_id) in route.adjacent_pairs() {
        if graph.get_node(from_id).is_none() || graph.get_node(to_id).is_none() {
            continue;
        }

        let matching_flight = flights.iter().find(|f| f.from_stop_id == from_id && f.to_stop_id == to_id);

        let (weight, flight_id) = if let Some(flight) = matching_flight {
            (flight.duration_minutes().max(1.0), Some(flight.flight_id.clone()))
        } else if let Some(duration) = route.duration_minutes {
            ((duration / pair_count as f64).max(1.0), None)
        } else {
            (template_duration_minutes(route.transport_type), None)
        };

        let transport_type = matching_flight
            .and_then(|f| f.transport_type_override)
            .unwrap_or(route.transport_type);

        let edge = GraphEdge {
            from_stop_id: from_id.to_string(),
            to_stop_id: to_id.to_string(),
            weight,
            route_id: Some(route.route_id.clone()),
            transport_type: EdgeKind::Transport(transport_type),
            distance_km: None,
            flight_id,
        };
        let _ = graph.add_edge(edge);
    }
}

/// A coarse per-mode fallback duration when neither a matching flight nor a
/// route-level duration is available, mirroring the recovery schedule
/// template's per-mode default durations (spec §4.2 step 2).
fn template_duration_minutes(transport_type: TransportType) -> f64 {
    match transport_type {
        TransportType::Airplane => 120.0,
        TransportType::Train => 480.0,
        TransportType::Bus => 240.0,
        TransportType::Ferry => 360.0,
        TransportType::Taxi => 30.0,
        TransportType::Unknown => 60.0,
    }
}

/// Real stops sharing a city but belonging to different facilities get a
/// bidirectional TRANSFER edge, letting the path finder model a walk/taxi
/// connection between e.g. an airport and a bus terminal (spec §4.6 step
/// 4). Two stops of the *same* facility (two bus stops, two duplicate
/// airport listings) never get one: the facility must differ.
fn add_transfer_edges(graph: &mut TransportGraph, stops: &[Stop]) {
    let mut by_city: HashMap<String, Vec<&Stop>> = HashMap::new();
    for stop in stops {
        if stop.is_virtual {
            continue;
        }
        by_city.entry(city::normalize(&city::extract_city(&stop.name))).or_default().push(stop);
    }

    for group in by_city.values() {
        for i in 0..group.len() {
            for j in 0..group.len() {
                if i == j {
                    continue;
                }
                let from = group[i];
                let to = group[j];
                if !differing_facility(from, to) {
                    continue;
                }
                let edge = GraphEdge {
                    from_stop_id: from.stop_id.clone(),
                    to_stop_id: to.stop_id.clone(),
                    weight: TRANSFER_EDGE_WEIGHT,
                    route_id: None,
                    transport_type: EdgeKind::Transfer,
                    distance_km: None,
                    flight_id: None,
                };
                let _ = graph.add_edge(edge);
            }
        }
    }
}

/// True when `from`/`to` are tagged with (or their names infer) a
/// different airport/railway/ferry facility kind.
fn differing_facility(from: &Stop, to: &Stop) -> bool {
    let (from_airport, from_railway, from_ferry) = facility_of(from);
    let (to_airport, to_railway, to_ferry) = facility_of(to);
    from_airport != to_airport || from_railway != to_railway || from_ferry != to_ferry
}

/// Stops loaded through `providers::tag_facility_types` already carry
/// explicit flags; this falls back to name-based inference for any stop
/// that reaches the builder untagged (e.g. hand-built in tests).
fn facility_of(stop: &Stop) -> (bool, bool, bool) {
    if stop.is_airport || stop.is_railway || stop.is_ferry_terminal {
        (stop.is_airport, stop.is_railway, stop.is_ferry_terminal)
    } else {
        city::infer_facility(&stop.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinates, DatasetMode};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn stop(id: &str, name: &str) -> Stop {
        let mut s = Stop::new_real(id, name, city::extract_city(name));
        s.coordinates = Some(Coordinates::new(62.0, 129.0));
        s
    }

    #[test]
    fn builds_route_edges_with_duration_split() {
        let dataset = Dataset {
            stops: vec![stop("a", "Автовокзал Якутск"), stop("b", "Автостанция Олёкминск")],
            routes: vec![Route {
                route_id: "r1".to_string(),
                name: "Якутск - Олёкминск".to_string(),
                stops: vec!["a".to_string(), "b".to_string()],
                transport_type: TransportType::Bus,
                base_fare: Decimal::from(1000),
                operator: None,
                duration_minutes: Some(300.0),
                metadata: HashMap::new(),
            }],
            flights: vec![],
            mode: DatasetMode::Real,
            quality: 100.0,
            loaded_at: Utc::now(),
            source: "test".to_string(),
            metadata: HashMap::new(),
        };

        let graph = build(&dataset);
        assert_eq!(graph.node_count(), 2);
        let edges = graph.get_edges_from("a");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].weight, 300.0);
    }

    #[test]
    fn same_city_different_facility_gets_transfer_edge() {
        let dataset = Dataset {
            stops: vec![stop("airport", "Аэропорт Якутск"), stop("bus", "Автовокзал Якутск")],
            routes: vec![],
            flights: vec![],
            mode: DatasetMode::Real,
            quality: 100.0,
            loaded_at: Utc::now(),
            source: "test".to_string(),
            metadata: HashMap::new(),
        };

        let graph = build(&dataset);
        let edges = graph.get_edges_from("airport");
        assert_eq!(edges.len(), 1);
        assert!(matches!(edges[0].transport_type, EdgeKind::Transfer));
        assert_eq!(edges[0].weight, TRANSFER_EDGE_WEIGHT);
    }

    #[test]
    fn same_city_same_facility_gets_no_transfer_edge() {
        let dataset = Dataset {
            stops: vec![stop("bus-1", "Автовокзал Якутск"), stop("bus-2", "Автостанция Якутск")],
            routes: vec![],
            flights: vec![],
            mode: DatasetMode::Real,
            quality: 100.0,
            loaded_at: Utc::now(),
            source: "test".to_string(),
            metadata: HashMap::new(),
        };

        let graph = build(&dataset);
        assert_eq!(graph.edge_count(), 0, "two bus stops in the same city share a facility, so no transfer edge");
    }

    #[test]
    fn malformed_route_is_skipped() {
        let dataset = Dataset {
            stops: vec![stop("a", "Якутск")],
            routes: vec![Route {
                route_id: "bad".to_string(),
                name: "lonely".to_string(),
                stops: vec!["a".to_string()],
                transport_type: TransportType::Bus,
                base_fare: Decimal::ZERO,
                operator: None,
                duration_minutes: None,
                metadata: HashMap::new(),
            }],
            flights: vec![],
            mode: DatasetMode::Real,
            quality: 100.0,
            loaded_at: Utc::now(),
            source: "test".to_string(),
            metadata: HashMap::new(),
        };

        let graph = build(&dataset);
        assert_eq!(graph.edge_count(), 0);
    }
}
