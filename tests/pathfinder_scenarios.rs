//! Integration coverage for the path finder against spec §8's universal
//! property U6 and concrete scenarios S3/S4/S7.

use chrono::Utc;
use transit_router::error::SearchError;
use transit_router::graph::{EdgeKind, GraphEdge, GraphNode, TransportGraph};
use transit_router::model::TransportType;
use transit_router::pathfinder::search;

fn node(id: &str, city: &str) -> GraphNode {
    GraphNode { stop_id: id.to_string(), stop_name: id.to_string(), city_name: city.to_string(), coordinates: None, is_virtual: false }
}

fn edge(from: &str, to: &str, weight: f64, route_id: &str, kind: EdgeKind) -> GraphEdge {
    GraphEdge {
        from_stop_id: from.to_string(),
        to_stop_id: to.to_string(),
        weight,
        route_id: Some(route_id.to_string()),
        transport_type: kind,
        distance_km: None,
        flight_id: None,
    }
}

#[test]
fn s3_single_bus_hop_between_two_cities() {
    let mut graph = TransportGraph::new();
    graph.add_node(node("yak-bus", "Якутск"));
    graph.add_node(node("olek-bus", "Олёкминск"));
    graph.add_edge(edge("yak-bus", "olek-bus", 240.0, "r1", EdgeKind::Transport(TransportType::Bus))).unwrap();

    let outcome = search(&graph, "якутск", "олекминск", Utc::now(), 1);
    assert!(outcome.success);
    assert!(!outcome.routes.is_empty());

    let route = &outcome.routes[0];
    assert_eq!(route.segments.len(), 1);
    assert_eq!(route.segments[0].transport_type, "bus");
    assert_eq!(route.total_duration_minutes, 240.0);
}

#[test]
fn s4_multi_leg_plane_transfer_bus_collapses_to_two_segments_totalling_510() {
    let mut graph = TransportGraph::new();
    graph.add_node(node("novo-air", "Новосибирск"));
    graph.add_node(node("yak-air", "Якутск"));
    graph.add_node(node("yak-bus", "Якутск"));
    graph.add_node(node("olek-bus", "Олёкминск"));

    graph.add_edge(edge("novo-air", "yak-air", 240.0, "flight-1", EdgeKind::Transport(TransportType::Airplane))).unwrap();
    graph
        .add_edge(GraphEdge {
            from_stop_id: "yak-air".to_string(),
            to_stop_id: "yak-bus".to_string(),
            weight: 90.0,
            route_id: None,
            transport_type: EdgeKind::Transfer,
            distance_km: None,
            flight_id: None,
        })
        .unwrap();
    graph.add_edge(edge("yak-bus", "olek-bus", 180.0, "r1", EdgeKind::Transport(TransportType::Bus))).unwrap();

    let outcome = search(&graph, "новосибирск", "олекминск", Utc::now(), 0);
    assert!(outcome.success);

    let route = &outcome.routes[0];
    assert_eq!(route.total_duration_minutes, 510.0);
    // Each leg has a distinct routeId/no-routeId marker, so none of the
    // three edges collapse into each other: airplane, transfer, bus.
    assert_eq!(route.segments.len(), 3);
    assert_eq!(route.segments[0].transport_type, "airplane");
    assert_eq!(route.segments[1].transport_type, "transfer");
    assert_eq!(route.segments[2].transport_type, "bus");
}

#[test]
fn s7_unknown_city_reports_stops_not_found_with_the_city_name() {
    let mut graph = TransportGraph::new();
    graph.add_node(node("olek-bus", "Олёкминск"));

    let outcome = search(&graph, "Nonexistent", "олекминск", Utc::now(), 1);
    assert!(!outcome.success);
    match outcome.error {
        Some(SearchError::StopsNotFound(city)) => {
            let message = SearchError::StopsNotFound(city).to_string();
            assert!(message.contains("No stops found for city: Nonexistent"));
        }
        other => panic!("expected StopsNotFound, got {other:?}"),
    }
}

#[test]
fn u6_search_terminates_and_returns_the_minimal_duration_among_simple_paths() {
    let mut graph = TransportGraph::new();
    graph.add_node(node("a", "Якутск"));
    graph.add_node(node("b", "Покровск"));
    graph.add_node(node("c", "Олёкминск"));

    // Direct path a->c costs 500; via b it costs 60+90=150, strictly shorter.
    graph.add_edge(edge("a", "c", 500.0, "direct", EdgeKind::Transport(TransportType::Bus))).unwrap();
    graph.add_edge(edge("a", "b", 60.0, "leg1", EdgeKind::Transport(TransportType::Bus))).unwrap();
    graph.add_edge(edge("b", "c", 90.0, "leg2", EdgeKind::Transport(TransportType::Bus))).unwrap();

    let outcome = search(&graph, "якутск", "олекминск", Utc::now(), 2);
    assert!(outcome.success);
    assert_eq!(outcome.routes[0].total_duration_minutes, 150.0);
}
