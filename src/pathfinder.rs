//! Path finder (C8, spec §4.8).
//!
//! Pure function of a built `TransportGraph`: multi-source/multi-target
//! Dijkstra with a deterministic tie-break, segment reconstruction, and a
//! bounded set of alternatives. Carries no knowledge of the originating
//! `Dataset` — a `GRAPH_OUT_OF_SYNC` classification (catalog has the city,
//! graph does not) is the graph manager's job, since only it holds both
//! sides. The multi-path exploration is adapted from the teacher's
//! `Optimizer::find_k_shortest_paths`: a `BinaryHeap<SearchState>` with a
//! per-node visit cap, generalized from cost-in-decimal to minutes-as-f64
//! and from a single destination to a destination set.

use crate::error::SearchError;
use crate::graph::TransportGraph;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use petgraph::graph::NodeIndex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// One leg of a route after collapsing consecutive same-route edges.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Segment {
    pub segment_id: String,
    pub from: String,
    pub to: String,
    pub transport_type: &'static str,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub duration_minutes: f64,
    pub route_id: Option<String>,
    pub flight_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RouteResult {
    pub segments: Vec<Segment>,
    pub total_duration_minutes: f64,
    pub stop_sequence: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub success: bool,
    pub routes: Vec<RouteResult>,
    pub alternatives: Vec<RouteResult>,
    pub execution_time_ms: f64,
    pub graph_available: bool,
    pub error: Option<SearchError>,
}

impl SearchOutcome {
    fn failure(error: SearchError, elapsed_ms: f64) -> Self {
        SearchOutcome {
            success: false,
            routes: Vec::new(),
            alternatives: Vec::new(),
            execution_time_ms: elapsed_ms,
            graph_available: !matches!(error, SearchError::GraphUnavailable),
            error: Some(error),
        }
    }
}

/// Internal exploration state: the full accumulated path, kept so the
/// heap's `Ord` can break distance ties by segment count then by
/// lexicographic stop-id sequence (spec §4.8 step 2). `segment_count`
/// mirrors `reconstruct`'s collapsing rule (consecutive edges sharing a
/// `Some` `routeId` are one segment) incrementally, so it always matches
/// the segment count `reconstruct` would produce from `edges` without
/// re-walking the path on every heap comparison.
#[derive(Debug, Clone)]
struct SearchState {
    node: NodeIndex,
    dist: f64,
    stop_sequence: Vec<String>,
    edges: Vec<EdgeSnapshot>,
    segment_count: usize,
}

#[derive(Debug, Clone)]
struct EdgeSnapshot {
    weight: f64,
    route_id: Option<String>,
    flight_id: Option<String>,
    transport_type: &'static str,
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist && self.segment_count == other.segment_count && self.stop_sequence == other.stop_sequence
    }
}
impl Eq for SearchState {}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .partial_cmp(&self.dist)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.segment_count.cmp(&self.segment_count))
            .then_with(|| other.stop_sequence.cmp(&self.stop_sequence))
    }
}
impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Entry point for a route search, spec §4.8.
pub fn search(
    graph: &TransportGraph,
    from_city: &str,
    to_city: &str,
    date: DateTime<Utc>,
    k_alternatives: usize,
) -> SearchOutcome {
    let start = std::time::Instant::now();
    let elapsed_ms = |start: std::time::Instant| start.elapsed().as_secs_f64() * 1000.0;

    let audit = graph.validate_all_edges_weight(5);
    if audit.total_invalid > 0 {
        return SearchOutcome::failure(
            SearchError::GraphInvalid(format!("{} edge(s) fail the weight invariant", audit.total_invalid)),
            elapsed_ms(start),
        );
    }

    let from_nodes = graph.find_nodes_by_city(from_city);
    let to_nodes = graph.find_nodes_by_city(to_city);
    if from_nodes.is_empty() {
        return SearchOutcome::failure(SearchError::StopsNotFound(from_city.to_string()), elapsed_ms(start));
    }
    if to_nodes.is_empty() {
        return SearchOutcome::failure(SearchError::StopsNotFound(to_city.to_string()), elapsed_ms(start));
    }

    let from_idxs: Vec<NodeIndex> = from_nodes
        .iter()
        .filter_map(|n| graph.node_index_of(&n.stop_id))
        .collect();
    let to_idx_set: HashSet<NodeIndex> = to_nodes
        .iter()
        .filter_map(|n| graph.node_index_of(&n.stop_id))
        .collect();

    let wanted = k_alternatives.max(1) + 1;
    let found = explore(graph, &from_idxs, &to_idx_set, wanted);

    if found.is_empty() {
        return SearchOutcome::failure(
            SearchError::RoutesNotFound { from: from_city.to_string(), to: to_city.to_string() },
            elapsed_ms(start),
        );
    }

    let primary = reconstruct(&found[0], date);
    let mut alternatives = Vec::new();
    for candidate in &found[1..] {
        let route = reconstruct(candidate, date);
        let same_duration_same_shape = (route.total_duration_minutes - primary.total_duration_minutes).abs() < f64::EPSILON
            && route.stop_sequence == primary.stop_sequence;
        if !same_duration_same_shape {
            alternatives.push(route);
        }
        if alternatives.len() >= k_alternatives {
            break;
        }
    }
    alternatives.sort_by(|a, b| a.total_duration_minutes.partial_cmp(&b.total_duration_minutes).unwrap_or(Ordering::Equal));

    SearchOutcome {
        success: true,
        routes: vec![primary],
        alternatives,
        execution_time_ms: elapsed_ms(start),
        graph_available: true,
        error: None,
    }
}

/// Multi-source, multi-target Dijkstra over a bounded per-node visit count,
/// collecting up to `wanted` distinct completed paths in deterministic pop
/// order. The first completed path is the optimum under the tie-break
/// rules encoded in `SearchState::cmp`; subsequent ones are candidate
/// alternatives (spec §4.8 step 4).
fn explore(
    graph: &TransportGraph,
    from_idxs: &[NodeIndex],
    to_idx_set: &HashSet<NodeIndex>,
    wanted: usize,
) -> Vec<SearchState> {
    const MAX_VISITS_PER_NODE: usize = 4;
    const MAX_ITERATIONS: usize = 200_000;

    let mut heap = BinaryHeap::new();
    for &idx in from_idxs {
        if let Some(node) = graph.get_node_by_index(idx) {
            heap.push(SearchState { node: idx, dist: 0.0, stop_sequence: vec![node.stop_id.clone()], edges: Vec::new(), segment_count: 0 });
        }
    }

    let mut visits: std::collections::HashMap<NodeIndex, usize> = std::collections::HashMap::new();
    let mut completed = Vec::new();
    let mut iterations = 0usize;

    while let Some(state) = heap.pop() {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            break;
        }

        let count = visits.entry(state.node).or_insert(0);
        *count += 1;
        if *count > MAX_VISITS_PER_NODE {
            continue;
        }

        if to_idx_set.contains(&state.node) && !state.edges.is_empty() {
            completed.push(state.clone());
            if completed.len() >= wanted {
                break;
            }
            continue;
        }

        let current_stop_id = state.stop_sequence.last().cloned().unwrap_or_default();
        for edge in graph.get_edges_from(&current_stop_id) {
            let Some(target_idx) = graph.node_index_of(&edge.to_stop_id) else { continue };

            let mut next_sequence = state.stop_sequence.clone();
            next_sequence.push(edge.to_stop_id.clone());
            let continues_segment =
                state.edges.last().is_some_and(|last| last.route_id.is_some() && last.route_id == edge.route_id);
            let next_segment_count = if continues_segment { state.segment_count } else { state.segment_count + 1 };
            let mut next_edges = state.edges.clone();
            next_edges.push(EdgeSnapshot {
                weight: edge.weight,
                route_id: edge.route_id.clone(),
                flight_id: edge.flight_id.clone(),
                transport_type: edge.transport_type.as_str(),
            });

            heap.push(SearchState {
                node: target_idx,
                dist: state.dist + edge.weight,
                stop_sequence: next_sequence,
                edges: next_edges,
                segment_count: next_segment_count,
            });
        }
    }

    completed
}

/// Walks a completed search state into a `RouteResult`, collapsing
/// consecutive edges that share a `routeId` into one segment (spec §4.8
/// step 3).
fn reconstruct(state: &SearchState, base_time: DateTime<Utc>) -> RouteResult {
    let mut segments = Vec::new();
    let mut current_time = base_time;
    let mut i = 0;
    let mut seq = 0usize;

    while i < state.edges.len() {
        let route_id = state.edges[i].route_id.clone();
        let mut j = i;
        if route_id.is_some() {
            while j + 1 < state.edges.len() && state.edges[j + 1].route_id == route_id {
                j += 1;
            }
        }

        let duration: f64 = state.edges[i..=j].iter().map(|e| e.weight).sum();
        let departure = current_time;
        let arrival = departure + ChronoDuration::seconds((duration * 60.0) as i64);

        segments.push(Segment {
            segment_id: format!("segment-{seq}"),
            from: state.stop_sequence[i].clone(),
            to: state.stop_sequence[j + 1].clone(),
            transport_type: state.edges[i].transport_type,
            departure_time: departure,
            arrival_time: arrival,
            duration_minutes: duration,
            route_id,
            flight_id: if j == i { state.edges[i].flight_id.clone() } else { None },
        });

        current_time = arrival;
        seq += 1;
        i = j + 1;
    }

    RouteResult {
        total_duration_minutes: state.edges.iter().map(|e| e.weight).sum(),
        stop_sequence: state.stop_sequence.clone(),
        segments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeKind, GraphEdge, GraphNode, TransportGraph};
    use crate::model::TransportType;

    fn node(id: &str, city: &str) -> GraphNode {
        GraphNode { stop_id: id.to_string(), stop_name: id.to_string(), city_name: city.to_string(), coordinates: None, is_virtual: false }
    }

    fn linear_graph() -> TransportGraph {
        let mut graph = TransportGraph::new();
        graph.add_node(node("a", "Якутск"));
        graph.add_node(node("b", "Покровск"));
        graph.add_node(node("c", "Олёкминск"));
        graph.add_edge(GraphEdge { from_stop_id: "a".into(), to_stop_id: "b".into(), weight: 60.0, route_id: Some("r1".into()), transport_type: EdgeKind::Transport(TransportType::Bus), distance_km: None, flight_id: None }).unwrap();
        graph.add_edge(GraphEdge { from_stop_id: "b".into(), to_stop_id: "c".into(), weight: 90.0, route_id: Some("r1".into()), transport_type: EdgeKind::Transport(TransportType::Bus), distance_km: None, flight_id: None }).unwrap();
        graph
    }

    #[test]
    fn finds_shortest_path_and_collapses_segments() {
        let graph = linear_graph();
        let outcome = search(&graph, "якутск", "олекминск", Utc::now(), 3);
        assert!(outcome.success);
        assert_eq!(outcome.routes.len(), 1);
        let route = &outcome.routes[0];
        assert_eq!(route.segments.len(), 1, "same routeId across both hops collapses into one segment");
        assert_eq!(route.total_duration_minutes, 150.0);
    }

    #[test]
    fn missing_city_is_stops_not_found() {
        let graph = linear_graph();
        let outcome = search(&graph, "нигде", "олекминск", Utc::now(), 3);
        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(SearchError::StopsNotFound(_))));
    }

    #[test]
    fn healthy_graph_passes_the_weight_guardrail() {
        let graph = linear_graph();
        let audit = graph.validate_all_edges_weight(5);
        assert_eq!(audit.total_invalid, 0);
    }

    #[test]
    fn unreachable_destination_is_routes_not_found() {
        let mut graph = TransportGraph::new();
        graph.add_node(node("a", "Якутск"));
        graph.add_node(node("z", "Нерюнгри"));
        let outcome = search(&graph, "якутск", "нерюнгри", Utc::now(), 3);
        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(SearchError::RoutesNotFound { .. })));
    }
}
