//! In-memory graph (C7, spec §4.7).
//!
//! Owns the node/edge tables behind typed operations only — callers never
//! touch the maps directly (Design Notes: "dense adjacency lists keyed by
//! stopId, plus a secondary index by cityId; edge objects are value
//! types"). Built on `petgraph`, the teacher's graph dependency, wrapped so
//! the invariants I1-I6 of spec §3 are enforced at every public mutation.

pub mod builder;

use crate::error::InvalidEdge;
use crate::model::{Coordinates, TransportType};
use crate::recovery::city;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// A node in the transport graph (spec §3 GraphNode).
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub stop_id: String,
    pub stop_name: String,
    pub city_name: String,
    pub coordinates: Option<Coordinates>,
    pub is_virtual: bool,
}

/// Edge kind, extending `TransportType` with the synthetic `TRANSFER` kind
/// used for intra-city mode changes (spec §3 GraphEdge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Transport(TransportType),
    Transfer,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Transport(t) => t.as_str(),
            EdgeKind::Transfer => "transfer",
        }
    }
}

/// A directed edge in the transport graph (spec §3 GraphEdge).
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub from_stop_id: String,
    pub to_stop_id: String,
    pub weight: f64,
    pub route_id: Option<String>,
    pub transport_type: EdgeKind,
    pub distance_km: Option<f64>,
    pub flight_id: Option<String>,
}

pub const TRANSFER_EDGE_WEIGHT: f64 = 90.0;

/// Result of `synchronize()` (spec §4.7).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub removed_edges: usize,
    pub fixed_edges: usize,
    pub initialized_nodes: usize,
}

/// Result of `validate()` (spec §4.7).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Result of `validateAllEdgesWeight()` (spec §4.7).
#[derive(Debug, Clone, Default)]
pub struct WeightAuditReport {
    pub total_invalid: usize,
    pub sample: Vec<(String, String, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub virtual_node_count: usize,
    pub cities_indexed: usize,
}

/// The in-memory transport graph. Published snapshots are immutable;
/// `Clone` backs the graph manager's swap-on-resync behavior (spec §5).
#[derive(Clone)]
pub struct TransportGraph {
    inner: DiGraph<GraphNode, GraphEdge>,
    node_index: HashMap<String, NodeIndex>,
    /// Secondary index by normalized city name, per Design Notes.
    city_index: HashMap<String, Vec<String>>,
}

impl TransportGraph {
    pub fn new() -> Self {
        TransportGraph { inner: DiGraph::new(), node_index: HashMap::new(), city_index: HashMap::new() }
    }

    pub fn clear(&mut self) {
        self.inner = DiGraph::new();
        self.node_index.clear();
        self.city_index.clear();
    }

    /// Idempotent by `stopId`; ensures an (initially empty) adjacency entry
    /// exists for the node (I2), satisfied automatically by petgraph.
    pub fn add_node(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&node.stop_id) {
            self.inner[idx] = node;
            return idx;
        }

        let normalized_city = city::normalize(&node.city_name);
        let stop_id = node.stop_id.clone();
        let idx = self.inner.add_node(node);
        self.node_index.insert(stop_id.clone(), idx);
        self.city_index.entry(normalized_city).or_default().push(stop_id);
        idx
    }

    /// Rejects a mutation that would violate I1/I3/I4/I5.
    pub fn add_edge(&mut self, edge: GraphEdge) -> Result<EdgeIndex, InvalidEdge> {
        if edge.from_stop_id == edge.to_stop_id {
            return Err(InvalidEdge::SelfLoop(edge.from_stop_id));
        }
        if !edge.weight.is_finite() || edge.weight <= 0.0 {
            return Err(InvalidEdge::NonPositiveWeight(edge.weight.to_string()));
        }

        let from_idx = *self
            .node_index
            .get(&edge.from_stop_id)
            .ok_or_else(|| InvalidEdge::UnknownEndpoint(edge.from_stop_id.clone()))?;
        let to_idx = *self
            .node_index
            .get(&edge.to_stop_id)
            .ok_or_else(|| InvalidEdge::UnknownEndpoint(edge.to_stop_id.clone()))?;

        // I5: idempotent on (from, to, routeId).
        if let Some(existing) = self
            .inner
            .edges(from_idx)
            .find(|e| e.target() == to_idx && e.weight().route_id == edge.route_id)
        {
            let existing_idx = existing.id();
            self.inner[existing_idx] = edge;
            return Ok(existing_idx);
        }

        Ok(self.inner.add_edge(from_idx, to_idx, edge))
    }

    pub fn get_node(&self, stop_id: &str) -> Option<&GraphNode> {
        self.node_index.get(stop_id).map(|&idx| &self.inner[idx])
    }

    pub fn get_edges_from(&self, stop_id: &str) -> Vec<&GraphEdge> {
        let Some(&idx) = self.node_index.get(stop_id) else { return Vec::new() };
        self.inner.edges(idx).map(|e| e.weight()).collect()
    }

    pub fn get_neighbors(&self, stop_id: &str) -> Vec<&GraphNode> {
        let Some(&idx) = self.node_index.get(stop_id) else { return Vec::new() };
        self.inner.edges(idx).map(|e| &self.inner[e.target()]).collect()
    }

    /// Query helper using normalized city comparison (spec §4.7).
    pub fn find_nodes_by_city(&self, city_name: &str) -> Vec<&GraphNode> {
        let normalized = city::normalize(city_name);
        self.city_index
            .get(&normalized)
            .map(|ids| ids.iter().filter_map(|id| self.get_node(id)).collect())
            .unwrap_or_default()
    }

    /// Distinct display city names, one per normalized city-index bucket,
    /// sorted for stable pagination (GET /api/v1/cities).
    pub fn list_cities(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .city_index
            .values()
            .filter_map(|ids| ids.first())
            .filter_map(|id| self.get_node(id))
            .map(|node| node.city_name.clone())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn node_index_of(&self, stop_id: &str) -> Option<NodeIndex> {
        self.node_index.get(stop_id).copied()
    }

    pub(crate) fn get_node_by_index(&self, idx: NodeIndex) -> Option<&GraphNode> {
        self.inner.node_weight(idx)
    }

    pub(crate) fn inner(&self) -> &DiGraph<GraphNode, GraphEdge> {
        &self.inner
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.inner.node_count(),
            edge_count: self.inner.edge_count(),
            virtual_node_count: self.inner.node_weights().filter(|n| n.is_virtual).count(),
            cities_indexed: self.city_index.len(),
        }
    }

    /// Drops orphan edges (I1), adds missing empty adjacency lists (I2,
    /// trivially true under petgraph), dedupes edges (I5). Idempotent.
    pub fn synchronize(&mut self) -> SyncReport {
        let valid_indices: std::collections::HashSet<NodeIndex> = self.inner.node_indices().collect();

        let orphan_edges: Vec<EdgeIndex> = self
            .inner
            .edge_indices()
            .filter(|&e| {
                let (a, b) = self.inner.edge_endpoints(e).unwrap();
                !valid_indices.contains(&a) || !valid_indices.contains(&b)
            })
            .collect();
        let removed_edges = orphan_edges.len();
        for e in orphan_edges {
            self.inner.remove_edge(e);
        }

        let mut seen: HashMap<(NodeIndex, NodeIndex, Option<String>), EdgeIndex> = HashMap::new();
        let mut duplicates = Vec::new();
        for e in self.inner.edge_indices() {
            let (a, b) = self.inner.edge_endpoints(e).unwrap();
            let key = (a, b, self.inner[e].route_id.clone());
            if seen.contains_key(&key) {
                duplicates.push(e);
            } else {
                seen.insert(key, e);
            }
        }
        let fixed_edges = duplicates.len();
        for e in duplicates {
            self.inner.remove_edge(e);
        }

        // Rebuild the city index in case nodes were added out of band.
        self.city_index.clear();
        let mut initialized_nodes = 0usize;
        for idx in self.inner.node_indices() {
            let node = &self.inner[idx];
            self.city_index.entry(city::normalize(&node.city_name)).or_default().push(node.stop_id.clone());
            initialized_nodes += 1;
        }

        SyncReport { removed_edges, fixed_edges, initialized_nodes }
    }

    /// Checks I1-I5.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();
        let valid_indices: std::collections::HashSet<NodeIndex> = self.inner.node_indices().collect();

        for e in self.inner.edge_indices() {
            let (a, b) = self.inner.edge_endpoints(e).unwrap();
            if !valid_indices.contains(&a) || !valid_indices.contains(&b) {
                errors.push(format!("edge {e:?} references a missing endpoint"));
            }
            let edge = &self.inner[e];
            if !edge.weight.is_finite() || edge.weight <= 0.0 {
                errors.push(format!("edge {}->{} has invalid weight {}", edge.from_stop_id, edge.to_stop_id, edge.weight));
            }
            if edge.from_stop_id == edge.to_stop_id {
                errors.push(format!("self-loop at {}", edge.from_stop_id));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for e in self.inner.edge_indices() {
            let edge = &self.inner[e];
            let key = (edge.from_stop_id.clone(), edge.to_stop_id.clone(), edge.route_id.clone());
            if !seen.insert(key) {
                errors.push(format!("duplicate edge {}->{} (route {:?})", edge.from_stop_id, edge.to_stop_id, edge.route_id));
            }
        }

        ValidationReport { is_valid: errors.is_empty(), errors }
    }

    /// Returns up to `limit` invalid edges plus the total invalid count.
    /// A graph failing this check must not be served to search (spec §4.7).
    pub fn validate_all_edges_weight(&self, limit: usize) -> WeightAuditReport {
        let mut total_invalid = 0usize;
        let mut sample = Vec::new();
        for edge in self.inner.edge_weights() {
            if !edge.weight.is_finite() || edge.weight <= 0.0 {
                total_invalid += 1;
                if sample.len() < limit {
                    sample.push((edge.from_stop_id.clone(), edge.to_stop_id.clone(), edge.weight));
                }
            }
        }
        WeightAuditReport { total_invalid, sample }
    }
}

impl Default for TransportGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, city: &str) -> GraphNode {
        GraphNode {
            stop_id: id.to_string(),
            stop_name: id.to_string(),
            city_name: city.to_string(),
            coordinates: None,
            is_virtual: false,
        }
    }

    #[test]
    fn add_node_and_edge_round_trip() {
        let mut graph = TransportGraph::new();
        graph.add_node(node("a", "Якутск"));
        graph.add_node(node("b", "Олёкминск"));

        let result = graph.add_edge(GraphEdge {
            from_stop_id: "a".to_string(),
            to_stop_id: "b".to_string(),
            weight: 240.0,
            route_id: Some("r1".to_string()),
            transport_type: EdgeKind::Transport(TransportType::Bus),
            distance_km: None,
            flight_id: None,
        });
        assert!(result.is_ok());
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn rejects_invalid_weight() {
        let mut graph = TransportGraph::new();
        graph.add_node(node("a", "A"));
        graph.add_node(node("b", "B"));
        let result = graph.add_edge(GraphEdge {
            from_stop_id: "a".to_string(),
            to_stop_id: "b".to_string(),
            weight: f64::NAN,
            route_id: None,
            transport_type: EdgeKind::Transfer,
            distance_km: None,
            flight_id: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn rejects_self_loop() {
        let mut graph = TransportGraph::new();
        graph.add_node(node("a", "A"));
        let result = graph.add_edge(GraphEdge {
            from_stop_id: "a".to_string(),
            to_stop_id: "a".to_string(),
            weight: 5.0,
            route_id: None,
            transport_type: EdgeKind::Transfer,
            distance_km: None,
            flight_id: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let mut graph = TransportGraph::new();
        graph.add_node(node("a", "A"));
        graph.add_node(node("b", "B"));
        let edge = || GraphEdge {
            from_stop_id: "a".to_string(),
            to_stop_id: "b".to_string(),
            weight: 10.0,
            route_id: Some("r1".to_string()),
            transport_type: EdgeKind::Transport(TransportType::Bus),
            distance_km: None,
            flight_id: None,
        };
        graph.add_edge(edge()).unwrap();
        graph.add_edge(edge()).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn find_nodes_by_city_normalizes() {
        let mut graph = TransportGraph::new();
        graph.add_node(node("a", "Олёкминск"));
        let found = graph.find_nodes_by_city("олекминск");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn synchronize_is_idempotent_and_validate_passes() {
        let mut graph = TransportGraph::new();
        graph.add_node(node("a", "A"));
        graph.add_node(node("b", "B"));
        graph.add_edge(GraphEdge {
            from_stop_id: "a".to_string(),
            to_stop_id: "b".to_string(),
            weight: 10.0,
            route_id: None,
            transport_type: EdgeKind::Transfer,
            distance_km: None,
            flight_id: None,
        }).unwrap();

        let first = graph.synchronize();
        let second = graph.synchronize();
        assert_eq!(first.removed_edges, 0);
        assert_eq!(second.removed_edges, 0);
        assert!(graph.validate().is_valid);
    }
}
