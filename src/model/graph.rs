//! The pipeline graph: an arena of nodes plus a flat edge list.
//!
//! Nodes are keyed by stable id; edges are plain id pairs. Insertion order
//! of both nodes and edges is preserved so that compilation output is
//! reproducible for identical graphs.

use std::collections::HashMap;

use petgraph::{algo::has_path_connecting, graph::DiGraph};
use serde::{Deserialize, Serialize};

use crate::{
    CellflowError, Result,
    model::{Edge, Node, NodeId},
};

/// The node set plus the edge set for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    nodes: HashMap<NodeId, Node>,
    /// node ids in first-materialization order
    order: Vec<NodeId>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// add a node to the arena, replacing any node with the same id
    pub fn add_node(
        &mut self,
        node: Node,
    ) {
        if !self.nodes.contains_key(&node.id) {
            self.order.push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// get node by id
    pub fn get(
        &self,
        id: &str,
    ) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// get mutable node by id
    pub fn get_mut(
        &mut self,
        id: &str,
    ) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// all nodes in first-materialization order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// all edges in connection order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Remove a node and every incident edge atomically.
    ///
    /// Returns the removed node and the pruned edges so the caller can
    /// recompile former downstream targets. No orphan edges remain.
    pub fn remove_node(
        &mut self,
        id: &str,
    ) -> Option<(Node, Vec<Edge>)> {
        let node = self.nodes.remove(id)?;
        self.order.retain(|n| n != id);
        let (pruned, kept): (Vec<Edge>, Vec<Edge>) = self.edges.drain(..).partition(|e| e.source == id || e.target == id);
        self.edges = kept;
        Some((node, pruned))
    }

    /// Connect two ports.
    ///
    /// Rejected when an endpoint is missing, a port is not declared on its
    /// schema, the edge already exists, or the connection would introduce a
    /// cycle (reachability check from target to source before accepting).
    pub fn connect(
        &mut self,
        edge: Edge,
    ) -> Result<()> {
        let source = self.nodes.get(&edge.source).ok_or(CellflowError::Edge(format!("source node {} not found", edge.source)))?;
        let target = self.nodes.get(&edge.target).ok_or(CellflowError::Edge(format!("target node {} not found", edge.target)))?;

        let source_schema = source.schema.as_ref().ok_or(CellflowError::Edge(format!("source node {} has no schema", edge.source)))?;
        let target_schema = target.schema.as_ref().ok_or(CellflowError::Edge(format!("target node {} has no schema", edge.target)))?;

        if source_schema.output(&edge.source_port).is_none() {
            return Err(CellflowError::Edge(format!("output port {} not declared on node {}", edge.source_port, edge.source)));
        }
        if target_schema.input(&edge.target_port).is_none() {
            return Err(CellflowError::Edge(format!("input port {} not declared on node {}", edge.target_port, edge.target)));
        }
        if self.edges.contains(&edge) {
            return Err(CellflowError::Edge(format!("edge {}:{} -> {}:{} already exists", edge.source, edge.source_port, edge.target, edge.target_port)));
        }
        if self.would_create_cycle(&edge.source, &edge.target) {
            return Err(CellflowError::Edge(format!("connecting {} -> {} would create a cycle", edge.source, edge.target)));
        }

        self.edges.push(edge);
        Ok(())
    }

    /// Re-insert a persisted edge while rebuilding from the store.
    ///
    /// Unlike `connect` this skips port and cycle validation: the document
    /// is the source of truth, and a reloaded document may predate the
    /// reject-at-connect policy. Edges with a dead endpoint are dropped.
    pub(crate) fn restore_edge(
        &mut self,
        edge: Edge,
    ) {
        if !self.nodes.contains_key(&edge.source) || !self.nodes.contains_key(&edge.target) {
            tracing::warn!("dropping dangling edge {}:{} -> {}:{}", edge.source, edge.source_port, edge.target, edge.target_port);
            return;
        }
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// Remove one edge by its 4-tuple. Returns true if it existed.
    pub fn disconnect(
        &mut self,
        edge: &Edge,
    ) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e != edge);
        before != self.edges.len()
    }

    /// incoming edges of a node, in connection order
    pub fn incoming(
        &self,
        id: &str,
    ) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.target == id).collect()
    }

    /// outgoing edges of a node, in connection order
    pub fn outgoing(
        &self,
        id: &str,
    ) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.source == id).collect()
    }

    /// Resolve the input bindings of a node: each connected input port maps
    /// to the upstream output-variable name. Unconnected ports are absent.
    pub fn input_bindings(
        &self,
        id: &str,
    ) -> HashMap<String, String> {
        let mut bindings = HashMap::new();
        for edge in self.incoming(id) {
            if let Some(upstream) = self.nodes.get(&edge.source) {
                if let Some(var) = upstream.output_variables.get(&edge.source_port) {
                    bindings.insert(edge.target_port.clone(), var.clone());
                }
            }
        }
        bindings
    }

    /// Reachability check over the current edge list: would source -> target
    /// close a loop, i.e. is source already reachable from target?
    fn would_create_cycle(
        &self,
        source: &str,
        target: &str,
    ) -> bool {
        if source == target {
            return true;
        }
        let mut graph = DiGraph::<&str, ()>::new();
        let mut indices = HashMap::new();
        for id in self.order.iter() {
            indices.insert(id.as_str(), graph.add_node(id.as_str()));
        }
        for edge in self.edges.iter() {
            if let (Some(s), Some(t)) = (indices.get(edge.source.as_str()), indices.get(edge.target.as_str())) {
                graph.add_edge(*s, *t, ());
            }
        }
        match (indices.get(target), indices.get(source)) {
            (Some(t), Some(s)) => has_path_connecting(&graph, *t, *s, None),
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{NodeSchema, Port};

    fn schema_node(
        id: &str,
        seq: u32,
        inputs: &[&str],
        outputs: &[&str],
    ) -> Node {
        let mut node = Node::free(id.to_string(), seq);
        node.attach_schema(NodeSchema {
            function_id: format!("pkg.{}", id),
            name: id.to_string(),
            inputs: inputs
                .iter()
                .map(|n| Port {
                    name: n.to_string(),
                    ..Default::default()
                })
                .collect(),
            outputs: outputs
                .iter()
                .map(|n| Port {
                    name: n.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        });
        node
    }

    fn chain() -> Graph {
        let mut graph = Graph::new();
        graph.add_node(schema_node("a", 1, &[], &["out"]));
        graph.add_node(schema_node("b", 2, &["df"], &["out"]));
        graph.add_node(schema_node("c", 3, &["df"], &["out"]));
        graph.connect(Edge::new("a", "out", "b", "df")).unwrap();
        graph.connect(Edge::new("b", "out", "c", "df")).unwrap();
        graph
    }

    #[test]
    fn test_connect_rejects_cycle() {
        let mut graph = chain();
        let err = graph.connect(Edge::new("c", "out", "a", "df")).unwrap_err();
        assert!(matches!(err, CellflowError::Edge(_)));
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_connect_rejects_duplicate_and_unknown_port() {
        let mut graph = chain();
        assert!(graph.connect(Edge::new("a", "out", "b", "df")).is_err());
        assert!(graph.connect(Edge::new("a", "missing", "b", "df")).is_err());
        assert!(graph.connect(Edge::new("a", "out", "b", "missing")).is_err());
    }

    #[test]
    fn test_remove_node_cascades_edges() {
        let mut graph = chain();
        let (_, pruned) = graph.remove_node("b").unwrap();
        assert_eq!(pruned.len(), 2);
        assert!(graph.edges().is_empty());
        assert!(graph.edges().iter().all(|e| graph.get(&e.source).is_some() && graph.get(&e.target).is_some()));
    }

    #[test]
    fn test_input_bindings_follow_edges() {
        let graph = chain();
        let bindings = graph.input_bindings("b");
        assert_eq!(bindings.get("df").unwrap(), "n01_out");
        assert!(graph.input_bindings("a").is_empty());
    }
}
