//! The `GraphStore` contract: a labeled property graph supporting
//! MERGE (create-if-absent) semantics, bounded variable-length path
//! traversal, and a query-summary result shape. The ingester and the
//! production graph database are out of scope for this crate; [`InMemoryGraph`]
//! is the reference implementation used by the native search engine and by
//! this crate's own tests.

use super::edge::{Edge, EdgeKind};
use super::node::{Node, NodeId, NodeKind};
use std::collections::HashMap;

/// Mirrors a Neo4j-style `summary()`: timing plus creation counters, used by
/// the fixpoint driver to decide whether an iteration made progress.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct QuerySummary {
    pub result_available_after_ms: u64,
    pub result_consumed_after_ms: u64,
    pub nodes_created: usize,
    pub relationships_created: usize,
}

impl QuerySummary {
    pub fn total_created(&self) -> usize {
        self.nodes_created + self.relationships_created
    }

    pub fn merge(&mut self, other: &QuerySummary) {
        self.result_available_after_ms += other.result_available_after_ms;
        self.result_consumed_after_ms += other.result_consumed_after_ms;
        self.nodes_created += other.nodes_created;
        self.relationships_created += other.relationships_created;
    }
}

/// The graph-database contract the fixpoint driver and native engine depend
/// on. A production deployment implements this against a real Cypher-speaking
/// store; [`InMemoryGraph`] implements it directly over in-process vectors.
pub trait GraphStore {
    fn nodes(&self) -> &[Node];
    fn edges(&self) -> &[Edge];

    fn node(&self, id: NodeId) -> Option<&Node>;

    /// Create the node if no existing node shares its (kind, arn-or-name,
    /// primary type label) key; otherwise return the existing node's id.
    /// Mirrors Cypher `MERGE (n:Label {Arn: ...})`.
    fn merge_node(&mut self, node: Node) -> (NodeId, bool);

    /// Create the edge if no existing edge of the same kind-discriminant
    /// connects `source` to `target`; otherwise return the existing edge's
    /// index. Mirrors Cypher `MERGE (a)-[:KIND]->(b)`.
    fn merge_edge(&mut self, edge: Edge) -> (usize, bool);

    fn add_label(&mut self, id: NodeId, label: &str);
    fn remove_label(&mut self, id: NodeId, label: &str);

    /// Mutable access to every edge, used by the fixpoint driver's
    /// post-unification pass to rewrite an edge's kind or
    /// properties in place rather than delete-and-recreate.
    fn edges_mut(&mut self) -> &mut [Edge];

    fn edges_from(&self, id: NodeId) -> Vec<&Edge> {
        self.edges().iter().filter(|e| e.source == id).collect()
    }

    fn edges_to(&self, id: NodeId) -> Vec<&Edge> {
        self.edges().iter().filter(|e| e.target == id).collect()
    }

    fn nodes_by_label<'a>(&'a self, label: &'a str) -> Vec<&'a Node> {
        self.nodes().iter().filter(|n| n.has_label(label)).collect()
    }

    fn find_by_arn(&self, arn: &str) -> Option<&Node> {
        self.nodes().iter().find(|n| n.arn.as_deref() == Some(arn))
    }

    /// Delete every `Pattern:*`-labeled node together with its incident edges,
    /// and every edge terminating at an `Admin`-labeled node. Step 1 of the
    /// fixpoint driver.
    fn delete_patterns_and_admin_edges(&mut self) -> QuerySummary;
}

/// In-process reference `GraphStore`. Not a production graph database client
/// — this exists so the policy resolver and the attack-pattern search engine
/// are end-to-end testable without one.
#[derive(Clone, Debug, Default)]
pub struct InMemoryGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    next_id: u64,
    arn_index: HashMap<String, NodeId>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node unconditionally (used by tests and by the ingester-side
    /// of this crate's boundary; production ingestion is out of scope).
    pub fn insert_node(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        node.id = id;
        if let Some(arn) = node.arn.clone() {
            self.arn_index.insert(arn, id);
        }
        self.nodes.push(node);
        id
    }

    pub fn insert_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    fn merge_key(node: &Node) -> (NodeKind, Option<String>, String, Option<String>) {
        (node.kind, node.arn.clone(), node.name.clone(), node.type_label().map(String::from))
    }

    /// MERGE key for an edge: (source, target, label, Name) — the `Name`
    /// carried by `Action`/`Trusts`/`Transitive`/`Attack`/`Create` variants is
    /// part of the key so two distinctly-named grants between the same pair
    /// of nodes never collide. `Option`/`Admin` carry no `Name`, so they key
    /// on (source, target, label) alone.
    fn merge_edge_key(edge: &Edge) -> (NodeId, NodeId, &'static str, Option<&str>) {
        let name = match &edge.kind {
            EdgeKind::Action { name, .. }
            | EdgeKind::Trusts { name }
            | EdgeKind::Transitive { name }
            | EdgeKind::Attack { name, .. }
            | EdgeKind::Create { name } => Some(name.as_str()),
            EdgeKind::Option { .. } | EdgeKind::Admin => None,
        };
        (edge.source, edge.target, edge.kind.label(), name)
    }
}

impl GraphStore for InMemoryGraph {
    fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn edges(&self) -> &[Edge] {
        &self.edges
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn merge_node(&mut self, node: Node) -> (NodeId, bool) {
        let key = Self::merge_key(&node);
        if let Some(existing) = self.nodes.iter().find(|n| Self::merge_key(n) == key) {
            return (existing.id, false);
        }
        let id = self.insert_node(node);
        (id, true)
    }

    fn merge_edge(&mut self, edge: Edge) -> (usize, bool) {
        let key = Self::merge_edge_key(&edge);
        if let Some((idx, _)) = self.edges.iter().enumerate().find(|(_, e)| Self::merge_edge_key(e) == key) {
            return (idx, false);
        }
        self.edges.push(edge);
        (self.edges.len() - 1, true)
    }

    fn add_label(&mut self, id: NodeId, label: &str) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            if !node.labels.iter().any(|l| l == label) {
                node.labels.push(label.to_string());
            }
        }
    }

    fn remove_label(&mut self, id: NodeId, label: &str) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.labels.retain(|l| l != label);
        }
    }

    fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }

    fn delete_patterns_and_admin_edges(&mut self) -> QuerySummary {
        let pattern_ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.labels.iter().any(|l| l.starts_with("Pattern")))
            .map(|n| n.id)
            .collect();
        let admin_ids: Vec<NodeId> = self.nodes.iter().filter(|n| n.is_admin()).map(|n| n.id).collect();

        self.edges
            .retain(|e| !pattern_ids.contains(&e.source) && !pattern_ids.contains(&e.target) && !admin_ids.contains(&e.target));
        self.nodes.retain(|n| !pattern_ids.contains(&n.id));

        // Deletions aren't progress signals for the fixpoint loop, so they
        // are not reflected in the creation counters.
        QuerySummary::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::{ConditionSet, Effect};

    #[test_log::test]
    fn test_merge_node_dedupes_by_key() {
        let mut g = InMemoryGraph::new();
        let (id1, created1) =
            g.merge_node(Node::new(NodeId(0), NodeKind::Resource, "bob").with_arn("arn:aws:iam::1:user/bob"));
        let (id2, created2) =
            g.merge_node(Node::new(NodeId(0), NodeKind::Resource, "bob").with_arn("arn:aws:iam::1:user/bob"));
        assert!(created1);
        assert!(!created2);
        assert_eq!(id1, id2);
    }

    #[test_log::test]
    fn test_merge_edge_dedupes() {
        let mut g = InMemoryGraph::new();
        let a = g.insert_node(Node::new(NodeId(0), NodeKind::Resource, "a"));
        let b = g.insert_node(Node::new(NodeId(0), NodeKind::Resource, "b"));
        let edge = || {
            Edge::new(
                a,
                b,
                EdgeKind::Action {
                    name: "sts:AssumeRole".into(),
                    effect: Effect::Allow,
                    access: "Write".into(),
                    condition: ConditionSet::empty(),
                },
            )
        };
        let (_, created1) = g.merge_edge(edge());
        let (_, created2) = g.merge_edge(edge());
        assert!(created1);
        assert!(!created2);
        assert_eq!(g.edges().len(), 1);
    }

    #[test_log::test]
    fn test_merge_edge_distinct_names_both_kept() {
        let mut g = InMemoryGraph::new();
        let a = g.insert_node(Node::new(NodeId(0), NodeKind::Resource, "a"));
        let b = g.insert_node(Node::new(NodeId(0), NodeKind::Resource, "b"));
        let (_, created1) = g.merge_edge(Edge::new(a, b, EdgeKind::Attack { name: "CreatePolicyVersion".into(), admin: true }));
        let (_, created2) = g.merge_edge(Edge::new(a, b, EdgeKind::Attack { name: "PutUserPolicy".into(), admin: true }));
        assert!(created1);
        assert!(created2);
        assert_eq!(g.edges().len(), 2);
    }

    #[test_log::test]
    fn test_delete_patterns_removes_incident_edges() {
        let mut g = InMemoryGraph::new();
        let source = g.insert_node(Node::new(NodeId(0), NodeKind::Resource, "u"));
        let pattern = g
            .insert_node(Node::new(NodeId(0), NodeKind::Generic, "p").with_label("Pattern:AssumeRole"));
        g.insert_edge(Edge::new(source, pattern, EdgeKind::Attack { name: "AssumeRole".into(), admin: false }));
        g.delete_patterns_and_admin_edges();
        assert!(g.node(pattern).is_none());
        assert!(g.edges().is_empty());
    }
}
