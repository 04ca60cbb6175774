//! design_graph.rs
//! Wraps a petgraph multigraph with the structural queries used by effects inference.

use super::edge::{DesignEdge, EdgeSelector, EdgeType};
use super::node::{GraphNode, NodeRef};
use crate::variables::{Relationship, RelationshipId, Variable, VariableError, VariableId, VariableRegistry};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{Dfs, EdgeRef, Reversed};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

/// A directed multigraph over the variables of a design.
///
/// Nodes are keyed by variable name (unique within one graph). Queries that
/// miss return `None`, `false` or an empty collection; callers decide whether
/// absence is an error.
#[derive(Debug, Clone, Default)]
pub struct DesignGraph {
    pub(crate) graph: StableDiGraph<GraphNode, DesignEdge>,
    pub(crate) index_by_name: HashMap<String, NodeIndex>,
    pub(crate) index_by_id: HashMap<VariableId, NodeIndex>,
}

impl DesignGraph {
    pub fn new() -> Self { Self::default() }

    pub fn node_count(&self) -> usize { self.graph.node_count() }
    pub fn edge_count(&self) -> usize { self.graph.edge_count() }

    // --- Construction ---

    /// Adds a node for the variable unless one already exists.
    pub fn add_variable(&mut self, variable: &Variable) -> NodeIndex {
        self.ensure_node(variable.id(), variable.name())
    }

    fn ensure_node(&mut self, id: VariableId, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index_by_id.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode { variable: id, name: name.to_string(), is_identifier: false });
        self.index_by_name.insert(name.to_string(), idx);
        self.index_by_id.insert(id, idx);
        idx
    }

    pub fn mark_identifier(&mut self, variable: &Variable) {
        let idx = self.add_variable(variable);
        if let Some(node) = self.graph.node_weight_mut(idx) {
            node.is_identifier = true;
        }
    }

    /// Adds a typed edge, creating missing endpoint nodes.
    ///
    /// Returns `false` when an identical edge was already present.
    pub fn add_edge(&mut self, start: &Variable, end: &Variable, edge_type: EdgeType, origin: Option<RelationshipId>) -> bool {
        self.add_edge_with(start, end, DesignEdge::new(edge_type, origin))
    }

    pub fn add_edge_with(&mut self, start: &Variable, end: &Variable, edge: DesignEdge) -> bool {
        let a = self.add_variable(start);
        let b = self.add_variable(end);
        self.insert_edge(a, b, edge)
    }

    pub(crate) fn insert_edge(&mut self, a: NodeIndex, b: NodeIndex, edge: DesignEdge) -> bool {
        let duplicate = self
            .graph
            .edges_directed(a, Direction::Outgoing)
            .any(|e| e.target() == b && *e.weight() == edge);
        if duplicate {
            return false;
        }
        self.graph.add_edge(a, b, edge);
        true
    }

    /// Translates one declared relationship into graph edges.
    pub fn add_relationship(&mut self, registry: &VariableRegistry, rid: RelationshipId) -> Result<(), VariableError> {
        let relationship = registry.relationship(rid).ok_or(VariableError::UnknownRelationship(rid))?;
        let var = |id: VariableId| registry.get(id).ok_or(VariableError::UnknownVariable(id));

        match relationship {
            Relationship::Cause { cause, effect } => {
                self.add_edge(var(*cause)?, var(*effect)?, EdgeType::Cause, Some(rid));
            }
            Relationship::Associate { lhs, rhs } => {
                let (l, r) = (var(*lhs)?, var(*rhs)?);
                self.add_edge(l, r, EdgeType::Associate, Some(rid));
                self.add_edge(r, l, EdgeType::Associate, Some(rid));
            }
            Relationship::Has { unit, measure, repetitions, according_to } => {
                let unit = var(*unit)?;
                self.mark_identifier(unit);
                if let Some(index) = according_to {
                    self.add_variable(var(*index)?);
                }
                self.add_edge_with(unit, var(*measure)?, DesignEdge::has(*repetitions, *according_to, Some(rid)));
            }
            Relationship::Nest { base, group } => {
                let (base, group) = (var(*base)?, var(*group)?);
                self.mark_identifier(base);
                self.mark_identifier(group);
                self.add_edge(base, group, EdgeType::Nest, Some(rid));
            }
            Relationship::Repeat { unit, response, according_to } => {
                let unit = var(*unit)?;
                self.mark_identifier(unit);
                self.add_variable(var(*according_to)?);
                let edge = DesignEdge { according_to: Some(*according_to), ..DesignEdge::new(EdgeType::Repeat, Some(rid)) };
                self.add_edge_with(unit, var(*response)?, edge);
            }
            Relationship::Treatment { unit, treatment, .. } => {
                let unit = var(*unit)?;
                self.mark_identifier(unit);
                self.add_edge(var(*treatment)?, unit, EdgeType::Treat, Some(rid));
            }
            Relationship::Moderates { moderators, on } => {
                let on = var(*on)?;
                for m in moderators {
                    self.add_edge(var(*m)?, on, EdgeType::Contribute, Some(rid));
                }
            }
        }
        Ok(())
    }

    // --- Lookups ---

    pub fn contains<K: NodeRef>(&self, key: K) -> bool { key.locate(self).is_some() }

    pub fn node<K: NodeRef>(&self, key: K) -> Option<&GraphNode> {
        key.locate(self).and_then(|idx| self.graph.node_weight(idx))
    }

    pub fn variable_id(&self, name: &str) -> Option<VariableId> {
        self.node(name).map(|n| n.variable)
    }

    pub fn has_edge<K: NodeRef, L: NodeRef>(&self, start: K, end: L, edge_type: EdgeType) -> bool {
        self.get_edge(start, end, edge_type).is_some()
    }

    /// The first edge of the given type from `start` to `end`.
    pub fn get_edge<K: NodeRef, L: NodeRef>(&self, start: K, end: L, edge_type: EdgeType) -> Option<&DesignEdge> {
        self.edges_between(start, end).into_iter().find(|e| e.edge_type == edge_type)
    }

    /// Every edge from `start` to `end`, any type.
    pub fn edges_between<K: NodeRef, L: NodeRef>(&self, start: K, end: L) -> Vec<&DesignEdge> {
        let (Some(a), Some(b)) = (start.locate(self), end.locate(self)) else { return Vec::new() };
        self.graph
            .edges_directed(a, Direction::Outgoing)
            .filter(|e| e.target() == b)
            .map(|e| e.weight())
            .collect()
    }

    /// Targets of outgoing edges admitted by `selector`, deduplicated, in id order.
    pub fn get_neighbors<K: NodeRef>(&self, key: K, selector: impl Into<EdgeSelector>) -> Vec<VariableId> {
        self.adjacent(key, selector.into(), Direction::Outgoing)
    }

    /// Sources of incoming edges admitted by `selector`, deduplicated, in id order.
    pub fn get_predecessors<K: NodeRef>(&self, key: K, selector: impl Into<EdgeSelector>) -> Vec<VariableId> {
        self.adjacent(key, selector.into(), Direction::Incoming)
    }

    fn adjacent<K: NodeRef>(&self, key: K, selector: EdgeSelector, dir: Direction) -> Vec<VariableId> {
        let Some(idx) = key.locate(self) else { return Vec::new() };
        let found: BTreeSet<VariableId> = self
            .graph
            .edges_directed(idx, dir)
            .filter(|e| selector.admits(e.weight().edge_type))
            .map(|e| {
                let other = if e.source() == idx { e.target() } else { e.source() };
                self.graph[other].variable
            })
            .collect();
        found.into_iter().collect()
    }

    /// Incoming edges of `key` together with their sources.
    pub fn in_edges<K: NodeRef>(&self, key: K) -> Vec<(VariableId, &DesignEdge)> {
        let Some(idx) = key.locate(self) else { return Vec::new() };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (self.graph[e.source()].variable, e.weight()))
            .collect()
    }

    pub fn get_identifiers(&self) -> Vec<VariableId> {
        let ids: BTreeSet<VariableId> = self
            .graph
            .node_indices()
            .map(|i| &self.graph[i])
            .filter(|n| n.is_identifier)
            .map(|n| n.variable)
            .collect();
        ids.into_iter().collect()
    }

    pub fn variables(&self) -> BTreeSet<VariableId> {
        self.graph.node_indices().map(|i| self.graph[i].variable).collect()
    }

    /// Every edge as `(source, target, weight)`.
    pub fn edges(&self) -> Vec<(VariableId, VariableId, &DesignEdge)> {
        self.graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                Some((self.graph[a].variable, self.graph[b].variable, self.graph.edge_weight(e)?))
            })
            .collect()
    }

    // --- Subgraphs ---

    /// A copy keeping every node and only the edges accepted by `keep`.
    pub fn filtered(&self, keep: impl Fn(&DesignEdge) -> bool) -> DesignGraph {
        let mut out = DesignGraph::new();
        let mut remap = HashMap::new();
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            let new_idx = out.ensure_node(node.variable, &node.name);
            if node.is_identifier {
                out.graph[new_idx].is_identifier = true;
            }
            remap.insert(idx, new_idx);
        }
        for e in self.graph.edge_indices() {
            if let (Some((a, b)), Some(w)) = (self.graph.edge_endpoints(e), self.graph.edge_weight(e)) {
                if keep(w) {
                    out.insert_edge(remap[&a], remap[&b], w.clone());
                }
            }
        }
        out
    }

    /// Cause, associate and contribute edges only.
    pub fn get_conceptual_subgraph(&self) -> DesignGraph {
        self.filtered(|e| e.edge_type.is_conceptual())
    }

    /// Cause and contribute edges only.
    pub fn get_causal_subgraph(&self) -> DesignGraph {
        self.filtered(|e| e.edge_type.is_causal())
    }

    /// A copy without the edges matched by `drop`.
    pub fn without_edges(&self, drop: impl Fn(VariableId, VariableId, &DesignEdge) -> bool) -> DesignGraph {
        let mut out = DesignGraph::new();
        let mut remap = HashMap::new();
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            let new_idx = out.ensure_node(node.variable, &node.name);
            out.graph[new_idx].is_identifier = node.is_identifier;
            remap.insert(idx, new_idx);
        }
        for e in self.graph.edge_indices() {
            if let (Some((a, b)), Some(w)) = (self.graph.edge_endpoints(e), self.graph.edge_weight(e)) {
                if !drop(self.graph[a].variable, self.graph[b].variable, w) {
                    out.insert_edge(remap[&a], remap[&b], w.clone());
                }
            }
        }
        out
    }

    // --- Graph Algorithms ---

    /// Every node that can reach `key` (excluding `key` itself, unless on a cycle).
    pub fn ancestors<K: NodeRef>(&self, key: K) -> BTreeSet<VariableId> {
        let Some(start) = key.locate(self) else { return BTreeSet::new() };
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, start);
        let mut found = BTreeSet::new();
        while let Some(n) = dfs.next(reversed) {
            if n != start {
                found.insert(self.graph[n].variable);
            }
        }
        if self.on_cycle(start) {
            found.insert(self.graph[start].variable);
        }
        found
    }

    /// Every node reachable from `key` (excluding `key` itself, unless on a cycle).
    pub fn descendants<K: NodeRef>(&self, key: K) -> BTreeSet<VariableId> {
        let Some(start) = key.locate(self) else { return BTreeSet::new() };
        let mut dfs = Dfs::new(&self.graph, start);
        let mut found = BTreeSet::new();
        while let Some(n) = dfs.next(&self.graph) {
            if n != start {
                found.insert(self.graph[n].variable);
            }
        }
        if self.on_cycle(start) {
            found.insert(self.graph[start].variable);
        }
        found
    }

    fn on_cycle(&self, start: NodeIndex) -> bool {
        self.graph
            .neighbors_directed(start, Direction::Incoming)
            .any(|p| p == start || petgraph::algo::has_path_connecting(&self.graph, start, p, None))
    }

    pub fn has_path<K: NodeRef, L: NodeRef>(&self, from: K, to: L) -> bool {
        match (from.locate(self), to.locate(self)) {
            (Some(a), Some(b)) => petgraph::algo::has_path_connecting(&self.graph, a, b, None),
            _ => false,
        }
    }

    /// A graph with a `Cause` edge from every node to each node it can reach.
    pub fn transitive_closure(&self) -> DesignGraph {
        let mut out = self.filtered(|_| false);
        for idx in self.graph.node_indices() {
            let source = self.graph[idx].variable;
            for target in self.descendants(source) {
                let a = out.index_by_id[&source];
                let b = out.index_by_id[&target];
                out.insert_edge(a, b, DesignEdge::new(EdgeType::Cause, None));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::Repetitions;

    fn chain() -> (VariableRegistry, DesignGraph, [VariableId; 4]) {
        // a -> b -> c, c ~ d
        let mut reg = VariableRegistry::new();
        let a = reg.add_numeric("a").unwrap();
        let b = reg.add_numeric("b").unwrap();
        let c = reg.add_numeric("c").unwrap();
        let d = reg.add_numeric("d").unwrap();
        let rels = vec![reg.causes(a, b).unwrap(), reg.causes(b, c).unwrap(), reg.associates_with(c, d).unwrap()];
        let mut g = DesignGraph::new();
        for rid in rels {
            g.add_relationship(&reg, rid).unwrap();
        }
        (reg, g, [a, b, c, d])
    }

    #[test]
    fn test_associate_is_symmetric_and_cause_is_not() {
        let (_, g, _) = chain();
        assert!(g.has_edge("c", "d", EdgeType::Associate));
        assert!(g.has_edge("d", "c", EdgeType::Associate));
        assert!(g.has_edge("a", "b", EdgeType::Cause));
        assert!(!g.has_edge("b", "a", EdgeType::Cause));
    }

    #[test]
    fn test_missing_lookups_are_empty_not_errors() {
        let (_, g, _) = chain();
        assert!(g.get_edge("a", "nope", EdgeType::Cause).is_none());
        assert!(!g.has_edge("nope", "a", EdgeType::Cause));
        assert!(g.get_neighbors("nope", EdgeSelector::All).is_empty());
        assert!(g.get_predecessors("nope", EdgeType::Cause).is_empty());
    }

    #[test]
    fn test_add_edge_autocreates_and_dedups() {
        let mut reg = VariableRegistry::new();
        let x = reg.add_numeric("x").unwrap();
        let y = reg.add_numeric("y").unwrap();
        let mut g = DesignGraph::new();
        let (xv, yv) = (reg.get(x).unwrap(), reg.get(y).unwrap());
        assert!(g.add_edge(xv, yv, EdgeType::Cause, None));
        assert!(!g.add_edge(xv, yv, EdgeType::Cause, None));
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_neighbors_and_predecessors_by_type() {
        let (_, g, [a, b, c, d]) = chain();
        assert_eq!(g.get_neighbors("b", EdgeType::Cause), vec![c]);
        assert_eq!(g.get_predecessors("b", EdgeType::Cause), vec![a]);
        assert_eq!(g.get_neighbors("c", EdgeSelector::All), vec![d]);
        assert_eq!(g.get_predecessors("c", EdgeSelector::All), vec![b, d]);
    }

    #[test]
    fn test_subgraphs_keep_all_nodes() {
        let (_, g, [a, _, c, d]) = chain();
        let causal = g.get_causal_subgraph();
        assert_eq!(causal.node_count(), 4);
        assert_eq!(causal.edge_count(), 2);
        assert!(causal.get_neighbors("c", EdgeSelector::All).is_empty());
        assert_eq!(causal.ancestors(c), [a, causal.variable_id("b").unwrap()].into_iter().collect());

        let conceptual = g.get_conceptual_subgraph();
        assert_eq!(conceptual.edge_count(), 4);
        assert!(conceptual.has_path("a", "d"));
        assert!(!causal.has_path("a", "d"));
        assert!(causal.ancestors(d).is_empty());
    }

    #[test]
    fn test_transitive_closure_connects_chains() {
        let (_, g, [a, _, c, _]) = chain();
        let closure = g.get_causal_subgraph().transitive_closure();
        assert!(closure.has_edge(a, c, EdgeType::Cause));
        assert_eq!(closure.edge_count(), 3);
    }

    #[test]
    fn test_has_relationship_marks_identifier() {
        let mut reg = VariableRegistry::new();
        let unit = reg.add_unit("Student", Some(30)).unwrap();
        let score = reg.add_numeric("score").unwrap();
        let rid = reg.has(unit, score, Repetitions::Exactly(1)).unwrap();
        let mut g = DesignGraph::new();
        g.add_relationship(&reg, rid).unwrap();

        assert_eq!(g.get_identifiers(), vec![unit]);
        let edge = g.get_edge("Student", "score", EdgeType::Has).unwrap();
        assert_eq!(edge.repetitions, Some(Repetitions::Exactly(1)));
        assert_eq!(edge.origin, Some(rid));
    }
}
