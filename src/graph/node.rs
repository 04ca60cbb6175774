//! Defines the node weight of the design graph and the keys used to look nodes up.

use super::design_graph::DesignGraph;
use crate::variables::{Variable, VariableId};
use petgraph::stable_graph::NodeIndex;

/// A variable as seen by the design graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub variable: VariableId,
    pub name: String,
    /// Set for units that key a grouping level.
    pub is_identifier: bool,
}

/// Anything that can locate a node: its name, its handle, or the variable itself.
pub trait NodeRef {
    fn locate(&self, graph: &DesignGraph) -> Option<NodeIndex>;
}

impl NodeRef for &str {
    fn locate(&self, graph: &DesignGraph) -> Option<NodeIndex> {
        graph.index_by_name.get(*self).copied()
    }
}

impl NodeRef for &String {
    fn locate(&self, graph: &DesignGraph) -> Option<NodeIndex> {
        graph.index_by_name.get(self.as_str()).copied()
    }
}

impl NodeRef for VariableId {
    fn locate(&self, graph: &DesignGraph) -> Option<NodeIndex> {
        graph.index_by_id.get(self).copied()
    }
}

impl NodeRef for &Variable {
    fn locate(&self, graph: &DesignGraph) -> Option<NodeIndex> {
        graph.index_by_id.get(&self.id()).copied()
    }
}
