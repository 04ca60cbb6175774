//! Defines the design graph: variables as nodes, typed relationships as edges.
pub mod design_graph;
pub mod edge;
pub mod node;
mod normalize;

// Re-export key types for convenient access
pub use design_graph::DesignGraph;
pub use edge::{DesignEdge, EdgeSelector, EdgeType};
pub use node::{GraphNode, NodeRef};
