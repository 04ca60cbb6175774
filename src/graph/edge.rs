//! Defines the `DesignEdge` type, representing one typed link between two variables.

use crate::variables::{RelationshipId, Repetitions, VariableId};

/// Describes the semantic type of a link in the design graph.
///
/// Conceptual links (`Cause`, `Associate`, `Contribute`) describe what the
/// researcher believes; the rest describe how the data were measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeType {
    Cause,
    /// Always present as a pair, one edge in each direction.
    Associate,
    /// A moderator feeding the variable whose effect it moderates.
    Contribute,
    Has,
    Nest,
    Repeat,
    Treat,
}

impl EdgeType {
    pub fn is_conceptual(&self) -> bool {
        matches!(self, EdgeType::Cause | EdgeType::Associate | EdgeType::Contribute)
    }

    pub fn is_causal(&self) -> bool {
        matches!(self, EdgeType::Cause | EdgeType::Contribute)
    }
}

/// Which edges a neighbourhood query should follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSelector {
    All,
    Only(EdgeType),
}

impl EdgeSelector {
    #[inline(always)]
    pub fn admits(&self, edge_type: EdgeType) -> bool {
        match self {
            EdgeSelector::All => true,
            EdgeSelector::Only(t) => *t == edge_type,
        }
    }
}

impl From<EdgeType> for EdgeSelector {
    fn from(t: EdgeType) -> Self { EdgeSelector::Only(t) }
}

/// The weight stored on every graph edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DesignEdge {
    pub edge_type: EdgeType,
    /// The relationship this edge was derived from, if any.
    pub origin: Option<RelationshipId>,
    /// Only meaningful for `Has` edges.
    pub repetitions: Option<Repetitions>,
    /// The variable indexing the repetitions of a `Has`/`Repeat` edge.
    pub according_to: Option<VariableId>,
}

impl DesignEdge {
    pub fn new(edge_type: EdgeType, origin: Option<RelationshipId>) -> Self {
        Self { edge_type, origin, repetitions: None, according_to: None }
    }

    pub fn has(repetitions: Repetitions, according_to: Option<VariableId>, origin: Option<RelationshipId>) -> Self {
        let according_to = according_to.or(match repetitions {
            Repetitions::Per(v) => Some(v),
            _ => None,
        });
        Self { edge_type: EdgeType::Has, origin, repetitions: Some(repetitions), according_to }
    }
}
