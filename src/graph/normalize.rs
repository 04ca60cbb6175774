//! Rewrites the sugared measurement links (treat, nest, repeat) as ownership (`has`) edges.

use super::design_graph::DesignGraph;
use super::edge::{DesignEdge, EdgeType};
use crate::variables::{Relationship, Repetitions, VariableId, VariableRegistry};

impl DesignGraph {
    /// Returns a copy in which every `treat`, `nest` and `repeat` edge is
    /// accompanied by the equivalent `has` edges.
    ///
    /// The original edges are kept. Applying the transform to its own output
    /// adds nothing.
    pub fn transform_to_has_edges(&self, registry: &VariableRegistry) -> DesignGraph {
        let mut out = self.clone();
        let mut pending: Vec<(VariableId, VariableId, DesignEdge)> = Vec::new();

        for (source, target, edge) in self.edges() {
            match edge.edge_type {
                // treat(treatment -> unit) => has(unit, treatment)
                EdgeType::Treat => {
                    let assignments = edge
                        .origin
                        .and_then(|rid| registry.relationship(rid))
                        .and_then(|r| match r {
                            Relationship::Treatment { number_of_assignments, .. } => Some(*number_of_assignments),
                            _ => None,
                        })
                        .unwrap_or_default();
                    pending.push((target, source, DesignEdge::has(assignments, None, edge.origin)));
                }
                // nest(unit -> group) => has(group, unit)
                EdgeType::Nest => {
                    let repetitions = nested_instances(registry, source, target);
                    let has = DesignEdge { edge_type: EdgeType::Has, origin: edge.origin, repetitions, according_to: None };
                    pending.push((target, source, has));
                }
                // repeat(unit -> response, according_to)
                EdgeType::Repeat => {
                    let Some(according_to) = edge.according_to else { continue };
                    pending.push((source, target, DesignEdge::has(Repetitions::Per(according_to), Some(according_to), edge.origin)));
                    pending.push((according_to, source, DesignEdge::has(Repetitions::Per(source), None, edge.origin)));
                    pending.push((according_to, target, DesignEdge::new(EdgeType::Associate, edge.origin)));
                    pending.push((target, according_to, DesignEdge::new(EdgeType::Associate, edge.origin)));
                }
                _ => {}
            }
        }

        for (start, end, edge) in pending {
            let (Some(a), Some(b)) = (registry.get(start), registry.get(end)) else { continue };
            out.add_edge_with(a, b, edge);
        }
        out
    }
}

/// How many `base` units sit in one `group` unit, from the declared cardinalities.
fn nested_instances(registry: &VariableRegistry, base: VariableId, group: VariableId) -> Option<Repetitions> {
    match (registry.cardinality_of(base), registry.cardinality_of(group)) {
        (Some(b), Some(g)) if g > 0 => Some(Repetitions::Exactly((b / g).max(1))),
        (Some(b), _) => Some(Repetitions::AtMost(b)),
        _ => None,
    }
}
