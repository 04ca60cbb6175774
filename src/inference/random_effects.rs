//! Candidate random effects, detected from ownership structure on the
//! normalized graph.
//!
//! Two patterns are recognised:
//!
//! * **Repetition** – a DV or IV owned by a unit and measured once per level
//!   of another variable gets an intercept for the unit and one for the
//!   indexing variable.
//! * **Elbow** – a variable owned by a unit that is nested in a group gets an
//!   intercept for the group; an IV that varies within a group also gets a
//!   slope for that group. Nesting is followed upward through every level, so
//!   a unit nested in a class nested in a school reaches both.
//!
//! Whether a slope and an intercept on the same group are correlated is not
//! decided here; the synthesis engine asks for it.

use super::DesignView;
use crate::graph::{DesignEdge, DesignGraph, EdgeType};
use crate::model::RandomEffect;
use crate::variables::{VariableId, VariableRegistry};
use std::collections::BTreeSet;

pub fn infer_random_effects(view: &DesignView, main_effects: &BTreeSet<VariableId>) -> BTreeSet<RandomEffect> {
    let normalized = view.graph.transform_to_has_edges(view.registry);
    let mut out = BTreeSet::new();

    // Repetition pattern.
    for v in std::iter::once(view.dv).chain(view.ivs.iter().copied()) {
        for (unit, edge) in owners(&normalized, v) {
            if let Some(index) = edge.according_to {
                out.insert(RandomEffect::RandomIntercept { groups: unit });
                out.insert(RandomEffect::RandomIntercept { groups: index });
            } else if v == view.dv && repeats_more_than_once(view.registry, edge) {
                out.insert(RandomEffect::RandomIntercept { groups: unit });
            }
        }
    }

    // Elbow pattern.
    for v in std::iter::once(view.dv).chain(main_effects.iter().copied()) {
        let is_iv = view.ivs.contains(&v);
        for (unit, edge) in owners(&normalized, v) {
            if is_iv && (edge.according_to.is_some() || repeats_more_than_once(view.registry, edge)) {
                out.insert(RandomEffect::RandomSlope { iv: v, groups: unit });
            }
            for group in containing_groups(&normalized, unit) {
                out.insert(RandomEffect::RandomIntercept { groups: group });
                if is_iv && several_per_group(&normalized, view.registry, unit, group) {
                    out.insert(RandomEffect::RandomSlope { iv: v, groups: group });
                }
            }
        }
    }
    out
}

/// Units holding a `has` edge into `v`, with that edge.
fn owners(graph: &DesignGraph, v: VariableId) -> Vec<(VariableId, &DesignEdge)> {
    graph
        .in_edges(v)
        .into_iter()
        .filter(|(_, e)| e.edge_type == EdgeType::Has)
        .filter(|(unit, _)| graph.node(*unit).is_some_and(|n| n.is_identifier))
        .collect()
}

/// Every group `unit` sits in, following `nest` edges upward.
fn containing_groups(graph: &DesignGraph, unit: VariableId) -> BTreeSet<VariableId> {
    let mut found = BTreeSet::new();
    let mut frontier = vec![unit];
    while let Some(u) = frontier.pop() {
        for group in graph.get_neighbors(u, EdgeType::Nest) {
            if found.insert(group) {
                frontier.push(group);
            }
        }
    }
    found.remove(&unit);
    found
}

fn repeats_more_than_once(registry: &VariableRegistry, edge: &DesignEdge) -> bool {
    edge.repetitions
        .and_then(|r| registry.repetition_count(r))
        .is_some_and(|n| n > 1)
}

/// Whether a group holds more than one unit; unknown counts are treated as many.
fn several_per_group(graph: &DesignGraph, registry: &VariableRegistry, unit: VariableId, group: VariableId) -> bool {
    match graph.get_edge(group, unit, EdgeType::Has).and_then(|e| e.repetitions) {
        Some(r) => registry.repetition_count(r).map_or(true, |n| n > 1),
        None => true,
    }
}
