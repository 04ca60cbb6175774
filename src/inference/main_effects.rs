//! Candidate main effects, derived from the causal structure around the IVs.

use super::DesignView;
use crate::graph::{DesignGraph, EdgeType};
use crate::variables::VariableId;
use std::collections::{BTreeMap, BTreeSet};

/// The union of four independent derivations over the causal subgraph.
///
/// Variables that are not declared IVs can appear here: a cause of a declared
/// IV is surfaced as a candidate so omitted confounds get a chance to be
/// included. The DV is never a main effect, and neither is a unit or other
/// identifier unless it was declared as an IV.
pub fn infer_main_effects(view: &DesignView) -> BTreeSet<VariableId> {
    let causal = view.graph.get_causal_subgraph();

    let mut out = BTreeSet::new();
    out.extend(view.ivs.iter().copied());
    out.extend(common_ancestors(&causal, view.ivs));
    out.extend(causal_ancestors(&causal, view.ivs));
    out.extend(associated_intermediaries(view.graph, view.dv, view.ivs));
    out.extend(parents_causing_dv(view.graph, &causal, view.dv, view.ivs));

    out.remove(&view.dv);
    out.retain(|&v| view.ivs.contains(&v) || !is_identifier(view, v));
    out
}

fn is_identifier(view: &DesignView, v: VariableId) -> bool {
    view.graph.node(v).is_some_and(|n| n.is_identifier) || view.registry.get(v).is_some_and(|var| var.is_unit())
}

/// Nodes upstream of two or more IVs, ignoring cause edges that run directly
/// between IVs.
fn common_ancestors(causal: &DesignGraph, ivs: &[VariableId]) -> BTreeSet<VariableId> {
    let pruned = causal.without_edges(|s, t, e| e.edge_type == EdgeType::Cause && ivs.contains(&s) && ivs.contains(&t));
    let closure = pruned.transitive_closure();

    let mut counts: BTreeMap<VariableId, usize> = BTreeMap::new();
    for &iv in ivs {
        for ancestor in closure.get_predecessors(iv, EdgeType::Cause) {
            *counts.entry(ancestor).or_insert(0) += 1;
        }
    }
    counts.into_iter().filter(|&(_, n)| n >= 2).map(|(v, _)| v).collect()
}

/// Every direct or transitive cause of every IV.
fn causal_ancestors(causal: &DesignGraph, ivs: &[VariableId]) -> BTreeSet<VariableId> {
    ivs.iter().flat_map(|&iv| causal.ancestors(iv)).collect()
}

/// Associates of an IV that themselves cause or associate with the DV.
fn associated_intermediaries(graph: &DesignGraph, dv: VariableId, ivs: &[VariableId]) -> BTreeSet<VariableId> {
    ivs.iter()
        .flat_map(|&iv| graph.get_neighbors(iv, EdgeType::Associate))
        .filter(|&n| n != dv)
        .filter(|&n| graph.has_edge(n, dv, EdgeType::Cause) || graph.has_edge(n, dv, EdgeType::Associate))
        .collect()
}

/// Direct causes of an IV that also directly cause the DV.
fn parents_causing_dv(graph: &DesignGraph, causal: &DesignGraph, dv: VariableId, ivs: &[VariableId]) -> BTreeSet<VariableId> {
    ivs.iter()
        .flat_map(|&iv| causal.get_predecessors(iv, EdgeType::Cause))
        .filter(|&p| graph.has_edge(p, dv, EdgeType::Cause))
        .collect()
}
