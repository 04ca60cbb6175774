//! Effects inference: pure functions from a design graph to candidate effect sets.
//!
//! Nothing here mutates the graph. Each stage reads a `DesignView` and returns
//! a fresh set, so the synthesis engine can rerun inference on a pruned graph
//! after conceptual ambiguities are settled.
pub mod interactions;
pub mod main_effects;
pub mod random_effects;

pub use interactions::{infer_interaction_effects, moderations, Moderation};
pub use main_effects::infer_main_effects;
pub use random_effects::infer_random_effects;

use crate::design::Design;
use crate::graph::DesignGraph;
use crate::model::{InteractionEffect, RandomEffect};
use crate::variables::{VariableId, VariableRegistry};
use std::collections::BTreeSet;

/// The read-only inputs every inference stage works from.
#[derive(Debug, Clone, Copy)]
pub struct DesignView<'a> {
    pub registry: &'a VariableRegistry,
    /// The declared (not normalized) graph.
    pub graph: &'a DesignGraph,
    pub dv: VariableId,
    pub ivs: &'a [VariableId],
}

impl Design {
    pub fn view(&self) -> DesignView<'_> {
        DesignView { registry: self.registry(), graph: self.graph(), dv: self.dv(), ivs: self.ivs() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectsCandidates {
    pub main_effects: BTreeSet<VariableId>,
    pub interaction_effects: BTreeSet<InteractionEffect>,
    pub random_effects: BTreeSet<RandomEffect>,
}

/// Runs the three stages in dependency order.
pub fn infer_effects(view: &DesignView) -> EffectsCandidates {
    let main_effects = infer_main_effects(view);
    let interaction_effects = infer_interaction_effects(view, &main_effects);
    let random_effects = infer_random_effects(view, &main_effects);
    EffectsCandidates { main_effects, interaction_effects, random_effects }
}
