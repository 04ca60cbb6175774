//! Candidate interaction effects, from declared moderations only.

use super::DesignView;
use crate::graph::EdgeType;
use crate::model::InteractionEffect;
use crate::variables::{Relationship, RelationshipId, VariableId};
use std::collections::BTreeSet;

/// A `Moderates` relationship reachable from the design graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moderation {
    pub relationship: RelationshipId,
    pub moderators: Vec<VariableId>,
    pub on: VariableId,
}

/// Every moderation that contributed an edge to the graph, in declaration order.
pub fn moderations(view: &DesignView) -> Vec<Moderation> {
    let origins: BTreeSet<RelationshipId> = view
        .graph
        .edges()
        .into_iter()
        .filter(|(_, _, e)| e.edge_type == EdgeType::Contribute)
        .filter_map(|(_, _, e)| e.origin)
        .collect();

    origins
        .into_iter()
        .filter_map(|rid| match view.registry.relationship(rid)? {
            Relationship::Moderates { moderators, on } => {
                Some(Moderation { relationship: rid, moderators: moderators.clone(), on: *on })
            }
            _ => None,
        })
        .collect()
}

/// One interaction per moderation whose target is the DV (or a main effect
/// that causally reaches the DV) and whose moderators are all main effects.
///
/// A moderation with a missing participant yields nothing; the caller has to
/// add the main effect first.
pub fn infer_interaction_effects(view: &DesignView, main_effects: &BTreeSet<VariableId>) -> BTreeSet<InteractionEffect> {
    let causal = view.graph.get_causal_subgraph();

    moderations(view)
        .into_iter()
        .filter(|m| m.on == view.dv || (main_effects.contains(&m.on) && causal.has_path(m.on, view.dv)))
        .filter(|m| m.moderators.iter().all(|v| main_effects.contains(v)))
        .map(|m| InteractionEffect::new(m.moderators))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::Design;
    use crate::inference::infer_main_effects;
    use crate::variables::VariableRegistry;

    #[test]
    fn test_single_moderation_on_dv() {
        let mut reg = VariableRegistry::new();
        let dv = reg.add_numeric("dv").unwrap();
        let m0 = reg.add_numeric("m0").unwrap();
        let m1 = reg.add_numeric("m1").unwrap();
        let m2 = reg.add_numeric("m2").unwrap();
        reg.causes(m0, dv).unwrap();
        reg.causes(m1, dv).unwrap();
        reg.moderates(m2, &[m1], dv).unwrap();
        let design = Design::builder(reg).dependent(dv).independents(&[m0, m1, m2]).build().unwrap();

        let view = design.view();
        let main = infer_main_effects(&view);
        let interactions = infer_interaction_effects(&view, &main);
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions.into_iter().next().unwrap(), InteractionEffect::new([m1, m2]));
    }

    #[test]
    fn test_moderation_with_missing_main_effect_is_omitted() {
        let mut reg = VariableRegistry::new();
        let dv = reg.add_numeric("dv").unwrap();
        let m0 = reg.add_numeric("m0").unwrap();
        let m1 = reg.add_numeric("m1").unwrap();
        let m2 = reg.add_numeric("m2").unwrap();
        reg.causes(m0, dv).unwrap();
        reg.causes(m1, dv).unwrap();
        reg.moderates(m2, &[m1], dv).unwrap();
        let design = Design::builder(reg).dependent(dv).independents(&[m0, m2]).build().unwrap();

        let view = design.view();
        let main = infer_main_effects(&view);
        assert!(!main.contains(&m1));
        assert!(infer_interaction_effects(&view, &main).is_empty());
        assert_eq!(moderations(&view).len(), 1);
    }

    #[test]
    fn test_moderation_on_main_effect_chaining_to_dv() {
        let mut reg = VariableRegistry::new();
        let dv = reg.add_numeric("dv").unwrap();
        let x = reg.add_numeric("x").unwrap();
        let a = reg.add_numeric("a").unwrap();
        let b = reg.add_numeric("b").unwrap();
        reg.causes(x, dv).unwrap();
        reg.causes(a, dv).unwrap();
        reg.causes(b, dv).unwrap();
        reg.moderates(a, &[b], x).unwrap();
        let design = Design::builder(reg).dependent(dv).independents(&[x, a, b]).build().unwrap();

        let view = design.view();
        let main = infer_main_effects(&view);
        assert_eq!(infer_interaction_effects(&view, &main), [InteractionEffect::new([a, b])].into_iter().collect());
    }
}
