//! Grounded rules, one set per batch.

use super::fact::Atom;
use crate::family::{Family, Link, Transformation};
use crate::inference::EffectsCandidates;
use crate::model::RandomEffect;
use crate::variables::VariableId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    ExactlyOne(Vec<Atom>),
    /// `a -> b`
    Implies(Atom, Atom),
    /// `not (a and b)`
    Excludes(Atom, Atom),
}

/// One choice between Cause and Associate per `(cause, effect)` pair that was
/// declared both ways.
pub fn conceptual(pairs: &[(VariableId, VariableId)]) -> Vec<Rule> {
    pairs
        .iter()
        .map(|&(cause, effect)| Rule::ExactlyOne(vec![Atom::Cause { cause, effect }, Atom::associate(cause, effect)]))
        .collect()
}

/// Interactions and random slopes need their variables as main effects.
pub fn effects(dv: VariableId, candidates: &EffectsCandidates) -> Vec<Rule> {
    let main = |variable| Atom::MainEffect { variable, dv };
    let mut rules = Vec::new();
    for effect in &candidates.interaction_effects {
        for &x in effect.variables() {
            rules.push(Rule::Implies(Atom::Interaction(effect.clone()), main(x)));
        }
    }
    for effect in &candidates.random_effects {
        if let RandomEffect::RandomSlope { iv, groups } = *effect {
            rules.push(Rule::Implies(Atom::RandomSlope { iv, groups }, main(iv)));
        }
    }
    rules
}

/// Each kept slope/intercept pair on a group is either correlated or not.
pub fn correlation(pairs: &[(VariableId, VariableId)]) -> Vec<Rule> {
    let mut rules = Vec::new();
    for &(iv, groups) in pairs {
        let correlated = Atom::CorrelatedSlopeIntercept { iv, groups };
        let uncorrelated = Atom::UncorrelatedSlopeIntercept { iv, groups };
        for atom in [&correlated, &uncorrelated] {
            rules.push(Rule::Implies(atom.clone(), Atom::RandomSlope { iv, groups }));
            rules.push(Rule::Implies(atom.clone(), Atom::RandomIntercept { groups }));
        }
        rules.push(Rule::ExactlyOne(vec![correlated, uncorrelated]));
    }
    rules
}

pub fn family(candidates: &[Family]) -> Vec<Rule> {
    vec![Rule::ExactlyOne(candidates.iter().map(|&f| Atom::Family(f)).collect())]
}

/// Exactly one link, and no family paired with a link it does not admit.
pub fn link(families: &[Family], links: &[Link]) -> Vec<Rule> {
    let mut rules = vec![Rule::ExactlyOne(links.iter().map(|&l| Atom::Link(l)).collect())];
    for &f in families {
        for &l in links.iter().filter(|&&l| !f.admits(l)) {
            rules.push(Rule::Excludes(Atom::Family(f), Atom::Link(l)));
        }
    }
    rules
}

pub fn transformation(candidates: &[Transformation]) -> Vec<Rule> {
    let mut rules = vec![Rule::ExactlyOne(candidates.iter().map(|&t| Atom::Transform(t)).collect())];
    if candidates.contains(&Transformation::None) {
        for &t in candidates.iter().filter(|t| t.is_numeric()) {
            rules.push(Rule::Excludes(Atom::Transform(Transformation::None), Atom::Transform(t)));
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InteractionEffect;

    #[test]
    fn test_link_rules_exclude_inadmissible_pairs() {
        let links: Vec<Link> = Family::Poisson.admissible_links().into_iter().collect();
        let rules = link(&[Family::Gaussian, Family::Poisson], &links);

        assert_eq!(rules[0], Rule::ExactlyOne(vec![Atom::Link(Link::Identity), Atom::Link(Link::Log), Atom::Link(Link::Squareroot)]));
        assert!(rules.contains(&Rule::Excludes(Atom::Family(Family::Gaussian), Atom::Link(Link::Squareroot))));
        assert!(!rules.iter().any(|r| matches!(r, Rule::Excludes(Atom::Family(Family::Poisson), _))));
    }

    #[test]
    fn test_interaction_implies_each_member() {
        let (dv, a, b) = (VariableId(0), VariableId(1), VariableId(2));
        let mut candidates = EffectsCandidates::default();
        candidates.interaction_effects.insert(InteractionEffect::new([a, b]));
        let rules = effects(dv, &candidates);
        assert_eq!(rules.len(), 2);
        assert!(rules.contains(&Rule::Implies(
            Atom::Interaction(InteractionEffect::new([a, b])),
            Atom::MainEffect { variable: b, dv }
        )));
    }

    #[test]
    fn test_no_transform_excludes_numeric_ones() {
        let rules = transformation(&[Transformation::None, Transformation::Log, Transformation::Squareroot]);
        assert_eq!(rules.len(), 3);
        assert!(transformation(&[Transformation::None]).len() == 1);
    }
}
