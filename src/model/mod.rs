//! The statistical model the synthesis engine settles on, and the assembler
//! that builds one from the surviving fact set.
pub mod effects;
pub mod intermediate;

pub use effects::{InteractionEffect, RandomEffect};
pub use intermediate::{ExportError, IntermediateSpec};

use crate::family::{Family, Link, Transformation};
use crate::synthesis::{Atom, Fact};
use crate::variables::{DatasetHandle, VariableId};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("No family fact survived synthesis")]
    MissingFamily,
    #[error("More than one family fact survived synthesis: {0:?}")]
    MultipleFamilies(Vec<Family>),
    #[error("No link fact survived synthesis")]
    MissingLink,
    #[error("More than one link fact survived synthesis: {0:?}")]
    MultipleLinks(Vec<Link>),
    #[error("More than one transformation fact survived synthesis: {0:?}")]
    MultipleTransformations(Vec<Transformation>),
    #[error("Link {link} is not admissible for the {family} family")]
    InadmissibleLink { family: Family, link: Link },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticalModel {
    dependent_variable: VariableId,
    main_effects: BTreeSet<VariableId>,
    interaction_effects: BTreeSet<InteractionEffect>,
    random_effects: BTreeSet<RandomEffect>,
    family_function: Family,
    link_function: Link,
    dv_transformation: Transformation,
    dataset: Option<DatasetHandle>,
}

impl StatisticalModel {
    pub fn dependent_variable(&self) -> VariableId { self.dependent_variable }
    pub fn main_effects(&self) -> &BTreeSet<VariableId> { &self.main_effects }
    pub fn interaction_effects(&self) -> &BTreeSet<InteractionEffect> { &self.interaction_effects }
    pub fn random_effects(&self) -> &BTreeSet<RandomEffect> { &self.random_effects }
    pub fn family_function(&self) -> Family { self.family_function }
    pub fn link_function(&self) -> Link { self.link_function }
    pub fn dv_transformation(&self) -> Transformation { self.dv_transformation }
    pub fn dataset(&self) -> Option<&DatasetHandle> { self.dataset.as_ref() }

    pub fn has_random_effects(&self) -> bool { !self.random_effects.is_empty() }

    pub fn assign_data(&mut self, dataset: DatasetHandle) {
        self.dataset = Some(dataset);
    }

    /// Builds a model from the facts that survived synthesis.
    ///
    /// Negated facts and conceptual facts are ignored. A correlated or
    /// uncorrelated slope/intercept fact absorbs its `RandomSlope` and the
    /// group's `RandomIntercept`.
    pub fn assemble<'f>(
        dv: VariableId,
        facts: impl IntoIterator<Item = &'f Fact>,
        dataset: Option<DatasetHandle>,
    ) -> Result<Self, AssemblyError> {
        let mut main_effects = BTreeSet::new();
        let mut interaction_effects = BTreeSet::new();
        let mut intercepts = BTreeSet::new();
        let mut slopes = BTreeSet::new();
        let mut paired: BTreeMap<(VariableId, VariableId), bool> = BTreeMap::new();
        let mut families = Vec::new();
        let mut links = Vec::new();
        let mut transformations = Vec::new();

        for fact in facts.into_iter().filter(|f| f.is_positive()) {
            match &fact.atom {
                Atom::MainEffect { variable, dv: target } if *target == dv => {
                    main_effects.insert(*variable);
                }
                Atom::Interaction(effect) => {
                    interaction_effects.insert(effect.clone());
                }
                Atom::RandomIntercept { groups } => {
                    intercepts.insert(*groups);
                }
                Atom::RandomSlope { iv, groups } => {
                    slopes.insert((*iv, *groups));
                }
                Atom::CorrelatedSlopeIntercept { iv, groups } => {
                    paired.insert((*iv, *groups), true);
                }
                Atom::UncorrelatedSlopeIntercept { iv, groups } => {
                    paired.insert((*iv, *groups), false);
                }
                Atom::Family(f) if !families.contains(f) => families.push(*f),
                Atom::Link(l) if !links.contains(l) => links.push(*l),
                Atom::Transform(t) if !transformations.contains(t) => transformations.push(*t),
                _ => {}
            }
        }

        // 1. Fold paired slopes and intercepts
        let mut random_effects = BTreeSet::new();
        for (&(iv, groups), &correlated) in &paired {
            slopes.remove(&(iv, groups));
            random_effects.insert(if correlated {
                RandomEffect::CorrelatedRandomSlopeAndIntercept { iv, groups }
            } else {
                RandomEffect::UncorrelatedRandomSlopeAndIntercept { iv, groups }
            });
        }
        // Several pairs may share one group intercept.
        let claimed: BTreeSet<VariableId> = paired.keys().map(|&(_, g)| g).collect();
        random_effects.extend(slopes.into_iter().map(|(iv, groups)| RandomEffect::RandomSlope { iv, groups }));
        random_effects.extend(
            intercepts
                .into_iter()
                .filter(|g| !claimed.contains(g))
                .map(|groups| RandomEffect::RandomIntercept { groups }),
        );

        // 2. Exactly one family and link
        let family_function = match families.as_slice() {
            [] => return Err(AssemblyError::MissingFamily),
            [f] => *f,
            _ => return Err(AssemblyError::MultipleFamilies(families)),
        };
        let link_function = match links.as_slice() {
            [] => return Err(AssemblyError::MissingLink),
            [l] => *l,
            _ => return Err(AssemblyError::MultipleLinks(links)),
        };
        if !family_function.admits(link_function) {
            return Err(AssemblyError::InadmissibleLink { family: family_function, link: link_function });
        }

        // 3. At most one transformation
        let dv_transformation = match transformations.as_slice() {
            [] => Transformation::None,
            [t] => *t,
            _ => return Err(AssemblyError::MultipleTransformations(transformations)),
        };

        Ok(Self {
            dependent_variable: dv,
            main_effects,
            interaction_effects,
            random_effects,
            family_function,
            link_function,
            dv_transformation,
            dataset,
        })
    }

    /// The positive model facts this model was assembled from.
    pub fn to_facts(&self) -> BTreeSet<Fact> {
        let dv = self.dependent_variable;
        let mut out = BTreeSet::new();
        out.extend(self.main_effects.iter().map(|&variable| Fact::holds(Atom::MainEffect { variable, dv })));
        out.extend(self.interaction_effects.iter().cloned().map(|e| Fact::holds(Atom::Interaction(e))));
        for effect in &self.random_effects {
            match *effect {
                RandomEffect::RandomIntercept { groups } => {
                    out.insert(Fact::holds(Atom::RandomIntercept { groups }));
                }
                RandomEffect::RandomSlope { iv, groups } => {
                    out.insert(Fact::holds(Atom::RandomSlope { iv, groups }));
                }
                RandomEffect::CorrelatedRandomSlopeAndIntercept { iv, groups } => {
                    out.insert(Fact::holds(Atom::RandomSlope { iv, groups }));
                    out.insert(Fact::holds(Atom::RandomIntercept { groups }));
                    out.insert(Fact::holds(Atom::CorrelatedSlopeIntercept { iv, groups }));
                }
                RandomEffect::UncorrelatedRandomSlopeAndIntercept { iv, groups } => {
                    out.insert(Fact::holds(Atom::RandomSlope { iv, groups }));
                    out.insert(Fact::holds(Atom::RandomIntercept { groups }));
                    out.insert(Fact::holds(Atom::UncorrelatedSlopeIntercept { iv, groups }));
                }
            }
        }
        out.insert(Fact::holds(Atom::Family(self.family_function)));
        out.insert(Fact::holds(Atom::Link(self.link_function)));
        out.insert(Fact::holds(Atom::Transform(self.dv_transformation)));
        out
    }
}
