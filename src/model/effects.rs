//! Effect terms shared by inference, synthesis and the assembled model.

use crate::variables::VariableId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A joint predictor formed from two or more variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InteractionEffect(BTreeSet<VariableId>);

impl InteractionEffect {
    pub fn new(variables: impl IntoIterator<Item = VariableId>) -> Self {
        Self(variables.into_iter().collect())
    }

    pub fn variables(&self) -> &BTreeSet<VariableId> { &self.0 }
    pub fn contains(&self, id: VariableId) -> bool { self.0.contains(&id) }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

/// A per-group term of a mixed-effects model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RandomEffect {
    RandomIntercept { groups: VariableId },
    RandomSlope { iv: VariableId, groups: VariableId },
    CorrelatedRandomSlopeAndIntercept { iv: VariableId, groups: VariableId },
    UncorrelatedRandomSlopeAndIntercept { iv: VariableId, groups: VariableId },
}

impl RandomEffect {
    pub fn groups(&self) -> VariableId {
        match self {
            RandomEffect::RandomIntercept { groups }
            | RandomEffect::RandomSlope { groups, .. }
            | RandomEffect::CorrelatedRandomSlopeAndIntercept { groups, .. }
            | RandomEffect::UncorrelatedRandomSlopeAndIntercept { groups, .. } => *groups,
        }
    }
}
