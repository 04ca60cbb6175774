//! Defines the `Relationship` value objects that connect variables.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::types::VariableId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct RelationshipId(pub u32);

impl RelationshipId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// How many times a unit carries a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Repetitions {
    Exactly(u32),
    AtMost(u32),
    /// Once per level of another variable (its cardinality).
    Per(VariableId),
}

impl Default for Repetitions {
    fn default() -> Self { Repetitions::Exactly(1) }
}

/// A declared relationship between variables.
///
/// Every variant is an immutable value; the registry stores it once and hands
/// its `RelationshipId` to each endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Relationship {
    Cause { cause: VariableId, effect: VariableId },
    Associate { lhs: VariableId, rhs: VariableId },
    /// The unit owns a measurement, possibly repeated.
    Has {
        unit: VariableId,
        measure: VariableId,
        repetitions: Repetitions,
        according_to: Option<VariableId>,
    },
    /// `base` units are grouped within `group` units.
    Nest { base: VariableId, group: VariableId },
    /// Repeated measurements of `response` on `unit`, indexed by `according_to`.
    Repeat { unit: VariableId, response: VariableId, according_to: VariableId },
    Treatment { unit: VariableId, treatment: VariableId, number_of_assignments: Repetitions },
    /// The moderators jointly moderate the effect on `on`.
    Moderates { moderators: Vec<VariableId>, on: VariableId },
}

impl Relationship {
    /// All variables this relationship touches, deduplicated, in declaration order.
    pub fn endpoints(&self) -> SmallVec<[VariableId; 4]> {
        let mut out: SmallVec<[VariableId; 4]> = SmallVec::new();
        let mut push = |v: VariableId| {
            if !out.contains(&v) {
                out.push(v);
            }
        };
        match self {
            Relationship::Cause { cause, effect } => { push(*cause); push(*effect); }
            Relationship::Associate { lhs, rhs } => { push(*lhs); push(*rhs); }
            Relationship::Has { unit, measure, repetitions, according_to } => {
                push(*unit);
                push(*measure);
                if let Repetitions::Per(v) = repetitions { push(*v); }
                if let Some(v) = according_to { push(*v); }
            }
            Relationship::Nest { base, group } => { push(*base); push(*group); }
            Relationship::Repeat { unit, response, according_to } => {
                push(*unit);
                push(*response);
                push(*according_to);
            }
            Relationship::Treatment { unit, treatment, number_of_assignments } => {
                push(*unit);
                push(*treatment);
                if let Repetitions::Per(v) = number_of_assignments { push(*v); }
            }
            Relationship::Moderates { moderators, on } => {
                for m in moderators { push(*m); }
                push(*on);
            }
        }
        out
    }

    /// The variable that must be a unit for this relationship to be well formed.
    pub fn owner(&self) -> Option<VariableId> {
        match self {
            Relationship::Has { unit, .. }
            | Relationship::Repeat { unit, .. }
            | Relationship::Treatment { unit, .. } => Some(*unit),
            Relationship::Nest { base, .. } => Some(*base),
            _ => None,
        }
    }
}
