//! Defines the `Fact` vocabulary the synthesis engine reasons about.

use crate::family::{Family, Link, Transformation};
use crate::model::InteractionEffect;
use crate::variables::{VariableId, VariableRegistry};

/// A boolean proposition about the model under construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Atom {
    Cause { cause: VariableId, effect: VariableId },
    /// Stored with `lhs <= rhs`; build it through [`Atom::associate`].
    Associate { lhs: VariableId, rhs: VariableId },
    MainEffect { variable: VariableId, dv: VariableId },
    Interaction(InteractionEffect),
    RandomIntercept { groups: VariableId },
    RandomSlope { iv: VariableId, groups: VariableId },
    CorrelatedSlopeIntercept { iv: VariableId, groups: VariableId },
    UncorrelatedSlopeIntercept { iv: VariableId, groups: VariableId },
    Family(Family),
    Link(Link),
    Transform(Transformation),
}

impl Atom {
    pub fn associate(a: VariableId, b: VariableId) -> Self {
        Atom::Associate { lhs: a.min(b), rhs: a.max(b) }
    }

    /// Whether the atom ends up in a statistical model (conceptual atoms do not).
    pub fn is_model_atom(&self) -> bool {
        !matches!(self, Atom::Cause { .. } | Atom::Associate { .. })
    }

    pub fn describe(&self, registry: &VariableRegistry) -> String {
        let n = |id: &VariableId| registry.name_of(*id).to_string();
        match self {
            Atom::Cause { cause, effect } => format!("Cause({}, {})", n(cause), n(effect)),
            Atom::Associate { lhs, rhs } => format!("Associate({}, {})", n(lhs), n(rhs)),
            Atom::MainEffect { variable, dv } => format!("MainEffect({}, {})", n(variable), n(dv)),
            Atom::Interaction(effect) => {
                let names: Vec<String> = effect.variables().iter().map(n).collect();
                format!("Interaction({})", names.join(", "))
            }
            Atom::RandomIntercept { groups } => format!("RandomIntercept({})", n(groups)),
            Atom::RandomSlope { iv, groups } => format!("RandomSlope({}, {})", n(iv), n(groups)),
            Atom::CorrelatedSlopeIntercept { iv, groups } => {
                format!("CorrelatedSlopeIntercept({}, {})", n(iv), n(groups))
            }
            Atom::UncorrelatedSlopeIntercept { iv, groups } => {
                format!("UncorrelatedSlopeIntercept({}, {})", n(iv), n(groups))
            }
            Atom::Family(f) => format!("{}Family", f),
            Atom::Link(l) => format!("{}Link", l),
            Atom::Transform(t) => t.to_string(),
        }
    }
}

/// An atom asserted true, or asserted false (`negated`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fact {
    pub atom: Atom,
    pub negated: bool,
}

impl Fact {
    pub fn holds(atom: Atom) -> Self { Self { atom, negated: false } }
    pub fn not(atom: Atom) -> Self { Self { atom, negated: true } }

    pub fn negate(&self) -> Self {
        Self { atom: self.atom.clone(), negated: !self.negated }
    }

    pub fn is_positive(&self) -> bool { !self.negated }

    pub fn describe(&self, registry: &VariableRegistry) -> String {
        let atom = self.atom.describe(registry);
        match (&self.atom, self.negated) {
            (_, false) => atom,
            (Atom::MainEffect { .. }, true) => format!("No{}", atom),
            (_, true) => format!("¬{}", atom),
        }
    }
}

impl From<Atom> for Fact {
    fn from(atom: Atom) -> Self { Fact::holds(atom) }
}
