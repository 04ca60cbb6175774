//! Distribution families, link functions and DV transformations admissible for
//! a dependent variable.
//!
//! The link table is fixed domain knowledge: it lists the family/link pairs
//! the downstream estimation library accepts.
pub mod transform;

pub use transform::{transformation_candidates, Transformation};

use crate::variables::{DataKind, Variable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FamilyError {
    #[error("Nominal variable '{0}' has no known cardinality")]
    UnknownCardinality(String),
    #[error("Nominal variable '{name}' has {cardinality} level(s); at least two are required")]
    DegenerateNominal { name: String, cardinality: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Family {
    Gaussian,
    InverseGaussian,
    Gamma,
    Tweedie,
    Poisson,
    Binomial,
    NegativeBinomial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Link {
    Identity,
    Log,
    Logit,
    Probit,
    CLogLog,
    Power,
    NegativeBinomial,
    Inverse,
    InverseSquared,
    Squareroot,
    Cauchy,
}

const NUMERIC_FAMILIES: [Family; 5] =
    [Family::Gaussian, Family::InverseGaussian, Family::Gamma, Family::Tweedie, Family::Poisson];

impl Family {
    pub const ALL: [Family; 7] = [
        Family::Gaussian,
        Family::InverseGaussian,
        Family::Gamma,
        Family::Tweedie,
        Family::Poisson,
        Family::Binomial,
        Family::NegativeBinomial,
    ];

    /// The links the estimation library accepts for this family.
    pub fn admissible_links(&self) -> BTreeSet<Link> {
        use Link::*;
        let links: &[Link] = match self {
            Family::Gaussian => &[Identity, Log, Logit, Probit, CLogLog, Power, NegativeBinomial, Inverse],
            Family::InverseGaussian => &[Identity, Log, Inverse, InverseSquared],
            Family::Gamma => &[Identity, Log, Inverse],
            Family::Tweedie => &[Log, Power],
            Family::Poisson => &[Identity, Log, Squareroot],
            Family::Binomial => &[Log, Logit, Probit, Cauchy, CLogLog],
            Family::NegativeBinomial => &[Identity, Log, CLogLog, Power, NegativeBinomial],
        };
        links.iter().copied().collect()
    }

    /// The canonical link of the family.
    pub fn default_link(&self) -> Link {
        match self {
            Family::Gaussian => Link::Identity,
            Family::InverseGaussian => Link::InverseSquared,
            Family::Gamma => Link::Inverse,
            Family::Tweedie | Family::Poisson | Family::NegativeBinomial => Link::Log,
            Family::Binomial => Link::Logit,
        }
    }

    pub fn admits(&self, link: Link) -> bool {
        self.admissible_links().contains(&link)
    }
}

/// Free-function form of [`Family::admissible_links`].
pub fn admissible_links(family: Family) -> BTreeSet<Link> {
    family.admissible_links()
}

/// Families that can model a dependent variable of the given kind.
///
/// Ordinal variables can be treated as continuous or as discrete counts, so
/// they get the numeric families plus the two discrete ones.
pub fn family_candidates(dv: &Variable) -> Result<Vec<Family>, FamilyError> {
    match dv.data_kind() {
        DataKind::Numeric => Ok(NUMERIC_FAMILIES.to_vec()),
        DataKind::Ordinal => {
            let mut out = NUMERIC_FAMILIES.to_vec();
            out.extend([Family::Binomial, Family::NegativeBinomial]);
            Ok(out)
        }
        DataKind::Nominal => match dv.cardinality() {
            None => Err(FamilyError::UnknownCardinality(dv.name().to_string())),
            Some(c) if c < 2 => Err(FamilyError::DegenerateNominal { name: dv.name().to_string(), cardinality: c }),
            Some(2) => Ok(vec![Family::Binomial]),
            Some(_) => Ok(vec![Family::NegativeBinomial]),
        },
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
