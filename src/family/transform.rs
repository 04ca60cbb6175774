use crate::variables::{DataKind, Variable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transformation applied to the dependent variable before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Transformation {
    None,
    Log,
    Squareroot,
}

impl Transformation {
    pub fn is_numeric(&self) -> bool { !matches!(self, Transformation::None) }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Transformation::None => "NoTransform",
            Transformation::Log => "LogTransform",
            Transformation::Squareroot => "SquarerootTransform",
        };
        f.write_str(s)
    }
}

/// Only numeric dependent variables can be transformed.
pub fn transformation_candidates(dv: &Variable) -> Vec<Transformation> {
    match dv.data_kind() {
        DataKind::Numeric => vec![Transformation::None, Transformation::Log, Transformation::Squareroot],
        DataKind::Ordinal | DataKind::Nominal => vec![Transformation::None],
    }
}
