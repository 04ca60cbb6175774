use super::oracle::OracleError;
use super::BatchKind;
use crate::family::{Family, FamilyError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Family(#[from] FamilyError),
    #[error("Oracle could not resolve the {batch} conflict between: {}", .core.join(", "))]
    OracleExhausted { batch: BatchKind, core: Vec<String> },
    #[error("Oracle kept '{kept}', which is not in the {batch} conflict: {}", .core.join(", "))]
    AnswerOutsideCore { batch: BatchKind, kept: String, core: Vec<String> },
    #[error("Oracle chose the {family} family, which was not offered: {options:?}")]
    FamilyNotOffered { family: Family, options: Vec<Family> },
    #[error("The {batch} batch is inconsistent with no open choices left: {}", .facts.join(", "))]
    Irreducible { batch: BatchKind, facts: Vec<String> },
    #[error("The {batch} batch did not settle within {bound} resolution rounds")]
    ResolutionBudgetExceeded { batch: BatchKind, bound: usize },
    #[error("The {batch} batch exceeded the solver budget of {decisions} decisions")]
    SolverBudgetExceeded { batch: BatchKind, decisions: u64 },
    #[error("The {0} batch has no pending conflict to resolve")]
    NotResolving(BatchKind),
    #[error("The {0} batch is already grounded; no more facts or rules can be added")]
    SessionClosed(BatchKind),
}
