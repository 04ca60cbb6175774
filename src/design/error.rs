//! Defines the error types for the design module.
use crate::variables::{VariableError, VariableId};
use std::fmt;
use thiserror::Error;

/// The specific category of a design-validity error.
///
// This enum allows for programmatic inspection of errors, which is more
// robust than string matching on the error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorType {
    /// An independent variable has no cause/associate path to the dependent variable.
    NoPathToDependent,
    /// The dependent variable causally reaches one of its own independent variables.
    DependentReachesIndependent,
    /// A direct cause of the dependent variable is also one of its causal descendants.
    FeedbackIntoDependent,
}

/// A structured report naming the offending variable pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub variable: VariableId,
    pub variable_name: String,
    pub other: VariableId,
    pub other_name: String,
    pub error_type: ValidationErrorType,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DesignError {
    #[error("A design needs exactly one dependent variable")]
    MissingDependentVariable,
    #[error("'{0}' cannot be both the dependent and an independent variable")]
    DependentAsIndependent(String),
    #[error("'{0}' is listed as an independent variable more than once")]
    DuplicateIndependent(String),
    #[error("Level identifier '{0}' must be a unit")]
    LevelIdentifierNotUnit(String),
    #[error(transparent)]
    Variable(#[from] VariableError),
    #[error("Invalid design: {}", summarize(.0))]
    Invalid(Vec<ValidationError>),
}

fn summarize(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>().join("; ")
}
