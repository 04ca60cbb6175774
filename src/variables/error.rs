//! Defines the error types for the variables module.
use super::relationship::RelationshipId;
use super::types::VariableId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariableError {
    #[error("A variable named '{0}' already exists")]
    DuplicateName(String),
    #[error("Unknown variable handle {0:?}")]
    UnknownVariable(VariableId),
    #[error("Unknown relationship handle {0:?}")]
    UnknownRelationship(RelationshipId),
    #[error("'{name}' must be a unit to own measurements or groupings")]
    NotAUnit { id: VariableId, name: String },
    #[error("'{name}' cannot be related to itself")]
    SelfRelationship { name: String },
    #[error("A moderation needs at least one moderator besides the moderated variable")]
    EmptyModeration,
    #[error("Cardinality of '{name}' is {declared} but {observed} levels were given")]
    InconsistentCardinality { name: String, declared: u32, observed: u32 },
}
