//! Typed variables and the relationships declared between them.
pub mod error;
pub mod registry;
pub mod relationship;
pub mod types;

pub use error::VariableError;
pub use registry::VariableRegistry;
pub use relationship::{Relationship, RelationshipId, Repetitions};
pub use types::{DataKind, DatasetHandle, Variable, VariableId, VariableRole, VariableSpec};
