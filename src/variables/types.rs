use serde::{Deserialize, Serialize};
use std::fmt;

use super::relationship::RelationshipId;

/// Dense handle of a variable inside a `VariableRegistry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct VariableId(pub u32);

impl VariableId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// The measurement scale of a variable. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    Nominal,
    Ordinal,
    Numeric,
}

/// What a variable stands for in the study, independent of its scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableRole {
    /// A measured attribute of some unit.
    Measure,
    /// An observational or experimental unit (participant, school, word...).
    /// Always nominal; usable as a grouping/identifier key.
    Unit,
    /// An experiment-controlled factor such as time.
    SetUp,
}

/// Opaque reference to a dataset bound by the caller. Ingestion lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHandle(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub(crate) id: VariableId,
    pub(crate) name: String,
    pub(crate) data_kind: DataKind,
    pub(crate) role: VariableRole,
    pub(crate) cardinality: Option<u32>,
    pub(crate) order: Option<Vec<String>>,
    pub(crate) categories: Option<Vec<String>>,
    pub(crate) column: Option<String>,
    pub(crate) relationships: Vec<RelationshipId>,
}

impl Variable {
    pub fn id(&self) -> VariableId { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn data_kind(&self) -> DataKind { self.data_kind }
    pub fn role(&self) -> VariableRole { self.role }
    pub fn is_unit(&self) -> bool { self.role == VariableRole::Unit }
    pub fn order(&self) -> Option<&[String]> { self.order.as_deref() }
    pub fn categories(&self) -> Option<&[String]> { self.categories.as_deref() }
    pub fn column(&self) -> Option<&str> { self.column.as_deref() }
    pub fn relationships(&self) -> &[RelationshipId] { &self.relationships }

    /// Number of distinct levels. Falls back to the declared order/categories.
    pub fn cardinality(&self) -> Option<u32> {
        self.cardinality
            .or_else(|| self.order.as_ref().map(|o| o.len() as u32))
            .or_else(|| self.categories.as_ref().map(|c| c.len() as u32))
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Optional attributes supplied when declaring a variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableSpec {
    pub cardinality: Option<u32>,
    pub order: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub column: Option<String>,
}

impl VariableSpec {
    pub fn with_cardinality(cardinality: u32) -> Self {
        Self { cardinality: Some(cardinality), ..Default::default() }
    }

    pub fn with_order<S: Into<String>>(order: impl IntoIterator<Item = S>) -> Self {
        Self { order: Some(order.into_iter().map(Into::into).collect()), ..Default::default() }
    }

    pub fn with_categories<S: Into<String>>(categories: impl IntoIterator<Item = S>) -> Self {
        Self { categories: Some(categories.into_iter().map(Into::into).collect()), ..Default::default() }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}
