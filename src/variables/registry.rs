use super::error::VariableError;
use super::relationship::{Relationship, RelationshipId, Repetitions};
use super::types::*;
use std::collections::HashMap;

/// Arena owning every variable and relationship of a study.
///
/// Variables are addressed by dense `VariableId`s; names are unique and act as
/// the stable key used by the design graph. Relationships are stored once and
/// registered on every endpoint.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    variables: Vec<Variable>,
    relationships: Vec<Relationship>,
    by_name: HashMap<String, VariableId>,
}

impl VariableRegistry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.variables.len() }

    // --- Declaration ---

    pub fn add_nominal(&mut self, name: &str, spec: VariableSpec) -> Result<VariableId, VariableError> {
        self.add_variable(name, DataKind::Nominal, VariableRole::Measure, spec)
    }

    pub fn add_ordinal(&mut self, name: &str, spec: VariableSpec) -> Result<VariableId, VariableError> {
        self.add_variable(name, DataKind::Ordinal, VariableRole::Measure, spec)
    }

    pub fn add_numeric(&mut self, name: &str) -> Result<VariableId, VariableError> {
        self.add_variable(name, DataKind::Numeric, VariableRole::Measure, VariableSpec::default())
    }

    /// Declares a unit. Units are nominal; `cardinality` is the number of instances.
    pub fn add_unit(&mut self, name: &str, cardinality: Option<u32>) -> Result<VariableId, VariableError> {
        let spec = VariableSpec { cardinality, ..Default::default() };
        self.add_variable(name, DataKind::Nominal, VariableRole::Unit, spec)
    }

    /// Declares an experiment-controlled factor with its own scale.
    pub fn add_setup(&mut self, name: &str, kind: DataKind, spec: VariableSpec) -> Result<VariableId, VariableError> {
        self.add_variable(name, kind, VariableRole::SetUp, spec)
    }

    /// Declares a measure and, in the same step, the unit's ownership of it.
    pub fn add_measure(
        &mut self,
        unit: VariableId,
        name: &str,
        kind: DataKind,
        spec: VariableSpec,
        repetitions: Repetitions,
    ) -> Result<VariableId, VariableError> {
        self.require_unit(unit)?;
        let measure = self.add_variable(name, kind, VariableRole::Measure, spec)?;
        self.has(unit, measure, repetitions)?;
        Ok(measure)
    }

    pub fn add_variable(
        &mut self,
        name: &str,
        data_kind: DataKind,
        role: VariableRole,
        spec: VariableSpec,
    ) -> Result<VariableId, VariableError> {
        if self.by_name.contains_key(name) {
            return Err(VariableError::DuplicateName(name.to_string()));
        }
        if let Some(declared) = spec.cardinality {
            for levels in [&spec.order, &spec.categories].into_iter().flatten() {
                if levels.len() as u32 != declared {
                    return Err(VariableError::InconsistentCardinality {
                        name: name.to_string(),
                        declared,
                        observed: levels.len() as u32,
                    });
                }
            }
        }

        let id = VariableId::new(self.variables.len());
        self.variables.push(Variable {
            id,
            name: name.to_string(),
            data_kind,
            role,
            cardinality: spec.cardinality,
            order: spec.order,
            categories: spec.categories,
            column: spec.column,
            relationships: Vec::new(),
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Sets the cardinality once; a later, different value is rejected.
    pub fn set_cardinality(&mut self, id: VariableId, cardinality: u32) -> Result<(), VariableError> {
        let var = self.variables.get_mut(id.index()).ok_or(VariableError::UnknownVariable(id))?;
        match var.cardinality() {
            Some(existing) if existing != cardinality => Err(VariableError::InconsistentCardinality {
                name: var.name.clone(),
                declared: existing,
                observed: cardinality,
            }),
            _ => {
                var.cardinality = Some(cardinality);
                Ok(())
            }
        }
    }

    /// Binds the variable to a dataset column. Cardinality checks still apply to later updates.
    pub fn bind_column(&mut self, id: VariableId, column: &str) -> Result<(), VariableError> {
        let var = self.variables.get_mut(id.index()).ok_or(VariableError::UnknownVariable(id))?;
        var.column = Some(column.to_string());
        Ok(())
    }

    // --- Relationships ---

    pub fn causes(&mut self, cause: VariableId, effect: VariableId) -> Result<RelationshipId, VariableError> {
        self.relate(Relationship::Cause { cause, effect })
    }

    pub fn associates_with(&mut self, lhs: VariableId, rhs: VariableId) -> Result<RelationshipId, VariableError> {
        self.relate(Relationship::Associate { lhs, rhs })
    }

    pub fn has(&mut self, unit: VariableId, measure: VariableId, repetitions: Repetitions) -> Result<RelationshipId, VariableError> {
        self.relate(Relationship::Has { unit, measure, repetitions, according_to: None })
    }

    pub fn has_according_to(
        &mut self,
        unit: VariableId,
        measure: VariableId,
        repetitions: Repetitions,
        according_to: VariableId,
    ) -> Result<RelationshipId, VariableError> {
        self.relate(Relationship::Has { unit, measure, repetitions, according_to: Some(according_to) })
    }

    pub fn nests_within(&mut self, base: VariableId, group: VariableId) -> Result<RelationshipId, VariableError> {
        self.require_unit(group)?;
        self.relate(Relationship::Nest { base, group })
    }

    pub fn repeats(&mut self, unit: VariableId, response: VariableId, according_to: VariableId) -> Result<RelationshipId, VariableError> {
        self.relate(Relationship::Repeat { unit, response, according_to })
    }

    pub fn treats(&mut self, unit: VariableId, treatment: VariableId, number_of_assignments: Repetitions) -> Result<RelationshipId, VariableError> {
        self.relate(Relationship::Treatment { unit, treatment, number_of_assignments })
    }

    /// `variable` moderates the effect on `on` together with `moderators`.
    /// The stored moderator list always contains `variable` itself.
    pub fn moderates(&mut self, variable: VariableId, moderators: &[VariableId], on: VariableId) -> Result<RelationshipId, VariableError> {
        let mut all: Vec<VariableId> = Vec::with_capacity(moderators.len() + 1);
        for &m in moderators.iter().chain(std::iter::once(&variable)) {
            if !all.contains(&m) {
                all.push(m);
            }
        }
        if all.len() < 2 {
            return Err(VariableError::EmptyModeration);
        }
        self.relate(Relationship::Moderates { moderators: all, on })
    }

    /// Stores a relationship and registers it on all of its endpoints.
    pub fn relate(&mut self, relationship: Relationship) -> Result<RelationshipId, VariableError> {
        let endpoints = relationship.endpoints();
        for &v in &endpoints {
            self.get(v).ok_or(VariableError::UnknownVariable(v))?;
        }
        if let Some(owner) = relationship.owner() {
            self.require_unit(owner)?;
        }
        match &relationship {
            Relationship::Cause { cause: a, effect: b }
            | Relationship::Associate { lhs: a, rhs: b }
            | Relationship::Nest { base: a, group: b } if a == b => {
                return Err(VariableError::SelfRelationship { name: self.variables[a.index()].name.clone() });
            }
            Relationship::Moderates { moderators, on } if moderators.contains(on) => {
                return Err(VariableError::SelfRelationship { name: self.variables[on.index()].name.clone() });
            }
            _ => {}
        }

        if let Some(existing) = self.relationships.iter().position(|r| r == &relationship) {
            return Ok(RelationshipId::new(existing));
        }

        let id = RelationshipId::new(self.relationships.len());
        self.relationships.push(relationship);
        for v in endpoints {
            self.variables[v.index()].relationships.push(id);
        }
        Ok(id)
    }

    fn require_unit(&self, id: VariableId) -> Result<(), VariableError> {
        let var = self.get(id).ok_or(VariableError::UnknownVariable(id))?;
        if var.is_unit() {
            Ok(())
        } else {
            Err(VariableError::NotAUnit { id, name: var.name.clone() })
        }
    }

    // --- Accessors ---

    pub fn get(&self, id: VariableId) -> Option<&Variable> { self.variables.get(id.index()) }

    pub fn by_name(&self, name: &str) -> Option<&Variable> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    /// Name of a variable, or a placeholder for a foreign handle.
    pub fn name_of(&self, id: VariableId) -> &str {
        self.get(id).map_or("<unknown>", |v| v.name.as_str())
    }

    pub fn cardinality_of(&self, id: VariableId) -> Option<u32> {
        self.get(id).and_then(Variable::cardinality)
    }

    pub fn relationship(&self, id: RelationshipId) -> Option<&Relationship> {
        self.relationships.get(id.index())
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> { self.variables.iter() }

    pub fn relationships(&self) -> impl Iterator<Item = (RelationshipId, &Relationship)> {
        self.relationships.iter().enumerate().map(|(i, r)| (RelationshipId::new(i), r))
    }

    pub fn relationships_of(&self, id: VariableId) -> impl Iterator<Item = (RelationshipId, &Relationship)> {
        self.get(id)
            .map(|v| v.relationships.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |rid| (*rid, &self.relationships[rid.index()]))
    }

    /// Resolves a repetition spec to a concrete count where possible.
    pub fn repetition_count(&self, repetitions: Repetitions) -> Option<u32> {
        match repetitions {
            Repetitions::Exactly(n) | Repetitions::AtMost(n) => Some(n),
            Repetitions::Per(v) => self.cardinality_of(v),
        }
    }
}
