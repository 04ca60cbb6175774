//! A study design: one dependent variable, its independent variables and
//! groupings, and the design graph built from their relationships.
//!
//! A `Design` is the only input of the engine. It is validated on
//! construction, so every later stage can assume the DV is reachable from
//! each IV and never feeds back into them.

pub mod error;
mod validate;

pub use error::{DesignError, ValidationError, ValidationErrorType};
pub use validate::DesignValidator;

use crate::graph::DesignGraph;
use crate::variables::{DatasetHandle, Relationship, Repetitions, Variable, VariableError, VariableId, VariableRegistry};
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

/// One level of a multilevel design: a unit and the measures it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub identifier: VariableId,
    pub measures: Vec<VariableId>,
}

impl Level {
    pub fn new(identifier: VariableId, measures: Vec<VariableId>) -> Self {
        Self { identifier, measures }
    }
}

/// Levels ordered innermost first; each level is nested under the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelSet {
    pub levels: Vec<Level>,
}

impl LevelSet {
    pub fn new(levels: Vec<Level>) -> Self { Self { levels } }

    /// Appends a containing level.
    pub fn nest_under(mut self, group: Level) -> Self {
        self.levels.push(group);
        self
    }
}

impl From<Level> for LevelSet {
    fn from(level: Level) -> Self { Self { levels: vec![level] } }
}

#[derive(Debug, Clone)]
pub struct Design {
    registry: VariableRegistry,
    dv: VariableId,
    ivs: Vec<VariableId>,
    groupings: Vec<VariableId>,
    dataset: Option<DatasetHandle>,
    graph: DesignGraph,
    normalized: DesignGraph,
}

impl Design {
    pub fn builder(registry: VariableRegistry) -> DesignBuilder {
        DesignBuilder::new(registry)
    }

    pub fn registry(&self) -> &VariableRegistry { &self.registry }
    pub fn dv(&self) -> VariableId { self.dv }
    pub fn ivs(&self) -> &[VariableId] { &self.ivs }
    pub fn groupings(&self) -> &[VariableId] { &self.groupings }
    pub fn dataset(&self) -> Option<&DatasetHandle> { self.dataset.as_ref() }

    /// The graph as declared.
    pub fn graph(&self) -> &DesignGraph { &self.graph }

    /// The declared graph after `transform_to_has_edges`.
    pub fn normalized_graph(&self) -> &DesignGraph { &self.normalized }

    pub fn dependent_variable(&self) -> &Variable {
        self.registry
            .get(self.dv)
            .expect("BUG: dependent variable handle was checked by DesignBuilder::build")
    }

    pub fn variable(&self, id: VariableId) -> Option<&Variable> { self.registry.get(id) }

    pub fn name_of(&self, id: VariableId) -> &str { self.registry.name_of(id) }

    pub fn is_iv(&self, id: VariableId) -> bool { self.ivs.contains(&id) }

    pub fn assign_data(&mut self, dataset: DatasetHandle) {
        self.dataset = Some(dataset);
    }
}

/// Assembles a `Design`, applying levels and validating the result.
#[derive(Debug, Clone)]
pub struct DesignBuilder {
    registry: VariableRegistry,
    dv: Option<VariableId>,
    ivs: Vec<VariableId>,
    groupings: Vec<VariableId>,
    levels: Option<LevelSet>,
    dataset: Option<DatasetHandle>,
}

impl DesignBuilder {
    pub fn new(registry: VariableRegistry) -> Self {
        Self { registry, dv: None, ivs: Vec::new(), groupings: Vec::new(), levels: None, dataset: None }
    }

    pub fn dependent(mut self, dv: VariableId) -> Self {
        self.dv = Some(dv);
        self
    }

    pub fn independent(mut self, iv: VariableId) -> Self {
        self.ivs.push(iv);
        self
    }

    pub fn independents(mut self, ivs: &[VariableId]) -> Self {
        self.ivs.extend_from_slice(ivs);
        self
    }

    pub fn grouping(mut self, unit: VariableId) -> Self {
        self.groupings.push(unit);
        self
    }

    pub fn levels(mut self, levels: impl Into<LevelSet>) -> Self {
        self.levels = Some(levels.into());
        self
    }

    pub fn dataset(mut self, dataset: DatasetHandle) -> Self {
        self.dataset = Some(dataset);
        self
    }

    pub fn build(mut self) -> Result<Design, DesignError> {
        let dv = self.dv.ok_or(DesignError::MissingDependentVariable)?;
        self.registry.get(dv).ok_or(VariableError::UnknownVariable(dv))?;

        if let Some(levels) = self.levels.take() {
            self.apply_levels(dv, &levels)?;
        }

        // 1. Declared variables must exist and be used once.
        let mut seen = BTreeSet::new();
        for &iv in &self.ivs {
            let var = self.registry.get(iv).ok_or(VariableError::UnknownVariable(iv))?;
            if iv == dv {
                return Err(DesignError::DependentAsIndependent(var.name().to_string()));
            }
            if !seen.insert(iv) {
                return Err(DesignError::DuplicateIndependent(var.name().to_string()));
            }
        }
        for &g in &self.groupings {
            let var = self.registry.get(g).ok_or(VariableError::UnknownVariable(g))?;
            if !var.is_unit() {
                return Err(VariableError::NotAUnit { id: g, name: var.name().to_string() }.into());
            }
        }

        // 2. Build the graph from every relationship reachable from the design.
        let graph = self.build_graph(dv)?;
        let normalized = graph.transform_to_has_edges(&self.registry);
        debug!(nodes = graph.node_count(), edges = graph.edge_count(), "design graph built");

        // 3. Validate before anything is inferred.
        DesignValidator::new(&self.registry, &normalized)
            .validate(dv, &self.ivs)
            .map_err(DesignError::Invalid)?;

        Ok(Design {
            registry: self.registry,
            dv,
            ivs: self.ivs,
            groupings: self.groupings,
            dataset: self.dataset,
            graph,
            normalized,
        })
    }

    /// Registers ownership and nesting implied by the levels and adopts their
    /// measures as independent variables.
    fn apply_levels(&mut self, dv: VariableId, levels: &LevelSet) -> Result<(), DesignError> {
        for level in &levels.levels {
            let unit = self.registry.get(level.identifier).ok_or(VariableError::UnknownVariable(level.identifier))?;
            if !unit.is_unit() {
                return Err(DesignError::LevelIdentifierNotUnit(unit.name().to_string()));
            }
            for &measure in &level.measures {
                let owned = self.registry.relationships_of(measure).any(|(_, r)| {
                    matches!(r, Relationship::Has { unit, measure: m, .. } if *unit == level.identifier && *m == measure)
                });
                if !owned {
                    self.registry.has(level.identifier, measure, Repetitions::Exactly(1))?;
                }
                if measure != dv && !self.ivs.contains(&measure) {
                    self.ivs.push(measure);
                }
            }
            if !self.groupings.contains(&level.identifier) {
                self.groupings.push(level.identifier);
            }
        }
        for pair in levels.levels.windows(2) {
            self.registry.nests_within(pair[0].identifier, pair[1].identifier)?;
        }
        Ok(())
    }

    fn build_graph(&self, dv: VariableId) -> Result<DesignGraph, DesignError> {
        let mut graph = DesignGraph::new();
        let mut queue: VecDeque<VariableId> = std::iter::once(dv)
            .chain(self.ivs.iter().copied())
            .chain(self.groupings.iter().copied())
            .collect();
        let mut visited = BTreeSet::new();
        let mut added = BTreeSet::new();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let var = self.registry.get(id).ok_or(VariableError::UnknownVariable(id))?;
            graph.add_variable(var);
            for (rid, relationship) in self.registry.relationships_of(id) {
                if added.insert(rid) {
                    graph.add_relationship(&self.registry, rid)?;
                }
                queue.extend(relationship.endpoints().into_iter().filter(|v| !visited.contains(v)));
            }
        }
        for &g in &self.groupings {
            if let Some(var) = self.registry.get(g) {
                graph.mark_identifier(var);
            }
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeSelector, EdgeType};

    #[test]
    fn test_iv_without_path_is_rejected() {
        let mut reg = VariableRegistry::new();
        let dv = reg.add_numeric("dv").unwrap();
        let x = reg.add_numeric("x").unwrap();
        let y = reg.add_numeric("y").unwrap();
        reg.causes(x, dv).unwrap();

        let err = Design::builder(reg).dependent(dv).independents(&[x, y]).build().unwrap_err();
        match err {
            DesignError::Invalid(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].error_type, ValidationErrorType::NoPathToDependent);
                assert_eq!(errors[0].variable_name, "y");
                assert_eq!(errors[0].other_name, "dv");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_dv_causing_iv_is_rejected() {
        let mut reg = VariableRegistry::new();
        let dv = reg.add_numeric("dv").unwrap();
        let x = reg.add_numeric("x").unwrap();
        reg.causes(x, dv).unwrap();
        reg.causes(dv, x).unwrap();

        let err = Design::builder(reg).dependent(dv).independent(x).build().unwrap_err();
        let DesignError::Invalid(errors) = err else { panic!("expected validation errors") };
        assert!(errors.iter().any(|e| e.error_type == ValidationErrorType::DependentReachesIndependent));
        assert!(err_message_names_pair(&errors, "dv", "x"));
    }

    #[test]
    fn test_feedback_loop_through_non_iv_is_rejected() {
        let mut reg = VariableRegistry::new();
        let dv = reg.add_numeric("dv").unwrap();
        let x = reg.add_numeric("x").unwrap();
        let z = reg.add_numeric("z").unwrap();
        reg.causes(x, dv).unwrap();
        reg.causes(dv, z).unwrap();
        reg.causes(z, dv).unwrap();

        let err = Design::builder(reg).dependent(dv).independent(x).build().unwrap_err();
        let DesignError::Invalid(errors) = err else { panic!("expected validation errors") };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, ValidationErrorType::FeedbackIntoDependent);
        assert_eq!((errors[0].variable, errors[0].other), (z, dv));
        assert!(err_message_names_pair(&errors, "z", "dv"));
    }

    fn err_message_names_pair(errors: &[ValidationError], a: &str, b: &str) -> bool {
        errors.iter().any(|e| e.message.contains(a) && e.message.contains(b))
    }

    #[test]
    fn test_dv_cannot_be_iv() {
        let mut reg = VariableRegistry::new();
        let dv = reg.add_numeric("dv").unwrap();
        let err = Design::builder(reg).dependent(dv).independent(dv).build().unwrap_err();
        assert_eq!(err, DesignError::DependentAsIndependent("dv".into()));
    }

    #[test]
    fn test_graph_pulls_in_upstream_relationships() {
        let mut reg = VariableRegistry::new();
        let dv = reg.add_numeric("dv").unwrap();
        let x = reg.add_numeric("x").unwrap();
        let z = reg.add_numeric("z").unwrap();
        let w = reg.add_numeric("w").unwrap();
        reg.causes(x, dv).unwrap();
        reg.causes(z, x).unwrap();
        reg.causes(w, z).unwrap();

        let design = Design::builder(reg).dependent(dv).independent(x).build().unwrap();
        assert!(design.graph().has_edge("w", "z", EdgeType::Cause));
        assert_eq!(design.graph().node_count(), 4);
    }

    #[test]
    fn test_levels_register_ownership_and_nesting() {
        let mut reg = VariableRegistry::new();
        let student = reg.add_unit("Student", Some(100)).unwrap();
        let school = reg.add_unit("School", Some(5)).unwrap();
        let score = reg.add_numeric("score").unwrap();
        let hours = reg.add_numeric("hours").unwrap();
        let funding = reg.add_numeric("funding").unwrap();
        reg.has(student, score, Repetitions::Exactly(1)).unwrap();
        reg.causes(hours, score).unwrap();
        reg.causes(funding, score).unwrap();

        let levels = LevelSet::from(Level::new(student, vec![hours])).nest_under(Level::new(school, vec![funding]));
        let design = Design::builder(reg).dependent(score).levels(levels).build().unwrap();

        assert_eq!(design.ivs(), &[hours, funding]);
        assert_eq!(design.groupings(), &[student, school]);
        assert!(design.graph().has_edge("Student", "School", EdgeType::Nest));
        assert!(design.graph().has_edge("School", "funding", EdgeType::Has));
        assert_eq!(design.graph().get_identifiers(), vec![student, school]);
        assert!(design.normalized_graph().get_neighbors("School", EdgeType::Has).contains(&student));
        assert_eq!(design.normalized_graph().get_neighbors("hours", EdgeSelector::All), vec![score]);
    }
}
