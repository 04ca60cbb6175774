//! intermediate.rs
//! The persisted hand-off between inference and an interactive front end: the
//! query plus every generated candidate, written as JSON.

use crate::design::Design;
use crate::family::{family_candidates, FamilyError};
use crate::inference::EffectsCandidates;
use crate::model::RandomEffect;
use crate::variables::{Relationship, VariableRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to read or write the intermediate spec: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed intermediate spec: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Family(#[from] FamilyError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntermediateSpec {
    pub input: SpecInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecInput {
    pub query: Query,
    #[serde(rename = "generated main effects")]
    pub main_effects: Vec<String>,
    #[serde(rename = "generated interaction effects")]
    pub interaction_effects: Vec<Vec<String>>,
    /// Keyed by grouping variable.
    #[serde(rename = "generated random effects")]
    pub random_effects: BTreeMap<String, Vec<RandomEffectEntry>>,
    /// Family name to admissible link names.
    #[serde(rename = "generated family, link functions")]
    pub family_links: BTreeMap<String, Vec<String>>,
    #[serde(rename = "measures to units", default)]
    pub measures_to_units: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    #[serde(rename = "DV")]
    pub dv: String,
    #[serde(rename = "IVs")]
    pub ivs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RandomEffectEntry {
    #[serde(rename = "random intercept")]
    RandomIntercept { groups: String },
    #[serde(rename = "random slope")]
    RandomSlope { iv: String, groups: String },
    #[serde(rename = "correlated random slope and intercept")]
    CorrelatedRandomSlopeAndIntercept { iv: String, groups: String },
    #[serde(rename = "uncorrelated random slope and intercept")]
    UncorrelatedRandomSlopeAndIntercept { iv: String, groups: String },
}

impl RandomEffectEntry {
    fn from_effect(effect: &RandomEffect, registry: &VariableRegistry) -> Self {
        let n = |id| registry.name_of(id).to_string();
        match *effect {
            RandomEffect::RandomIntercept { groups } => Self::RandomIntercept { groups: n(groups) },
            RandomEffect::RandomSlope { iv, groups } => Self::RandomSlope { iv: n(iv), groups: n(groups) },
            RandomEffect::CorrelatedRandomSlopeAndIntercept { iv, groups } => {
                Self::CorrelatedRandomSlopeAndIntercept { iv: n(iv), groups: n(groups) }
            }
            RandomEffect::UncorrelatedRandomSlopeAndIntercept { iv, groups } => {
                Self::UncorrelatedRandomSlopeAndIntercept { iv: n(iv), groups: n(groups) }
            }
        }
    }
}

impl IntermediateSpec {
    pub fn from_candidates(design: &Design, candidates: &EffectsCandidates) -> Result<Self, ExportError> {
        let registry = design.registry();
        let name = |id| registry.name_of(id).to_string();

        let query = Query { dv: name(design.dv()), ivs: design.ivs().iter().map(|&id| name(id)).collect() };

        let main_effects = candidates.main_effects.iter().map(|&id| name(id)).collect();
        let interaction_effects = candidates
            .interaction_effects
            .iter()
            .map(|effect| effect.variables().iter().map(|&id| name(id)).collect())
            .collect();

        let mut random_effects: BTreeMap<String, Vec<RandomEffectEntry>> = BTreeMap::new();
        for effect in &candidates.random_effects {
            random_effects
                .entry(name(effect.groups()))
                .or_default()
                .push(RandomEffectEntry::from_effect(effect, registry));
        }

        let mut family_links = BTreeMap::new();
        for family in family_candidates(design.dependent_variable())? {
            let links = family.admissible_links().into_iter().map(|l| format!("{}Link", l)).collect();
            family_links.insert(format!("{}Family", family), links);
        }

        let mut measures_to_units = BTreeMap::new();
        for (_, relationship) in registry.relationships() {
            match relationship {
                Relationship::Has { unit, measure, .. } => {
                    measures_to_units.entry(name(*measure)).or_insert_with(|| name(*unit));
                }
                Relationship::Repeat { unit, response, .. } => {
                    measures_to_units.entry(name(*response)).or_insert_with(|| name(*unit));
                }
                _ => {}
            }
        }

        Ok(Self {
            input: SpecInput { query, main_effects, interaction_effects, random_effects, family_links, measures_to_units },
        })
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read_from_path(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::infer_effects;
    use crate::variables::{DataKind, Repetitions, VariableSpec};
    use tempfile::tempdir;

    fn nested_design() -> Design {
        let mut reg = VariableRegistry::new();
        let student = reg.add_unit("Student", Some(100)).unwrap();
        let school = reg.add_unit("School", Some(5)).unwrap();
        let score = reg.add_measure(student, "score", DataKind::Numeric, VariableSpec::default(), Repetitions::Exactly(1)).unwrap();
        let hours = reg.add_measure(student, "hours", DataKind::Numeric, VariableSpec::default(), Repetitions::Exactly(1)).unwrap();
        reg.nests_within(student, school).unwrap();
        reg.causes(hours, score).unwrap();
        Design::builder(reg).dependent(score).independent(hours).build().unwrap()
    }

    #[test]
    fn test_json_uses_the_exchange_keys() {
        let design = nested_design();
        let spec = IntermediateSpec::from_candidates(&design, &infer_effects(&design.view())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&spec.to_json().unwrap()).unwrap();

        let input = &value["input"];
        assert_eq!(input["query"]["DV"], "score");
        assert_eq!(input["query"]["IVs"], serde_json::json!(["hours"]));
        assert_eq!(input["generated main effects"], serde_json::json!(["hours"]));
        assert_eq!(input["generated interaction effects"], serde_json::json!([]));
        assert_eq!(
            input["generated random effects"]["School"][0],
            serde_json::json!({ "random intercept": { "groups": "School" } })
        );
        assert_eq!(input["generated family, link functions"]["GammaFamily"], serde_json::json!(["IdentityLink", "LogLink", "InverseLink"]));
        assert_eq!(input["measures to units"]["hours"], "Student");
    }

    #[test]
    fn test_spec_persists_to_disk() {
        let design = nested_design();
        let spec = IntermediateSpec::from_candidates(&design, &infer_effects(&design.view())).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("spec.json");
        spec.write_to_path(&path).unwrap();
        assert_eq!(IntermediateSpec::read_from_path(&path).unwrap(), spec);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(IntermediateSpec::from_json("{\"input\": 3}"), Err(ExportError::Json(_))));

        let dir = tempdir().unwrap();
        assert!(matches!(IntermediateSpec::read_from_path(dir.path().join("missing.json")), Err(ExportError::Io(_))));
    }
}
