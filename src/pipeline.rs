//! pipeline.rs
//! End-to-end entry points: design in, statistical model (or the intermediate
//! JSON hand-off) out.

use crate::config::EngineConfig;
use crate::design::{Design, DesignError};
use crate::family::FamilyError;
use crate::inference::infer_effects;
use crate::model::{AssemblyError, ExportError, IntermediateSpec, StatisticalModel};
use crate::synthesis::{Oracle, SynthesisError, Synthesizer};
use crate::variables::VariableError;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Variable(#[from] VariableError),
    #[error(transparent)]
    Design(#[from] DesignError),
    #[error(transparent)]
    Family(#[from] FamilyError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Runs every batch against `oracle` and assembles the resulting model.
pub fn infer_statistical_model<O: Oracle>(
    design: &Design,
    oracle: O,
    config: EngineConfig,
) -> Result<StatisticalModel, PipelineError> {
    let mut synthesizer = Synthesizer::new(oracle, config);
    synthesize_with(&mut synthesizer, design)
}

/// Like [`infer_statistical_model`], but keeps the synthesizer (and its
/// oracle) with the caller.
pub fn synthesize_with<O: Oracle>(
    synthesizer: &mut Synthesizer<O>,
    design: &Design,
) -> Result<StatisticalModel, PipelineError> {
    let synthesis = synthesizer.synthesize(design)?;
    let model = StatisticalModel::assemble(design.dv(), synthesis.facts(), design.dataset().cloned())?;
    info!(
        dv = %design.name_of(model.dependent_variable()),
        main = model.main_effects().len(),
        interactions = model.interaction_effects().len(),
        random = model.random_effects().len(),
        family = %model.family_function(),
        link = %model.link_function(),
        "model assembled"
    );
    Ok(model)
}

/// Infers every candidate without asking anything, for a front end that
/// drives the choices itself.
pub fn generate_intermediate_spec(design: &Design) -> Result<IntermediateSpec, PipelineError> {
    let candidates = infer_effects(&design.view());
    Ok(IntermediateSpec::from_candidates(design, &candidates)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{family_candidates, Family, Link, Transformation};
    use crate::model::{InteractionEffect, RandomEffect};
    use crate::synthesis::{Atom, Fact, PolicyOracle, ScriptedOracle};
    use crate::variables::{DataKind, DatasetHandle, Repetitions, VariableId, VariableRegistry, VariableSpec};
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn scenario_a() -> (Design, VariableId, VariableId) {
        let mut reg = VariableRegistry::new();
        let unit = reg.add_unit("Unit", None).unwrap();
        let m0 = reg.add_measure(unit, "m0", DataKind::Numeric, VariableSpec::default(), Repetitions::Exactly(1)).unwrap();
        let m1 = reg.add_measure(unit, "m1", DataKind::Numeric, VariableSpec::default(), Repetitions::Exactly(1)).unwrap();
        let dv = reg.add_measure(unit, "dv", DataKind::Numeric, VariableSpec::default(), Repetitions::Exactly(1)).unwrap();
        reg.causes(m0, dv).unwrap();
        reg.causes(m1, dv).unwrap();
        let design = Design::builder(reg).dependent(dv).independents(&[m0, m1]).build().unwrap();
        (design, m0, m1)
    }

    /// Reaction times of subjects responding to words under two conditions.
    fn scenario_c() -> (Design, VariableId, VariableId, VariableId) {
        let mut reg = VariableRegistry::new();
        let subject = reg.add_unit("Subject", Some(12)).unwrap();
        let word = reg.add_unit("Word", Some(4)).unwrap();
        let condition = reg
            .add_measure(subject, "condition", DataKind::Nominal, VariableSpec::with_categories(["a", "b"]), Repetitions::Exactly(2))
            .unwrap();
        let reaction_time = reg.add_numeric("reaction_time").unwrap();
        reg.has_according_to(subject, reaction_time, Repetitions::Per(word), word).unwrap();
        reg.causes(condition, reaction_time).unwrap();
        let design = Design::builder(reg).dependent(reaction_time).independent(condition).build().unwrap();
        (design, subject, word, condition)
    }

    #[test]
    fn test_scenario_a_fixed_effects_only() {
        let (design, m0, m1) = scenario_a();
        let candidates = infer_effects(&design.view());
        assert_eq!(candidates.main_effects, [m0, m1].into_iter().collect());
        assert!(candidates.interaction_effects.is_empty());
        assert!(candidates.random_effects.is_empty());
        let families = family_candidates(design.dependent_variable()).unwrap();
        for f in [Family::Gaussian, Family::InverseGaussian, Family::Gamma, Family::Tweedie, Family::Poisson] {
            assert!(families.contains(&f));
        }

        let model = infer_statistical_model(&design, PolicyOracle::new(), EngineConfig::default()).unwrap();
        assert_eq!(model.main_effects(), &[m0, m1].into_iter().collect());
        assert_eq!(model.family_function(), Family::Gaussian);
        assert_eq!(model.link_function(), Link::Identity);
        assert_eq!(model.dv_transformation(), Transformation::None);
        assert!(!model.has_random_effects());
    }

    #[test]
    fn test_scenario_b_single_interaction() {
        let mut reg = VariableRegistry::new();
        let dv = reg.add_numeric("dv").unwrap();
        let m0 = reg.add_numeric("m0").unwrap();
        let m1 = reg.add_numeric("m1").unwrap();
        let m2 = reg.add_numeric("m2").unwrap();
        reg.causes(m0, dv).unwrap();
        reg.causes(m1, dv).unwrap();
        reg.moderates(m2, &[m1], dv).unwrap();
        let design = Design::builder(reg).dependent(dv).independents(&[m0, m1, m2]).build().unwrap();

        let model = infer_statistical_model(&design, PolicyOracle::new(), EngineConfig::default()).unwrap();
        let expected: BTreeSet<_> = [InteractionEffect::new([m1, m2])].into_iter().collect();
        assert_eq!(model.interaction_effects(), &expected);
        assert_eq!(model.main_effects(), &[m0, m1, m2].into_iter().collect());
    }

    #[test]
    fn test_scenario_c_three_random_effects() {
        let (design, subject, word, condition) = scenario_c();
        let candidates = infer_effects(&design.view());
        let expected: BTreeSet<_> = [
            RandomEffect::RandomIntercept { groups: subject },
            RandomEffect::RandomIntercept { groups: word },
            RandomEffect::RandomSlope { iv: condition, groups: subject },
        ]
        .into_iter()
        .collect();
        assert_eq!(candidates.random_effects, expected);
    }

    #[test]
    fn test_scenario_c_correlation_is_a_choice() {
        let (design, subject, word, condition) = scenario_c();
        let oracle = ScriptedOracle::new()
            .answer(Atom::CorrelatedSlopeIntercept { iv: condition, groups: subject }, false)
            .family(Family::Gamma)
            .keep(Fact::holds(Atom::Link(Link::Log)))
            .keep(Fact::holds(Atom::Transform(Transformation::None)));
        let mut synthesizer = Synthesizer::new(oracle, EngineConfig::default());
        let model = synthesize_with(&mut synthesizer, &design).unwrap();

        let expected: BTreeSet<_> = [
            RandomEffect::RandomIntercept { groups: word },
            RandomEffect::UncorrelatedRandomSlopeAndIntercept { iv: condition, groups: subject },
        ]
        .into_iter()
        .collect();
        assert_eq!(model.random_effects(), &expected);
        assert_eq!((model.family_function(), model.link_function()), (Family::Gamma, Link::Log));
        assert!(synthesizer
            .oracle()
            .asked()
            .contains(&Fact::holds(Atom::CorrelatedSlopeIntercept { iv: condition, groups: subject })));
    }

    #[test]
    fn test_scenario_d_nominal_and_ordinal_families() {
        let mut reg = VariableRegistry::new();
        let passed = reg.add_nominal("passed", VariableSpec::with_categories(["no", "yes"])).unwrap();
        let hours = reg.add_numeric("hours").unwrap();
        reg.causes(hours, passed).unwrap();
        let design = Design::builder(reg).dependent(passed).independent(hours).build().unwrap();
        assert_eq!(family_candidates(design.dependent_variable()).unwrap(), vec![Family::Binomial]);

        let model = infer_statistical_model(&design, PolicyOracle::new(), EngineConfig::default()).unwrap();
        assert_eq!(model.family_function(), Family::Binomial);
        assert_eq!(model.link_function(), Link::Logit);
        assert_eq!(model.dv_transformation(), Transformation::None);

        let mut reg = VariableRegistry::new();
        let rating = reg.add_ordinal("rating", VariableSpec::with_order(["1", "2", "3", "4", "5"])).unwrap();
        let price = reg.add_numeric("price").unwrap();
        reg.causes(price, rating).unwrap();
        let design = Design::builder(reg).dependent(rating).independent(price).build().unwrap();
        let families: BTreeSet<_> = family_candidates(design.dependent_variable()).unwrap().into_iter().collect();
        assert_eq!(families, Family::ALL.into_iter().collect());
    }

    #[test]
    fn test_round_trip_of_model_facts() {
        let (design, _, _, _) = scenario_c();
        let mut synthesizer = Synthesizer::new(PolicyOracle::new(), EngineConfig::default());
        let synthesis = synthesizer.synthesize(&design).unwrap();
        let model = StatisticalModel::assemble(design.dv(), synthesis.facts(), None).unwrap();
        assert_eq!(model.to_facts(), synthesis.model_facts());
    }

    #[test]
    fn test_synthesis_settles_on_a_consistent_fact_set() {
        let (design, _, _, _) = scenario_c();
        let oracle = ScriptedOracle::new()
            .family(Family::Poisson)
            .keep(Fact::holds(Atom::Link(Link::Squareroot)))
            .keep(Fact::holds(Atom::Transform(Transformation::Log)));
        let mut synthesizer = Synthesizer::new(oracle, EngineConfig::default());
        let synthesis = synthesizer.synthesize(&design).unwrap();

        // No atom is settled both ways.
        let facts: BTreeSet<&Fact> = synthesis.facts().iter().collect();
        assert!(synthesis.facts().iter().all(|f| !facts.contains(&f.negate())));
        // One conflict per open choice: link, then transformation.
        assert_eq!(synthesizer.oracle().conflicts().len(), 2);
        assert_eq!(synthesizer.oracle().conflicts()[0].len(), 3);

        let model = StatisticalModel::assemble(design.dv(), synthesis.facts(), None).unwrap();
        assert_eq!(model.dv_transformation(), Transformation::Log);
    }

    #[test]
    fn test_transformations_can_be_switched_off() {
        let (design, m0, _) = scenario_a();
        let config = EngineConfig { disambiguate_transformations: false, ..EngineConfig::default() };
        let oracle = ScriptedOracle::new().answer(Atom::MainEffect { variable: m0, dv: design.dv() }, false)
            .family(Family::Gaussian)
            .keep(Fact::holds(Atom::Link(Link::Log)));
        let model = infer_statistical_model(&design, oracle, config).unwrap();
        assert_eq!(model.dv_transformation(), Transformation::None);
        assert!(!model.main_effects().contains(&m0));
        assert_eq!(model.link_function(), Link::Log);
    }

    #[test]
    fn test_dataset_is_carried_into_the_model() {
        let (mut design, _, _) = scenario_a();
        design.assign_data(DatasetHandle("study.csv".into()));
        let model = infer_statistical_model(&design, PolicyOracle::new(), EngineConfig::default()).unwrap();
        assert_eq!(model.dataset(), Some(&DatasetHandle("study.csv".into())));
    }

    #[test]
    fn test_intermediate_spec_round_trips_through_disk() {
        let (design, _, _, _) = scenario_c();
        let spec = generate_intermediate_spec(&design).unwrap();
        assert_eq!(spec.input.query.dv, "reaction_time");
        assert_eq!(spec.input.random_effects["Subject"].len(), 2);
        assert_eq!(spec.input.family_links.len(), 5);

        let dir = tempdir().unwrap();
        let path = dir.path().join("design.json");
        spec.write_to_path(&path).unwrap();
        assert_eq!(IntermediateSpec::read_from_path(&path).unwrap(), spec);
    }
}
