//! engine.rs
//! Drives the six batches over a design, consulting the oracle at every open
//! choice and carrying settled facts from one batch into the next.

use super::fact::{Atom, Fact};
use super::oracle::{CancellationToken, Oracle, OracleContext, OracleError};
use super::session::{BatchSession, Step};
use super::{rules, BatchKind, SynthesisError};
use crate::config::EngineConfig;
use crate::design::Design;
use crate::family::{family_candidates, transformation_candidates, Family, Transformation};
use crate::graph::{DesignGraph, EdgeType};
use crate::inference::{infer_effects, DesignView, EffectsCandidates};
use crate::model::RandomEffect;
use crate::variables::{VariableId, VariableRegistry};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// What a synthesis run settled on.
#[derive(Debug, Clone)]
pub struct Synthesis {
    facts: Vec<Fact>,
    candidates: EffectsCandidates,
    graph: DesignGraph,
}

impl Synthesis {
    /// Every settled fact, batch by batch.
    pub fn facts(&self) -> &[Fact] { &self.facts }

    /// The positive facts that describe the model.
    pub fn model_facts(&self) -> BTreeSet<Fact> {
        self.facts.iter().filter(|f| f.is_positive() && f.atom.is_model_atom()).cloned().collect()
    }

    /// The effect candidates inferred once conceptual ambiguities were settled.
    pub fn candidates(&self) -> &EffectsCandidates { &self.candidates }

    /// The declared graph with rejected Cause/Associate edges removed.
    pub fn graph(&self) -> &DesignGraph { &self.graph }
}

pub struct Synthesizer<O: Oracle> {
    oracle: O,
    config: EngineConfig,
    cancellation: CancellationToken,
}

impl<O: Oracle> Synthesizer<O> {
    pub fn new(oracle: O, config: EngineConfig) -> Self {
        Self { oracle, config, cancellation: CancellationToken::new() }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken { self.cancellation.clone() }
    pub fn config(&self) -> &EngineConfig { &self.config }
    pub fn oracle(&self) -> &O { &self.oracle }
    pub fn into_oracle(self) -> O { self.oracle }

    pub fn synthesize(&mut self, design: &Design) -> Result<Synthesis, SynthesisError> {
        let registry = design.registry();
        let dv = design.dv();
        let mut settled: Vec<Fact> = Vec::new();

        // 1. Conceptual: Cause vs Associate where both were declared
        let pairs = ambiguous_pairs(design.graph());
        let mut session = self.session(BatchKind::Conceptual, registry, &settled);
        session.add_rules(rules::conceptual(&pairs))?;
        for &(cause, effect) in &pairs {
            session.collect(Fact::holds(Atom::Cause { cause, effect }))?;
            session.collect(Fact::holds(Atom::associate(cause, effect)))?;
        }
        settled.extend(self.run(&mut session)?);
        let graph = prune(design.graph(), &settled);

        // 2. Effects, inferred on the pruned graph
        let view = DesignView { registry, graph: &graph, dv, ivs: design.ivs() };
        let candidates = infer_effects(&view);
        debug!(
            main = candidates.main_effects.len(),
            interactions = candidates.interaction_effects.len(),
            random = candidates.random_effects.len(),
            "effects inferred"
        );
        let mut session = self.session(BatchKind::Effects, registry, &settled);
        session.add_rules(rules::effects(dv, &candidates))?;
        let mut subjects: Vec<Atom> =
            candidates.main_effects.iter().map(|&variable| Atom::MainEffect { variable, dv }).collect();
        subjects.extend(candidates.interaction_effects.iter().cloned().map(Atom::Interaction));
        subjects.extend(candidates.random_effects.iter().map(random_atom));
        for atom in subjects {
            let include = self.ask_inclusion(registry, BatchKind::Effects, &Fact::holds(atom.clone()))?;
            session.collect(if include { Fact::holds(atom) } else { Fact::not(atom) })?;
        }
        settled.extend(self.run(&mut session)?);

        // 3. Correlation of every kept slope with its group's kept intercept
        let pairs = slope_intercept_pairs(&settled);
        let mut session = self.session(BatchKind::Correlation, registry, &settled);
        session.add_rules(rules::correlation(&pairs))?;
        for &(iv, groups) in &pairs {
            let subject = Fact::holds(Atom::CorrelatedSlopeIntercept { iv, groups });
            let correlated = self.ask_inclusion(registry, BatchKind::Correlation, &subject)?;
            session.collect(if correlated { subject } else { Fact::holds(Atom::UncorrelatedSlopeIntercept { iv, groups }) })?;
        }
        settled.extend(self.run(&mut session)?);

        // 4. Family
        let options = family_candidates(design.dependent_variable())?;
        let family = match options.as_slice() {
            [only] => *only,
            _ => self.ask_family(registry, &options, design)?,
        };
        let mut session = self.session(BatchKind::Family, registry, &settled);
        session.add_rules(rules::family(&options))?;
        session.collect(Fact::holds(Atom::Family(family)))?;
        settled.extend(self.run(&mut session)?);

        // 5. Link
        let links: Vec<_> = family.admissible_links().into_iter().collect();
        let mut session = self.session(BatchKind::Link, registry, &settled);
        session.add_rules(rules::link(&options, &links))?;
        for &link in &links {
            session.collect(Fact::holds(Atom::Link(link)))?;
        }
        settled.extend(self.run(&mut session)?);

        // 6. Transformation
        let transformations = if self.config.disambiguate_transformations {
            transformation_candidates(design.dependent_variable())
        } else {
            vec![Transformation::None]
        };
        let mut session = self.session(BatchKind::Transformation, registry, &settled);
        session.add_rules(rules::transformation(&transformations))?;
        match transformations.as_slice() {
            [only] => session.assert_permanent(Fact::holds(Atom::Transform(*only)))?,
            _ => {
                for &t in &transformations {
                    session.collect(Fact::holds(Atom::Transform(t)))?;
                }
            }
        }
        settled.extend(self.run(&mut session)?);

        info!(dv = %registry.name_of(dv), facts = settled.len(), "synthesis complete");
        Ok(Synthesis { facts: settled, candidates, graph })
    }

    fn session<'a>(&self, kind: BatchKind, registry: &'a VariableRegistry, settled: &[Fact]) -> BatchSession<'a> {
        BatchSession::new(kind, registry, settled).with_decision_budget(self.config.max_solver_decisions)
    }

    /// Steps a session to stability, handing every conflict to the oracle.
    fn run(&mut self, session: &mut BatchSession<'_>) -> Result<Vec<Fact>, SynthesisError> {
        let batch = session.kind();
        info!(%batch, tentative = session.tentative().len(), "batch started");
        loop {
            match session.next_step()? {
                Step::Stable(facts) => return Ok(facts),
                Step::Conflict { facts, core } => {
                    let ctx = OracleContext::new(session.registry(), batch, &self.cancellation, self.config.oracle_timeout());
                    ctx.check()?;
                    let kept = self.oracle.resolve_unsat(&facts, &core, &ctx).map_err(|e| match e {
                        OracleError::Exhausted(_) => SynthesisError::OracleExhausted {
                            batch,
                            core: core.iter().map(|f| ctx.describe(f)).collect(),
                        },
                        other => other.into(),
                    })?;
                    ctx.check()?;
                    session.resolve(kept)?;
                }
            }
        }
    }

    fn ask_inclusion(&mut self, registry: &VariableRegistry, batch: BatchKind, subject: &Fact) -> Result<bool, SynthesisError> {
        let ctx = OracleContext::new(registry, batch, &self.cancellation, self.config.oracle_timeout());
        ctx.check()?;
        let include = self.oracle.ask_inclusion(subject, &ctx)?;
        ctx.check()?;
        debug!(%batch, subject = %ctx.describe(subject), include, "inclusion answered");
        Ok(include)
    }

    fn ask_family(&mut self, registry: &VariableRegistry, options: &[Family], design: &Design) -> Result<Family, SynthesisError> {
        let ctx = OracleContext::new(registry, BatchKind::Family, &self.cancellation, self.config.oracle_timeout());
        ctx.check()?;
        let family = self.oracle.ask_family(options, design.dependent_variable(), &ctx)?;
        ctx.check()?;
        if !options.contains(&family) {
            return Err(SynthesisError::FamilyNotOffered { family, options: options.to_vec() });
        }
        Ok(family)
    }
}

fn random_atom(effect: &RandomEffect) -> Atom {
    match *effect {
        RandomEffect::RandomIntercept { groups } => Atom::RandomIntercept { groups },
        RandomEffect::RandomSlope { iv, groups } => Atom::RandomSlope { iv, groups },
        RandomEffect::CorrelatedRandomSlopeAndIntercept { iv, groups } => Atom::CorrelatedSlopeIntercept { iv, groups },
        RandomEffect::UncorrelatedRandomSlopeAndIntercept { iv, groups } => {
            Atom::UncorrelatedSlopeIntercept { iv, groups }
        }
    }
}

/// `(cause, effect)` pairs declared both as a cause and as an association.
fn ambiguous_pairs(graph: &DesignGraph) -> Vec<(VariableId, VariableId)> {
    let mut out = BTreeSet::new();
    for (start, end, edge) in graph.edges() {
        if edge.edge_type == EdgeType::Cause
            && (graph.has_edge(start, end, EdgeType::Associate) || graph.has_edge(end, start, EdgeType::Associate))
        {
            out.insert((start, end));
        }
    }
    out.into_iter().collect()
}

/// Drops the Cause and Associate edges whose facts were negated.
fn prune(graph: &DesignGraph, settled: &[Fact]) -> DesignGraph {
    let rejected: BTreeSet<&Atom> = settled.iter().filter(|f| f.negated).map(|f| &f.atom).collect();
    if rejected.is_empty() {
        return graph.clone();
    }
    graph.without_edges(|start, end, edge| match edge.edge_type {
        EdgeType::Cause => rejected.contains(&Atom::Cause { cause: start, effect: end }),
        EdgeType::Associate => rejected.contains(&Atom::associate(start, end)),
        _ => false,
    })
}

fn slope_intercept_pairs(settled: &[Fact]) -> Vec<(VariableId, VariableId)> {
    let intercepts: BTreeSet<VariableId> = settled
        .iter()
        .filter(|f| f.is_positive())
        .filter_map(|f| match f.atom {
            Atom::RandomIntercept { groups } => Some(groups),
            _ => None,
        })
        .collect();
    let pairs: BTreeSet<(VariableId, VariableId)> = settled
        .iter()
        .filter(|f| f.is_positive())
        .filter_map(|f| match f.atom {
            Atom::RandomSlope { iv, groups } if intercepts.contains(&groups) => Some((iv, groups)),
            _ => None,
        })
        .collect();
    pairs.into_iter().collect()
}
