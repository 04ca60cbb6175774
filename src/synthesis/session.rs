//! session.rs
//! One batch of the synthesis loop as an explicit state machine.
//!
//! ```text
//! Collecting -> Grounding -> Checking -> (Resolving -> Checking)* -> Stable
//! ```
//!
//! The oracle is never called from here. When a conflict needs a decision the
//! session parks in `Resolving` and hands the core back through
//! [`BatchSession::next_step`]; the caller answers with
//! [`BatchSession::resolve`]. Every round moves at least one tentative fact to
//! the permanent set, so a batch settles within as many rounds as it collected
//! facts.

use super::fact::{Atom, Fact};
use super::rules::Rule;
use super::sat::{Formula, Lit, SatOutcome, Solver, SolverError, Var};
use super::{BatchKind, SynthesisError};
use crate::variables::VariableRegistry;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Grounding,
    Checking,
    Resolving,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The batch is consistent; these are the facts it settled.
    Stable(Vec<Fact>),
    /// The oracle must keep one member of `core`. `facts` is everything
    /// currently asserted, for context.
    Conflict { facts: Vec<Fact>, core: Vec<Fact> },
}

pub struct BatchSession<'a> {
    kind: BatchKind,
    registry: &'a VariableRegistry,
    phase: Phase,
    rules: Vec<Rule>,
    /// Settled by earlier batches.
    carried: Vec<Fact>,
    /// Settled in this batch.
    permanent: Vec<Fact>,
    tentative: Vec<Fact>,
    core: Vec<Fact>,
    formula: Formula,
    vars: HashMap<Atom, Var>,
    /// Atoms of each exactly-one rule.
    choice_groups: Vec<Vec<Atom>>,
    bound: usize,
    rounds: usize,
    max_decisions: Option<u64>,
}

impl<'a> BatchSession<'a> {
    pub fn new(kind: BatchKind, registry: &'a VariableRegistry, carried: &[Fact]) -> Self {
        Self {
            kind,
            registry,
            phase: Phase::Collecting,
            rules: Vec::new(),
            carried: carried.to_vec(),
            permanent: Vec::new(),
            tentative: Vec::new(),
            core: Vec::new(),
            formula: Formula::new(),
            vars: HashMap::new(),
            choice_groups: Vec::new(),
            bound: 0,
            rounds: 0,
            max_decisions: None,
        }
    }

    pub fn with_decision_budget(mut self, max_decisions: Option<u64>) -> Self {
        self.max_decisions = max_decisions;
        self
    }

    pub fn kind(&self) -> BatchKind { self.kind }
    pub fn phase(&self) -> Phase { self.phase }
    pub fn registry(&self) -> &'a VariableRegistry { self.registry }
    pub fn tentative(&self) -> &[Fact] { &self.tentative }
    pub fn permanent(&self) -> &[Fact] { &self.permanent }
    pub fn rounds(&self) -> usize { self.rounds }

    /// Upper bound on resolution rounds, fixed at grounding time.
    pub fn bound(&self) -> usize { self.bound }

    pub fn pending_core(&self) -> Option<&[Fact]> {
        (self.phase == Phase::Resolving).then_some(self.core.as_slice())
    }

    // --- Collecting ---

    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = Rule>) -> Result<(), SynthesisError> {
        self.ensure_collecting()?;
        self.rules.extend(rules);
        Ok(())
    }

    /// Adds a fact the oracle may later be asked to give up.
    pub fn collect(&mut self, fact: Fact) -> Result<(), SynthesisError> {
        self.ensure_collecting()?;
        if !self.tentative.contains(&fact) {
            self.tentative.push(fact);
        }
        Ok(())
    }

    /// Adds a fact that is settled without asking anyone.
    pub fn assert_permanent(&mut self, fact: Fact) -> Result<(), SynthesisError> {
        self.ensure_collecting()?;
        if !self.permanent.contains(&fact) {
            self.permanent.push(fact);
        }
        Ok(())
    }

    fn ensure_collecting(&self) -> Result<(), SynthesisError> {
        match self.phase {
            Phase::Collecting => Ok(()),
            _ => Err(SynthesisError::SessionClosed(self.kind)),
        }
    }

    // --- Grounding ---

    fn ground(&mut self) {
        self.phase = Phase::Grounding;

        for rule in std::mem::take(&mut self.rules) {
            match &rule {
                Rule::ExactlyOne(atoms) => {
                    let lits: Vec<Lit> = atoms.iter().map(|a| Lit::positive(self.var(a))).collect();
                    self.formula.exactly_one(&lits);
                    self.choice_groups.push(atoms.clone());
                }
                Rule::Implies(a, b) => {
                    let (a, b) = (Lit::positive(self.var(a)), Lit::positive(self.var(b)));
                    self.formula.implies(a, b);
                }
                Rule::Excludes(a, b) => {
                    let (a, b) = (Lit::negative(self.var(a)), Lit::negative(self.var(b)));
                    self.formula.add_clause([a, b]);
                }
            }
            self.rules.push(rule);
        }

        let pinned: Vec<Fact> = self.carried.iter().chain(&self.permanent).cloned().collect();
        for fact in &pinned {
            let lit = self.lit(fact);
            self.formula.add_clause([lit]);
        }
        for fact in self.tentative.clone() {
            self.lit(&fact);
        }

        self.bound = self.tentative.len();
        debug!(
            batch = %self.kind,
            vars = self.formula.num_vars(),
            clauses = self.formula.clauses().len(),
            tentative = self.bound,
            "batch grounded"
        );
        self.phase = Phase::Checking;
    }

    fn var(&mut self, atom: &Atom) -> Var {
        if let Some(&v) = self.vars.get(atom) {
            return v;
        }
        let v = self.formula.new_var();
        self.vars.insert(atom.clone(), v);
        v
    }

    fn lit(&mut self, fact: &Fact) -> Lit {
        let v = self.var(&fact.atom);
        if fact.negated { Lit::negative(v) } else { Lit::positive(v) }
    }

    // --- Checking / Resolving ---

    /// Advances until the batch is stable or a conflict needs the oracle.
    pub fn next_step(&mut self) -> Result<Step, SynthesisError> {
        loop {
            match self.phase {
                Phase::Collecting | Phase::Grounding => self.ground(),
                Phase::Resolving => {
                    return Ok(Step::Conflict { facts: self.asserted(), core: self.core.clone() });
                }
                Phase::Stable => return Ok(Step::Stable(self.settled())),
                Phase::Checking => self.check()?,
            }
        }
    }

    fn check(&mut self) -> Result<(), SynthesisError> {
        let assumptions: Vec<Lit> = self.tentative.clone().iter().map(|f| self.lit(f)).collect();
        let mut solver = Solver::new(&self.formula).with_budget(self.max_decisions);
        let outcome = solver.solve(&assumptions).map_err(|e| match e {
            SolverError::BudgetExceeded(decisions) => SynthesisError::SolverBudgetExceeded { batch: self.kind, decisions },
        })?;
        debug!(batch = %self.kind, assumptions = assumptions.len(), decisions = solver.decisions(), "solver check");

        let core = match outcome {
            SatOutcome::Sat(_) => {
                info!(batch = %self.kind, facts = self.permanent.len() + self.tentative.len(), rounds = self.rounds, "batch stable");
                self.phase = Phase::Stable;
                return Ok(());
            }
            SatOutcome::Unsat { core } => core,
        };

        if core.is_empty() {
            let facts = self.carried.iter().chain(&self.permanent).map(|f| f.describe(self.registry)).collect();
            return Err(SynthesisError::Irreducible { batch: self.kind, facts });
        }

        let in_core: HashSet<Lit> = core.into_iter().collect();
        let core: Vec<Fact> = self
            .tentative
            .iter()
            .zip(&assumptions)
            .filter(|(_, lit)| in_core.contains(lit))
            .map(|(f, _)| f.clone())
            .collect();

        if let [only] = core.as_slice() {
            warn!(
                batch = %self.kind,
                dropped = %only.describe(self.registry),
                "fact contradicts settled facts on its own; keeping its negation"
            );
            return self.settle(&core, None);
        }

        let core = self.widen(core)?;
        debug!(batch = %self.kind, core = ?core.iter().map(|f| f.describe(self.registry)).collect::<Vec<_>>(), "conflict");
        self.core = core;
        self.phase = Phase::Resolving;
        Ok(())
    }

    /// When a conflict lies inside one exactly-one group, every remaining
    /// member of the group is an alternative; offer the ones the settled
    /// facts still allow.
    fn widen(&mut self, core: Vec<Fact>) -> Result<Vec<Fact>, SynthesisError> {
        if core.iter().any(|f| f.negated) {
            return Ok(core);
        }
        let Some(group) = self.choice_groups.iter().find(|g| core.iter().all(|f| g.contains(&f.atom))).cloned() else {
            return Ok(core);
        };
        let mut widened = Vec::new();
        for fact in self.tentative.clone() {
            if !fact.is_positive() || !group.contains(&fact.atom) {
                continue;
            }
            if core.contains(&fact) || self.consistent_alone(&fact)? {
                widened.push(fact);
            } else {
                debug!(batch = %self.kind, skipped = %fact.describe(self.registry), "alternative contradicts settled facts");
            }
        }
        Ok(widened)
    }

    /// Whether `fact` can hold together with the carried and permanent facts.
    fn consistent_alone(&mut self, fact: &Fact) -> Result<bool, SynthesisError> {
        let lit = self.lit(fact);
        let mut solver = Solver::new(&self.formula).with_budget(self.max_decisions);
        let outcome = solver.solve(&[lit]).map_err(|e| match e {
            SolverError::BudgetExceeded(decisions) => SynthesisError::SolverBudgetExceeded { batch: self.kind, decisions },
        })?;
        Ok(matches!(outcome, SatOutcome::Sat(_)))
    }

    /// Keeps `kept`, negates the rest of the pending core.
    pub fn resolve(&mut self, kept: Fact) -> Result<(), SynthesisError> {
        if self.phase != Phase::Resolving {
            return Err(SynthesisError::NotResolving(self.kind));
        }
        if !self.core.contains(&kept) {
            return Err(SynthesisError::AnswerOutsideCore {
                batch: self.kind,
                kept: kept.describe(self.registry),
                core: self.core.iter().map(|f| f.describe(self.registry)).collect(),
            });
        }
        debug!(batch = %self.kind, kept = %kept.describe(self.registry), "conflict resolved");

        let core = std::mem::take(&mut self.core);
        self.settle(&core, Some(&kept))?;
        self.phase = Phase::Checking;
        Ok(())
    }

    /// Moves `core` from the tentative to the permanent set: `kept` as is,
    /// every other member negated.
    fn settle(&mut self, core: &[Fact], kept: Option<&Fact>) -> Result<(), SynthesisError> {
        self.rounds += 1;
        if self.rounds > self.bound {
            return Err(SynthesisError::ResolutionBudgetExceeded { batch: self.kind, bound: self.bound });
        }
        self.tentative.retain(|f| !core.contains(f));
        for fact in core {
            let resolved = if Some(fact) == kept { fact.clone() } else { fact.negate() };
            let lit = self.lit(&resolved);
            self.formula.add_clause([lit]);
            if !self.permanent.contains(&resolved) {
                self.permanent.push(resolved);
            }
        }
        Ok(())
    }

    fn asserted(&self) -> Vec<Fact> {
        self.carried.iter().chain(&self.permanent).chain(&self.tentative).cloned().collect()
    }

    fn settled(&self) -> Vec<Fact> {
        self.permanent.iter().chain(&self.tentative).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::Link;
    use crate::synthesis::rules;
    use crate::variables::VariableId;

    fn links() -> Vec<Fact> {
        [Link::Identity, Link::Log, Link::Squareroot].into_iter().map(|l| Fact::holds(Atom::Link(l))).collect()
    }

    #[test]
    fn test_consistent_batch_is_stable_immediately() {
        let registry = VariableRegistry::new();
        let mut session = BatchSession::new(BatchKind::Link, &registry, &[]);
        session.add_rules(rules::link(&[], &[Link::Log])).unwrap();
        session.collect(Fact::holds(Atom::Link(Link::Log))).unwrap();

        assert_eq!(session.next_step().unwrap(), Step::Stable(vec![Fact::holds(Atom::Link(Link::Log))]));
        assert_eq!(session.phase(), Phase::Stable);
        assert_eq!(session.rounds(), 0);
    }

    #[test]
    fn test_choice_conflict_offers_every_alternative() {
        let registry = VariableRegistry::new();
        let all = [Link::Identity, Link::Log, Link::Squareroot];
        let mut session = BatchSession::new(BatchKind::Link, &registry, &[]);
        session.add_rules(rules::link(&[], &all)).unwrap();
        for fact in links() {
            session.collect(fact).unwrap();
        }

        let Step::Conflict { core, .. } = session.next_step().unwrap() else { panic!("expected a conflict") };
        assert_eq!(core, links());

        session.resolve(Fact::holds(Atom::Link(Link::Log))).unwrap();
        let Step::Stable(facts) = session.next_step().unwrap() else { panic!("expected stable") };
        assert_eq!(
            facts,
            vec![
                Fact::not(Atom::Link(Link::Identity)),
                Fact::holds(Atom::Link(Link::Log)),
                Fact::not(Atom::Link(Link::Squareroot)),
            ]
        );
        assert!(session.rounds() <= session.bound());
    }

    #[test]
    fn test_alternative_ruled_out_by_settled_facts_is_not_offered() {
        let registry = VariableRegistry::new();
        let mut session = BatchSession::new(BatchKind::Link, &registry, &[]);
        session.add_rules(rules::link(&[], &[Link::Identity, Link::Log, Link::Squareroot])).unwrap();
        session.assert_permanent(Fact::not(Atom::Link(Link::Squareroot))).unwrap();
        session.collect(Fact::holds(Atom::Link(Link::Squareroot))).unwrap();
        session.collect(Fact::holds(Atom::Link(Link::Identity))).unwrap();
        session.collect(Fact::holds(Atom::Link(Link::Log))).unwrap();

        let Step::Conflict { core, .. } = session.next_step().unwrap() else { panic!("expected a conflict") };
        assert_eq!(core, vec![Fact::holds(Atom::Link(Link::Identity)), Fact::holds(Atom::Link(Link::Log))]);

        session.resolve(Fact::holds(Atom::Link(Link::Log))).unwrap();
        let Step::Stable(facts) = session.next_step().unwrap() else { panic!("expected stable") };
        assert_eq!(
            facts,
            vec![
                Fact::not(Atom::Link(Link::Squareroot)),
                Fact::not(Atom::Link(Link::Identity)),
                Fact::holds(Atom::Link(Link::Log)),
            ]
        );
        assert_eq!(session.rounds(), 2);
    }

    #[test]
    fn test_answer_outside_core_fails_fast() {
        let registry = VariableRegistry::new();
        let mut session = BatchSession::new(BatchKind::Link, &registry, &[]);
        session.add_rules(rules::link(&[], &[Link::Identity, Link::Log, Link::Squareroot])).unwrap();
        for fact in links() {
            session.collect(fact).unwrap();
        }
        session.next_step().unwrap();

        let err = session.resolve(Fact::holds(Atom::Link(Link::Logit))).unwrap_err();
        assert!(matches!(err, SynthesisError::AnswerOutsideCore { .. }));
        assert!(session.pending_core().is_some());
    }

    #[test]
    fn test_singleton_core_is_negated_without_asking() {
        let mut registry = VariableRegistry::new();
        let dv = registry.add_numeric("dv").unwrap();
        let x = registry.add_numeric("x").unwrap();
        let main = Atom::MainEffect { variable: x, dv };
        let slope = Atom::RandomSlope { iv: x, groups: VariableId(9) };

        // The main effect was dropped in an earlier round.
        let carried = [Fact::not(main.clone())];
        let mut session = BatchSession::new(BatchKind::Effects, &registry, &carried);
        session.add_rules([Rule::Implies(slope.clone(), main)]).unwrap();
        session.collect(Fact::holds(slope.clone())).unwrap();

        assert_eq!(session.next_step().unwrap(), Step::Stable(vec![Fact::not(slope)]));
        assert_eq!(session.rounds(), 1);
    }

    #[test]
    fn test_inconsistent_permanent_facts_are_irreducible() {
        let registry = VariableRegistry::new();
        let carried = [Fact::holds(Atom::Link(Link::Log))];
        let mut session = BatchSession::new(BatchKind::Link, &registry, &carried);
        session.add_rules(rules::link(&[], &[Link::Identity, Link::Log])).unwrap();
        session.assert_permanent(Fact::holds(Atom::Link(Link::Identity))).unwrap();

        let err = session.next_step().unwrap_err();
        assert_eq!(
            err,
            SynthesisError::Irreducible { batch: BatchKind::Link, facts: vec!["LogLink".into(), "IdentityLink".into()] }
        );
    }

    #[test]
    fn test_grounded_session_rejects_new_facts() {
        let registry = VariableRegistry::new();
        let mut session = BatchSession::new(BatchKind::Family, &registry, &[]);
        session.next_step().unwrap();
        assert_eq!(
            session.collect(Fact::holds(Atom::Link(Link::Log))),
            Err(SynthesisError::SessionClosed(BatchKind::Family))
        );
        assert_eq!(session.resolve(Fact::holds(Atom::Link(Link::Log))), Err(SynthesisError::NotResolving(BatchKind::Family)));
    }
}
