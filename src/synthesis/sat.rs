//! sat.rs
//! A small DPLL satisfiability checker with assumption-based unsat cores.
//!
//! Instances grounded per batch have at most a few hundred variables, so the
//! solver favours a simple, auditable search (unit propagation plus
//! chronological backtracking) over clause learning.

use smallvec::SmallVec;
use std::ops::Not;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(u32);

impl Var {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit {
    var: Var,
    negative: bool,
}

impl Lit {
    pub fn positive(var: Var) -> Self { Self { var, negative: false } }
    pub fn negative(var: Var) -> Self { Self { var, negative: true } }
    pub fn var(&self) -> Var { self.var }
    pub fn is_negative(&self) -> bool { self.negative }

    #[inline(always)]
    fn is_true_under(&self, value: bool) -> bool { value != self.negative }
}

impl Not for Lit {
    type Output = Lit;
    fn not(self) -> Lit { Lit { var: self.var, negative: !self.negative } }
}

pub type Clause = SmallVec<[Lit; 4]>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("Search exceeded the budget of {0} decisions")]
    BudgetExceeded(u64),
}

/// A CNF formula under construction.
#[derive(Debug, Clone, Default)]
pub struct Formula {
    num_vars: u32,
    clauses: Vec<Clause>,
}

impl Formula {
    pub fn new() -> Self { Self::default() }
    pub fn num_vars(&self) -> usize { self.num_vars as usize }
    pub fn clauses(&self) -> &[Clause] { &self.clauses }

    pub fn new_var(&mut self) -> Var {
        let v = Var(self.num_vars);
        self.num_vars += 1;
        v
    }

    pub fn add_clause(&mut self, lits: impl IntoIterator<Item = Lit>) {
        self.clauses.push(lits.into_iter().collect());
    }

    pub fn at_most_one(&mut self, lits: &[Lit]) {
        for (i, &a) in lits.iter().enumerate() {
            for &b in &lits[i + 1..] {
                self.add_clause([!a, !b]);
            }
        }
    }

    pub fn exactly_one(&mut self, lits: &[Lit]) {
        self.add_clause(lits.iter().copied());
        self.at_most_one(lits);
    }

    /// `a -> b`
    pub fn implies(&mut self, a: Lit, b: Lit) {
        self.add_clause([!a, b]);
    }
}

/// A satisfying assignment, indexed by `Var`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model(Vec<bool>);

impl Model {
    pub fn value(&self, var: Var) -> bool { self.0.get(var.index()).copied().unwrap_or(false) }
    pub fn satisfies(&self, lit: Lit) -> bool { lit.is_true_under(self.value(lit.var)) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatOutcome {
    Sat(Model),
    /// A minimal subset of the assumptions that is unsatisfiable together with
    /// the formula. Empty when the formula alone is unsatisfiable.
    Unsat { core: Vec<Lit> },
}

pub struct Solver<'f> {
    formula: &'f Formula,
    budget: Option<u64>,
    decisions: u64,
}

impl<'f> Solver<'f> {
    pub fn new(formula: &'f Formula) -> Self {
        Self { formula, budget: None, decisions: 0 }
    }

    pub fn with_budget(mut self, budget: Option<u64>) -> Self {
        self.budget = budget;
        self
    }

    pub fn decisions(&self) -> u64 { self.decisions }

    /// Checks the formula under `assumptions`; on UNSAT, shrinks the
    /// assumptions to a minimal core by deletion.
    pub fn solve(&mut self, assumptions: &[Lit]) -> Result<SatOutcome, SolverError> {
        if let Some(model) = self.check(assumptions)? {
            return Ok(SatOutcome::Sat(model));
        }

        let mut core = assumptions.to_vec();
        let mut i = 0;
        while i < core.len() {
            let mut trial = core.clone();
            trial.remove(i);
            if self.check(&trial)?.is_none() {
                core = trial;
            } else {
                i += 1;
            }
        }
        debug!(assumptions = assumptions.len(), core = core.len(), decisions = self.decisions, "unsat core extracted");
        Ok(SatOutcome::Unsat { core })
    }

    fn check(&mut self, assumptions: &[Lit]) -> Result<Option<Model>, SolverError> {
        let mut assign: Vec<Option<bool>> = vec![None; self.formula.num_vars()];
        for lit in assumptions {
            let want = !lit.negative;
            match assign[lit.var.index()] {
                Some(v) if v != want => return Ok(None),
                _ => assign[lit.var.index()] = Some(want),
            }
        }
        if self.search(&mut assign)? {
            Ok(Some(Model(assign.into_iter().map(|v| v.unwrap_or(false)).collect())))
        } else {
            Ok(None)
        }
    }

    fn search(&mut self, assign: &mut Vec<Option<bool>>) -> Result<bool, SolverError> {
        if !self.propagate(assign) {
            return Ok(false);
        }
        let Some(var) = assign.iter().position(Option::is_none) else {
            return Ok(true);
        };

        for value in [true, false] {
            self.decisions += 1;
            if let Some(budget) = self.budget {
                if self.decisions > budget {
                    return Err(SolverError::BudgetExceeded(budget));
                }
            }
            let mut next = assign.clone();
            next[var] = Some(value);
            if self.search(&mut next)? {
                *assign = next;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Unit propagation to a fixpoint. Returns `false` on a falsified clause.
    fn propagate(&self, assign: &mut [Option<bool>]) -> bool {
        loop {
            let mut changed = false;
            for clause in &self.formula.clauses {
                let mut satisfied = false;
                let mut open = 0;
                let mut last_open = None;
                for &lit in clause {
                    match assign[lit.var.index()] {
                        Some(v) if lit.is_true_under(v) => {
                            satisfied = true;
                            break;
                        }
                        Some(_) => {}
                        None => {
                            open += 1;
                            last_open = Some(lit);
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                match (open, last_open) {
                    (0, _) => return false,
                    (1, Some(lit)) => {
                        assign[lit.var.index()] = Some(!lit.negative);
                        changed = true;
                    }
                    _ => {}
                }
            }
            if !changed {
                return true;
            }
        }
    }
}
