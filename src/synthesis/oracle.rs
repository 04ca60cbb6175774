//! oracle.rs
//! The decision source the synthesis engine consults, and the two oracles the
//! crate ships: a deterministic policy and a scripted replay.

use super::fact::{Atom, Fact};
use super::BatchKind;
use crate::family::{Family, Transformation};
use crate::variables::{Variable, VariableRegistry};
use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Synthesis was cancelled")]
    Cancelled,
    #[error("Oracle did not answer within {0:?}")]
    TimedOut(Duration),
    #[error("Oracle has no answer for: {0}")]
    Exhausted(String),
}

/// Shared flag a front end flips to abandon a running synthesis.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self { Self::default() }
    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst) }
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

/// Passed into every oracle call.
pub struct OracleContext<'a> {
    registry: &'a VariableRegistry,
    batch: BatchKind,
    cancellation: &'a CancellationToken,
    started: Instant,
    timeout: Option<Duration>,
}

impl<'a> OracleContext<'a> {
    pub fn new(
        registry: &'a VariableRegistry,
        batch: BatchKind,
        cancellation: &'a CancellationToken,
        timeout: Option<Duration>,
    ) -> Self {
        Self { registry, batch, cancellation, started: Instant::now(), timeout }
    }

    pub fn registry(&self) -> &VariableRegistry { self.registry }
    pub fn batch(&self) -> BatchKind { self.batch }
    pub fn describe(&self, fact: &Fact) -> String { fact.describe(self.registry) }
    pub fn is_cancelled(&self) -> bool { self.cancellation.is_cancelled() }

    pub fn deadline(&self) -> Option<Instant> { self.timeout.map(|t| self.started + t) }

    /// Time left before the deadline; `None` when the call is unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline().map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn check(&self) -> Result<(), OracleError> {
        if self.is_cancelled() {
            return Err(OracleError::Cancelled);
        }
        match self.timeout {
            Some(t) if self.started.elapsed() > t => Err(OracleError::TimedOut(t)),
            _ => Ok(()),
        }
    }
}

/// Answers the questions the engine cannot settle on its own.
pub trait Oracle {
    /// Should `subject` be part of the model?
    fn ask_inclusion(&mut self, subject: &Fact, ctx: &OracleContext<'_>) -> Result<bool, OracleError>;

    /// Pick the member of `unsat_core` to keep; the rest are negated.
    fn resolve_unsat(&mut self, facts: &[Fact], unsat_core: &[Fact], ctx: &OracleContext<'_>)
        -> Result<Fact, OracleError>;

    fn ask_family(&mut self, options: &[Family], dv: &Variable, ctx: &OracleContext<'_>)
        -> Result<Family, OracleError>;
}

// --- Policy oracle ---

/// Deterministic, non-interactive answers.
///
/// Includes every candidate, keeps Cause over Associate, keeps positive facts
/// over negated ones, prefers the chosen family's default link and no
/// transformation, and picks the first family offered.
#[derive(Debug, Clone)]
pub struct PolicyOracle {
    include_candidates: bool,
    correlate_slopes: bool,
}

impl Default for PolicyOracle {
    fn default() -> Self { Self { include_candidates: true, correlate_slopes: true } }
}

impl PolicyOracle {
    pub fn new() -> Self { Self::default() }

    pub fn include_candidates(mut self, include: bool) -> Self {
        self.include_candidates = include;
        self
    }

    pub fn correlate_slopes(mut self, correlate: bool) -> Self {
        self.correlate_slopes = correlate;
        self
    }

    fn rank(fact: &Fact, facts: &[Fact]) -> u8 {
        if fact.negated {
            return 0;
        }
        match &fact.atom {
            Atom::Cause { .. } | Atom::Transform(Transformation::None) => 3,
            Atom::Link(link) => {
                let chosen = facts.iter().find_map(|f| match (&f.atom, f.negated) {
                    (Atom::Family(family), false) => Some(*family),
                    _ => None,
                });
                if chosen.is_some_and(|f| f.default_link() == *link) { 3 } else { 1 }
            }
            Atom::Transform(_) => 1,
            _ => 2,
        }
    }
}

impl Oracle for PolicyOracle {
    fn ask_inclusion(&mut self, subject: &Fact, _ctx: &OracleContext<'_>) -> Result<bool, OracleError> {
        Ok(match subject.atom {
            Atom::CorrelatedSlopeIntercept { .. } => self.correlate_slopes,
            _ => self.include_candidates,
        })
    }

    fn resolve_unsat(
        &mut self,
        facts: &[Fact],
        unsat_core: &[Fact],
        ctx: &OracleContext<'_>,
    ) -> Result<Fact, OracleError> {
        unsat_core
            .iter()
            .enumerate()
            .max_by_key(|(i, f)| (Self::rank(f, facts), Reverse(*i)))
            .map(|(_, f)| f.clone())
            .ok_or_else(|| OracleError::Exhausted(format!("empty conflict in {} batch", ctx.batch())))
    }

    fn ask_family(&mut self, options: &[Family], dv: &Variable, _ctx: &OracleContext<'_>) -> Result<Family, OracleError> {
        options
            .first()
            .copied()
            .ok_or_else(|| OracleError::Exhausted(format!("no family offered for '{}'", dv.name())))
    }
}

// --- Scripted oracle ---

/// Replays queued answers. Inclusion questions without a scripted answer fall
/// back to `default_inclusion`; running out of resolutions or families is an
/// error.
#[derive(Debug, Clone)]
pub struct ScriptedOracle {
    inclusions: HashMap<Atom, bool>,
    default_inclusion: bool,
    resolutions: VecDeque<Fact>,
    families: VecDeque<Family>,
    asked: Vec<Fact>,
    conflicts: Vec<Vec<Fact>>,
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self {
            inclusions: HashMap::new(),
            default_inclusion: true,
            resolutions: VecDeque::new(),
            families: VecDeque::new(),
            asked: Vec::new(),
            conflicts: Vec::new(),
        }
    }
}

impl ScriptedOracle {
    pub fn new() -> Self { Self::default() }

    pub fn default_inclusion(mut self, include: bool) -> Self {
        self.default_inclusion = include;
        self
    }

    pub fn answer(mut self, atom: Atom, include: bool) -> Self {
        self.inclusions.insert(atom, include);
        self
    }

    pub fn keep(mut self, fact: Fact) -> Self {
        self.resolutions.push_back(fact);
        self
    }

    pub fn family(mut self, family: Family) -> Self {
        self.families.push_back(family);
        self
    }

    /// Every subject passed to `ask_inclusion`, in order.
    pub fn asked(&self) -> &[Fact] { &self.asked }

    /// Every core passed to `resolve_unsat`, in order.
    pub fn conflicts(&self) -> &[Vec<Fact>] { &self.conflicts }
}

impl Oracle for ScriptedOracle {
    fn ask_inclusion(&mut self, subject: &Fact, _ctx: &OracleContext<'_>) -> Result<bool, OracleError> {
        self.asked.push(subject.clone());
        Ok(self.inclusions.get(&subject.atom).copied().unwrap_or(self.default_inclusion))
    }

    fn resolve_unsat(
        &mut self,
        _facts: &[Fact],
        unsat_core: &[Fact],
        ctx: &OracleContext<'_>,
    ) -> Result<Fact, OracleError> {
        self.conflicts.push(unsat_core.to_vec());
        self.resolutions.pop_front().ok_or_else(|| {
            let names: Vec<String> = unsat_core.iter().map(|f| ctx.describe(f)).collect();
            OracleError::Exhausted(names.join(", "))
        })
    }

    fn ask_family(&mut self, options: &[Family], dv: &Variable, _ctx: &OracleContext<'_>) -> Result<Family, OracleError> {
        self.families
            .pop_front()
            .ok_or_else(|| OracleError::Exhausted(format!("family for '{}' among {:?}", dv.name(), options)))
    }
}
