//! config.rs
//! Engine settings, loadable from JSON. Every field has a default, so an empty
//! object is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-call limit on oracle answers; `None` waits indefinitely.
    pub oracle_timeout_ms: Option<u64>,
    /// When false the dependent variable is never transformed and the
    /// transformation batch asks nothing.
    pub disambiguate_transformations: bool,
    /// Decision budget for each satisfiability check.
    pub max_solver_decisions: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { oracle_timeout_ms: None, disambiguate_transformations: true, max_solver_decisions: Some(1_000_000) }
    }
}

impl EngineConfig {
    pub fn new() -> Self { Self::default() }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn oracle_timeout(&self) -> Option<Duration> {
        self.oracle_timeout_ms.map(Duration::from_millis)
    }
}
