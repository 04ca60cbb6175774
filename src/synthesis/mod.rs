//! Constraint-based synthesis: turns candidate effects, families and links
//! into a consistent set of facts, asking an [`Oracle`] wherever the design
//! leaves a choice open.
pub mod engine;
pub mod error;
pub mod fact;
pub mod oracle;
pub mod rules;
pub mod sat;
pub mod session;

pub use engine::{Synthesis, Synthesizer};
pub use error::SynthesisError;
pub use fact::{Atom, Fact};
pub use oracle::{CancellationToken, Oracle, OracleContext, OracleError, PolicyOracle, ScriptedOracle};
pub use rules::Rule;
pub use session::{BatchSession, Phase, Step};

use std::fmt;

/// The batches, in the order the engine runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BatchKind {
    Conceptual,
    Effects,
    Correlation,
    Family,
    Link,
    Transformation,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchKind::Conceptual => "conceptual",
            BatchKind::Effects => "effects",
            BatchKind::Correlation => "correlation",
            BatchKind::Family => "family",
            BatchKind::Link => "link",
            BatchKind::Transformation => "transformation",
        };
        f.write_str(s)
    }
}
