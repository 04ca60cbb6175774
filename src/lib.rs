// Crate root: recommends a statistical model for a study design.
//
// Variables and their relationships are declared in a `VariableRegistry`,
// gathered into a validated `Design`, mined for candidate effects, and then
// narrowed to one consistent model by the batch synthesis engine, which asks
// an injected `Oracle` wherever the design leaves a choice open.

pub mod config;
pub mod design;
pub mod family;
pub mod graph;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod synthesis;
pub mod variables;

// --- Public surface ---
pub use config::EngineConfig;
pub use design::{Design, DesignBuilder, DesignError, Level, LevelSet};
pub use family::{family_candidates, Family, Link, Transformation};
pub use graph::{DesignGraph, EdgeType};
pub use inference::{infer_effects, EffectsCandidates};
pub use model::{InteractionEffect, IntermediateSpec, RandomEffect, StatisticalModel};
pub use pipeline::{generate_intermediate_spec, infer_statistical_model, synthesize_with, PipelineError};
pub use synthesis::{CancellationToken, Fact, Oracle, PolicyOracle, ScriptedOracle, Synthesizer};
pub use variables::{DataKind, Repetitions, VariableId, VariableRegistry, VariableSpec};
