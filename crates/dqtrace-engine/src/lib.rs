//! Validation engine, stage tracer, and diagnostics for dqtrace.
//!
//! This crate implements the core of dqtrace: ordered quality rules with
//! fail-fast or collect-all execution, signature-matching attribution of an
//! anomaly to the pipeline stage that first explains it, structured diagnostic
//! events, and the JSON configuration that wires both registries together.

pub mod config;
pub mod engine;
pub mod events;
pub mod rules;
pub mod run;
pub mod signatures;
pub mod stages;
pub mod violation;

pub use config::{QualityConfig, RuleSpec, Signature, StageSpec};
pub use engine::RuleEngine;
pub use events::{
    DiagnosticEvent, DiagnosticsSink, EventEmitter, NullSink, RecordingSink, RuleOutcome,
    TracingSink,
};
pub use rules::{FnRule, FormatRule, MissingDataRule, RangeRule, Rule, ValueType};
pub use run::{QualityRun, RunReport};
pub use stages::{
    Attribution, StageExamination, StagePredicate, StageRegistry, TraceResult, UNKNOWN_ORIGIN,
};
pub use violation::{
    NullCount, OffendingCell, ValidationMode, ValidationResult, Violation, ViolationDetail,
    ViolationKind,
};
