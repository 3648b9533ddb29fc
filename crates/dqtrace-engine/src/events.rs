//! Diagnostic events and the sinks that receive them.
//!
//! The engine and tracer report progress through an injected
//! [`DiagnosticsSink`] rather than global logging state, so each run can use an
//! independent sink. [`EventEmitter`] fans events out over a
//! [`tokio::sync::broadcast`] channel for external observers.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::stages::TraceResult;
use crate::violation::{ValidationResult, Violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOutcome {
    Passed,
    Violated,
    /// The rule's predicate failed and was recorded as `InternalRuleError`.
    Errored,
}

/// Events emitted during validation and tracing, in emission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DiagnosticEvent {
    RuleEvaluated {
        dataset: String,
        rule: String,
        outcome: RuleOutcome,
    },
    ViolationRaised {
        dataset: String,
        violation: Violation,
    },
    StageExamined {
        dataset: String,
        stage: String,
        matched: bool,
        error: Option<String>,
    },
    RunSummary {
        validation: ValidationResult,
        trace: Option<TraceResult>,
    },
}

/// Receiver of diagnostic events. Rendering and storage are up to the implementor.
pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

// ---------------------------------------------------------------------------
// NullSink
// ---------------------------------------------------------------------------

/// Discards every event.
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn emit(&self, _event: DiagnosticEvent) {}
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `(stage, matched)` for every `StageExamined` event, in order.
    pub fn examined_stages(&self) -> Vec<(String, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DiagnosticEvent::StageExamined { stage, matched, .. } => Some((stage, matched)),
                _ => None,
            })
            .collect()
    }

    /// Rule names from `RuleEvaluated` events, in order.
    pub fn evaluated_rules(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DiagnosticEvent::RuleEvaluated { rule, .. } => Some(rule),
                _ => None,
            })
            .collect()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

// ---------------------------------------------------------------------------
// TracingSink
// ---------------------------------------------------------------------------

/// Renders events as `tracing` records.
pub struct TracingSink;

impl TracingSink {
    /// Log a single event. Also usable on events received from an [`EventEmitter`].
    pub fn render(event: &DiagnosticEvent) {
        match event {
            DiagnosticEvent::RuleEvaluated {
                dataset,
                rule,
                outcome,
            } => {
                tracing::debug!(%dataset, %rule, ?outcome, "Rule evaluated");
            }
            DiagnosticEvent::ViolationRaised { dataset, violation } => {
                tracing::warn!(
                    %dataset,
                    rule = %violation.rule,
                    kind = %violation.kind,
                    "{}",
                    violation.message
                );
            }
            DiagnosticEvent::StageExamined {
                dataset,
                stage,
                matched,
                error,
            } => match error {
                Some(error) => tracing::warn!(%dataset, %stage, %error, "Stage check errored"),
                None if *matched => tracing::info!(%dataset, %stage, "Issue identified at step"),
                None => tracing::debug!(%dataset, %stage, "Step does not match"),
            },
            DiagnosticEvent::RunSummary { validation, trace } => {
                if validation.passed {
                    tracing::info!(dataset = %validation.dataset, "Data validation passed");
                } else {
                    let origin = trace.as_ref().map_or("not traced", |t| t.origin_name());
                    tracing::error!(
                        dataset = %validation.dataset,
                        violations = validation.violations.len(),
                        %origin,
                        "Data validation failed"
                    );
                }
            }
        }
    }
}

impl DiagnosticsSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        Self::render(&event);
    }
}

// ---------------------------------------------------------------------------
// EventEmitter
// ---------------------------------------------------------------------------

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<DiagnosticEvent>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DiagnosticEvent> {
        self.sender.subscribe()
    }
}

impl DiagnosticsSink for EventEmitter {
    /// If there are no active receivers the event is silently dropped.
    fn emit(&self, event: DiagnosticEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(1024)
    }
}
