//! Stage registry and signature-matching tracer.
//!
//! Stages are registered in pipeline execution order, each with a predicate
//! answering "is this stage's characteristic defect visible in the data?".
//! [`StageRegistry::trace`] walks them in order and attributes the anomaly to
//! the first stage whose predicate holds:
//!
//! ```text
//! NotStarted -> Examining(0) -> Matched(name)
//!                            -> Examining(1) -> ... -> Exhausted ("unknown")
//! ```
//!
//! A predicate that returns `Err` counts as a non-match and the walk continues.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use dqtrace_types::{Dataset, DqError, Result};

use crate::events::{DiagnosticEvent, DiagnosticsSink, NullSink};

/// Origin reported when no stage matches.
pub const UNKNOWN_ORIGIN: &str = "unknown";

// ---------------------------------------------------------------------------
// StagePredicate
// ---------------------------------------------------------------------------

pub trait StagePredicate: Send + Sync {
    fn matches(&self, dataset: &Dataset) -> Result<bool>;
}

impl<F> StagePredicate for F
where
    F: Fn(&Dataset) -> Result<bool> + Send + Sync,
{
    fn matches(&self, dataset: &Dataset) -> Result<bool> {
        self(dataset)
    }
}

pub struct Stage {
    name: String,
    predicate: Box<dyn StagePredicate>,
}

impl Stage {
    pub fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Trace results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribution {
    Stage(String),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageExamination {
    pub stage: String,
    pub matched: bool,
    /// Set when the predicate itself failed; such a stage never matches.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceResult {
    pub dataset: String,
    pub origin: Attribution,
    /// Every stage examined, from the first up to and including the match.
    pub examined: Vec<StageExamination>,
}

impl TraceResult {
    pub fn matched_stage(&self) -> Option<&str> {
        match &self.origin {
            Attribution::Stage(name) => Some(name),
            Attribution::Unknown => None,
        }
    }

    /// The matched stage name, or [`UNKNOWN_ORIGIN`].
    pub fn origin_name(&self) -> &str {
        self.matched_stage().unwrap_or(UNKNOWN_ORIGIN)
    }
}

// ---------------------------------------------------------------------------
// StageRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StageRegistry {
    stages: Vec<Stage>,
    names: HashSet<String>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage. Names must be unique.
    pub fn register_stage(
        &mut self,
        name: impl Into<String>,
        predicate: impl StagePredicate + 'static,
    ) -> Result<()> {
        self.register_boxed(name.into(), Box::new(predicate))
    }

    pub fn register_boxed(&mut self, name: String, predicate: Box<dyn StagePredicate>) -> Result<()> {
        if !self.names.insert(name.clone()) {
            return Err(DqError::DuplicateStage { name });
        }
        self.stages.push(Stage { name, predicate });
        Ok(())
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Attribute the anomaly in `dataset` to the earliest matching stage.
    pub fn trace(&self, dataset: &Dataset) -> TraceResult {
        self.trace_with(dataset, &NullSink)
    }

    pub fn trace_with(&self, dataset: &Dataset, sink: &dyn DiagnosticsSink) -> TraceResult {
        self.walk(dataset.tag(), |_| dataset, sink)
    }

    /// Like [`trace_with`](Self::trace_with), but each stage is checked against
    /// its own output snapshot when one is supplied. Stages without a snapshot
    /// fall back to `final_dataset`.
    pub fn trace_snapshots(
        &self,
        final_dataset: &Dataset,
        snapshots: &HashMap<String, Dataset>,
        sink: &dyn DiagnosticsSink,
    ) -> TraceResult {
        self.walk(
            final_dataset.tag(),
            |stage| snapshots.get(stage).unwrap_or(final_dataset),
            sink,
        )
    }

    fn walk<'d>(
        &self,
        tag: &str,
        dataset_for: impl Fn(&str) -> &'d Dataset,
        sink: &dyn DiagnosticsSink,
    ) -> TraceResult {
        tracing::info!(dataset = %tag, stages = self.stages.len(), "Tracing back data issues through pipeline");
        let mut examined = Vec::new();

        for stage in &self.stages {
            tracing::debug!(stage = %stage.name, "Checking step");
            let (matched, error) = match stage.predicate.matches(dataset_for(&stage.name)) {
                Ok(m) => (m, None),
                Err(e) => {
                    tracing::warn!(stage = %stage.name, error = %e, "Stage predicate failed; treating as no match");
                    (false, Some(e.to_string()))
                }
            };
            sink.emit(DiagnosticEvent::StageExamined {
                dataset: tag.to_string(),
                stage: stage.name.clone(),
                matched,
                error: error.clone(),
            });
            examined.push(StageExamination {
                stage: stage.name.clone(),
                matched,
                error,
            });

            if matched {
                tracing::debug!(stage = %stage.name, "Issue identified at step");
                return TraceResult {
                    dataset: tag.to_string(),
                    origin: Attribution::Stage(stage.name.clone()),
                    examined,
                };
            }
        }

        tracing::info!(dataset = %tag, "No specific origin identified for the issues");
        TraceResult {
            dataset: tag.to_string(),
            origin: Attribution::Unknown,
            examined,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
