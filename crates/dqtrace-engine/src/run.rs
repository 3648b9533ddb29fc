//! A full quality run: validate, trace on failure, then summarise.

use serde::{Deserialize, Serialize};

use dqtrace_types::Dataset;

use crate::engine::RuleEngine;
use crate::events::{DiagnosticEvent, DiagnosticsSink};
use crate::stages::{StageRegistry, TraceResult};
use crate::violation::{ValidationMode, ValidationResult};

/// Outcome of one [`QualityRun::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub validation: ValidationResult,
    /// Present only when validation failed.
    pub trace: Option<TraceResult>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.validation.passed
    }

    /// Name of the stage the issues were attributed to. `None` for a passing
    /// run; [`UNKNOWN_ORIGIN`](crate::stages::UNKNOWN_ORIGIN) when no stage matched.
    pub fn origin(&self) -> Option<&str> {
        self.trace.as_ref().map(TraceResult::origin_name)
    }
}

/// Borrows a configured engine and registry for any number of runs.
pub struct QualityRun<'a> {
    engine: &'a RuleEngine,
    registry: &'a StageRegistry,
}

impl<'a> QualityRun<'a> {
    pub fn new(engine: &'a RuleEngine, registry: &'a StageRegistry) -> Self {
        Self { engine, registry }
    }

    /// Validate `dataset`; if it fails, trace the same dataset through the
    /// registered stages. `RunSummary` is always the last event emitted.
    pub fn run(
        &self,
        dataset: &Dataset,
        mode: ValidationMode,
        sink: &dyn DiagnosticsSink,
    ) -> RunReport {
        let validation = self.engine.validate_with(dataset, mode, sink);
        let trace = if validation.passed {
            None
        } else {
            Some(self.registry.trace_with(dataset, sink))
        };

        let report = RunReport { validation, trace };
        sink.emit(DiagnosticEvent::RunSummary {
            validation: report.validation.clone(),
            trace: report.trace.clone(),
        });
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityConfig;
    use crate::events::{RecordingSink, TracingSink};
    use crate::stages::UNKNOWN_ORIGIN;
    use dqtrace_types::{CellValue, Column};
    use std::io::Write;
    use std::sync::{Arc, Mutex, PoisonError};

    /// Log output captured from a scoped subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn ages(values: Vec<CellValue>) -> Dataset {
        Dataset::new("ages", vec![Column::new("age", values)]).unwrap()
    }

    fn configured() -> (RuleEngine, StageRegistry) {
        let config = QualityConfig::default();
        (config.build_engine().unwrap(), config.build_registry().unwrap())
    }

    #[test]
    fn passing_run_skips_trace() {
        let (engine, registry) = configured();
        let sink = RecordingSink::new();
        let report = QualityRun::new(&engine, &registry).run(
            &ages(vec![25.into(), 40.into()]),
            ValidationMode::CollectAll,
            &sink,
        );
        assert!(report.passed());
        assert!(report.trace.is_none());
        assert_eq!(report.origin(), None);
        assert!(sink.examined_stages().is_empty());
    }

    #[test]
    fn failing_run_is_traced_and_summarised_last() {
        let (engine, registry) = configured();
        let sink = RecordingSink::new();
        let report = QualityRun::new(&engine, &registry).run(
            &ages(vec![25.into(), (-3).into()]),
            ValidationMode::CollectAll,
            &sink,
        );
        assert!(!report.passed());
        assert_eq!(report.origin(), Some("Transformation A"));

        let events = sink.events();
        match events.last() {
            Some(DiagnosticEvent::RunSummary { validation, trace }) => {
                assert_eq!(validation, &report.validation);
                assert_eq!(trace, &report.trace);
            }
            other => panic!("expected RunSummary last, got {other:?}"),
        }
    }

    #[test]
    fn unattributed_failure_reports_unknown() {
        let (engine, _) = configured();
        let registry = StageRegistry::new();
        let report = QualityRun::new(&engine, &registry).run(
            &ages(vec![(-1).into()]),
            ValidationMode::FailFast,
            &crate::events::NullSink,
        );
        assert_eq!(report.origin(), Some(UNKNOWN_ORIGIN));
    }

    #[test]
    fn report_serializes_to_json() {
        let (engine, registry) = configured();
        let report = QualityRun::new(&engine, &registry).run(
            &ages(vec![CellValue::Null]),
            ValidationMode::FailFast,
            &crate::events::NullSink,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["validation"]["passed"], false);
        assert_eq!(json["trace"]["origin"]["stage"], "Data Load");
    }

    #[test]
    fn outcome_lines_are_logged_once_at_info() {
        let (engine, registry) = configured();
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            QualityRun::new(&engine, &registry).run(
                &ages(vec![(-3).into()]),
                ValidationMode::CollectAll,
                &TracingSink,
            );
            QualityRun::new(&engine, &registry).run(
                &ages(vec![5.into()]),
                ValidationMode::CollectAll,
                &TracingSink,
            );
        });

        let text = logs.text();
        assert_eq!(text.matches("Issue identified at step").count(), 1, "{text}");
        assert_eq!(text.matches("Data validation failed").count(), 1, "{text}");
        assert_eq!(text.matches("Data validation passed").count(), 1, "{text}");
    }
}
