//! Rule engine: ordered rule registry and the validation loop.

use std::collections::HashSet;

use dqtrace_types::{Dataset, DqError, Result};

use crate::events::{DiagnosticEvent, DiagnosticsSink, NullSink, RuleOutcome};
use crate::rules::Rule;
use crate::violation::{ValidationMode, ValidationResult, Violation, ViolationKind};

/// Holds rules in registration order and runs them against datasets.
///
/// Registration must finish before runs start; after that the engine is only
/// read, so it can be shared across threads for parallel runs.
#[derive(Default)]
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
    names: HashSet<String>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. A name that is already registered is rejected.
    pub fn register(&mut self, rule: impl Rule + 'static) -> Result<()> {
        self.register_boxed(Box::new(rule))
    }

    pub fn register_boxed(&mut self, rule: Box<dyn Rule>) -> Result<()> {
        let name = rule.name().to_string();
        if !self.names.insert(name.clone()) {
            return Err(DqError::DuplicateRule { name });
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn validate(&self, dataset: &Dataset, mode: ValidationMode) -> ValidationResult {
        self.validate_with(dataset, mode, &NullSink)
    }

    /// Run rules in registration order, reporting progress to `sink`.
    ///
    /// Under [`ValidationMode::FailFast`] the loop stops after the first
    /// violation; under [`ValidationMode::CollectAll`] every rule runs once.
    /// A rule that returns `Err` yields an `InternalRuleError` violation.
    pub fn validate_with(
        &self,
        dataset: &Dataset,
        mode: ValidationMode,
        sink: &dyn DiagnosticsSink,
    ) -> ValidationResult {
        let tag = dataset.tag();
        tracing::info!(dataset = %tag, rules = self.rules.len(), ?mode, "Validating dataset");

        let mut violations = Vec::new();
        let mut evaluated = 0;

        for rule in &self.rules {
            tracing::debug!(rule = %rule.name(), "Evaluating rule");
            evaluated += 1;

            let (outcome, violation) = match rule.check(dataset) {
                Ok(None) => (RuleOutcome::Passed, None),
                Ok(Some(v)) => (RuleOutcome::Violated, Some(v)),
                Err(e) => {
                    tracing::warn!(rule = %rule.name(), error = %e, "Rule failed internally");
                    let v = Violation::new(
                        rule.name(),
                        ViolationKind::InternalRuleError,
                        format!("Rule '{}' could not be evaluated: {e}", rule.name()),
                    );
                    (RuleOutcome::Errored, Some(v))
                }
            };

            sink.emit(DiagnosticEvent::RuleEvaluated {
                dataset: tag.to_string(),
                rule: rule.name().to_string(),
                outcome,
            });

            let Some(violation) = violation else {
                continue;
            };
            sink.emit(DiagnosticEvent::ViolationRaised {
                dataset: tag.to_string(),
                violation: violation.clone(),
            });
            violations.push(violation);

            if mode == ValidationMode::FailFast {
                tracing::debug!(rule = %rule.name(), "Fail-fast: stopping at first violation");
                break;
            }
        }

        let result = ValidationResult::new(tag, mode, violations, evaluated);
        if result.passed {
            tracing::debug!(dataset = %tag, "Data validation passed");
        } else {
            tracing::debug!(dataset = %tag, violations = result.violations.len(), "Data validation failed");
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
