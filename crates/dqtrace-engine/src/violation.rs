//! Violations and validation results: data-quality findings returned as values.

use std::fmt;

use serde::{Deserialize, Serialize};

use dqtrace_types::CellValue;

// ---------------------------------------------------------------------------
// ViolationKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingData,
    RangeViolation,
    FormatViolation,
    /// The rule's own logic failed; recorded instead of aborting the run.
    InternalRuleError,
    Custom(String),
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::MissingData => f.write_str("MissingData"),
            ViolationKind::RangeViolation => f.write_str("RangeViolation"),
            ViolationKind::FormatViolation => f.write_str("FormatViolation"),
            ViolationKind::InternalRuleError => f.write_str("InternalRuleError"),
            ViolationKind::Custom(name) => f.write_str(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Violation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullCount {
    pub column: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffendingCell {
    pub row: usize,
    pub value: CellValue,
}

/// Structured location data attached to a violation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationDetail {
    #[default]
    None,
    NullCounts(Vec<NullCount>),
    Cells(Vec<OffendingCell>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: String,
    pub kind: ViolationKind,
    pub message: String,
    pub columns: Vec<String>,
    pub rows: Vec<usize>,
    #[serde(default)]
    pub detail: ViolationDetail,
}

impl Violation {
    pub fn new(rule: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            kind,
            message: message.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            detail: ViolationDetail::None,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Attach offending cells; also fills `rows` in the same order.
    pub fn with_cells(mut self, cells: Vec<OffendingCell>) -> Self {
        self.rows = cells.iter().map(|c| c.row).collect();
        self.detail = ViolationDetail::Cells(cells);
        self
    }

    /// Attach per-column null counts; also fills `columns` in the same order.
    pub fn with_null_counts(mut self, counts: Vec<NullCount>) -> Self {
        self.columns = counts.iter().map(|c| c.column.clone()).collect();
        self.detail = ViolationDetail::NullCounts(counts);
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.rule, self.message)
    }
}

// ---------------------------------------------------------------------------
// ValidationMode / ValidationResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Stop at the first violation.
    FailFast,
    /// Run every rule and report every violation.
    #[default]
    CollectAll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Tag of the validated dataset.
    pub dataset: String,
    pub mode: ValidationMode,
    pub violations: Vec<Violation>,
    pub passed: bool,
    /// Number of rules actually evaluated (fewer than registered under fail-fast).
    pub rules_evaluated: usize,
}

impl ValidationResult {
    pub fn new(
        dataset: impl Into<String>,
        mode: ValidationMode,
        violations: Vec<Violation>,
        rules_evaluated: usize,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            mode,
            passed: violations.is_empty(),
            violations,
            rules_evaluated,
        }
    }

    pub fn violations_of(&self, kind: &ViolationKind) -> impl Iterator<Item = &Violation> {
        let kind = kind.clone();
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_passes_iff_no_violations() {
        let ok = ValidationResult::new("d", ValidationMode::CollectAll, vec![], 3);
        assert!(ok.passed);

        let v = Violation::new("r", ViolationKind::MissingData, "nulls");
        let bad = ValidationResult::new("d", ValidationMode::FailFast, vec![v], 1);
        assert!(!bad.passed);
        assert_eq!(bad.violations_of(&ViolationKind::MissingData).count(), 1);
        assert_eq!(bad.violations_of(&ViolationKind::RangeViolation).count(), 0);
    }

    #[test]
    fn with_cells_fills_rows() {
        let v = Violation::new("age_range", ViolationKind::RangeViolation, "negative")
            .with_column("age")
            .with_cells(vec![
                OffendingCell {
                    row: 1,
                    value: CellValue::Integer(-3),
                },
                OffendingCell {
                    row: 4,
                    value: CellValue::Integer(-1),
                },
            ]);
        assert_eq!(v.rows, vec![1, 4]);
        assert_eq!(v.columns, vec!["age".to_string()]);
    }

    #[test]
    fn display_includes_kind_and_rule() {
        let v = Violation::new("custom_rule", ViolationKind::Custom("Duplicate".into()), "dupes");
        assert_eq!(v.to_string(), "[Duplicate] custom_rule: dupes");
    }

    #[test]
    fn mode_defaults_to_collect_all() {
        assert_eq!(ValidationMode::default(), ValidationMode::CollectAll);
        assert_eq!(
            serde_json::to_string(&ValidationMode::FailFast).unwrap(),
            "\"fail_fast\""
        );
    }
}
