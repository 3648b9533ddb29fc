//! Quality rules: the [`Rule`] trait and the built-in checks.
//!
//! A rule is a named, pure predicate over a [`Dataset`]. It returns `Ok(None)`
//! when the data passes, `Ok(Some(violation))` when it does not, and `Err` only
//! when its own logic cannot run (the engine records that as an
//! `InternalRuleError` violation).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use dqtrace_types::{CellValue, Dataset, Result};

use crate::violation::{NullCount, OffendingCell, Violation, ViolationKind};

// ---------------------------------------------------------------------------
// Rule trait
// ---------------------------------------------------------------------------

pub trait Rule: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, dataset: &Dataset) -> Result<Option<Violation>>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn format_bound(bound: Option<f64>, unbounded: &str) -> String {
    bound.map_or_else(|| unbounded.to_string(), |b| b.to_string())
}

fn describe_cells(cells: &[OffendingCell]) -> String {
    const SHOWN: usize = 5;
    let mut parts: Vec<String> = cells
        .iter()
        .take(SHOWN)
        .map(|c| format!("row {} = {}", c.row, c.value))
        .collect();
    if cells.len() > SHOWN {
        parts.push(format!("... {} more", cells.len() - SHOWN));
    }
    parts.join(", ")
}

// ---------------------------------------------------------------------------
// MissingDataRule
// ---------------------------------------------------------------------------

/// Fails if any cell in any column is null.
pub struct MissingDataRule {
    name: String,
}

impl MissingDataRule {
    pub fn new() -> Self {
        Self {
            name: "missing_data".into(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for MissingDataRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for MissingDataRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, dataset: &Dataset) -> Result<Option<Violation>> {
        if !dataset.has_any_null() {
            return Ok(None);
        }
        let counts: Vec<NullCount> = dataset
            .null_counts()
            .into_iter()
            .map(|(column, count)| NullCount { column, count })
            .collect();
        let listing = counts
            .iter()
            .map(|c| format!("{} ({})", c.column, c.count))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Some(
            Violation::new(
                &self.name,
                ViolationKind::MissingData,
                format!("Missing data found in columns: {listing}"),
            )
            .with_null_counts(counts),
        ))
    }
}

// ---------------------------------------------------------------------------
// RangeRule
// ---------------------------------------------------------------------------

/// Fails if any numeric value in `column` lies outside the inclusive bounds.
///
/// Nulls are left to [`MissingDataRule`] and text to [`FormatRule`].
pub struct RangeRule {
    name: String,
    column: String,
    min: Option<f64>,
    max: Option<f64>,
}

impl RangeRule {
    pub fn new(column: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        let column = column.into();
        Self {
            name: format!("range:{column}"),
            column,
            min,
            max,
        }
    }

    /// Non-negative with no upper bound, the usual convention for ages.
    pub fn age(column: impl Into<String>) -> Self {
        Self::new(column, Some(0.0), None)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// `Some(false)` for a numeric cell outside the bounds; `None` for text and nulls.
    fn in_bounds(&self, value: &CellValue) -> Option<bool> {
        value.as_f64()?;
        let above_min = self
            .min
            .map_or(true, |lo| value.cmp_f64(lo) != Some(Ordering::Less));
        let below_max = self
            .max
            .map_or(true, |hi| value.cmp_f64(hi) != Some(Ordering::Greater));
        Some(above_min && below_max)
    }
}

impl Rule for RangeRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, dataset: &Dataset) -> Result<Option<Violation>> {
        let offending: Vec<OffendingCell> = dataset
            .column(&self.column)?
            .iter()
            .enumerate()
            .filter(|(_, v)| self.in_bounds(v) == Some(false))
            .map(|(row, v)| OffendingCell {
                row,
                value: v.clone(),
            })
            .collect();
        if offending.is_empty() {
            return Ok(None);
        }
        let message = format!(
            "Column '{}' has {} value(s) outside [{}, {}]: {}",
            self.column,
            offending.len(),
            format_bound(self.min, "-inf"),
            format_bound(self.max, "+inf"),
            describe_cells(&offending)
        );
        Ok(Some(
            Violation::new(&self.name, ViolationKind::RangeViolation, message)
                .with_column(&self.column)
                .with_cells(offending),
        ))
    }
}

// ---------------------------------------------------------------------------
// FormatRule
// ---------------------------------------------------------------------------

/// Expected cell type for [`FormatRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Integer,
    /// Integer or float.
    Number,
    Text,
}

impl ValueType {
    pub fn matches(self, value: &CellValue) -> bool {
        match self {
            ValueType::Integer => value.is_integer(),
            ValueType::Number => value.as_f64().is_some(),
            ValueType::Text => value.as_str().is_some(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Integer => "integer",
            ValueType::Number => "number",
            ValueType::Text => "text",
        }
    }
}

type CellPredicate = Box<dyn Fn(&CellValue) -> bool + Send + Sync>;

/// Fails if any non-null value in `column` does not satisfy the type predicate.
pub struct FormatRule {
    name: String,
    column: String,
    expected: String,
    predicate: CellPredicate,
}

impl FormatRule {
    pub fn new(column: impl Into<String>, expected: ValueType) -> Self {
        Self::with_predicate(column, expected.as_str(), move |v| expected.matches(v))
    }

    /// A format check with a caller-supplied predicate. `expected` describes it
    /// in messages, e.g. "ISO date".
    pub fn with_predicate(
        column: impl Into<String>,
        expected: impl Into<String>,
        predicate: impl Fn(&CellValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        let column = column.into();
        Self {
            name: format!("format:{column}"),
            column,
            expected: expected.into(),
            predicate: Box::new(predicate),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Rule for FormatRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, dataset: &Dataset) -> Result<Option<Violation>> {
        let offending: Vec<OffendingCell> = dataset
            .column(&self.column)?
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null() && !(self.predicate)(v))
            .map(|(row, v)| OffendingCell {
                row,
                value: v.clone(),
            })
            .collect();
        if offending.is_empty() {
            return Ok(None);
        }
        let message = format!(
            "Column '{}' has {} value(s) that are not {}: {}",
            self.column,
            offending.len(),
            self.expected,
            describe_cells(&offending)
        );
        Ok(Some(
            Violation::new(&self.name, ViolationKind::FormatViolation, message)
                .with_column(&self.column)
                .with_cells(offending),
        ))
    }
}

// ---------------------------------------------------------------------------
// FnRule
// ---------------------------------------------------------------------------

type RuleFn = Box<dyn Fn(&Dataset) -> Result<Option<String>> + Send + Sync>;

/// Caller-defined rule with its own violation kind. The closure returns a
/// message when the data fails.
pub struct FnRule {
    name: String,
    kind: ViolationKind,
    check: RuleFn,
}

impl FnRule {
    pub fn new(
        name: impl Into<String>,
        kind: ViolationKind,
        check: impl Fn(&Dataset) -> Result<Option<String>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            check: Box::new(check),
        }
    }
}

impl Rule for FnRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, dataset: &Dataset) -> Result<Option<Violation>> {
        Ok((self.check)(dataset)?.map(|message| Violation::new(&self.name, self.kind.clone(), message)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
