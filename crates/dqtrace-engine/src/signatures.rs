//! Built-in stage signatures: the symptom a pipeline stage would leave behind.

use std::cmp::Ordering;

use dqtrace_types::{Dataset, Result};

use crate::stages::StagePredicate;

/// Any null cell anywhere (the symptom of a lossy load).
pub fn has_nulls() -> impl StagePredicate {
    |ds: &Dataset| -> Result<bool> { Ok(ds.has_any_null()) }
}

pub fn column_has_nulls(column: impl Into<String>) -> impl StagePredicate {
    let column = column.into();
    move |ds: &Dataset| -> Result<bool> { Ok(ds.column(&column)?.iter().any(|v| v.is_null())) }
}

pub fn negative_values(column: impl Into<String>) -> impl StagePredicate {
    let column = column.into();
    move |ds: &Dataset| -> Result<bool> {
        Ok(ds
            .column(&column)?
            .iter()
            .any(|v| v.cmp_f64(0.0) == Some(Ordering::Less)))
    }
}

/// Any numeric value outside the inclusive bounds.
pub fn out_of_range(
    column: impl Into<String>,
    min: Option<f64>,
    max: Option<f64>,
) -> impl StagePredicate {
    let column = column.into();
    move |ds: &Dataset| -> Result<bool> {
        Ok(ds.column(&column)?.iter().any(|v| {
            min.is_some_and(|lo| v.cmp_f64(lo) == Some(Ordering::Less))
                || max.is_some_and(|hi| v.cmp_f64(hi) == Some(Ordering::Greater))
        }))
    }
}

/// Any non-null value that is not an integer.
pub fn non_integer(column: impl Into<String>) -> impl StagePredicate {
    let column = column.into();
    move |ds: &Dataset| -> Result<bool> {
        Ok(ds
            .column(&column)?
            .iter()
            .any(|v| !v.is_null() && !v.is_integer()))
    }
}
