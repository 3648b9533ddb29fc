//! Shared types, errors, and the dataset abstraction for dqtrace.
//!
//! This crate provides the foundational types used across all other dqtrace crates:
//! - `DqError`: unified error taxonomy
//! - `LoadError`: failures surfaced by a data source
//! - `CellValue`: dynamically typed cell (integer, float, text, null)
//! - `Dataset`: read-only, column-oriented table handed to the engine
//! - `DataSource`: the loader collaborator that produces a `Dataset`

pub mod dataset;
pub mod source;
pub mod value;

pub use dataset::{Column, Dataset};
pub use source::DataSource;
pub use value::CellValue;

/// Failures produced while obtaining a dataset from a source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Source not found: {locator}")]
    NotFound { locator: String },

    #[error("Format error at line {line}: {message}")]
    Format { line: usize, message: String },
}

/// Unified error type for all dqtrace subsystems.
#[derive(Debug, thiserror::Error)]
pub enum DqError {
    // === Setup Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Rule '{name}' is already registered")]
    DuplicateRule { name: String },

    #[error("Stage '{name}' is already registered")]
    DuplicateStage { name: String },

    // === Dataset Errors ===
    #[error("Column '{column}' not found")]
    ColumnNotFound { column: String },

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column name '{column}'")]
    DuplicateColumn { column: String },

    #[error("Row {row} is out of range for a dataset with {rows} rows")]
    RowOutOfRange { row: usize, rows: usize },

    // === Source Errors ===
    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl DqError {
    /// Returns `true` for errors raised while assembling rule or stage registries.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DqError::Configuration(_) | DqError::DuplicateRule { .. } | DqError::DuplicateStage { .. }
        )
    }

    /// Returns `true` if the error must abort a run instead of being recorded as data.
    pub fn is_fatal(&self) -> bool {
        self.is_configuration() || matches!(self, DqError::Load(_))
    }
}

/// A convenience alias for `Result<T, DqError>`.
pub type Result<T> = std::result::Result<T, DqError>;
