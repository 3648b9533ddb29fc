//! CSV data source for dqtrace.
//!
//! Reads delimited text with a header row into a typed [`Dataset`]. Each cell is
//! inferred independently (null marker, integer, float, or text), so a column
//! may mix types exactly as the raw file does.
//!
//! # Example
//! ```
//! let ds = dqtrace_csv::parse_csv("name,age\nann,25\nbob,\n").unwrap();
//! assert_eq!(ds.row_count(), 2);
//! assert!(ds.is_null("age", 1).unwrap());
//! ```

mod parser;

use std::path::Path;

use dqtrace_types::{DataSource, Dataset, LoadError};

pub use parser::parse_csv_with;

/// Reader settings.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: char,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

/// Parse comma-separated text with default options. The dataset is tagged `inline`.
pub fn parse_csv(text: &str) -> std::result::Result<Dataset, LoadError> {
    parse_csv_with(text, "inline", &CsvOptions::default())
}

/// Filesystem-backed [`DataSource`] for CSV files.
#[derive(Debug, Clone, Default)]
pub struct CsvSource {
    options: CsvOptions,
}

impl CsvSource {
    pub fn new(options: CsvOptions) -> Self {
        Self { options }
    }

    pub fn load_path(&self, path: &Path) -> std::result::Result<Dataset, LoadError> {
        let locator = path.display().to_string();
        tracing::info!(path = %locator, "Attempting to load data");
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                tracing::error!(path = %locator, "File not found");
                LoadError::NotFound {
                    locator: locator.clone(),
                }
            }
            _ => LoadError::Format {
                line: 0,
                message: format!("could not read {locator}: {e}"),
            },
        })?;

        let dataset = parse_csv_with(&text, &locator, &self.options).inspect_err(|e| {
            tracing::error!(path = %locator, error = %e, "Parsing error loading data");
        })?;
        tracing::info!(
            path = %locator,
            rows = dataset.row_count(),
            columns = dataset.column_names().len(),
            "Data loaded successfully"
        );
        Ok(dataset)
    }
}

impl DataSource for CsvSource {
    fn load(&self, locator: &str) -> std::result::Result<Dataset, LoadError> {
        self.load_path(Path::new(locator))
    }
}
