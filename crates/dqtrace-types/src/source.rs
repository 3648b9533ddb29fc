use crate::{Dataset, LoadError};

/// Collaborator that produces a [`Dataset`] from a locator (path, URL, table name).
///
/// The engine never parses files itself; it only consumes what a source yields.
pub trait DataSource: Send + Sync {
    fn load(&self, locator: &str) -> std::result::Result<Dataset, LoadError>;
}
