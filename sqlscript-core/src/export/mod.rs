//! Exporters that persist script records.
//!
//! # Module Structure
//! - `sanitize`: filesystem-safe file stems
//! - `state`: run-scoped memo of cleared directories
//! - `file`: one `.sql` file per record
//! - `console`: debug dump to a text sink

mod console;
mod file;
mod sanitize;
mod state;

pub use console::ConsoleExporter;
pub use file::FileExporter;
pub use sanitize::{
    DEFAULT_REPLACEMENT, FORBIDDEN_CHARACTERS, contains_forbidden, sanitize, sanitize_with,
};
pub use state::{ClearOutcome, ExportDestinationState};

use crate::Result;
use crate::adapters::ExportConfig;
use crate::models::ScriptRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// Destination for script records.
///
/// # Object Safety
/// This trait is object-safe; the generator holds it as
/// `Arc<dyn ScriptExporter>`.
#[async_trait]
pub trait ScriptExporter: Send + Sync {
    /// Persists one record.
    ///
    /// Returns `Ok(false)` for routine failures (invalid record, directory
    /// cannot be created) and `Ok(true)` once the record is written.
    ///
    /// # Errors
    /// Returns error for unexpected failures such as a write into a
    /// directory that exists.
    async fn export(&self, record: &ScriptRecord) -> Result<bool>;

    /// Short exporter name for logs.
    fn name(&self) -> &str;
}

/// Creates the exporter for a run.
///
/// # Errors
/// Returns error if the file exporter cannot prepare its root directory.
pub async fn create_exporter(
    config: &ExportConfig,
    console: bool,
) -> Result<Arc<dyn ScriptExporter>> {
    if console {
        return Ok(Arc::new(ConsoleExporter::stdout()));
    }
    Ok(Arc::new(FileExporter::new(config).await?))
}
