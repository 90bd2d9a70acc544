//! One `.sql` file per record under `<root>/<server>/<database>/<kind>/`.

use super::sanitize::sanitize_with;
use super::state::{ClearOutcome, ExportDestinationState};
use super::ScriptExporter;
use crate::Result;
use crate::adapters::ExportConfig;
use crate::error::ScriptToolError;
use crate::models::ScriptRecord;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Writes each record to its own file.
///
/// Path segments from the record's location and kind are used verbatim;
/// only the file stem is sanitized. Segments that would leave the root
/// (`..`, absolute paths) make the record invalid.
#[derive(Debug, Clone)]
pub struct FileExporter {
    root: PathBuf,
    clear_before_write: bool,
    replacement_token: String,
    state: Arc<ExportDestinationState>,
}

impl FileExporter {
    /// Creates an exporter with a fresh clear-once memo.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the root directory
    /// cannot be created.
    pub async fn new(config: &ExportConfig) -> Result<Self> {
        Self::with_state(config, Arc::new(ExportDestinationState::new())).await
    }

    /// Creates an exporter sharing an existing clear-once memo.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the root directory
    /// cannot be created.
    pub async fn with_state(
        config: &ExportConfig,
        state: Arc<ExportDestinationState>,
    ) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.path).await.map_err(|e| {
            ScriptToolError::io(
                format!("Failed to create export root {}", config.path.display()),
                e,
            )
        })?;

        Ok(Self {
            root: config.path.clone(),
            clear_before_write: config.clear_path_before_write,
            replacement_token: config.replacement_token.clone(),
            state,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The shared clear-once memo.
    pub fn state(&self) -> &Arc<ExportDestinationState> {
        &self.state
    }

    /// Directory `record` is written to, or `None` if a segment would
    /// escape the root.
    pub fn target_directory(&self, record: &ScriptRecord) -> Option<PathBuf> {
        let segments = [
            record.location.server_name.as_str(),
            record.location.database_segment(),
            record.kind.as_str(),
        ];
        if !segments.iter().all(|s| is_contained_segment(s)) {
            return None;
        }
        Some(segments.iter().fold(self.root.clone(), |dir, s| dir.join(s)))
    }

    /// Full file path for `record`, or `None` if the record is invalid.
    pub fn target_file(&self, record: &ScriptRecord) -> Option<PathBuf> {
        if record.validate().is_err() {
            return None;
        }
        let stem = sanitize_with(&record.file_stem(), &self.replacement_token).into_owned();
        if stem.is_empty() || stem == "." || stem == ".." {
            return None;
        }
        self.target_directory(record)
            .map(|dir| dir.join(format!("{}.sql", stem)))
    }
}

/// An empty segment is allowed and adds no directory level.
fn is_contained_segment(segment: &str) -> bool {
    Path::new(segment)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[async_trait]
impl ScriptExporter for FileExporter {
    async fn export(&self, record: &ScriptRecord) -> Result<bool> {
        let Some(path) = self.target_file(record) else {
            warn!(
                "Rejected {} '{}' at {}: not exportable",
                record.kind, record.name, record.location
            );
            return Ok(false);
        };
        let Some(dir) = path.parent() else {
            return Ok(false);
        };

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("Failed to create {}: {}", dir.display(), e);
            return Ok(false);
        }

        if self.clear_before_write {
            match self.state.clear_once(dir).await {
                ClearOutcome::Cleared { removed } => {
                    debug!("Cleared {} file(s) from {}", removed, dir.display());
                }
                ClearOutcome::Failed { removed } => {
                    warn!(
                        "Clearing {} was incomplete ({} file(s) removed); continuing",
                        dir.display(),
                        removed
                    );
                }
                ClearOutcome::AlreadyHandled { .. } => {}
            }
        }

        tokio::fs::write(&path, record.body.as_bytes())
            .await
            .map_err(|e| ScriptToolError::io(format!("Failed to write {}", path.display()), e))?;

        debug!("Wrote {}", path.display());
        Ok(true)
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScriptLocation, kinds};
    use tempfile::TempDir;

    fn record(schema: Option<&str>, name: &str) -> ScriptRecord {
        ScriptRecord::new(
            ScriptLocation::database("S", "D"),
            kinds::TABLE,
            schema.map(str::to_string),
            name,
            "CREATE TABLE x",
        )
    }

    async fn exporter(temp: &TempDir) -> FileExporter {
        FileExporter::new(&ExportConfig::new(temp.path())).await.unwrap()
    }

    #[tokio::test]
    async fn test_target_file_layout() {
        let temp = TempDir::new().unwrap();
        let exporter = exporter(&temp).await;
        assert_eq!(
            exporter.target_file(&record(Some("dbo"), "Orders")).unwrap(),
            temp.path().join("S").join("D").join("Table").join("dbo.Orders.sql")
        );
    }

    #[tokio::test]
    async fn test_server_level_record_has_no_database_segment() {
        let temp = TempDir::new().unwrap();
        let exporter = exporter(&temp).await;
        let job = ScriptRecord::new(
            ScriptLocation::server("S"),
            kinds::JOB,
            Some("Database Maintenance".to_string()),
            "Nightly: backup",
            "",
        );
        let dir = exporter.target_directory(&job).unwrap();
        assert_eq!(dir.components().count(), temp.path().components().count() + 2);
        assert_eq!(
            exporter.target_file(&job).unwrap().file_name().unwrap(),
            "Database Maintenance.Nightly_ backup.sql"
        );
    }

    #[tokio::test]
    async fn test_escaping_segments_are_rejected() {
        let temp = TempDir::new().unwrap();
        let exporter = exporter(&temp).await;

        let mut escaping = record(Some("dbo"), "Orders");
        escaping.location = ScriptLocation::database("S", "..");
        assert!(exporter.target_directory(&escaping).is_none());
        assert!(!exporter.export(&escaping).await.unwrap());

        let mut absolute = record(Some("dbo"), "Orders");
        absolute.location = ScriptLocation::server("/etc");
        assert!(exporter.target_file(&absolute).is_none());
    }

    #[tokio::test]
    async fn test_nameless_record_is_rejected_without_side_effects() {
        let temp = TempDir::new().unwrap();
        let exporter = exporter(&temp).await;
        let mut nameless = record(Some("dbo"), "Orders");
        nameless.name.clear();

        assert!(!exporter.export(&nameless).await.unwrap());
        assert!(!temp.path().join("S").exists());
    }

    #[tokio::test]
    async fn test_replacement_token_applies_to_stem_only() {
        let temp = TempDir::new().unwrap();
        let config = ExportConfig::new(temp.path()).with_replacement_token("-");
        let exporter = FileExporter::new(&config).await.unwrap();
        let path = exporter.target_file(&record(Some("dbo"), "a:b")).unwrap();
        assert_eq!(path.file_name().unwrap(), "dbo.a-b.sql");
    }

    #[tokio::test]
    async fn test_new_creates_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("out").join("scripts");
        FileExporter::new(&ExportConfig::new(&root)).await.unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let temp = TempDir::new().unwrap();
        let config = ExportConfig::new(temp.path()).with_replacement_token("|");
        assert!(FileExporter::new(&config).await.is_err());
    }
}
