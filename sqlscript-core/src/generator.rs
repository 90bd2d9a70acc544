//! Best-effort driver: extract everything, export every record.
//!
//! A record that fails to export is counted and logged; the remaining
//! records are still attempted. Only configuration errors end a run early.

use crate::Result;
use crate::adapters::{ConnectionConfig, UnitFailure};
use crate::export::ScriptExporter;
use crate::extraction::Orchestrator;
use crate::models::{ObjectKind, ScriptLocation, ScriptRecord};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Why a record was not exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "message", rename_all = "snake_case")]
pub enum ExportFailureReason {
    /// The exporter declined the record (invalid record, directory unavailable)
    Rejected,
    /// The exporter raised an error
    Unexpected(String),
}

impl fmt::Display for ExportFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => f.write_str("rejected by exporter"),
            Self::Unexpected(message) => f.write_str(message),
        }
    }
}

/// A record that could not be exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFailure {
    pub location: ScriptLocation,
    pub kind: ObjectKind,
    pub name: String,
    pub reason: ExportFailureReason,
}

impl ExportFailure {
    fn new(record: &ScriptRecord, reason: ExportFailureReason) -> Self {
        Self {
            location: record.location.clone(),
            kind: record.kind.clone(),
            name: record.name.clone(),
            reason,
        }
    }
}

impl fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}': {}", self.location, self.kind, self.name, self.reason)
    }
}

/// Aggregate counts of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutcome {
    pub units_attempted: usize,
    pub units_succeeded: usize,
    pub units_failed: usize,
    /// Objects the provider could not script; not counted as failures
    pub objects_skipped: usize,
    pub records_attempted: usize,
    pub records_exported: usize,
    pub records_failed: usize,
    pub unit_failures: Vec<UnitFailure>,
    pub export_failures: Vec<ExportFailure>,
    pub duration_ms: u64,
}

impl RunOutcome {
    /// No unit and no record failed.
    pub fn is_complete_success(&self) -> bool {
        self.units_failed == 0 && self.records_failed == 0
    }
}

/// Runs extraction once and hands each record to the exporter.
#[derive(Clone)]
pub struct Generator {
    orchestrator: Orchestrator,
    exporter: Arc<dyn ScriptExporter>,
    export_concurrency: usize,
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("orchestrator", &self.orchestrator)
            .field("exporter", &self.exporter.name())
            .field("export_concurrency", &self.export_concurrency)
            .finish()
    }
}

impl Generator {
    /// Creates a generator exporting one record at a time.
    pub fn new(orchestrator: Orchestrator, exporter: Arc<dyn ScriptExporter>) -> Self {
        Self {
            orchestrator,
            exporter,
            export_concurrency: 1,
        }
    }

    /// Sets how many exports may run at once (minimum 1).
    pub fn with_export_concurrency(mut self, concurrency: usize) -> Self {
        self.export_concurrency = concurrency.max(1);
        self
    }

    /// Runs one extraction-and-export pass over `connection`.
    ///
    /// # Errors
    /// Returns error only for configuration problems detected before any
    /// extraction starts; unit and record failures are counted in the
    /// outcome.
    pub async fn run(&self, connection: &ConnectionConfig) -> Result<RunOutcome> {
        let start = Instant::now();
        let extraction = self.orchestrator.fetch_all(connection).await?;

        let mut outcome = RunOutcome {
            units_attempted: extraction.metadata.units_attempted,
            units_succeeded: extraction.metadata.units_succeeded,
            units_failed: extraction.metadata.units_failed,
            objects_skipped: extraction.metadata.objects_skipped,
            records_attempted: extraction.records.len(),
            unit_failures: extraction.failures,
            ..RunOutcome::default()
        };

        info!(
            "Exporting {} record(s) via {} exporter",
            outcome.records_attempted,
            self.exporter.name()
        );

        let exporter = &self.exporter;
        let mut exports = stream::iter(extraction.records.iter().map(|record| async move {
            (record, exporter.export(record).await)
        }))
        .buffer_unordered(self.export_concurrency);

        while let Some((record, result)) = exports.next().await {
            match result {
                Ok(true) => outcome.records_exported = outcome.records_exported.saturating_add(1),
                Ok(false) => {
                    warn!(
                        "Skipped {} '{}' at {}",
                        record.kind, record.name, record.location
                    );
                    outcome
                        .export_failures
                        .push(ExportFailure::new(record, ExportFailureReason::Rejected));
                }
                Err(e) => {
                    error!(
                        "Failed to export {} '{}' at {}: {}",
                        record.kind, record.name, record.location, e
                    );
                    outcome.export_failures.push(ExportFailure::new(
                        record,
                        ExportFailureReason::Unexpected(e.to_string()),
                    ));
                }
            }
        }

        outcome.records_failed = outcome.export_failures.len();
        outcome.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            "Run finished in {}ms: {}/{} unit(s), {}/{} record(s) exported",
            outcome.duration_ms,
            outcome.units_succeeded,
            outcome.units_attempted,
            outcome.records_exported,
            outcome.records_attempted
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ExtractionConfig;
    use crate::adapters::memory::{ServerSnapshot, SnapshotObject, SnapshotProvider};
    use crate::error::ScriptToolError;
    use crate::models::kinds;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Rejects records named "reject" and errors on records named "explode".
    #[derive(Default)]
    struct PickyExporter {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ScriptExporter for PickyExporter {
        async fn export(&self, record: &ScriptRecord) -> Result<bool> {
            self.seen.lock().unwrap().push(record.name.clone());
            match record.name.as_str() {
                "reject" => Ok(false),
                "explode" => Err(ScriptToolError::io(
                    "disk full",
                    std::io::Error::other("no space left"),
                )),
                _ => Ok(true),
            }
        }

        fn name(&self) -> &str {
            "picky"
        }
    }

    fn orchestrator() -> Orchestrator {
        let views = ["a", "reject", "explode", "b"]
            .into_iter()
            .map(|name| SnapshotObject::new(kinds::VIEW, Some("dbo"), name).with_batch("SELECT 1"))
            .collect();
        let snapshot = ServerSnapshot::new("sql01", "16.0").with_database("Sales", views);
        Orchestrator::new(
            Arc::new(SnapshotProvider::new(snapshot)),
            ExtractionConfig::default().with_include_server_objects(false),
        )
    }

    #[tokio::test]
    async fn test_run_continues_past_export_failures() {
        let exporter = Arc::new(PickyExporter::default());
        let generator = Generator::new(orchestrator(), exporter.clone());
        let outcome = generator
            .run(&ConnectionConfig::new("sql01").with_database("Sales"))
            .await
            .unwrap();

        assert_eq!(outcome.records_attempted, 4);
        assert_eq!(outcome.records_exported, 2);
        assert_eq!(outcome.records_failed, 2);
        assert!(!outcome.is_complete_success());
        assert_eq!(exporter.seen.lock().unwrap().len(), 4);

        let reasons: Vec<_> = outcome.export_failures.iter().map(|f| f.reason.clone()).collect();
        assert!(reasons.contains(&ExportFailureReason::Rejected));
        assert!(reasons.iter().any(|r| matches!(r, ExportFailureReason::Unexpected(m) if m.contains("disk full"))));
    }

    #[tokio::test]
    async fn test_run_exports_in_order_when_sequential() {
        let exporter = Arc::new(PickyExporter::default());
        let generator = Generator::new(orchestrator(), exporter.clone()).with_export_concurrency(0);
        generator
            .run(&ConnectionConfig::new("sql01").with_database("Sales"))
            .await
            .unwrap();
        assert_eq!(
            *exporter.seen.lock().unwrap(),
            vec!["a", "reject", "explode", "b"]
        );
    }

    #[tokio::test]
    async fn test_run_reports_skipped_objects_without_failing() {
        let views = vec![
            SnapshotObject::new(kinds::VIEW, Some("dbo"), "a").with_batch("SELECT 1"),
            SnapshotObject::new(kinds::VIEW, Some("dbo"), "opaque").unsupported(),
        ];
        let snapshot = ServerSnapshot::new("sql01", "16.0").with_database("Sales", views);
        let orchestrator = Orchestrator::new(
            Arc::new(SnapshotProvider::new(snapshot)),
            ExtractionConfig::default().with_include_server_objects(false),
        );
        let exporter = Arc::new(PickyExporter::default());
        let outcome = Generator::new(orchestrator, exporter.clone())
            .run(&ConnectionConfig::new("sql01").with_database("Sales"))
            .await
            .unwrap();

        assert_eq!(outcome.objects_skipped, 1);
        assert_eq!(outcome.records_attempted, 1);
        assert_eq!(outcome.records_exported, 1);
        assert!(outcome.is_complete_success());
        assert_eq!(*exporter.seen.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_run_propagates_configuration_errors() {
        let generator = Generator::new(orchestrator(), Arc::new(PickyExporter::default()));
        let error = generator.run(&ConnectionConfig::new("")).await.unwrap_err();
        assert!(error.is_configuration_error());
    }

    #[test]
    fn test_failure_display() {
        let failure = ExportFailure {
            location: ScriptLocation::database("S", "D"),
            kind: kinds::TABLE.into(),
            name: "Orders".to_string(),
            reason: ExportFailureReason::Rejected,
        };
        assert_eq!(failure.to_string(), "S/D Table 'Orders': rejected by exporter");
    }
}
