//! Extraction orchestration across a server and its databases.
//!
//! The orchestrator turns one [`ConnectionConfig`] into a set of units (one
//! for server-level objects, one per target database), runs them
//! concurrently on the tokio worker pool and merges the records of every
//! unit that completed. A unit that fails, panics or times out is recorded
//! as a [`UnitFailure`] and contributes nothing; it never aborts its
//! siblings. An object whose kind the provider reports as unsupported is
//! logged, counted in [`ExtractionMetadata::objects_skipped`] and left out,
//! while the rest of its unit carries on.
//!
//! # Ordering
//! Records of one unit follow the [`kind_catalog`] sequence, with every
//! table or job immediately followed by its separately emitted children.
//! Units complete in any order.

mod catalog;

pub use catalog::{
    KindDescriptor, KindScope, SQL_SERVER_2005, SQL_SERVER_2012, VersionGate, kind_catalog,
};

use crate::Result;
use crate::adapters::{
    ConnectionConfig, ExtractionConfig, ExtractionMetadata, MetadataProvider, ProviderSession,
    SessionTarget, UnitFailure, UnitTarget, render_body,
};
use crate::error::ScriptToolError;
use crate::models::{DatabaseObject, ScriptLocation, ScriptRecord, ServerVersion};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Records and failures of one orchestration pass.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub records: Vec<ScriptRecord>,
    pub failures: Vec<UnitFailure>,
    pub metadata: ExtractionMetadata,
}

impl ExtractionResult {
    /// Whether every unit completed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Identity reported by a connection test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerIdentity {
    pub provider: String,
    pub server_name: String,
    pub version: ServerVersion,
    pub database: Option<String>,
}

/// Fans extraction out over the configured units.
///
/// The provider and configuration are shared read-only with every unit;
/// each unit opens its own provider session.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn MetadataProvider>,
    config: Arc<ExtractionConfig>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.provider_name())
            .field("config", &self.config)
            .finish()
    }
}

impl Orchestrator {
    /// Creates an orchestrator over `provider`.
    pub fn new(provider: Arc<dyn MetadataProvider>, config: ExtractionConfig) -> Self {
        Self {
            provider,
            config: Arc::new(config),
        }
    }

    /// Returns the extraction configuration.
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Short name of the underlying provider.
    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Lists the units a run over `connection` would execute, server unit first.
    ///
    /// # Errors
    /// Returns a configuration error if the connection has no target database.
    pub fn plan_units(&self, connection: &ConnectionConfig) -> Result<Vec<UnitTarget>> {
        let targets = connection.targets()?;
        let mut units = Vec::with_capacity(targets.len().saturating_add(1));
        if self.config.include_server_objects {
            units.push(UnitTarget::Server);
        }
        units.extend(targets.into_iter().map(UnitTarget::Database));
        Ok(units)
    }

    /// Extracts every object reachable through `connection`.
    ///
    /// Waits for all units before returning. Zero records is a valid result.
    ///
    /// # Errors
    /// Returns a configuration error if either configuration is invalid or no
    /// target can be resolved. Unit failures are reported in
    /// [`ExtractionResult::failures`] instead.
    pub async fn fetch_all(&self, connection: &ConnectionConfig) -> Result<ExtractionResult> {
        self.config.validate()?;
        connection.validate()?;
        let units = self.plan_units(connection)?;

        let start = Instant::now();
        let mut metadata = ExtractionMetadata::begin(units.len(), self.config.max_concurrency);

        info!(
            "Extracting {} unit(s) from {} via {} (max concurrency {})",
            units.len(),
            connection,
            self.provider.provider_name(),
            self.config.max_concurrency
        );

        let unit_futures = units.into_iter().map(|unit| {
            let target = SessionTarget::from_config(connection, unit.database_name());
            let provider = Arc::clone(&self.provider);
            let config = Arc::clone(&self.config);
            async move {
                let task = tokio::spawn(run_unit(provider, config, unit.clone(), target));
                let result = match task.await {
                    Ok(result) => result,
                    Err(join_error) => Err(ScriptToolError::collection_failed(
                        format!("Extraction unit {} aborted", unit),
                        join_error,
                    )),
                };
                (unit, result)
            }
        });

        let mut stream = stream::iter(unit_futures).buffer_unordered(self.config.max_concurrency);

        let mut records = Vec::new();
        let mut failures = Vec::new();

        while let Some((unit, result)) = stream.next().await {
            match result {
                Ok(output) => {
                    info!(
                        "Extracted {} script(s) from {} ({} skipped)",
                        output.records.len(),
                        unit,
                        output.skipped
                    );
                    metadata.units_succeeded = metadata.units_succeeded.saturating_add(1);
                    metadata.objects_skipped = metadata.objects_skipped.saturating_add(output.skipped);
                    records.extend(output.records);
                }
                Err(e) => {
                    warn!("Failed to extract scripts from {}: {}", unit, e);
                    metadata.units_failed = metadata.units_failed.saturating_add(1);
                    failures.push(UnitFailure {
                        target: unit,
                        error_message: e.to_string(),
                        is_connection_error: e.is_connection_error(),
                    });
                }
            }
        }

        metadata.total_duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        if metadata.units_succeeded == 0 && metadata.units_attempted > 0 {
            metadata
                .warnings
                .push("No extraction unit completed successfully".to_string());
        }
        if metadata.objects_skipped > 0 {
            metadata.warnings.push(format!(
                "{} object(s) skipped: their kind cannot be scripted by {}",
                metadata.objects_skipped,
                self.provider.provider_name()
            ));
        }

        info!(
            "Extraction finished: {} record(s), {}/{} unit(s) succeeded in {}ms",
            records.len(),
            metadata.units_succeeded,
            metadata.units_attempted,
            metadata.total_duration_ms
        );

        Ok(ExtractionResult {
            records,
            failures,
            metadata,
        })
    }

    /// Opens one session and reports the server identity.
    ///
    /// The session targets the first configured database.
    ///
    /// # Errors
    /// Returns error if the session cannot be opened.
    pub async fn identify(&self, connection: &ConnectionConfig) -> Result<ServerIdentity> {
        connection.validate()?;
        let database = connection.targets()?.into_iter().next();
        let target = SessionTarget::from_config(connection, database.as_deref());
        let session = self.provider.open_session(&target).await?;

        Ok(ServerIdentity {
            provider: self.provider.provider_name().to_string(),
            server_name: session.server_name().to_string(),
            version: session.server_version(),
            database,
        })
    }
}

/// Records of one completed unit.
#[derive(Debug, Default)]
struct UnitOutput {
    records: Vec<ScriptRecord>,
    /// Objects the provider reported as unsupported
    skipped: usize,
}

/// Runs one unit, bounded by the configured unit timeout.
async fn run_unit(
    provider: Arc<dyn MetadataProvider>,
    config: Arc<ExtractionConfig>,
    unit: UnitTarget,
    target: SessionTarget,
) -> Result<UnitOutput> {
    let extraction = extract_unit(provider.as_ref(), &config, &unit, &target);
    match config.unit_timeout {
        Some(limit) => tokio::time::timeout(limit, extraction)
            .await
            .map_err(|_| ScriptToolError::timeout(format!("Extraction of {}", unit), limit))?,
        None => extraction.await,
    }
}

async fn extract_unit(
    provider: &dyn MetadataProvider,
    config: &ExtractionConfig,
    unit: &UnitTarget,
    target: &SessionTarget,
) -> Result<UnitOutput> {
    let start = Instant::now();
    debug!("Opening session for {}", unit);
    let mut session = provider.open_session(target).await?;

    let version = session.server_version();
    let server_name = session.server_name().to_string();
    let (scope, location) = match unit {
        UnitTarget::Server => (KindScope::Server, ScriptLocation::server(server_name)),
        UnitTarget::Database(name) => (
            KindScope::Database,
            ScriptLocation::database(server_name, name.clone()),
        ),
    };

    let mut output = UnitOutput::default();
    for descriptor in kind_catalog().iter().filter(|d| d.scope == scope) {
        if !descriptor.gate.allows(&version) {
            trace!(
                "Skipping {} on {}: requires {} (server is {})",
                descriptor.kind, location, descriptor.gate, version
            );
            continue;
        }

        let objects = session.list_objects(&descriptor.kind).await?;
        let before = output.records.len();
        for object in objects.iter().filter(|o| is_extractable(config, o)) {
            extract_object(session.as_mut(), config, &location, descriptor, object, &mut output)
                .await?;
        }
        debug!(
            "{}: {} {} script(s) from {} object(s)",
            location,
            output.records.len().saturating_sub(before),
            descriptor.kind,
            objects.len()
        );
    }

    debug!(
        "Unit {} produced {} record(s) in {}ms",
        unit,
        output.records.len(),
        start.elapsed().as_millis()
    );
    Ok(output)
}

/// Whether `object` survives the system-object and schema filters.
fn is_extractable(config: &ExtractionConfig, object: &DatabaseObject) -> bool {
    if object.is_system_object || object.name.is_empty() {
        return false;
    }
    !object
        .schema
        .as_deref()
        .is_some_and(|schema| config.is_schema_excluded(schema))
}

/// Scripts `object`, or returns `None` when the provider cannot express it.
async fn script_or_skip(
    session: &mut dyn ProviderSession,
    object: &DatabaseObject,
    parent: Option<&DatabaseObject>,
    skipped: &mut usize,
) -> Result<Option<Vec<String>>> {
    match session.script_object(object, parent).await {
        Ok(batches) => Ok(Some(batches)),
        Err(e) if e.is_unsupported() => {
            warn!("Skipping {} {}: {}", object.kind, object.qualified_name(), e);
            *skipped = skipped.saturating_add(1);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Scripts one object and its children, appending the parent record first.
///
/// A skipped parent takes its children with it.
async fn extract_object(
    session: &mut dyn ProviderSession,
    config: &ExtractionConfig,
    location: &ScriptLocation,
    descriptor: &KindDescriptor,
    object: &DatabaseObject,
    output: &mut UnitOutput,
) -> Result<()> {
    let Some(mut batches) = script_or_skip(session, object, None, &mut output.skipped).await? else {
        return Ok(());
    };
    let mut children = Vec::new();

    if descriptor.has_children {
        let owner = object.qualified_name();
        for child in session.list_children(object).await? {
            if child.is_system_object || child.name.is_empty() {
                continue;
            }
            let Some(child_batches) =
                script_or_skip(session, &child, Some(object), &mut output.skipped).await?
            else {
                continue;
            };
            if catalog::is_always_inline(&child) || !config.emit_child_objects_separately {
                batches.extend(child_batches);
            } else {
                children.push(ScriptRecord::new(
                    location.clone(),
                    child.kind,
                    Some(owner.clone()),
                    child.name,
                    render_body(&child_batches),
                ));
            }
        }
    }

    output.records.push(ScriptRecord::new(
        location.clone(),
        object.kind.clone(),
        object.schema.clone(),
        object.name.clone(),
        render_body(&batches),
    ));
    output.records.append(&mut children);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InjectedFailure, ServerSnapshot, SnapshotObject, SnapshotProvider};
    use crate::models::kinds;

    fn orders_table() -> SnapshotObject {
        SnapshotObject::new(kinds::TABLE, Some("dbo"), "Orders")
            .with_batch("CREATE TABLE [dbo].[Orders]([Id] [int] NOT NULL)")
            .with_child(
                SnapshotObject::new(kinds::INDEX, Some("dbo"), "PK_Orders")
                    .clustered()
                    .with_batch("ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [PK_Orders] PRIMARY KEY CLUSTERED ([Id])"),
            )
            .with_child(
                SnapshotObject::new(kinds::INDEX, Some("dbo"), "IX_Orders_Date")
                    .with_batch("CREATE NONCLUSTERED INDEX [IX_Orders_Date] ON [dbo].[Orders]([Date])"),
            )
            .with_child(
                SnapshotObject::new(kinds::CHECK, Some("dbo"), "CK_Orders_Id")
                    .with_batch("ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [CK_Orders_Id] CHECK ([Id]>(0))"),
            )
            .with_child(
                SnapshotObject::new(kinds::TRIGGER, Some("dbo"), "TR_Orders_Audit")
                    .with_batch("CREATE TRIGGER [dbo].[TR_Orders_Audit] ON [dbo].[Orders] AFTER INSERT AS SELECT 1"),
            )
    }

    fn provider() -> Arc<dyn MetadataProvider> {
        let snapshot = ServerSnapshot::new("sql01", "15.0.2000.5")
            .with_server_objects(vec![
                SnapshotObject::new(kinds::ENDPOINT, None, "Mirroring").with_batch("CREATE ENDPOINT [Mirroring]"),
            ])
            .with_database(
                "Sales",
                vec![
                    orders_table(),
                    SnapshotObject::new(kinds::VIEW, Some("sys"), "objects").with_batch("--"),
                    SnapshotObject::new(kinds::VIEW, Some("dbo"), "vw_internal").system(),
                    SnapshotObject::new(kinds::VIEW, Some("dbo"), "vw_Orders")
                        .with_batch("CREATE VIEW [dbo].[vw_Orders] AS SELECT 1 AS [One]"),
                ],
            );
        Arc::new(SnapshotProvider::new(snapshot))
    }

    fn connection() -> ConnectionConfig {
        ConnectionConfig::new("sql01").with_database("Sales")
    }

    #[tokio::test]
    async fn test_fetch_all_separates_children() {
        let orchestrator = Orchestrator::new(provider(), ExtractionConfig::default());
        let result = orchestrator.fetch_all(&connection()).await.unwrap();

        assert!(result.is_complete());
        assert_eq!(result.metadata.units_attempted, 2);
        assert_eq!(result.metadata.units_succeeded, 2);

        let sales: Vec<_> = result
            .records
            .iter()
            .filter(|r| r.location.database_name.as_deref() == Some("Sales"))
            .map(|r| (r.kind.to_string(), r.file_stem()))
            .collect();
        assert_eq!(
            sales,
            vec![
                ("Table".to_string(), "dbo.Orders".to_string()),
                ("Index".to_string(), "dbo.Orders.IX_Orders_Date".to_string()),
                ("Trigger".to_string(), "dbo.Orders.TR_Orders_Audit".to_string()),
                ("View".to_string(), "dbo.vw_Orders".to_string()),
            ]
        );

        let table = &result.records.iter().find(|r| r.name == "Orders").unwrap().body;
        assert!(table.contains("PRIMARY KEY CLUSTERED"));
        assert!(table.contains("CHECK ([Id]>(0))"));
        assert!(!table.contains("IX_Orders_Date"));
        assert!(table.starts_with("CREATE TABLE [dbo].[Orders]([Id] [int] NOT NULL)\nGO\n\n"));

        let endpoint = result.records.iter().find(|r| r.kind == kinds::ENDPOINT).unwrap();
        assert_eq!(endpoint.location, ScriptLocation::server("sql01"));
    }

    #[tokio::test]
    async fn test_fetch_all_inline_children() {
        let config = ExtractionConfig::default()
            .with_emit_child_objects_separately(false)
            .with_include_server_objects(false);
        let orchestrator = Orchestrator::new(provider(), config);
        let result = orchestrator.fetch_all(&connection()).await.unwrap();

        assert_eq!(result.metadata.units_attempted, 1);
        assert_eq!(result.records.len(), 2);
        let table = &result.records[0];
        assert_eq!(table.name, "Orders");
        assert!(table.body.contains("IX_Orders_Date"));
        assert!(table.body.contains("TR_Orders_Audit"));
        assert_eq!(table.body.matches("\nGO\n\n").count(), 5);
    }

    #[tokio::test]
    async fn test_fetch_all_records_unit_failure() {
        let provider = SnapshotProvider::new(
            ServerSnapshot::new("sql01", "15.0").with_database("Sales", vec![orders_table()]),
        )
        .with_failure(
            "Sales",
            InjectedFailure::Enumerate {
                kind: kinds::VIEW.into(),
                message: "permission denied".to_string(),
            },
        );
        let orchestrator = Orchestrator::new(Arc::new(provider), ExtractionConfig::default());
        let result = orchestrator.fetch_all(&connection()).await.unwrap();

        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].target, UnitTarget::Database("Sales".to_string()));
        assert!(!result.failures[0].is_connection_error);
        assert!(result.records.iter().all(|r| r.location.database_name.is_none()));
        assert_eq!(result.metadata.units_failed, 1);
    }

    #[tokio::test]
    async fn test_fetch_all_rejects_missing_target() {
        let orchestrator = Orchestrator::new(provider(), ExtractionConfig::default());
        let error = orchestrator
            .fetch_all(&ConnectionConfig::new("sql01"))
            .await
            .unwrap_err();
        assert!(error.is_configuration_error());
    }

    #[tokio::test]
    async fn test_excluded_schemas_are_case_insensitive() {
        let config = ExtractionConfig::default()
            .with_include_server_objects(false)
            .with_excluded_schemas(vec!["SYS".to_string(), "DBO".to_string()]);
        let orchestrator = Orchestrator::new(provider(), config);
        let result = orchestrator.fetch_all(&connection()).await.unwrap();
        assert!(result.records.is_empty());
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn test_identify_reports_server() {
        let orchestrator = Orchestrator::new(provider(), ExtractionConfig::default());
        let identity = orchestrator.identify(&connection()).await.unwrap();
        assert_eq!(identity.provider, "snapshot");
        assert_eq!(identity.server_name, "sql01");
        assert_eq!(identity.version, ServerVersion::new(15, 0, 2000));
        assert_eq!(identity.database.as_deref(), Some("Sales"));
    }

    #[test]
    fn test_plan_units() {
        let orchestrator = Orchestrator::new(provider(), ExtractionConfig::default());
        let connection = ConnectionConfig::new("sql01")
            .with_databases(vec!["A".to_string(), "B".to_string()]);
        assert_eq!(
            orchestrator.plan_units(&connection).unwrap(),
            vec![
                UnitTarget::Server,
                UnitTarget::Database("A".to_string()),
                UnitTarget::Database("B".to_string()),
            ]
        );
    }
}
