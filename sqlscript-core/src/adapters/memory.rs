//! Snapshot-backed metadata provider.
//!
//! Serves a catalog held in memory (usually loaded from a JSON snapshot file)
//! through the same session interface as a live server. Failures can be
//! injected per database so failure isolation can be exercised offline.

use super::{MetadataProvider, ProviderSession, SessionTarget};
use crate::Result;
use crate::error::ScriptToolError;
use crate::models::{DatabaseObject, ObjectKind, ServerVersion};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// One object in a snapshot, with its script batches and children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotObject {
    pub kind: ObjectKind,
    #[serde(default)]
    pub schema: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_system_object: bool,
    #[serde(default)]
    pub is_clustered: bool,
    #[serde(default)]
    pub batches: Vec<String>,
    #[serde(default)]
    pub children: Vec<SnapshotObject>,
    /// Scripting reports the object's kind as unsupported
    #[serde(default)]
    pub unsupported: bool,
}

impl SnapshotObject {
    pub fn new(kind: impl Into<ObjectKind>, schema: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            schema: schema.filter(|s| !s.is_empty()).map(str::to_string),
            name: name.into(),
            is_system_object: false,
            is_clustered: false,
            batches: Vec::new(),
            children: Vec::new(),
            unsupported: false,
        }
    }

    pub fn with_batch(mut self, batch: impl Into<String>) -> Self {
        self.batches.push(batch.into());
        self
    }

    pub fn with_child(mut self, child: SnapshotObject) -> Self {
        self.children.push(child);
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system_object = true;
        self
    }

    pub fn clustered(mut self) -> Self {
        self.is_clustered = true;
        self
    }

    pub fn unsupported(mut self) -> Self {
        self.unsupported = true;
        self
    }

    fn to_database_object(&self) -> DatabaseObject {
        DatabaseObject::new(self.kind.clone(), self.schema.as_deref(), self.name.clone())
            .with_system_object(self.is_system_object)
            .with_clustered(self.is_clustered)
    }

    fn matches(&self, object: &DatabaseObject) -> bool {
        self.kind == object.kind && self.schema == object.schema && self.name == object.name
    }
}

/// A whole server captured as data.
///
/// # Example
/// ```rust
/// use sqlscript_core::adapters::memory::{ServerSnapshot, SnapshotObject};
/// use sqlscript_core::models::kinds;
///
/// let snapshot = ServerSnapshot::new("sql01", "15.0.2000.5").with_database(
///     "Sales",
///     vec![SnapshotObject::new(kinds::VIEW, Some("dbo"), "ActiveOrders")
///         .with_batch("CREATE VIEW [dbo].[ActiveOrders] AS SELECT 1 AS x")],
/// );
/// assert_eq!(snapshot.databases["Sales"].len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub server_name: String,
    /// `ProductVersion` string, e.g. `"15.0.2000.5"`
    pub version: String,
    #[serde(default)]
    pub server_objects: Vec<SnapshotObject>,
    #[serde(default)]
    pub databases: BTreeMap<String, Vec<SnapshotObject>>,
}

impl ServerSnapshot {
    pub fn new(server_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn with_server_objects(mut self, objects: Vec<SnapshotObject>) -> Self {
        self.server_objects = objects;
        self
    }

    pub fn with_database(mut self, name: impl Into<String>, objects: Vec<SnapshotObject>) -> Self {
        self.databases.insert(name.into(), objects);
        self
    }
}

/// A failure the snapshot provider raises on purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFailure {
    /// `open_session` fails with a connection error
    Connect(String),
    /// `list_objects` fails for one kind
    Enumerate { kind: ObjectKind, message: String },
}

/// Provider that serves a [`ServerSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    snapshot: Arc<ServerSnapshot>,
    // Keyed by database; `None` is the server-level unit
    failures: HashMap<Option<String>, InjectedFailure>,
}

impl SnapshotProvider {
    pub fn new(snapshot: ServerSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            failures: HashMap::new(),
        }
    }

    /// Loads a snapshot from a JSON file.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read, or a serialization
    /// error if it is not a valid snapshot.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ScriptToolError::io(format!("reading snapshot {}", path.display()), e))?;
        let snapshot: ServerSnapshot =
            serde_json::from_str(&content).map_err(|e| ScriptToolError::Serialization {
                context: format!("parsing snapshot {}", path.display()),
                source: e,
            })?;
        tracing::debug!(
            "Loaded snapshot of {} with {} databases",
            snapshot.server_name,
            snapshot.databases.len()
        );
        Ok(Self::new(snapshot))
    }

    /// Injects a failure for `database`.
    pub fn with_failure(mut self, database: impl Into<String>, failure: InjectedFailure) -> Self {
        self.failures.insert(Some(database.into()), failure);
        self
    }

    /// Injects a failure for the server-level unit.
    pub fn with_server_failure(mut self, failure: InjectedFailure) -> Self {
        self.failures.insert(None, failure);
        self
    }

    pub fn snapshot(&self) -> &ServerSnapshot {
        &self.snapshot
    }
}

#[async_trait]
impl MetadataProvider for SnapshotProvider {
    async fn open_session(&self, target: &SessionTarget) -> Result<Box<dyn ProviderSession>> {
        let failure = self.failures.get(&target.database).cloned();
        if let Some(InjectedFailure::Connect(message)) = &failure {
            return Err(ScriptToolError::connection_failed(
                format!("opening session on {}", self.snapshot.server_name),
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, message.clone()),
            ));
        }

        if let Some(database) = &target.database
            && !self.snapshot.databases.contains_key(database)
        {
            return Err(ScriptToolError::connection_failed(
                format!("opening session on {}", self.snapshot.server_name),
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("database '{}' does not exist", database),
                ),
            ));
        }

        let version = ServerVersion::parse(&self.snapshot.version)?;

        Ok(Box::new(SnapshotSession {
            snapshot: Arc::clone(&self.snapshot),
            database: target.database.clone(),
            version,
            failure,
        }))
    }

    fn provider_name(&self) -> &str {
        "snapshot"
    }
}

struct SnapshotSession {
    snapshot: Arc<ServerSnapshot>,
    database: Option<String>,
    version: ServerVersion,
    failure: Option<InjectedFailure>,
}

impl SnapshotSession {
    fn objects(&self) -> &[SnapshotObject] {
        match &self.database {
            Some(db) => self
                .snapshot
                .databases
                .get(db)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            None => &self.snapshot.server_objects,
        }
    }

    fn find(&self, object: &DatabaseObject, parent: Option<&DatabaseObject>) -> Option<&SnapshotObject> {
        match parent {
            Some(parent) => self
                .objects()
                .iter()
                .find(|o| o.matches(parent))?
                .children
                .iter()
                .find(|c| c.matches(object)),
            None => self.objects().iter().find(|o| o.matches(object)),
        }
    }
}

#[async_trait]
impl ProviderSession for SnapshotSession {
    fn server_name(&self) -> &str {
        &self.snapshot.server_name
    }

    fn server_version(&self) -> ServerVersion {
        self.version
    }

    async fn list_objects(&mut self, kind: &ObjectKind) -> Result<Vec<DatabaseObject>> {
        if let Some(InjectedFailure::Enumerate {
            kind: failing,
            message,
        }) = &self.failure
            && failing == kind
        {
            return Err(ScriptToolError::collection_failed(
                format!("enumerating {}", kind),
                std::io::Error::other(message.clone()),
            ));
        }

        Ok(self
            .objects()
            .iter()
            .filter(|o| &o.kind == kind)
            .map(SnapshotObject::to_database_object)
            .collect())
    }

    async fn list_children(&mut self, parent: &DatabaseObject) -> Result<Vec<DatabaseObject>> {
        Ok(self
            .find(parent, None)
            .map(|p| p.children.iter().map(SnapshotObject::to_database_object).collect())
            .unwrap_or_default())
    }

    async fn script_object(
        &mut self,
        object: &DatabaseObject,
        parent: Option<&DatabaseObject>,
    ) -> Result<Vec<String>> {
        let found = self.find(object, parent).ok_or_else(|| {
            ScriptToolError::query_failed(format!(
                "{} {} not found in snapshot",
                object.kind,
                object.qualified_name()
            ))
        })?;
        if found.unsupported {
            return Err(ScriptToolError::unsupported_feature(
                format!("scripting {} {}", object.kind, object.qualified_name()),
                "snapshot provider",
            ));
        }
        Ok(found.batches.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::kinds;
    use std::time::Duration;

    fn target(database: Option<&str>) -> SessionTarget {
        SessionTarget {
            server: "snap".to_string(),
            database: database.map(str::to_string),
            credentials: None,
            connect_timeout: Duration::from_secs(5),
            trust_server_certificate: false,
        }
    }

    fn provider() -> SnapshotProvider {
        let orders = SnapshotObject::new(kinds::TABLE, Some("dbo"), "Orders")
            .with_batch("CREATE TABLE [dbo].[Orders] ([Id] int NOT NULL)")
            .with_child(
                SnapshotObject::new(kinds::INDEX, Some("dbo"), "IX_Orders_Date")
                    .with_batch("CREATE INDEX [IX_Orders_Date] ON [dbo].[Orders] ([Date])"),
            );
        SnapshotProvider::new(
            ServerSnapshot::new("sql01", "13.0.5026.0")
                .with_database("Sales", vec![orders])
                .with_server_objects(vec![SnapshotObject::new(kinds::JOB, None, "Nightly")]),
        )
    }

    #[tokio::test]
    async fn test_session_lists_and_scripts() {
        let provider = provider();
        let mut session = provider.open_session(&target(Some("Sales"))).await.unwrap();
        assert_eq!(session.server_name(), "sql01");
        assert_eq!(session.server_version(), ServerVersion::new(13, 0, 5026));

        let tables = session.list_objects(&ObjectKind::from(kinds::TABLE)).await.unwrap();
        assert_eq!(tables.len(), 1);

        let children = session.list_children(&tables[0]).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].kind, kinds::INDEX);

        let batches = session.script_object(&children[0], Some(&tables[0])).await.unwrap();
        assert_eq!(batches.len(), 1);

        let views = session.list_objects(&ObjectKind::from(kinds::VIEW)).await.unwrap();
        assert!(views.is_empty());
    }

    #[tokio::test]
    async fn test_server_session_sees_server_objects() {
        let provider = provider();
        let mut session = provider.open_session(&target(None)).await.unwrap();
        let jobs = session.list_objects(&ObjectKind::from(kinds::JOB)).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "Nightly");
    }

    #[tokio::test]
    async fn test_unknown_database_is_connection_error() {
        let provider = provider();
        let err = provider.open_session(&target(Some("Missing"))).await.err().unwrap();
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let provider = provider()
            .with_failure("Sales", InjectedFailure::Connect("refused".to_string()));
        assert!(provider.open_session(&target(Some("Sales"))).await.is_err());

        let provider = provider_with_enumeration_failure();
        let mut session = provider.open_session(&target(Some("Sales"))).await.unwrap();
        assert!(session.list_objects(&ObjectKind::from(kinds::TABLE)).await.is_err());
        assert!(session.list_objects(&ObjectKind::from(kinds::VIEW)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unsupported_object_reports_unsupported_feature() {
        let snapshot = ServerSnapshot::new("sql01", "15.0").with_server_objects(vec![
            SnapshotObject::new(kinds::ENDPOINT, None, "SoapEndpoint").unsupported(),
        ]);
        let provider = SnapshotProvider::new(snapshot);
        let mut session = provider.open_session(&target(None)).await.unwrap();
        let endpoints = session.list_objects(&ObjectKind::from(kinds::ENDPOINT)).await.unwrap();

        let err = session.script_object(&endpoints[0], None).await.unwrap_err();
        assert!(err.is_unsupported());

        let json = r#"{ "kind": "Endpoint", "name": "Soap", "unsupported": true }"#;
        let parsed: SnapshotObject = serde_json::from_str(json).unwrap();
        assert!(parsed.unsupported);
    }

    fn provider_with_enumeration_failure() -> SnapshotProvider {
        provider().with_failure(
            "Sales",
            InjectedFailure::Enumerate {
                kind: ObjectKind::from(kinds::TABLE),
                message: "permission denied".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let json = serde_json::to_string(provider().snapshot()).unwrap();
        std::fs::write(&path, json).unwrap();

        let loaded = SnapshotProvider::from_file(&path).await.unwrap();
        assert_eq!(loaded.snapshot().server_name, "sql01");
        assert_eq!(loaded.snapshot().databases["Sales"][0].children.len(), 1);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(SnapshotProvider::from_file(&path).await.is_err());
    }
}
