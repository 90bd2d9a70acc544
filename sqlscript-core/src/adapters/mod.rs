//! Metadata provider traits and factory for object script extraction.
//!
//! A provider knows how to reach a server, enumerate objects of a requested
//! kind and render their definitions. The orchestrator only talks to these
//! traits, so extraction logic is identical for a live SQL Server and for an
//! offline snapshot.
//!
//! # Module Structure
//! - `config`: Configuration types (ConnectionConfig, ExtractionConfig, ExportConfig)
//! - `memory`: Snapshot-backed provider for offline runs and tests
//! - `mssql`: SQL Server provider (feature `mssql`)

use crate::Result;
use crate::models::{DatabaseObject, ObjectKind, ServerVersion};
use crate::security::Credentials;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// Configuration module
pub mod config;

pub mod memory;

#[cfg(feature = "mssql")]
pub mod mssql;

// Re-export configuration types for convenience
pub use config::{
    ConnectionConfig, ExportConfig, ExtractionConfig, ExtractionMetadata, ServerAddress,
    UnitFailure, UnitTarget,
};

/// Everything a provider needs to open one session.
///
/// `database` is `None` for the server-level unit.
#[derive(Debug, Clone)]
pub struct SessionTarget {
    pub server: String,
    pub database: Option<String>,
    pub credentials: Option<Credentials>,
    pub connect_timeout: Duration,
    pub trust_server_certificate: bool,
}

impl SessionTarget {
    /// Builds a target for `database` from the shared connection config.
    pub fn from_config(config: &ConnectionConfig, database: Option<&str>) -> Self {
        Self {
            server: config.server.clone(),
            database: database.map(str::to_string),
            credentials: config.credentials(),
            connect_timeout: config.connect_timeout(),
            trust_server_certificate: config.trust_server_certificate,
        }
    }
}

/// Factory for provider sessions.
///
/// # Object Safety
/// This trait is object-safe; the orchestrator holds it as
/// `Arc<dyn MetadataProvider>` and shares it across units.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Opens a session bound to one database (or to the server).
    ///
    /// Sessions are never shared between units.
    ///
    /// # Errors
    /// Returns a connection error if the server is unreachable or rejects
    /// the login, or a timeout error past `connect_timeout`.
    async fn open_session(&self, target: &SessionTarget) -> Result<Box<dyn ProviderSession>>;

    /// Short provider name for logs.
    fn provider_name(&self) -> &str;
}

/// A live session used by a single extraction unit.
#[async_trait]
pub trait ProviderSession: Send {
    /// Network name of the server, used as the first export path segment.
    fn server_name(&self) -> &str;

    /// Version reported by the server.
    fn server_version(&self) -> ServerVersion;

    /// Enumerates objects of `kind`, system objects included.
    ///
    /// # Errors
    /// Returns error if the catalog query fails.
    async fn list_objects(&mut self, kind: &ObjectKind) -> Result<Vec<DatabaseObject>>;

    /// Enumerates sub-objects of a table or job.
    ///
    /// # Errors
    /// Returns error if the catalog query fails.
    async fn list_children(&mut self, parent: &DatabaseObject) -> Result<Vec<DatabaseObject>>;

    /// Renders the definition of `object` as script batches.
    ///
    /// `parent` is set when `object` came from [`list_children`]. An empty
    /// vector is a valid answer.
    ///
    /// [`list_children`]: ProviderSession::list_children
    ///
    /// # Errors
    /// Returns error if the definition cannot be read.
    async fn script_object(
        &mut self,
        object: &DatabaseObject,
        parent: Option<&DatabaseObject>,
    ) -> Result<Vec<String>>;
}

/// Joins script batches into one body, each batch followed by a `GO`
/// terminator line and a blank line. No batches yields an empty body.
///
/// # Example
/// ```rust
/// use sqlscript_core::adapters::render_body;
///
/// let body = render_body(&["CREATE SCHEMA [sales]".to_string()]);
/// assert_eq!(body, "CREATE SCHEMA [sales]\nGO\n\n");
/// assert_eq!(render_body(&[]), "");
/// ```
pub fn render_body(batches: &[String]) -> String {
    let mut body = String::with_capacity(batches.iter().map(|b| b.len().saturating_add(5)).sum());
    for batch in batches {
        body.push_str(batch);
        body.push('\n');
        body.push_str("GO\n\n");
    }
    body
}

/// Creates the provider for a run.
///
/// A snapshot path selects the offline [`memory::SnapshotProvider`];
/// otherwise the SQL Server provider is used when compiled in.
///
/// # Errors
/// Returns error if the snapshot cannot be loaded or no live provider is
/// available in this build.
pub async fn create_provider(snapshot: Option<&Path>) -> Result<Arc<dyn MetadataProvider>> {
    if let Some(path) = snapshot {
        let provider = memory::SnapshotProvider::from_file(path).await?;
        return Ok(Arc::new(provider));
    }

    #[cfg(feature = "mssql")]
    {
        Ok(Arc::new(mssql::SqlServerProvider::new()))
    }
    #[cfg(not(feature = "mssql"))]
    {
        Err(crate::error::ScriptToolError::unsupported_feature(
            "SQL Server provider",
            "Compile with --features mssql to enable SQL Server support",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_body_terminates_each_batch() {
        let batches = vec![
            "CREATE TABLE [dbo].[T] ([Id] int NOT NULL)".to_string(),
            "ALTER TABLE [dbo].[T] ADD CONSTRAINT [PK_T] PRIMARY KEY ([Id])".to_string(),
        ];
        assert_eq!(
            render_body(&batches),
            "CREATE TABLE [dbo].[T] ([Id] int NOT NULL)\nGO\n\n\
             ALTER TABLE [dbo].[T] ADD CONSTRAINT [PK_T] PRIMARY KEY ([Id])\nGO\n\n"
        );
    }

    #[test]
    fn test_render_body_empty() {
        assert_eq!(render_body(&[]), "");
    }

    #[test]
    fn test_session_target_from_config() {
        let config = ConnectionConfig::new("sql01")
            .with_databases(vec!["Sales".to_string()])
            .with_login("reader", Some("secret".to_string()));

        let target = SessionTarget::from_config(&config, Some("Sales"));
        assert_eq!(target.server, "sql01");
        assert_eq!(target.database.as_deref(), Some("Sales"));
        assert_eq!(target.credentials.as_ref().map(|c| c.login()), Some("reader"));
        assert_eq!(target.connect_timeout, Duration::from_secs(30));
        assert!(!format!("{:?}", target).contains("secret"));

        let server = SessionTarget::from_config(&config, None);
        assert!(server.database.is_none());
    }

    #[tokio::test]
    async fn test_create_provider_missing_snapshot() {
        let result = create_provider(Some(Path::new("/nonexistent/snapshot.json"))).await;
        assert!(result.is_err());
    }
}
