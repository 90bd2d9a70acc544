//! SQL Server metadata provider.
//!
//! # Module Structure
//! - `connection`: tiberius session setup and server identity
//! - `enumeration`: catalog queries listing objects and their children
//! - `scripting`: kind-to-renderer mapping, tables, types and partitioning
//! - `broker`: Service Broker objects
//! - `agent`: Agent jobs and endpoints
//! - `helpers`: row extraction and identifier quoting
//!
//! # Security Guarantees
//! - All operations are read-only (catalog SELECTs only)
//! - Passwords never appear in error contexts or logs
//! - Session establishment is bounded by the configured connect timeout

mod agent;
mod broker;
mod connection;
mod enumeration;
mod helpers;
mod scripting;


use super::{MetadataProvider, ProviderSession, SessionTarget};
use crate::Result;
use crate::models::{DatabaseObject, ObjectKind, ServerVersion};
use async_trait::async_trait;
use connection::SqlClient;
use tracing::debug;

pub use agent::{
    EndpointDef, JobDef, JobStepDef, ScheduleDef, render_endpoint, render_job,
    render_job_schedule, render_job_step,
};
pub use broker::{
    ContractDef, ContractMessage, MessageTypeDef, QueueActivation, QueueDef, RemoteBindingDef,
    RouteDef, ServiceDef, render_contract, render_message_type, render_queue,
    render_remote_binding, render_route, render_service,
};
pub use scripting::{
    AssemblyDef, ClrBinding, ColumnDef, DataTypeDef, ForeignKeyDef, IndexDef, ParameterDef,
    PartitionFunctionDef, SequenceDef, boundary_literal, format_data_type, hex_literal,
    render_aggregate, render_assembly, render_check, render_clr_type, render_create_schema,
    render_create_table, render_data_type, render_foreign_key, render_index,
    render_partition_function, render_partition_scheme, render_sequence, render_synonym,
    render_table_type,
};

/// Provider that talks to a live SQL Server through tiberius.
///
/// The provider itself is stateless; every session opens its own client.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerProvider;

impl SqlServerProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetadataProvider for SqlServerProvider {
    async fn open_session(&self, target: &SessionTarget) -> Result<Box<dyn ProviderSession>> {
        let mut client = connection::connect(target).await?;
        let (server_name, version) =
            connection::server_identity(&mut client, &target.server).await?;
        debug!(
            "Opened session on {} ({}) for {}",
            server_name,
            version,
            target.database.as_deref().unwrap_or("<server>")
        );

        Ok(Box::new(SqlServerSession {
            client,
            server_name,
            version,
        }))
    }

    fn provider_name(&self) -> &str {
        "mssql"
    }
}

struct SqlServerSession {
    client: SqlClient,
    server_name: String,
    version: ServerVersion,
}

#[async_trait]
impl ProviderSession for SqlServerSession {
    fn server_name(&self) -> &str {
        &self.server_name
    }

    fn server_version(&self) -> ServerVersion {
        self.version
    }

    async fn list_objects(&mut self, kind: &ObjectKind) -> Result<Vec<DatabaseObject>> {
        enumeration::list_objects(&mut self.client, kind).await
    }

    async fn list_children(&mut self, parent: &DatabaseObject) -> Result<Vec<DatabaseObject>> {
        enumeration::list_children(&mut self.client, parent).await
    }

    async fn script_object(
        &mut self,
        object: &DatabaseObject,
        parent: Option<&DatabaseObject>,
    ) -> Result<Vec<String>> {
        scripting::script_object(&mut self.client, self.version, object, parent).await
    }
}
