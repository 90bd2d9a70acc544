//! Core data models for extracted object scripts.
//!
//! A [`ScriptRecord`] is the normalized unit flowing from extraction to
//! export: it is built once by the orchestrator, handed to an exporter by
//! shared reference and dropped afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a database object.
///
/// This is an open tag rather than a closed enum: providers may surface
/// kinds this crate has no constant for, and those flow through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKind(String);

impl ObjectKind {
    /// Creates a kind from any tag.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Returns the tag as written to the export path.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl PartialEq<str> for ObjectKind {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ObjectKind {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Tags for the object kinds known to the extraction catalog.
pub mod kinds {
    // Server level
    pub const ENDPOINT: &str = "Endpoint";
    pub const JOB: &str = "Job";
    pub const JOB_STEP: &str = "JobStep";
    pub const JOB_SCHEDULE: &str = "JobSchedule";

    // Database level
    pub const SCHEMA: &str = "Schema";
    pub const TABLE: &str = "Table";
    pub const VIEW: &str = "View";
    pub const SYNONYM: &str = "Synonym";
    pub const STORED_PROCEDURE: &str = "StoredProcedure";
    pub const USER_DEFINED_AGGREGATE: &str = "UserDefinedAggregate";
    pub const USER_DEFINED_DATA_TYPE: &str = "UserDefinedDataType";
    pub const USER_DEFINED_FUNCTION: &str = "UserDefinedFunction";
    pub const USER_DEFINED_TABLE_TYPE: &str = "UserDefinedTableType";
    pub const USER_DEFINED_TYPE: &str = "UserDefinedType";
    pub const ASSEMBLY: &str = "Assembly";
    pub const PARTITION_FUNCTION: &str = "PartitionFunction";
    pub const PARTITION_SCHEME: &str = "PartitionScheme";
    pub const SERVICE_BROKER_MESSAGE_TYPE: &str = "ServiceBrokerMessageType";
    pub const SERVICE_BROKER_SERVICE_CONTRACT: &str = "ServiceBrokerServiceContract";
    pub const SERVICE_BROKER_QUEUE: &str = "ServiceBrokerQueue";
    pub const SERVICE_BROKER_SERVICE: &str = "ServiceBrokerService";
    pub const SERVICE_BROKER_ROUTE: &str = "ServiceBrokerRoute";
    pub const SERVICE_BROKER_REMOTE_BINDING: &str = "ServiceBrokerRemoteBinding";
    pub const SEQUENCE: &str = "Sequence";

    // Table children
    pub const INDEX: &str = "Index";
    pub const FOREIGN_KEY: &str = "ForeignKey";
    pub const TRIGGER: &str = "Trigger";
    pub const CHECK: &str = "Check";
}

/// Where a script came from.
///
/// `database_name` is `None` for server-level objects such as endpoints and
/// agent jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptLocation {
    pub server_name: String,
    pub database_name: Option<String>,
}

impl ScriptLocation {
    /// Location of a server-level object.
    pub fn server(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            database_name: None,
        }
    }

    /// Location of an object inside a database.
    pub fn database(server_name: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            database_name: Some(database_name.into()),
        }
    }

    /// Database segment of the export path, empty for server-level objects.
    pub fn database_segment(&self) -> &str {
        self.database_name.as_deref().unwrap_or("")
    }
}

impl fmt::Display for ScriptLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.database_name {
            Some(db) => write!(f, "{}/{}", self.server_name, db),
            None => f.write_str(&self.server_name),
        }
    }
}

/// One object's definition plus the metadata needed to place it on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub location: ScriptLocation,
    pub kind: ObjectKind,
    /// Owning schema; for separately emitted child objects this holds
    /// `"<parentSchema>.<parentName>"`.
    pub schema: Option<String>,
    pub name: String,
    /// Script text, possibly empty.
    pub body: String,
}

impl ScriptRecord {
    /// Creates a record, normalizing an empty schema to `None`.
    pub fn new(
        location: ScriptLocation,
        kind: impl Into<ObjectKind>,
        schema: Option<String>,
        name: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            location,
            kind: kind.into(),
            schema: schema.filter(|s| !s.is_empty()),
            name: name.into(),
            body: body.into(),
        }
    }

    /// `schema.name` when a schema is present, otherwise `name`.
    ///
    /// The stem is not sanitized here; exporters decide how to make it
    /// filesystem-safe.
    pub fn file_stem(&self) -> String {
        match self.schema.as_deref() {
            Some(schema) if !schema.is_empty() => format!("{}.{}", schema, self.name),
            _ => self.name.clone(),
        }
    }

    /// Checks the record invariants.
    ///
    /// # Errors
    /// Returns a configuration error when the name or kind is empty.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return Err(crate::error::ScriptToolError::configuration(format!(
                "{} record at {} has an empty name",
                self.kind, self.location
            )));
        }
        if self.kind.as_str().is_empty() {
            return Err(crate::error::ScriptToolError::configuration(format!(
                "record '{}' at {} has an empty kind",
                self.name, self.location
            )));
        }
        Ok(())
    }
}

/// Server version as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
}

impl ServerVersion {
    /// Creates a version from its parts.
    pub const fn new(major: u32, minor: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            build,
        }
    }

    /// Parses `"15.0.2000.5"`-style version strings. Missing trailing parts
    /// default to zero; anything after the build number is ignored.
    ///
    /// # Errors
    /// Returns a configuration error if the major part is not numeric.
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let mut parts = raw.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .ok_or_else(|| {
                crate::error::ScriptToolError::configuration(format!(
                    "Unrecognized server version '{}'",
                    raw
                ))
            })?;
        let mut next = || parts.next().and_then(|p| p.trim().parse::<u32>().ok()).unwrap_or(0);
        let minor = next();
        let build = next();
        Ok(Self::new(major, minor, build))
    }

    /// Whether the major version is at least `min_major`.
    pub const fn meets(&self, min_major: u32) -> bool {
        self.major >= min_major
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Provider-private identity used to look an object up again when scripting it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectHandle {
    Numeric(i64),
    Text(String),
}

/// An object as enumerated by a provider, before it is scripted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseObject {
    pub kind: ObjectKind,
    #[serde(default)]
    pub schema: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_system_object: bool,
    /// Only meaningful for indexes.
    #[serde(default)]
    pub is_clustered: bool,
    #[serde(default)]
    pub handle: Option<ObjectHandle>,
}

impl DatabaseObject {
    /// Creates a user object with no handle.
    pub fn new(kind: impl Into<ObjectKind>, schema: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            schema: schema.filter(|s| !s.is_empty()).map(str::to_string),
            name: name.into(),
            is_system_object: false,
            is_clustered: false,
            handle: None,
        }
    }

    /// Builder method to attach a provider handle.
    pub fn with_handle(mut self, handle: ObjectHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Builder method to flag a system-owned object.
    pub fn with_system_object(mut self, is_system_object: bool) -> Self {
        self.is_system_object = is_system_object;
        self
    }

    /// Builder method to flag a clustered index.
    pub fn with_clustered(mut self, is_clustered: bool) -> Self {
        self.is_clustered = is_clustered;
        self
    }

    /// `schema.name`, or `name` for schema-less objects.
    pub fn qualified_name(&self) -> String {
        match self.schema.as_deref() {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> ScriptRecord {
        ScriptRecord::new(
            ScriptLocation::database("S", "D"),
            kinds::TABLE,
            Some("dbo".to_string()),
            "Orders",
            "CREATE TABLE [dbo].[Orders] (...)",
        )
    }

    #[test]
    fn test_file_stem_with_schema() {
        assert_eq!(orders().file_stem(), "dbo.Orders");
    }

    #[test]
    fn test_file_stem_without_schema() {
        let record = ScriptRecord::new(
            ScriptLocation::server("S"),
            "Login",
            None,
            "Login1",
            "",
        );
        assert_eq!(record.file_stem(), "Login1");

        // Empty schema strings are normalized away rather than producing ".Login1"
        let record = ScriptRecord::new(
            ScriptLocation::server("S"),
            "Login",
            Some(String::new()),
            "Login1",
            "",
        );
        assert_eq!(record.schema, None);
        assert_eq!(record.file_stem(), "Login1");
    }

    #[test]
    fn test_record_validation() {
        assert!(orders().validate().is_ok());

        let mut nameless = orders();
        nameless.name.clear();
        assert!(nameless.validate().is_err());

        let mut kindless = orders();
        kindless.kind = ObjectKind::new("");
        assert!(kindless.validate().is_err());
    }

    #[test]
    fn test_location_display_and_segment() {
        let db = ScriptLocation::database("sql01", "Sales");
        assert_eq!(db.to_string(), "sql01/Sales");
        assert_eq!(db.database_segment(), "Sales");

        let server = ScriptLocation::server("sql01");
        assert_eq!(server.to_string(), "sql01");
        assert_eq!(server.database_segment(), "");
    }

    #[test]
    fn test_server_version_parse() {
        assert_eq!(
            ServerVersion::parse("15.0.2000.5").unwrap(),
            ServerVersion::new(15, 0, 2000)
        );
        assert_eq!(ServerVersion::parse("9").unwrap(), ServerVersion::new(9, 0, 0));
        assert_eq!(
            ServerVersion::parse(" 11.2 ").unwrap(),
            ServerVersion::new(11, 2, 0)
        );
        assert!(ServerVersion::parse("").is_err());
        assert!(ServerVersion::parse("Microsoft SQL Server").is_err());
    }

    #[test]
    fn test_server_version_meets() {
        let v9 = ServerVersion::new(9, 0, 0);
        assert!(v9.meets(9));
        assert!(!v9.meets(11));
        assert!(ServerVersion::new(16, 0, 0).meets(11));
    }

    #[test]
    fn test_object_kind_is_open() {
        let custom = ObjectKind::new("ExternalDataSource");
        assert_eq!(custom.as_str(), "ExternalDataSource");
        assert_eq!(custom, "ExternalDataSource");
        assert_eq!(ObjectKind::from(kinds::VIEW).to_string(), "View");
    }

    #[test]
    fn test_database_object_qualified_name() {
        let table = DatabaseObject::new(kinds::TABLE, Some("dbo"), "Orders");
        assert_eq!(table.qualified_name(), "dbo.Orders");

        let route = DatabaseObject::new(kinds::SERVICE_BROKER_ROUTE, None, "AutoCreatedLocal");
        assert_eq!(route.qualified_name(), "AutoCreatedLocal");

        let blank = DatabaseObject::new(kinds::ASSEMBLY, Some(""), "Utils");
        assert_eq!(blank.schema, None);
    }

    #[test]
    fn test_record_serialization() {
        let json = serde_json::to_string(&orders()).unwrap();
        assert!(json.contains("\"kind\":\"Table\""));
        assert!(json.contains("\"database_name\":\"D\""));

        let back: ScriptRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, orders());
    }
}
