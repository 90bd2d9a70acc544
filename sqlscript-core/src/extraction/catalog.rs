//! The fixed, version-gated extraction sequence.
//!
//! Extraction is data-driven: each kind is one [`KindDescriptor`], and a
//! unit walks the catalog in order, skipping descriptors whose scope or
//! version gate does not apply.

use crate::models::{ObjectKind, ServerVersion, kinds};
use serde::Serialize;
use std::fmt;

/// Whether a kind lives on the server or inside a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KindScope {
    Server,
    Database,
}

impl fmt::Display for KindScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Database => f.write_str("database"),
        }
    }
}

/// Predicate over the reported server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionGate {
    Always,
    MinMajor(u32),
}

impl VersionGate {
    /// Whether a server at `version` supports the gated kind.
    pub const fn allows(&self, version: &ServerVersion) -> bool {
        match self {
            Self::Always => true,
            Self::MinMajor(min) => version.meets(*min),
        }
    }
}

impl fmt::Display for VersionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("always"),
            Self::MinMajor(min) => write!(f, ">= {}", min),
        }
    }
}

/// One entry of the extraction sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindDescriptor {
    pub kind: ObjectKind,
    pub scope: KindScope,
    pub gate: VersionGate,
    /// Tables and jobs fan out into child objects
    pub has_children: bool,
}

impl KindDescriptor {
    fn new(kind: &str, scope: KindScope, gate: VersionGate) -> Self {
        Self {
            kind: ObjectKind::new(kind),
            scope,
            gate,
            has_children: false,
        }
    }

    fn with_children(mut self) -> Self {
        self.has_children = true;
        self
    }

    /// Whether this descriptor runs for `scope` on a server at `version`.
    pub fn applies_to(&self, scope: KindScope, version: &ServerVersion) -> bool {
        self.scope == scope && self.gate.allows(version)
    }
}

/// Major version that introduced assemblies, partitioning and Service Broker.
pub const SQL_SERVER_2005: u32 = 9;
/// Major version that introduced sequences.
pub const SQL_SERVER_2012: u32 = 11;

/// The extraction sequence, in order.
pub fn kind_catalog() -> Vec<KindDescriptor> {
    use KindScope::{Database, Server};
    use VersionGate::{Always, MinMajor};

    vec![
        KindDescriptor::new(kinds::ENDPOINT, Server, Always),
        KindDescriptor::new(kinds::JOB, Server, Always).with_children(),
        KindDescriptor::new(kinds::SCHEMA, Database, Always),
        KindDescriptor::new(kinds::TABLE, Database, Always).with_children(),
        KindDescriptor::new(kinds::VIEW, Database, Always),
        KindDescriptor::new(kinds::SYNONYM, Database, Always),
        KindDescriptor::new(kinds::STORED_PROCEDURE, Database, Always),
        KindDescriptor::new(kinds::USER_DEFINED_AGGREGATE, Database, Always),
        KindDescriptor::new(kinds::USER_DEFINED_DATA_TYPE, Database, Always),
        KindDescriptor::new(kinds::USER_DEFINED_FUNCTION, Database, Always),
        KindDescriptor::new(kinds::USER_DEFINED_TABLE_TYPE, Database, Always),
        KindDescriptor::new(kinds::USER_DEFINED_TYPE, Database, Always),
        KindDescriptor::new(kinds::ASSEMBLY, Database, MinMajor(SQL_SERVER_2005)),
        KindDescriptor::new(kinds::PARTITION_FUNCTION, Database, MinMajor(SQL_SERVER_2005)),
        KindDescriptor::new(kinds::PARTITION_SCHEME, Database, MinMajor(SQL_SERVER_2005)),
        KindDescriptor::new(kinds::SERVICE_BROKER_MESSAGE_TYPE, Database, MinMajor(SQL_SERVER_2005)),
        KindDescriptor::new(kinds::SERVICE_BROKER_SERVICE_CONTRACT, Database, MinMajor(SQL_SERVER_2005)),
        KindDescriptor::new(kinds::SERVICE_BROKER_QUEUE, Database, MinMajor(SQL_SERVER_2005)),
        KindDescriptor::new(kinds::SERVICE_BROKER_SERVICE, Database, MinMajor(SQL_SERVER_2005)),
        KindDescriptor::new(kinds::SERVICE_BROKER_ROUTE, Database, MinMajor(SQL_SERVER_2005)),
        KindDescriptor::new(kinds::SERVICE_BROKER_REMOTE_BINDING, Database, MinMajor(SQL_SERVER_2005)),
        KindDescriptor::new(kinds::SEQUENCE, Database, MinMajor(SQL_SERVER_2012)),
    ]
}

/// Kinds that are always folded into their parent's body.
pub(crate) fn is_always_inline(child: &crate::models::DatabaseObject) -> bool {
    child.kind == kinds::CHECK || (child.kind == kinds::INDEX && child.is_clustered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database_kinds(major: u32) -> Vec<String> {
        let version = ServerVersion::new(major, 0, 0);
        kind_catalog()
            .into_iter()
            .filter(|d| d.applies_to(KindScope::Database, &version))
            .map(|d| d.kind.to_string())
            .collect()
    }

    #[test]
    fn test_catalog_order_starts_with_server_kinds() {
        let catalog = kind_catalog();
        assert_eq!(catalog.len(), 22);
        assert_eq!(catalog[0].kind, kinds::ENDPOINT);
        assert_eq!(catalog[1].kind, kinds::JOB);
        assert!(catalog[2..].iter().all(|d| d.scope == KindScope::Database));
        assert_eq!(catalog.last().map(|d| d.kind.as_str()), Some(kinds::SEQUENCE));
    }

    #[test]
    fn test_version_gates() {
        let v8 = database_kinds(8);
        assert_eq!(v8.len(), 10);
        assert!(!v8.iter().any(|k| k == kinds::ASSEMBLY));
        assert!(!v8.iter().any(|k| k == kinds::SEQUENCE));

        let v9 = database_kinds(9);
        assert_eq!(v9.len(), 19);
        assert!(v9.iter().any(|k| k == kinds::SERVICE_BROKER_REMOTE_BINDING));
        assert!(!v9.iter().any(|k| k == kinds::SEQUENCE));

        let v11 = database_kinds(11);
        assert_eq!(v11.len(), 20);
        assert!(v11.iter().any(|k| k == kinds::SEQUENCE));
    }

    #[test]
    fn test_gate_display() {
        assert_eq!(VersionGate::Always.to_string(), "always");
        assert_eq!(VersionGate::MinMajor(11).to_string(), ">= 11");
        assert_eq!(KindScope::Server.to_string(), "server");
    }

    #[test]
    fn test_only_tables_and_jobs_have_children() {
        let with_children: Vec<_> = kind_catalog()
            .into_iter()
            .filter(|d| d.has_children)
            .map(|d| d.kind.to_string())
            .collect();
        assert_eq!(with_children, vec![kinds::JOB, kinds::TABLE]);
    }

    #[test]
    fn test_always_inline_children() {
        use crate::models::DatabaseObject;

        let check = DatabaseObject::new(kinds::CHECK, Some("dbo"), "CK_Qty");
        let clustered = DatabaseObject::new(kinds::INDEX, Some("dbo"), "PK_Orders").with_clustered(true);
        let nonclustered = DatabaseObject::new(kinds::INDEX, Some("dbo"), "IX_Date");
        let fk = DatabaseObject::new(kinds::FOREIGN_KEY, Some("dbo"), "FK_Cust");

        assert!(is_always_inline(&check));
        assert!(is_always_inline(&clustered));
        assert!(!is_always_inline(&nonclustered));
        assert!(!is_always_inline(&fk));
    }
}
