//! Per-unit result types shared by the orchestrator and the generator.
//!
//! A unit is one database (or the server-level pass). Units fail
//! independently; these types carry what happened to each of them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which part of the server a unit of work covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "database", rename_all = "snake_case")]
pub enum UnitTarget {
    /// Server-level kinds, extracted once per run
    Server,
    /// One configured database
    Database(String),
}

impl UnitTarget {
    /// Database name when the unit targets a database.
    pub fn database_name(&self) -> Option<&str> {
        match self {
            Self::Server => None,
            Self::Database(name) => Some(name),
        }
    }
}

impl fmt::Display for UnitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("<server>"),
            Self::Database(name) => f.write_str(name),
        }
    }
}

/// Information about a failed extraction unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitFailure {
    /// The unit that failed
    pub target: UnitTarget,

    /// Error message describing the failure
    pub error_message: String,

    /// Whether the session could not be established (connection or timeout)
    /// as opposed to a failure while enumerating or scripting
    pub is_connection_error: bool,
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.error_message)
    }
}

/// Metadata about one orchestration pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    /// When extraction started
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Total extraction duration (in milliseconds)
    pub total_duration_ms: u64,

    /// Number of units launched, including the server unit
    pub units_attempted: usize,

    /// Number of units that contributed records
    pub units_succeeded: usize,

    /// Number of units that failed
    pub units_failed: usize,

    /// Objects left out because the provider cannot script their kind
    pub objects_skipped: usize,

    /// Maximum concurrency used
    pub max_concurrency: usize,

    /// Extractor version
    pub extractor_version: String,

    /// Any warnings generated during extraction
    pub warnings: Vec<String>,
}

impl ExtractionMetadata {
    /// Starts a metadata block for `units_attempted` units.
    pub fn begin(units_attempted: usize, max_concurrency: usize) -> Self {
        Self {
            started_at: chrono::Utc::now(),
            total_duration_ms: 0,
            units_attempted,
            units_succeeded: 0,
            units_failed: 0,
            objects_skipped: 0,
            max_concurrency,
            extractor_version: env!("CARGO_PKG_VERSION").to_string(),
            warnings: Vec::new(),
        }
    }
}
