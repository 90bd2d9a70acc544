//! Extraction configuration.

use crate::error::ScriptToolError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_max_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_excluded_schemas() -> Vec<String> {
    vec!["sys".to_string(), "information_schema".to_string()]
}

/// Configuration for the extraction orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtractionConfig {
    /// Maximum number of extraction units running at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Emit indexes, foreign keys, triggers and job children as their own
    /// records instead of folding them into the parent body
    #[serde(default = "default_true")]
    pub emit_child_objects_separately: bool,
    /// Schemas whose objects are never extracted (case-insensitive)
    #[serde(default = "default_excluded_schemas")]
    pub excluded_schemas: Vec<String>,
    /// Run the server unit for endpoints and agent jobs
    #[serde(default = "default_true")]
    pub include_server_objects: bool,
    /// Deadline for a single unit; `None` waits indefinitely
    #[serde(
        default,
        rename = "UnitTimeoutSecs",
        with = "super::optional_secs"
    )]
    pub unit_timeout: Option<Duration>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            emit_child_objects_separately: true,
            excluded_schemas: default_excluded_schemas(),
            include_server_objects: true,
            unit_timeout: None,
        }
    }
}

impl ExtractionConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum unit concurrency.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1); // Ensure at least 1
        self
    }

    /// Sets whether child objects become separate records.
    pub fn with_emit_child_objects_separately(mut self, separately: bool) -> Self {
        self.emit_child_objects_separately = separately;
        self
    }

    /// Replaces the excluded schema list.
    pub fn with_excluded_schemas(mut self, schemas: Vec<String>) -> Self {
        self.excluded_schemas = schemas;
        self
    }

    /// Sets whether server-level kinds are extracted.
    pub fn with_include_server_objects(mut self, include: bool) -> Self {
        self.include_server_objects = include;
        self
    }

    /// Sets the per-unit deadline.
    pub fn with_unit_timeout(mut self, timeout: Duration) -> Self {
        self.unit_timeout = Some(timeout);
        self
    }

    /// Whether objects in `schema` are filtered out.
    pub fn is_schema_excluded(&self, schema: &str) -> bool {
        self.excluded_schemas
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(schema))
    }

    /// Validates extraction configuration parameters.
    ///
    /// # Errors
    /// Returns error if concurrency or the unit timeout is zero.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_concurrency == 0 {
            return Err(ScriptToolError::configuration(
                "max_concurrency must be greater than 0",
            ));
        }

        if self.unit_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ScriptToolError::configuration(
                "unit_timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}
