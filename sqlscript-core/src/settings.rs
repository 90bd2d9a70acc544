//! Settings file loading.
//!
//! Settings live in a JSON document with one section per concern:
//!
//! ```json
//! {
//!   "ConnectionInfo": { "Server": "sql01", "Databases": ["Sales"], "Login": "reader" },
//!   "ExportInfo": { "Path": "scripts", "ClearPathBeforeWrite": true },
//!   "Extraction": { "MaxConcurrency": 4 }
//! }
//! ```
//!
//! Missing sections and keys take their defaults. Command-line overrides
//! are applied by the caller after loading.

use crate::Result;
use crate::adapters::{ConnectionConfig, ExportConfig, ExtractionConfig};
use crate::error::ScriptToolError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Settings file looked up when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

/// Everything a run needs, as read from the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    pub connection_info: ConnectionConfig,
    pub export_info: ExportConfig,
    pub extraction: ExtractionConfig,
}

impl Settings {
    /// Parses settings from a JSON string.
    ///
    /// # Errors
    /// Returns a serialization error for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ScriptToolError::Serialization {
            context: "Failed to parse settings".to_string(),
            source: e,
        })
    }

    /// Loads settings from `path`.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read, or a serialization
    /// error if it is not valid settings JSON.
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            ScriptToolError::io(format!("Failed to read settings {}", path.display()), e)
        })?;
        debug!("Loaded settings from {}", path.display());
        Self::from_json(&json)
    }

    /// Loads settings from `path` when it exists, defaults otherwise.
    ///
    /// # Errors
    /// Returns error if an existing file cannot be read or parsed.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        match tokio::fs::try_exists(path).await {
            Ok(true) => Self::load(path).await,
            Ok(false) => {
                debug!("No settings file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ScriptToolError::io(
                format!("Failed to check settings {}", path.display()),
                e,
            )),
        }
    }

    /// Validates every section.
    ///
    /// # Errors
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<()> {
        self.connection_info.validate()?;
        self.export_info.validate()?;
        self.extraction.validate()
    }
}
