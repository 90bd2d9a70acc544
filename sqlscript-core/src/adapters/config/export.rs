//! Export destination configuration.

use crate::error::ScriptToolError;
use crate::export::FORBIDDEN_CHARACTERS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_path() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_replacement_token() -> String {
    "_".to_string()
}

fn default_export_concurrency() -> usize {
    1
}

/// Where and how script files are written.
///
/// `Patch` and `ClearPatch` are accepted as legacy spellings of `Path` and
/// `ClearPathBeforeWrite` in settings files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportConfig {
    /// Root directory of the export tree
    #[serde(default = "default_path", alias = "Patch")]
    pub path: PathBuf,
    /// Delete files in each target directory before its first write
    #[serde(default, alias = "ClearPatch")]
    pub clear_path_before_write: bool,
    /// Replacement for forbidden filename characters
    #[serde(default = "default_replacement_token")]
    pub replacement_token: String,
    /// Number of records exported at once
    #[serde(default = "default_export_concurrency")]
    pub export_concurrency: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            clear_path_before_write: false,
            replacement_token: default_replacement_token(),
            export_concurrency: default_export_concurrency(),
        }
    }
}

impl ExportConfig {
    /// Creates a config rooted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Sets whether directories are cleared before their first write.
    pub fn with_clear_path_before_write(mut self, clear: bool) -> Self {
        self.clear_path_before_write = clear;
        self
    }

    /// Sets the filename replacement token.
    pub fn with_replacement_token(mut self, token: impl Into<String>) -> Self {
        self.replacement_token = token.into();
        self
    }

    /// Sets the export concurrency.
    pub fn with_export_concurrency(mut self, concurrency: usize) -> Self {
        self.export_concurrency = concurrency.max(1);
        self
    }

    /// Validates export configuration parameters.
    ///
    /// # Errors
    /// Returns error if the path is empty, the concurrency is zero or the
    /// replacement token itself contains a forbidden character.
    pub fn validate(&self) -> crate::Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(ScriptToolError::configuration(
                "export path cannot be empty",
            ));
        }

        if self.export_concurrency == 0 {
            return Err(ScriptToolError::configuration(
                "export_concurrency must be greater than 0",
            ));
        }

        if self
            .replacement_token
            .chars()
            .any(|c| FORBIDDEN_CHARACTERS.contains(&c))
        {
            return Err(ScriptToolError::configuration(format!(
                "replacement token '{}' contains a forbidden filename character",
                self.replacement_token
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_config_default() {
        let config = ExportConfig::default();
        assert_eq!(config.path, PathBuf::from("scripts"));
        assert!(!config.clear_path_before_write);
        assert_eq!(config.replacement_token, "_");
        assert_eq!(config.export_concurrency, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_export_config_validation() {
        assert!(ExportConfig::new("").validate().is_err());

        let config = ExportConfig::new("out").with_replacement_token("|");
        assert!(config.validate().is_err());

        // An empty token simply strips forbidden characters
        let config = ExportConfig::new("out").with_replacement_token("");
        assert!(config.validate().is_ok());

        let config = ExportConfig {
            export_concurrency: 0,
            ..ExportConfig::new("out")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_legacy_aliases() {
        let json = r#"{ "Patch": "C:/export", "ClearPatch": true }"#;
        let config: ExportConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.path, PathBuf::from("C:/export"));
        assert!(config.clear_path_before_write);

        let json = r#"{ "Path": "out", "ClearPathBeforeWrite": true, "ExportConcurrency": 4 }"#;
        let config: ExportConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.path, PathBuf::from("out"));
        assert_eq!(config.export_concurrency, 4);
    }
}
