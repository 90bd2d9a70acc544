//! Error types for extraction and export.
//!
//! Error messages never carry passwords or login secrets. Provider errors are
//! boxed as sources so the originating driver error stays inspectable without
//! leaking the connection details that produced it.

use thiserror::Error;

/// Main error type for SqlScriptTools operations.
#[derive(Debug, Error)]
pub enum ScriptToolError {
    /// Opening a provider session failed (credentials sanitized)
    #[error("Database connection failed: {context}")]
    Connection {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Enumerating or scripting objects failed
    #[error("Script collection failed: {context}")]
    Collection {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Query execution failure without an underlying driver error
    #[error("Query execution failed: {context}")]
    QueryExecution { context: String },

    /// Unsupported provider feature or operation
    #[error("Unsupported operation: {feature} not supported by {provider}")]
    UnsupportedFeature { feature: String, provider: String },

    /// An operation exceeded its deadline
    #[error("Operation timed out after {seconds}s: {context}")]
    Timeout { context: String, seconds: u64 },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed
    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results with ScriptToolError
pub type Result<T> = std::result::Result<T, ScriptToolError>;

impl ScriptToolError {
    /// Creates a connection error with sanitized context
    pub fn connection_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a collection error with context
    pub fn collection_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Collection {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a query execution error
    pub fn query_failed(context: impl Into<String>) -> Self {
        Self::QueryExecution {
            context: context.into(),
        }
    }

    /// Creates an unsupported feature error
    pub fn unsupported_feature(feature: impl Into<String>, provider: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
            provider: provider.into(),
        }
    }

    /// Creates a timeout error
    pub fn timeout(context: impl Into<String>, duration: std::time::Duration) -> Self {
        Self::Timeout {
            context: context.into(),
            seconds: duration.as_secs(),
        }
    }

    /// Creates an I/O error with the path or operation as context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the error happened while establishing a session.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// Whether the provider cannot handle the requested object at all.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedFeature { .. })
    }

    /// Whether the error is fatal for a whole run.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = ScriptToolError::configuration("server cannot be empty");
        assert!(error.to_string().contains("server cannot be empty"));
        assert!(error.is_configuration_error());

        let error = ScriptToolError::unsupported_feature("Endpoint scripting", "snapshot");
        assert!(error.to_string().contains("Endpoint scripting"));
        assert!(error.to_string().contains("snapshot"));
        assert!(error.is_unsupported());
        assert!(!ScriptToolError::query_failed("sys.types").is_unsupported());
    }

    #[test]
    fn test_connection_classification() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error = ScriptToolError::connection_failed("Failed to reach sql01", io);
        assert!(error.is_connection_error());
        assert!(!error.is_configuration_error());

        let error =
            ScriptToolError::timeout("Extraction of Sales", std::time::Duration::from_secs(30));
        assert!(error.is_connection_error());
        assert!(error.to_string().contains("30s"));

        let error = ScriptToolError::query_failed("sys.tables");
        assert!(!error.is_connection_error());
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = ScriptToolError::io("Failed to write out/Table/dbo.Orders.sql", io);
        assert!(error.to_string().contains("dbo.Orders.sql"));
        assert!(error.source().is_some());
    }
}
