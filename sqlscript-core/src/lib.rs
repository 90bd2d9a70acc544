//! Core library for SqlScriptTools.
//!
//! This crate extracts object definitions ("scripts") from a SQL Server and
//! writes each one to its own file under a deterministic, sanitized
//! directory layout.
//!
//! # Security Guarantees
//! - No credentials stored or logged in any data structures
//! - All database operations are read-only
//! - Export paths never leave the configured root directory
//!
//! # Architecture
//! - [`adapters`]: provider traits, the SQL Server and snapshot providers,
//!   configuration types
//! - [`extraction`]: the version-gated kind catalog and the concurrent
//!   orchestrator with per-unit failure isolation
//! - [`export`]: sanitizer, clear-once memo, file and console exporters
//! - [`generator`]: best-effort driver tying extraction to export
//!
//! # Example
//! ```rust,no_run
//! use sqlscript_core::adapters::{ConnectionConfig, ExportConfig, ExtractionConfig, create_provider};
//! use sqlscript_core::export::create_exporter;
//! use sqlscript_core::extraction::Orchestrator;
//! use sqlscript_core::generator::Generator;
//!
//! # async fn example() -> sqlscript_core::Result<()> {
//! let provider = create_provider(None).await?;
//! let exporter = create_exporter(&ExportConfig::new("scripts"), false).await?;
//! let generator = Generator::new(Orchestrator::new(provider, ExtractionConfig::default()), exporter);
//!
//! let outcome = generator
//!     .run(&ConnectionConfig::new("sql01").with_database("Sales"))
//!     .await?;
//! println!("{} record(s) exported", outcome.records_exported);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod error;
pub mod export;
pub mod extraction;
pub mod generator;
pub mod logging;
pub mod models;
pub mod security;
pub mod settings;

// Re-export commonly used types
pub use adapters::{
    ConnectionConfig, ExportConfig, ExtractionConfig, MetadataProvider, ProviderSession,
    SessionTarget,
};
pub use error::{Result, ScriptToolError};
pub use export::{ConsoleExporter, ExportDestinationState, FileExporter, ScriptExporter, sanitize};
pub use extraction::{ExtractionResult, Orchestrator};
pub use generator::{ExportFailure, ExportFailureReason, Generator, RunOutcome};
pub use models::{DatabaseObject, ObjectKind, ScriptLocation, ScriptRecord, ServerVersion};
pub use settings::Settings;
