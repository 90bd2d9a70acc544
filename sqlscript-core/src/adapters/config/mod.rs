//! Configuration types for providers, extraction and export.
//!
//! This module contains all configuration structures read at startup:
//! - `ConnectionConfig`: Server and database targets
//! - `ExtractionConfig`: Orchestrator settings
//! - `ExportConfig`: Export destination settings
//! - `UnitFailure` / `ExtractionMetadata`: Per-unit results
//!
//! # Security
//! `ConnectionConfig` accepts a password from settings but never serializes
//! or displays it. Sessions receive credentials through the security module.

mod connection;
mod export;
mod extraction;
mod units;

pub use connection::{ConnectionConfig, ServerAddress};
pub use export::ExportConfig;
pub use extraction::ExtractionConfig;
pub use units::{ExtractionMetadata, UnitFailure, UnitTarget};

/// Serde adapter for `Option<Duration>` stored as whole seconds; zero reads
/// as `None`.
pub(crate) mod optional_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        value.map(|d| d.as_secs()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs))
    }
}
