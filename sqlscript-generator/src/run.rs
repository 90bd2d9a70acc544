//! Command handlers wiring settings to the core library.

use anyhow::Context;
use sqlscript_core::adapters::create_provider;
use sqlscript_core::export::create_exporter;
use sqlscript_core::extraction::{Orchestrator, ServerIdentity};
use sqlscript_core::generator::Generator;
use sqlscript_core::settings::Settings;
use sqlscript_core::RunOutcome;
use std::path::Path;
use tracing::info;

/// Extracts and exports everything described by `settings`.
///
/// # Errors
/// Returns error if the settings are invalid or the provider or exporter
/// cannot be set up. Unit and record failures are reported in the outcome.
pub async fn run_generator(
    settings: &Settings,
    snapshot: Option<&Path>,
    console: bool,
) -> anyhow::Result<RunOutcome> {
    settings.validate().context("Invalid settings")?;

    info!("Target: {}", settings.connection_info);
    if console {
        info!("Output: console");
    } else {
        info!("Output: {}", settings.export_info.path.display());
    }

    let provider = create_provider(snapshot)
        .await
        .context("Failed to create metadata provider")?;
    let exporter = create_exporter(&settings.export_info, console)
        .await
        .context("Failed to prepare export destination")?;

    let orchestrator = Orchestrator::new(provider, settings.extraction.clone());
    let generator = Generator::new(orchestrator, exporter)
        .with_export_concurrency(settings.export_info.export_concurrency);

    generator
        .run(&settings.connection_info)
        .await
        .context("Script generation failed")
}

/// Opens one session against the configured target.
///
/// # Errors
/// Returns error if the settings are invalid or the session cannot be opened.
pub async fn test_connection(
    settings: &Settings,
    snapshot: Option<&Path>,
) -> anyhow::Result<ServerIdentity> {
    settings
        .connection_info
        .validate()
        .context("Invalid connection settings")?;

    let provider = create_provider(snapshot)
        .await
        .context("Failed to create metadata provider")?;
    let orchestrator = Orchestrator::new(provider, settings.extraction.clone());

    orchestrator
        .identify(&settings.connection_info)
        .await
        .context("Connection test failed")
}
