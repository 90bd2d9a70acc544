//! SQL Server object script generator.
//!
//! This binary extracts the definition of every object on a server (or a
//! configured set of databases) and writes each one to its own file.
//!
//! # Security Guarantees
//! - Read-only database operations only
//! - No credentials stored or logged
//! - Export paths never leave the configured output directory

use clap::Parser;
use sqlscript_core::extraction::kind_catalog;
use sqlscript_core::logging::init_logging;
use sqlscript_generator::output::{format_kinds, format_identity, format_summary};
use sqlscript_generator::run::{run_generator, test_connection};
use sqlscript_generator::{
    Cli, Command, EXIT_FATAL, EXIT_OK, exit_code, prompt_password_if_requested, resolve_settings,
};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(
        cli.global.verbose,
        cli.global.quiet,
        cli.global.log_format.into(),
    ) {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_FATAL);
    }

    match execute(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn execute(cli: &Cli) -> anyhow::Result<u8> {
    let command = cli.selected_command();
    if command == Command::Kinds {
        print!("{}", format_kinds(&kind_catalog()));
        return Ok(EXIT_OK);
    }

    let mut settings = resolve_settings(&cli.overrides).await?;
    prompt_password_if_requested(&mut settings, &cli.overrides)?;
    let snapshot = cli.overrides.snapshot.as_deref();

    match command {
        Command::Test => {
            info!("Testing connection...");
            let identity = test_connection(&settings, snapshot).await?;
            print!("{}", format_identity(&identity));
            Ok(EXIT_OK)
        }
        Command::Run | Command::Kinds => {
            let console = cli.overrides.console;
            let outcome = run_generator(&settings, snapshot, console).await?;
            let destination = (!console).then_some(settings.export_info.path.as_path());
            if !cli.global.quiet {
                print!("{}", format_summary(&outcome, destination));
            }
            Ok(exit_code(&outcome, cli.overrides.strict))
        }
    }
}
