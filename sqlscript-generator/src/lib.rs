//! Library module for sqlscript-generator
//!
//! This module exposes the command-line surface and settings resolution for
//! testing purposes. The main binary functionality is in main.rs.

pub mod output;
pub mod run;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlscript_core::logging::LogFormat;
use sqlscript_core::settings::{DEFAULT_SETTINGS_FILE, Settings};
use std::path::PathBuf;

/// Process exit code after a completed run.
pub const EXIT_OK: u8 = 0;
/// Process exit code for configuration and startup errors.
pub const EXIT_FATAL: u8 = 1;
/// Process exit code when `--strict` is set and something failed.
pub const EXIT_PARTIAL: u8 = 2;

/// Environment variable holding the login password.
pub const PASSWORD_ENV: &str = "SQLSCRIPT_PASSWORD";

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "sqlscript-generator")]
#[command(about = "Extract SQL Server object scripts into one file per object")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "
SqlScriptTools Generator - object script extraction

Connects to a SQL Server, extracts the definition of every table, view,
procedure, function, type, schema, synonym, assembly, partitioning and
Service Broker object, agent job and endpoint, and writes each one to

  <output>/<server>/<database>/<kind>/<schema.name>.sql

Databases are extracted concurrently; one failing database never stops the
others.

EXAMPLES:
  sqlscript-generator --server sql01 --database Sales --output scripts
  sqlscript-generator --config appsettings.json --clear
  sqlscript-generator --server sql01 --database Sales --login reader --prompt-password
  sqlscript-generator test --server sql01 --database Sales
  sqlscript-generator kinds
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Extract and export every object (default)
    Run,
    /// Open one session and print the server name and version
    Test,
    /// List the extraction sequence with scopes and version gates
    Kinds,
}

/// Log line format selectable on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[default]
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// Log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}

/// Values that override the settings file.
#[derive(Debug, Default, Args)]
pub struct OverrideArgs {
    /// Settings file
    #[arg(
        long,
        global = true,
        env = "SQLSCRIPT_CONFIG",
        value_name = "FILE",
        help = "Settings file (default: appsettings.json when present)"
    )]
    pub config: Option<PathBuf>,

    /// Server name
    #[arg(long, global = true, help = "Server: host, host,port or host\\instance")]
    pub server: Option<String>,

    /// Target databases
    #[arg(
        long = "database",
        global = true,
        value_name = "NAME",
        value_delimiter = ',',
        help = "Database to extract (repeatable or comma-separated)"
    )]
    pub databases: Vec<String>,

    /// SQL login
    #[arg(long, global = true, help = "SQL login (driver-default auth when omitted)")]
    pub login: Option<String>,

    /// Password for the SQL login
    #[arg(
        long,
        global = true,
        env = PASSWORD_ENV,
        hide_env_values = true,
        help = "Password for --login"
    )]
    pub password: Option<String>,

    /// Prompt for the password
    #[arg(long, global = true, help = "Prompt for the password without echo")]
    pub prompt_password: bool,

    /// Export root
    #[arg(short, long, global = true, value_name = "DIR", help = "Export root directory")]
    pub output: Option<PathBuf>,

    /// Clear export directories before their first write
    #[arg(long, global = true, help = "Delete existing files in each target directory before writing")]
    pub clear: bool,

    /// Print scripts instead of writing files
    #[arg(long, global = true, help = "Print scripts to stdout instead of writing files")]
    pub console: bool,

    /// Offline snapshot
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Read objects from a JSON snapshot instead of a live server"
    )]
    pub snapshot: Option<PathBuf>,

    /// Fold child objects into their parent
    #[arg(long, global = true, help = "Fold indexes, foreign keys and triggers into the table script")]
    pub inline_children: bool,

    /// Database concurrency
    #[arg(long, global = true, help = "Maximum databases extracted at once")]
    pub max_concurrency: Option<usize>,

    /// Export concurrency
    #[arg(long, global = true, help = "Maximum files written at once")]
    pub export_concurrency: Option<usize>,

    /// Fail the exit code on partial success
    #[arg(long, global = true, help = "Exit with code 2 if any database or object failed")]
    pub strict: bool,
}

impl Cli {
    /// The command to run, `run` when none was given.
    pub fn selected_command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

/// Settings file to read: the explicit one, or the default if it exists.
fn settings_path(overrides: &OverrideArgs) -> (PathBuf, bool) {
    match &overrides.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
    }
}

/// Loads the settings file and applies command-line overrides.
///
/// An explicitly named settings file must exist; the default one is
/// optional. The result is not validated.
///
/// # Errors
/// Returns error if the settings file cannot be read or parsed.
pub async fn resolve_settings(overrides: &OverrideArgs) -> anyhow::Result<Settings> {
    let (path, explicit) = settings_path(overrides);
    let mut settings = if explicit {
        Settings::load(&path).await
    } else {
        Settings::load_or_default(&path).await
    }
    .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    apply_overrides(&mut settings, overrides);
    Ok(settings)
}

/// Applies command-line values on top of file settings.
pub fn apply_overrides(settings: &mut Settings, overrides: &OverrideArgs) {
    let connection = &mut settings.connection_info;
    if let Some(server) = &overrides.server {
        connection.server = server.clone();
    }
    if !overrides.databases.is_empty() {
        connection.databases = overrides.databases.clone();
    }
    if let Some(login) = &overrides.login {
        connection.login = Some(login.clone());
    }
    if let Some(password) = &overrides.password {
        connection.password = Some(password.clone());
    }

    let export = &mut settings.export_info;
    if let Some(output) = &overrides.output {
        export.path = output.clone();
    }
    if overrides.clear {
        export.clear_path_before_write = true;
    }
    if let Some(concurrency) = overrides.export_concurrency {
        export.export_concurrency = concurrency;
    }

    let extraction = &mut settings.extraction;
    if overrides.inline_children {
        extraction.emit_child_objects_separately = false;
    }
    if let Some(concurrency) = overrides.max_concurrency {
        extraction.max_concurrency = concurrency;
    }
}

/// Reads the password interactively when asked to.
///
/// # Errors
/// Returns error if the terminal cannot be read.
pub fn prompt_password_if_requested(
    settings: &mut Settings,
    overrides: &OverrideArgs,
) -> anyhow::Result<()> {
    if !overrides.prompt_password {
        return Ok(());
    }
    let login = settings.connection_info.login.as_deref().unwrap_or("login");
    let password = rpassword::prompt_password(format!("Password for {}: ", login))
        .context("Failed to read password")?;
    settings.connection_info.password = Some(password);
    Ok(())
}

/// Exit code for a finished run.
pub fn exit_code(outcome: &sqlscript_core::RunOutcome, strict: bool) -> u8 {
    if strict && !outcome.is_complete_success() {
        EXIT_PARTIAL
    } else {
        EXIT_OK
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sqlscript_core::RunOutcome;

    /// Test helper functions
    mod helpers {
        use super::*;
        use tempfile::NamedTempFile;

        /// Create a temporary settings file
        pub(super) fn settings_file(json: &str) -> NamedTempFile {
            let temp_file = NamedTempFile::new().unwrap();
            std::fs::write(&temp_file, json).unwrap();
            temp_file
        }

        /// Parse arguments with the password and config variables cleared
        pub(super) fn parse(args: &[&str]) -> Cli {
            temp_env::with_vars_unset([PASSWORD_ENV, "SQLSCRIPT_CONFIG"], || {
                Cli::try_parse_from(args).unwrap()
            })
        }
    }

    mod parsing {
        use super::*;

        #[test]
        fn test_default_command_is_run() {
            let cli = helpers::parse(&["sqlscript-generator", "--server", "sql01"]);
            assert_eq!(cli.selected_command(), Command::Run);
            assert_eq!(cli.overrides.server.as_deref(), Some("sql01"));
        }

        #[test]
        fn test_databases_are_repeatable_and_delimited() {
            let cli = helpers::parse(&[
                "sqlscript-generator",
                "--database",
                "Sales,Billing",
                "--database",
                "Hr",
            ]);
            assert_eq!(cli.overrides.databases, vec!["Sales", "Billing", "Hr"]);
        }

        #[test]
        fn test_subcommands_accept_global_flags() {
            let cli = helpers::parse(&["sqlscript-generator", "test", "--server", "sql01", "-vv"]);
            assert_eq!(cli.selected_command(), Command::Test);
            assert_eq!(cli.global.verbose, 2);
            assert_eq!(cli.overrides.server.as_deref(), Some("sql01"));

            let cli = helpers::parse(&["sqlscript-generator", "kinds", "--log-format", "json"]);
            assert_eq!(cli.selected_command(), Command::Kinds);
            assert_eq!(LogFormat::from(cli.global.log_format), LogFormat::Json);
        }

        #[test]
        fn test_password_from_environment() {
            temp_env::with_vars(
                [(PASSWORD_ENV, Some("from-env")), ("SQLSCRIPT_CONFIG", None)],
                || {
                    let cli = Cli::try_parse_from(["sqlscript-generator", "--login", "reader"])
                        .unwrap();
                    assert_eq!(cli.overrides.password.as_deref(), Some("from-env"));
                },
            );
        }

        #[test]
        fn test_password_not_in_debug_of_settings() {
            let cli = helpers::parse(&[
                "sqlscript-generator",
                "--server",
                "sql01",
                "--database",
                "Sales",
                "--password",
                "hunter2",
            ]);
            let mut settings = Settings::default();
            apply_overrides(&mut settings, &cli.overrides);
            assert!(!format!("{:?}", settings).contains("hunter2"));
            assert_eq!(settings.connection_info.password.as_deref(), Some("hunter2"));
        }
    }

    mod settings_resolution {
        use super::*;

        #[tokio::test]
        async fn test_overrides_win_over_file() {
            let file = helpers::settings_file(
                r#"{
                    "ConnectionInfo": { "Server": "from-file", "Databases": ["A"] },
                    "ExportInfo": { "Path": "file-out" },
                    "Extraction": { "MaxConcurrency": 8 }
                }"#,
            );
            let path = file.path().to_str().unwrap();
            let cli = helpers::parse(&[
                "sqlscript-generator",
                "--config",
                path,
                "--server",
                "from-cli",
                "--output",
                "cli-out",
                "--clear",
                "--inline-children",
                "--export-concurrency",
                "3",
            ]);

            let settings = resolve_settings(&cli.overrides).await.unwrap();
            assert_eq!(settings.connection_info.server, "from-cli");
            assert_eq!(settings.connection_info.databases, vec!["A"]);
            assert_eq!(settings.export_info.path, PathBuf::from("cli-out"));
            assert!(settings.export_info.clear_path_before_write);
            assert_eq!(settings.export_info.export_concurrency, 3);
            assert!(!settings.extraction.emit_child_objects_separately);
            assert_eq!(settings.extraction.max_concurrency, 8);
            assert!(settings.validate().is_ok());
        }

        #[tokio::test]
        async fn test_explicit_missing_config_is_an_error() {
            let cli = helpers::parse(&[
                "sqlscript-generator",
                "--config",
                "/nonexistent/appsettings.json",
            ]);
            let error = resolve_settings(&cli.overrides).await.unwrap_err();
            assert!(format!("{:#}", error).contains("/nonexistent/appsettings.json"));
        }

        #[tokio::test]
        async fn test_config_from_environment() {
            let file = helpers::settings_file(r#"{ "ConnectionInfo": { "Server": "env-file" } }"#);
            let path = file.path().to_str().unwrap().to_string();
            let cli = temp_env::with_vars(
                [("SQLSCRIPT_CONFIG", Some(path.as_str())), (PASSWORD_ENV, None)],
                || Cli::try_parse_from(["sqlscript-generator"]).unwrap(),
            );
            let settings = resolve_settings(&cli.overrides).await.unwrap();
            assert_eq!(settings.connection_info.server, "env-file");
        }

        #[test]
        fn test_prompt_skipped_unless_requested() {
            let cli = helpers::parse(&["sqlscript-generator"]);
            let mut settings = Settings::default();
            prompt_password_if_requested(&mut settings, &cli.overrides).unwrap();
            assert!(settings.connection_info.password.is_none());
        }
    }

    mod exit_codes {
        use super::*;

        #[test]
        fn test_exit_code_respects_strict() {
            let clean = RunOutcome::default();
            assert_eq!(exit_code(&clean, true), EXIT_OK);

            let partial = RunOutcome {
                units_failed: 1,
                ..RunOutcome::default()
            };
            assert_eq!(exit_code(&partial, false), EXIT_OK);
            assert_eq!(exit_code(&partial, true), EXIT_PARTIAL);
        }
    }
}
