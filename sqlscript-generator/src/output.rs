//! Human-readable reports printed after each command.

use sqlscript_core::RunOutcome;
use sqlscript_core::extraction::{KindDescriptor, ServerIdentity};
use std::fmt::Write;
use std::path::Path;

/// Summary of a finished run.
///
/// `destination` is the export root, or `None` when printing to the console.
pub fn format_summary(outcome: &RunOutcome, destination: Option<&Path>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Script extraction completed in {}ms", outcome.duration_ms);
    let _ = writeln!(
        out,
        "Units:   {} attempted, {} succeeded, {} failed",
        outcome.units_attempted, outcome.units_succeeded, outcome.units_failed
    );
    let _ = writeln!(
        out,
        "Records: {} attempted, {} exported, {} failed",
        outcome.records_attempted, outcome.records_exported, outcome.records_failed
    );
    if outcome.objects_skipped > 0 {
        let _ = writeln!(
            out,
            "Skipped: {} object(s) of unsupported kinds",
            outcome.objects_skipped
        );
    }
    match destination {
        Some(path) => {
            let _ = writeln!(out, "Output:  {}", path.display());
        }
        None => {
            let _ = writeln!(out, "Output:  console");
        }
    }

    for failure in &outcome.unit_failures {
        let _ = writeln!(out, "  [UNIT FAILED] {}", failure);
    }
    for failure in &outcome.export_failures {
        let _ = writeln!(out, "  [EXPORT FAILED] {}", failure);
    }
    out
}

/// One line per catalog entry: kind, scope and version gate.
pub fn format_kinds(catalog: &[KindDescriptor]) -> String {
    let width = catalog
        .iter()
        .map(|d| d.kind.as_str().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for descriptor in catalog {
        let _ = writeln!(
            out,
            "{:<width$}  {:<8}  {}{}",
            descriptor.kind.as_str(),
            descriptor.scope.to_string(),
            descriptor.gate,
            if descriptor.has_children { "  (+children)" } else { "" },
            width = width
        );
    }
    out
}

/// Result of a connection test.
pub fn format_identity(identity: &ServerIdentity) -> String {
    format!(
        "Connection to {} successful via {} provider\nServer version: {}\nDatabase: {}\n",
        identity.server_name,
        identity.provider,
        identity.version,
        identity.database.as_deref().unwrap_or("<server>")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlscript_core::adapters::{UnitFailure, UnitTarget};
    use sqlscript_core::extraction::kind_catalog;
    use sqlscript_core::models::ServerVersion;

    #[test]
    fn test_summary_lists_failures() {
        let outcome = RunOutcome {
            units_attempted: 3,
            units_succeeded: 2,
            units_failed: 1,
            records_attempted: 10,
            records_exported: 10,
            unit_failures: vec![UnitFailure {
                target: UnitTarget::Database("Billing".to_string()),
                error_message: "Database connection failed: login".to_string(),
                is_connection_error: true,
            }],
            ..RunOutcome::default()
        };

        let summary = format_summary(&outcome, Some(Path::new("scripts")));
        assert!(summary.contains("Units:   3 attempted, 2 succeeded, 1 failed"));
        assert!(summary.contains("Records: 10 attempted, 10 exported, 0 failed"));
        assert!(summary.contains("Output:  scripts"));
        assert!(summary.contains("[UNIT FAILED] Billing: Database connection failed"));
        assert!(!summary.contains("Skipped:"));

        assert!(format_summary(&RunOutcome::default(), None).contains("Output:  console"));
    }

    #[test]
    fn test_summary_reports_skipped_objects() {
        let outcome = RunOutcome {
            units_attempted: 2,
            units_succeeded: 2,
            objects_skipped: 3,
            ..RunOutcome::default()
        };
        let summary = format_summary(&outcome, None);
        assert!(summary.contains("Skipped: 3 object(s) of unsupported kinds"));
    }

    #[test]
    fn test_kinds_table() {
        let table = format_kinds(&kind_catalog());
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 22);
        assert!(lines[0].starts_with("Endpoint"));
        assert!(lines[1].contains("(+children)"));
        assert!(lines.last().unwrap().contains(">= 11"));
    }

    #[test]
    fn test_identity_format() {
        let identity = ServerIdentity {
            provider: "mssql".to_string(),
            server_name: "SQL01".to_string(),
            version: ServerVersion::new(16, 0, 1000),
            database: Some("Sales".to_string()),
        };
        let text = format_identity(&identity);
        assert!(text.contains("Connection to SQL01 successful via mssql provider"));
        assert!(text.contains("Server version: 16.0.1000"));
    }
}
