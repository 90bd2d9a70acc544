//! Human-readable dump of records to a text sink.

use super::ScriptExporter;
use crate::Result;
use crate::models::ScriptRecord;
use async_trait::async_trait;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

const SEPARATOR: &str = "================================";

/// Prints each record's name and body followed by a separator line.
///
/// Always reports success; sink write errors are logged.
#[derive(Debug)]
pub struct ConsoleExporter<W: Write + Send> {
    sink: Mutex<W>,
}

impl ConsoleExporter<std::io::Stdout> {
    /// Exporter writing to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleExporter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Returns the sink.
    pub fn into_inner(self) -> W {
        self.sink.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_record(&self, record: &ScriptRecord) -> std::io::Result<()> {
        let prefix = format!(
            "{}({})",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            thread_label()
        );
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(sink, "{} script name: {}", prefix, record.name)?;
        writeln!(sink, "{} script body:", prefix)?;
        writeln!(sink, "{}", record.body)?;
        writeln!(sink, "{}", SEPARATOR)?;
        sink.flush()
    }
}

fn thread_label() -> String {
    let current = std::thread::current();
    match current.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", current.id()),
    }
}

#[async_trait]
impl<W: Write + Send> ScriptExporter for ConsoleExporter<W> {
    async fn export(&self, record: &ScriptRecord) -> Result<bool> {
        if let Err(e) = self.write_record(record) {
            warn!("Failed to print {} '{}': {}", record.kind, record.name, e);
        }
        Ok(true)
    }

    fn name(&self) -> &str {
        "console"
    }
}
