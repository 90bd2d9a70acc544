//! Row and query helpers for the tiberius client.

use super::connection::SqlClient;
use crate::{Result, error::ScriptToolError};
use tiberius::{FromSql, Row, ToSql};

/// Extension trait for extracting typed values from tiberius rows
/// with consistent error handling.
///
/// # Example
/// ```rust,ignore
/// let name = row.get_text(1, "sys.tables")?.unwrap_or_default();
/// let is_system = row.get_flag(2, "sys.tables")?;
/// ```
pub(crate) trait RowExt {
    /// Extracts a typed, nullable column with error context.
    fn get_field<'r, T>(&'r self, idx: usize, context: &str) -> Result<Option<T>>
    where
        T: FromSql<'r>;

    /// Extracts an `nvarchar` column as an owned string.
    fn get_text(&self, idx: usize, context: &str) -> Result<Option<String>>;

    /// Extracts a `bit` column, NULL reading as false.
    fn get_flag(&self, idx: usize, context: &str) -> Result<bool>;
}

impl RowExt for Row {
    fn get_field<'r, T>(&'r self, idx: usize, context: &str) -> Result<Option<T>>
    where
        T: FromSql<'r>,
    {
        self.try_get::<T, usize>(idx).map_err(|e| {
            ScriptToolError::collection_failed(format!("reading column {} of {}", idx, context), e)
        })
    }

    fn get_text(&self, idx: usize, context: &str) -> Result<Option<String>> {
        Ok(self.get_field::<&str>(idx, context)?.map(str::to_string))
    }

    fn get_flag(&self, idx: usize, context: &str) -> Result<bool> {
        Ok(self.get_field::<bool>(idx, context)?.unwrap_or(false))
    }
}

/// Runs a parameterized catalog query and collects the first result set.
///
/// # Errors
/// Returns a collection error naming `resource` if the query fails.
pub(crate) async fn query_rows(
    client: &mut SqlClient,
    sql: &str,
    params: &[&dyn ToSql],
    resource: &str,
) -> Result<Vec<Row>> {
    let stream = client.query(sql, params).await.map_err(|e| {
        tracing::debug!("Catalog query on {} failed: {}", resource, e);
        ScriptToolError::collection_failed(format!("Failed to query {}", resource), e)
    })?;
    stream
        .into_first_result()
        .await
        .map_err(|e| ScriptToolError::collection_failed(format!("Failed to read {}", resource), e))
}

/// Brackets an identifier, doubling embedded `]`.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// `[schema].[name]`, or `[name]` when there is no schema.
pub(crate) fn quote_qualified(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(name)),
        None => quote_ident(name),
    }
}

/// Unicode string literal, doubling embedded quotes.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

/// `\nAUTHORIZATION [owner]`, or nothing when the owner is unknown.
pub(crate) fn authorization_clause(owner: Option<&str>) -> String {
    owner
        .map(|owner| format!("\nAUTHORIZATION {}", quote_ident(owner)))
        .unwrap_or_default()
}
