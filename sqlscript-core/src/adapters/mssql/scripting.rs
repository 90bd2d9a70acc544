//! Definition rendering for SQL Server objects.
//!
//! Programmable objects come straight from `sys.sql_modules`. Everything
//! else is rebuilt from catalog rows by pure `render_*` functions: tables and
//! their children, types, partitioning and assemblies here, Service Broker
//! objects in `broker` and server-level objects in `agent`.
//!
//! [`renderer_for`] is the single mapping from kind to renderer; a kind it
//! does not know is reported as unsupported rather than scripted empty.

use super::connection::SqlClient;
use super::helpers::{
    RowExt, authorization_clause, query_rows, quote_ident, quote_literal, quote_qualified,
};
use super::{agent, broker};
use crate::Result;
use crate::error::ScriptToolError;
use crate::models::{DatabaseObject, ObjectHandle, ServerVersion, kinds};
use std::fmt::Write;
use tracing::debug;

/// How one object kind is turned into script batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Renderer {
    Module,
    Schema,
    Table,
    Index,
    ForeignKey,
    Check,
    Synonym,
    Sequence,
    DataType,
    TableType,
    ClrType,
    Aggregate,
    Assembly,
    PartitionFunction,
    PartitionScheme,
    MessageType,
    Contract,
    Queue,
    Service,
    Route,
    RemoteBinding,
    Job,
    JobStep,
    JobSchedule,
    Endpoint,
}

/// Renderer for `kind`, or `None` if this provider cannot script it.
pub(crate) fn renderer_for(kind: &str) -> Option<Renderer> {
    let renderer = match kind {
        kinds::VIEW | kinds::STORED_PROCEDURE | kinds::USER_DEFINED_FUNCTION | kinds::TRIGGER => {
            Renderer::Module
        }
        kinds::SCHEMA => Renderer::Schema,
        kinds::TABLE => Renderer::Table,
        kinds::INDEX => Renderer::Index,
        kinds::FOREIGN_KEY => Renderer::ForeignKey,
        kinds::CHECK => Renderer::Check,
        kinds::SYNONYM => Renderer::Synonym,
        kinds::SEQUENCE => Renderer::Sequence,
        kinds::USER_DEFINED_DATA_TYPE => Renderer::DataType,
        kinds::USER_DEFINED_TABLE_TYPE => Renderer::TableType,
        kinds::USER_DEFINED_TYPE => Renderer::ClrType,
        kinds::USER_DEFINED_AGGREGATE => Renderer::Aggregate,
        kinds::ASSEMBLY => Renderer::Assembly,
        kinds::PARTITION_FUNCTION => Renderer::PartitionFunction,
        kinds::PARTITION_SCHEME => Renderer::PartitionScheme,
        kinds::SERVICE_BROKER_MESSAGE_TYPE => Renderer::MessageType,
        kinds::SERVICE_BROKER_SERVICE_CONTRACT => Renderer::Contract,
        kinds::SERVICE_BROKER_QUEUE => Renderer::Queue,
        kinds::SERVICE_BROKER_SERVICE => Renderer::Service,
        kinds::SERVICE_BROKER_ROUTE => Renderer::Route,
        kinds::SERVICE_BROKER_REMOTE_BINDING => Renderer::RemoteBinding,
        kinds::JOB => Renderer::Job,
        kinds::JOB_STEP => Renderer::JobStep,
        kinds::JOB_SCHEDULE => Renderer::JobSchedule,
        kinds::ENDPOINT => Renderer::Endpoint,
        _ => return None,
    };
    Some(renderer)
}

/// One column of a table definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: String,
    pub max_length: i32,
    pub precision: i32,
    pub scale: i32,
    pub is_nullable: bool,
    /// `(seed, increment)` for identity columns
    pub identity: Option<(i64, i64)>,
    pub computed_definition: Option<String>,
    pub default_definition: Option<String>,
}

/// An index or key constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    /// `sys.indexes.type_desc`, e.g. `CLUSTERED`, `NONCLUSTERED`
    pub type_desc: String,
    pub is_unique: bool,
    pub is_primary_key: bool,
    pub is_unique_constraint: bool,
    /// Key columns with their descending flag
    pub key_columns: Vec<(String, bool)>,
    pub included_columns: Vec<String>,
    pub filter_definition: Option<String>,
}

/// A foreign key; column lists arrive already bracketed from the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub name: String,
    pub columns: String,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_columns: String,
    /// `sys.foreign_keys.delete_referential_action_desc`
    pub on_delete: String,
    pub on_update: String,
    pub is_not_trusted: bool,
}

/// A sequence; numeric bounds are kept as text to avoid overflow on
/// decimal-typed sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceDef {
    pub type_name: String,
    pub start_value: String,
    pub increment: String,
    pub minimum_value: String,
    pub maximum_value: String,
    pub is_cycling: bool,
    pub cache_size: Option<i32>,
}

/// Base type of an alias (user-defined data) type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTypeDef {
    pub base_type: String,
    pub max_length: i32,
    pub precision: i32,
    pub scale: i32,
    pub is_nullable: bool,
}

/// Assembly and class a CLR type or aggregate is bound to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClrBinding {
    pub assembly: String,
    pub class: String,
}

/// A parameter or return value; `name` is empty for the return value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterDef {
    pub name: String,
    pub type_name: String,
    pub max_length: i32,
    pub precision: i32,
    pub scale: i32,
}

impl ParameterDef {
    fn data_type(&self) -> String {
        format_data_type(&self.type_name, self.max_length, self.precision, self.scale)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyDef {
    pub owner: Option<String>,
    /// `sys.assemblies.permission_set_desc`, e.g. `SAFE_ACCESS`
    pub permission_set: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionFunctionDef {
    pub parameter: ParameterDef,
    pub boundary_on_right: bool,
    /// Boundary values already formatted as literals
    pub boundaries: Vec<String>,
}

/// Formats a column type the way SSMS scripts it.
pub fn format_data_type(type_name: &str, max_length: i32, precision: i32, scale: i32) -> String {
    let base = quote_ident(type_name);
    match type_name.to_ascii_lowercase().as_str() {
        "varchar" | "char" | "varbinary" | "binary" => match max_length {
            -1 => format!("{}(max)", base),
            n => format!("{}({})", base, n),
        },
        "nvarchar" | "nchar" => match max_length {
            -1 => format!("{}(max)", base),
            n => format!("{}({})", base, n / 2),
        },
        "decimal" | "numeric" => format!("{}({}, {})", base, precision, scale),
        "datetime2" | "time" | "datetimeoffset" => format!("{}({})", base, scale),
        _ => base,
    }
}

fn render_column(column: &ColumnDef) -> String {
    if let Some(computed) = &column.computed_definition {
        return format!("{} AS {}", quote_ident(&column.name), computed);
    }

    let mut line = format!(
        "{} {}",
        quote_ident(&column.name),
        format_data_type(
            &column.type_name,
            column.max_length,
            column.precision,
            column.scale
        )
    );
    if let Some((seed, increment)) = column.identity {
        line.push_str(&format!(" IDENTITY({},{})", seed, increment));
    }
    line.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
    if let Some(default) = &column.default_definition {
        line.push_str(&format!(" DEFAULT {}", default));
    }
    line
}

/// `CREATE TABLE` with one line per column.
pub fn render_create_table(schema: Option<&str>, name: &str, columns: &[ColumnDef]) -> String {
    let body = columns
        .iter()
        .map(|c| format!("\t{}", render_column(c)))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("CREATE TABLE {}(\n{}\n)", quote_qualified(schema, name), body)
}

/// Index or key constraint on `[table_schema].[table_name]`.
pub fn render_index(table_schema: Option<&str>, table_name: &str, index: &IndexDef) -> String {
    let table = quote_qualified(table_schema, table_name);
    let keys = index
        .key_columns
        .iter()
        .map(|(column, descending)| {
            format!("{} {}", quote_ident(column), if *descending { "DESC" } else { "ASC" })
        })
        .collect::<Vec<_>>()
        .join(", ");

    if index.is_primary_key || index.is_unique_constraint {
        let constraint = if index.is_primary_key { "PRIMARY KEY" } else { "UNIQUE" };
        return format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {} {}\n(\n\t{}\n)",
            table,
            quote_ident(&index.name),
            constraint,
            index.type_desc,
            keys
        );
    }

    let mut sql = format!(
        "CREATE {}{} INDEX {} ON {}",
        if index.is_unique { "UNIQUE " } else { "" },
        index.type_desc,
        quote_ident(&index.name),
        table
    );
    if !keys.is_empty() {
        sql.push_str(&format!("\n(\n\t{}\n)", keys));
    }
    if !index.included_columns.is_empty() {
        let included = index
            .included_columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!("\nINCLUDE({})", included));
    }
    if let Some(filter) = &index.filter_definition {
        sql.push_str(&format!("\nWHERE {}", filter));
    }
    sql
}

/// Maps `NO_ACTION`-style descriptors to their DDL clause, `None` for the
/// default action.
fn referential_action(desc: &str) -> Option<String> {
    match desc {
        "" | "NO_ACTION" => None,
        other => Some(other.replace('_', " ")),
    }
}

/// `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY`.
pub fn render_foreign_key(table_schema: Option<&str>, table_name: &str, fk: &ForeignKeyDef) -> String {
    let mut sql = format!(
        "ALTER TABLE {} WITH {} ADD CONSTRAINT {} FOREIGN KEY({})\nREFERENCES {} ({})",
        quote_qualified(table_schema, table_name),
        if fk.is_not_trusted { "NOCHECK" } else { "CHECK" },
        quote_ident(&fk.name),
        fk.columns,
        quote_qualified(Some(&fk.referenced_schema), &fk.referenced_table),
        fk.referenced_columns
    );
    if let Some(action) = referential_action(&fk.on_update) {
        sql.push_str(&format!("\nON UPDATE {}", action));
    }
    if let Some(action) = referential_action(&fk.on_delete) {
        sql.push_str(&format!("\nON DELETE {}", action));
    }
    sql
}

/// `ALTER TABLE ... ADD CONSTRAINT ... CHECK`.
pub fn render_check(
    table_schema: Option<&str>,
    table_name: &str,
    name: &str,
    definition: &str,
    is_not_trusted: bool,
) -> String {
    format!(
        "ALTER TABLE {} WITH {} ADD CONSTRAINT {} CHECK {}",
        quote_qualified(table_schema, table_name),
        if is_not_trusted { "NOCHECK" } else { "CHECK" },
        quote_ident(name),
        definition
    )
}

/// `CREATE SCHEMA`, with the owner when known.
pub fn render_create_schema(name: &str, owner: Option<&str>) -> String {
    match owner {
        Some(owner) => format!(
            "CREATE SCHEMA {} AUTHORIZATION {}",
            quote_ident(name),
            quote_ident(owner)
        ),
        None => format!("CREATE SCHEMA {}", quote_ident(name)),
    }
}

/// `CREATE SYNONYM`; `base_object` is already bracketed by the catalog.
pub fn render_synonym(schema: Option<&str>, name: &str, base_object: &str) -> String {
    format!(
        "CREATE SYNONYM {} FOR {}",
        quote_qualified(schema, name),
        base_object
    )
}

/// `CREATE SEQUENCE` with every option spelled out.
pub fn render_sequence(schema: Option<&str>, name: &str, sequence: &SequenceDef) -> String {
    let cache = match sequence.cache_size {
        Some(size) if size > 0 => format!("CACHE {}", size),
        Some(_) => "CACHE".to_string(),
        None => "NO CACHE".to_string(),
    };
    format!(
        "CREATE SEQUENCE {}\n AS {}\n START WITH {}\n INCREMENT BY {}\n MINVALUE {}\n MAXVALUE {}\n {}\n {}",
        quote_qualified(schema, name),
        quote_ident(&sequence.type_name),
        sequence.start_value,
        sequence.increment,
        sequence.minimum_value,
        sequence.maximum_value,
        if sequence.is_cycling { "CYCLE" } else { "NO CYCLE" },
        cache
    )
}

/// `CREATE TYPE ... FROM` for an alias type.
pub fn render_data_type(schema: Option<&str>, name: &str, def: &DataTypeDef) -> String {
    format!(
        "CREATE TYPE {} FROM {} {}",
        quote_qualified(schema, name),
        format_data_type(&def.base_type, def.max_length, def.precision, def.scale),
        if def.is_nullable { "NULL" } else { "NOT NULL" }
    )
}

/// `CREATE TYPE ... AS TABLE` with one line per column.
pub fn render_table_type(schema: Option<&str>, name: &str, columns: &[ColumnDef]) -> String {
    let body = columns
        .iter()
        .map(|c| format!("\t{}", render_column(c)))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("CREATE TYPE {} AS TABLE(\n{}\n)", quote_qualified(schema, name), body)
}

fn external_name(binding: &ClrBinding) -> String {
    format!(
        "EXTERNAL NAME {}.{}",
        quote_ident(&binding.assembly),
        quote_ident(&binding.class)
    )
}

/// `CREATE TYPE ... EXTERNAL NAME` for a CLR type.
pub fn render_clr_type(schema: Option<&str>, name: &str, binding: &ClrBinding) -> String {
    format!(
        "CREATE TYPE {}\n{}",
        quote_qualified(schema, name),
        external_name(binding)
    )
}

/// `CREATE AGGREGATE` over a CLR class.
pub fn render_aggregate(
    schema: Option<&str>,
    name: &str,
    parameters: &[ParameterDef],
    returns: &ParameterDef,
    binding: &ClrBinding,
) -> String {
    let parameters = parameters
        .iter()
        .map(|p| format!("\t{} {}", p.name, p.data_type()))
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "CREATE AGGREGATE {}\n(\n{}\n)\nRETURNS {}\n{}",
        quote_qualified(schema, name),
        parameters,
        returns.data_type(),
        external_name(binding)
    )
}

/// `0x`-prefixed uppercase hex literal.
pub fn hex_literal(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len().saturating_mul(2).saturating_add(2));
    hex.push_str("0x");
    for byte in bytes {
        let _ = write!(hex, "{:02X}", byte);
    }
    hex
}

/// `CREATE ASSEMBLY ... FROM 0x...` with its permission set.
pub fn render_assembly(name: &str, def: &AssemblyDef) -> String {
    let permission_set = match def.permission_set.as_str() {
        "EXTERNAL_ACCESS" => "EXTERNAL_ACCESS",
        "UNSAFE_ACCESS" => "UNSAFE",
        _ => "SAFE",
    };
    format!(
        "CREATE ASSEMBLY {}{}\nFROM {}\nWITH PERMISSION_SET = {}",
        quote_ident(name),
        authorization_clause(def.owner.as_deref()),
        hex_literal(&def.content),
        permission_set
    )
}

/// Formats a partition boundary: character and temporal values are quoted.
pub fn boundary_literal(value: &str, quoted: bool) -> String {
    if quoted {
        quote_literal(value)
    } else {
        value.to_string()
    }
}

/// `CREATE PARTITION FUNCTION ... AS RANGE LEFT|RIGHT FOR VALUES`.
pub fn render_partition_function(name: &str, def: &PartitionFunctionDef) -> String {
    format!(
        "CREATE PARTITION FUNCTION {}({}) AS RANGE {} FOR VALUES ({})",
        quote_ident(name),
        def.parameter.data_type(),
        if def.boundary_on_right { "RIGHT" } else { "LEFT" },
        def.boundaries.join(", ")
    )
}

/// `CREATE PARTITION SCHEME`; a single repeated filegroup becomes `ALL TO`.
pub fn render_partition_scheme(name: &str, function: &str, filegroups: &[String]) -> String {
    let all_same = filegroups.len() > 1 && filegroups.windows(2).all(|w| w[0] == w[1]);
    let targets = if all_same {
        format!("ALL TO ({})", quote_ident(&filegroups[0]))
    } else {
        let list = filegroups
            .iter()
            .map(|fg| quote_ident(fg))
            .collect::<Vec<_>>()
            .join(", ");
        format!("TO ({})", list)
    };
    format!(
        "CREATE PARTITION SCHEME {} AS PARTITION {} {}",
        quote_ident(name),
        quote_ident(function),
        targets
    )
}

fn numeric_handle(object: &DatabaseObject) -> Result<i64> {
    match &object.handle {
        Some(ObjectHandle::Numeric(id)) => Ok(*id),
        _ => Err(ScriptToolError::query_failed(format!(
            "{} {} has no numeric catalog handle",
            object.kind,
            object.qualified_name()
        ))),
    }
}

fn require_parent<'a>(
    object: &DatabaseObject,
    parent: Option<&'a DatabaseObject>,
) -> Result<&'a DatabaseObject> {
    parent.ok_or_else(|| {
        ScriptToolError::query_failed(format!(
            "{} {} cannot be scripted without its parent",
            object.kind, object.name
        ))
    })
}

fn text_handle<'a>(object: &'a DatabaseObject) -> Result<&'a str> {
    match &object.handle {
        Some(ObjectHandle::Text(id)) => Ok(id.as_str()),
        _ => Err(ScriptToolError::query_failed(format!(
            "{} {} has no catalog handle",
            object.kind, object.name
        ))),
    }
}

/// Renders `object` as script batches.
///
/// # Errors
/// Returns an unsupported-feature error for kinds [`renderer_for`] does not
/// know, and a query error if a catalog query fails or a required handle is
/// missing.
pub(crate) async fn script_object(
    client: &mut SqlClient,
    version: ServerVersion,
    object: &DatabaseObject,
    parent: Option<&DatabaseObject>,
) -> Result<Vec<String>> {
    let Some(renderer) = renderer_for(object.kind.as_str()) else {
        return Err(ScriptToolError::unsupported_feature(
            format!("scripting {} {}", object.kind, object.name),
            "SQL Server provider",
        ));
    };

    match renderer {
        Renderer::Module => module_definition(client, object).await,
        Renderer::Schema => Ok(vec![render_create_schema(
            &object.name,
            object.schema.as_deref(),
        )]),
        Renderer::Table => script_table(client, object).await,
        Renderer::Index => {
            let table = require_parent(object, parent)?;
            script_index(client, version, table, object).await
        }
        Renderer::ForeignKey => {
            let table = require_parent(object, parent)?;
            script_foreign_key(client, table, object).await
        }
        Renderer::Check => {
            let table = require_parent(object, parent)?;
            script_check(client, table, object).await
        }
        Renderer::Synonym => script_synonym(client, object).await,
        Renderer::Sequence => script_sequence(client, object).await,
        Renderer::DataType => script_data_type(client, object).await,
        Renderer::TableType => script_table_type(client, object).await,
        Renderer::ClrType => script_clr_type(client, object).await,
        Renderer::Aggregate => script_aggregate(client, object).await,
        Renderer::Assembly => script_assembly(client, object).await,
        Renderer::PartitionFunction => script_partition_function(client, object).await,
        Renderer::PartitionScheme => script_partition_scheme(client, object).await,
        Renderer::MessageType => {
            broker::script_message_type(client, numeric_handle(object)?, object).await
        }
        Renderer::Contract => broker::script_contract(client, numeric_handle(object)?, object).await,
        Renderer::Queue => {
            broker::script_queue(client, version, numeric_handle(object)?, object).await
        }
        Renderer::Service => broker::script_service(client, numeric_handle(object)?, object).await,
        Renderer::Route => broker::script_route(client, numeric_handle(object)?, object).await,
        Renderer::RemoteBinding => {
            broker::script_remote_binding(client, numeric_handle(object)?, object).await
        }
        Renderer::Job => agent::script_job(client, object, text_handle(object)?).await,
        Renderer::JobStep => {
            let job = require_parent(object, parent)?;
            agent::script_job_step(client, job, text_handle(job)?, object, numeric_handle(object)?)
                .await
        }
        Renderer::JobSchedule => {
            let job = require_parent(object, parent)?;
            agent::script_job_schedule(client, job, object, numeric_handle(object)?).await
        }
        Renderer::Endpoint => agent::script_endpoint(client, object, numeric_handle(object)?).await,
    }
}

async fn module_definition(client: &mut SqlClient, object: &DatabaseObject) -> Result<Vec<String>> {
    let id = numeric_handle(object)?;
    let sql = "SELECT CAST(m.definition AS nvarchar(max)) FROM sys.sql_modules m WHERE m.object_id = @P1";
    let rows = query_rows(client, sql, &[&id], "sys.sql_modules").await?;

    let definition = match rows.first() {
        Some(row) => row.get_text(0, "sys.sql_modules")?,
        None => None,
    };
    if definition.is_none() {
        // Encrypted modules have a NULL definition
        debug!("No module definition for {}", object.qualified_name());
    }
    Ok(definition.into_iter().collect())
}

/// Columns of the table (or table type backing table) with `object_id`.
async fn fetch_columns(client: &mut SqlClient, object_id: i64) -> Result<Vec<ColumnDef>> {
    let sql = r#"
        SELECT
            c.name,
            CAST(TYPE_NAME(c.user_type_id) AS nvarchar(128)),
            CAST(c.max_length AS int),
            CAST(c.precision AS int),
            CAST(c.scale AS int),
            c.is_nullable,
            c.is_identity,
            CAST(ic.seed_value AS bigint),
            CAST(ic.increment_value AS bigint),
            CAST(cc.definition AS nvarchar(max)),
            CAST(dc.definition AS nvarchar(max))
        FROM sys.columns c
        LEFT JOIN sys.identity_columns ic
            ON ic.object_id = c.object_id AND ic.column_id = c.column_id
        LEFT JOIN sys.computed_columns cc
            ON cc.object_id = c.object_id AND cc.column_id = c.column_id
        LEFT JOIN sys.default_constraints dc
            ON dc.parent_object_id = c.object_id AND dc.parent_column_id = c.column_id
        WHERE c.object_id = @P1
        ORDER BY c.column_id
    "#;
    let context = "sys.columns";
    let rows = query_rows(client, sql, &[&object_id], context).await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let is_identity = row.get_flag(6, context)?;
        let identity = if is_identity {
            Some((
                row.get_field::<i64>(7, context)?.unwrap_or(1),
                row.get_field::<i64>(8, context)?.unwrap_or(1),
            ))
        } else {
            None
        };
        columns.push(ColumnDef {
            name: row.get_text(0, context)?.unwrap_or_default(),
            type_name: row.get_text(1, context)?.unwrap_or_default(),
            max_length: row.get_field::<i32>(2, context)?.unwrap_or(0),
            precision: row.get_field::<i32>(3, context)?.unwrap_or(0),
            scale: row.get_field::<i32>(4, context)?.unwrap_or(0),
            is_nullable: row.get_flag(5, context)?,
            identity,
            computed_definition: row.get_text(9, context)?,
            default_definition: row.get_text(10, context)?,
        });
    }
    Ok(columns)
}

async fn script_table(client: &mut SqlClient, table: &DatabaseObject) -> Result<Vec<String>> {
    let columns = fetch_columns(client, numeric_handle(table)?).await?;
    Ok(vec![render_create_table(
        table.schema.as_deref(),
        &table.name,
        &columns,
    )])
}

async fn script_index(
    client: &mut SqlClient,
    version: ServerVersion,
    table: &DatabaseObject,
    index: &DatabaseObject,
) -> Result<Vec<String>> {
    let table_id = numeric_handle(table)?;
    let index_id = numeric_handle(index)?;
    // Filtered indexes arrived in SQL Server 2008
    let filter = if version.meets(10) {
        "CAST(i.filter_definition AS nvarchar(max))"
    } else {
        "CAST(NULL AS nvarchar(max))"
    };
    let sql = format!(
        r#"
        SELECT
            i.name,
            CAST(i.type_desc AS nvarchar(60)),
            i.is_unique,
            i.is_primary_key,
            i.is_unique_constraint,
            {filter},
            c.name,
            ic.is_descending_key,
            ic.is_included_column
        FROM sys.indexes i
        LEFT JOIN sys.index_columns ic
            ON ic.object_id = i.object_id AND ic.index_id = i.index_id
        LEFT JOIN sys.columns c
            ON c.object_id = ic.object_id AND c.column_id = ic.column_id
        WHERE i.object_id = @P1 AND i.index_id = @P2
        ORDER BY ic.is_included_column, ic.key_ordinal, ic.index_column_id
        "#
    );
    let context = "sys.indexes";
    let rows = query_rows(client, &sql, &[&table_id, &index_id], context).await?;

    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let mut def = IndexDef {
        name: first.get_text(0, context)?.unwrap_or_else(|| index.name.clone()),
        type_desc: first.get_text(1, context)?.unwrap_or_default(),
        is_unique: first.get_flag(2, context)?,
        is_primary_key: first.get_flag(3, context)?,
        is_unique_constraint: first.get_flag(4, context)?,
        filter_definition: first.get_text(5, context)?,
        ..Default::default()
    };
    for row in &rows {
        let Some(column) = row.get_text(6, context)? else {
            continue;
        };
        if row.get_flag(8, context)? {
            def.included_columns.push(column);
        } else {
            def.key_columns.push((column, row.get_flag(7, context)?));
        }
    }

    Ok(vec![render_index(table.schema.as_deref(), &table.name, &def)])
}

async fn script_foreign_key(
    client: &mut SqlClient,
    table: &DatabaseObject,
    fk: &DatabaseObject,
) -> Result<Vec<String>> {
    let id = numeric_handle(fk)?;
    let sql = r#"
        SELECT
            STUFF((
                SELECT ', ' + QUOTENAME(pc.name)
                FROM sys.foreign_key_columns fkc
                JOIN sys.columns pc
                    ON fkc.parent_object_id = pc.object_id AND fkc.parent_column_id = pc.column_id
                WHERE fkc.constraint_object_id = fk.object_id
                ORDER BY fkc.constraint_column_id
                FOR XML PATH(''), TYPE
            ).value('.', 'nvarchar(max)'), 1, 2, '') AS parent_columns,
            rs.name AS ref_schema,
            rt.name AS ref_table,
            STUFF((
                SELECT ', ' + QUOTENAME(rc.name)
                FROM sys.foreign_key_columns fkc
                JOIN sys.columns rc
                    ON fkc.referenced_object_id = rc.object_id AND fkc.referenced_column_id = rc.column_id
                WHERE fkc.constraint_object_id = fk.object_id
                ORDER BY fkc.constraint_column_id
                FOR XML PATH(''), TYPE
            ).value('.', 'nvarchar(max)'), 1, 2, '') AS ref_columns,
            CAST(fk.delete_referential_action_desc AS nvarchar(60)),
            CAST(fk.update_referential_action_desc AS nvarchar(60)),
            fk.is_not_trusted
        FROM sys.foreign_keys fk
        JOIN sys.tables rt ON fk.referenced_object_id = rt.object_id
        JOIN sys.schemas rs ON rt.schema_id = rs.schema_id
        WHERE fk.object_id = @P1
    "#;
    let context = "sys.foreign_keys";
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let def = ForeignKeyDef {
        name: fk.name.clone(),
        columns: row.get_text(0, context)?.unwrap_or_default(),
        referenced_schema: row.get_text(1, context)?.unwrap_or_default(),
        referenced_table: row.get_text(2, context)?.unwrap_or_default(),
        referenced_columns: row.get_text(3, context)?.unwrap_or_default(),
        on_delete: row.get_text(4, context)?.unwrap_or_default(),
        on_update: row.get_text(5, context)?.unwrap_or_default(),
        is_not_trusted: row.get_flag(6, context)?,
    };
    Ok(vec![render_foreign_key(table.schema.as_deref(), &table.name, &def)])
}

async fn script_check(
    client: &mut SqlClient,
    table: &DatabaseObject,
    check: &DatabaseObject,
) -> Result<Vec<String>> {
    let id = numeric_handle(check)?;
    let sql = r#"
        SELECT CAST(cc.definition AS nvarchar(max)), cc.is_not_trusted
        FROM sys.check_constraints cc
        WHERE cc.object_id = @P1
    "#;
    let context = "sys.check_constraints";
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let definition = row.get_text(0, context)?.unwrap_or_default();
    Ok(vec![render_check(
        table.schema.as_deref(),
        &table.name,
        &check.name,
        &definition,
        row.get_flag(1, context)?,
    )])
}

async fn script_synonym(client: &mut SqlClient, synonym: &DatabaseObject) -> Result<Vec<String>> {
    let id = numeric_handle(synonym)?;
    let sql = "SELECT CAST(sn.base_object_name AS nvarchar(1035)) FROM sys.synonyms sn WHERE sn.object_id = @P1";
    let rows = query_rows(client, sql, &[&id], "sys.synonyms").await?;
    let base = match rows.first() {
        Some(row) => row.get_text(0, "sys.synonyms")?,
        None => None,
    };
    Ok(base
        .map(|base| render_synonym(synonym.schema.as_deref(), &synonym.name, &base))
        .into_iter()
        .collect())
}

async fn script_sequence(client: &mut SqlClient, sequence: &DatabaseObject) -> Result<Vec<String>> {
    let id = numeric_handle(sequence)?;
    let sql = r#"
        SELECT
            CAST(TYPE_NAME(sq.user_type_id) AS nvarchar(128)),
            CAST(sq.start_value AS nvarchar(64)),
            CAST(sq.increment AS nvarchar(64)),
            CAST(sq.minimum_value AS nvarchar(64)),
            CAST(sq.maximum_value AS nvarchar(64)),
            sq.is_cycling,
            sq.is_cached,
            CAST(sq.cache_size AS int)
        FROM sys.sequences sq
        WHERE sq.object_id = @P1
    "#;
    let context = "sys.sequences";
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let is_cached = row.get_flag(6, context)?;
    let def = SequenceDef {
        type_name: row.get_text(0, context)?.unwrap_or_else(|| "bigint".to_string()),
        start_value: row.get_text(1, context)?.unwrap_or_default(),
        increment: row.get_text(2, context)?.unwrap_or_default(),
        minimum_value: row.get_text(3, context)?.unwrap_or_default(),
        maximum_value: row.get_text(4, context)?.unwrap_or_default(),
        is_cycling: row.get_flag(5, context)?,
        cache_size: if is_cached {
            Some(row.get_field::<i32>(7, context)?.unwrap_or(0))
        } else {
            None
        },
    };
    Ok(vec![render_sequence(
        sequence.schema.as_deref(),
        &sequence.name,
        &def,
    )])
}

async fn script_data_type(client: &mut SqlClient, object: &DatabaseObject) -> Result<Vec<String>> {
    let id = numeric_handle(object)?;
    let sql = r#"
        SELECT
            CAST(TYPE_NAME(t.system_type_id) AS nvarchar(128)),
            CAST(t.max_length AS int),
            CAST(t.precision AS int),
            CAST(t.scale AS int),
            t.is_nullable
        FROM sys.types t
        WHERE t.user_type_id = @P1
    "#;
    let context = "sys.types";
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let def = DataTypeDef {
        base_type: row.get_text(0, context)?.unwrap_or_default(),
        max_length: row.get_field::<i32>(1, context)?.unwrap_or(0),
        precision: row.get_field::<i32>(2, context)?.unwrap_or(0),
        scale: row.get_field::<i32>(3, context)?.unwrap_or(0),
        is_nullable: row.get_flag(4, context)?,
    };
    Ok(vec![render_data_type(object.schema.as_deref(), &object.name, &def)])
}

async fn script_table_type(client: &mut SqlClient, object: &DatabaseObject) -> Result<Vec<String>> {
    let id = numeric_handle(object)?;
    let sql = "SELECT CAST(tt.type_table_object_id AS bigint) FROM sys.table_types tt WHERE tt.user_type_id = @P1";
    let rows = query_rows(client, sql, &[&id], "sys.table_types").await?;
    let table_id = match rows.first() {
        Some(row) => row.get_field::<i64>(0, "sys.table_types")?,
        None => None,
    };
    let Some(table_id) = table_id else {
        return Ok(Vec::new());
    };

    let columns = fetch_columns(client, table_id).await?;
    Ok(vec![render_table_type(
        object.schema.as_deref(),
        &object.name,
        &columns,
    )])
}

/// Assembly and class behind a CLR object; `sql` takes the id as `@P1`.
async fn fetch_clr_binding(
    client: &mut SqlClient,
    sql: &str,
    id: i64,
    context: &str,
) -> Result<Option<ClrBinding>> {
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(None);
    };
    Ok(Some(ClrBinding {
        assembly: row.get_text(0, context)?.unwrap_or_default(),
        class: row.get_text(1, context)?.unwrap_or_default(),
    }))
}

async fn script_clr_type(client: &mut SqlClient, object: &DatabaseObject) -> Result<Vec<String>> {
    let sql = r#"
        SELECT a.name, CAST(t.assembly_class AS nvarchar(4000))
        FROM sys.assembly_types t
        JOIN sys.assemblies a ON a.assembly_id = t.assembly_id
        WHERE t.user_type_id = @P1
    "#;
    let binding = fetch_clr_binding(client, sql, numeric_handle(object)?, "sys.assembly_types").await?;
    Ok(binding
        .map(|b| render_clr_type(object.schema.as_deref(), &object.name, &b))
        .into_iter()
        .collect())
}

async fn script_aggregate(client: &mut SqlClient, object: &DatabaseObject) -> Result<Vec<String>> {
    let id = numeric_handle(object)?;
    let sql = r#"
        SELECT a.name, CAST(m.assembly_class AS nvarchar(4000))
        FROM sys.assembly_modules m
        JOIN sys.assemblies a ON a.assembly_id = m.assembly_id
        WHERE m.object_id = @P1
    "#;
    let Some(binding) = fetch_clr_binding(client, sql, id, "sys.assembly_modules").await? else {
        return Ok(Vec::new());
    };

    let sql = r#"
        SELECT
            p.name,
            CAST(TYPE_NAME(p.user_type_id) AS nvarchar(128)),
            CAST(p.max_length AS int),
            CAST(p.precision AS int),
            CAST(p.scale AS int),
            CAST(p.parameter_id AS int)
        FROM sys.parameters p
        WHERE p.object_id = @P1
        ORDER BY p.parameter_id
    "#;
    let context = "sys.parameters";
    let rows = query_rows(client, sql, &[&id], context).await?;

    let mut returns = ParameterDef::default();
    let mut parameters = Vec::with_capacity(rows.len());
    for row in &rows {
        let parameter = ParameterDef {
            name: row.get_text(0, context)?.unwrap_or_default(),
            type_name: row.get_text(1, context)?.unwrap_or_default(),
            max_length: row.get_field::<i32>(2, context)?.unwrap_or(0),
            precision: row.get_field::<i32>(3, context)?.unwrap_or(0),
            scale: row.get_field::<i32>(4, context)?.unwrap_or(0),
        };
        // Parameter 0 is the return value
        if row.get_field::<i32>(5, context)?.unwrap_or(0) == 0 {
            returns = parameter;
        } else {
            parameters.push(parameter);
        }
    }

    Ok(vec![render_aggregate(
        object.schema.as_deref(),
        &object.name,
        &parameters,
        &returns,
        &binding,
    )])
}

async fn script_assembly(client: &mut SqlClient, object: &DatabaseObject) -> Result<Vec<String>> {
    let id = numeric_handle(object)?;
    let sql = r#"
        SELECT
            CAST(USER_NAME(a.principal_id) AS nvarchar(128)),
            CAST(a.permission_set_desc AS nvarchar(60)),
            f.content
        FROM sys.assemblies a
        LEFT JOIN sys.assembly_files f ON f.assembly_id = a.assembly_id AND f.file_id = 1
        WHERE a.assembly_id = @P1
    "#;
    let context = "sys.assemblies";
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let def = AssemblyDef {
        owner: row.get_text(0, context)?,
        permission_set: row.get_text(1, context)?.unwrap_or_default(),
        content: row
            .get_field::<&[u8]>(2, context)?
            .map(<[u8]>::to_vec)
            .unwrap_or_default(),
    };
    Ok(vec![render_assembly(&object.name, &def)])
}

async fn script_partition_function(
    client: &mut SqlClient,
    object: &DatabaseObject,
) -> Result<Vec<String>> {
    let id = numeric_handle(object)?;
    let sql = r#"
        SELECT
            pf.boundary_value_on_right,
            CAST(TYPE_NAME(pp.user_type_id) AS nvarchar(128)),
            CAST(pp.max_length AS int),
            CAST(pp.precision AS int),
            CAST(pp.scale AS int)
        FROM sys.partition_functions pf
        JOIN sys.partition_parameters pp
            ON pp.function_id = pf.function_id AND pp.parameter_id = 1
        WHERE pf.function_id = @P1
    "#;
    let context = "sys.partition_functions";
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };
    let mut def = PartitionFunctionDef {
        parameter: ParameterDef {
            name: String::new(),
            type_name: row.get_text(1, context)?.unwrap_or_default(),
            max_length: row.get_field::<i32>(2, context)?.unwrap_or(0),
            precision: row.get_field::<i32>(3, context)?.unwrap_or(0),
            scale: row.get_field::<i32>(4, context)?.unwrap_or(0),
        },
        boundary_on_right: row.get_flag(0, context)?,
        boundaries: Vec::new(),
    };

    let sql = r#"
        SELECT
            CASE
                WHEN SQL_VARIANT_PROPERTY(rv.value, 'BaseType') IN ('date', 'datetime', 'datetime2', 'smalldatetime')
                    THEN CONVERT(nvarchar(4000), CAST(rv.value AS datetime2), 126)
                ELSE CAST(rv.value AS nvarchar(4000))
            END,
            CAST(CASE
                WHEN SQL_VARIANT_PROPERTY(rv.value, 'BaseType') IN
                    ('char', 'varchar', 'nchar', 'nvarchar', 'date', 'datetime', 'datetime2',
                     'smalldatetime', 'time', 'datetimeoffset', 'uniqueidentifier')
                    THEN 1 ELSE 0
            END AS bit)
        FROM sys.partition_range_values rv
        WHERE rv.function_id = @P1
        ORDER BY rv.boundary_id
    "#;
    let context = "sys.partition_range_values";
    for row in query_rows(client, sql, &[&id], context).await? {
        match row.get_text(0, context)? {
            Some(value) => def
                .boundaries
                .push(boundary_literal(&value, row.get_flag(1, context)?)),
            None => def.boundaries.push("NULL".to_string()),
        }
    }

    Ok(vec![render_partition_function(&object.name, &def)])
}

async fn script_partition_scheme(
    client: &mut SqlClient,
    object: &DatabaseObject,
) -> Result<Vec<String>> {
    let id = numeric_handle(object)?;
    let sql = r#"
        SELECT pf.name, fg.name
        FROM sys.partition_schemes ps
        JOIN sys.partition_functions pf ON pf.function_id = ps.function_id
        JOIN sys.destination_data_spaces dds ON dds.partition_scheme_id = ps.data_space_id
        JOIN sys.filegroups fg ON fg.data_space_id = dds.data_space_id
        WHERE ps.data_space_id = @P1
        ORDER BY dds.destination_id
    "#;
    let context = "sys.partition_schemes";
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    let function = first.get_text(0, context)?.unwrap_or_default();
    let mut filegroups = Vec::with_capacity(rows.len());
    for row in &rows {
        filegroups.push(row.get_text(1, context)?.unwrap_or_default());
    }
    Ok(vec![render_partition_scheme(&object.name, &function, &filegroups)])
}
