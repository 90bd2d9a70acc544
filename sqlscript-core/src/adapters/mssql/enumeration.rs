//! Catalog queries that enumerate objects of each kind.
//!
//! Every enumeration query returns the same five columns so one row mapper
//! serves all kinds:
//!
//! | # | column        | type          |
//! |---|---------------|---------------|
//! | 0 | schema_name   | nvarchar NULL |
//! | 1 | object_name   | nvarchar      |
//! | 2 | is_system     | bit           |
//! | 3 | handle        | nvarchar      |
//! | 4 | is_clustered  | bit           |
//!
//! Child queries prefix a `kind` column; their schema column is always NULL
//! and is filled from the parent.

use super::connection::SqlClient;
use super::helpers::{RowExt, query_rows};
use crate::Result;
use crate::error::ScriptToolError;
use crate::models::{DatabaseObject, ObjectHandle, ObjectKind, kinds};
use tiberius::Row;

/// Objects in catalog views that carry `schema_id` and `is_ms_shipped`.
macro_rules! schema_scoped {
    ($view:literal) => {
        concat!(
            "SELECT s.name, o.name, CAST(o.is_ms_shipped AS bit), ",
            "CAST(o.object_id AS nvarchar(36)), CAST(0 AS bit) ",
            "FROM ",
            $view,
            " o JOIN sys.schemas s ON s.schema_id = o.schema_id ",
            "ORDER BY s.name, o.name"
        )
    };
}

/// Enumeration query for `kind`, or `None` if this provider cannot list it.
pub(crate) fn object_query(kind: &str) -> Option<&'static str> {
    let sql = match kind {
        kinds::ENDPOINT => {
            r#"
            SELECT CAST(SUSER_SNAME(e.principal_id) AS nvarchar(128)), e.name,
                   CAST(CASE WHEN e.endpoint_id < 65536 THEN 1 ELSE 0 END AS bit),
                   CAST(e.endpoint_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.endpoints e
            ORDER BY e.name
            "#
        }
        kinds::JOB => {
            r#"
            SELECT CAST(c.name AS nvarchar(128)), j.name, CAST(0 AS bit),
                   CAST(j.job_id AS nvarchar(36)), CAST(0 AS bit)
            FROM msdb.dbo.sysjobs j
            JOIN msdb.dbo.syscategories c ON c.category_id = j.category_id
            ORDER BY j.name
            "#
        }
        kinds::SCHEMA => {
            r#"
            SELECT CAST(USER_NAME(s.principal_id) AS nvarchar(128)), s.name,
                   CAST(CASE WHEN s.schema_id < 5 OR s.schema_id >= 16384 THEN 1 ELSE 0 END AS bit),
                   CAST(s.schema_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.schemas s
            ORDER BY s.name
            "#
        }
        kinds::TABLE => schema_scoped!("sys.tables"),
        kinds::VIEW => schema_scoped!("sys.views"),
        kinds::SYNONYM => schema_scoped!("sys.synonyms"),
        kinds::STORED_PROCEDURE => schema_scoped!("sys.procedures"),
        kinds::SEQUENCE => schema_scoped!("sys.sequences"),
        kinds::SERVICE_BROKER_QUEUE => schema_scoped!("sys.service_queues"),
        kinds::USER_DEFINED_AGGREGATE => {
            r#"
            SELECT s.name, o.name, CAST(o.is_ms_shipped AS bit),
                   CAST(o.object_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.objects o
            JOIN sys.schemas s ON s.schema_id = o.schema_id
            WHERE o.type = 'AF'
            ORDER BY s.name, o.name
            "#
        }
        kinds::USER_DEFINED_FUNCTION => {
            r#"
            SELECT s.name, o.name, CAST(o.is_ms_shipped AS bit),
                   CAST(o.object_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.objects o
            JOIN sys.schemas s ON s.schema_id = o.schema_id
            WHERE o.type IN ('FN', 'IF', 'TF', 'FS', 'FT')
            ORDER BY s.name, o.name
            "#
        }
        kinds::USER_DEFINED_DATA_TYPE => {
            r#"
            SELECT s.name, t.name, CAST(0 AS bit),
                   CAST(t.user_type_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.types t
            JOIN sys.schemas s ON s.schema_id = t.schema_id
            WHERE t.is_user_defined = 1 AND t.is_assembly_type = 0 AND t.is_table_type = 0
            ORDER BY s.name, t.name
            "#
        }
        kinds::USER_DEFINED_TABLE_TYPE => {
            r#"
            SELECT s.name, t.name, CAST(0 AS bit),
                   CAST(t.user_type_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.table_types t
            JOIN sys.schemas s ON s.schema_id = t.schema_id
            ORDER BY s.name, t.name
            "#
        }
        kinds::USER_DEFINED_TYPE => {
            r#"
            SELECT s.name, t.name, CAST(0 AS bit),
                   CAST(t.user_type_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.assembly_types t
            JOIN sys.schemas s ON s.schema_id = t.schema_id
            WHERE t.is_user_defined = 1
            ORDER BY s.name, t.name
            "#
        }
        kinds::ASSEMBLY => {
            r#"
            SELECT CAST(USER_NAME(a.principal_id) AS nvarchar(128)), a.name,
                   CAST(CASE WHEN a.is_user_defined = 1 THEN 0 ELSE 1 END AS bit),
                   CAST(a.assembly_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.assemblies a
            ORDER BY a.name
            "#
        }
        kinds::PARTITION_FUNCTION => {
            r#"
            SELECT CAST(NULL AS nvarchar(128)), pf.name, CAST(0 AS bit),
                   CAST(pf.function_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.partition_functions pf
            ORDER BY pf.name
            "#
        }
        kinds::PARTITION_SCHEME => {
            r#"
            SELECT CAST(NULL AS nvarchar(128)), ps.name, CAST(0 AS bit),
                   CAST(ps.data_space_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.partition_schemes ps
            ORDER BY ps.name
            "#
        }
        kinds::SERVICE_BROKER_MESSAGE_TYPE => {
            r#"
            SELECT CAST(NULL AS nvarchar(128)), mt.name,
                   CAST(CASE WHEN mt.message_type_id < 65536 THEN 1 ELSE 0 END AS bit),
                   CAST(mt.message_type_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.service_message_types mt
            ORDER BY mt.name
            "#
        }
        kinds::SERVICE_BROKER_SERVICE_CONTRACT => {
            r#"
            SELECT CAST(NULL AS nvarchar(128)), sc.name,
                   CAST(CASE WHEN sc.service_contract_id < 65536 THEN 1 ELSE 0 END AS bit),
                   CAST(sc.service_contract_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.service_contracts sc
            ORDER BY sc.name
            "#
        }
        kinds::SERVICE_BROKER_SERVICE => {
            r#"
            SELECT CAST(NULL AS nvarchar(128)), sv.name,
                   CAST(CASE WHEN sv.service_id < 65536 THEN 1 ELSE 0 END AS bit),
                   CAST(sv.service_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.services sv
            ORDER BY sv.name
            "#
        }
        kinds::SERVICE_BROKER_ROUTE => {
            r#"
            SELECT CAST(NULL AS nvarchar(128)), r.name,
                   CAST(CASE WHEN r.name = N'AutoCreatedLocal' THEN 1 ELSE 0 END AS bit),
                   CAST(r.route_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.routes r
            ORDER BY r.name
            "#
        }
        kinds::SERVICE_BROKER_REMOTE_BINDING => {
            r#"
            SELECT CAST(NULL AS nvarchar(128)), b.name, CAST(0 AS bit),
                   CAST(b.remote_service_binding_id AS nvarchar(36)), CAST(0 AS bit)
            FROM sys.remote_service_bindings b
            ORDER BY b.name
            "#
        }
        _ => return None,
    };
    Some(sql)
}

/// Indexes, foreign keys, triggers and check constraints of one table.
pub(crate) const TABLE_CHILDREN_QUERY: &str = r#"
    SELECT 'Index' AS kind, CAST(NULL AS nvarchar(128)), i.name,
           CAST(0 AS bit), CAST(i.index_id AS nvarchar(36)),
           CAST(CASE WHEN i.type = 1 THEN 1 ELSE 0 END AS bit)
    FROM sys.indexes i
    WHERE i.object_id = @P1 AND i.type > 0 AND i.is_hypothetical = 0
    UNION ALL
    SELECT 'ForeignKey', NULL, fk.name,
           CAST(fk.is_ms_shipped AS bit), CAST(fk.object_id AS nvarchar(36)), CAST(0 AS bit)
    FROM sys.foreign_keys fk
    WHERE fk.parent_object_id = @P1
    UNION ALL
    SELECT 'Trigger', NULL, tr.name,
           CAST(tr.is_ms_shipped AS bit), CAST(tr.object_id AS nvarchar(36)), CAST(0 AS bit)
    FROM sys.triggers tr
    WHERE tr.parent_id = @P1
    UNION ALL
    SELECT 'Check', NULL, cc.name,
           CAST(cc.is_ms_shipped AS bit), CAST(cc.object_id AS nvarchar(36)), CAST(0 AS bit)
    FROM sys.check_constraints cc
    WHERE cc.parent_object_id = @P1
    ORDER BY 1, 3
"#;

/// Steps and schedules of one agent job.
pub(crate) const JOB_CHILDREN_QUERY: &str = r#"
    SELECT 'JobStep' AS kind, CAST(NULL AS nvarchar(128)), st.step_name,
           CAST(0 AS bit), CAST(st.step_id AS nvarchar(36)), CAST(0 AS bit)
    FROM msdb.dbo.sysjobsteps st
    WHERE st.job_id = CAST(@P1 AS uniqueidentifier)
    UNION ALL
    SELECT 'JobSchedule', NULL, sc.name,
           CAST(0 AS bit), CAST(sc.schedule_id AS nvarchar(36)), CAST(0 AS bit)
    FROM msdb.dbo.sysjobschedules js
    JOIN msdb.dbo.sysschedules sc ON sc.schedule_id = js.schedule_id
    WHERE js.job_id = CAST(@P1 AS uniqueidentifier)
    ORDER BY 1, 3
"#;

/// Parses a handle column: numeric ids stay numeric, GUIDs stay text.
pub(crate) fn parse_handle(raw: &str) -> ObjectHandle {
    raw.trim()
        .parse::<i64>()
        .map(ObjectHandle::Numeric)
        .unwrap_or_else(|_| ObjectHandle::Text(raw.trim().to_string()))
}

/// Maps a five-column enumeration row starting at `offset`.
fn map_object(row: &Row, kind: ObjectKind, offset: usize, context: &str) -> Result<DatabaseObject> {
    let schema = row.get_text(offset, context)?;
    let name = row.get_text(offset.saturating_add(1), context)?.unwrap_or_default();
    let is_system = row.get_flag(offset.saturating_add(2), context)?;
    let handle = row.get_text(offset.saturating_add(3), context)?;
    let is_clustered = row.get_flag(offset.saturating_add(4), context)?;

    let mut object = DatabaseObject::new(kind, schema.as_deref(), name)
        .with_system_object(is_system)
        .with_clustered(is_clustered);
    if let Some(handle) = handle {
        object = object.with_handle(parse_handle(&handle));
    }
    Ok(object)
}

/// Lists every object of `kind` in the session's database.
pub(crate) async fn list_objects(client: &mut SqlClient, kind: &ObjectKind) -> Result<Vec<DatabaseObject>> {
    let Some(sql) = object_query(kind.as_str()) else {
        return Err(ScriptToolError::unsupported_feature(
            format!("enumerating {}", kind),
            "SQL Server provider",
        ));
    };

    let context = kind.as_str();
    let rows = query_rows(client, sql, &[], context).await?;
    rows.iter()
        .map(|row| map_object(row, kind.clone(), 0, context))
        .collect()
}

/// Lists the children of a table or job; other kinds have none.
pub(crate) async fn list_children(
    client: &mut SqlClient,
    parent: &DatabaseObject,
) -> Result<Vec<DatabaseObject>> {
    let (sql, context) = match parent.kind.as_str() {
        kinds::TABLE => (TABLE_CHILDREN_QUERY, "table children"),
        kinds::JOB => (JOB_CHILDREN_QUERY, "job children"),
        _ => return Ok(Vec::new()),
    };

    let rows = match &parent.handle {
        Some(ObjectHandle::Numeric(id)) => query_rows(client, sql, &[id], context).await?,
        Some(ObjectHandle::Text(id)) => query_rows(client, sql, &[&id.as_str()], context).await?,
        None => {
            return Err(ScriptToolError::query_failed(format!(
                "{} {} has no catalog handle",
                parent.kind,
                parent.qualified_name()
            )));
        }
    };

    rows.iter()
        .map(|row| {
            let kind = row.get_text(0, context)?.unwrap_or_default();
            let mut child = map_object(row, ObjectKind::new(kind), 1, context)?;
            // Children live in their parent's schema
            child.schema.clone_from(&parent.schema);
            Ok(child)
        })
        .collect()
}
