//! Server-level objects: SQL Server Agent jobs and endpoints.
//!
//! Jobs, steps and schedules are scripted as the `msdb` procedure calls that
//! recreate them. Endpoints are rebuilt from `sys.endpoints`; only TCP
//! endpoints carrying database mirroring or Service Broker traffic can be
//! expressed, anything else is reported as unsupported.

use super::connection::SqlClient;
use super::helpers::{RowExt, authorization_clause, query_rows, quote_ident, quote_literal};
use crate::Result;
use crate::error::ScriptToolError;
use crate::models::DatabaseObject;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDef {
    pub enabled: bool,
    pub description: Option<String>,
    pub category: Option<String>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStepDef {
    pub step_id: i32,
    pub subsystem: String,
    pub database_name: Option<String>,
    pub command: String,
    pub on_success_action: i32,
    pub on_fail_action: i32,
    pub retry_attempts: i32,
    pub retry_interval: i32,
}

/// Raw `msdb.dbo.sysschedules` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleDef {
    pub enabled: bool,
    pub freq_type: i32,
    pub freq_interval: i32,
    pub freq_subday_type: i32,
    pub freq_subday_interval: i32,
    pub freq_relative_interval: i32,
    pub freq_recurrence_factor: i32,
    pub active_start_date: i32,
    pub active_end_date: i32,
    pub active_start_time: i32,
    pub active_end_time: i32,
}

/// An endpoint as described by `sys.endpoints` and its protocol views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointDef {
    pub owner: Option<String>,
    /// `STARTED`, `STOPPED` or `DISABLED`
    pub state: String,
    pub protocol: String,
    /// `DATABASE_MIRRORING`, `SERVICE_BROKER`, ...
    pub payload: String,
    pub port: Option<i32>,
    pub ip_address: Option<String>,
    /// Mirroring role, e.g. `PARTNER`, `WITNESS`, `ALL`
    pub role: Option<String>,
    /// `connection_auth_desc`, e.g. `NEGOTIATE`
    pub authentication: Option<String>,
    /// `encryption_algorithm_desc`, e.g. `AES` or `NONE, RC4`
    pub encryption: Option<String>,
}

fn flag(enabled: bool) -> &'static str {
    if enabled { "1" } else { "0" }
}

/// `EXEC procedure @a=..., @b=...` with one parameter per line.
fn exec(procedure: &str, params: &[(&str, String)]) -> String {
    let params = params
        .iter()
        .map(|(name, value)| format!("@{}={}", name, value))
        .collect::<Vec<_>>()
        .join(",\n\t\t");
    format!("EXEC {} {}", procedure, params)
}

/// `sp_add_job` followed by `sp_add_jobserver` for the local server.
pub fn render_job(name: &str, job: &JobDef) -> Vec<String> {
    let mut params = vec![
        ("job_name", quote_literal(name)),
        ("enabled", flag(job.enabled).to_string()),
    ];
    if let Some(description) = &job.description {
        params.push(("description", quote_literal(description)));
    }
    if let Some(category) = &job.category {
        params.push(("category_name", quote_literal(category)));
    }
    if let Some(owner) = &job.owner {
        params.push(("owner_login_name", quote_literal(owner)));
    }

    vec![
        exec("msdb.dbo.sp_add_job", &params),
        exec(
            "msdb.dbo.sp_add_jobserver",
            &[
                ("job_name", quote_literal(name)),
                ("server_name", quote_literal("(local)")),
            ],
        ),
    ]
}

/// `sp_add_jobstep` attaching the step to `job_name`.
pub fn render_job_step(job_name: &str, step_name: &str, step: &JobStepDef) -> String {
    let mut params = vec![
        ("job_name", quote_literal(job_name)),
        ("step_name", quote_literal(step_name)),
        ("step_id", step.step_id.to_string()),
        ("subsystem", quote_literal(&step.subsystem)),
    ];
    if let Some(database) = &step.database_name {
        params.push(("database_name", quote_literal(database)));
    }
    params.extend([
        ("on_success_action", step.on_success_action.to_string()),
        ("on_fail_action", step.on_fail_action.to_string()),
        ("retry_attempts", step.retry_attempts.to_string()),
        ("retry_interval", step.retry_interval.to_string()),
        ("command", quote_literal(&step.command)),
    ]);
    exec("msdb.dbo.sp_add_jobstep", &params)
}

/// `sp_add_jobschedule` attaching the schedule to `job_name`.
pub fn render_job_schedule(job_name: &str, schedule_name: &str, schedule: &ScheduleDef) -> String {
    exec(
        "msdb.dbo.sp_add_jobschedule",
        &[
            ("job_name", quote_literal(job_name)),
            ("name", quote_literal(schedule_name)),
            ("enabled", flag(schedule.enabled).to_string()),
            ("freq_type", schedule.freq_type.to_string()),
            ("freq_interval", schedule.freq_interval.to_string()),
            ("freq_subday_type", schedule.freq_subday_type.to_string()),
            ("freq_subday_interval", schedule.freq_subday_interval.to_string()),
            ("freq_relative_interval", schedule.freq_relative_interval.to_string()),
            ("freq_recurrence_factor", schedule.freq_recurrence_factor.to_string()),
            ("active_start_date", schedule.active_start_date.to_string()),
            ("active_end_date", schedule.active_end_date.to_string()),
            ("active_start_time", schedule.active_start_time.to_string()),
            ("active_end_time", schedule.active_end_time.to_string()),
        ],
    )
}

/// Maps `encryption_algorithm_desc` to the `ENCRYPTION` option.
fn encryption_option(desc: &str) -> String {
    match desc {
        "NONE" => "DISABLED".to_string(),
        other => match other.strip_prefix("NONE, ") {
            Some(algorithms) => format!("SUPPORTED ALGORITHM {}", algorithms.replace(", ", " ")),
            None => format!("REQUIRED ALGORITHM {}", other.replace(", ", " ")),
        },
    }
}

/// `CREATE ENDPOINT` for a TCP mirroring or Service Broker endpoint.
///
/// # Errors
/// Returns an unsupported-feature error for other protocols or payloads.
pub fn render_endpoint(name: &str, endpoint: &EndpointDef) -> Result<String> {
    if endpoint.protocol != "TCP" {
        return Err(ScriptToolError::unsupported_feature(
            format!("{} endpoint {}", endpoint.protocol, name),
            "SQL Server provider",
        ));
    }

    let mut payload_options = Vec::new();
    match endpoint.payload.as_str() {
        "DATABASE_MIRRORING" => {
            payload_options.push(format!(
                "ROLE = {}",
                endpoint.role.as_deref().unwrap_or("ALL")
            ));
        }
        "SERVICE_BROKER" => {}
        other => {
            return Err(ScriptToolError::unsupported_feature(
                format!("{} endpoint {}", other, name),
                "SQL Server provider",
            ));
        }
    }
    if let Some(auth) = endpoint
        .authentication
        .as_deref()
        .filter(|a| matches!(*a, "NTLM" | "KERBEROS" | "NEGOTIATE"))
    {
        payload_options.push(format!("AUTHENTICATION = WINDOWS {}", auth));
    }
    if let Some(encryption) = &endpoint.encryption {
        payload_options.push(format!("ENCRYPTION = {}", encryption_option(encryption)));
    }

    let listener_ip = match &endpoint.ip_address {
        Some(ip) => format!("({})", ip),
        None => "ALL".to_string(),
    };
    Ok(format!(
        "CREATE ENDPOINT {}{}\n\tSTATE = {}\n\tAS TCP (LISTENER_PORT = {}, LISTENER_IP = {})\n\tFOR {} ({})",
        quote_ident(name),
        authorization_clause(endpoint.owner.as_deref()),
        endpoint.state,
        endpoint.port.unwrap_or(0),
        listener_ip,
        endpoint.payload,
        payload_options.join(", ")
    ))
}

pub(crate) async fn script_job(client: &mut SqlClient, job: &DatabaseObject, job_id: &str) -> Result<Vec<String>> {
    let sql = r#"
        SELECT
            j.enabled,
            CAST(j.description AS nvarchar(512)),
            CAST(c.name AS nvarchar(128)),
            CAST(SUSER_SNAME(j.owner_sid) AS nvarchar(128))
        FROM msdb.dbo.sysjobs j
        LEFT JOIN msdb.dbo.syscategories c ON c.category_id = j.category_id
        WHERE j.job_id = CAST(@P1 AS uniqueidentifier)
    "#;
    let context = "msdb.dbo.sysjobs";
    let rows = query_rows(client, sql, &[&job_id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let def = JobDef {
        enabled: row.get_field::<u8>(0, context)?.unwrap_or(0) != 0,
        description: row
            .get_text(1, context)?
            .filter(|d| !d.is_empty() && d != "No description available."),
        category: row.get_text(2, context)?,
        owner: row.get_text(3, context)?,
    };
    Ok(render_job(&job.name, &def))
}

pub(crate) async fn script_job_step(
    client: &mut SqlClient,
    job: &DatabaseObject,
    job_id: &str,
    step: &DatabaseObject,
    step_id: i64,
) -> Result<Vec<String>> {
    let sql = r#"
        SELECT
            CAST(st.subsystem AS nvarchar(40)),
            CAST(st.database_name AS nvarchar(128)),
            CAST(st.command AS nvarchar(max)),
            CAST(st.on_success_action AS int),
            CAST(st.on_fail_action AS int),
            CAST(st.retry_attempts AS int),
            CAST(st.retry_interval AS int)
        FROM msdb.dbo.sysjobsteps st
        WHERE st.job_id = CAST(@P1 AS uniqueidentifier) AND st.step_id = @P2
    "#;
    let context = "msdb.dbo.sysjobsteps";
    let rows = query_rows(client, sql, &[&job_id, &step_id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let def = JobStepDef {
        step_id: i32::try_from(step_id).unwrap_or(i32::MAX),
        subsystem: row.get_text(0, context)?.unwrap_or_else(|| "TSQL".to_string()),
        database_name: row.get_text(1, context)?,
        command: row.get_text(2, context)?.unwrap_or_default(),
        on_success_action: row.get_field::<i32>(3, context)?.unwrap_or(1),
        on_fail_action: row.get_field::<i32>(4, context)?.unwrap_or(2),
        retry_attempts: row.get_field::<i32>(5, context)?.unwrap_or(0),
        retry_interval: row.get_field::<i32>(6, context)?.unwrap_or(0),
    };
    Ok(vec![render_job_step(&job.name, &step.name, &def)])
}

pub(crate) async fn script_job_schedule(
    client: &mut SqlClient,
    job: &DatabaseObject,
    schedule: &DatabaseObject,
    schedule_id: i64,
) -> Result<Vec<String>> {
    let sql = r#"
        SELECT
            CAST(s.enabled AS bit),
            s.freq_type, s.freq_interval, s.freq_subday_type, s.freq_subday_interval,
            s.freq_relative_interval, s.freq_recurrence_factor,
            s.active_start_date, s.active_end_date, s.active_start_time, s.active_end_time
        FROM msdb.dbo.sysschedules s
        WHERE s.schedule_id = @P1
    "#;
    let context = "msdb.dbo.sysschedules";
    let rows = query_rows(client, sql, &[&schedule_id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let int = |idx: usize| -> Result<i32> { Ok(row.get_field::<i32>(idx, context)?.unwrap_or(0)) };
    let def = ScheduleDef {
        enabled: row.get_flag(0, context)?,
        freq_type: int(1)?,
        freq_interval: int(2)?,
        freq_subday_type: int(3)?,
        freq_subday_interval: int(4)?,
        freq_relative_interval: int(5)?,
        freq_recurrence_factor: int(6)?,
        active_start_date: int(7)?,
        active_end_date: int(8)?,
        active_start_time: int(9)?,
        active_end_time: int(10)?,
    };
    Ok(vec![render_job_schedule(&job.name, &schedule.name, &def)])
}

pub(crate) async fn script_endpoint(
    client: &mut SqlClient,
    endpoint: &DatabaseObject,
    endpoint_id: i64,
) -> Result<Vec<String>> {
    let sql = r#"
        SELECT
            CAST(SUSER_SNAME(e.principal_id) AS nvarchar(128)),
            CAST(e.state_desc AS nvarchar(60)),
            CAST(e.protocol_desc AS nvarchar(60)),
            CAST(e.type_desc AS nvarchar(60)),
            CAST(t.port AS int),
            CAST(t.ip_address AS nvarchar(45)),
            CAST(dm.role_desc AS nvarchar(60)),
            CAST(COALESCE(dm.connection_auth_desc, sb.connection_auth_desc) AS nvarchar(60)),
            CAST(COALESCE(dm.encryption_algorithm_desc, sb.encryption_algorithm_desc) AS nvarchar(60))
        FROM sys.endpoints e
        LEFT JOIN sys.tcp_endpoints t ON t.endpoint_id = e.endpoint_id
        LEFT JOIN sys.database_mirroring_endpoints dm ON dm.endpoint_id = e.endpoint_id
        LEFT JOIN sys.service_broker_endpoints sb ON sb.endpoint_id = e.endpoint_id
        WHERE e.endpoint_id = @P1
    "#;
    let context = "sys.endpoints";
    let rows = query_rows(client, sql, &[&endpoint_id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let def = EndpointDef {
        owner: row.get_text(0, context)?,
        state: row.get_text(1, context)?.unwrap_or_else(|| "STOPPED".to_string()),
        protocol: row.get_text(2, context)?.unwrap_or_default(),
        payload: row.get_text(3, context)?.unwrap_or_default(),
        port: row.get_field::<i32>(4, context)?,
        ip_address: row.get_text(5, context)?,
        role: row.get_text(6, context)?,
        authentication: row.get_text(7, context)?,
        encryption: row.get_text(8, context)?,
    };
    Ok(vec![render_endpoint(&endpoint.name, &def)?])
}
