//! Service Broker objects: message types, contracts, queues, services,
//! routes and remote service bindings.

use super::connection::SqlClient;
use super::helpers::{
    RowExt, authorization_clause, query_rows, quote_ident, quote_literal, quote_qualified,
};
use crate::Result;
use crate::models::{DatabaseObject, ServerVersion};

/// A message type; `validation` is `sys.service_message_types.validation_desc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageTypeDef {
    pub owner: Option<String>,
    pub validation: String,
    /// Bracketed `[schema].[collection]` for schema-validated XML
    pub schema_collection: Option<String>,
}

/// One message type usage inside a contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractMessage {
    pub message_type: String,
    pub sent_by_initiator: bool,
    pub sent_by_target: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractDef {
    pub owner: Option<String>,
    pub messages: Vec<ContractMessage>,
}

/// Activation settings of a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueActivation {
    pub enabled: bool,
    /// Three-part bracketed name as stored by the catalog
    pub procedure: String,
    pub max_readers: i32,
    /// `OWNER`, `SELF` or a quoted user name
    pub execute_as: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDef {
    pub enabled: bool,
    pub retention: bool,
    pub activation: Option<QueueActivation>,
    /// `None` on servers without poison message handling
    pub poison_message_handling: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDef {
    pub owner: Option<String>,
    pub queue_schema: String,
    pub queue_name: String,
    pub contracts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDef {
    pub owner: Option<String>,
    pub remote_service_name: Option<String>,
    pub broker_instance: Option<String>,
    pub address: String,
    pub mirror_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteBindingDef {
    pub owner: Option<String>,
    pub remote_service_name: String,
    pub user: String,
    pub anonymous: bool,
}

fn on_off(flag: bool) -> &'static str {
    if flag { "ON" } else { "OFF" }
}

/// `CREATE MESSAGE TYPE`.
pub fn render_message_type(name: &str, def: &MessageTypeDef) -> String {
    let validation = match (def.validation.as_str(), &def.schema_collection) {
        ("XML", Some(collection)) => format!("VALID_XML WITH SCHEMA COLLECTION {}", collection),
        ("XML", None) => "WELL_FORMED_XML".to_string(),
        ("EMPTY", _) => "EMPTY".to_string(),
        _ => "NONE".to_string(),
    };
    format!(
        "CREATE MESSAGE TYPE {}{}\nVALIDATION = {}",
        quote_ident(name),
        authorization_clause(def.owner.as_deref()),
        validation
    )
}

/// `CREATE CONTRACT` listing each message type and its sender.
pub fn render_contract(name: &str, def: &ContractDef) -> String {
    let messages = def
        .messages
        .iter()
        .map(|m| {
            let sender = match (m.sent_by_initiator, m.sent_by_target) {
                (true, true) => "ANY",
                (true, false) => "INITIATOR",
                _ => "TARGET",
            };
            format!("\t{} SENT BY {}", quote_ident(&m.message_type), sender)
        })
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "CREATE CONTRACT {}{}\n(\n{}\n)",
        quote_ident(name),
        authorization_clause(def.owner.as_deref()),
        messages
    )
}

/// `CREATE QUEUE` with status, retention, activation and poison handling.
pub fn render_queue(schema: Option<&str>, name: &str, def: &QueueDef) -> String {
    let mut options = vec![
        format!("STATUS = {}", on_off(def.enabled)),
        format!("RETENTION = {}", on_off(def.retention)),
    ];
    if let Some(activation) = &def.activation {
        options.push(format!(
            "ACTIVATION (\n\t\tSTATUS = {},\n\t\tPROCEDURE_NAME = {},\n\t\tMAX_QUEUE_READERS = {},\n\t\tEXECUTE AS {}\n\t)",
            on_off(activation.enabled),
            activation.procedure,
            activation.max_readers,
            activation.execute_as
        ));
    }
    if let Some(poison) = def.poison_message_handling {
        options.push(format!("POISON_MESSAGE_HANDLING (STATUS = {})", on_off(poison)));
    }
    format!(
        "CREATE QUEUE {}\nWITH {}",
        quote_qualified(schema, name),
        options.join(",\n\t")
    )
}

/// `CREATE SERVICE` bound to its queue and contracts.
pub fn render_service(name: &str, def: &ServiceDef) -> String {
    let mut sql = format!(
        "CREATE SERVICE {}{}\nON QUEUE {}",
        quote_ident(name),
        authorization_clause(def.owner.as_deref()),
        quote_qualified(Some(&def.queue_schema), &def.queue_name)
    );
    if !def.contracts.is_empty() {
        let contracts = def
            .contracts
            .iter()
            .map(|c| format!("\t{}", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(",\n");
        sql.push_str(&format!("\n(\n{}\n)", contracts));
    }
    sql
}

/// `CREATE ROUTE`; unset options are left out.
pub fn render_route(name: &str, def: &RouteDef) -> String {
    let mut options = Vec::new();
    if let Some(service) = &def.remote_service_name {
        options.push(format!("SERVICE_NAME = {}", quote_literal(service)));
    }
    if let Some(instance) = &def.broker_instance {
        options.push(format!("BROKER_INSTANCE = {}", quote_literal(instance)));
    }
    options.push(format!("ADDRESS = {}", quote_literal(&def.address)));
    if let Some(mirror) = &def.mirror_address {
        options.push(format!("MIRROR_ADDRESS = {}", quote_literal(mirror)));
    }
    format!(
        "CREATE ROUTE {}{}\nWITH {}",
        quote_ident(name),
        authorization_clause(def.owner.as_deref()),
        options.join(",\n\t")
    )
}

/// `CREATE REMOTE SERVICE BINDING`.
pub fn render_remote_binding(name: &str, def: &RemoteBindingDef) -> String {
    format!(
        "CREATE REMOTE SERVICE BINDING {}{}\nTO SERVICE {}\nWITH USER = {}, ANONYMOUS = {}",
        quote_ident(name),
        authorization_clause(def.owner.as_deref()),
        quote_literal(&def.remote_service_name),
        quote_ident(&def.user),
        on_off(def.anonymous)
    )
}

/// Formats the principal a queue activates as.
pub(crate) fn execute_as(principal_id: Option<i32>, user_name: Option<&str>) -> String {
    match (principal_id, user_name) {
        (Some(-2), _) => "OWNER".to_string(),
        (Some(_), Some(user)) => quote_literal(user),
        _ => "SELF".to_string(),
    }
}

pub(crate) async fn script_message_type(
    client: &mut SqlClient,
    id: i64,
    object: &DatabaseObject,
) -> Result<Vec<String>> {
    let sql = r#"
        SELECT
            CAST(USER_NAME(mt.principal_id) AS nvarchar(128)),
            CAST(mt.validation_desc AS nvarchar(60)),
            CASE WHEN xc.name IS NULL THEN NULL
                 ELSE CAST(QUOTENAME(xs.name) + N'.' + QUOTENAME(xc.name) AS nvarchar(300)) END
        FROM sys.service_message_types mt
        LEFT JOIN sys.xml_schema_collections xc ON xc.xml_collection_id = mt.xml_collection_id
        LEFT JOIN sys.schemas xs ON xs.schema_id = xc.schema_id
        WHERE mt.message_type_id = @P1
    "#;
    let context = "sys.service_message_types";
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let def = MessageTypeDef {
        owner: row.get_text(0, context)?,
        validation: row.get_text(1, context)?.unwrap_or_default(),
        schema_collection: row.get_text(2, context)?,
    };
    Ok(vec![render_message_type(&object.name, &def)])
}

pub(crate) async fn script_contract(
    client: &mut SqlClient,
    id: i64,
    object: &DatabaseObject,
) -> Result<Vec<String>> {
    let sql = r#"
        SELECT
            CAST(USER_NAME(sc.principal_id) AS nvarchar(128)),
            mt.name,
            u.is_sent_by_initiator,
            u.is_sent_by_target
        FROM sys.service_contracts sc
        LEFT JOIN sys.service_contract_message_usages u
            ON u.service_contract_id = sc.service_contract_id
        LEFT JOIN sys.service_message_types mt ON mt.message_type_id = u.message_type_id
        WHERE sc.service_contract_id = @P1
        ORDER BY mt.name
    "#;
    let context = "sys.service_contracts";
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    let mut def = ContractDef {
        owner: first.get_text(0, context)?,
        messages: Vec::with_capacity(rows.len()),
    };
    for row in &rows {
        let Some(message_type) = row.get_text(1, context)? else {
            continue;
        };
        def.messages.push(ContractMessage {
            message_type,
            sent_by_initiator: row.get_flag(2, context)?,
            sent_by_target: row.get_flag(3, context)?,
        });
    }
    Ok(vec![render_contract(&object.name, &def)])
}

pub(crate) async fn script_queue(
    client: &mut SqlClient,
    version: ServerVersion,
    id: i64,
    object: &DatabaseObject,
) -> Result<Vec<String>> {
    // Poison message handling arrived with SQL Server 2008 R2 (10.50)
    let poison = if version.meets(11) || (version.major == 10 && version.minor >= 50) {
        "q.is_poison_message_handling_enabled"
    } else {
        "CAST(NULL AS bit)"
    };
    let sql = format!(
        r#"
        SELECT
            q.is_receive_enabled,
            q.is_retention_enabled,
            q.is_activation_enabled,
            CAST(q.activation_procedure AS nvarchar(776)),
            CAST(q.max_readers AS int),
            CAST(q.execute_as_principal_id AS int),
            CAST(USER_NAME(q.execute_as_principal_id) AS nvarchar(128)),
            {poison}
        FROM sys.service_queues q
        WHERE q.object_id = @P1
        "#
    );
    let context = "sys.service_queues";
    let rows = query_rows(client, &sql, &[&id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let activation = match row.get_text(3, context)? {
        Some(procedure) => Some(QueueActivation {
            enabled: row.get_flag(2, context)?,
            procedure,
            max_readers: row.get_field::<i32>(4, context)?.unwrap_or(0),
            execute_as: execute_as(
                row.get_field::<i32>(5, context)?,
                row.get_text(6, context)?.as_deref(),
            ),
        }),
        None => None,
    };
    let def = QueueDef {
        enabled: row.get_flag(0, context)?,
        retention: row.get_flag(1, context)?,
        activation,
        poison_message_handling: row.get_field::<bool>(7, context)?,
    };
    Ok(vec![render_queue(object.schema.as_deref(), &object.name, &def)])
}

pub(crate) async fn script_service(
    client: &mut SqlClient,
    id: i64,
    object: &DatabaseObject,
) -> Result<Vec<String>> {
    let sql = r#"
        SELECT
            CAST(USER_NAME(sv.principal_id) AS nvarchar(128)),
            qs.name,
            q.name,
            sc.name
        FROM sys.services sv
        JOIN sys.service_queues q ON q.object_id = sv.service_queue_id
        JOIN sys.schemas qs ON qs.schema_id = q.schema_id
        LEFT JOIN sys.service_contract_usages cu ON cu.service_id = sv.service_id
        LEFT JOIN sys.service_contracts sc ON sc.service_contract_id = cu.service_contract_id
        WHERE sv.service_id = @P1
        ORDER BY sc.name
    "#;
    let context = "sys.services";
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    let mut def = ServiceDef {
        owner: first.get_text(0, context)?,
        queue_schema: first.get_text(1, context)?.unwrap_or_default(),
        queue_name: first.get_text(2, context)?.unwrap_or_default(),
        contracts: Vec::with_capacity(rows.len()),
    };
    for row in &rows {
        if let Some(contract) = row.get_text(3, context)? {
            def.contracts.push(contract);
        }
    }
    Ok(vec![render_service(&object.name, &def)])
}

pub(crate) async fn script_route(
    client: &mut SqlClient,
    id: i64,
    object: &DatabaseObject,
) -> Result<Vec<String>> {
    let sql = r#"
        SELECT
            CAST(USER_NAME(r.principal_id) AS nvarchar(128)),
            CAST(r.remote_service_name AS nvarchar(256)),
            CAST(r.broker_instance AS nvarchar(128)),
            CAST(r.address AS nvarchar(256)),
            CAST(r.mirror_address AS nvarchar(256))
        FROM sys.routes r
        WHERE r.route_id = @P1
    "#;
    let context = "sys.routes";
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let def = RouteDef {
        owner: row.get_text(0, context)?,
        remote_service_name: row.get_text(1, context)?,
        broker_instance: row.get_text(2, context)?,
        address: row.get_text(3, context)?.unwrap_or_default(),
        mirror_address: row.get_text(4, context)?,
    };
    Ok(vec![render_route(&object.name, &def)])
}

pub(crate) async fn script_remote_binding(
    client: &mut SqlClient,
    id: i64,
    object: &DatabaseObject,
) -> Result<Vec<String>> {
    let sql = r#"
        SELECT
            CAST(USER_NAME(b.principal_id) AS nvarchar(128)),
            CAST(b.remote_service_name AS nvarchar(256)),
            CAST(USER_NAME(b.remote_principal_id) AS nvarchar(128)),
            b.is_anonymous_on
        FROM sys.remote_service_bindings b
        WHERE b.remote_service_binding_id = @P1
    "#;
    let context = "sys.remote_service_bindings";
    let rows = query_rows(client, sql, &[&id], context).await?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let def = RemoteBindingDef {
        owner: row.get_text(0, context)?,
        remote_service_name: row.get_text(1, context)?.unwrap_or_default(),
        user: row.get_text(2, context)?.unwrap_or_default(),
        anonymous: row.get_flag(3, context)?,
    };
    Ok(vec![render_remote_binding(&object.name, &def)])
}
