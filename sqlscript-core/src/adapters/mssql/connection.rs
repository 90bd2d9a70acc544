//! Session establishment for the SQL Server provider.

use super::helpers::{RowExt, query_rows};
use crate::adapters::{ServerAddress, SessionTarget};
use crate::models::ServerVersion;
use crate::{Result, error::ScriptToolError};
use tiberius::{AuthMethod, Client, Config, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

pub(crate) type SqlClient = Client<Compat<TcpStream>>;

/// Database used by the server-level session.
const SERVER_SESSION_DATABASE: &str = "master";

/// Builds the tiberius config for one session.
///
/// # Errors
/// Returns a configuration error if the server name cannot be parsed.
pub(crate) fn build_config(target: &SessionTarget) -> Result<Config> {
    let address = ServerAddress::parse(&target.server)?;

    let mut config = Config::new();
    config.host(&address.host);
    if let Some(port) = address.port {
        config.port(port);
    }
    if let Some(instance) = &address.instance {
        config.instance_name(instance);
    }
    config.database(target.database.as_deref().unwrap_or(SERVER_SESSION_DATABASE));
    config.application_name("sqlscript-generator");

    match &target.credentials {
        Some(credentials) => {
            config.authentication(AuthMethod::sql_server(
                credentials.login(),
                credentials.password(),
            ));
        }
        None => debug!("No login configured, using driver default authentication"),
    }

    if target.trust_server_certificate {
        config.trust_cert();
    }

    Ok(config)
}

/// Opens a client within `target.connect_timeout`.
///
/// Named instances are resolved through the SQL Browser service.
///
/// # Errors
/// Returns a connection error if the TCP connect or login fails, or a
/// timeout error when the deadline passes.
pub(crate) async fn connect(target: &SessionTarget) -> Result<SqlClient> {
    let config = build_config(target)?;
    let context = format!(
        "connecting to {}/{}",
        target.server,
        target.database.as_deref().unwrap_or(SERVER_SESSION_DATABASE)
    );

    let named = ServerAddress::parse(&target.server)?.instance.is_some();

    let attempt = async {
        let tcp = if named {
            TcpStream::connect_named(&config).await
        } else {
            TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| tiberius::error::Error::Io {
                    kind: e.kind(),
                    message: e.to_string(),
                })
        }?;
        tcp.set_nodelay(true).ok();
        Client::connect(config, tcp.compat_write()).await
    };

    match tokio::time::timeout(target.connect_timeout, attempt).await {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(e)) => Err(ScriptToolError::connection_failed(context, e)),
        Err(_) => Err(ScriptToolError::timeout(context, target.connect_timeout)),
    }
}

/// Network name and product version of the connected server.
///
/// # Errors
/// Returns error if the server properties cannot be read or the version
/// string is unrecognized.
pub(crate) async fn server_identity(
    client: &mut SqlClient,
    fallback_name: &str,
) -> Result<(String, ServerVersion)> {
    let sql = r#"
        SELECT
            CAST(SERVERPROPERTY('MachineName') AS nvarchar(128)) AS machine_name,
            CAST(@@SERVERNAME AS nvarchar(128)) AS server_name,
            CAST(SERVERPROPERTY('ProductVersion') AS nvarchar(128)) AS product_version
    "#;
    let rows = query_rows(client, sql, &[], "SERVERPROPERTY").await?;
    let row = rows
        .first()
        .ok_or_else(|| ScriptToolError::query_failed("SERVERPROPERTY returned no rows"))?;

    let name = row
        .get_text(0, "SERVERPROPERTY")?
        .or(row.get_text(1, "SERVERPROPERTY")?)
        .unwrap_or_else(|| fallback_name.to_string());
    let version = ServerVersion::parse(
        &row.get_text(2, "SERVERPROPERTY")?.unwrap_or_default(),
    )?;

    Ok((name, version))
}
