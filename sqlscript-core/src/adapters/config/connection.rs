//! Server connection configuration.
//!
//! `ConnectionConfig` is read once at startup and shared read-only by every
//! extraction unit. The password is accepted from settings so it can be
//! turned into [`Credentials`], but it is never serialized back out and never
//! shown by `Debug` or `Display`.

use crate::error::ScriptToolError;
use crate::security::Credentials;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

fn default_connect_timeout_secs() -> u64 {
    30
}

/// Configuration for reaching the server and choosing databases.
///
/// # Example
/// ```rust
/// use sqlscript_core::adapters::ConnectionConfig;
///
/// let config = ConnectionConfig::new("sql01")
///     .with_databases(vec!["Sales".to_string(), "Billing".to_string()])
///     .with_login("backup_reader", Some("secret".to_string()));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.targets().unwrap(), vec!["Sales", "Billing"]);
/// assert!(!format!("{:?}", config).contains("secret"));
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectionConfig {
    /// Server name: `host`, `host,port` or `host\instance`
    #[serde(default)]
    pub server: String,
    /// Single target used when `databases` is empty
    #[serde(default)]
    pub database: Option<String>,
    /// Databases to extract, one unit of work each
    #[serde(default)]
    pub databases: Vec<String>,
    /// SQL login; integrated/driver-default authentication when absent
    #[serde(default)]
    pub login: Option<String>,
    /// Password for `login`
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Seconds allowed for establishing one session
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Accept the server certificate without validation
    #[serde(default)]
    pub trust_server_certificate: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            database: None,
            databases: Vec::new(),
            login: None,
            password: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            trust_server_certificate: false,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("databases", &self.databases)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .finish()
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets = if self.databases.is_empty() {
            self.database.clone().unwrap_or_default()
        } else {
            self.databases.join(",")
        };
        write!(f, "ConnectionConfig({}/{})", self.server, targets)
        // Intentionally omit login and never include credentials
    }
}

impl ConnectionConfig {
    /// Creates a new connection config for `server` with defaults.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Default::default()
        }
    }

    /// Builder method to set the single-target database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Builder method to set the database list.
    pub fn with_databases(mut self, databases: Vec<String>) -> Self {
        self.databases = databases;
        self
    }

    /// Builder method to set the SQL login.
    pub fn with_login(mut self, login: impl Into<String>, password: Option<String>) -> Self {
        self.login = Some(login.into());
        self.password = password;
        self
    }

    /// Session establishment deadline.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Databases to extract, in configured order.
    ///
    /// The list wins; otherwise the single embedded target is used.
    ///
    /// # Errors
    /// Returns a configuration error when neither is set.
    pub fn targets(&self) -> crate::Result<Vec<String>> {
        if !self.databases.is_empty() {
            return Ok(self.databases.clone());
        }
        match self.database.as_deref() {
            Some(db) if !db.trim().is_empty() => Ok(vec![db.to_string()]),
            _ => Err(ScriptToolError::configuration(
                "no target database: set Databases or Database",
            )),
        }
    }

    /// Credentials for SQL authentication, if a login is configured.
    pub fn credentials(&self) -> Option<Credentials> {
        self.login
            .as_deref()
            .filter(|login| !login.is_empty())
            .map(|login| Credentials::new(login.to_string(), self.password.clone()))
    }

    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns error if the server is missing, no database can be resolved,
    /// a listed database name is blank or the timeout is zero.
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.trim().is_empty() {
            return Err(ScriptToolError::configuration("server cannot be empty"));
        }

        ServerAddress::parse(&self.server)?;

        if self.databases.iter().any(|db| db.trim().is_empty()) {
            return Err(ScriptToolError::configuration(
                "database names in Databases cannot be empty",
            ));
        }

        self.targets()?;

        if self.connect_timeout_secs == 0 {
            return Err(ScriptToolError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// A server name split into its network parts.
///
/// Accepts the usual SQL Server spellings: `host`, `host,port`,
/// `host\instance` and an optional `tcp:` prefix. `.` and `(local)` mean
/// localhost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: Option<u16>,
    pub instance: Option<String>,
}

impl ServerAddress {
    /// Parses a server name.
    ///
    /// # Errors
    /// Returns a configuration error for an empty host or a non-numeric port.
    pub fn parse(server: &str) -> crate::Result<Self> {
        let trimmed = server.trim();
        let trimmed = trimmed
            .strip_prefix("tcp:")
            .or_else(|| trimmed.strip_prefix("TCP:"))
            .unwrap_or(trimmed);

        let (host_part, port) = match trimmed.split_once(',') {
            Some((host, port)) => {
                let port = port.trim().parse::<u16>().map_err(|_| {
                    ScriptToolError::configuration(format!("invalid port in server '{}'", server))
                })?;
                if port == 0 {
                    return Err(ScriptToolError::configuration(
                        "port must be greater than 0",
                    ));
                }
                (host, Some(port))
            }
            None => (trimmed, None),
        };

        let (host, instance) = match host_part.split_once('\\') {
            Some((host, instance)) if !instance.is_empty() => (host, Some(instance.to_string())),
            Some((host, _)) => (host, None),
            None => (host_part, None),
        };

        let host = match host.trim() {
            "" => {
                return Err(ScriptToolError::configuration(format!(
                    "server '{}' has no host",
                    server
                )));
            }
            "." | "(local)" => "localhost".to_string(),
            other => other.to_string(),
        };

        Ok(Self {
            host,
            port,
            instance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_default() {
        let config = ConnectionConfig::default();
        assert!(config.server.is_empty());
        assert!(config.databases.is_empty());
        assert_eq!(config.connect_timeout_secs, 30);
        assert!(!config.trust_server_certificate);
    }

    #[test]
    fn test_connection_config_validation() {
        let config = ConnectionConfig::new("localhost").with_database("master");
        assert!(config.validate().is_ok());

        // Empty server should fail
        let config = ConnectionConfig::new("").with_database("master");
        assert!(config.validate().is_err());

        // No target should fail
        let config = ConnectionConfig::new("localhost");
        assert!(config.validate().is_err());

        // Blank entry in the list should fail
        let config = ConnectionConfig::new("localhost")
            .with_databases(vec!["Sales".to_string(), " ".to_string()]);
        assert!(config.validate().is_err());

        // Zero timeout should fail
        let config = ConnectionConfig {
            connect_timeout_secs: 0,
            ..ConnectionConfig::new("localhost").with_database("master")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_targets_prefer_list() {
        let config = ConnectionConfig::new("sql01")
            .with_database("master")
            .with_databases(vec!["A".to_string(), "B".to_string()]);
        assert_eq!(config.targets().unwrap(), vec!["A", "B"]);

        let single = ConnectionConfig::new("sql01").with_database("master");
        assert_eq!(single.targets().unwrap(), vec!["master"]);
    }

    #[test]
    fn test_credentials_only_with_login() {
        assert!(ConnectionConfig::new("sql01").credentials().is_none());

        let config = ConnectionConfig::new("sql01").with_login("", Some("x".to_string()));
        assert!(config.credentials().is_none());

        let config = ConnectionConfig::new("sql01").with_login("sa", Some("x".to_string()));
        let creds = config.credentials().unwrap();
        assert_eq!(creds.login(), "sa");
        assert!(creds.has_password());
    }

    #[test]
    fn test_display_and_debug_hide_credentials() {
        let config = ConnectionConfig::new("sql01")
            .with_databases(vec!["Sales".to_string()])
            .with_login("backup_user", Some("p@ssw0rd".to_string()));

        let display = format!("{}", config);
        assert!(display.contains("sql01"));
        assert!(display.contains("Sales"));
        assert!(!display.contains("backup_user"));
        assert!(!display.contains("p@ssw0rd"));

        let debug = format!("{:?}", config);
        assert!(!debug.contains("p@ssw0rd"));
        assert!(debug.contains("****"));
    }

    #[test]
    fn test_password_never_serialized() {
        let config = ConnectionConfig::new("sql01").with_login("sa", Some("secret".to_string()));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"Server\":\"sql01\""));
    }

    #[test]
    fn test_deserialize_pascal_case() {
        let json = r#"{
            "Server": "sql01,1433",
            "Databases": ["Sales", "Billing"],
            "Login": "sa",
            "Password": "secret"
        }"#;
        let config: ConnectionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.server, "sql01,1433");
        assert_eq!(config.databases.len(), 2);
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.connect_timeout_secs, 30);
    }

    #[test]
    fn test_server_address_forms() {
        assert_eq!(
            ServerAddress::parse("sql01").unwrap(),
            ServerAddress {
                host: "sql01".to_string(),
                port: None,
                instance: None
            }
        );

        let with_port = ServerAddress::parse("tcp:sql01,14330").unwrap();
        assert_eq!(with_port.host, "sql01");
        assert_eq!(with_port.port, Some(14330));

        let named = ServerAddress::parse(r"sql01\REPORTING").unwrap();
        assert_eq!(named.host, "sql01");
        assert_eq!(named.instance.as_deref(), Some("REPORTING"));

        assert_eq!(ServerAddress::parse(".").unwrap().host, "localhost");
        assert_eq!(ServerAddress::parse("(local)").unwrap().host, "localhost");
    }

    #[test]
    fn test_server_address_rejects_bad_input() {
        assert!(ServerAddress::parse("").is_err());
        assert!(ServerAddress::parse(",1433").is_err());
        assert!(ServerAddress::parse("sql01,abc").is_err());
        assert!(ServerAddress::parse("sql01,0").is_err());
    }
}
