//! Service configuration.
//!
//! `AppConfig` carries server settings; `resolve` turns an environment
//! snapshot into the immutable [`ConnectionDescriptor`].

use std::collections::HashMap;

use crate::errors::ConfigError;
use crate::models::connection::{ConnectionDescriptor, DbKind, Password};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 81;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Listen port variables, highest precedence first.
const PORT_VARS: [&str; 3] = ["WAS_PORT", "WEB_PORT", "PORT"];

/// Server configuration shared by handlers.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name used in logs and response metadata.
    pub service_name: String,
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Upper bound for a single database connect attempt.
    pub connect_timeout_secs: u64,
    /// Maximum pooled connections for relational stores.
    pub max_connections: u32,
}

impl AppConfig {
    /// Loads the configuration from the process environment.
    pub fn load_with_service(service_name: &str) -> Self {
        Self::from_vars(service_name, &env_snapshot())
    }

    /// Builds the configuration from an environment snapshot.
    pub fn from_vars(service_name: &str, vars: &HashMap<String, String>) -> Self {
        let port = PORT_VARS
            .iter()
            .find_map(|key| lookup(vars, key))
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            service_name: service_name.to_string(),
            host: lookup(vars, "HOST").unwrap_or(DEFAULT_HOST).to_string(),
            port,
            connect_timeout_secs: lookup(vars, "DB_CONNECT_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_connections: lookup(vars, "DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        }
    }

    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Resolves the connection descriptor from an environment snapshot.
///
/// An explicit `DB_TYPE` always wins. Without it the kind is inferred from
/// `DB_PORT` (5432, 3306, 27017); anything else, including a port that does
/// not parse, yields [`DbKind::Unset`]. Missing host or database name is not
/// an error here; it surfaces when connecting.
///
/// # Errors
/// Returns [`ConfigError::UnknownDbType`] when `DB_TYPE` names no known kind.
pub fn resolve(vars: &HashMap<String, String>) -> Result<ConnectionDescriptor, ConfigError> {
    let port = lookup(vars, "DB_PORT").and_then(|v| v.parse::<u16>().ok());

    let kind = match lookup(vars, "DB_TYPE") {
        Some(raw) => {
            DbKind::parse(raw).ok_or_else(|| ConfigError::UnknownDbType(raw.to_string()))?
        }
        None => port.map(DbKind::from_port).unwrap_or(DbKind::Unset),
    };

    Ok(ConnectionDescriptor {
        kind,
        host: lookup(vars, "DB_HOST").map(str::to_string),
        port,
        name: lookup(vars, "DB_NAME").map(str::to_string),
        user: lookup(vars, "DB_USER").map(str::to_string),
        password: lookup(vars, "DB_PASSWORD").map(Password::new),
    })
}

impl ConnectionDescriptor {
    /// Resolves the descriptor from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        resolve(&env_snapshot())
    }
}

/// Snapshot of the process environment.
pub fn env_snapshot() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Non-empty, trimmed value of `key`.
fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}
