//! Connection descriptor models.
//!
//! Contains the database kind and the immutable descriptor resolved at startup.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Placeholder shown instead of a configured password.
pub const PASSWORD_MASK: &str = "********";

/// Placeholder shown for a variable that is not set.
pub const UNSET_PLACEHOLDER: &str = "(unset)";

/// Database kind enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum DbKind {
    /// PostgreSQL database.
    PostgreSql,
    /// MySQL database.
    MySql,
    /// MariaDB database (MySQL wire protocol).
    MariaDb,
    /// MongoDB document store.
    MongoDb,
    /// No database selected.
    Unset,
}

impl DbKind {
    /// All kinds that name a real store.
    pub const KNOWN: [DbKind; 4] = [
        DbKind::PostgreSql,
        DbKind::MySql,
        DbKind::MariaDb,
        DbKind::MongoDb,
    ];

    /// Returns the default port for this database kind.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            DbKind::PostgreSql => Some(5432),
            DbKind::MySql | DbKind::MariaDb => Some(3306),
            DbKind::MongoDb => Some(27017),
            DbKind::Unset => None,
        }
    }

    /// Infers a kind from a well-known port. MariaDB is never inferred.
    pub fn from_port(port: u16) -> DbKind {
        match port {
            5432 => DbKind::PostgreSql,
            3306 => DbKind::MySql,
            27017 => DbKind::MongoDb,
            _ => DbKind::Unset,
        }
    }

    /// Parses an explicit `DB_TYPE` value, ignoring case.
    pub fn parse(value: &str) -> Option<DbKind> {
        let value = value.trim();
        Self::KNOWN
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
    }

    /// Upper-case name as used in `DB_TYPE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DbKind::PostgreSql => "POSTGRESQL",
            DbKind::MySql => "MYSQL",
            DbKind::MariaDb => "MARIADB",
            DbKind::MongoDb => "MONGODB",
            DbKind::Unset => "UNSET",
        }
    }
}

impl std::fmt::Display for DbKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database password. Never serialized, masked in `Debug`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw password. Only store adapters should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(PASSWORD_MASK)
    }
}

/// Immutable connection descriptor resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    /// Selected database kind.
    pub kind: DbKind,
    /// Database host.
    pub host: Option<String>,
    /// Database port as configured.
    pub port: Option<u16>,
    /// Database (or MongoDB database) name.
    pub name: Option<String>,
    /// Database username.
    pub user: Option<String>,
    /// Database password.
    pub password: Option<Password>,
}

impl ConnectionDescriptor {
    /// A descriptor with no database selected.
    pub fn unset() -> Self {
        Self {
            kind: DbKind::Unset,
            host: None,
            port: None,
            name: None,
            user: None,
            password: None,
        }
    }

    /// Whether a connection can be attempted at all.
    pub fn is_configured(&self) -> bool {
        self.kind != DbKind::Unset && self.host.is_some() && self.name.is_some()
    }

    /// Configured port, or the kind's default.
    pub fn effective_port(&self) -> Option<u16> {
        self.port.or_else(|| self.kind.default_port())
    }

    /// Public view with the password masked.
    pub fn masked(&self) -> MaskedConfig {
        fn show(value: Option<&str>) -> String {
            value.unwrap_or(UNSET_PLACEHOLDER).to_string()
        }

        MaskedConfig {
            db_type: match self.kind {
                DbKind::Unset => UNSET_PLACEHOLDER.to_string(),
                kind => kind.to_string(),
            },
            db_host: show(self.host.as_deref()),
            db_port: self
                .port
                .map(|p| p.to_string())
                .unwrap_or_else(|| UNSET_PLACEHOLDER.to_string()),
            db_name: show(self.name.as_deref()),
            db_user: show(self.user.as_deref()),
            db_password: match &self.password {
                Some(_) => PASSWORD_MASK.to_string(),
                None => UNSET_PLACEHOLDER.to_string(),
            },
        }
    }
}

/// Connection settings as shown to clients (password masked).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaskedConfig {
    #[serde(rename = "DB_TYPE")]
    pub db_type: String,
    #[serde(rename = "DB_HOST")]
    pub db_host: String,
    #[serde(rename = "DB_PORT")]
    pub db_port: String,
    #[serde(rename = "DB_NAME")]
    pub db_name: String,
    #[serde(rename = "DB_USER")]
    pub db_user: String,
    #[serde(rename = "DB_PASSWORD")]
    pub db_password: String,
}

impl MaskedConfig {
    /// Key/value pairs in display order.
    pub fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("DB_TYPE", &self.db_type),
            ("DB_HOST", &self.db_host),
            ("DB_PORT", &self.db_port),
            ("DB_NAME", &self.db_name),
            ("DB_USER", &self.db_user),
            ("DB_PASSWORD", &self.db_password),
        ]
    }
}
