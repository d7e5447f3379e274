//! Item store adapters.
//!
//! One [`ItemStore`] implementation per store technology, selected once from
//! the resolved [`DbKind`]. [`StoreManager`] owns the single shared handle
//! and connects lazily, one attempt per request that needs it.

mod mongo;
mod mysql;
mod postgres;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::{ConnectionDescriptor, DbKind, Item, TableDescriptor};
use tokio::sync::{Mutex, RwLock};

use crate::db_log::ConnectionLog;

pub use mongo::MongoStore;
pub use mysql::MySqlStore;
pub use postgres::PgStore;

/// Name of the items table / collection.
pub const ITEMS_TABLE: &str = "items";

/// Capability set shared by every store variant.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Kind of store behind this handle.
    fn kind(&self) -> DbKind;

    /// Lightweight liveness check.
    async fn ping(&self) -> AppResult<()>;

    /// Tables (or collections) in the connected database.
    async fn list_tables(&self) -> AppResult<Vec<TableDescriptor>>;

    /// All items, ordered by id.
    async fn list_items(&self) -> AppResult<Vec<Item>>;

    /// A single item; `AppError::NotFound` when absent.
    async fn get_item(&self, id: i64) -> AppResult<Item>;

    /// Inserts an item and returns it with its generated id. A blank `name`
    /// is an `AppError::Validation`.
    async fn insert_item(&self, name: &str) -> AppResult<Item>;
}

/// Shared store handle.
pub type SharedStore = Arc<dyn ItemStore>;

/// Connection settings passed to the adapters.
#[derive(Debug, Clone, Copy)]
pub struct ConnectSettings {
    pub timeout: Duration,
    pub max_connections: u32,
}

impl From<&AppConfig> for ConnectSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.connect_timeout_secs),
            max_connections: config.max_connections,
        }
    }
}

/// Opens a store for `descriptor`. Single attempt, bounded by the timeout.
pub async fn connect(
    descriptor: &ConnectionDescriptor,
    settings: ConnectSettings,
) -> AppResult<SharedStore> {
    if !descriptor.is_configured() {
        return Err(AppError::ConnectFailure(
            "database is not configured (check DB_TYPE/DB_PORT, DB_HOST and DB_NAME)".into(),
        ));
    }

    let attempt = async {
        let store: SharedStore = match descriptor.kind {
            DbKind::PostgreSql => Arc::new(PgStore::connect(descriptor, settings).await?),
            DbKind::MySql | DbKind::MariaDb => {
                Arc::new(MySqlStore::connect(descriptor, settings).await?)
            }
            DbKind::MongoDb => Arc::new(MongoStore::connect(descriptor, settings).await?),
            DbKind::Unset => {
                return Err(AppError::ConnectFailure("database type is not set".into()))
            }
        };
        Ok(store)
    };

    tokio::time::timeout(settings.timeout, attempt)
        .await
        .map_err(|_| {
            AppError::ConnectFailure(format!(
                "connect timed out after {}s",
                settings.timeout.as_secs()
            ))
        })?
}

/// Rejects blank item names before they reach the store.
pub fn require_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    Ok(())
}

/// Maps a sqlx error onto the service error taxonomy.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::RowNotFound => AppError::NotFound("row".into()),
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => AppError::ConnectFailure(err.to_string()),
        other => AppError::DatabaseQuery(other.to_string()),
    }
}

/// Owns the process-wide store handle.
///
/// A successful connect is cached for the process lifetime. A failed one is
/// not, so every request that needs the store makes one fresh attempt.
/// Requests that queue behind an in-flight attempt share its outcome.
pub struct StoreManager {
    descriptor: ConnectionDescriptor,
    settings: ConnectSettings,
    log: Arc<ConnectionLog>,
    store: RwLock<Option<SharedStore>>,
    /// Holds the error of the most recent failed attempt.
    connecting: Mutex<Option<String>>,
    /// Completed connect attempts.
    attempts: AtomicU64,
}

impl StoreManager {
    /// Creates a manager that connects lazily.
    pub fn new(
        descriptor: ConnectionDescriptor,
        settings: ConnectSettings,
        log: Arc<ConnectionLog>,
    ) -> Self {
        Self {
            descriptor,
            settings,
            log,
            store: RwLock::new(None),
            connecting: Mutex::new(None),
            attempts: AtomicU64::new(0),
        }
    }

    /// Creates a manager around an already connected store.
    pub fn with_store(
        descriptor: ConnectionDescriptor,
        settings: ConnectSettings,
        log: Arc<ConnectionLog>,
        store: SharedStore,
    ) -> Self {
        Self {
            store: RwLock::new(Some(store)),
            ..Self::new(descriptor, settings, log)
        }
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn log(&self) -> &Arc<ConnectionLog> {
        &self.log
    }

    /// Returns the shared store, connecting if needed.
    pub async fn acquire(&self) -> AppResult<SharedStore> {
        if let Some(store) = self.store.read().await.as_ref() {
            return Ok(store.clone());
        }
        if !self.descriptor.is_configured() {
            return Err(AppError::ConnectFailure("database is not configured".into()));
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let mut last_error = self.connecting.lock().await;
        // Another request may have connected while we waited.
        if let Some(store) = self.store.read().await.as_ref() {
            return Ok(store.clone());
        }
        // An attempt finished while we waited and it failed.
        if self.attempts.load(Ordering::Acquire) != seen {
            let msg = last_error.clone().unwrap_or_else(|| "connect failed".into());
            return Err(AppError::ConnectFailure(msg));
        }

        let descriptor = &self.descriptor;
        self.log.info(format!(
            "Connecting to {} host={} port={} database={} user={}",
            descriptor.kind,
            descriptor.host.as_deref().unwrap_or("-"),
            descriptor
                .effective_port()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".into()),
            descriptor.name.as_deref().unwrap_or("-"),
            if descriptor.user.is_some() { "(set)" } else { "(none)" },
        ));

        let result = connect(descriptor, self.settings).await;
        match &result {
            Ok(store) => {
                self.log.info(format!("Connected ({})", store.kind()));
                *self.store.write().await = Some(store.clone());
                *last_error = None;
            }
            Err(e) => {
                self.log.error(format!("Connect failed: {e}"));
                *last_error = Some(match e {
                    AppError::ConnectFailure(msg) => msg.clone(),
                    other => other.to_string(),
                });
            }
        }
        self.attempts.fetch_add(1, Ordering::Release);
        result
    }

    /// Acquires the store and pings it.
    pub async fn acquire_live(&self) -> AppResult<SharedStore> {
        let store = self.acquire().await?;
        if let Err(e) = store.ping().await {
            self.log.error(format!("Ping failed: {e}"));
            return Err(match e {
                AppError::ConnectFailure(_) => e,
                other => AppError::ConnectFailure(other.to_string()),
            });
        }
        self.log.ping_ok(store.kind());
        Ok(store)
    }

    /// Whether the store is reachable right now.
    pub async fn ping(&self) -> bool {
        self.acquire_live().await.is_ok()
    }
}
