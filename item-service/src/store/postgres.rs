//! PostgreSQL item store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::errors::{AppError, AppResult};
use common::models::{ConnectionDescriptor, DbKind, Item, TableDescriptor};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::Connection;

use super::{map_sqlx_error, require_name, ConnectSettings, ItemStore};

const CREATE_ITEMS_TABLE: &str = "CREATE TABLE IF NOT EXISTS items (
    id         SERIAL PRIMARY KEY,
    name       VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ DEFAULT NOW()
)";

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i32,
    name: String,
    created_at: Option<DateTime<Utc>>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id.into(),
            name: row.name,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL-backed store over a `sqlx` pool.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Opens one probe connection, ensures the items table, then builds a
    /// lazy pool from the same options.
    pub async fn connect(
        descriptor: &ConnectionDescriptor,
        settings: ConnectSettings,
    ) -> AppResult<Self> {
        let options = connect_options(descriptor);

        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| AppError::ConnectFailure(e.to_string()))?;
        sqlx::query(CREATE_ITEMS_TABLE)
            .execute(&mut conn)
            .await
            .map_err(map_sqlx_error)?;
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "closing probe connection failed");
        }

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.timeout)
            .connect_lazy_with(options);

        tracing::info!(host = ?descriptor.host, database = ?descriptor.name, "PostgreSQL store ready");
        Ok(Self { pool })
    }
}

fn connect_options(descriptor: &ConnectionDescriptor) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(descriptor.host.as_deref().unwrap_or("localhost"))
        .port(descriptor.effective_port().unwrap_or(5432))
        .database(descriptor.name.as_deref().unwrap_or("postgres"));
    if let Some(user) = &descriptor.user {
        options = options.username(user);
    }
    if let Some(password) = &descriptor.password {
        options = options.password(password.expose());
    }
    options
}

#[async_trait]
impl ItemStore for PgStore {
    fn kind(&self) -> DbKind {
        DbKind::PostgreSql
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_tables(&self) -> AppResult<Vec<TableDescriptor>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
             ORDER BY table_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(names.into_iter().map(TableDescriptor::new).collect())
    }

    async fn list_items(&self) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>("SELECT id, name, created_at FROM items ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn get_item(&self, id: i64) -> AppResult<Item> {
        // SERIAL ids never exceed i32.
        let Ok(id) = i32::try_from(id) else {
            return Err(AppError::NotFound(format!("item {id}")));
        };
        sqlx::query_as::<_, ItemRow>("SELECT id, name, created_at FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .map(Item::from)
            .ok_or_else(|| AppError::NotFound(format!("item {id}")))
    }

    async fn insert_item(&self, name: &str) -> AppResult<Item> {
        require_name(name)?;
        let row = sqlx::query_as::<_, ItemRow>(
            "INSERT INTO items (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        tracing::info!(id = row.id, "item inserted");
        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::Password;

    #[test]
    fn test_connect_options_use_descriptor() {
        let descriptor = ConnectionDescriptor {
            kind: DbKind::PostgreSql,
            host: Some("db.internal".into()),
            port: None,
            name: Some("shop".into()),
            user: Some("svc".into()),
            password: Some(Password::new("p@ss/word")),
        };
        let options = connect_options(&descriptor);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_database(), Some("shop"));
        assert_eq!(options.get_username(), "svc");
    }
}
