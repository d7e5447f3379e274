//! MySQL / MariaDB item store.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use common::errors::{AppError, AppResult};
use common::models::{ConnectionDescriptor, DbKind, Item, TableDescriptor};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions};
use sqlx::Connection;

use super::{map_sqlx_error, require_name, ConnectSettings, ItemStore};

const CREATE_ITEMS_TABLE: &str = "CREATE TABLE IF NOT EXISTS items (
    id         INT AUTO_INCREMENT PRIMARY KEY,
    name       VARCHAR(255) NOT NULL,
    created_at DATETIME(6) DEFAULT CURRENT_TIMESTAMP(6)
)";

const SELECT_ITEM_BY_ID: &str = "SELECT id, name, created_at FROM items WHERE id = ?";

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i32,
    name: String,
    created_at: Option<NaiveDateTime>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id.into(),
            name: row.name,
            // DATETIME carries no zone; the server default is UTC.
            created_at: row.created_at.map(|t| t.and_utc()),
        }
    }
}

/// MySQL-protocol store, used for both MySQL and MariaDB.
pub struct MySqlStore {
    pool: MySqlPool,
    kind: DbKind,
    database: String,
}

impl MySqlStore {
    /// Opens one probe connection, ensures the items table, then builds a
    /// lazy pool from the same options.
    pub async fn connect(
        descriptor: &ConnectionDescriptor,
        settings: ConnectSettings,
    ) -> AppResult<Self> {
        let options = connect_options(descriptor);

        let mut conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(|e| AppError::ConnectFailure(e.to_string()))?;
        sqlx::query(CREATE_ITEMS_TABLE)
            .execute(&mut conn)
            .await
            .map_err(map_sqlx_error)?;
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "closing probe connection failed");
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.timeout)
            .connect_lazy_with(options);

        tracing::info!(kind = %descriptor.kind, host = ?descriptor.host, database = ?descriptor.name, "MySQL store ready");
        Ok(Self {
            pool,
            kind: descriptor.kind,
            database: descriptor.name.clone().unwrap_or_default(),
        })
    }
}

fn connect_options(descriptor: &ConnectionDescriptor) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(descriptor.host.as_deref().unwrap_or("localhost"))
        .port(descriptor.effective_port().unwrap_or(3306));
    if let Some(name) = &descriptor.name {
        options = options.database(name);
    }
    if let Some(user) = &descriptor.user {
        options = options.username(user);
    }
    if let Some(password) = &descriptor.password {
        options = options.password(password.expose());
    }
    options
}

#[async_trait]
impl ItemStore for MySqlStore {
    fn kind(&self) -> DbKind {
        self.kind
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
            "SELECT CAST(table_name AS CHAR) AS table_name FROM information_schema.tables
             WHERE table_schema = ? AND table_type = 'BASE TABLE'
             ORDER BY table_name",
        )
        .bind(&self.database)
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
        sqlx::query_as::<_, ItemRow>(SELECT_ITEM_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .map(Item::from)
            .ok_or_else(|| AppError::NotFound(format!("item {id}")))
    }

    async fn insert_item(&self, name: &str) -> AppResult<Item> {
        require_name(name)?;
        // LAST_INSERT_ID is per connection, so insert and read back on one.
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;

        let result = sqlx::query("INSERT INTO items (name) VALUES (?)")
            .bind(name)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        let id = result.last_insert_id();

        let row = sqlx::query_as::<_, ItemRow>(SELECT_ITEM_BY_ID)
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        tracing::info!(id, "item inserted");
        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_row_timestamp_is_utc() {
        let created = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        let item = Item::from(ItemRow {
            id: 3,
            name: "widget".into(),
            created_at: Some(created),
        });
        assert_eq!(item.id, 3);
        assert_eq!(
            item.created_at.unwrap().to_rfc3339(),
            "2024-05-01T12:30:00+00:00"
        );
    }
}
