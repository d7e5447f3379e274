//! MongoDB item store.
//!
//! Documents in `items` carry a numeric `id` field next to `_id`, so callers
//! see the same integer ids as with the relational stores. Ids come from an
//! atomic `$inc` on the `counters` collection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::errors::{AppError, AppResult};
use common::models::{ConnectionDescriptor, DbKind, Item, TableDescriptor};
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, Credential, ReturnDocument, ServerAddress};
use mongodb::{Client, Collection, Database};

use super::{require_name, ConnectSettings, ItemStore, ITEMS_TABLE};

const COUNTERS_COLLECTION: &str = "counters";

/// MongoDB-backed store.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Builds the client, pings the server and seeds the id counter.
    pub async fn connect(
        descriptor: &ConnectionDescriptor,
        settings: ConnectSettings,
    ) -> AppResult<Self> {
        let options = client_options(descriptor, settings)?;
        let client = Client::with_options(options)
            .map_err(|e| AppError::ConnectFailure(format!("failed to create MongoDB client: {e}")))?;

        let database = descriptor.name.as_deref().unwrap_or_default();
        let store = Self {
            db: client.database(database),
        };

        store
            .db
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| AppError::ConnectFailure(e.to_string()))?;
        store.seed_counter().await?;

        tracing::info!(host = ?descriptor.host, database, "MongoDB store ready");
        Ok(store)
    }

    fn items(&self) -> Collection<Document> {
        self.db.collection(ITEMS_TABLE)
    }

    fn counters(&self) -> Collection<Document> {
        self.db.collection(COUNTERS_COLLECTION)
    }

    /// Raises the counter to the highest existing id so documents written
    /// before the counter existed are never reused.
    async fn seed_counter(&self) -> AppResult<()> {
        let last = self
            .items()
            .find_one(doc! {})
            .sort(doc! { "id": -1 })
            .await
            .map_err(map_mongo_error)?;
        let max_id = last.as_ref().and_then(|d| numeric_id(d.get("id"))).unwrap_or(0);

        self.counters()
            .update_one(
                doc! { "_id": ITEMS_TABLE },
                doc! { "$max": { "seq": max_id } },
            )
            .upsert(true)
            .await
            .map_err(map_mongo_error)?;
        Ok(())
    }

    async fn next_id(&self) -> AppResult<i64> {
        let counter = self
            .counters()
            .find_one_and_update(
                doc! { "_id": ITEMS_TABLE },
                doc! { "$inc": { "seq": 1_i64 } },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_mongo_error)?;

        counter
            .as_ref()
            .and_then(|d| numeric_id(d.get("seq")))
            .ok_or_else(|| AppError::Internal("id counter returned no sequence".into()))
    }
}

fn client_options(
    descriptor: &ConnectionDescriptor,
    settings: ConnectSettings,
) -> AppResult<ClientOptions> {
    let host = descriptor.host.as_deref().unwrap_or("localhost");
    let port = descriptor.effective_port().unwrap_or(27017);
    let address = ServerAddress::parse(format!("{host}:{port}"))
        .map_err(|e| AppError::ConnectFailure(format!("invalid MongoDB address: {e}")))?;

    let mut options = ClientOptions::default();
    options.hosts = vec![address];
    options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
    options.connect_timeout = Some(settings.timeout);
    options.server_selection_timeout = Some(settings.timeout);
    options.max_pool_size = Some(settings.max_connections);

    if let (Some(user), Some(password)) = (&descriptor.user, &descriptor.password) {
        options.credential = Some(
            Credential::builder()
                .username(user.clone())
                .password(password.expose().to_string())
                .source(descriptor.name.clone())
                .build(),
        );
    }
    Ok(options)
}

/// Reads a numeric field regardless of its BSON width.
fn numeric_id(value: Option<&Bson>) -> Option<i64> {
    match value? {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) if v.fract() == 0.0 => Some(*v as i64),
        _ => None,
    }
}

fn document_to_item(doc: &Document) -> AppResult<Item> {
    let id = numeric_id(doc.get("id"))
        .ok_or_else(|| AppError::DatabaseQuery("item document without numeric id".into()))?;
    let name = doc.get_str("name").unwrap_or_default().to_string();
    let created_at = match doc.get("createdAt") {
        Some(Bson::DateTime(dt)) => DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis()),
        _ => None,
    };
    Ok(Item {
        id,
        name,
        created_at,
    })
}

fn map_mongo_error(err: mongodb::error::Error) -> AppError {
    match *err.kind {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::Authentication { .. } => AppError::ConnectFailure(err.to_string()),
        _ => AppError::DatabaseQuery(err.to_string()),
    }
}

#[async_trait]
impl ItemStore for MongoStore {
    fn kind(&self) -> DbKind {
        DbKind::MongoDb
    }

    async fn ping(&self) -> AppResult<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(map_mongo_error)?;
        Ok(())
    }

    async fn list_tables(&self) -> AppResult<Vec<TableDescriptor>> {
        let mut names = self
            .db
            .list_collection_names()
            .await
            .map_err(map_mongo_error)?;
        names.sort();
        Ok(names.into_iter().map(TableDescriptor::new).collect())
    }

    async fn list_items(&self) -> AppResult<Vec<Item>> {
        let mut cursor = self
            .items()
            .find(doc! {})
            .sort(doc! { "id": 1 })
            .await
            .map_err(map_mongo_error)?;

        let mut items = Vec::new();
        while cursor.advance().await.map_err(map_mongo_error)? {
            let doc = cursor.deserialize_current().map_err(map_mongo_error)?;
            match document_to_item(&doc) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(error = %e, "skipping malformed item document"),
            }
        }
        Ok(items)
    }

    async fn get_item(&self, id: i64) -> AppResult<Item> {
        // Older documents may hold the id as Int32.
        let filter = match i32::try_from(id) {
            Ok(small) => doc! { "id": { "$in": [id, small] } },
            Err(_) => doc! { "id": id },
        };
        let doc = self
            .items()
            .find_one(filter)
            .await
            .map_err(map_mongo_error)?
            .ok_or_else(|| AppError::NotFound(format!("item {id}")))?;
        document_to_item(&doc)
    }

    async fn insert_item(&self, name: &str) -> AppResult<Item> {
        require_name(name)?;
        let id = self.next_id().await?;
        let created_at = mongodb::bson::DateTime::now();

        self.items()
            .insert_one(doc! { "id": id, "name": name, "createdAt": created_at })
            .await
            .map_err(map_mongo_error)?;

        tracing::info!(id, "item inserted");
        Ok(Item {
            id,
            name: name.to_string(),
            created_at: DateTime::<Utc>::from_timestamp_millis(created_at.timestamp_millis()),
        })
    }
}
