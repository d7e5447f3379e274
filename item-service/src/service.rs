//! Item service.
//!
//! Presence validation in front of the store calls.

use async_trait::async_trait;
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::models::{CreateItemRequest, Item, TableDescriptor};
use crate::store::SharedStore;

/// Item operations used by the handlers.
#[async_trait]
pub trait ItemServiceTrait: Send + Sync {
    /// Lists all tables or collections.
    async fn tables(&self) -> AppResult<Vec<TableDescriptor>>;

    /// Lists all items.
    async fn list(&self) -> AppResult<Vec<Item>>;

    /// Gets an item by its path id.
    async fn get(&self, id: &str) -> AppResult<Item>;

    /// Creates an item.
    async fn create(&self, req: CreateItemRequest) -> AppResult<Item>;
}

/// Item service over the connected store.
pub struct ItemService {
    store: SharedStore,
}

impl ItemService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ItemServiceTrait for ItemService {
    async fn tables(&self) -> AppResult<Vec<TableDescriptor>> {
        self.store.list_tables().await
    }

    async fn list(&self) -> AppResult<Vec<Item>> {
        self.store.list_items().await
    }

    async fn get(&self, id: &str) -> AppResult<Item> {
        // Non-numeric ids cannot match any item.
        let id: i64 = id
            .parse()
            .map_err(|_| AppError::NotFound(format!("item {id}")))?;
        self.store.get_item(id).await
    }

    async fn create(&self, req: CreateItemRequest) -> AppResult<Item> {
        req.validate()?;
        let name = req
            .name
            .ok_or_else(|| AppError::Validation("name is required".into()))?;

        let item = self.store.insert_item(&name).await?;
        tracing::info!(id = item.id, name = %item.name, "item created");
        Ok(item)
    }
}
