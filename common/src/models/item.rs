//! Item models.
//!
//! The single resource exposed by the API, plus table descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// A stored item. Every store variant exposes a numeric id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Generated item identifier.
    pub id: i64,
    /// Item name.
    pub name: String,
    /// Creation timestamp, when the store records one.
    pub created_at: Option<DateTime<Utc>>,
}

/// Request body for creating an item.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CreateItemRequest {
    /// Item name.
    #[validate(
        required(message = "name is required"),
        length(min = 1, message = "name is required")
    )]
    pub name: Option<String>,
}

/// A table (relational) or collection (document) in the connected store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TableDescriptor {
    /// Table or collection name.
    pub name: String,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
