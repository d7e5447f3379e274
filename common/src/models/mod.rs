//! Shared data models.

pub mod connection;
pub mod item;

// Re-export commonly used types
pub use connection::{ConnectionDescriptor, DbKind, MaskedConfig, Password};
pub use item::{CreateItemRequest, Item, TableDescriptor};
