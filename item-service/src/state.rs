//! Application state for the item service.

use std::sync::Arc;

use common::config::AppConfig;
use common::models::ConnectionDescriptor;

use crate::db_log::ConnectionLog;
use crate::store::{ConnectSettings, SharedStore, StoreManager};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub stores: Arc<StoreManager>,
}

impl AppState {
    /// Creates a state that connects to `descriptor` on first use.
    pub fn new(config: AppConfig, descriptor: ConnectionDescriptor) -> Self {
        let settings = ConnectSettings::from(&config);
        let stores = StoreManager::new(descriptor, settings, Arc::new(ConnectionLog::default()));
        Self {
            config: Arc::new(config),
            stores: Arc::new(stores),
        }
    }

    /// Creates a state around an already connected store.
    pub fn with_store(
        config: AppConfig,
        descriptor: ConnectionDescriptor,
        store: SharedStore,
    ) -> Self {
        let settings = ConnectSettings::from(&config);
        let stores = StoreManager::with_store(
            descriptor,
            settings,
            Arc::new(ConnectionLog::default()),
            store,
        );
        Self {
            config: Arc::new(config),
            stores: Arc::new(stores),
        }
    }
}
