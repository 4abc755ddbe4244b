//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::Database;
use crate::storage::FileStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Uploaded file store.
    pub store: FileStore,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: Config, db: Database, auth: AuthService, store: FileStore) -> Self {
        Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
            store,
        }
    }

    /// Books per page, typed for SQL limits. A configured zero is
    /// treated as one.
    pub fn page_size(&self) -> i64 {
        (self.config.catalog.page_size as i64).max(1)
    }
}
