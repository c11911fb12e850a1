use std::sync::Arc;

use shared_config::AppConfig;

use crate::store::MarketplaceStore;

/// Handles injected into every router; replaces process-wide singletons.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn MarketplaceStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn MarketplaceStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}
