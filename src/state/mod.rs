use std::sync::Arc;

use crate::{
    config::AppConfig, dao::game_store::GameStore, notify::outbox::NotificationOutbox,
};

pub type SharedState = Arc<AppState>;

/// Central application state holding the configuration, the store handle,
/// and the notification queue.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn GameStore>,
    outbox: NotificationOutbox,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn GameStore>,
        outbox: NotificationOutbox,
    ) -> SharedState {
        Arc::new(Self {
            config,
            store,
            outbox,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle to the game store.
    pub fn store(&self) -> &Arc<dyn GameStore> {
        &self.store
    }

    /// Queue used to publish outbound notifications.
    pub fn outbox(&self) -> &NotificationOutbox {
        &self.outbox
    }
}
