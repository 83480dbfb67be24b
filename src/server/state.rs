use std::sync::Arc;

use crate::broadcast::BroadcastServer;
use crate::config::Settings;
use crate::error::Result;
use crate::storage::JsonStorage;
use crate::view::Templates;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub broadcaster: Arc<BroadcastServer>,
    pub storage: Arc<JsonStorage>,
    pub templates: Arc<Templates>,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self> {
        let broadcaster = Arc::new(BroadcastServer::new(settings.broadcast_config()));
        let storage = Arc::new(JsonStorage::new(settings.app.data_file.clone()));
        let templates = Arc::new(Templates::new()?);

        Ok(Self {
            settings: Arc::new(settings),
            broadcaster,
            storage,
            templates,
        })
    }
}
