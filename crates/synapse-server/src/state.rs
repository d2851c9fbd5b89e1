use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::RwLock;

use crate::auth::AuthConfig;
use crate::config::ServerConfig;
use crate::hub::Hub;
use crate::store::{MemoryStore, RoomStore};

pub type SharedHub = Arc<RwLock<Hub>>;
pub type SharedStore = Arc<dyn RoomStore>;

#[derive(Clone)]
pub struct AppState {
    pub hub: SharedHub,
    pub store: SharedStore,
    pub auth: AuthConfig,
    pub config: Arc<ServerConfig>,
    /// Open WebSocket connections, checked against `limits.max_ws_connections`.
    pub ws_connection_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(config: ServerConfig, store: SharedStore) -> Self {
        let auth = AuthConfig {
            bearer_token: config.auth.bearer_token.clone(),
        };
        Self {
            hub: Arc::new(RwLock::new(Hub::new())),
            store,
            auth,
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}
