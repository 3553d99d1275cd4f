//! Shared state handed to every request handler

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::hub::HubHandle;
use crate::storage::SharedDocumentStore;

/// Everything the endpoints need: the room hub, the document store and the
/// configuration the process was started with
pub struct ServerState {
    pub hub: HubHandle,
    pub documents: SharedDocumentStore,
    pub config: Arc<ServerConfig>,
    /// Random per-process identifier reported by `/api/info`
    pub instance_id: String,
}

impl ServerState {
    pub fn new(hub: HubHandle, documents: SharedDocumentStore, config: ServerConfig) -> Self {
        let instance_id = generate_instance_id();
        log::info!("Instance ID: {}", instance_id);

        Self {
            hub,
            documents,
            config: Arc::new(config),
            instance_id,
        }
    }
}

// Shared reference to server state
pub type SharedServerState = Arc<ServerState>;

/// 16 random bytes, hex encoded
fn generate_instance_id() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
