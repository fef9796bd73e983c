//! Process-wide registry of client notification channels.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::events::ProgressEvent;

struct ClientChannel {
    connection_id: Uuid,
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

/// The receiving half handed to a connected client.
pub struct ClientConnection {
    pub client_id: String,
    pub connection_id: Uuid,
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
}

#[derive(Clone, Default)]
pub struct ProgressBroadcaster {
    clients: Arc<RwLock<HashMap<String, ClientChannel>>>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel for `client_id`. A later connection under the same
    /// id replaces the earlier one.
    pub fn on_connect(&self, client_id: &str) -> ClientConnection {
        let (tx, events) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();

        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        if clients
            .insert(client_id.to_string(), ClientChannel { connection_id, tx })
            .is_some()
        {
            debug!(client_id = %client_id, "Replaced existing client channel");
        }

        ClientConnection {
            client_id: client_id.to_string(),
            connection_id,
            events,
        }
    }

    /// Unregister `client_id` if it is still bound to `connection_id`.
    pub fn on_disconnect(&self, client_id: &str, connection_id: Uuid) {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        if clients
            .get(client_id)
            .is_some_and(|channel| channel.connection_id == connection_id)
        {
            clients.remove(client_id);
        }
    }

    /// Fire-and-forget. Events for clients without a live channel are dropped.
    pub fn publish(&self, client_id: &str, event: ProgressEvent) {
        if client_id.is_empty() {
            return;
        }

        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        match clients.get(client_id) {
            Some(channel) => {
                if let Err(mpsc::error::SendError(event)) = channel.tx.send(event) {
                    debug!(
                        client_id = %client_id,
                        terminal = event.is_terminal(),
                        "Client channel closed, event dropped"
                    );
                }
            }
            None => debug!(
                client_id = %client_id,
                terminal = event.is_terminal(),
                "No client channel, event dropped"
            ),
        }
    }

    pub fn connected_clients(&self) -> usize {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
