use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use kozosseg_types::PushEvent;

/// Buffered events per connection before a slow client starts losing them
const CONNECTION_BUFFER: usize = 64;

pub type ConnectionId = u64;

#[derive(Default)]
struct HubInner {
    next_id: ConnectionId,
    connections: HashMap<i64, Vec<(ConnectionId, mpsc::Sender<PushEvent>)>>,
}

/// In-process push hub: user id -> live client connections
#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<Mutex<HubInner>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a connection for `user_id`
    pub fn connect(&self, user_id: i64) -> (ConnectionId, mpsc::Receiver<PushEvent>) {
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER);
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.connections.entry(user_id).or_default().push((id, tx));
        tracing::debug!("User {} connected to hub (connection {})", user_id, id);
        (id, rx)
    }

    pub fn disconnect(&self, user_id: i64, connection_id: ConnectionId) {
        let mut inner = self.lock();
        if let Some(list) = inner.connections.get_mut(&user_id) {
            list.retain(|(id, _)| *id != connection_id);
            if list.is_empty() {
                inner.connections.remove(&user_id);
            }
        }
        tracing::debug!("User {} disconnected from hub (connection {})", user_id, connection_id);
    }

    /// Deliver `event` to every live connection of the user.
    /// Closed connections are dropped; returns how many received the event.
    pub fn send_to_user(&self, user_id: i64, event: &PushEvent) -> usize {
        let mut inner = self.lock();
        let Some(list) = inner.connections.get_mut(&user_id) else {
            return 0;
        };

        let mut delivered = 0;
        list.retain(|(id, tx)| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Dropping {} event for slow connection {}", event.event_name(), id);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if list.is_empty() {
            inner.connections.remove(&user_id);
        }
        delivered
    }

    pub fn connection_count(&self, user_id: i64) -> usize {
        self.lock()
            .connections
            .get(&user_id)
            .map_or(0, |list| list.len())
    }
}
