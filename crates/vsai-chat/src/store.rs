//! Keyed message store
//!
//! Messages are immutable snapshots addressed by id. Updating a message means
//! replacing the snapshot at its key; observers subscribe to [`StoreEvent`]s
//! instead of sharing a mutable list.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use vsai_ai::Message;

/// Change notifications for store observers
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A message was appended
    Inserted(Message),
    /// The snapshot for an existing id was replaced
    Replaced(Message),
    /// Every message was removed
    Cleared,
    /// The whole list was swapped in (e.g. loaded history)
    Loaded { count: usize },
}

#[derive(Default)]
struct Inner {
    order: Vec<String>,
    by_id: HashMap<String, Message>,
}

/// Ordered, id-keyed list of messages. Cloning shares the same store.
#[derive(Clone)]
pub struct MessageStore {
    inner: Arc<RwLock<Inner>>,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            event_tx,
        }
    }

    /// Subscribe to store changes
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    /// Append a message. A message whose id is already present replaces the
    /// existing snapshot in place.
    pub fn push(&self, message: Message) {
        let event = {
            let mut inner = self.inner.write();
            if inner.by_id.contains_key(&message.id) {
                inner.by_id.insert(message.id.clone(), message.clone());
                StoreEvent::Replaced(message)
            } else {
                inner.order.push(message.id.clone());
                inner.by_id.insert(message.id.clone(), message.clone());
                StoreEvent::Inserted(message)
            }
        };
        let _ = self.event_tx.send(event);
    }

    /// Replace the snapshot with the same id. Returns `false` for unknown ids.
    pub fn replace(&self, message: Message) -> bool {
        {
            let mut inner = self.inner.write();
            match inner.by_id.get_mut(&message.id) {
                Some(slot) => *slot = message.clone(),
                None => return false,
            }
        }
        let _ = self.event_tx.send(StoreEvent::Replaced(message));
        true
    }

    /// Derive a new snapshot from the current one and store it
    pub fn update(&self, id: &str, f: impl FnOnce(Message) -> Message) -> Option<Message> {
        let updated = {
            let mut inner = self.inner.write();
            let current = inner.by_id.remove(id)?;
            let updated = f(current);
            inner.by_id.insert(id.to_string(), updated.clone());
            updated
        };
        let _ = self.event_tx.send(StoreEvent::Replaced(updated.clone()));
        Some(updated)
    }

    /// All messages, oldest first
    pub fn messages(&self) -> Vec<Message> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect()
    }

    /// Swap in a whole message list
    pub fn set_all(&self, messages: Vec<Message>) {
        let count = {
            let mut inner = self.inner.write();
            inner.order.clear();
            inner.by_id.clear();
            for message in messages {
                if inner.by_id.insert(message.id.clone(), message.clone()).is_none() {
                    inner.order.push(message.id);
                }
            }
            inner.order.len()
        };
        let _ = self.event_tx.send(StoreEvent::Loaded { count });
    }

    pub fn clear(&self) {
        {
            let mut inner = self.inner.write();
            inner.order.clear();
            inner.by_id.clear();
        }
        let _ = self.event_tx.send(StoreEvent::Cleared);
    }
}
