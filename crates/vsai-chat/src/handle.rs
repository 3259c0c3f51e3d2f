//! A cloneable handle for stopping a turn from outside the session.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;
use vsai_ai::Message;

use crate::store::MessageStore;

/// A cloneable handle for poking the chat session from external code,
/// e.g. a Ctrl-C handler.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) in_flight: Arc<Mutex<Option<String>>>,
    pub(crate) store: MessageStore,
    pub(crate) is_running: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new(store: MessageStore) -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            in_flight: Arc::new(Mutex::new(None)),
            store,
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim the session for a new turn. Returns the turn's fresh token, or
    /// `None` when a turn is already running.
    pub(crate) fn begin(&self) -> Option<CancellationToken> {
        if self.is_running.swap(true, Ordering::AcqRel) {
            return None;
        }
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        Some(token)
    }

    pub(crate) fn set_in_flight(&self, id: Option<String>) {
        *self.in_flight.lock() = id;
    }

    pub(crate) fn finish(&self) {
        self.set_in_flight(None);
        self.is_running.store(false, Ordering::Release);
    }

    /// Stop the current turn.
    ///
    /// The in-flight model message is finalized immediately: status cleared,
    /// partial text kept, or a "Generation stopped." notice when there is none.
    /// Returns the stopped message, if a turn was producing one.
    pub fn stop_generation(&self) -> Option<Message> {
        if !self.is_running() {
            return None;
        }
        self.cancel.lock().cancel();

        let id = self.in_flight.lock().clone()?;
        let stopped = self
            .store
            .update(&id, |m| if m.is_pending() { m.into_stopped() } else { m });
        tracing::info!(message = %id, "Generation stopped");
        stopped
    }

    /// Whether a turn is currently running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsai_ai::{MessageStatus, STOPPED_NOTICE};

    #[test]
    fn test_begin_is_exclusive() {
        let handle = SessionHandle::new(MessageStore::new());
        let token = handle.begin().unwrap();
        assert!(handle.is_running());
        assert!(handle.begin().is_none());

        handle.finish();
        assert!(!handle.is_running());
        let next = handle.begin().unwrap();
        assert!(!token.is_cancelled());
        assert!(!next.is_cancelled());
    }

    #[test]
    fn test_stop_generation_finalizes_in_flight() {
        let store = MessageStore::new();
        let handle = SessionHandle::new(store.clone());
        let placeholder = Message::placeholder(MessageStatus::GeneratingImage);
        store.push(placeholder.clone());

        let token = handle.begin().unwrap();
        handle.set_in_flight(Some(placeholder.id.clone()));

        let stopped = handle.stop_generation().unwrap();
        assert!(token.is_cancelled());
        assert!(stopped.status.is_none());
        assert_eq!(stopped.error.as_deref(), Some(STOPPED_NOTICE));
        assert_eq!(store.messages(), vec![stopped]);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let handle = SessionHandle::new(MessageStore::new());
        assert!(handle.stop_generation().is_none());
    }
}
