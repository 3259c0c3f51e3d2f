//! Chat history persistence boundary

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use vsai_ai::Message;

use crate::error::Result;

/// Persists the full message list per account.
///
/// There is no append: callers always write the whole list.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Stored messages for `account`, oldest first. Unknown accounts are empty.
    async fn load(&self, account: &str) -> Result<Vec<Message>>;

    /// Replace everything stored for `account`
    async fn replace(&self, account: &str, messages: &[Message]) -> Result<()>;

    /// Delete everything stored for `account`
    async fn clear(&self, account: &str) -> Result<()>;
}

/// History kept in process memory only
#[derive(Default)]
pub struct MemoryHistory {
    accounts: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn load(&self, account: &str) -> Result<Vec<Message>> {
        Ok(self.accounts.lock().get(account).cloned().unwrap_or_default())
    }

    async fn replace(&self, account: &str, messages: &[Message]) -> Result<()> {
        self.accounts
            .lock()
            .insert(account.to_string(), messages.to_vec());
        Ok(())
    }

    async fn clear(&self, account: &str) -> Result<()> {
        self.accounts.lock().remove(account);
        Ok(())
    }
}
