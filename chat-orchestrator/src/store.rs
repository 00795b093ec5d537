//! Persistence collaborator boundary.
//!
//! Thread history and checkpoints live behind [`ThreadStore`]; the core
//! treats each call as atomic and durable and does not retry. Failures
//! surface as `PersistenceError` to the caller. [`InMemoryThreadStore`] backs
//! the CLI and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::sdk::{Message, OrchestratorError};

/// Durable store for thread messages and opaque workflow checkpoints.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Load the ordered message history of a thread. Unknown threads are
    /// empty, not an error.
    async fn load_thread_history(&self, thread_id: &str)
        -> Result<Vec<Message>, OrchestratorError>;

    async fn append_message(
        &self,
        thread_id: &str,
        message: Message,
    ) -> Result<(), OrchestratorError>;

    /// Load the opaque checkpoint blob saved for a thread, if any.
    async fn load_checkpoint(
        &self,
        thread_id: &str,
    ) -> Result<Option<serde_json::Value>, OrchestratorError>;

    async fn save_checkpoint(
        &self,
        thread_id: &str,
        blob: serde_json::Value,
    ) -> Result<(), OrchestratorError>;
}

/// In-memory implementation for development and testing.
#[derive(Default)]
pub struct InMemoryThreadStore {
    messages: RwLock<HashMap<String, Vec<Message>>>,
    checkpoints: RwLock<HashMap<String, serde_json::Value>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn load_thread_history(
        &self,
        thread_id: &str,
    ) -> Result<Vec<Message>, OrchestratorError> {
        let messages = self
            .messages
            .read()
            .map_err(|e| OrchestratorError::Persistence(e.to_string()))?;
        Ok(messages.get(thread_id).cloned().unwrap_or_default())
    }

    async fn append_message(
        &self,
        thread_id: &str,
        message: Message,
    ) -> Result<(), OrchestratorError> {
        let mut messages = self
            .messages
            .write()
            .map_err(|e| OrchestratorError::Persistence(e.to_string()))?;
        messages.entry(thread_id.to_string()).or_default().push(message);
        Ok(())
    }

    async fn load_checkpoint(
        &self,
        thread_id: &str,
    ) -> Result<Option<serde_json::Value>, OrchestratorError> {
        let checkpoints = self
            .checkpoints
            .read()
            .map_err(|e| OrchestratorError::Persistence(e.to_string()))?;
        Ok(checkpoints.get(thread_id).cloned())
    }

    async fn save_checkpoint(
        &self,
        thread_id: &str,
        blob: serde_json::Value,
    ) -> Result<(), OrchestratorError> {
        let mut checkpoints = self
            .checkpoints
            .write()
            .map_err(|e| OrchestratorError::Persistence(e.to_string()))?;
        checkpoints.insert(thread_id.to_string(), blob);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_history_roundtrip_preserves_order() {
        let store = InMemoryThreadStore::new();
        store
            .append_message("t1", Message::user("t1", "first"))
            .await
            .unwrap();
        store
            .append_message("t1", Message::agent("t1", "second"))
            .await
            .unwrap();

        let history = store.load_thread_history("t1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "first");
        assert_eq!(history[1].text, "second");
    }

    #[tokio::test]
    async fn test_unknown_thread_is_empty() {
        let store = InMemoryThreadStore::new();
        assert!(store.load_thread_history("nope").await.unwrap().is_empty());
        assert!(store.load_checkpoint("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_overwrites() {
        let store = InMemoryThreadStore::new();
        store
            .save_checkpoint("t1", serde_json::json!({"last_route": "simple"}))
            .await
            .unwrap();
        store
            .save_checkpoint("t1", serde_json::json!({"last_route": "report"}))
            .await
            .unwrap();

        let blob = store.load_checkpoint("t1").await.unwrap().unwrap();
        assert_eq!(blob["last_route"], "report");
    }
}
