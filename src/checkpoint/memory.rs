//! 内存检查点存储（进程内，重启后丢失）

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CheckpointError, CheckpointStore, SessionCheckpoint};
use crate::core::TurnState;

#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, SessionCheckpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn put(&self, session_id: &str, state: &TurnState) -> Result<SessionCheckpoint, CheckpointError> {
        let mut checkpoints = self.checkpoints.write().await;
        let next = SessionCheckpoint::next(checkpoints.get(session_id), session_id, state);
        checkpoints.insert(session_id.to_string(), next.clone());
        Ok(next)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionCheckpoint>, CheckpointError> {
        Ok(self.checkpoints.read().await.get(session_id).cloned())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, CheckpointError> {
        let mut ids: Vec<String> = self.checkpoints.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
