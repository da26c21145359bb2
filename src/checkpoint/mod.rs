//! 会话检查点存储
//!
//! 每个 session_id 只保留最新一份 TurnState 快照（整体替换，不合并），附带版本号、时间戳与检查点 ID。
//! 存储独占持久化快照；状态机只在回合完成后把工作副本交给 put。
//!
//! 后端：
//! - `MemoryCheckpointStore`：进程内
//! - `FileCheckpointStore`：每个会话一个 JSON 文件，跨进程重启保留
//! - `SqliteCheckpointStore`：SQLite（需 `async-sqlite` feature）

pub mod file;
pub mod memory;
#[cfg(feature = "async-sqlite")]
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::TurnState;
use crate::memory::Message;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;
#[cfg(feature = "async-sqlite")]
pub use sqlite::SqliteCheckpointStore;

/// 导出格式标识与版本
pub const EXPORT_FORMAT: &str = "turn-agent/checkpoint";
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// 检查点存储错误
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint io: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[cfg(feature = "async-sqlite")]
    #[error("checkpoint sqlite: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("corrupt checkpoint: {0}")]
    Corrupt(String),

    /// 后端名未知，或所需 feature 未编译进来
    #[error("checkpoint backend unavailable: {0}")]
    UnsupportedBackend(String),
}

/// 一个会话的最新检查点
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    pub session_id: String,
    pub checkpoint_id: Uuid,
    /// 从 1 开始，每次提交 +1
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub state: TurnState,
}

impl SessionCheckpoint {
    /// 基于上一份检查点生成下一份（首次提交时 prev 为 None）
    pub fn next(prev: Option<&SessionCheckpoint>, session_id: &str, state: &TurnState) -> Self {
        Self {
            session_id: session_id.to_string(),
            checkpoint_id: Uuid::new_v4(),
            version: prev.map(|p| p.version + 1).unwrap_or(1),
            created_at: Utc::now(),
            state: state.clone(),
        }
    }

    pub fn export(&self) -> SnapshotExport {
        SnapshotExport::from(self)
    }
}

/// 与存储后端无关的导出格式（调试 / 导出用）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotExport {
    pub format: String,
    pub format_version: u32,
    pub session_id: String,
    pub checkpoint_id: Uuid,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub turn_count: usize,
    pub history: Vec<Message>,
    pub last_answer: String,
}

impl From<&SessionCheckpoint> for SnapshotExport {
    fn from(cp: &SessionCheckpoint) -> Self {
        Self {
            format: EXPORT_FORMAT.to_string(),
            format_version: EXPORT_FORMAT_VERSION,
            session_id: cp.session_id.clone(),
            checkpoint_id: cp.checkpoint_id,
            version: cp.version,
            created_at: cp.created_at,
            turn_count: cp.state.turn_count(),
            history: cp.state.chat_history.clone(),
            last_answer: cp.state.final_answer.clone(),
        }
    }
}

impl SnapshotExport {
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// 检查点存储接口
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 写入会话的最新状态，替换旧快照，返回新检查点
    async fn put(&self, session_id: &str, state: &TurnState) -> Result<SessionCheckpoint, CheckpointError>;

    /// 读取会话的最新检查点；从未提交过时返回 None
    async fn get(&self, session_id: &str) -> Result<Option<SessionCheckpoint>, CheckpointError>;

    /// 已有检查点的会话 ID（排序）
    async fn list_sessions(&self) -> Result<Vec<String>, CheckpointError>;
}

/// 按后端名创建检查点存储：memory / file / sqlite
///
/// 未知后端或未编译的后端返回 `UnsupportedBackend`，不会静默换成其他存储。
pub async fn create_checkpoint_store(
    backend: &str,
    path: &std::path::Path,
) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    match backend.to_lowercase().as_str() {
        "memory" => {
            tracing::info!("Using in-memory checkpoint store");
            Ok(Arc::new(MemoryCheckpointStore::new()))
        }
        #[cfg(feature = "async-sqlite")]
        "sqlite" => {
            tracing::info!("Using sqlite checkpoint store: {:?}", path);
            Ok(Arc::new(SqliteCheckpointStore::new(path).await?))
        }
        #[cfg(not(feature = "async-sqlite"))]
        "sqlite" => Err(CheckpointError::UnsupportedBackend(
            "sqlite (built without the async-sqlite feature)".to_string(),
        )),
        "file" => {
            tracing::info!("Using file checkpoint store: {:?}", path);
            Ok(Arc::new(FileCheckpointStore::new(path)))
        }
        other => Err(CheckpointError::UnsupportedBackend(other.to_string())),
    }
}
