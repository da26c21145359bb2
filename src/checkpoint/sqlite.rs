//! SQLite 检查点存储（sqlx，异步）
//!
//! 表 turn_checkpoints 每个会话一行，put 在事务内读旧版本并 upsert。需要启用 `async-sqlite` feature。

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use super::{CheckpointError, CheckpointStore, SessionCheckpoint};
use crate::core::TurnState;

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;
        let store = Self { pool };
        store.init_tables().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn init_tables(&self) -> Result<(), CheckpointError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS turn_checkpoints (
                session_id TEXT PRIMARY KEY,
                checkpoint_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                state TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_checkpoint(row: &sqlx::sqlite::SqliteRow) -> Result<SessionCheckpoint, CheckpointError> {
    let session_id: String = row.get("session_id");
    let checkpoint_id: String = row.get("checkpoint_id");
    let version: i64 = row.get("version");
    let created_at: String = row.get("created_at");
    let state: String = row.get("state");

    Ok(SessionCheckpoint {
        checkpoint_id: Uuid::parse_str(&checkpoint_id)
            .map_err(|e| CheckpointError::Corrupt(format!("checkpoint_id: {e}")))?,
        version: u64::try_from(version)
            .map_err(|_| CheckpointError::Corrupt(format!("version {version}")))?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| CheckpointError::Corrupt(format!("created_at: {e}")))?
            .with_timezone(&Utc),
        state: serde_json::from_str(&state)?,
        session_id,
    })
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn put(&self, session_id: &str, state: &TurnState) -> Result<SessionCheckpoint, CheckpointError> {
        let mut tx = self.pool.begin().await?;

        let prev = sqlx::query("SELECT * FROM turn_checkpoints WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row_to_checkpoint(&row))
            .transpose()?;
        let next = SessionCheckpoint::next(prev.as_ref(), session_id, state);

        sqlx::query(
            "INSERT INTO turn_checkpoints (session_id, checkpoint_id, version, created_at, state)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                checkpoint_id = excluded.checkpoint_id,
                version = excluded.version,
                created_at = excluded.created_at,
                state = excluded.state",
        )
        .bind(session_id)
        .bind(next.checkpoint_id.to_string())
        .bind(next.version as i64)
        .bind(next.created_at.to_rfc3339())
        .bind(serde_json::to_string(&next.state)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(next)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionCheckpoint>, CheckpointError> {
        sqlx::query("SELECT * FROM turn_checkpoints WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_checkpoint(&row))
            .transpose()
    }

    async fn list_sessions(&self) -> Result<Vec<String>, CheckpointError> {
        let rows = sqlx::query("SELECT session_id FROM turn_checkpoints ORDER BY session_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("session_id")).collect())
    }
}

#[cfg(all(test, feature = "async-sqlite"))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sqlite_put_get_reopen() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("checkpoints.db");

        let mut state = TurnState::begin_turn(Vec::new(), "1+2*3");
        state.commit_turn("结果是 7".to_string());

        let store = SqliteCheckpointStore::new(&db_path).await.unwrap();
        store.put("user_001", &state).await.unwrap();
        let cp = store.put("user_001", &state).await.unwrap();
        assert_eq!(cp.version, 2);
        store.close().await;

        let reopened = SqliteCheckpointStore::new(&db_path).await.unwrap();
        let loaded = reopened.get("user_001").await.unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.state, state);
        assert_eq!(reopened.list_sessions().await.unwrap(), vec!["user_001"]);
        assert!(reopened.get("other").await.unwrap().is_none());
    }
}
