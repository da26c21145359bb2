//! 文件检查点存储
//!
//! 目录下每个会话一个 JSON 文件（SessionCheckpoint 原样序列化，便于人工查看）；
//! 先写临时文件再 rename，写入过程中崩溃不会留下半个快照。
//! 同一快照文件的「读旧版本 → 写新快照」在进程级的文件锁表内串行，
//! 指向同一目录的多个 store 实例也互斥；每次写入使用独立的临时文件名。

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use super::{CheckpointError, CheckpointStore, SessionCheckpoint};
use crate::core::{SessionLocks, TurnState};

const EXTENSION: &str = "json";

/// 按快照文件路径加锁（进程内所有 FileCheckpointStore 共享）
fn file_locks() -> &'static SessionLocks {
    static LOCKS: OnceLock<SessionLocks> = OnceLock::new();
    LOCKS.get_or_init(SessionLocks::new)
}

#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", encode_session_id(session_id), EXTENSION))
    }

    async fn read(&self, path: &Path) -> Result<Option<SessionCheckpoint>, CheckpointError> {
        match fs::read_to_string(path).await {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn put(&self, session_id: &str, state: &TurnState) -> Result<SessionCheckpoint, CheckpointError> {
        let path = self.path_for(session_id);
        let _guard = file_locks().acquire(&path.to_string_lossy()).await;
        fs::create_dir_all(&self.dir).await?;
        let prev = self.read(&path).await?;
        let next = SessionCheckpoint::next(prev.as_ref(), session_id, state);

        let tmp = path.with_extension(format!("{EXTENSION}.{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp, serde_json::to_string_pretty(&next)?).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!(session_id = %session_id, version = next.version, "checkpoint written");
        Ok(next)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionCheckpoint>, CheckpointError> {
        let cp = self.read(&self.path_for(session_id)).await?;
        match cp {
            Some(cp) if cp.session_id != session_id => Err(CheckpointError::Corrupt(format!(
                "file for '{}' holds session '{}'",
                session_id, cp.session_id
            ))),
            other => Ok(other),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<String>, CheckpointError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_session_id)
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// 会话 ID 转文件名：[A-Za-z0-9_-] 原样保留，其余字节写成 %XX
fn encode_session_id(session_id: &str) -> String {
    let mut out = String::with_capacity(session_id.len());
    for b in session_id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn decode_session_id(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
