//! 会话锁：同一 session_id 的操作串行，不同会话互不阻塞
//!
//! 锁表只保存正在使用或排队中的会话；最后一个持有者释放时删除表项，表不会随历史会话数增长。

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = HashMap<String, Arc<Mutex<()>>>;

/// 按会话 ID 分配的异步互斥锁
#[derive(Clone, Default)]
pub struct SessionLocks {
    table: Arc<StdMutex<LockTable>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 等待并持有会话锁，guard 释放时解锁
    pub async fn acquire(&self, session_id: &str) -> SessionGuard {
        let lock = self
            .lock_table()
            .entry(session_id.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        SessionGuard {
            guard: Some(guard),
            table: self.table.clone(),
            session_id: session_id.to_string(),
        }
    }

    /// 当前锁表中的会话数（持有或排队中）
    pub fn len(&self) -> usize {
        self.lock_table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_table(&self) -> std::sync::MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// 会话锁的持有凭证
pub struct SessionGuard {
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<StdMutex<LockTable>>,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // 先解锁，再检查是否还有排队者持有同一把锁
        self.guard.take();
        let mut table = self.table.lock().unwrap_or_else(|p| p.into_inner());
        let idle = table
            .get(&self.session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            table.remove(&self.session_id);
        }
    }
}
