//! 可观测性：日志初始化与回合计数器
//!
//! 决策解析失败对用户表现为「不调用工具」，但会在这里单独计数并以 warn 记录，
//! 便于发现系统性的 Prompt / 模型问题。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化 tracing：默认 info，可通过 RUST_LOG 覆盖
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

/// 回合级计数器（进程内累计）
#[derive(Debug, Default)]
pub struct TurnMetrics {
    completed_turns: AtomicU64,
    aborted_turns: AtomicU64,
    decision_fallbacks: AtomicU64,
    tool_failures: AtomicU64,
    checkpoint_writes: AtomicU64,
}

/// 计数器快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub completed_turns: u64,
    pub aborted_turns: u64,
    pub decision_fallbacks: u64,
    pub tool_failures: u64,
    pub checkpoint_writes: u64,
}

impl TurnMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_completed(&self) {
        self.completed_turns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aborted(&self) {
        self.aborted_turns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decision_fallback(&self, reason: &str) {
        self.decision_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(reason = %reason, "decision fell back to no-tool");
    }

    pub fn record_tool_failure(&self) {
        self.tool_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_checkpoint_write(&self) {
        self.checkpoint_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            completed_turns: self.completed_turns.load(Ordering::Relaxed),
            aborted_turns: self.aborted_turns.load(Ordering::Relaxed),
            decision_fallbacks: self.decision_fallbacks.load(Ordering::Relaxed),
            tool_failures: self.tool_failures.load(Ordering::Relaxed),
            checkpoint_writes: self.checkpoint_writes.load(Ordering::Relaxed),
        }
    }
}
