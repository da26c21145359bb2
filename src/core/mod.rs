//! 核心类型：错误分类、回合状态与会话锁

pub mod error;
pub mod session_lock;
pub mod state;

pub use error::AgentError;
pub use session_lock::{SessionGuard, SessionLocks};
pub use state::{Decision, ToolArgs, TurnPhase, TurnState};
