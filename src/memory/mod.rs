//! 记忆层：对话消息类型（会话级持久化见 checkpoint 模块）

pub mod conversation;

pub use conversation::{Message, Role};
