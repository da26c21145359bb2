//! Turn Agent - 带工具路由与会话检查点的对话智能体
//!
//! 模块划分：
//! - **agent**: 无头 Agent 运行时（加载检查点 → 回合状态机 → 提交检查点）
//! - **checkpoint**: 会话检查点存储（内存 / 文件 / SQLite）与导出
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、回合状态与决策
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DashScope / DeepSeek / Mock）
//! - **memory**: 对话消息
//! - **observability**: 日志初始化与回合计数器
//! - **react**: 决策、工具、回答三个阶段与回合状态机
//! - **tools**: 工具箱（天气查询、计算器）与执行器

pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use agent::{create_agent, Agent, AgentBuilder, TurnOutcome};
pub use config::{load_config, AppConfig};
