//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DashScope / DeepSeek / Mock）

pub mod mock;
pub mod openai;
pub mod providers;
pub mod traits;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use providers::{create_dashscope_client, create_deepseek_client, DEEPSEEK_CHAT, QWEN_TURBO};
pub use traits::LlmClient;
