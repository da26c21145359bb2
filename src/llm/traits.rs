//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DashScope / DeepSeek / Mock）实现 LlmClient::complete（非流式，整条消息）。
//! 调用方必须把模型视为不可靠：可能失败，也可能返回格式错误的文本。

use async_trait::async_trait;

use crate::memory::Message;

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成：system 指令、历史与当前用户消息都在 messages 中
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
