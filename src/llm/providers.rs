//! OpenAI 兼容服务商预设
//!
//! - DashScope（通义千问）：兼容模式端点，模型 qwen-turbo / qwen-plus / qwen-max，Key 取 `DASHSCOPE_API_KEY`
//! - DeepSeek：模型 deepseek-chat / deepseek-reasoner，Key 取 `DEEPSEEK_API_KEY`

use crate::llm::OpenAiClient;

pub const DASHSCOPE_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const QWEN_TURBO: &str = "qwen-turbo";

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 创建 DashScope（千问）客户端；model 为空时用 `DASHSCOPE_MODEL` 环境变量或 qwen-turbo
pub fn create_dashscope_client(model: Option<&str>, base_url: Option<&str>) -> Option<OpenAiClient> {
    let api_key = std::env::var("DASHSCOPE_API_KEY").ok()?;
    let model = model
        .map(String::from)
        .or_else(|| std::env::var("DASHSCOPE_MODEL").ok())
        .unwrap_or_else(|| QWEN_TURBO.to_string());
    Some(OpenAiClient::new(
        Some(base_url.unwrap_or(DASHSCOPE_BASE_URL)),
        &model,
        Some(api_key.as_str()),
    ))
}

/// 创建 DeepSeek 客户端；没有可用 Key 时返回 None
pub fn create_deepseek_client(model: Option<&str>, base_url: Option<&str>) -> Option<OpenAiClient> {
    let api_key = std::env::var("DEEPSEEK_API_KEY").ok()?;
    let model = model
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_MODEL").ok())
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string());
    Some(OpenAiClient::new(
        Some(base_url.unwrap_or(DEEPSEEK_BASE_URL)),
        &model,
        Some(api_key.as_str()),
    ))
}
