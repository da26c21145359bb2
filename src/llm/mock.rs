//! Mock LLM 客户端（无需 API）
//!
//! - MockLlmClient：离线规则模型。决策 Prompt 下识别四则运算 / 「XX天气」并给出决策 JSON，
//!   回答 Prompt 下复述工具结果或历史，便于本地跑通整个回合。
//! - ScriptedLlmClient：按队列返回预设结果并记录每次调用的消息，供测试驱动确定性场景。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// 决策 Prompt 中必然出现的字段名，用于区分两类调用
const DECISION_MARKER: &str = "\"tool_name\"";
const TOOL_RESULT_PREFIX: &str = "工具结果：";

/// 离线规则模型
#[derive(Debug, Default)]
pub struct MockLlmClient;

impl MockLlmClient {
    fn decide(input: &str) -> String {
        let input = input.trim();
        let is_arithmetic = input.chars().any(|c| c.is_ascii_digit())
            && input
                .chars()
                .all(|c| c.is_ascii_digit() || "+-*/(). ".contains(c));
        if is_arithmetic {
            return serde_json::json!({
                "tool_name": "calculator",
                "tool_input": { "expression": input }
            })
            .to_string();
        }
        if let Some(idx) = input.find("天气") {
            let city = input[..idx]
                .replace("查询", "")
                .replace("查一下", "")
                .replace("今天", "")
                .replace('的', "");
            let city = city.trim();
            if !city.is_empty() {
                return serde_json::json!({
                    "tool_name": "weather_query",
                    "tool_input": { "city": city }
                })
                .to_string();
            }
        }
        r#"{"tool_name":"","tool_input":{}}"#.to_string()
    }

    fn answer(messages: &[Message]) -> String {
        let tool_result = messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::System)
            .find_map(|m| m.content.strip_prefix(TOOL_RESULT_PREFIX))
            .filter(|r| *r != "无");
        if let Some(result) = tool_result {
            return format!("（离线模式）{result}");
        }
        let users: Vec<&Message> = messages.iter().filter(|m| m.role == Role::User).collect();
        let current = users.last().map(|m| m.content.as_str()).unwrap_or("");
        if current.contains("问了什么") || current.contains("上一个问题") {
            return match users.len().checked_sub(2).and_then(|i| users.get(i)) {
                Some(prev) => format!("（离线模式）你上一个问题是：{}", prev.content),
                None => "（离线模式）这是我们对话的第一个问题。".to_string(),
            };
        }
        format!("（离线模式）收到：{current}")
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let is_decision = messages
            .first()
            .map(|m| m.role == Role::System && m.content.contains(DECISION_MARKER))
            .unwrap_or(false);
        if is_decision {
            let last_user = messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.as_str())
                .unwrap_or("");
            Ok(Self::decide(last_user))
        } else {
            Ok(Self::answer(messages))
        }
    }
}

/// 脚本化客户端：依次弹出预设结果；队列耗尽时返回错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Vec<Message>>>,
    delay: Option<Duration>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<S, S>>,
        S: Into<String>,
    {
        let responses = responses
            .into_iter()
            .map(|r| r.map(Into::into).map_err(Into::into))
            .collect();
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// 每次调用前等待一段时间（用于超时与并发测试）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_ok(&self, text: impl Into<String>) {
        self.lock_responses().push_back(Ok(text.into()));
    }

    pub fn push_err(&self, err: impl Into<String>) {
        self.lock_responses().push_back(Err(err.into()));
    }

    /// 每次调用收到的完整消息列表
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        self.responses.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.lock_responses()
            .pop_front()
            .unwrap_or_else(|| Err("scripted responses exhausted".to_string()))
    }
}
