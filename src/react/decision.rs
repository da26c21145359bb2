//! 决策阶段：判断本轮是否调用工具
//!
//! 空输入直接返回 Decision::None，不调用模型。否则让模型只输出
//! {"tool_name": ..., "tool_input": {...}}；解析失败、结构不符、模型报错或超时、工具名未注册，
//! 全部降级为 Decision::None（并计入 decision_fallbacks），决不让回合因决策失败而报错。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::core::{AgentError, Decision};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::observability::TurnMetrics;
use crate::tools::{decision_schema_json, ToolRegistry};

/// 默认决策 Prompt；{tools} 替换为工具目录，{schema} 替换为输出 Schema
pub const DEFAULT_DECISION_PROMPT: &str = r#"你是决策助手，只判断本轮是否需要调用工具，不直接回答用户。
规则：
1. 用户要查询某个城市的天气，或要求计算一个数学表达式时，选择对应工具并给出参数；
2. 问候、闲聊、回忆之前的对话等其他情况，不调用工具，返回 {"tool_name":"","tool_input":{}}；
3. 只输出一个 JSON 对象，恰好包含 "tool_name" 与 "tool_input" 两个键，参数值一律为字符串，不要输出任何其它文字、注释或 Markdown。

可用工具：
{tools}

输出格式（JSON Schema）：
{schema}

示例：
{"tool_name":"weather_query","tool_input":{"city":"北京"}}
{"tool_name":"calculator","tool_input":{"expression":"1+1"}}
{"tool_name":"","tool_input":{}}"#;

/// 模型输出的决策 JSON：恰好两个键
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDecision {
    tool_name: String,
    tool_input: BTreeMap<String, String>,
}

/// 解析模型输出为 Decision；允许外层 ```json 代码块，其余必须是严格 JSON
pub fn parse_decision(output: &str) -> Result<Decision, AgentError> {
    let trimmed = output.trim();
    let json_str = strip_code_fence(trimmed);
    let raw: RawDecision = serde_json::from_str(json_str)
        .map_err(|e| AgentError::DecisionParse(format!("{}: {}", e, json_str)))?;

    let name = raw.tool_name.trim();
    if name.is_empty() {
        Ok(Decision::None)
    } else {
        Ok(Decision::Invoke {
            name: name.to_string(),
            args: raw.tool_input,
        })
    }
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// 决策阶段：持有 LLM、渲染好的 system prompt 与已注册工具名
pub struct DecisionStage {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    tool_names: Vec<String>,
    timeout: Duration,
    metrics: Arc<TurnMetrics>,
}

impl DecisionStage {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: &ToolRegistry,
        template: &str,
        timeout: Duration,
        metrics: Arc<TurnMetrics>,
    ) -> Self {
        let system_prompt = template
            .replace("{tools}", &registry.to_schema_json())
            .replace("{schema}", &decision_schema_json());
        Self {
            llm,
            system_prompt,
            tool_names: registry.tool_names(),
            timeout,
            metrics,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// 决策：永远返回 Decision，失败路径降级为 None
    pub async fn decide(&self, user_input: &str, history: &[Message]) -> Decision {
        let user_input = user_input.trim();
        if user_input.is_empty() {
            return Decision::None;
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(history.iter().cloned());
        messages.push(Message::user(user_input));

        let raw = match tokio::time::timeout(self.timeout, self.llm.complete(&messages)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return self.fallback(&AgentError::LlmError(e)),
            Err(_) => return self.fallback(&AgentError::LlmTimeout(self.timeout.as_secs())),
        };

        match parse_decision(&raw) {
            Ok(Decision::Invoke { name, .. }) if !self.tool_names.contains(&name) => {
                self.fallback(&AgentError::ToolUnknown(name))
            }
            Ok(decision) => {
                tracing::debug!(tool = ?decision.tool_name(), "decision");
                decision
            }
            Err(e) => self.fallback(&e),
        }
    }

    fn fallback(&self, reason: &AgentError) -> Decision {
        self.metrics.record_decision_fallback(&reason.to_string());
        Decision::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolArgs;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::CalculatorTool;

    fn stage(llm: Arc<ScriptedLlmClient>, metrics: Arc<TurnMetrics>) -> DecisionStage {
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool);
        DecisionStage::new(
            llm,
            &registry,
            DEFAULT_DECISION_PROMPT,
            Duration::from_secs(5),
            metrics,
        )
    }

    #[test]
    fn test_parse_invoke() {
        let d = parse_decision(r#"{"tool_name":"calculator","tool_input":{"expression":"1+2*3"}}"#).unwrap();
        assert_eq!(
            d,
            Decision::Invoke {
                name: "calculator".to_string(),
                args: ToolArgs::from([("expression".to_string(), "1+2*3".to_string())]),
            }
        );
    }

    #[test]
    fn test_parse_empty_tool() {
        assert_eq!(parse_decision(r#"{"tool_name":"","tool_input":{}}"#).unwrap(), Decision::None);
        assert_eq!(parse_decision(r#"{"tool_name":"  ","tool_input":{"x":"y"}}"#).unwrap(), Decision::None);
    }

    #[test]
    fn test_parse_code_fence() {
        let d = parse_decision("```json\n{\"tool_name\":\"calculator\",\"tool_input\":{\"expression\":\"1\"}}\n```").unwrap();
        assert_eq!(d.tool_name(), Some("calculator"));
    }

    #[test]
    fn test_parse_rejects_invalid_structure() {
        assert!(parse_decision("好的，我来帮你计算").is_err());
        assert!(parse_decision(r#"{"tool_name":"calculator"}"#).is_err());
        assert!(parse_decision(r#"{"tool_name":1,"tool_input":{}}"#).is_err());
        assert!(parse_decision(r#"{"tool_name":"calculator","tool_input":{"expression":7}}"#).is_err());
        assert!(parse_decision(r#"{"tool_name":"calculator","tool_input":[]}"#).is_err());
        assert!(parse_decision(r#"{"tool_name":"","tool_input":{},"reason":"x"}"#).is_err());
    }

    #[test]
    fn test_prompt_renders_tools_and_schema() {
        let s = stage(Arc::new(ScriptedLlmClient::default()), Arc::new(TurnMetrics::new()));
        assert!(s.system_prompt().contains("\"calculator\""));
        assert!(s.system_prompt().contains("\"tool_input\""));
        assert!(!s.system_prompt().contains("{tools}"));
    }

    #[tokio::test]
    async fn test_empty_input_skips_model() {
        let llm = Arc::new(ScriptedLlmClient::default());
        let s = stage(llm.clone(), Arc::new(TurnMetrics::new()));
        assert_eq!(s.decide("   ", &[]).await, Decision::None);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_history_is_passed_as_context() {
        let llm = Arc::new(ScriptedLlmClient::new([Ok(r#"{"tool_name":"","tool_input":{}}"#)]));
        let s = stage(llm.clone(), Arc::new(TurnMetrics::new()));
        let history = vec![Message::user("1+1"), Message::assistant("2")];
        s.decide("你好", &history).await;
        let call = &llm.calls()[0];
        assert_eq!(call.len(), 4);
        assert_eq!(call[1], history[0]);
        assert_eq!(call[3], Message::user("你好"));
    }

    #[tokio::test]
    async fn test_fallbacks_are_counted() {
        let llm = Arc::new(ScriptedLlmClient::new([
            Ok("not json"),
            Err("503 upstream"),
            Ok(r#"{"tool_name":"translate","tool_input":{"text":"hi"}}"#),
        ]));
        let metrics = Arc::new(TurnMetrics::new());
        let s = stage(llm, metrics.clone());
        assert_eq!(s.decide("a", &[]).await, Decision::None);
        assert_eq!(s.decide("b", &[]).await, Decision::None);
        assert_eq!(s.decide("c", &[]).await, Decision::None);
        assert_eq!(metrics.snapshot().decision_fallbacks, 3);
    }

    #[tokio::test]
    async fn test_timeout_degrades() {
        let llm = Arc::new(
            ScriptedLlmClient::new([Ok(r#"{"tool_name":"calculator","tool_input":{"expression":"1"}}"#)])
                .with_delay(Duration::from_millis(200)),
        );
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool);
        let s = DecisionStage::new(
            llm,
            &registry,
            DEFAULT_DECISION_PROMPT,
            Duration::from_millis(20),
            Arc::new(TurnMetrics::new()),
        );
        assert_eq!(s.decide("1", &[]).await, Decision::None);
    }
}
