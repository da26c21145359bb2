//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找。
//! invoke 在独立任务中运行工具：工具返回 Err 或 panic 都会变成 ToolError::ExecutionFailed，不会中止回合。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::core::ToolArgs;

/// 工具调用失败：未注册的工具名，或执行期失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("未知工具：{0}")]
    Unknown(String),
    #[error("工具执行出错：{0}")]
    ExecutionFailed(String),
    #[error("工具执行出错：执行超时（{}ms）", .0.as_millis())]
    Timeout(Duration),
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（参数为字符串映射）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（决策 JSON 中的 "tool_name"）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具，失败时返回人类可读的原因
    async fn execute(&self, args: &ToolArgs) -> Result<String, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// 按名称执行工具
    pub async fn invoke(&self, name: &str, args: &ToolArgs) -> Result<String, ToolError> {
        self.invoke_within(name, args, None).await
    }

    /// 按名称执行工具；给定 deadline 时超时即中止工具任务并返回 ToolError::Timeout
    pub async fn invoke_within(
        &self,
        name: &str,
        args: &ToolArgs,
        deadline: Option<Duration>,
    ) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        let args = args.clone();
        let mut handle = tokio::spawn(async move { tool.execute(&args).await });
        let joined = match deadline {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    return Err(ToolError::Timeout(limit));
                }
            },
            None => handle.await,
        };
        match joined {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(msg)) => Err(ToolError::ExecutionFailed(msg)),
            Err(join_err) if join_err.is_panic() => {
                Err(ToolError::ExecutionFailed(format!("{name} panicked")))
            }
            Err(join_err) => Err(ToolError::ExecutionFailed(join_err.to_string())),
        }
    }

    /// 已注册工具名（排序，便于生成稳定的 Prompt）
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 工具目录 JSON（name / description / parameters），拼入决策 Prompt
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tool_names()
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}
