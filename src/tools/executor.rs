//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args) 在超时内调用 registry；
//! 每次调用输出结构化审计日志（JSON）。未知工具、执行失败、超时都以 ToolError 返回，由调用方渲染为文本。

use std::time::{Duration, Instant};

use crate::core::ToolArgs;
use crate::tools::{ToolError, ToolRegistry};

/// 工具执行器：对每次调用施加超时并记录审计日志
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self::with_timeout(registry, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// 执行指定工具；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, args: &ToolArgs) -> Result<String, ToolError> {
        let start = Instant::now();
        let result = self
            .registry
            .invoke_within(tool_name, args, Some(self.timeout))
            .await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(ToolError::Unknown(_)) => "unknown",
            Err(ToolError::ExecutionFailed(_)) => "error",
            Err(ToolError::Timeout(_)) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(args),
        });
        tracing::info!(audit = %audit, "tool");

        result
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

fn args_preview(args: &ToolArgs) -> String {
    let s = serde_json::to_string(args).unwrap_or_default();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::CalculatorTool;

    #[tokio::test]
    async fn test_execute_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool);
        let executor = ToolExecutor::new(registry, 5);
        let args = ToolArgs::from([("expression".to_string(), "2*(3+4)".to_string())]);
        let text = executor.execute("calculator", &args).await.unwrap();
        assert_eq!(text, "计算结果：2*(3+4) = 14");
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let executor = ToolExecutor::new(ToolRegistry::new(), 5);
        let err = executor.execute("translate", &ToolArgs::new()).await.unwrap_err();
        assert_eq!(err, ToolError::Unknown("translate".to_string()));
    }

    #[test]
    fn test_args_preview_truncates() {
        let args = ToolArgs::from([("text".to_string(), "x".repeat(500))]);
        let preview = args_preview(&args);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 203);
    }
}
