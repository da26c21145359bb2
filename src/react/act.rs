//! 工具阶段：按决策调用工具，把任何结果（含失败）都变成一段文本写入 tool_result

use std::sync::Arc;

use crate::core::TurnState;
use crate::observability::TurnMetrics;
use crate::tools::ToolExecutor;

pub struct ToolStage {
    executor: ToolExecutor,
    metrics: Arc<TurnMetrics>,
}

impl ToolStage {
    pub fn new(executor: ToolExecutor, metrics: Arc<TurnMetrics>) -> Self {
        Self { executor, metrics }
    }

    /// 执行 state 中的工具调用；未选择工具时返回空串。失败不会中止回合。
    pub async fn run(&self, state: &TurnState) -> String {
        let name = state.tool_name.trim();
        if name.is_empty() {
            return String::new();
        }
        match self.executor.execute(name, &state.tool_input).await {
            Ok(text) => text,
            Err(e) => {
                self.metrics.record_tool_failure();
                e.to_string()
            }
        }
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Decision, ToolArgs};
    use crate::tools::{CalculatorTool, ToolRegistry};

    fn stage(metrics: Arc<TurnMetrics>) -> ToolStage {
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool);
        ToolStage::new(ToolExecutor::new(registry, 5), metrics)
    }

    fn invoke(name: &str, key: &str, value: &str) -> TurnState {
        let mut state = TurnState::begin_turn(Vec::new(), "x");
        state.apply_decision(Decision::Invoke {
            name: name.to_string(),
            args: ToolArgs::from([(key.to_string(), value.to_string())]),
        });
        state
    }

    #[tokio::test]
    async fn test_runs_calculator() {
        let s = stage(Arc::new(TurnMetrics::new()));
        let out = s.run(&invoke("calculator", "expression", "1+2*3")).await;
        assert_eq!(out, "计算结果：1+2*3 = 7");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_text() {
        let metrics = Arc::new(TurnMetrics::new());
        let s = stage(metrics.clone());
        let out = s.run(&invoke("translate", "text", "hi")).await;
        assert_eq!(out, "未知工具：translate");
        assert_eq!(metrics.snapshot().tool_failures, 1);
    }

    #[tokio::test]
    async fn test_no_tool_is_empty() {
        let s = stage(Arc::new(TurnMetrics::new()));
        assert_eq!(s.run(&TurnState::begin_turn(Vec::new(), "你好")).await, "");
    }
}
