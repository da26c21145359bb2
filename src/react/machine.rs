//! 回合状态机：INIT → THINK → ROUTE → [TOOL →] ANSWER → DONE
//!
//! 每个阶段只读写 TurnState 的相应字段；ROUTE 是纯函数。INIT（加载检查点）与 DONE 之后的
//! 持久化由 Agent 负责，状态机只在回答成功时调用 commit_turn 追加一次历史。

use std::sync::Arc;

use crate::core::{AgentError, TurnPhase, TurnState};
use crate::observability::TurnMetrics;
use crate::react::act::ToolStage;
use crate::react::answer::AnswerStage;
use crate::react::decision::DecisionStage;
use crate::react::events::{emit, EventSender, TurnEvent};

/// 路由：tool_name 非空走工具阶段，否则直接回答
pub fn route(state: &TurnState) -> TurnPhase {
    if state.tool_name.trim().is_empty() {
        TurnPhase::Answer
    } else {
        TurnPhase::Tool
    }
}

pub struct TurnMachine {
    decision: DecisionStage,
    tools: ToolStage,
    answer: AnswerStage,
    metrics: Arc<TurnMetrics>,
}

impl TurnMachine {
    pub fn new(
        decision: DecisionStage,
        tools: ToolStage,
        answer: AnswerStage,
        metrics: Arc<TurnMetrics>,
    ) -> Self {
        Self {
            decision,
            tools,
            answer,
            metrics,
        }
    }

    pub fn decision_stage(&self) -> &DecisionStage {
        &self.decision
    }

    pub fn metrics(&self) -> &Arc<TurnMetrics> {
        &self.metrics
    }

    /// 从 THINK 开始跑完整个回合
    pub async fn run(&self, state: TurnState, events: Option<&EventSender>) -> Result<TurnState, AgentError> {
        self.run_from(TurnPhase::Think, state, events).await
    }

    /// 从指定阶段开始推进，直到 DONE；回答失败时返回错误，state 被丢弃
    pub async fn run_from(
        &self,
        start: TurnPhase,
        mut state: TurnState,
        events: Option<&EventSender>,
    ) -> Result<TurnState, AgentError> {
        let mut phase = start;
        loop {
            emit(events, TurnEvent::Phase { phase });
            tracing::debug!(phase = %phase, "turn phase");
            phase = match phase {
                TurnPhase::Init => TurnPhase::Think,
                TurnPhase::Think => {
                    let decision = self
                        .decision
                        .decide(&state.user_input, &state.chat_history)
                        .await;
                    state.apply_decision(decision);
                    emit(
                        events,
                        TurnEvent::Decision {
                            tool: state.tool_name.clone(),
                            args: state.tool_input.clone(),
                        },
                    );
                    TurnPhase::Route
                }
                TurnPhase::Route => route(&state),
                TurnPhase::Tool => {
                    state.tool_result = self.tools.run(&state).await;
                    emit(
                        events,
                        TurnEvent::ToolResult {
                            tool: state.tool_name.clone(),
                            result: state.tool_result.clone(),
                        },
                    );
                    TurnPhase::Answer
                }
                TurnPhase::Answer => {
                    let answer = match self
                        .answer
                        .synthesize(&state.user_input, &state.tool_result, &state.chat_history)
                        .await
                    {
                        Ok(answer) => answer,
                        Err(e) => {
                            emit(
                                events,
                                TurnEvent::Aborted {
                                    reason: e.to_string(),
                                },
                            );
                            return Err(e);
                        }
                    };
                    emit(events, TurnEvent::Answer { text: answer.clone() });
                    if state.trimmed_input().is_empty() {
                        state.final_answer = answer;
                    } else {
                        state.commit_turn(answer);
                    }
                    TurnPhase::Done
                }
                TurnPhase::Done => return Ok(state),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Decision;
    use crate::llm::ScriptedLlmClient;
    use crate::react::answer::DEFAULT_ANSWER_PROMPT;
    use crate::react::decision::DEFAULT_DECISION_PROMPT;
    use crate::tools::{CalculatorTool, ToolExecutor, ToolRegistry};
    use std::time::Duration;

    fn machine(llm: Arc<ScriptedLlmClient>) -> TurnMachine {
        let metrics = Arc::new(TurnMetrics::new());
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool);
        let timeout = Duration::from_secs(5);
        TurnMachine::new(
            DecisionStage::new(llm.clone(), &registry, DEFAULT_DECISION_PROMPT, timeout, metrics.clone()),
            ToolStage::new(ToolExecutor::new(registry, 5), metrics.clone()),
            AnswerStage::new(llm, DEFAULT_ANSWER_PROMPT, timeout),
            metrics,
        )
    }

    #[test]
    fn test_route_is_pure() {
        let mut state = TurnState::begin_turn(Vec::new(), "1+1");
        assert_eq!(route(&state), TurnPhase::Answer);
        state.tool_name = "calculator".to_string();
        assert_eq!(route(&state), TurnPhase::Tool);
        assert_eq!(route(&state), TurnPhase::Tool);
    }

    #[tokio::test]
    async fn test_tool_turn_phases() {
        let llm = Arc::new(ScriptedLlmClient::new([
            Ok(r#"{"tool_name":"calculator","tool_input":{"expression":"1+2*3"}}"#),
            Ok("结果是 7"),
        ]));
        let m = machine(llm);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let state = m
            .run(TurnState::begin_turn(Vec::new(), "1+2*3"), Some(&tx))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(state.tool_result, "计算结果：1+2*3 = 7");
        assert_eq!(state.final_answer, "结果是 7");
        assert_eq!(state.chat_history.len(), 2);

        let mut phases = Vec::new();
        while let Some(event) = rx.recv().await {
            if let TurnEvent::Phase { phase } = event {
                phases.push(phase);
            }
        }
        assert_eq!(
            phases,
            vec![
                TurnPhase::Think,
                TurnPhase::Route,
                TurnPhase::Tool,
                TurnPhase::Answer,
                TurnPhase::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_answer_failure_leaves_no_history() {
        let llm = Arc::new(ScriptedLlmClient::new([
            Ok(r#"{"tool_name":"","tool_input":{}}"#),
            Err("boom"),
        ]));
        let result = machine(llm).run(TurnState::begin_turn(Vec::new(), "你好"), None).await;
        assert!(matches!(result, Err(AgentError::AnswerSynthesis(_))));
    }

    #[tokio::test]
    async fn test_run_from_route_with_unregistered_tool() {
        let llm = Arc::new(ScriptedLlmClient::new([Ok("抱歉，没有这个工具")]));
        let mut state = TurnState::begin_turn(Vec::new(), "翻译 hello");
        state.apply_decision(Decision::Invoke {
            name: "translate".to_string(),
            args: Default::default(),
        });
        let state = machine(llm.clone())
            .run_from(TurnPhase::Route, state, None)
            .await
            .unwrap();
        assert_eq!(state.tool_result, "未知工具：translate");
        assert_eq!(state.final_answer, "抱歉，没有这个工具");
        assert_eq!(llm.call_count(), 1);
    }
}
