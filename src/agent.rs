//! Headless Agent 运行时
//!
//! process_message 对单条用户输入跑完一个回合：
//! INIT（读检查点、以已提交历史开始新回合）→ 状态机 → DONE（写检查点）。
//! 同一会话的回合串行排队，不同会话可并行。回答失败时不写检查点，历史保持不变。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::checkpoint::{create_checkpoint_store, CheckpointStore, SessionCheckpoint, SnapshotExport};
use crate::config::AppConfig;
use crate::core::{AgentError, SessionLocks, TurnPhase, TurnState};
use crate::llm::{create_dashscope_client, create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::Message;
use crate::observability::{MetricsSnapshot, TurnMetrics};
use crate::react::events::emit;
use crate::react::{
    AnswerStage, DecisionStage, EventSender, ToolStage, TurnEvent, TurnMachine, DEFAULT_ANSWER_PROMPT,
    DEFAULT_DECISION_PROMPT,
};
use crate::tools::{builtin_registry, ToolExecutor, ToolRegistry};

/// 一个回合的结果
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// 回合结束时的状态（已提交的历史、工具结果、最终回答）
    pub state: TurnState,
    /// 本回合写入的检查点；空输入回合不写入，为 None
    pub checkpoint: Option<SessionCheckpoint>,
}

impl TurnOutcome {
    pub fn final_answer(&self) -> &str {
        &self.state.final_answer
    }
}

/// Agent 构建器：LLM、工具、检查点存储必填，其余有默认值
pub struct AgentBuilder {
    llm: Arc<dyn LlmClient>,
    registry: ToolRegistry,
    store: Arc<dyn CheckpointStore>,
    llm_timeout: Duration,
    tool_timeout: Duration,
    decision_prompt: String,
    answer_prompt: String,
}

impl AgentBuilder {
    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn decision_prompt(mut self, template: impl Into<String>) -> Self {
        self.decision_prompt = template.into();
        self
    }

    pub fn answer_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.answer_prompt = prompt.into();
        self
    }

    pub fn build(self) -> Agent {
        let metrics = Arc::new(TurnMetrics::new());
        let decision = DecisionStage::new(
            self.llm.clone(),
            &self.registry,
            &self.decision_prompt,
            self.llm_timeout,
            metrics.clone(),
        );
        let tools = ToolStage::new(
            ToolExecutor::with_timeout(self.registry, self.tool_timeout),
            metrics.clone(),
        );
        let answer = AnswerStage::new(self.llm, self.answer_prompt, self.llm_timeout);
        Agent {
            machine: TurnMachine::new(decision, tools, answer, metrics.clone()),
            store: self.store,
            metrics,
            sessions: SessionLocks::new(),
        }
    }
}

pub struct Agent {
    machine: TurnMachine,
    store: Arc<dyn CheckpointStore>,
    metrics: Arc<TurnMetrics>,
    sessions: SessionLocks,
}

impl Agent {
    pub fn builder(
        llm: Arc<dyn LlmClient>,
        registry: ToolRegistry,
        store: Arc<dyn CheckpointStore>,
    ) -> AgentBuilder {
        AgentBuilder {
            llm,
            registry,
            store,
            llm_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            decision_prompt: DEFAULT_DECISION_PROMPT.to_string(),
            answer_prompt: DEFAULT_ANSWER_PROMPT.to_string(),
        }
    }

    /// 处理单条用户消息
    pub async fn process_message(&self, session_id: &str, user_input: &str) -> Result<TurnOutcome, AgentError> {
        self.process_message_with_events(session_id, user_input, None).await
    }

    /// 处理单条用户消息，并通过 events 推送每个阶段的事件
    pub async fn process_message_with_events(
        &self,
        session_id: &str,
        user_input: &str,
        events: Option<&EventSender>,
    ) -> Result<TurnOutcome, AgentError> {
        let _guard = self.sessions.acquire(session_id).await;

        let result = self.run_turn(session_id, user_input, events).await;
        match &result {
            Ok(outcome) => {
                self.metrics.record_completed();
                tracing::info!(
                    session_id = %session_id,
                    tool = %outcome.state.tool_name,
                    turn_count = outcome.state.turn_count(),
                    "turn completed"
                );
            }
            Err(e) => {
                self.metrics.record_aborted();
                tracing::warn!(session_id = %session_id, error = %e, "turn aborted");
            }
        }
        result
    }

    async fn run_turn(
        &self,
        session_id: &str,
        user_input: &str,
        events: Option<&EventSender>,
    ) -> Result<TurnOutcome, AgentError> {
        emit(events, TurnEvent::Phase { phase: TurnPhase::Init });
        let state = self.load_state(session_id, user_input).await?;

        let state = self.machine.run(state, events).await?;

        if state.trimmed_input().is_empty() {
            return Ok(TurnOutcome {
                state,
                checkpoint: None,
            });
        }

        let checkpoint = match self.store.put(session_id, &state).await {
            Ok(cp) => cp,
            Err(e) => {
                emit(events, TurnEvent::Aborted { reason: e.to_string() });
                return Err(e.into());
            }
        };
        self.metrics.record_checkpoint_write();
        emit(
            events,
            TurnEvent::Committed {
                version: checkpoint.version,
                turn_count: state.turn_count(),
            },
        );
        Ok(TurnOutcome {
            state,
            checkpoint: Some(checkpoint),
        })
    }

    /// INIT：以会话最新检查点中的历史开始一个新回合
    pub async fn load_state(&self, session_id: &str, user_input: &str) -> Result<TurnState, AgentError> {
        let history = self
            .store
            .get(session_id)
            .await?
            .map(|cp| cp.state.chat_history)
            .unwrap_or_default();
        Ok(TurnState::begin_turn(history, user_input))
    }

    /// 会话的已提交历史
    pub async fn history(&self, session_id: &str) -> Result<Vec<Message>, AgentError> {
        Ok(self
            .store
            .get(session_id)
            .await?
            .map(|cp| cp.state.chat_history)
            .unwrap_or_default())
    }

    /// 导出会话最新检查点；从未提交过时为 None
    pub async fn export(&self, session_id: &str) -> Result<Option<SnapshotExport>, AgentError> {
        Ok(self.store.get(session_id).await?.map(|cp| cp.export()))
    }

    pub async fn sessions(&self) -> Result<Vec<String>, AgentError> {
        Ok(self.store.list_sessions().await?)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn machine(&self) -> &TurnMachine {
        &self.machine
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// 正在处理或排队中的会话数
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

/// 按配置选择 LLM：provider 对应的 Key 存在时用真实后端，否则退回离线 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let model = Some(cfg.llm.model.as_str()).filter(|m| !m.trim().is_empty());
    let base_url = cfg.llm.base_url.as_deref();

    let client = match provider.as_str() {
        "dashscope" | "qwen" => create_dashscope_client(model, base_url),
        "deepseek" => create_deepseek_client(model, base_url),
        "openai" => std::env::var("OPENAI_API_KEY")
            .ok()
            .map(|key| OpenAiClient::new(base_url, model.unwrap_or("gpt-4o-mini"), Some(key.as_str()))),
        other => {
            tracing::warn!("Unknown LLM provider '{}'", other);
            None
        }
    };

    match client {
        Some(client) => {
            tracing::info!("Using {} LLM ({})", provider, client.model());
            Arc::new(client.with_temperature(cfg.llm.temperature))
        }
        None => {
            tracing::warn!("No API key set or provider unknown, using Mock LLM");
            Arc::new(MockLlmClient)
        }
    }
}

/// 按配置创建 Agent：LLM、内置工具、检查点存储、Prompt 与超时
pub async fn create_agent(cfg: &AppConfig) -> anyhow::Result<Agent> {
    let llm = create_llm_from_config(cfg);
    let registry = builtin_registry(&cfg.tools.weather.base_url, cfg.tools.weather.timeout_secs);
    let store = create_checkpoint_store(&cfg.checkpoint.backend, &cfg.checkpoint.path)
        .await
        .context("Failed to open checkpoint store")?;

    Ok(Agent::builder(llm, registry, store)
        .llm_timeout(Duration::from_secs(cfg.llm.timeouts.request))
        .tool_timeout(Duration::from_secs(cfg.tools.tool_timeout_secs))
        .decision_prompt(cfg.prompts.load_decision(DEFAULT_DECISION_PROMPT))
        .answer_prompt(cfg.prompts.load_answer(DEFAULT_ANSWER_PROMPT))
        .build())
}
