//! Agent 错误类型
//!
//! 只有 AnswerSynthesis / LlmTimeout（回答阶段）与 Checkpoint 会中止一个回合；
//! 决策与工具阶段的错误都在阶段内部降级，不会越过回合边界。

use thiserror::Error;

use crate::checkpoint::CheckpointError;

/// 回合处理过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 决策阶段模型输出不是合法的决策 JSON（阶段内降级为「不调用工具」）
    #[error("Decision parse error: {0}")]
    DecisionParse(String),

    #[error("Unknown tool: {0}")]
    ToolUnknown(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("LLM timeout after {0}s")]
    LlmTimeout(u64),

    /// 回答阶段失败：回合中止，不写检查点，历史保持不变
    #[error("Answer synthesis failed: {0}")]
    AnswerSynthesis(String),

    #[error("Checkpoint store error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

impl AgentError {
    /// 是否属于「回合被中止」一类（驱动层据此提示用户重试）
    pub fn aborts_turn(&self) -> bool {
        matches!(
            self,
            AgentError::AnswerSynthesis(_) | AgentError::LlmTimeout(_) | AgentError::Checkpoint(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_answer_and_checkpoint_errors_abort() {
        assert!(AgentError::AnswerSynthesis("down".into()).aborts_turn());
        assert!(AgentError::LlmTimeout(30).aborts_turn());
        assert!(AgentError::Checkpoint(CheckpointError::Corrupt("bad".into())).aborts_turn());

        assert!(!AgentError::DecisionParse("not json".into()).aborts_turn());
        assert!(!AgentError::ToolUnknown("nope".into()).aborts_turn());
        assert!(!AgentError::LlmError("down".into()).aborts_turn());
    }
}
