//! 回合过程事件：状态机每进入一个阶段、做出决策、拿到工具结果或回答时发出，供 CLI 调试展示

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::{ToolArgs, TurnPhase};

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// 进入阶段
    Phase { phase: TurnPhase },
    /// 决策结果；tool 为空表示不调用工具
    Decision { tool: String, args: ToolArgs },
    /// 工具返回（成功或失败描述）
    ToolResult { tool: String, result: String },
    /// 最终回答
    Answer { text: String },
    /// 回合已写入检查点
    Committed { version: u64, turn_count: usize },
    /// 回合中止，历史未变
    Aborted { reason: String },
}

pub type EventSender = UnboundedSender<TurnEvent>;

/// 发送事件；接收端已关闭时静默丢弃
pub(crate) fn emit(events: Option<&EventSender>, event: TurnEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(TurnEvent::Phase {
            phase: TurnPhase::Tool,
        })
        .unwrap();
        assert_eq!(json["type"], "phase");
        assert_eq!(json["phase"], "tool");

        let json = serde_json::to_value(TurnEvent::Committed {
            version: 3,
            turn_count: 3,
        })
        .unwrap();
        assert_eq!(json["type"], "committed");
    }
}
