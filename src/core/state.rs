//! 回合状态：TurnState 与结构化决策 Decision
//!
//! 一个回合内 TurnState 依次被决策 / 工具 / 回答阶段修改；回合完成后整体交给检查点存储。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::memory::Message;

/// 工具参数：参数名 -> 字符串值（有序，保证快照序列化稳定）
pub type ToolArgs = BTreeMap<String, String>;

/// 单个回合的完整状态（检查点快照的内容）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    /// 当前用户输入，可为空（空输入为 no-op 回合）
    pub user_input: String,
    /// 对话历史，按时间顺序；只在回合成功提交时追加
    pub chat_history: Vec<Message>,
    /// 空字符串或已注册的工具名
    pub tool_name: String,
    pub tool_input: ToolArgs,
    /// 工具执行结果（成功或描述失败的文本），未调用工具时为空
    pub tool_result: String,
    /// 本回合的最终回答，回答阶段完成前为空
    pub final_answer: String,
}

impl TurnState {
    /// 以已提交的历史开始一个新回合：清空上一回合的工具与回答字段
    pub fn begin_turn(history: Vec<Message>, user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            chat_history: history,
            ..Self::default()
        }
    }

    /// 去除首尾空白后的用户输入
    pub fn trimmed_input(&self) -> &str {
        self.user_input.trim()
    }

    /// 把决策写入状态（tool_name / tool_input）
    pub fn apply_decision(&mut self, decision: Decision) {
        match decision {
            Decision::None => {
                self.tool_name.clear();
                self.tool_input.clear();
            }
            Decision::Invoke { name, args } => {
                self.tool_name = name;
                self.tool_input = args;
            }
        }
    }

    /// 当前状态中的决策（tool_name 为空白时为 None）
    pub fn decision(&self) -> Decision {
        if self.tool_name.trim().is_empty() {
            Decision::None
        } else {
            Decision::Invoke {
                name: self.tool_name.clone(),
                args: self.tool_input.clone(),
            }
        }
    }

    /// 提交本回合：user + assistant 各追加一次。仅由状态机在回答成功后调用。
    pub fn commit_turn(&mut self, final_answer: String) {
        self.chat_history.push(Message::user(self.trimmed_input().to_string()));
        self.chat_history.push(Message::assistant(final_answer.clone()));
        self.final_answer = final_answer;
    }

    /// 已完成的回合数（历史中每回合两条）
    pub fn turn_count(&self) -> usize {
        self.chat_history.len() / 2
    }
}

/// 决策阶段的结构化输出：不调用工具，或调用某个工具并携带参数
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    None,
    Invoke { name: String, args: ToolArgs },
}

impl Decision {
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Decision::None => None,
            Decision::Invoke { name, .. } => Some(name),
        }
    }
}

/// 回合状态机的阶段：INIT → THINK → ROUTE → [TOOL →] ANSWER → DONE
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Init,
    Think,
    Route,
    Tool,
    Answer,
    Done,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnPhase::Init => "init",
            TurnPhase::Think => "think",
            TurnPhase::Route => "route",
            TurnPhase::Tool => "tool",
            TurnPhase::Answer => "answer",
            TurnPhase::Done => "done",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_turn_resets_turn_fields() {
        let history = vec![Message::user("1+1"), Message::assistant("2")];
        let state = TurnState::begin_turn(history.clone(), "你好");
        assert_eq!(state.chat_history, history);
        assert!(state.tool_name.is_empty());
        assert!(state.tool_result.is_empty());
        assert!(state.final_answer.is_empty());
    }

    #[test]
    fn test_blank_tool_name_is_no_decision() {
        let mut state = TurnState::default();
        state.tool_name = "   ".to_string();
        assert_eq!(state.decision(), Decision::None);
    }

    #[test]
    fn test_commit_turn_appends_pair() {
        let mut state = TurnState::begin_turn(Vec::new(), "  你好 ");
        state.commit_turn("你好！".to_string());
        assert_eq!(state.chat_history.len(), 2);
        assert_eq!(state.chat_history[0], Message::user("你好"));
        assert_eq!(state.chat_history[1], Message::assistant("你好！"));
        assert_eq!(state.turn_count(), 1);
    }
}
