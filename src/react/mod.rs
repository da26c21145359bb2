//! 认知层：决策、工具、回答三个阶段与驱动它们的回合状态机

pub mod act;
pub mod answer;
pub mod decision;
pub mod events;
pub mod machine;

pub use act::ToolStage;
pub use answer::{AnswerStage, CLARIFY_ANSWER, DEFAULT_ANSWER_PROMPT};
pub use decision::{parse_decision, DecisionStage, DEFAULT_DECISION_PROMPT};
pub use events::{EventSender, TurnEvent};
pub use machine::{route, TurnMachine};
