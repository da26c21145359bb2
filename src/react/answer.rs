//! 回答阶段：结合历史、当前输入与工具结果生成最终回答
//!
//! 空输入直接返回固定的澄清提示，不调用模型。模型报错、超时或返回空白都以
//! AgentError::AnswerSynthesis 返回，由状态机中止回合。

use std::sync::Arc;
use std::time::Duration;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;

/// 空输入时的固定回答
pub const CLARIFY_ANSWER: &str =
    "请问你有什么具体问题需要帮助？比如查询某个城市的天气，或执行数学计算。";

/// 默认回答 Prompt
pub const DEFAULT_ANSWER_PROMPT: &str = "你是一个有记忆的助手，结合对话历史回答用户当前的问题：
1. 回答简洁友好，不重复、不啰嗦；
2. 有工具结果时基于工具结果回答，没有工具结果时直接回应用户（如问候、闲聊）；
3. 工具调用失败时，向用户说明失败原因；
4. 用户问之前问过什么时，从对话历史中找出原话回答；
5. 只回答当前问题，不主动追问。";

pub struct AnswerStage {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    timeout: Duration,
}

impl AnswerStage {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            timeout,
        }
    }

    /// 组装回答阶段的消息：system、历史、当前输入、工具结果
    pub fn build_messages(&self, user_input: &str, tool_result: &str, history: &[Message]) -> Vec<Message> {
        let tool_result = if tool_result.trim().is_empty() {
            "无"
        } else {
            tool_result
        };
        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(history.iter().cloned());
        messages.push(Message::user(user_input));
        messages.push(Message::system(format!("工具结果：{tool_result}")));
        messages
    }

    pub async fn synthesize(
        &self,
        user_input: &str,
        tool_result: &str,
        history: &[Message],
    ) -> Result<String, AgentError> {
        let user_input = user_input.trim();
        if user_input.is_empty() {
            return Ok(CLARIFY_ANSWER.to_string());
        }

        let messages = self.build_messages(user_input, tool_result, history);
        let answer = match tokio::time::timeout(self.timeout, self.llm.complete(&messages)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(AgentError::AnswerSynthesis(e)),
            Err(_) => {
                return Err(AgentError::AnswerSynthesis(
                    AgentError::LlmTimeout(self.timeout.as_secs()).to_string(),
                ))
            }
        };

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(AgentError::AnswerSynthesis("empty response".to_string()));
        }
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::memory::Role;

    fn stage(llm: Arc<ScriptedLlmClient>) -> AnswerStage {
        AnswerStage::new(llm, DEFAULT_ANSWER_PROMPT, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_empty_input_clarifies_without_model() {
        let llm = Arc::new(ScriptedLlmClient::default());
        let answer = stage(llm.clone()).synthesize("  ", "", &[]).await.unwrap();
        assert_eq!(answer, CLARIFY_ANSWER);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_messages_carry_history_and_tool_result() {
        let llm = Arc::new(ScriptedLlmClient::new([Ok(" 结果是 7 ")]));
        let history = vec![Message::user("你好"), Message::assistant("你好！")];
        let answer = stage(llm.clone())
            .synthesize("1+2*3", "计算结果：1+2*3 = 7", &history)
            .await
            .unwrap();
        assert_eq!(answer, "结果是 7");

        let call = &llm.calls()[0];
        assert_eq!(call.len(), 5);
        assert_eq!(call[0].role, Role::System);
        assert_eq!(&call[1..3], &history[..]);
        assert_eq!(call[3], Message::user("1+2*3"));
        assert_eq!(call[4], Message::system("工具结果：计算结果：1+2*3 = 7"));
    }

    #[tokio::test]
    async fn test_no_tool_result_is_marked() {
        let llm = Arc::new(ScriptedLlmClient::new([Ok("你好！")]));
        stage(llm.clone()).synthesize("你好", "", &[]).await.unwrap();
        assert_eq!(llm.calls()[0].last().unwrap().content, "工具结果：无");
    }

    #[tokio::test]
    async fn test_failures_are_answer_errors() {
        let llm = Arc::new(ScriptedLlmClient::new([Err("503"), Ok("   ")]));
        let s = stage(llm);
        assert!(matches!(s.synthesize("a", "", &[]).await, Err(AgentError::AnswerSynthesis(_))));
        assert!(matches!(s.synthesize("a", "", &[]).await, Err(AgentError::AnswerSynthesis(_))));

        let slow = Arc::new(ScriptedLlmClient::new([Ok("迟到")]).with_delay(Duration::from_millis(200)));
        let s = AnswerStage::new(slow, DEFAULT_ANSWER_PROMPT, Duration::from_millis(20));
        assert!(matches!(s.synthesize("a", "", &[]).await, Err(AgentError::AnswerSynthesis(_))));
    }
}
