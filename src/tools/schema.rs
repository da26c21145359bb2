//! 决策输出 JSON Schema 生成（schemars）
//!
//! 决策阶段要求模型只输出 {"tool_name": ..., "tool_input": {...}}，该结构的 Schema 拼入决策 Prompt。

use schemars::{schema_for, JsonSchema};
use std::collections::BTreeMap;

/// 决策 JSON 格式（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct DecisionFormat {
    /// 工具名；不需要工具（问候、闲聊）时为空字符串
    pub tool_name: String,
    /// 工具参数，参数名到字符串值；不需要工具时为空对象
    pub tool_input: BTreeMap<String, String>,
}

/// 返回决策输出的 JSON Schema 字符串
pub fn decision_schema_json() -> String {
    let schema = schema_for!(DecisionFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_names_both_keys() {
        let schema = decision_schema_json();
        assert!(schema.contains("tool_name"));
        assert!(schema.contains("tool_input"));
    }
}
