//! 计算器工具：受限四则运算
//!
//! 仅接受数字、小数点、+ - * / 与括号（允许空白），递归下降求值，不存在任何名字或函数调用。
//! 语法：expr := term (('+'|'-') term)* ；term := factor (('*'|'/') factor)* ；
//! factor := ('+'|'-') factor | number | '(' expr ')'

use async_trait::async_trait;
use serde_json::Value;

use crate::core::ToolArgs;
use crate::tools::Tool;

/// 嵌套层数上限，防止恶意输入撑爆栈
const MAX_DEPTH: usize = 64;

/// 计算器工具
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "执行简单数学计算（支持加减乘除、括号），如 1+2*3、(10-5)/2"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": { "type": "string", "description": "数学表达式，如 1+2*3" }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, String> {
        let expression = args
            .get("expression")
            .map(|s| s.trim())
            .unwrap_or("");
        if expression.is_empty() {
            return Err("计算失败：缺少 expression 参数".to_string());
        }
        let value = evaluate(expression).map_err(|e| format!("计算失败：{e}"))?;
        Ok(format!("计算结果：{} = {}", expression, format_number(value)))
    }
}

/// 求值受限表达式
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let mut parser = Parser {
        chars: expression.chars().collect(),
        pos: 0,
        depth: 0,
    };
    parser.skip_ws();
    if parser.at_end() {
        return Err("表达式为空".to_string());
    }
    let value = parser.expr()?;
    parser.skip_ws();
    if let Some(c) = parser.peek() {
        return Err(format!("第 {} 个字符 '{}' 无法解析", parser.pos + 1, c));
    }
    if !value.is_finite() {
        return Err("结果超出范围".to_string());
    }
    Ok(value)
}

/// 整数值不带小数部分输出（7 而非 7.0）
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some('-') => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.factor()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                Some('/') => {
                    self.pos += 1;
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err("除数不能为零".to_string());
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn factor(&mut self) -> Result<f64, String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err("表达式嵌套过深".to_string());
        }
        let value = self.factor_inner();
        self.depth -= 1;
        value
    }

    fn factor_inner(&mut self) -> Result<f64, String> {
        self.skip_ws();
        match self.peek() {
            None => Err("表达式不完整".to_string()),
            Some('+') => {
                self.pos += 1;
                self.factor()
            }
            Some('-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some('(') => {
                self.pos += 1;
                let value = self.expr()?;
                self.skip_ws();
                if self.peek() != Some(')') {
                    return Err("括号不匹配".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(format!("第 {} 个字符 '{}' 不被允许", self.pos + 1, c)),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| format!("无效数字 '{literal}'"))
    }
}
