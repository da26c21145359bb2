//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TURN_AGENT__*` 覆盖（双下划线表示嵌套，如 `TURN_AGENT__LLM__MODEL=qwen-plus`）。

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::tools::DEFAULT_WEATHER_URL;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub checkpoint: CheckpointSection,
    pub prompts: PromptsSection,
}

/// [app] 段：会话、退出词与调试输出
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub session_id: String,
    /// 控制台输入这些词（忽略大小写）时退出
    pub exit_phrases: Vec<String>,
    /// 每回合结束后打印检查点导出
    pub debug_checkpoint: bool,
    /// 打印每个阶段的事件
    pub show_events: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            session_id: "user_001".to_string(),
            exit_phrases: vec!["exit".into(), "quit".into(), "退出".into()],
            debug_checkpoint: false,
            show_events: false,
        }
    }
}

/// [llm] 段：后端选择、采样温度与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// dashscope / deepseek / openai
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "dashscope".to_string(),
            model: crate::llm::QWEN_TURBO.to_string(),
            base_url: None,
            temperature: 0.0,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次模型调用超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [tools] 段：工具超时与天气接口
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    pub weather: WeatherSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            weather: WeatherSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherSection {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for WeatherSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WEATHER_URL.to_string(),
            timeout_secs: 5,
        }
    }
}

/// [checkpoint] 段：memory / file / sqlite
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckpointSection {
    pub backend: String,
    /// file 后端为目录，sqlite 后端为数据库文件
    pub path: PathBuf,
}

impl Default for CheckpointSection {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            path: PathBuf::from("data/checkpoints"),
        }
    }
}

/// [prompts] 段：覆盖内置 Prompt 的文件路径
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromptsSection {
    pub decision: Option<PathBuf>,
    pub answer: Option<PathBuf>,
}

impl PromptsSection {
    /// 决策 Prompt：配置路径 > config/prompts/decision.txt > 内置
    pub fn load_decision(&self, builtin: &str) -> String {
        load_prompt(self.decision.as_deref(), "decision.txt", builtin)
    }

    /// 回答 Prompt：配置路径 > config/prompts/answer.txt > 内置
    pub fn load_answer(&self, builtin: &str) -> String {
        load_prompt(self.answer.as_deref(), "answer.txt", builtin)
    }
}

fn load_prompt(configured: Option<&Path>, file_name: &str, builtin: &str) -> String {
    let defaults = [
        PathBuf::from("config/prompts").join(file_name),
        PathBuf::from("../config/prompts").join(file_name),
    ];
    configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(defaults)
        .find_map(|p| std::fs::read_to_string(&p).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| builtin.to_string())
}

/// 从 config 目录加载配置，环境变量 TURN_AGENT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TURN_AGENT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TURN_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.session_id, "user_001");
        assert_eq!(cfg.llm.provider, "dashscope");
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
        assert_eq!(cfg.checkpoint.backend, "file");
        assert!(cfg.app.exit_phrases.iter().any(|p| p == "退出"));
    }

    #[test]
    fn test_explicit_file_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[app]\nsession_id = \"alice\"\n\n[checkpoint]\nbackend = \"memory\"\n\n[tools.weather]\ntimeout_secs = 9\n",
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.app.session_id, "alice");
        assert_eq!(cfg.checkpoint.backend, "memory");
        assert_eq!(cfg.tools.weather.timeout_secs, 9);
        assert_eq!(cfg.tools.weather.base_url, DEFAULT_WEATHER_URL);
    }

    #[test]
    fn test_prompt_override_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("decision.txt");
        std::fs::write(&path, "  自定义决策 {tools}\n").unwrap();
        let prompts = PromptsSection {
            decision: Some(path),
            answer: None,
        };
        assert_eq!(prompts.load_decision("内置"), "自定义决策 {tools}");
    }
}
