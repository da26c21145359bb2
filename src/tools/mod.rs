//! 工具箱：注册表、执行器与内置工具（天气查询、计算器）

pub mod calculator;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod weather;

pub use calculator::CalculatorTool;
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolError, ToolRegistry};
pub use schema::decision_schema_json;
pub use weather::{HttpWeatherSource, WeatherReport, WeatherSource, WeatherTool, DEFAULT_WEATHER_URL};

/// 内置工具注册表：weather_query + calculator
pub fn builtin_registry(weather_url: &str, weather_timeout_secs: u64) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(WeatherTool::http(weather_url, weather_timeout_secs));
    tools.register(CalculatorTool);
    tools
}
