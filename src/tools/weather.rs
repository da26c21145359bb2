//! 天气查询工具
//!
//! WeatherSource 是外部天气数据边界（HTTP），WeatherTool 把当日预报格式化为一行文本。
//! 网络错误、非 2xx、JSON 结构不符、接口返回失败，都作为工具执行失败返回。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolArgs;
use crate::tools::Tool;

pub const DEFAULT_WEATHER_URL: &str = "http://wthrcdn.etouch.cn/weather_mini";

/// 当日天气预报
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherReport {
    pub condition: String,
    pub low: String,
    pub high: String,
    pub wind_direction: String,
    pub wind_force: String,
}

/// 天气数据源
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, city: &str) -> Result<WeatherReport, String>;
}

/// 基于 HTTP 的天气数据源：GET {base_url}?city=城市
pub struct HttpWeatherSource {
    client: Client,
    base_url: String,
}

impl HttpWeatherSource {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl WeatherSource for HttpWeatherSource {
    async fn fetch(&self, city: &str) -> Result<WeatherReport, String> {
        tracing::debug!(city = %city, "weather fetch");
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("city", city)])
            .send()
            .await
            .map_err(|e| format!("请求失败：{e}"))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("读取响应失败：{e}"))?;
        parse_weather_response(&body)
    }
}

#[derive(Deserialize)]
struct WeatherResponse {
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    desc: String,
    data: Option<WeatherData>,
}

#[derive(Deserialize)]
struct WeatherData {
    #[serde(default)]
    forecast: Vec<Forecast>,
}

#[derive(Deserialize)]
struct Forecast {
    #[serde(rename = "type")]
    condition: String,
    low: String,
    high: String,
    fengxiang: String,
    fengli: String,
}

/// 解析天气接口响应，取当日（第一条）预报
pub fn parse_weather_response(body: &str) -> Result<WeatherReport, String> {
    let resp: WeatherResponse =
        serde_json::from_str(body).map_err(|e| format!("响应解析失败：{e}"))?;
    let ok = resp.status == Some(1000)
        || resp.desc.eq_ignore_ascii_case("ok")
        || resp.desc == "success";
    if !ok {
        return Err(format!("查询失败：{}", resp.desc));
    }
    let today = resp
        .data
        .and_then(|d| d.forecast.into_iter().next())
        .ok_or_else(|| "查询失败：缺少预报数据".to_string())?;
    Ok(WeatherReport {
        condition: today.condition,
        low: today.low,
        high: today.high,
        wind_direction: today.fengxiang,
        wind_force: strip_cdata(&today.fengli),
    })
}

/// 风力字段可能是 <![CDATA[<3级]]>
fn strip_cdata(s: &str) -> String {
    s.trim()
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
        .unwrap_or(s.trim())
        .to_string()
}

/// 天气查询工具
pub struct WeatherTool {
    source: Arc<dyn WeatherSource>,
}

impl WeatherTool {
    pub fn new(source: Arc<dyn WeatherSource>) -> Self {
        Self { source }
    }

    pub fn http(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self::new(Arc::new(HttpWeatherSource::new(base_url, timeout_secs)))
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather_query"
    }

    fn description(&self) -> &str {
        "查询指定城市的今日天气（天气状况、气温、风向、风力）"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": { "type": "string", "description": "城市名称，如 北京、上海" }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, String> {
        let city = args.get("city").map(|s| s.trim()).unwrap_or("");
        if city.is_empty() {
            return Err("天气查询异常：缺少 city 参数".to_string());
        }
        let report = self
            .source
            .fetch(city)
            .await
            .map_err(|e| format!("天气查询异常：{e}"))?;
        Ok(format!(
            "{}今日天气：{}，气温{}~{}，风向{}，风力{}",
            city, report.condition, report.low, report.high, report.wind_direction, report.wind_force
        ))
    }
}
