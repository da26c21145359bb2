//! Turn Agent 控制台入口
//!
//! 初始化日志、按配置创建 Agent，逐行读取标准输入并打印回答；输入退出词结束。

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use turn_agent::config::{load_config, AppConfig};
use turn_agent::react::TurnEvent;
use turn_agent::{create_agent, observability};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let agent = create_agent(&cfg).await.context("Failed to create agent")?;
    let session_id = cfg.app.session_id.clone();

    let history = agent.history(&session_id).await.context("Failed to load session")?;
    println!("会话 {}（已有 {} 轮对话），输入 {} 退出", session_id, history.len() / 2, cfg.app.exit_phrases.join(" / "));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all("你：".as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if cfg
            .app
            .exit_phrases
            .iter()
            .any(|p| p.eq_ignore_ascii_case(input))
        {
            break;
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let events = cfg.app.show_events.then_some(&tx);
        let result = agent
            .process_message_with_events(&session_id, input, events)
            .await;
        drop(tx);
        while let Ok(event) = rx.try_recv() {
            print_event(&event);
        }

        match result {
            Ok(outcome) => {
                println!("Agent：{}", outcome.final_answer());
                if cfg.app.debug_checkpoint {
                    if let Some(export) = agent.export(&session_id).await? {
                        println!("{}", export.to_json()?);
                    }
                }
            }
            Err(e) => {
                println!("❌ 处理失败：{}，请重试", e);
            }
        }
    }

    tracing::info!(metrics = ?agent.metrics(), "session closed");
    Ok(())
}

fn print_event(event: &TurnEvent) {
    match serde_json::to_string(event) {
        Ok(json) => println!("  [event] {}", json),
        Err(e) => tracing::debug!("event serialization failed: {}", e),
    }
}
