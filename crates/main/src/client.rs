//! 演示客户端
//!
//! 以 `RELAY_USER_ID` 身份连接到 `RELAY_URL`，发送一条问候后打印收到的所有消息。

use std::env;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "ws://localhost:8080";
const DEFAULT_USER_ID: &str = "user123";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let base = env::var("RELAY_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let user_id = env::var("RELAY_USER_ID").unwrap_or_else(|_| DEFAULT_USER_ID.to_string());
    let url = format!("{}/?userId={}", base.trim_end_matches('/'), user_id);

    let (mut ws, _) = connect_async(url.as_str()).await?;
    tracing::info!(%url, "Connected to server");

    ws.send(Message::text("Hello from client".to_string())).await?;

    while let Some(message) = ws.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(error = %err, "WebSocket error");
                break;
            }
        };
        match message {
            Message::Text(text) => println!("Received: {}", text.as_str()),
            Message::Binary(data) => println!("Received {} bytes", data.len()),
            Message::Close(frame) => {
                tracing::info!(?frame, "Disconnected from server");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
