//! 主应用程序入口
//!
//! 加载配置并启动 WebSocket 中继服务，Ctrl-C 时优雅退出。

use config::AppConfig;
use tracing_subscriber::EnvFilter;
use web_api::RelayApp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志，未设置 RUST_LOG 时默认 info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load()?;
    tracing::debug!(?config, "配置已加载");

    let app = RelayApp::bind(&config).await?;
    app.run_until(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("收到关闭信号，停止服务");
}
