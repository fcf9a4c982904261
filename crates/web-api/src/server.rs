use std::{future::Future, net::SocketAddr, sync::Arc};

use application::{RelayService, RelayServiceDependencies};
use axum::Router;
use config::AppConfig;
use domain::ConnectionRegistry;
use infrastructure::InMemoryConnectionRegistry;
use tokio::net::TcpListener;

use crate::{routes::router, state::AppState};

/// 按配置装配注册表、中继服务与应用状态
pub fn build_state(config: &AppConfig) -> AppState {
    let registry: Arc<dyn ConnectionRegistry> = Arc::new(InMemoryConnectionRegistry::new());
    let relay = RelayService::new(RelayServiceDependencies {
        registry,
        mode: config.relay.mode,
    });
    AppState::new(Arc::new(relay), &config.relay)
}

/// 已绑定端口、尚未开始服务的中继服务器
pub struct RelayApp {
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl RelayApp {
    pub async fn bind(config: &AppConfig) -> anyhow::Result<Self> {
        let state = build_state(config);
        let listener = TcpListener::bind(config.bind_address()).await?;

        Ok(Self {
            listener,
            router: router(state.clone()),
            state,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// 开始服务，`shutdown` 完成后停止接受新连接
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        tracing::info!(
            %addr,
            mode = ?self.state.relay.mode(),
            "WebSocket server started on port {}",
            addr.port()
        );

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("WebSocket server stopped");
        Ok(())
    }
}
