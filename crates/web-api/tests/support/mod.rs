use std::{net::SocketAddr, time::Duration};

use config::AppConfig;
use domain::{ConnectionRegistry, RelayMode};
use futures_util::StreamExt;
use tokio::{net::TcpStream, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{build_state, router, AppState};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);
pub const QUIET_PERIOD: Duration = Duration::from_millis(300);

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn(mode: RelayMode) -> Self {
        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.relay.mode = mode;

        let state = build_state(&config);
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self, user_id: Option<&str>) -> WsClient {
        let url = match user_id {
            Some(id) => format!("ws://{}/?userId={}", self.addr, id),
            None => format!("ws://{}/", self.addr),
        };
        let (ws, _) = connect_async(url).await.expect("ws connect");
        ws
    }

    /// 等待注册表中的连接数达到预期
    pub async fn wait_for_connections(&self, expected: usize) {
        let registry = self.state.relay.registry().clone();
        timeout(RECV_TIMEOUT, async move {
            while registry.len().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("registry did not reach expected size");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn next_text(ws: &mut WsClient) -> String {
    loop {
        let message = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream closed")
            .expect("ws error");
        match message {
            TungsteniteMessage::Text(text) => return text.as_str().to_owned(),
            TungsteniteMessage::Ping(_) | TungsteniteMessage::Pong(_) => continue,
            other => panic!("unexpected message: {other:?}"),
        }
    }
}

pub async fn assert_silent(ws: &mut WsClient) {
    if let Ok(Some(message)) = timeout(QUIET_PERIOD, ws.next()).await {
        panic!("expected no message, got {message:?}");
    }
}
