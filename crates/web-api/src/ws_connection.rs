use std::{sync::Arc, time::Duration};

use application::{ApplicationError, ConnectionLifecycle};
use axum::{
    body::Bytes,
    extract::ws::{close_code, CloseFrame, Message as WsMessage, Utf8Bytes, WebSocket},
};
use domain::{ConnectionId, Identity, OutboundFrame, Payload};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;

use crate::state::AppState;

/// 单个 WebSocket 连接
///
/// 握手完成后登记到注册表，之后由两个任务驱动：
/// - 发送任务：把出站队列里的帧写到 socket
/// - 接收任务：把客户端消息交给生命周期广播
///
/// 任一任务结束即视为连接断开，生命周期只关闭一次。
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    lifecycle: Arc<ConnectionLifecycle>,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, state: AppState, identity: Option<Identity>) -> Self {
        let lifecycle = Arc::new(state.relay.connection(identity));
        Self {
            socket,
            state,
            lifecycle,
        }
    }

    pub async fn run(self) {
        let Self {
            mut socket,
            state,
            lifecycle,
        } = self;

        let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundFrame>(state.outbound_capacity);
        match lifecycle.open(outbound_tx).await {
            Ok(_) => {}
            Err(ApplicationError::IdentityRequired) => {
                Self::reject(socket, "userId is required").await;
                return;
            }
            Err(err) => {
                tracing::error!(connection_id = %lifecycle.id(), error = %err, "Failed to open connection");
                if let Err(err) = socket.send(WsMessage::Close(None)).await {
                    tracing::debug!(error = %err, "Failed to send close frame");
                }
                return;
            }
        }

        let (sender, incoming) = socket.split();
        let mut send_task = tokio::spawn(Self::write_outbound(
            sender,
            outbound_rx,
            state.send_timeout,
            lifecycle.id(),
        ));
        let mut recv_task = tokio::spawn(Self::read_inbound(incoming, lifecycle.clone()));

        tokio::select! {
            _ = &mut send_task => {
                tracing::debug!(connection_id = %lifecycle.id(), "WebSocket发送任务完成");
                recv_task.abort();
            }
            _ = &mut recv_task => {
                tracing::debug!(connection_id = %lifecycle.id(), "WebSocket接收任务完成");
                send_task.abort();
            }
        }

        lifecycle.close().await;
    }

    /// 以策略违规关闭码拒绝连接
    async fn reject(mut socket: WebSocket, reason: &'static str) {
        let frame = CloseFrame {
            code: close_code::POLICY,
            reason: Utf8Bytes::from_static(reason),
        };
        if let Err(err) = socket.send(WsMessage::Close(Some(frame))).await {
            tracing::debug!(error = %err, "Failed to send close frame");
        }
    }

    async fn write_outbound(
        mut sender: SplitSink<WebSocket, WsMessage>,
        mut outbound: mpsc::Receiver<OutboundFrame>,
        send_timeout: Duration,
        connection_id: ConnectionId,
    ) {
        while let Some(frame) = outbound.recv().await {
            match tokio::time::timeout(send_timeout, sender.send(into_ws_message(frame))).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(%connection_id, error = %err, "Failed to send message");
                    break;
                }
                Err(_) => {
                    tracing::warn!(%connection_id, timeout = ?send_timeout, "Send timed out");
                    break;
                }
            }
        }
    }

    async fn read_inbound(mut incoming: SplitStream<WebSocket>, lifecycle: Arc<ConnectionLifecycle>) {
        while let Some(message) = incoming.next().await {
            let payload = match message {
                Ok(WsMessage::Text(text)) => Payload::Text(text.as_str().to_owned()),
                Ok(WsMessage::Binary(data)) => Payload::Binary(data.to_vec()),
                Ok(WsMessage::Close(_)) => {
                    tracing::debug!(connection_id = %lifecycle.id(), "WebSocket收到关闭消息");
                    break;
                }
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
                Err(err) => {
                    tracing::warn!(connection_id = %lifecycle.id(), error = %err, "WebSocket error");
                    break;
                }
            };

            if let Err(err) = lifecycle.on_message(payload).await {
                tracing::error!(connection_id = %lifecycle.id(), error = %err, "Failed to relay message");
            }
        }
    }
}

fn into_ws_message(frame: OutboundFrame) -> WsMessage {
    match frame {
        OutboundFrame::Text(text) => WsMessage::Text(Utf8Bytes::from(text.to_string())),
        OutboundFrame::Binary(bytes) => WsMessage::Binary(Bytes::copy_from_slice(&bytes)),
    }
}
