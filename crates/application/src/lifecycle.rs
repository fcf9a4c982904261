//! 连接生命周期
//!
//! 每个连接一个状态机：CONNECTING -> OPEN -> CLOSING -> CLOSED，
//! 握手被拒绝时直接 CONNECTING -> CLOSED。
//! 进入 OPEN 时登记到注册表，OPEN 期间的入站消息交给分发器，关闭时恰好移除一次。

use std::sync::Arc;

use domain::{
    ConnectionHandle, ConnectionId, ConnectionRegistry, ConnectionState, Identity,
    LifecycleEvent, Liveness, OutboundFrame, Payload,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatcher::{BroadcastDispatcher, DeliveryReport};
use crate::error::ApplicationError;

pub struct ConnectionLifecycle {
    id: ConnectionId,
    identity: Option<Identity>,
    liveness: Arc<Liveness>,
    registry: Arc<dyn ConnectionRegistry>,
    dispatcher: Arc<BroadcastDispatcher>,
}

impl ConnectionLifecycle {
    /// 创建处于 CONNECTING 状态的生命周期。匿名模式下忽略身份。
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        dispatcher: Arc<BroadcastDispatcher>,
        identity: Option<Identity>,
    ) -> Self {
        let identity = identity.filter(|_| dispatcher.mode().requires_identity());

        Self {
            id: ConnectionId::new(),
            identity,
            liveness: Arc::new(Liveness::new()),
            registry,
            dispatcher,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn state(&self) -> ConnectionState {
        self.liveness.state()
    }

    /// 握手完成：校验身份并登记到注册表。
    ///
    /// 身份模式下缺少身份时直接进入 CLOSED，不创建任何注册项。
    pub async fn open(
        &self,
        outbound: mpsc::Sender<OutboundFrame>,
    ) -> Result<ConnectionId, ApplicationError> {
        let state = self.state();
        if state != ConnectionState::Connecting {
            return Err(ApplicationError::InvalidState(state));
        }

        if self.dispatcher.mode().requires_identity() && self.identity.is_none() {
            self.liveness.apply(LifecycleEvent::HandshakeRejected);
            warn!(connection_id = %self.id, "Client connected without userId");
            return Err(ApplicationError::IdentityRequired);
        }

        let handle = ConnectionHandle::new(
            self.id,
            self.identity.clone(),
            self.liveness.clone(),
            outbound,
        );
        if let Err(err) = self.registry.add(handle).await {
            self.liveness.apply(LifecycleEvent::HandshakeRejected);
            return Err(err.into());
        }
        self.liveness.apply(LifecycleEvent::HandshakeAccepted);

        info!(
            connection_id = %self.id,
            identity = ?self.identity.as_ref().map(Identity::as_str),
            "Client connected"
        );
        Ok(self.id)
    }

    /// 处理一条入站消息，原样转发给分发器。
    ///
    /// 连接不处于 OPEN 状态时忽略该消息并返回 `None`。
    pub async fn on_message(
        &self,
        payload: Payload,
    ) -> Result<Option<DeliveryReport>, ApplicationError> {
        if !self.liveness.is_open() {
            debug!(connection_id = %self.id, state = ?self.state(), "ignoring inbound message");
            return Ok(None);
        }

        info!(
            connection_id = %self.id,
            identity = ?self.identity.as_ref().map(Identity::as_str),
            bytes = payload.len(),
            "Received message"
        );

        let report = self
            .dispatcher
            .publish(Some(self.id), &payload, self.identity.as_ref())
            .await?;
        Ok(Some(report))
    }

    /// 关闭连接并从注册表移除。
    ///
    /// 只有第一次调用会执行移除并返回 `true`，之后的调用都是空操作。
    pub async fn close(&self) -> bool {
        if self.liveness.apply(LifecycleEvent::CloseStarted).is_none() {
            return false;
        }

        self.registry.remove(self.id).await;
        self.liveness.apply(LifecycleEvent::Closed);

        info!(
            connection_id = %self.id,
            identity = ?self.identity.as_ref().map(Identity::as_str),
            "Client disconnected"
        );
        true
    }
}
