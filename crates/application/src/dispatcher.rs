//! 广播分发器
//!
//! 把一条消息扇出给注册表中所有处于 OPEN 状态的连接（发送者自身除外）。

use std::sync::Arc;

use domain::{
    ConnectionHandle, ConnectionId, ConnectionRegistry, DeliveryError, Identity, OutboundFrame,
    Payload, RelayMode,
};
use tracing::{debug, warn};

use crate::error::ApplicationError;

/// 一次广播的投递结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// 成功放入出站队列的接收方数量
    pub delivered: usize,
    /// 被丢弃的接收方数量（队列满或已关闭）
    pub dropped: usize,
}

pub struct BroadcastDispatcher {
    registry: Arc<dyn ConnectionRegistry>,
    mode: RelayMode,
}

impl BroadcastDispatcher {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, mode: RelayMode) -> Self {
        Self { registry, mode }
    }

    pub fn mode(&self) -> RelayMode {
        self.mode
    }

    /// 广播一条消息。
    ///
    /// `sender` 为 `None` 表示外部注入，此时所有 OPEN 连接都会收到。
    /// 单个接收方失败不会中断扇出；队列已关闭的连接在遍历结束后从注册表移除。
    pub async fn publish(
        &self,
        sender: Option<ConnectionId>,
        payload: &Payload,
        identity: Option<&Identity>,
    ) -> Result<DeliveryReport, ApplicationError> {
        let frame = OutboundFrame::encode(self.mode, identity, payload)?;

        let mut report = DeliveryReport::default();
        let mut stale = Vec::new();

        self.registry
            .for_each_open(&mut |conn: &ConnectionHandle| {
                if Some(conn.id) == sender {
                    return;
                }

                match conn.deliver(frame.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(DeliveryError::QueueFull) => {
                        report.dropped += 1;
                        warn!(connection_id = %conn.id, "outbound queue full, message dropped");
                    }
                    Err(DeliveryError::Closed) => {
                        report.dropped += 1;
                        stale.push(conn.id);
                    }
                    // 遍历期间刚开始关闭
                    Err(DeliveryError::NotOpen) => report.dropped += 1,
                }
            })
            .await;

        for connection_id in stale {
            debug!(connection_id = %connection_id, "pruning connection with closed outbound queue");
            self.registry.remove(connection_id).await;
        }

        debug!(
            sender = ?sender,
            delivered = report.delivered,
            dropped = report.dropped,
            "broadcast finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use domain::{LifecycleEvent, Liveness};
    use infrastructure::InMemoryConnectionRegistry;
    use tokio::sync::mpsc;

    use super::*;

    struct TestConnection {
        id: ConnectionId,
        liveness: Arc<Liveness>,
        rx: mpsc::Receiver<OutboundFrame>,
    }

    async fn connect(
        registry: &Arc<dyn ConnectionRegistry>,
        identity: Option<&str>,
        capacity: usize,
    ) -> TestConnection {
        let id = ConnectionId::new();
        let liveness = Arc::new(Liveness::new());
        let (tx, rx) = mpsc::channel(capacity);
        registry
            .add(ConnectionHandle::new(
                id,
                identity.map(Identity::from),
                liveness.clone(),
                tx,
            ))
            .await
            .unwrap();
        liveness.apply(LifecycleEvent::HandshakeAccepted);
        TestConnection { id, liveness, rx }
    }

    fn registry() -> Arc<dyn ConnectionRegistry> {
        Arc::new(InMemoryConnectionRegistry::new())
    }

    #[tokio::test]
    async fn test_publish_excludes_sender() {
        let registry = registry();
        let dispatcher = BroadcastDispatcher::new(registry.clone(), RelayMode::Anonymous);
        let mut a = connect(&registry, None, 8).await;
        let mut b = connect(&registry, None, 8).await;
        let mut c = connect(&registry, None, 8).await;

        let report = dispatcher
            .publish(Some(a.id), &Payload::from("hi"), None)
            .await
            .unwrap();

        assert_eq!(report, DeliveryReport { delivered: 2, dropped: 0 });
        assert_eq!(b.rx.try_recv().unwrap(), OutboundFrame::text("hi"));
        assert_eq!(c.rx.try_recv().unwrap(), OutboundFrame::text("hi"));
        assert!(a.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_sender_reaches_every_open_connection() {
        let registry = registry();
        let dispatcher = BroadcastDispatcher::new(registry.clone(), RelayMode::Identified);
        let mut connections = Vec::new();
        for name in ["u1", "u2", "u3", "u4"] {
            connections.push(connect(&registry, Some(name), 8).await);
        }

        let report = dispatcher
            .publish(None, &Payload::from("alert"), None)
            .await
            .unwrap();

        assert_eq!(report.delivered, connections.len());
        for conn in &mut connections {
            assert_eq!(
                conn.rx.try_recv().unwrap(),
                OutboundFrame::text(r#"{"message":"alert"}"#)
            );
        }
    }

    #[tokio::test]
    async fn test_identified_mode_wraps_sender_identity() {
        let registry = registry();
        let dispatcher = BroadcastDispatcher::new(registry.clone(), RelayMode::Identified);
        let sender = connect(&registry, Some("u1"), 8).await;
        let mut other = connect(&registry, Some("u2"), 8).await;

        dispatcher
            .publish(Some(sender.id), &Payload::from("ping"), Some(&Identity::from("u1")))
            .await
            .unwrap();

        let OutboundFrame::Text(json) = other.rx.try_recv().unwrap() else {
            panic!("expected text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, serde_json::json!({"userId": "u1", "message": "ping"}));
    }

    #[tokio::test]
    async fn test_removed_connection_never_receives() {
        let registry = registry();
        let dispatcher = BroadcastDispatcher::new(registry.clone(), RelayMode::Anonymous);
        let mut removed = connect(&registry, None, 8).await;
        let mut kept = connect(&registry, None, 8).await;

        registry.remove(removed.id).await;
        // 句柄仍在别处被引用，且存活标记仍为 OPEN
        assert!(removed.liveness.is_open());

        let report = dispatcher
            .publish(None, &Payload::from("after"), None)
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert!(kept.rx.try_recv().is_ok());
        assert!(removed.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_does_not_abort_fanout() {
        let registry = registry();
        let dispatcher = BroadcastDispatcher::new(registry.clone(), RelayMode::Anonymous);
        let mut slow = connect(&registry, None, 1).await;
        let mut fast = connect(&registry, None, 8).await;

        dispatcher.publish(None, &Payload::from("one"), None).await.unwrap();
        let report = dispatcher
            .publish(None, &Payload::from("two"), None)
            .await
            .unwrap();

        assert_eq!(report, DeliveryReport { delivered: 1, dropped: 1 });
        assert_eq!(slow.rx.try_recv().unwrap(), OutboundFrame::text("one"));
        assert!(slow.rx.try_recv().is_err());
        assert_eq!(fast.rx.try_recv().unwrap(), OutboundFrame::text("one"));
        assert_eq!(fast.rx.try_recv().unwrap(), OutboundFrame::text("two"));
        // 慢消费者仍然保留在注册表中
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_closed_queue_is_pruned_from_registry() {
        let registry = registry();
        let dispatcher = BroadcastDispatcher::new(registry.clone(), RelayMode::Anonymous);
        let dead = connect(&registry, None, 8).await;
        let mut alive = connect(&registry, None, 8).await;
        let dead_id = dead.id;
        drop(dead);

        let report = dispatcher
            .publish(None, &Payload::from("hello"), None)
            .await
            .unwrap();

        assert_eq!(report, DeliveryReport { delivered: 1, dropped: 1 });
        assert!(alive.rx.try_recv().is_ok());
        assert_eq!(registry.len().await, 1);
        assert!(registry.remove(dead_id).await.is_none());
    }

    #[tokio::test]
    async fn test_publish_with_no_connections_succeeds() {
        let dispatcher = BroadcastDispatcher::new(registry(), RelayMode::Identified);
        let report = dispatcher
            .publish(None, &Payload::from("nobody"), None)
            .await
            .unwrap();
        assert_eq!(report, DeliveryReport::default());
    }
}
