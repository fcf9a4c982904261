//! 外部消息注入
//!
//! 非 socket 生产者通过 HTTP 提交 `{message, userId?}`，
//! 解码成功后以“无发送者”的身份交给分发器广播给所有 OPEN 连接。

use std::sync::Arc;

use domain::{Identity, Payload};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dispatcher::BroadcastDispatcher;
use crate::error::ApplicationError;

#[derive(Debug, Deserialize)]
struct IngestRequest {
    #[serde(default)]
    message: Option<Value>,
    #[serde(rename = "userId", default)]
    user_id: Option<Value>,
}

/// 解码后的注入消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedMessage {
    pub identity: Option<Identity>,
    pub payload: Payload,
}

impl IngestedMessage {
    /// 解码 JSON 请求体。
    ///
    /// `message` 必须存在且不为 null；非字符串的值按 JSON 文本转换。
    pub fn decode(body: &[u8]) -> Result<Self, ApplicationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|err| ApplicationError::malformed_ingestion(err.to_string()))?;
        if !value.is_object() {
            return Err(ApplicationError::malformed_ingestion("expected a JSON object"));
        }
        let request: IngestRequest = serde_json::from_value(value)
            .map_err(|err| ApplicationError::malformed_ingestion(err.to_string()))?;

        let payload = match request.message {
            Some(Value::String(text)) => Payload::Text(text),
            Some(Value::Null) | None => {
                return Err(ApplicationError::malformed_ingestion("missing field `message`"))
            }
            Some(other) => Payload::Text(other.to_string()),
        };

        let identity = match request.user_id {
            Some(Value::String(raw)) => Identity::from_param(Some(&raw)),
            Some(Value::Null) | None => None,
            Some(other) => Some(Identity::from(other.to_string())),
        };

        Ok(Self { identity, payload })
    }
}

/// 外部注入桥
///
/// 确认只表示“已接受广播”，与实际收到消息的连接数无关。
#[derive(Clone)]
pub struct IngestionBridge {
    dispatcher: Arc<BroadcastDispatcher>,
}

impl IngestionBridge {
    pub fn new(dispatcher: Arc<BroadcastDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// 解码请求体并广播
    pub async fn accept(&self, body: &[u8]) -> Result<(), ApplicationError> {
        let message = IngestedMessage::decode(body).inspect_err(|err| {
            warn!(error = %err, "Error parsing JSON");
        })?;
        self.submit(message.identity, message.payload).await
    }

    /// 广播一条已解码的注入消息
    pub async fn submit(
        &self,
        identity: Option<Identity>,
        payload: Payload,
    ) -> Result<(), ApplicationError> {
        info!(
            identity = ?identity.as_ref().map(Identity::as_str),
            bytes = payload.len(),
            "Received API message"
        );

        let report = self.dispatcher.publish(None, &payload, identity.as_ref()).await?;
        debug!(delivered = report.delivered, dropped = report.dropped, "API message relayed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use domain::{
        ConnectionHandle, ConnectionId, ConnectionRegistry, LifecycleEvent, Liveness,
        OutboundFrame, RelayMode,
    };
    use infrastructure::InMemoryConnectionRegistry;
    use tokio::sync::mpsc;

    use super::*;

    async fn connect(
        registry: &Arc<dyn ConnectionRegistry>,
        identity: &str,
    ) -> mpsc::Receiver<OutboundFrame> {
        let liveness = Arc::new(Liveness::new());
        let (tx, rx) = mpsc::channel(8);
        registry
            .add(ConnectionHandle::new(
                ConnectionId::new(),
                Some(Identity::from(identity)),
                liveness.clone(),
                tx,
            ))
            .await
            .unwrap();
        liveness.apply(LifecycleEvent::HandshakeAccepted);
        rx
    }

    fn bridge(mode: RelayMode) -> (Arc<dyn ConnectionRegistry>, IngestionBridge) {
        let registry: Arc<dyn ConnectionRegistry> = Arc::new(InMemoryConnectionRegistry::new());
        let dispatcher = Arc::new(BroadcastDispatcher::new(registry.clone(), mode));
        (registry, IngestionBridge::new(dispatcher))
    }

    #[test]
    fn test_decode_message_and_identity() {
        let decoded = IngestedMessage::decode(br#"{"message":"hello","userId":"u9"}"#).unwrap();
        assert_eq!(decoded.payload, Payload::from("hello"));
        assert_eq!(decoded.identity, Some(Identity::from("u9")));

        let decoded = IngestedMessage::decode(br#"{"message":42}"#).unwrap();
        assert_eq!(decoded.payload, Payload::from("42"));
        assert_eq!(decoded.identity, None);

        let decoded = IngestedMessage::decode(br#"{"message":"x","userId":""}"#).unwrap();
        assert_eq!(decoded.identity, None);
    }

    #[test]
    fn test_decode_rejects_malformed_bodies() {
        for body in [
            &b"not json"[..],
            &b""[..],
            &b"{}"[..],
            &br#"{"message":null}"#[..],
            &b"[1,2]"[..],
        ] {
            assert!(
                matches!(
                    IngestedMessage::decode(body),
                    Err(ApplicationError::MalformedIngestion(_))
                ),
                "body {:?} should be rejected",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[tokio::test]
    async fn test_alert_reaches_all_identities() {
        let (registry, bridge) = bridge(RelayMode::Identified);
        let mut u1 = connect(&registry, "u1").await;
        let mut u2 = connect(&registry, "u2").await;

        bridge.accept(br#"{"message":"alert"}"#).await.unwrap();

        let expected = OutboundFrame::text(r#"{"message":"alert"}"#);
        assert_eq!(u1.try_recv().unwrap(), expected);
        assert_eq!(u2.try_recv().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_accept_succeeds_with_zero_recipients() {
        let (_registry, bridge) = bridge(RelayMode::Anonymous);
        assert!(bridge.accept(br#"{"message":"alert"}"#).await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_body_reaches_nobody() {
        let (registry, bridge) = bridge(RelayMode::Anonymous);
        let mut rx = connect(&registry, "u1").await;

        let result = bridge.accept(b"{broken").await;

        assert!(matches!(result, Err(ApplicationError::MalformedIngestion(_))));
        assert!(rx.try_recv().is_err());
    }
}
