//! 消息负载与出站帧
//!
//! 中继核心不解析负载内容，只在身份模式下把负载与发送者身份包装成信封。

use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::Identity;

/// 中继模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// 身份模式：连接必须携带身份，出站消息为 `{userId, message}` 信封
    #[default]
    Identified,
    /// 匿名模式：忽略身份，出站消息为原始负载
    Anonymous,
}

impl RelayMode {
    pub fn requires_identity(self) -> bool {
        matches!(self, RelayMode::Identified)
    }
}

/// 入站消息负载（不透明）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// 以文本形式读取负载，二进制负载按 UTF-8 有损转换。
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Payload::Text(text) => Cow::Borrowed(text.as_str()),
            Payload::Binary(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_owned())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

/// 身份模式下的出站信封
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    /// 发送者身份，外部注入且未携带身份时省略
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    pub message: String,
}

/// 出站帧
///
/// 一次广播只编码一次，各接收方共享同一份数据。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(Arc<str>),
    Binary(Arc<[u8]>),
}

impl OutboundFrame {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        OutboundFrame::Text(text.into())
    }

    /// 按中继模式把负载编码为出站帧。
    pub fn encode(
        mode: RelayMode,
        identity: Option<&Identity>,
        payload: &Payload,
    ) -> DomainResult<Self> {
        match mode {
            RelayMode::Anonymous => Ok(match payload {
                Payload::Text(text) => OutboundFrame::Text(Arc::from(text.as_str())),
                Payload::Binary(bytes) => OutboundFrame::Binary(Arc::from(bytes.as_slice())),
            }),
            RelayMode::Identified => {
                let envelope = RelayEnvelope {
                    identity: identity.cloned(),
                    message: payload.as_text().into_owned(),
                };
                let json = serde_json::to_string(&envelope)
                    .map_err(|err| DomainError::encoding_error(err.to_string()))?;
                Ok(OutboundFrame::Text(Arc::from(json)))
            }
        }
    }
}
