//! 领域实体定义
//!
//! 包含中继的核心实体：连接状态、投递句柄、消息负载与出站帧。

pub mod connection;
pub mod message;

// 重新导出核心实体
pub use connection::{ConnectionHandle, ConnectionState, LifecycleEvent, Liveness};
pub use message::{OutboundFrame, Payload, RelayEnvelope, RelayMode};
