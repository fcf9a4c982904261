//! 应用层实现。
//!
//! 这里提供围绕中继核心的用例：连接生命周期、广播分发，
//! 以及外部注入消息的解码与转发。

pub mod dispatcher;
pub mod error;
pub mod ingestion;
pub mod lifecycle;
pub mod services;

pub use dispatcher::{BroadcastDispatcher, DeliveryReport};
pub use error::ApplicationError;
pub use ingestion::{IngestedMessage, IngestionBridge};
pub use lifecycle::ConnectionLifecycle;
pub use services::{RelayService, RelayServiceDependencies};
