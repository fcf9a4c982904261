//! 领域模型错误定义
//!
//! 定义了中继核心中可能出现的错误类型，提供清晰的错误上下文。

use thiserror::Error;

use crate::value_objects::ConnectionId;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 同一连接被重复注册
    #[error("连接已注册: {connection_id}")]
    ConnectionAlreadyRegistered { connection_id: ConnectionId },

    /// 消息编码失败
    #[error("消息编码失败: {message}")]
    EncodingError { message: String },
}

impl DomainError {
    /// 创建重复注册错误
    pub fn connection_already_registered(connection_id: ConnectionId) -> Self {
        Self::ConnectionAlreadyRegistered { connection_id }
    }

    /// 创建编码错误
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }
}

/// 单个接收方投递失败的原因
///
/// 投递失败只影响该接收方，不会中断整次扇出。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// 连接不处于 OPEN 状态
    #[error("connection is not open")]
    NotOpen,
    /// 出站队列已满（慢消费者）
    #[error("outbound queue is full")]
    QueueFull,
    /// 出站队列已关闭（写任务已退出）
    #[error("outbound queue is closed")]
    Closed,
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
