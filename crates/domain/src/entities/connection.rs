//! 连接实体
//!
//! 定义连接存活状态机、共享存活标记，以及注册表持有的投递句柄。

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::entities::message::OutboundFrame;
use crate::errors::DeliveryError;
use crate::value_objects::{ConnectionId, Identity};

/// 连接存活状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConnectionState {
    /// 握手进行中，尚未注册
    Connecting = 0,
    /// 已注册，可收发消息
    Open = 1,
    /// 正在关闭，不再接收广播
    Closing = 2,
    /// 已关闭并已从注册表移除
    Closed = 3,
}

/// 驱动连接状态迁移的生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// 握手成功
    HandshakeAccepted,
    /// 握手被拒绝（身份模式下缺少身份）
    HandshakeRejected,
    /// 开始关闭（客户端关闭、传输错误或协议错误）
    CloseStarted,
    /// 关闭完成
    Closed,
}

impl ConnectionState {
    /// 状态迁移表，未列出的组合均为非法迁移。
    pub fn on(self, event: LifecycleEvent) -> Option<ConnectionState> {
        use ConnectionState::*;

        match (self, event) {
            (Connecting, LifecycleEvent::HandshakeAccepted) => Some(Open),
            (Connecting, LifecycleEvent::HandshakeRejected) => Some(Closed),
            (Open, LifecycleEvent::CloseStarted) => Some(Closing),
            (Closing, LifecycleEvent::Closed) => Some(Closed),
            _ => None,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

/// 连接存活标记
///
/// 由连接自身的生命周期与注册表中的投递句柄共享，所有迁移都按状态迁移表原子执行。
#[derive(Debug)]
pub struct Liveness(AtomicU8);

impl Liveness {
    pub fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Connecting as u8))
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// 应用一个生命周期事件。
    ///
    /// 迁移合法时返回新状态；非法迁移不修改状态并返回 `None`。
    /// 并发调用时只有一个调用方能完成同一次迁移。
    pub fn apply(&self, event: LifecycleEvent) -> Option<ConnectionState> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let next = ConnectionState::from_u8(current).on(event)?;
            match self.0.compare_exchange(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(next),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// 注册表持有的连接投递句柄
///
/// 不拥有底层 socket：只持有出站队列的发送端与共享存活标记，
/// 连接的真实生命周期由传输层任务负责。
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub identity: Option<Identity>,
    pub connected_at: DateTime<Utc>,
    liveness: Arc<Liveness>,
    outbound: mpsc::Sender<OutboundFrame>,
}

impl ConnectionHandle {
    pub fn new(
        id: ConnectionId,
        identity: Option<Identity>,
        liveness: Arc<Liveness>,
        outbound: mpsc::Sender<OutboundFrame>,
    ) -> Self {
        Self {
            id,
            identity,
            connected_at: Utc::now(),
            liveness,
            outbound,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.liveness.state()
    }

    pub fn is_open(&self) -> bool {
        self.liveness.is_open()
    }

    /// 非阻塞地把一帧放入出站队列。
    ///
    /// 不等待、不重试：队列满或已关闭时直接丢弃该帧。
    pub fn deliver(&self, frame: OutboundFrame) -> Result<(), DeliveryError> {
        if !self.is_open() {
            return Err(DeliveryError::NotOpen);
        }

        self.outbound.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}
