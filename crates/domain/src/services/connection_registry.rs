//! 连接注册表接口
//!
//! 定义存活连接的登记、移除、按身份查找与遍历接口。

use async_trait::async_trait;

use crate::entities::connection::ConnectionHandle;
use crate::errors::DomainResult;
use crate::value_objects::{ConnectionId, Identity};

/// 连接注册表接口
///
/// 所有修改（add/remove）与完整遍历（for_each_open）彼此互斥；
/// 实现不做身份校验，也不做任何 I/O。
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// 登记连接；同一连接只能登记一次
    async fn add(&self, handle: ConnectionHandle) -> DomainResult<()>;

    /// 按连接移除，幂等：不存在时返回 `None`
    async fn remove(&self, connection_id: ConnectionId) -> Option<ConnectionHandle>;

    /// 按身份移除当前持有该身份的连接，幂等
    async fn remove_identity(&self, identity: &Identity) -> Option<ConnectionHandle>;

    /// 查找当前持有该身份的连接
    async fn lookup(&self, identity: &Identity) -> Option<ConnectionId>;

    /// 遍历处于 OPEN 状态的连接，返回被访问的连接数
    ///
    /// 遍历期间转为非 OPEN 的连接会被跳过。
    async fn for_each_open(&self, visit: &mut (dyn for<'h> FnMut(&'h ConnectionHandle) + Send)) -> usize;

    /// 已登记的连接数
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
