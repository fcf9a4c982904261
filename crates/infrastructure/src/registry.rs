//! 内存连接注册表
//!
//! 以连接标识为稳定句柄保存投递句柄，身份模式下额外维护身份索引。

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{ConnectionHandle, ConnectionId, ConnectionRegistry, DomainError, DomainResult, Identity};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
struct RegistryState {
    /// 连接存储
    connections: HashMap<ConnectionId, ConnectionHandle>,
    /// 身份到连接的映射
    identities: HashMap<Identity, ConnectionId>,
}

impl RegistryState {
    fn detach(&mut self, connection_id: ConnectionId) -> Option<ConnectionHandle> {
        let handle = self.connections.remove(&connection_id)?;

        // 只有索引仍指向本连接时才移除，避免误删同身份的新连接
        if let Some(identity) = &handle.identity {
            if self.identities.get(identity) == Some(&connection_id) {
                self.identities.remove(identity);
            }
        }

        Some(handle)
    }
}

/// 内存中的连接注册表
///
/// 连接表与身份索引放在同一把锁下，修改走写锁，遍历走读锁。
pub struct InMemoryConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryConnectionRegistry {
    /// 创建新的内存连接注册表
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }
}

impl Default for InMemoryConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn add(&self, handle: ConnectionHandle) -> DomainResult<()> {
        let connection_id = handle.id;
        let mut state = self.state.write().await;

        if state.connections.contains_key(&connection_id) {
            return Err(DomainError::connection_already_registered(connection_id));
        }

        if let Some(identity) = handle.identity.clone() {
            if let Some(previous) = state.identities.insert(identity.clone(), connection_id) {
                debug!(
                    identity = %identity,
                    previous = %previous,
                    connection_id = %connection_id,
                    "identity index now points to newer connection"
                );
            }
        }
        state.connections.insert(connection_id, handle);

        info!(
            connection_id = %connection_id,
            active = state.connections.len(),
            "connection registered"
        );
        Ok(())
    }

    async fn remove(&self, connection_id: ConnectionId) -> Option<ConnectionHandle> {
        let mut state = self.state.write().await;
        let removed = state.detach(connection_id);

        if let Some(handle) = &removed {
            info!(
                connection_id = %connection_id,
                connected_at = %handle.connected_at,
                active = state.connections.len(),
                "connection unregistered"
            );
        }
        removed
    }

    async fn remove_identity(&self, identity: &Identity) -> Option<ConnectionHandle> {
        let mut state = self.state.write().await;
        let connection_id = *state.identities.get(identity)?;
        state.detach(connection_id)
    }

    async fn lookup(&self, identity: &Identity) -> Option<ConnectionId> {
        let state = self.state.read().await;
        state.identities.get(identity).copied()
    }

    async fn for_each_open(&self, visit: &mut (dyn for<'h> FnMut(&'h ConnectionHandle) + Send)) -> usize {
        let state = self.state.read().await;
        let mut visited = 0;

        for handle in state.connections.values() {
            // 每个连接在访问前重新检查存活状态
            if handle.is_open() {
                visit(handle);
                visited += 1;
            }
        }

        visited
    }

    async fn len(&self) -> usize {
        self.state.read().await.connections.len()
    }
}
