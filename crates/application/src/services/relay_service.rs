use std::sync::Arc;

use domain::{ConnectionRegistry, Identity, RelayMode};

use crate::{
    dispatcher::BroadcastDispatcher, ingestion::IngestionBridge, lifecycle::ConnectionLifecycle,
};

pub struct RelayServiceDependencies {
    pub registry: Arc<dyn ConnectionRegistry>,
    pub mode: RelayMode,
}

/// 中继服务
///
/// 把注册表、分发器与注入桥装配在一起，供传输层为每个连接创建生命周期。
#[derive(Clone)]
pub struct RelayService {
    registry: Arc<dyn ConnectionRegistry>,
    dispatcher: Arc<BroadcastDispatcher>,
    bridge: IngestionBridge,
}

impl RelayService {
    pub fn new(deps: RelayServiceDependencies) -> Self {
        let dispatcher = Arc::new(BroadcastDispatcher::new(deps.registry.clone(), deps.mode));
        let bridge = IngestionBridge::new(dispatcher.clone());

        Self {
            registry: deps.registry,
            dispatcher,
            bridge,
        }
    }

    pub fn mode(&self) -> RelayMode {
        self.dispatcher.mode()
    }

    pub fn registry(&self) -> &Arc<dyn ConnectionRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<BroadcastDispatcher> {
        &self.dispatcher
    }

    pub fn bridge(&self) -> &IngestionBridge {
        &self.bridge
    }

    /// 为新升级的连接创建处于 CONNECTING 状态的生命周期
    pub fn connection(&self, identity: Option<Identity>) -> ConnectionLifecycle {
        ConnectionLifecycle::new(self.registry.clone(), self.dispatcher.clone(), identity)
    }
}
