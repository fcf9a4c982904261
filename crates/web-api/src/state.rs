use std::{sync::Arc, time::Duration};

use application::RelayService;
use config::RelayConfig;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayService>,
    /// 每个连接出站队列的容量
    pub outbound_capacity: usize,
    /// 单次写 socket 的超时
    pub send_timeout: Duration,
}

impl AppState {
    pub fn new(relay: Arc<RelayService>, settings: &RelayConfig) -> Self {
        Self {
            relay,
            outbound_capacity: settings.outbound_capacity,
            send_timeout: settings.send_timeout(),
        }
    }
}
