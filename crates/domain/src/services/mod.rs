//! 领域服务定义
//!
//! 包含连接注册表等由基础设施层实现的接口。

pub mod connection_registry;

// 重新导出服务
pub use connection_registry::*;
