//! 基础设施层实现。
//!
//! 提供连接注册表等适配器，实现领域层定义的接口。

pub mod registry;

pub use registry::InMemoryConnectionRegistry;
