//! 消息中继核心领域模型
//!
//! 包含连接标识、连接存活状态、消息负载与信封，以及连接注册表接口。

pub mod entities;
pub mod errors;
pub mod services;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use services::*;
pub use value_objects::*;
