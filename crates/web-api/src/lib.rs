//! Web API 层。
//!
//! 提供 Axum 路由：任意路径上的 WebSocket 升级交给连接生命周期，
//! `POST /api/message` 交给外部注入桥。

mod error;
mod routes;
mod server;
mod state;
mod ws_connection;

pub use error::ApiError;
pub use routes::router;
pub use server::{build_state, RelayApp};
pub use state::AppState;
