use domain::{ConnectionState, DomainError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("identity is required in identified mode")]
    IdentityRequired,
    #[error("connection cannot open from state {0:?}")]
    InvalidState(ConnectionState),
    #[error("malformed ingestion request: {0}")]
    MalformedIngestion(String),
}

impl ApplicationError {
    /// 创建外部注入请求格式错误
    pub fn malformed_ingestion(reason: impl Into<String>) -> Self {
        ApplicationError::MalformedIngestion(reason.into())
    }
}
