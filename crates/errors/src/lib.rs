//! omb-errors - 驱动统一错误处理

use thiserror::Error;

/// 驱动错误类型
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to construct client: {0}")]
    Construction(String),

    #[error("Failed to subscribe: {0}")]
    Subscription(String),

    #[error("Failed to publish: {0}")]
    Publish(String),

    #[error("Failed to receive: {0}")]
    Receive(String),

    #[error("Admin operation failed: {0}")]
    Admin(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Driver is closed")]
    Closed,
}

impl DriverError {
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    pub fn subscription(msg: impl Into<String>) -> Self {
        Self::Subscription(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    pub fn receive(msg: impl Into<String>) -> Self {
        Self::Receive(msg.into())
    }

    pub fn admin(msg: impl Into<String>) -> Self {
        Self::Admin(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// 错误种类标签（用于 metrics / 日志）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Construction(_) => "construction",
            Self::Subscription(_) => "subscription",
            Self::Publish(_) => "publish",
            Self::Receive(_) => "receive",
            Self::Admin(_) => "admin",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Config(_) => "config",
            Self::Closed => "closed",
        }
    }
}

/// Result 类型别名
pub type DriverResult<T> = Result<T, DriverError>;
