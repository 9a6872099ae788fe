//! SDK 错误类型定义

use ds_driver::DriverError;
use std::path::PathBuf;
use thiserror::Error;

/// SDK 错误类型
#[derive(Error, Debug)]
pub enum SdkError {
    /// 驱动层错误（初始化失败、命令队列满 / 已关闭）
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 配置文件读写失败
    #[error("Failed to access config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件解析失败
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// 配置序列化失败
    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// 配置值无效
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdk_error_display() {
        let err: SdkError = DriverError::ChannelClosed.into();
        assert_eq!(err.to_string(), "Driver error: Command channel closed");

        let err = SdkError::InvalidConfig("tick_interval_ms must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid config: tick_interval_ms must be positive"
        );

        let err = SdkError::ConfigIo {
            path: PathBuf::from("/nonexistent/ds.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/nonexistent/ds.toml"));
    }
}
