//! 驱动层错误类型定义

use ds_protocol::{ProtocolError, ProtocolKind};
use thiserror::Error;

/// 驱动层错误类型
///
/// 除 `ResourceExhausted` 外，所有错误都在 IO 线程内部恢复，不会跨越公共 API 边界传播。
#[derive(Error, Debug)]
pub enum DriverError {
    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 状态包无法解码（保留旧状态）
    #[error("Malformed packet from {source_addr}: {reason}")]
    MalformedPacket { source_addr: String, reason: String },

    /// 机器人地址无法解析（由解析线程定时重试）
    #[error("Address unresolved: {0}")]
    AddressUnresolved(String),

    /// 临时 socket 错误（下个 tick 重试）
    #[error("Transient socket error: {0}")]
    TransientSocket(#[from] std::io::Error),

    /// 摇杆索引越界（记录日志并忽略）
    #[error("Invalid joystick index: joystick {joystick}, {kind} {index} (count: {count})")]
    InvalidJoystickIndex {
        joystick: usize,
        kind: &'static str,
        index: usize,
        count: usize,
    },

    /// 协议切换被拒绝（保留原协议）
    #[error("Incompatible protocol switch from {from} to {to}: {reason}")]
    IncompatibleProtocolSwitch {
        from: ProtocolKind,
        to: ProtocolKind,
        reason: String,
    },

    /// 看门狗超时
    #[error("Watchdog timeout after {misses} missed packets")]
    WatchdogTimeout { misses: u32 },

    /// 命令通道已关闭（IO 线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 命令通道已满
    #[error("Command channel full (capacity: {0})")]
    ChannelFull(usize),

    /// 等待超时
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),

    /// 资源耗尽（初始化失败，唯一的致命错误）
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// 配置无效
    #[error("Invalid configuration: {0}")]
    Config(String),
}
