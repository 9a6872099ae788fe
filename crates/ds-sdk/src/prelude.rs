//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use ds_sdk::prelude::*;
//! ```

pub use crate::config::DsConfig;
pub use crate::station::{DriverStation, DriverStationBuilder};

// 领域类型
pub use ds_protocol::{
    Alliance, ControlMode, Joystick, OperatingMode, Position, ProtocolKind,
};

// 事件与状态
pub use ds_driver::{DsEvent, DsSnapshot, MetricsSnapshot};

// 错误类型
pub use crate::error::SdkError;
pub use ds_driver::DriverError;
pub use ds_protocol::ProtocolError;
