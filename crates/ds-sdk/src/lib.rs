//! # DS SDK
//!
//! FRC Driver Station 机器人通信库：以固定周期向机器人发送控制包，
//! 解析状态包，并以事件形式报告通信、使能、电压等状态变化。
//!
//! # 架构设计
//!
//! - **协议层** (`ds-protocol`): 各赛季报文编解码（无 I/O）
//! - **驱动层** (`ds-driver`): IO 线程、看门狗、地址解析、事件队列
//! - **SDK 层** (本 crate): `DriverStation` 门面、TOML 配置、日志初始化
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use ds_sdk::prelude::*;
//!
//! # fn main() -> ds_sdk::Result<()> {
//! ds_sdk::init_logging();
//!
//! let ds = DriverStation::init(&DsConfig {
//!     team: 3794,
//!     ..Default::default()
//! })?;
//!
//! loop {
//!     while let Some(event) = ds.poll_event() {
//!         println!("{event:?}");
//!     }
//!     ds_sdk::sleep(20);
//! }
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod station;

pub use config::DsConfig;
pub use error::{Result, SdkError};
pub use logging::{init_logging, init_logging_with};
pub use station::{DriverStation, DriverStationBuilder};

// 下层 crate（高级用户使用）
pub use ds_driver as driver;
pub use ds_protocol as protocol;

pub use ds_driver::{DriverError, DsEvent, DsSnapshot, MetricsSnapshot};
pub use ds_protocol::{
    Alliance, ControlMode, Joystick, OperatingMode, Position, ProtocolError, ProtocolKind,
};

/// 阻塞当前线程指定毫秒数（高精度）
pub fn sleep(ms: u64) {
    spin_sleep::sleep(std::time::Duration::from_millis(ms));
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    #[test]
    fn test_sleep_duration() {
        let start = Instant::now();
        super::sleep(5);
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
