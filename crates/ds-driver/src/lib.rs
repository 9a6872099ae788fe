//! 驱动层模块
//!
//! 本模块负责 Driver Station 与机器人之间的通信循环，包括：
//! - IO 线程管理（唯一所有者，命令队列输入、事件队列输出）
//! - 协议管理器（控制意图、摇杆、边沿触发事件）
//! - 通信看门狗与地址解析线程
//! - 状态同步（ArcSwap 无锁读取）
//!
//! 大多数用户应该使用 `ds-sdk` 提供的 `DriverStation` 门面。

mod builder;
pub mod command;
mod driver;
mod error;
pub mod events;
pub mod joystick;
pub mod manager;
pub mod metrics;
pub mod pipeline;
pub mod resolver;
pub mod state;
mod thread;
pub mod transport;
pub mod watchdog;

pub use builder::DsDriverBuilder;
pub use command::{DEFAULT_COMMAND_CAPACITY, DsCommand};
pub use driver::DsDriver;
pub use error::DriverError;
pub use events::{DEFAULT_EVENT_CAPACITY, DsEvent, EventQueue};
pub use joystick::JoystickRegistry;
pub use manager::ProtocolManager;
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use pipeline::{PipelineConfig, io_loop};
pub use resolver::Resolver;
pub use state::{DsContext, DsSnapshot};
pub use transport::{Transport, TransportConfig, UdpTransport};
pub use watchdog::Watchdog;
