//! 共享状态
//!
//! IO 线程是唯一写者：每个 tick / 每批命令之后发布一份完整快照（ArcSwap 无锁读取），
//! 应用线程只读快照，不直接访问 `ProtocolManager`。

use crate::events::EventQueue;
use crate::metrics::DriverMetrics;
use arc_swap::ArcSwap;
use ds_protocol::{
    Alliance, ConnectionState, ControlMode, Joystick, OperatingMode, Position, ProtocolKind,
};
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 只读状态快照
#[derive(Debug, Clone, Default)]
pub struct DsSnapshot {
    pub protocol: ProtocolKind,
    pub protocol_valid: bool,
    pub connection: ConnectionState,
    pub robot_comms: bool,
    pub robot_code: bool,
    /// 生效的使能状态（即编码进控制包的值）
    pub robot_enabled: bool,
    /// 应用最近一次的使能请求（可能因通信/急停被屏蔽）
    pub enabled_requested: bool,
    pub emergency_stopped: bool,
    pub control_mode: ControlMode,
    pub operating_mode: OperatingMode,
    pub voltage: f32,
    pub cpu_usage: u8,
    pub ram_usage: u8,
    pub disk_usage: u8,
    pub can_utilization: u8,
    pub team: u16,
    pub alliance: Alliance,
    pub position: Position,
    pub joysticks: Vec<Joystick>,
    /// 当前使用的机器人地址（自定义地址优先，否则为协议默认地址）
    pub applied_robot_address: String,
    /// 解析后的机器人 IP
    pub resolved_robot_ip: Option<IpAddr>,
    pub status_string: String,
}

impl DsSnapshot {
    pub fn joystick_count(&self) -> usize {
        self.joysticks.len()
    }
}

/// IO 线程与应用线程共享的上下文
#[derive(Debug)]
pub struct DsContext {
    pub snapshot: ArcSwap<DsSnapshot>,
    pub events: Arc<EventQueue>,
    pub metrics: DriverMetrics,
    /// IO 线程已应用的命令数（快照发布之后更新）
    applied_commands: AtomicU64,
}

impl DsContext {
    pub fn new(events: Arc<EventQueue>, initial: DsSnapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(initial),
            events,
            metrics: DriverMetrics::new(),
            applied_commands: AtomicU64::new(0),
        }
    }

    /// 读取最新快照
    pub fn load(&self) -> Arc<DsSnapshot> {
        self.snapshot.load_full()
    }

    pub fn publish(&self, snapshot: DsSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }

    /// 发布快照并推进已应用命令计数
    pub(crate) fn publish_applied(&self, snapshot: DsSnapshot, applied: u64) {
        self.publish(snapshot);
        self.applied_commands.fetch_add(applied, Ordering::Release);
    }

    pub fn applied_commands(&self) -> u64 {
        self.applied_commands.load(Ordering::Acquire)
    }
}
