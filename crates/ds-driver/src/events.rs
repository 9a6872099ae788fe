//! 事件通道
//!
//! IO 线程（生产者）向应用线程（消费者）投递状态变化事件：
//!
//! - 有界 FIFO，满时丢弃最旧事件并告警，生产者永不阻塞
//! - `poll()` 返回一个事件或 `None`
//! - `close()` 后拒绝新事件，已缓冲的事件仍可取出

use ds_protocol::{Alliance, OperatingMode, Position, ProtocolKind};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::warn;

/// 默认事件队列容量
pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// 状态变化事件
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DsEvent {
    JoystickCountChanged(usize),
    /// 机器人日志（NetConsole）
    LogLine(String),
    VoltageChanged(f32),
    CanUtilChanged(u8),
    CpuInfoChanged(u8),
    RamInfoChanged(u8),
    DiskInfoChanged(u8),
    StatusStringChanged(String),
    CommsChanged(bool),
    CodeChanged(bool),
    EnabledChanged(bool),
    ControlModeChanged(OperatingMode),
    EmergencyStopChanged(bool),
    StationChanged {
        alliance: Alliance,
        position: Position,
    },
    ProtocolChanged(ProtocolKind),
}

impl DsEvent {
    /// 事件类型名称（用于日志）
    pub fn kind(&self) -> &'static str {
        match self {
            DsEvent::JoystickCountChanged(_) => "JoystickCountChanged",
            DsEvent::LogLine(_) => "LogLine",
            DsEvent::VoltageChanged(_) => "VoltageChanged",
            DsEvent::CanUtilChanged(_) => "CanUtilChanged",
            DsEvent::CpuInfoChanged(_) => "CpuInfoChanged",
            DsEvent::RamInfoChanged(_) => "RamInfoChanged",
            DsEvent::DiskInfoChanged(_) => "DiskInfoChanged",
            DsEvent::StatusStringChanged(_) => "StatusStringChanged",
            DsEvent::CommsChanged(_) => "CommsChanged",
            DsEvent::CodeChanged(_) => "CodeChanged",
            DsEvent::EnabledChanged(_) => "EnabledChanged",
            DsEvent::ControlModeChanged(_) => "ControlModeChanged",
            DsEvent::EmergencyStopChanged(_) => "EmergencyStopChanged",
            DsEvent::StationChanged { .. } => "StationChanged",
            DsEvent::ProtocolChanged(_) => "ProtocolChanged",
        }
    }
}

/// 有界事件队列（丢弃最旧）
#[derive(Debug)]
pub struct EventQueue {
    events: Mutex<VecDeque<DsEvent>>,
    capacity: usize,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl EventQueue {
    /// 创建事件队列
    ///
    /// 容量为 0 时返回 `None`（调用方应视为资源耗尽并终止初始化）。
    pub fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        Some(Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 投递事件
    ///
    /// 返回 `false` 表示队列已关闭、事件被丢弃。
    pub fn push(&self, event: DsEvent) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        let mut events = self.events.lock();
        if events.len() >= self.capacity
            && let Some(oldest) = events.pop_front()
        {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                "Event queue full (capacity {}), dropping oldest {} event (total dropped: {})",
                self.capacity,
                oldest.kind(),
                dropped
            );
        }
        events.push_back(event);
        true
    }

    /// 取出最早的事件
    pub fn poll(&self) -> Option<DsEvent> {
        self.events.lock().pop_front()
    }

    /// 一次取出全部事件
    pub fn drain(&self) -> Vec<DsEvent> {
        self.events.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// 因队列已满而丢弃的事件数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
