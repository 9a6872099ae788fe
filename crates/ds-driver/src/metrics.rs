//! 驱动运行指标
//!
//! IO 线程写、任意线程读的原子计数器，用于观察链路健康状况。

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// 已发送的控制包
    pub packets_sent: AtomicU64,
    /// 成功解码的状态包
    pub packets_received: AtomicU64,
    /// 无法解码的状态包
    pub malformed_packets: AtomicU64,
    /// 收到的 NetConsole 日志行
    pub log_lines: AtomicU64,
    /// socket 错误（发送 / 接收 / 重新绑定）
    pub socket_errors: AtomicU64,
    /// 看门狗超时次数
    pub watchdog_expirations: AtomicU64,
    /// 执行的命令数
    pub commands_applied: AtomicU64,
    /// tick 超时（处理时间超过发包间隔）
    pub tick_overruns: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            malformed_packets: self.malformed_packets.load(Ordering::Relaxed),
            log_lines: self.log_lines.load(Ordering::Relaxed),
            socket_errors: self.socket_errors.load(Ordering::Relaxed),
            watchdog_expirations: self.watchdog_expirations.load(Ordering::Relaxed),
            commands_applied: self.commands_applied.load(Ordering::Relaxed),
            tick_overruns: self.tick_overruns.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.packets_sent.store(0, Ordering::Relaxed);
        self.packets_received.store(0, Ordering::Relaxed);
        self.malformed_packets.store(0, Ordering::Relaxed);
        self.log_lines.store(0, Ordering::Relaxed);
        self.socket_errors.store(0, Ordering::Relaxed);
        self.watchdog_expirations.store(0, Ordering::Relaxed);
        self.commands_applied.store(0, Ordering::Relaxed);
        self.tick_overruns.store(0, Ordering::Relaxed);
    }

    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MetricsSnapshot {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub malformed_packets: u64,
    pub log_lines: u64,
    pub socket_errors: u64,
    pub watchdog_expirations: u64,
    pub commands_applied: u64,
    pub tick_overruns: u64,
}

impl MetricsSnapshot {
    /// 丢包率（百分比）：未收到回复的控制包占比
    ///
    /// 没有发送过控制包时返回 0.0。
    pub fn packet_loss(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        let lost = self.packets_sent.saturating_sub(self.packets_received);
        (lost as f64 / self.packets_sent as f64) * 100.0
    }
}
