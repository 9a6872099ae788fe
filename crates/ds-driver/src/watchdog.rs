//! 通信看门狗
//!
//! 以 tick 为单位计数：每个没有收到有效状态包的 tick 计一次丢失，
//! 连续丢失达到阈值时触发一次超时；收到状态包后清零。
//! 超时只在阈值边沿报告一次，直到再次被喂狗。

use std::time::Duration;

/// 默认阈值（20ms × 50 = 1s）
pub const DEFAULT_WATCHDOG_THRESHOLD: u32 = 50;

#[derive(Debug, Clone)]
pub struct Watchdog {
    misses: u32,
    threshold: u32,
    expired: bool,
}

impl Watchdog {
    pub fn new(threshold: u32) -> Self {
        Self {
            misses: 0,
            threshold: threshold.max(1),
            expired: false,
        }
    }

    /// 按发包间隔与超时时间换算阈值（至少 1 个 tick）
    pub fn from_timeout(interval: Duration, timeout: Duration) -> Self {
        let interval = interval.as_micros().max(1);
        let ticks = timeout.as_micros().div_ceil(interval);
        Self::new(u32::try_from(ticks).unwrap_or(u32::MAX))
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// 收到有效状态包
    pub fn feed(&mut self) {
        self.misses = 0;
        self.expired = false;
    }

    /// 一个 tick 结束且本 tick 未收到有效状态包
    ///
    /// 返回 `true` 表示刚刚超时（每次失联只报告一次）。
    pub fn tick(&mut self) -> bool {
        self.misses = self.misses.saturating_add(1);
        if !self.expired && self.misses >= self.threshold {
            self.expired = true;
            return true;
        }
        false
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_WATCHDOG_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_once_at_threshold() {
        let mut watchdog = Watchdog::new(3);
        assert!(!watchdog.tick());
        assert!(!watchdog.tick());
        assert!(watchdog.tick());
        assert!(watchdog.is_expired());
        // 持续失联不再重复报告
        for _ in 0..10 {
            assert!(!watchdog.tick());
        }
    }

    #[test]
    fn test_feed_resets() {
        let mut watchdog = Watchdog::new(2);
        watchdog.tick();
        watchdog.feed();
        assert!(!watchdog.tick());
        assert!(watchdog.tick());

        watchdog.feed();
        assert!(!watchdog.is_expired());
        assert_eq!(watchdog.misses(), 0);
    }

    #[test]
    fn test_from_timeout() {
        let watchdog = Watchdog::from_timeout(Duration::from_millis(20), Duration::from_secs(1));
        assert_eq!(watchdog.threshold(), 50);

        let watchdog = Watchdog::from_timeout(Duration::from_millis(20), Duration::from_millis(30));
        assert_eq!(watchdog.threshold(), 2);

        let watchdog = Watchdog::from_timeout(Duration::from_millis(20), Duration::ZERO);
        assert_eq!(watchdog.threshold(), 1);
    }
}
