//! 报文解码结果
//!
//! - [`StatusPacket`]：机器人 → DS 的状态包（DS 侧解码）
//! - [`ControlPacket`]：DS → 机器人的控制包（机器人侧解码，用于仿真与测试）

use crate::joystick::Joystick;
use crate::types::{Alliance, ControlMode, Position, RobotRequest, TimeSync};

/// 状态包解码结果
///
/// 扩展信息（CPU/RAM/磁盘/CAN）为可选字段：只有报文中携带时才覆盖旧值。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusPacket {
    pub sequence: u16,
    pub emergency_stopped: bool,
    pub robot_code: bool,
    /// 电池电压（V，保留两位小数）
    pub voltage: f32,
    /// 机器人请求 DS 发送日期/时间
    pub request_time: bool,
    pub cpu_usage: Option<u8>,
    pub ram_usage: Option<u8>,
    pub disk_usage: Option<u8>,
    pub can_utilization: Option<u8>,
}

/// 控制包解码结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlPacket {
    pub sequence: u16,
    pub enabled: bool,
    pub mode: ControlMode,
    pub emergency_stopped: bool,
    pub fms_attached: bool,
    /// 团队号（仅 2014 协议携带）
    pub team: Option<u16>,
    pub alliance: Alliance,
    pub position: Position,
    pub request: RobotRequest,
    pub joysticks: Vec<Joystick>,
    pub time_sync: Option<TimeSync>,
}

/// 电压保留两位小数
pub(crate) fn round_voltage(voltage: f32) -> f32 {
    (voltage * 100.0).round() / 100.0
}

/// 百分比限制在 0..=100
pub(crate) fn clamp_percent(value: u8) -> u8 {
    value.min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_voltage() {
        assert_eq!(round_voltage(12.0 + 77.0 / 255.0), 12.3);
        assert_eq!(round_voltage(0.0), 0.0);
    }

    #[test]
    fn test_clamp_percent() {
        assert_eq!(clamp_percent(42), 42);
        assert_eq!(clamp_percent(250), 100);
    }
}
