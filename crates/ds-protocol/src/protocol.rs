//! `Protocol` trait 定义
//!
//! 每个赛季一个实现，彼此只在字节布局、控制字节位分配和摇杆容量上不同。
//! 新增赛季只需新增一个实现并在 [`create_protocol`] 中注册。

use std::fmt;
use std::time::Duration;

use crate::joystick::Joystick;
use crate::status::{ControlPacket, StatusPacket};
use crate::types::{ControlIntent, ProtocolKind};
use crate::{ProtocolError, static_ip};

/// 摇杆容量限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoystickLimits {
    pub max_joysticks: usize,
    pub max_axes: usize,
    pub max_buttons: usize,
    pub max_hats: usize,
}

/// 端口配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    /// 机器人接收控制包的端口
    pub robot_port: u16,
    /// DS 接收状态包的端口
    pub ds_port: u16,
    /// 机器人日志（NetConsole）端口，`None` 表示该赛季不支持
    pub netconsole_port: Option<u16>,
}

/// 赛季协议
///
/// 编解码函数均为纯函数：相同输入（含序号）产生相同字节序列。
/// 连接状态、计数器等可变状态由 [`ProtocolSession`](crate::ProtocolSession) 持有。
pub trait Protocol: Send + Sync + fmt::Debug {
    fn kind(&self) -> ProtocolKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn limits(&self) -> JoystickLimits;

    fn ports(&self) -> PortConfig;

    /// 控制包发送周期
    fn packet_interval(&self) -> Duration {
        Duration::from_millis(20)
    }

    /// 看门狗超时：50 个周期，最长 1 秒
    fn watchdog_timeout(&self) -> Duration {
        (self.packet_interval() * 50).min(Duration::from_secs(1))
    }

    fn max_battery_voltage(&self) -> f32 {
        13.0
    }

    /// 根据团队号生成机器人默认地址
    fn robot_address(&self, team: u16) -> String;

    fn radio_address(&self, team: u16) -> String {
        static_ip(10, team, 1)
    }

    /// 编码 DS → 机器人控制包
    fn encode_control_packet(
        &self,
        intent: &ControlIntent,
        joysticks: &[Joystick],
        sequence: u16,
    ) -> Vec<u8>;

    /// 解码机器人 → DS 状态包
    fn decode_status_packet(&self, data: &[u8]) -> Result<StatusPacket, ProtocolError>;

    /// 机器人侧：解码控制包
    fn decode_control_packet(&self, data: &[u8]) -> Result<ControlPacket, ProtocolError>;

    /// 机器人侧：编码状态包
    fn encode_status_packet(&self, status: &StatusPacket) -> Vec<u8>;
}

/// 根据协议描述符创建实现
pub fn create_protocol(kind: ProtocolKind) -> Box<dyn Protocol> {
    match kind {
        ProtocolKind::Frc2014 => Box::new(crate::Frc2014),
        ProtocolKind::Frc2015 => Box::new(crate::Frc2015),
        ProtocolKind::Frc2016 => Box::new(crate::Frc2016),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_protocol_kind() {
        for kind in [
            ProtocolKind::Frc2014,
            ProtocolKind::Frc2015,
            ProtocolKind::Frc2016,
        ] {
            assert_eq!(create_protocol(kind).kind(), kind);
        }
    }

    #[test]
    fn test_default_watchdog_timeout() {
        let protocol = create_protocol(ProtocolKind::Frc2015);
        assert_eq!(protocol.packet_interval(), Duration::from_millis(20));
        // 20ms * 50 = 1000ms，不超过 1 秒上限
        assert_eq!(protocol.watchdog_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_radio_address() {
        let protocol = create_protocol(ProtocolKind::Frc2014);
        assert_eq!(protocol.radio_address(3794), "10.37.94.1");
    }
}
