//! 领域类型定义
//!
//! 控制模式、联盟/站位、协议类型以及每个 tick 交给编码器的控制意图。

use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

use crate::ProtocolError;

// ============================================================================
// 控制模式
// ============================================================================

/// 可由应用设置的控制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ControlMode {
    /// 手动遥控（默认）
    #[default]
    Teleoperated,
    /// 自动阶段
    Autonomous,
    /// 测试模式
    Test,
}

impl ControlMode {
    pub fn label(self) -> &'static str {
        match self {
            ControlMode::Teleoperated => "Teleoperated",
            ControlMode::Autonomous => "Autonomous",
            ControlMode::Test => "Test",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 机器人实际运行模式（由控制意图与机器人状态推导）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperatingMode {
    #[default]
    Disabled,
    Teleoperated,
    Autonomous,
    Test,
    EmergencyStopped,
}

impl OperatingMode {
    /// 推导规则：急停优先，其次是失能，最后是控制模式
    pub fn derive(mode: ControlMode, enabled: bool, emergency_stopped: bool) -> Self {
        if emergency_stopped {
            return OperatingMode::EmergencyStopped;
        }
        if !enabled {
            return OperatingMode::Disabled;
        }
        match mode {
            ControlMode::Teleoperated => OperatingMode::Teleoperated,
            ControlMode::Autonomous => OperatingMode::Autonomous,
            ControlMode::Test => OperatingMode::Test,
        }
    }
}

// ============================================================================
// 联盟 / 站位
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Alliance {
    #[default]
    Red,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Position {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "1"))]
    One,
    #[cfg_attr(feature = "serde", serde(rename = "2"))]
    Two,
    #[cfg_attr(feature = "serde", serde(rename = "3"))]
    Three,
}

impl Position {
    /// 站位序号（0..=2）
    pub fn index(self) -> u8 {
        match self {
            Position::One => 0,
            Position::Two => 1,
            Position::Three => 2,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Position::One),
            1 => Some(Position::Two),
            2 => Some(Position::Three),
            _ => None,
        }
    }
}

// ============================================================================
// 协议类型
// ============================================================================

/// 协议描述符（选择赛季实现）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ProtocolKind {
    Frc2014,
    Frc2015,
    #[default]
    Frc2016,
}

impl ProtocolKind {
    pub fn name(self) -> &'static str {
        match self {
            ProtocolKind::Frc2014 => "FRC 2014",
            ProtocolKind::Frc2015 => "FRC 2015",
            ProtocolKind::Frc2016 => "FRC 2016",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProtocolKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "frc2014" | "2014" => Ok(ProtocolKind::Frc2014),
            "frc2015" | "2015" => Ok(ProtocolKind::Frc2015),
            "frc2016" | "2016" => Ok(ProtocolKind::Frc2016),
            _ => Err(ProtocolError::InvalidValue {
                field: format!("ProtocolKind({s})"),
                value: 0,
            }),
        }
    }
}

// ============================================================================
// 控制意图
// ============================================================================

/// 一次性请求（由控制包携带）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RobotRequest {
    #[default]
    None,
    /// 重启控制器
    Reboot,
    /// 重启机器人用户代码
    RestartCode,
}

/// 时间同步数据（机器人请求时附加到控制包）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSync {
    pub datetime: NaiveDateTime,
    pub timezone: String,
}

impl TimeSync {
    /// 使用本机当前时间与时区偏移
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            datetime: now.naive_local(),
            timezone: now.offset().to_string(),
        }
    }
}

/// 控制意图：编码器每个 tick 的全部输入（除摇杆与序号外）
///
/// `enabled` 为**生效值**（已由管理层按通信/代码/急停状态屏蔽），
/// 编码器不再做额外判断。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlIntent {
    pub enabled: bool,
    pub mode: ControlMode,
    pub emergency_stopped: bool,
    pub fms_attached: bool,
    /// 是否已与机器人建立通信（影响请求字节 / 重同步位）
    pub robot_comms: bool,
    pub team: u16,
    pub alliance: Alliance,
    pub position: Position,
    pub request: RobotRequest,
    pub time_sync: Option<TimeSync>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operating_mode_derive() {
        assert_eq!(
            OperatingMode::derive(ControlMode::Autonomous, true, false),
            OperatingMode::Autonomous
        );
        assert_eq!(
            OperatingMode::derive(ControlMode::Autonomous, false, false),
            OperatingMode::Disabled
        );
        // 急停优先于使能
        assert_eq!(
            OperatingMode::derive(ControlMode::Test, true, true),
            OperatingMode::EmergencyStopped
        );
    }

    #[test]
    fn test_protocol_kind_from_str() {
        assert_eq!("frc2015".parse::<ProtocolKind>(), Ok(ProtocolKind::Frc2015));
        assert_eq!("FRC 2014".parse::<ProtocolKind>(), Ok(ProtocolKind::Frc2014));
        assert_eq!("2016".parse::<ProtocolKind>(), Ok(ProtocolKind::Frc2016));
        assert!("frc2099".parse::<ProtocolKind>().is_err());
    }

    #[test]
    fn test_position_index() {
        for index in 0..3 {
            let position = Position::from_index(index).unwrap();
            assert_eq!(position.index(), index);
        }
        assert_eq!(Position::from_index(3), None);
    }

    #[test]
    fn test_control_mode_label() {
        assert_eq!(ControlMode::Teleoperated.to_string(), "Teleoperated");
        assert_eq!(ControlMode::default(), ControlMode::Teleoperated);
    }
}
