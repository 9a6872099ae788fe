//! 命令类型定义
//!
//! 应用线程 → IO 线程的唯一输入通道。所有意图修改都以命令形式排队，
//! 由 IO 线程按 FIFO 顺序应用到 `ProtocolManager`。

use ds_protocol::{Alliance, ControlMode, Position, ProtocolKind};

/// 默认命令队列容量
pub const DEFAULT_COMMAND_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum DsCommand {
    SetRobotEnabled(bool),
    SetControlMode(ControlMode),
    SetEmergencyStopped(bool),
    SetTeamNumber(u16),
    SetAlliance(Alliance),
    SetPosition(Position),
    /// `None` 恢复为协议默认地址
    SetCustomRobotAddress(Option<String>),
    ConfigureProtocol(ProtocolKind),
    RebootRobot,
    RestartRobotCode,
    JoysticksReset,
    JoysticksAdd {
        axes: usize,
        hats: usize,
        buttons: usize,
    },
    SetJoystickAxis {
        index: usize,
        axis: usize,
        value: f32,
    },
    SetJoystickHat {
        index: usize,
        hat: usize,
        angle: i16,
    },
    SetJoystickButton {
        index: usize,
        button: usize,
        pressed: bool,
    },
}

impl DsCommand {
    /// 高频摇杆更新（日志降级为 trace）
    pub fn is_joystick_update(&self) -> bool {
        matches!(
            self,
            DsCommand::SetJoystickAxis { .. }
                | DsCommand::SetJoystickHat { .. }
                | DsCommand::SetJoystickButton { .. }
        )
    }
}
