//! FRC 2014 协议（cRIO 控制系统）
//!
//! 控制包固定 1024 字节：
//!
//! | 偏移 | 内容 |
//! |------|------|
//! | 0-1 | 序号 |
//! | 2 | 控制码 |
//! | 3 | 数字输入（恒为 0） |
//! | 4-5 | 团队号 |
//! | 6 | 联盟（`'R'` / `'B'`） |
//! | 7 | 站位（`'1'`..`'3'`） |
//! | 8-39 | 4 个摇杆 ×（6 轴 + 2 字节按钮位） |
//! | 72-79 | DS 版本 `"14021700"` |
//! | 1020-1023 | CRC-32（计算时该字段置零） |
//!
//! 状态包至少 1024 字节：byte 0 为控制码（0 表示急停），
//! byte 1-2 为 BCD 编码的电压（`0x12 0x30` → 12.30V），byte 30-31 为序号。

use bilge::prelude::*;
use crc::{CRC_32_ISO_HDLC, Crc};

use crate::joystick::{Joystick, axis_to_byte, byte_to_axis, flags_to_buttons};
use crate::protocol::{JoystickLimits, PortConfig, Protocol};
use crate::status::{ControlPacket, StatusPacket, round_voltage};
use crate::types::{Alliance, ControlIntent, ControlMode, Position, ProtocolKind, RobotRequest};
use crate::{ProtocolError, bytes_to_u16_be, bytes_to_u32_be, ensure_len, static_ip};

// ============================================================================
// 协议常量
// ============================================================================

pub const PACKET_LEN: usize = 1024;
pub const JOYSTICK_OFFSET: usize = 8;
pub const JOYSTICK_STRIDE: usize = 8;
pub const VERSION_OFFSET: usize = 72;
pub const DS_VERSION: &[u8; 8] = b"14021700";
pub const CRC_OFFSET: usize = 1020;
pub const STATUS_SEQUENCE_OFFSET: usize = 30;

pub const ALLIANCE_RED: u8 = b'R';
pub const ALLIANCE_BLUE: u8 = b'B';
pub const POSITION_BASE: u8 = b'1';

/// 急停时整个控制码为 0
pub const CODE_EMERGENCY_STOP: u8 = 0x00;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub(crate) const LIMITS: JoystickLimits = JoystickLimits {
    max_joysticks: 4,
    max_axes: 6,
    max_buttons: 10,
    max_hats: 0,
};

pub(crate) const PORTS: PortConfig = PortConfig {
    robot_port: 1110,
    ds_port: 1150,
    netconsole_port: None,
};

/// 控制码位域
///
/// - Bit 0: 保留
/// - Bit 1: 测试模式
/// - Bit 2: 重同步（尚未收到机器人状态包）
/// - Bit 3: 已连接 FMS
/// - Bit 4: 自动模式
/// - Bit 5: 使能
/// - Bit 6: 未急停（急停时整个控制码为 0）
/// - Bit 7: 重启请求（置位时其余位清零）
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default)]
pub struct ControlCode {
    pub reserved: bool,
    pub test: bool,
    pub resync: bool,
    pub fms_attached: bool,
    pub autonomous: bool,
    pub enabled: bool,
    pub not_emergency_stopped: bool,
    pub reboot: bool,
}

/// FRC 2014 协议
#[derive(Debug, Clone, Copy, Default)]
pub struct Frc2014;

impl Protocol for Frc2014 {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Frc2014
    }

    fn limits(&self) -> JoystickLimits {
        LIMITS
    }

    fn ports(&self) -> PortConfig {
        PORTS
    }

    fn robot_address(&self, team: u16) -> String {
        static_ip(10, team, 2)
    }

    fn encode_control_packet(
        &self,
        intent: &ControlIntent,
        joysticks: &[Joystick],
        sequence: u16,
    ) -> Vec<u8> {
        let mut data = vec![0u8; PACKET_LEN];
        data[0..2].copy_from_slice(&sequence.to_be_bytes());
        data[2] = control_code(intent);
        data[3] = 0x00;
        data[4..6].copy_from_slice(&intent.team.to_be_bytes());
        data[6] = match intent.alliance {
            Alliance::Red => ALLIANCE_RED,
            Alliance::Blue => ALLIANCE_BLUE,
        };
        data[7] = POSITION_BASE + intent.position.index();

        // 固定发送 4 个摇杆，缺失部分补中立值
        for slot in 0..LIMITS.max_joysticks {
            let offset = JOYSTICK_OFFSET + slot * JOYSTICK_STRIDE;
            let Some(joystick) = joysticks.get(slot) else {
                continue;
            };
            for (i, axis) in joystick.axes.iter().take(LIMITS.max_axes).enumerate() {
                data[offset + i] = axis_to_byte(*axis);
            }
            let buttons = joystick.num_buttons().min(LIMITS.max_buttons);
            let flags = joystick.button_flags() & ((1u16 << buttons) - 1);
            data[offset + 6..offset + 8].copy_from_slice(&flags.to_be_bytes());
        }

        data[VERSION_OFFSET..VERSION_OFFSET + DS_VERSION.len()].copy_from_slice(DS_VERSION);

        let checksum = CRC32.checksum(&data);
        data[CRC_OFFSET..PACKET_LEN].copy_from_slice(&checksum.to_be_bytes());
        data
    }

    fn decode_status_packet(&self, data: &[u8]) -> Result<StatusPacket, ProtocolError> {
        ensure_len(data, PACKET_LEN)?;

        Ok(StatusPacket {
            sequence: bytes_to_u16_be([
                data[STATUS_SEQUENCE_OFFSET],
                data[STATUS_SEQUENCE_OFFSET + 1],
            ]),
            emergency_stopped: data[0] == CODE_EMERGENCY_STOP,
            // cRIO 不上报代码状态，收到状态包即视为代码运行
            robot_code: true,
            voltage: decode_bcd_voltage(data[1], data[2]),
            request_time: false,
            ..Default::default()
        })
    }

    fn decode_control_packet(&self, data: &[u8]) -> Result<ControlPacket, ProtocolError> {
        ensure_len(data, PACKET_LEN)?;

        let expected = bytes_to_u32_be([
            data[CRC_OFFSET],
            data[CRC_OFFSET + 1],
            data[CRC_OFFSET + 2],
            data[CRC_OFFSET + 3],
        ]);
        let mut zeroed = data[..PACKET_LEN].to_vec();
        zeroed[CRC_OFFSET..PACKET_LEN].fill(0);
        let actual = CRC32.checksum(&zeroed);
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }

        let code = ControlCode::from(u8::new(data[2]));
        let mode = if code.test() {
            ControlMode::Test
        } else if code.autonomous() {
            ControlMode::Autonomous
        } else {
            ControlMode::Teleoperated
        };
        let alliance = match data[6] {
            ALLIANCE_RED => Alliance::Red,
            ALLIANCE_BLUE => Alliance::Blue,
            other => {
                return Err(ProtocolError::InvalidValue {
                    field: "Alliance".to_string(),
                    value: other,
                });
            },
        };
        let position = data[7]
            .checked_sub(POSITION_BASE)
            .and_then(Position::from_index)
            .ok_or(ProtocolError::InvalidValue {
                field: "Position".to_string(),
                value: data[7],
            })?;

        let joysticks = (0..LIMITS.max_joysticks)
            .map(|slot| {
                let offset = JOYSTICK_OFFSET + slot * JOYSTICK_STRIDE;
                let axes = data[offset..offset + LIMITS.max_axes]
                    .iter()
                    .map(|b| byte_to_axis(*b))
                    .collect();
                let flags = bytes_to_u16_be([data[offset + 6], data[offset + 7]]);
                Joystick {
                    axes,
                    hats: Vec::new(),
                    buttons: flags_to_buttons(flags, LIMITS.max_buttons),
                }
            })
            .collect();

        Ok(ControlPacket {
            sequence: bytes_to_u16_be([data[0], data[1]]),
            enabled: code.enabled(),
            mode,
            emergency_stopped: data[2] == CODE_EMERGENCY_STOP,
            fms_attached: code.fms_attached(),
            team: Some(bytes_to_u16_be([data[4], data[5]])),
            alliance,
            position,
            request: if code.reboot() {
                RobotRequest::Reboot
            } else {
                RobotRequest::None
            },
            joysticks,
            time_sync: None,
        })
    }

    fn encode_status_packet(&self, status: &StatusPacket) -> Vec<u8> {
        let mut data = vec![0u8; PACKET_LEN];
        let mut code = ControlCode::from(u8::new(0));
        code.set_not_emergency_stopped(true);
        data[0] = if status.emergency_stopped {
            CODE_EMERGENCY_STOP
        } else {
            u8::from(code).value()
        };
        let (upper, lower) = encode_bcd_voltage(status.voltage);
        data[1] = upper;
        data[2] = lower;
        data[STATUS_SEQUENCE_OFFSET..STATUS_SEQUENCE_OFFSET + 2]
            .copy_from_slice(&status.sequence.to_be_bytes());
        data
    }
}

pub(crate) fn control_code(intent: &ControlIntent) -> u8 {
    if intent.emergency_stopped {
        return CODE_EMERGENCY_STOP;
    }

    let mut code = ControlCode::from(u8::new(0));
    if intent.robot_comms && intent.request == RobotRequest::Reboot {
        code.set_reboot(true);
        return u8::from(code).value();
    }

    code.set_not_emergency_stopped(true);
    code.set_enabled(intent.enabled);
    match intent.mode {
        ControlMode::Test => code.set_test(true),
        ControlMode::Autonomous => code.set_autonomous(true),
        ControlMode::Teleoperated => {},
    }
    code.set_resync(!intent.robot_comms);
    code.set_fms_attached(intent.fms_attached);
    u8::from(code).value()
}

fn bcd_to_u8(byte: u8) -> Option<u8> {
    let (high, low) = (byte >> 4, byte & 0x0F);
    (high <= 9 && low <= 9).then_some(high * 10 + low)
}

fn u8_to_bcd(value: u8) -> u8 {
    let value = value.min(99);
    ((value / 10) << 4) | (value % 10)
}

/// 电压解码（不会失败）
///
/// 正常为 BCD；任一字节不是合法 BCD 时按原始字节换算（`byte * 12 / 0x12`，
/// 小数部分除以 255），保证同一包中的急停字节总能被处理。
pub(crate) fn decode_bcd_voltage(upper: u8, lower: u8) -> f32 {
    match (bcd_to_u8(upper), bcd_to_u8(lower)) {
        (Some(integer), Some(hundredths)) => {
            round_voltage(integer as f32 + hundredths as f32 / 100.0)
        },
        _ => {
            let scale = |byte: u8| ((byte as u32 * 12) / 0x12) as u8;
            round_voltage(scale(upper) as f32 + scale(lower) as f32 / 255.0)
        },
    }
}

pub(crate) fn encode_bcd_voltage(voltage: f32) -> (u8, u8) {
    let centivolts = if voltage.is_nan() {
        0
    } else {
        (voltage.clamp(0.0, 99.99) * 100.0).round() as u32
    };
    (
        u8_to_bcd((centivolts / 100) as u8),
        u8_to_bcd((centivolts % 100) as u8),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> ControlIntent {
        ControlIntent {
            robot_comms: true,
            team: 1234,
            ..Default::default()
        }
    }

    #[test]
    fn test_control_packet_layout() {
        let mut intent = intent();
        intent.alliance = Alliance::Blue;
        intent.position = Position::Three;
        let data = Frc2014.encode_control_packet(&intent, &[], 5);

        assert_eq!(data.len(), PACKET_LEN);
        assert_eq!(&data[0..2], &[0x00, 0x05]);
        assert_eq!(data[2], 0x40);
        assert_eq!(&data[4..6], &[0x04, 0xD2]);
        assert_eq!(data[6], b'B');
        assert_eq!(data[7], b'3');
        assert_eq!(&data[72..80], b"14021700");
    }

    #[test]
    fn test_control_code_bits() {
        let mut intent = intent();
        intent.enabled = true;
        intent.mode = ControlMode::Autonomous;
        assert_eq!(control_code(&intent), 0x70);

        intent.mode = ControlMode::Test;
        intent.robot_comms = false;
        // 未收到状态包时携带重同步位
        assert_eq!(control_code(&intent), 0x66);

        intent.emergency_stopped = true;
        assert_eq!(control_code(&intent), 0x00);
    }

    #[test]
    fn test_reboot_overrides_code() {
        let mut intent = intent();
        intent.enabled = true;
        intent.request = RobotRequest::Reboot;
        assert_eq!(control_code(&intent), 0x80);
    }

    #[test]
    fn test_checksum_verified() {
        let mut data = Frc2014.encode_control_packet(&intent(), &[], 1);
        assert!(Frc2014.decode_control_packet(&data).is_ok());

        data[10] ^= 0xFF;
        assert!(matches!(
            Frc2014.decode_control_packet(&data),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_joysticks_padded_to_four() {
        let mut joystick = Joystick::new(2, 0, 4);
        joystick.axes[1] = 0.5;
        joystick.buttons[3] = true;
        let data = Frc2014.encode_control_packet(&intent(), &[joystick], 1);
        let packet = Frc2014.decode_control_packet(&data).unwrap();

        assert_eq!(packet.joysticks.len(), 4);
        assert!((packet.joysticks[0].axes[1] - 0.5).abs() < 1.0 / 127.0);
        assert!(packet.joysticks[0].buttons[3]);
        assert!(packet.joysticks[3].axes.iter().all(|a| *a == 0.0));
        assert_eq!(packet.team, Some(1234));
    }

    #[test]
    fn test_decode_status() {
        let mut data = vec![0u8; PACKET_LEN];
        data[0] = 0x40;
        data[1] = 0x12;
        data[2] = 0x30;
        let packet = Frc2014.decode_status_packet(&data).unwrap();
        assert_eq!(packet.voltage, 12.3);
        assert!(!packet.emergency_stopped);
        assert!(packet.robot_code);

        data[0] = 0x00;
        assert!(Frc2014.decode_status_packet(&data).unwrap().emergency_stopped);
    }

    #[test]
    fn test_decode_status_too_short() {
        assert!(matches!(
            Frc2014.decode_status_packet(&[0x40; 8]),
            Err(ProtocolError::InvalidLength {
                expected: 1024,
                actual: 8
            })
        ));
    }

    #[test]
    fn test_decode_status_non_bcd_voltage_keeps_estop() {
        let mut data = vec![0u8; PACKET_LEN];
        data[0] = CODE_EMERGENCY_STOP;
        data[1] = 0x0C;
        data[2] = 0x4D;
        let packet = Frc2014.decode_status_packet(&data).unwrap();
        assert!(packet.emergency_stopped);
        assert!(packet.robot_code);
        // 0x0C * 12 / 0x12 = 8, 0x4D * 12 / 0x12 = 51
        assert_eq!(packet.voltage, 8.2);

        data[0] = 0x40;
        data[1] = 0x1F;
        assert!(!Frc2014.decode_status_packet(&data).unwrap().emergency_stopped);
    }

    #[test]
    fn test_bcd_voltage_roundtrip() {
        assert_eq!(encode_bcd_voltage(12.3), (0x12, 0x30));
        assert_eq!(decode_bcd_voltage(0x12, 0x30), 12.3);
        assert_eq!(encode_bcd_voltage(-4.0), (0x00, 0x00));
    }

    #[test]
    fn test_robot_address() {
        assert_eq!(Frc2014.robot_address(1234), "10.12.34.2");
        assert_eq!(Frc2014.ports().netconsole_port, None);
    }
}
