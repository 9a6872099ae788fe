//! # DS Protocol
//!
//! Driver Station 与机器人之间的 UDP 报文协议定义（无 I/O 依赖）
//!
//! ## 模块
//!
//! - `types`: 控制模式、联盟/站位、控制意图等领域类型
//! - `joystick`: 摇杆数值类型与量化工具
//! - `status`: 状态包 / 控制包解码结果
//! - `protocol`: `Protocol` trait（每个赛季一个实现）
//! - `session`: 协议会话状态机（Disconnected → Resolving → Connected）
//! - `frc2014` / `frc2015` / `frc2016`: 各赛季编解码实现
//!
//! ## 字节序
//!
//! 所有多字节整数均为大端字节序（网络字节序）。

pub mod frc2014;
pub mod frc2015;
pub mod frc2016;
pub mod joystick;
pub mod protocol;
pub mod session;
pub mod status;
pub mod types;

// 重新导出常用类型
pub use frc2014::Frc2014;
pub use frc2015::Frc2015;
pub use frc2016::Frc2016;
pub use joystick::Joystick;
pub use protocol::{JoystickLimits, PortConfig, Protocol, create_protocol};
pub use session::{ConnectionState, ProtocolSession, RobotState};
pub use status::{ControlPacket, StatusPacket};
pub use types::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid packet length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Checksum mismatch: expected 0x{expected:08X}, got 0x{actual:08X}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Unexpected tag 0x{tag:02X} at offset {offset}")]
    UnexpectedTag { tag: u8, offset: usize },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },
}

/// 长度检查（不足时返回 `InvalidLength`）
pub(crate) fn ensure_len(data: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if data.len() < expected {
        return Err(ProtocolError::InvalidLength {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// 大端字节序转 u16
pub fn bytes_to_u16_be(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// 大端字节序转 i16
pub fn bytes_to_i16_be(bytes: [u8; 2]) -> i16 {
    i16::from_be_bytes(bytes)
}

/// 大端字节序转 u32
pub fn bytes_to_u32_be(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// 生成 `net.TE.AM.host` 形式的静态地址
///
/// 团队号 1234 对应 `10.12.34.x`，团队号 254 对应 `10.2.54.x`。
pub fn static_ip(net: u8, team: u16, host: u8) -> String {
    format!("{}.{}.{}.{}", net, team / 100, team % 100, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_u16_be() {
        assert_eq!(bytes_to_u16_be([0x12, 0x34]), 0x1234);
    }

    #[test]
    fn test_bytes_to_i16_be_negative() {
        assert_eq!(bytes_to_i16_be([0xFF, 0xFF]), -1);
    }

    #[test]
    fn test_bytes_to_u32_be() {
        assert_eq!(bytes_to_u32_be([0xDE, 0xAD, 0xBE, 0xEF]), 0xDEADBEEF);
    }

    #[test]
    fn test_static_ip() {
        assert_eq!(static_ip(10, 1234, 2), "10.12.34.2");
        assert_eq!(static_ip(10, 254, 1), "10.2.54.1");
        assert_eq!(static_ip(10, 0, 2), "10.0.0.2");
    }

    #[test]
    fn test_ensure_len() {
        assert!(ensure_len(&[0; 8], 8).is_ok());
        assert_eq!(
            ensure_len(&[0; 3], 8),
            Err(ProtocolError::InvalidLength {
                expected: 8,
                actual: 3
            })
        );
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::InvalidLength {
            expected: 8,
            actual: 4,
        };
        assert_eq!(err.to_string(), "Invalid packet length: expected 8, got 4");

        let err = ProtocolError::UnexpectedTag { tag: 0x7F, offset: 9 };
        assert!(err.to_string().contains("0x7F"));
    }
}
