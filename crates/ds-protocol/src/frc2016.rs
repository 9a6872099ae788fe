//! FRC 2016 协议
//!
//! 报文布局与 FRC 2015 完全一致，仅机器人 mDNS 地址不同（`roboRIO-TEAM-FRC.local`）。

use crate::frc2015;
use crate::joystick::Joystick;
use crate::protocol::{JoystickLimits, PortConfig, Protocol};
use crate::status::{ControlPacket, StatusPacket};
use crate::types::{ControlIntent, ProtocolKind};
use crate::ProtocolError;

/// FRC 2016 协议
#[derive(Debug, Clone, Copy, Default)]
pub struct Frc2016;

impl Protocol for Frc2016 {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Frc2016
    }

    fn limits(&self) -> JoystickLimits {
        frc2015::LIMITS
    }

    fn ports(&self) -> PortConfig {
        frc2015::PORTS
    }

    fn robot_address(&self, team: u16) -> String {
        format!("roboRIO-{}-FRC.local", team)
    }

    fn encode_control_packet(
        &self,
        intent: &ControlIntent,
        joysticks: &[Joystick],
        sequence: u16,
    ) -> Vec<u8> {
        frc2015::encode_control(intent, joysticks, sequence, &frc2015::LIMITS)
    }

    fn decode_status_packet(&self, data: &[u8]) -> Result<StatusPacket, ProtocolError> {
        frc2015::decode_status(data)
    }

    fn decode_control_packet(&self, data: &[u8]) -> Result<ControlPacket, ProtocolError> {
        frc2015::decode_control(data)
    }

    fn encode_status_packet(&self, status: &StatusPacket) -> Vec<u8> {
        frc2015::encode_status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Frc2015;

    #[test]
    fn test_robot_address() {
        assert_eq!(Frc2016.robot_address(118), "roboRIO-118-FRC.local");
    }

    #[test]
    fn test_same_layout_as_2015() {
        let intent = ControlIntent {
            enabled: true,
            robot_comms: true,
            ..Default::default()
        };
        let joysticks = [Joystick::new(4, 1, 8)];
        assert_eq!(
            Frc2016.encode_control_packet(&intent, &joysticks, 99),
            Frc2015.encode_control_packet(&intent, &joysticks, 99)
        );
        assert_eq!(Frc2016.limits(), Frc2015.limits());
    }
}
