//! 协议会话
//!
//! 持有当前赛季协议实现以及它的连接/健康状态：
//!
//! ```text
//! Disconnected ──begin_resolving()──▶ Resolving ──decode() 成功──▶ Connected
//!      ▲                                                            │
//!      └──────────────── expire()（看门狗超时）/ reset() ──────────────┘
//! ```
//!
//! 解码失败时状态保持不变。

use crate::joystick::Joystick;
use crate::protocol::{Protocol, create_protocol};
use crate::status::StatusPacket;
use crate::types::{ControlIntent, ProtocolKind};
use crate::ProtocolError;

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// 正在解析地址 / 等待机器人第一个状态包
    Resolving,
    Connected,
}

/// 机器人上报的状态（由状态包解码得到）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RobotState {
    pub connection: ConnectionState,
    pub robot_code: bool,
    pub emergency_stopped: bool,
    pub voltage: f32,
    pub cpu_usage: u8,
    pub ram_usage: u8,
    pub disk_usage: u8,
    pub can_utilization: u8,
    pub request_time: bool,
}

impl RobotState {
    /// 是否已与机器人建立通信
    pub fn comms(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}

/// 协议会话
#[derive(Debug)]
pub struct ProtocolSession {
    protocol: Box<dyn Protocol>,
    state: RobotState,
    sequence: u16,
    sent_packets: u64,
    received_packets: u64,
    initialized: bool,
}

impl ProtocolSession {
    pub fn new(kind: ProtocolKind) -> Self {
        Self::with_protocol(create_protocol(kind))
    }

    pub fn with_protocol(protocol: Box<dyn Protocol>) -> Self {
        Self {
            protocol,
            state: RobotState::default(),
            sequence: 0,
            sent_packets: 0,
            received_packets: 0,
            initialized: false,
        }
    }

    pub fn protocol(&self) -> &dyn Protocol {
        self.protocol.as_ref()
    }

    pub fn kind(&self) -> ProtocolKind {
        self.protocol.kind()
    }

    pub fn state(&self) -> &RobotState {
        &self.state
    }

    /// 下一个控制包使用的序号
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn sent_packets(&self) -> u64 {
        self.sent_packets
    }

    pub fn received_packets(&self) -> u64 {
        self.received_packets
    }

    /// 是否已完成至少一次生命周期步骤（编码过控制包）
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn begin_resolving(&mut self) {
        if self.state.connection == ConnectionState::Disconnected {
            self.state.connection = ConnectionState::Resolving;
        }
    }

    /// 编码下一个控制包并推进序号
    pub fn encode(&mut self, intent: &ControlIntent, joysticks: &[Joystick]) -> Vec<u8> {
        let packet = self.protocol.encode_control_packet(intent, joysticks, self.sequence);
        self.sequence = self.sequence.wrapping_add(1);
        self.sent_packets += 1;
        self.initialized = true;
        packet
    }

    /// 解码状态包；成功时更新状态并进入 `Connected`
    pub fn decode(&mut self, data: &[u8]) -> Result<StatusPacket, ProtocolError> {
        let packet = self.protocol.decode_status_packet(data)?;
        self.apply(&packet);
        self.received_packets += 1;
        Ok(packet)
    }

    fn apply(&mut self, packet: &StatusPacket) {
        let state = &mut self.state;
        state.connection = ConnectionState::Connected;
        state.robot_code = packet.robot_code;
        state.emergency_stopped = packet.emergency_stopped;
        state.voltage = packet.voltage;
        state.request_time = packet.request_time;
        if let Some(cpu) = packet.cpu_usage {
            state.cpu_usage = cpu;
        }
        if let Some(ram) = packet.ram_usage {
            state.ram_usage = ram;
        }
        if let Some(disk) = packet.disk_usage {
            state.disk_usage = disk;
        }
        if let Some(can) = packet.can_utilization {
            state.can_utilization = can;
        }
    }

    /// 看门狗超时：回到 `Disconnected`，清零健康数据与序号（保留收发计数）
    pub fn expire(&mut self) {
        self.state = RobotState::default();
        self.sequence = 0;
    }

    /// 完全复位
    pub fn reset(&mut self) {
        self.expire();
        self.sent_packets = 0;
        self.received_packets = 0;
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_bytes(voltage_lower: u8) -> Vec<u8> {
        vec![0x00, 0x01, 0x01, 0x00, 0x20, 0x0C, voltage_lower, 0x00, 0x02, 0x05, 40]
    }

    #[test]
    fn test_lifecycle() {
        let mut session = ProtocolSession::new(ProtocolKind::Frc2015);
        assert_eq!(session.state().connection, ConnectionState::Disconnected);
        assert!(!session.is_initialized());

        session.begin_resolving();
        assert_eq!(session.state().connection, ConnectionState::Resolving);

        session.encode(&ControlIntent::default(), &[]);
        assert!(session.is_initialized());
        assert_eq!(session.sequence(), 1);

        session.decode(&status_bytes(0x4D)).unwrap();
        assert!(session.state().comms());
        assert_eq!(session.state().voltage, 12.3);
        assert_eq!(session.state().cpu_usage, 40);

        session.expire();
        assert_eq!(session.state(), &RobotState::default());
        assert_eq!(session.sequence(), 0);
        assert_eq!(session.received_packets(), 1);
    }

    #[test]
    fn test_decode_failure_keeps_state() {
        let mut session = ProtocolSession::new(ProtocolKind::Frc2015);
        session.decode(&status_bytes(0x4D)).unwrap();
        let before = session.state().clone();

        assert!(session.decode(&[0x00, 0x01]).is_err());
        assert_eq!(session.state(), &before);
        assert_eq!(session.received_packets(), 1);
    }

    #[test]
    fn test_extended_fields_sticky() {
        let mut session = ProtocolSession::new(ProtocolKind::Frc2016);
        session.decode(&status_bytes(0x00)).unwrap();
        // 不携带扩展块的状态包不覆盖 CPU
        session
            .decode(&[0x00, 0x02, 0x01, 0x00, 0x20, 0x0C, 0x00, 0x00])
            .unwrap();
        assert_eq!(session.state().cpu_usage, 40);
    }

    #[test]
    fn test_sequence_wraps() {
        let mut session = ProtocolSession::new(ProtocolKind::Frc2015);
        for _ in 0..=u16::MAX as u32 {
            session.encode(&ControlIntent::default(), &[]);
        }
        assert_eq!(session.sequence(), 0);
    }

    #[test]
    fn test_reset() {
        let mut session = ProtocolSession::new(ProtocolKind::Frc2015);
        session.encode(&ControlIntent::default(), &[]);
        session.decode(&status_bytes(0x4D)).unwrap();
        session.reset();

        assert_eq!(session.state().connection, ConnectionState::Disconnected);
        assert_eq!(session.sent_packets(), 0);
        assert_eq!(session.received_packets(), 0);
        assert!(!session.is_initialized());
    }
}
