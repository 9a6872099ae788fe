//! 编解码往返属性测试
//!
//! 对每个赛季协议验证：
//! - 控制包 `decode(encode(intent, joysticks))` 还原报文定义携带的字段
//! - 状态包 `decode(encode(status))` 还原电压、急停、代码状态与扩展信息
//! - 任意字节输入都不会 panic

use ds_protocol::{
    Alliance, ControlIntent, ControlMode, Joystick, Position, ProtocolKind, RobotRequest,
    StatusPacket, create_protocol,
};
use proptest::prelude::*;

const KINDS: [ProtocolKind; 3] = [
    ProtocolKind::Frc2014,
    ProtocolKind::Frc2015,
    ProtocolKind::Frc2016,
];

fn arb_mode() -> impl Strategy<Value = ControlMode> {
    prop_oneof![
        Just(ControlMode::Teleoperated),
        Just(ControlMode::Autonomous),
        Just(ControlMode::Test),
    ]
}

fn arb_alliance() -> impl Strategy<Value = Alliance> {
    prop_oneof![Just(Alliance::Red), Just(Alliance::Blue)]
}

fn arb_position() -> impl Strategy<Value = Position> {
    prop_oneof![Just(Position::One), Just(Position::Two), Just(Position::Three)]
}

fn arb_intent() -> impl Strategy<Value = ControlIntent> {
    (
        any::<bool>(),
        arb_mode(),
        any::<bool>(),
        any::<bool>(),
        any::<u16>(),
        arb_alliance(),
        arb_position(),
    )
        .prop_map(
            |(enabled, mode, emergency_stopped, fms_attached, team, alliance, position)| {
                ControlIntent {
                    enabled,
                    mode,
                    emergency_stopped,
                    fms_attached,
                    robot_comms: true,
                    team,
                    alliance,
                    position,
                    request: RobotRequest::None,
                    time_sync: None,
                }
            },
        )
}

fn arb_joystick() -> impl Strategy<Value = Joystick> {
    (
        prop::collection::vec(-1.0f32..=1.0, 0..=6),
        prop::collection::vec(prop_oneof![Just(-1i16), 0i16..360], 0..=1),
        prop::collection::vec(any::<bool>(), 0..=10),
    )
        .prop_map(|(axes, hats, buttons)| Joystick {
            axes,
            hats,
            buttons,
        })
}

fn arb_status() -> impl Strategy<Value = StatusPacket> {
    (
        any::<u16>(),
        any::<bool>(),
        0.0f32..13.0,
        prop::option::of(0u8..=100),
        prop::option::of(0u8..=100),
    )
        .prop_map(|(sequence, emergency_stopped, voltage, cpu, can)| StatusPacket {
            sequence,
            emergency_stopped,
            robot_code: true,
            voltage,
            request_time: false,
            cpu_usage: cpu,
            ram_usage: None,
            disk_usage: None,
            can_utilization: can,
        })
}

proptest! {
    /// 控制包往返：模式、使能、急停、站位与摇杆数值
    #[test]
    fn control_packet_roundtrip(
        intent in arb_intent(),
        joysticks in prop::collection::vec(arb_joystick(), 0..=4),
        sequence in any::<u16>(),
    ) {
        for kind in KINDS {
            let protocol = create_protocol(kind);
            let data = protocol.encode_control_packet(&intent, &joysticks, sequence);
            let packet = protocol.decode_control_packet(&data).unwrap();

            prop_assert_eq!(packet.sequence, sequence);
            prop_assert_eq!(packet.emergency_stopped, intent.emergency_stopped);
            prop_assert_eq!(packet.alliance, intent.alliance);
            prop_assert_eq!(packet.position, intent.position);
            if !intent.emergency_stopped {
                // 2014 急停时整个控制码清零，模式与使能不再携带
                prop_assert_eq!(packet.enabled, intent.enabled);
                prop_assert_eq!(packet.mode, intent.mode);
                prop_assert_eq!(packet.fms_attached, intent.fms_attached);
            } else {
                prop_assert!(!packet.enabled);
            }
            if kind == ProtocolKind::Frc2014 {
                prop_assert_eq!(packet.team, Some(intent.team));
            }

            prop_assert!(packet.joysticks.len() >= joysticks.len());
            for (sent, received) in joysticks.iter().zip(&packet.joysticks) {
                for (i, axis) in sent.axes.iter().enumerate() {
                    prop_assert!((received.axes[i] - axis).abs() <= 1.0 / 127.0);
                }
                for (i, pressed) in sent.buttons.iter().enumerate() {
                    prop_assert_eq!(received.buttons[i], *pressed);
                }
                if protocol.limits().max_hats > 0 {
                    prop_assert_eq!(&received.hats, &sent.hats);
                }
            }
        }
    }

    /// 状态包往返
    #[test]
    fn status_packet_roundtrip(status in arb_status()) {
        for kind in KINDS {
            let protocol = create_protocol(kind);
            let data = protocol.encode_status_packet(&status);
            let decoded = protocol.decode_status_packet(&data).unwrap();

            prop_assert_eq!(decoded.sequence, status.sequence);
            prop_assert_eq!(decoded.emergency_stopped, status.emergency_stopped);
            prop_assert!(decoded.robot_code);
            prop_assert!((decoded.voltage - status.voltage).abs() < 0.011);
            if kind != ProtocolKind::Frc2014 {
                prop_assert_eq!(decoded.cpu_usage, status.cpu_usage);
                prop_assert_eq!(decoded.can_utilization, status.can_utilization);
            }
        }
    }

    /// 任意输入不会 panic，错误通过 Result 返回
    #[test]
    fn decode_arbitrary_bytes_never_panics(data in prop::collection::vec(any::<u8>(), 0..1100)) {
        for kind in KINDS {
            let protocol = create_protocol(kind);
            let _ = protocol.decode_status_packet(&data);
            let _ = protocol.decode_control_packet(&data);
        }
    }

    /// 编码是序号与输入的纯函数
    #[test]
    fn encode_is_deterministic(intent in arb_intent(), sequence in any::<u16>()) {
        for kind in KINDS {
            let protocol = create_protocol(kind);
            let joysticks = [Joystick::new(6, 1, 10)];
            prop_assert_eq!(
                protocol.encode_control_packet(&intent, &joysticks, sequence),
                protocol.encode_control_packet(&intent, &joysticks, sequence)
            );
        }
    }
}
