//! FRC 2015 协议（roboRIO 控制系统）
//!
//! 控制包（DS → 机器人，UDP 1110）：
//!
//! ```text
//! [seq_hi, seq_lo, 0x01, control, request, station] + 时间块 | 摇杆块...
//! ```
//!
//! 状态包（机器人 → DS，UDP 1150）：
//!
//! ```text
//! [seq_hi, seq_lo, 0x01, control, status, volt_int, volt_frac, request] + 扩展块...
//! ```
//!
//! 变长块统一为 `[size, tag, payload...]`，`size` 为 size 字节之后的字节数。

use bilge::prelude::*;
use chrono::{Datelike, NaiveDate, Timelike};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::joystick::{Joystick, axis_to_byte, byte_to_axis, flags_to_buttons};
use crate::protocol::{JoystickLimits, PortConfig, Protocol};
use crate::status::{ControlPacket, StatusPacket, clamp_percent, round_voltage};
use crate::types::{
    Alliance, ControlIntent, ControlMode, Position, ProtocolKind, RobotRequest, TimeSync,
};
use crate::{ProtocolError, bytes_to_i16_be, bytes_to_u16_be, bytes_to_u32_be, ensure_len};

// ============================================================================
// 协议常量
// ============================================================================

pub const TAG_GENERAL: u8 = 0x01;
pub const TAG_JOYSTICK: u8 = 0x0c;
pub const TAG_DATE: u8 = 0x0f;
pub const TAG_TIMEZONE: u8 = 0x10;

pub const REQUEST_UNCONNECTED: u8 = 0x00;
pub const REQUEST_RESTART_CODE: u8 = 0x04;
pub const REQUEST_REBOOT: u8 = 0x08;
pub const REQUEST_NORMAL: u8 = 0x80;

/// 状态字节：用户代码运行中
pub const STATUS_HAS_CODE: u8 = 0x20;
/// 机器人请求字节：需要 DS 发送日期/时间
pub const ROBOT_REQUEST_TIME: u8 = 0x01;

pub const CONTROL_HEADER_LEN: usize = 6;
pub const STATUS_HEADER_LEN: usize = 8;

pub(crate) const LIMITS: JoystickLimits = JoystickLimits {
    max_joysticks: 6,
    max_axes: 6,
    max_buttons: 10,
    max_hats: 1,
};

pub(crate) const PORTS: PortConfig = PortConfig {
    robot_port: 1110,
    ds_port: 1150,
    netconsole_port: Some(6666),
};

// ============================================================================
// 位域与枚举
// ============================================================================

/// 控制字节（控制包与状态包共用）
///
/// - Bit 0: 测试模式
/// - Bit 1: 自动模式（两者都为 0 时为手动模式）
/// - Bit 2: 使能
/// - Bit 3: 已连接 FMS
/// - Bit 4-6: 保留
/// - Bit 7: 急停
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default)]
pub struct ControlByte {
    pub test: bool,
    pub autonomous: bool,
    pub enabled: bool,
    pub fms_attached: bool,
    pub reserved: u3,
    pub emergency_stop: bool,
}

/// 站位编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum StationCode {
    Red1 = 0x00,
    Red2 = 0x01,
    Red3 = 0x02,
    Blue1 = 0x03,
    Blue2 = 0x04,
    Blue3 = 0x05,
}

impl StationCode {
    pub fn new(alliance: Alliance, position: Position) -> Self {
        match (alliance, position) {
            (Alliance::Red, Position::One) => StationCode::Red1,
            (Alliance::Red, Position::Two) => StationCode::Red2,
            (Alliance::Red, Position::Three) => StationCode::Red3,
            (Alliance::Blue, Position::One) => StationCode::Blue1,
            (Alliance::Blue, Position::Two) => StationCode::Blue2,
            (Alliance::Blue, Position::Three) => StationCode::Blue3,
        }
    }

    pub fn alliance(self) -> Alliance {
        match self {
            StationCode::Red1 | StationCode::Red2 | StationCode::Red3 => Alliance::Red,
            _ => Alliance::Blue,
        }
    }

    pub fn position(self) -> Position {
        match self {
            StationCode::Red1 | StationCode::Blue1 => Position::One,
            StationCode::Red2 | StationCode::Blue2 => Position::Two,
            StationCode::Red3 | StationCode::Blue3 => Position::Three,
        }
    }
}

/// 状态包扩展块标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ExtendedTag {
    DiskInfo = 0x04,
    CpuInfo = 0x05,
    RamInfo = 0x06,
    CanInfo = 0x0e,
}

// ============================================================================
// 协议实现
// ============================================================================

/// FRC 2015 协议
#[derive(Debug, Clone, Copy, Default)]
pub struct Frc2015;

impl Protocol for Frc2015 {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Frc2015
    }

    fn limits(&self) -> JoystickLimits {
        LIMITS
    }

    fn ports(&self) -> PortConfig {
        PORTS
    }

    fn robot_address(&self, team: u16) -> String {
        format!("roboRIO-{}.local", team)
    }

    fn encode_control_packet(
        &self,
        intent: &ControlIntent,
        joysticks: &[Joystick],
        sequence: u16,
    ) -> Vec<u8> {
        encode_control(intent, joysticks, sequence, &LIMITS)
    }

    fn decode_status_packet(&self, data: &[u8]) -> Result<StatusPacket, ProtocolError> {
        decode_status(data)
    }

    fn decode_control_packet(&self, data: &[u8]) -> Result<ControlPacket, ProtocolError> {
        decode_control(data)
    }

    fn encode_status_packet(&self, status: &StatusPacket) -> Vec<u8> {
        encode_status(status)
    }
}

// ============================================================================
// DS 侧编码
// ============================================================================

pub(crate) fn control_code(intent: &ControlIntent) -> u8 {
    let mut code = ControlByte::from(u8::new(0));
    match intent.mode {
        ControlMode::Test => code.set_test(true),
        ControlMode::Autonomous => code.set_autonomous(true),
        ControlMode::Teleoperated => {},
    }
    code.set_fms_attached(intent.fms_attached);
    code.set_emergency_stop(intent.emergency_stopped);
    code.set_enabled(intent.enabled && !intent.emergency_stopped);
    u8::from(code).value()
}

pub(crate) fn request_code(intent: &ControlIntent) -> u8 {
    if !intent.robot_comms {
        // 未连接时发送 unconnected，触发机器人重同步
        return REQUEST_UNCONNECTED;
    }
    match intent.request {
        RobotRequest::None => REQUEST_NORMAL,
        RobotRequest::Reboot => REQUEST_REBOOT,
        RobotRequest::RestartCode => REQUEST_RESTART_CODE,
    }
}

pub(crate) fn encode_control(
    intent: &ControlIntent,
    joysticks: &[Joystick],
    sequence: u16,
    limits: &JoystickLimits,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(CONTROL_HEADER_LEN + 16 * joysticks.len());
    data.extend_from_slice(&sequence.to_be_bytes());
    data.push(TAG_GENERAL);
    data.push(control_code(intent));
    data.push(request_code(intent));
    data.push(StationCode::new(intent.alliance, intent.position).into());

    // 机器人请求时间时只发送时间块，否则发送摇杆块
    if let Some(time) = &intent.time_sync {
        append_time_data(&mut data, time);
    } else {
        for joystick in joysticks.iter().take(limits.max_joysticks) {
            append_joystick(&mut data, joystick, limits);
        }
    }

    data
}

fn append_joystick(data: &mut Vec<u8>, joystick: &Joystick, limits: &JoystickLimits) {
    let axes = &joystick.axes[..joystick.num_axes().min(limits.max_axes)];
    let hats = &joystick.hats[..joystick.num_hats().min(limits.max_hats)];
    let buttons = joystick.num_buttons().min(limits.max_buttons);

    // tag + 轴数 + 轴 + 按钮数 + 按钮位(2) + 帽子数 + 帽子(2 each)
    let size = 1 + 1 + axes.len() + 1 + 2 + 1 + hats.len() * 2;
    data.push(size as u8);
    data.push(TAG_JOYSTICK);

    data.push(axes.len() as u8);
    data.extend(axes.iter().map(|axis| axis_to_byte(*axis)));

    let mut flags = joystick.button_flags();
    if buttons < 16 {
        flags &= (1u16 << buttons) - 1;
    }
    data.push(buttons as u8);
    data.extend_from_slice(&flags.to_be_bytes());

    data.push(hats.len() as u8);
    for hat in hats {
        data.extend_from_slice(&hat.to_be_bytes());
    }
}

fn append_time_data(data: &mut Vec<u8>, time: &TimeSync) {
    let dt = &time.datetime;
    let millis = dt.nanosecond() / 1_000_000;

    data.push(0x0b);
    data.push(TAG_DATE);
    data.extend_from_slice(&millis.to_be_bytes());
    data.push(dt.second() as u8);
    data.push(dt.minute() as u8);
    data.push(dt.hour() as u8);
    data.push(dt.day() as u8);
    data.push(dt.month0() as u8);
    data.push((dt.year() - 1900).clamp(0, 255) as u8);

    let tz = time.timezone.as_bytes();
    let tz = &tz[..tz.len().min(254)];
    data.push((tz.len() + 1) as u8);
    data.push(TAG_TIMEZONE);
    data.extend_from_slice(tz);
}

// ============================================================================
// DS 侧解码
// ============================================================================

pub(crate) fn decode_voltage(upper: u8, lower: u8) -> f32 {
    round_voltage(upper as f32 + lower as f32 / 255.0)
}

pub(crate) fn encode_voltage(voltage: f32) -> (u8, u8) {
    let voltage = if voltage.is_nan() {
        0.0
    } else {
        voltage.clamp(0.0, 255.0)
    };
    let upper = voltage.trunc();
    let lower = ((voltage - upper) * 255.0).round().min(255.0);
    (upper as u8, lower as u8)
}

pub(crate) fn decode_status(data: &[u8]) -> Result<StatusPacket, ProtocolError> {
    ensure_len(data, STATUS_HEADER_LEN)?;

    if data[2] != TAG_GENERAL {
        return Err(ProtocolError::UnexpectedTag {
            tag: data[2],
            offset: 2,
        });
    }

    let control = ControlByte::from(u8::new(data[3]));
    let mut packet = StatusPacket {
        sequence: bytes_to_u16_be([data[0], data[1]]),
        emergency_stopped: control.emergency_stop(),
        robot_code: data[4] & STATUS_HAS_CODE != 0,
        voltage: decode_voltage(data[5], data[6]),
        request_time: data[7] == ROBOT_REQUEST_TIME,
        ..Default::default()
    };

    for block in Blocks::new(data, STATUS_HEADER_LEN) {
        let (offset, tag, payload) = block?;
        let Ok(tag) = ExtendedTag::try_from(tag) else {
            // 未知扩展块直接跳过
            continue;
        };
        let value = payload.first().copied().map(clamp_percent).ok_or(
            ProtocolError::InvalidLength {
                expected: offset + 3,
                actual: offset + 2,
            },
        )?;
        match tag {
            ExtendedTag::CanInfo => packet.can_utilization = Some(value),
            ExtendedTag::CpuInfo => packet.cpu_usage = Some(value),
            ExtendedTag::RamInfo => packet.ram_usage = Some(value),
            ExtendedTag::DiskInfo => packet.disk_usage = Some(value),
        }
    }

    Ok(packet)
}

/// `[size, tag, payload...]` 块迭代器
struct Blocks<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Blocks<'a> {
    fn new(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            offset,
            failed: false,
        }
    }
}

impl<'a> Iterator for Blocks<'a> {
    /// (块起始偏移, 标签, 负载)
    type Item = Result<(usize, u8, &'a [u8]), ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        let start = self.offset;
        let size = self.data[start] as usize;
        let end = start + 1 + size;
        if size == 0 {
            self.failed = true;
            return Some(Err(ProtocolError::InvalidValue {
                field: "block size".to_string(),
                value: 0,
            }));
        }
        if end > self.data.len() {
            self.failed = true;
            return Some(Err(ProtocolError::InvalidLength {
                expected: end,
                actual: self.data.len(),
            }));
        }

        self.offset = end;
        Some(Ok((start, self.data[start + 1], &self.data[start + 2..end])))
    }
}

// ============================================================================
// 机器人侧编解码
// ============================================================================

pub(crate) fn encode_status(status: &StatusPacket) -> Vec<u8> {
    let mut control = ControlByte::from(u8::new(0));
    control.set_emergency_stop(status.emergency_stopped);
    let (upper, lower) = encode_voltage(status.voltage);

    let mut data = Vec::with_capacity(STATUS_HEADER_LEN + 12);
    data.extend_from_slice(&status.sequence.to_be_bytes());
    data.push(TAG_GENERAL);
    data.push(u8::from(control).value());
    data.push(if status.robot_code { STATUS_HAS_CODE } else { 0 });
    data.push(upper);
    data.push(lower);
    data.push(if status.request_time {
        ROBOT_REQUEST_TIME
    } else {
        0
    });

    let extended = [
        (ExtendedTag::DiskInfo, status.disk_usage),
        (ExtendedTag::CpuInfo, status.cpu_usage),
        (ExtendedTag::RamInfo, status.ram_usage),
        (ExtendedTag::CanInfo, status.can_utilization),
    ];
    for (tag, value) in extended {
        if let Some(value) = value {
            data.extend_from_slice(&[0x02, tag.into(), value]);
        }
    }

    data
}

pub(crate) fn decode_control(data: &[u8]) -> Result<ControlPacket, ProtocolError> {
    ensure_len(data, CONTROL_HEADER_LEN)?;

    if data[2] != TAG_GENERAL {
        return Err(ProtocolError::UnexpectedTag {
            tag: data[2],
            offset: 2,
        });
    }

    let control = ControlByte::from(u8::new(data[3]));
    let mode = if control.test() {
        ControlMode::Test
    } else if control.autonomous() {
        ControlMode::Autonomous
    } else {
        ControlMode::Teleoperated
    };
    let request = match data[4] {
        REQUEST_REBOOT => RobotRequest::Reboot,
        REQUEST_RESTART_CODE => RobotRequest::RestartCode,
        _ => RobotRequest::None,
    };
    let station = StationCode::try_from(data[5]).map_err(|_| ProtocolError::InvalidValue {
        field: "StationCode".to_string(),
        value: data[5],
    })?;

    let mut packet = ControlPacket {
        sequence: bytes_to_u16_be([data[0], data[1]]),
        enabled: control.enabled(),
        mode,
        emergency_stopped: control.emergency_stop(),
        fms_attached: control.fms_attached(),
        team: None,
        alliance: station.alliance(),
        position: station.position(),
        request,
        joysticks: Vec::new(),
        time_sync: None,
    };

    let mut date = None;
    let mut timezone = String::new();
    for block in Blocks::new(data, CONTROL_HEADER_LEN) {
        let (offset, tag, payload) = block?;
        match tag {
            TAG_JOYSTICK => packet.joysticks.push(parse_joystick(payload, offset)?),
            TAG_DATE => date = Some(parse_date(payload, offset)?),
            TAG_TIMEZONE => timezone = String::from_utf8_lossy(payload).into_owned(),
            _ => return Err(ProtocolError::UnexpectedTag { tag, offset }),
        }
    }

    packet.time_sync = date.map(|datetime| TimeSync { datetime, timezone });
    Ok(packet)
}

/// 顺序读取块负载
struct PayloadReader<'a> {
    payload: &'a [u8],
    cursor: usize,
    base: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(payload: &'a [u8], block_offset: usize) -> Self {
        Self {
            payload,
            cursor: 0,
            base: block_offset + 2,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.cursor + len;
        if end > self.payload.len() {
            return Err(ProtocolError::InvalidLength {
                expected: self.base + end,
                actual: self.base + self.payload.len(),
            });
        }
        let bytes = &self.payload[self.cursor..end];
        self.cursor = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }
}

fn parse_joystick(payload: &[u8], offset: usize) -> Result<Joystick, ProtocolError> {
    let mut reader = PayloadReader::new(payload, offset);

    let num_axes = reader.u8()? as usize;
    let axes = reader.take(num_axes)?.iter().map(|b| byte_to_axis(*b)).collect();

    let num_buttons = reader.u8()? as usize;
    let flags = reader.take(2)?;
    let buttons = flags_to_buttons(bytes_to_u16_be([flags[0], flags[1]]), num_buttons);

    let num_hats = reader.u8()? as usize;
    let hats = reader
        .take(num_hats * 2)?
        .chunks_exact(2)
        .map(|chunk| bytes_to_i16_be([chunk[0], chunk[1]]))
        .collect();

    Ok(Joystick {
        axes,
        hats,
        buttons,
    })
}

fn parse_date(payload: &[u8], offset: usize) -> Result<chrono::NaiveDateTime, ProtocolError> {
    let mut reader = PayloadReader::new(payload, offset);
    let ms = reader.take(4)?;
    let millis = bytes_to_u32_be([ms[0], ms[1], ms[2], ms[3]]);
    let fields = reader.take(6)?;
    let (sec, min, hour, day, month0, year) = (
        fields[0], fields[1], fields[2], fields[3], fields[4], fields[5],
    );

    NaiveDate::from_ymd_opt(1900 + year as i32, month0 as u32 + 1, day as u32)
        .and_then(|date| date.and_hms_milli_opt(hour as u32, min as u32, sec as u32, millis))
        .ok_or(ProtocolError::InvalidValue {
            field: "date".to_string(),
            value: day,
        })
}
