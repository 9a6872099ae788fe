//! 协议管理器
//!
//! 持有当前协议会话、摇杆注册表与应用的控制意图，负责：
//!
//! - 为每个 tick 生成控制包（使能状态按通信/代码/急停屏蔽）
//! - 解码状态包并与上次观测值比较，仅在变化时投递事件
//! - 看门狗超时后复位会话并强制失能
//! - 运行时切换协议（不兼容时拒绝，保留原协议）
//!
//! 只由 IO 线程访问，不需要内部同步。

use crate::error::DriverError;
use crate::events::{DsEvent, EventQueue};
use crate::joystick::JoystickRegistry;
use crate::state::DsSnapshot;
use ds_protocol::{
    Alliance, ControlIntent, ControlMode, OperatingMode, Position, Protocol, ProtocolKind,
    ProtocolSession, RobotRequest, RobotState, TimeSync,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const STATUS_NO_COMMS: &str = "No Robot Communications";
pub const STATUS_NO_CODE: &str = "No Robot Code";
pub const STATUS_EMERGENCY_STOPPED: &str = "Emergency Stopped";

/// 状态字符串
///
/// 优先级：无通信 > 无代码 > 急停 > "<模式> <Enabled|Disabled>"
pub fn status_string(
    comms: bool,
    code: bool,
    emergency_stopped: bool,
    enabled: bool,
    mode: ControlMode,
) -> String {
    if !comms {
        STATUS_NO_COMMS.to_string()
    } else if !code {
        STATUS_NO_CODE.to_string()
    } else if emergency_stopped {
        STATUS_EMERGENCY_STOPPED.to_string()
    } else {
        format!(
            "{} {}",
            mode.label(),
            if enabled { "Enabled" } else { "Disabled" }
        )
    }
}

/// 上次已投递的观测值（事件边沿检测用）
#[derive(Debug, Clone, PartialEq, Default)]
struct Observed {
    comms: bool,
    code: bool,
    voltage: f32,
    cpu_usage: u8,
    ram_usage: u8,
    disk_usage: u8,
    can_utilization: u8,
    emergency_stopped: bool,
    enabled: bool,
    operating_mode: OperatingMode,
    status: String,
}

#[derive(Debug)]
pub struct ProtocolManager {
    session: ProtocolSession,
    joysticks: JoystickRegistry,
    events: Arc<EventQueue>,

    requested_enabled: bool,
    mode: ControlMode,
    local_emergency_stop: bool,
    team: u16,
    alliance: Alliance,
    position: Position,
    custom_address: Option<String>,
    pending_request: RobotRequest,

    observed: Observed,
}

impl ProtocolManager {
    pub fn new(kind: ProtocolKind, events: Arc<EventQueue>) -> Self {
        let mut manager = Self {
            session: ProtocolSession::new(kind),
            joysticks: JoystickRegistry::new(),
            events,
            requested_enabled: false,
            mode: ControlMode::default(),
            local_emergency_stop: false,
            team: 0,
            alliance: Alliance::default(),
            position: Position::default(),
            custom_address: None,
            pending_request: RobotRequest::None,
            observed: Observed::default(),
        };
        // 初始观测值不产生事件
        manager.observed = manager.observe();
        manager
    }

    // ========================================================================
    // 协议
    // ========================================================================

    /// 切换协议
    ///
    /// - 与当前协议相同：无操作，返回 `Ok(false)`
    /// - 已注册摇杆超出新协议上限：返回 `IncompatibleProtocolSwitch`，原协议不变
    /// - 否则丢弃旧会话（旧协议的状态不会泄漏到新会话），返回 `Ok(true)`
    pub fn set_protocol(&mut self, kind: ProtocolKind) -> Result<bool, DriverError> {
        let from = self.session.kind();
        if kind == from {
            return Ok(false);
        }

        let session = ProtocolSession::new(kind);
        let limits = session.protocol().limits();
        if !self.joysticks.fits(&limits) {
            return Err(DriverError::IncompatibleProtocolSwitch {
                from,
                to: kind,
                reason: format!(
                    "{} joysticks registered, limit is {}",
                    self.joysticks.count(),
                    limits.max_joysticks
                ),
            });
        }

        let truncated = self.joysticks.clamp_to(&limits);
        if truncated > 0 {
            warn!(
                "{} joystick(s) truncated to {} limits ({} axes, {} hats, {} buttons)",
                truncated, kind, limits.max_axes, limits.max_hats, limits.max_buttons
            );
        }
        self.session = session;
        self.requested_enabled = false;
        self.pending_request = RobotRequest::None;
        info!("Protocol switched from {} to {}", from, kind);

        self.events.push(DsEvent::ProtocolChanged(kind));
        self.refresh();
        Ok(true)
    }

    pub fn protocol(&self) -> &dyn Protocol {
        self.session.protocol()
    }

    pub fn protocol_kind(&self) -> ProtocolKind {
        self.session.kind()
    }

    /// 当前协议是否已完成至少一次生命周期步骤
    pub fn is_protocol_valid(&self) -> bool {
        self.session.is_initialized()
    }

    pub fn events(&self) -> &Arc<EventQueue> {
        &self.events
    }

    pub fn session(&self) -> &ProtocolSession {
        &self.session
    }

    pub fn robot_state(&self) -> &RobotState {
        self.session.state()
    }

    // ========================================================================
    // 摇杆
    // ========================================================================

    pub fn joysticks(&self) -> &JoystickRegistry {
        &self.joysticks
    }

    pub fn clear_joysticks(&mut self) {
        if self.joysticks.count() == 0 {
            return;
        }
        self.joysticks.clear();
        self.events.push(DsEvent::JoystickCountChanged(0));
    }

    /// 注册摇杆，返回分配的索引（达到协议上限时返回 `None`）
    pub fn add_joystick(&mut self, axes: usize, hats: usize, buttons: usize) -> Option<usize> {
        let limits = self.session.protocol().limits();
        match self.joysticks.add(axes, hats, buttons, &limits) {
            Some(index) => {
                debug!(
                    "Joystick {} registered ({} axes, {} hats, {} buttons)",
                    index, axes, hats, buttons
                );
                self.events
                    .push(DsEvent::JoystickCountChanged(self.joysticks.count()));
                Some(index)
            },
            None => {
                warn!(
                    "Cannot register joystick: {} protocol supports at most {}",
                    self.session.kind(),
                    limits.max_joysticks
                );
                None
            },
        }
    }

    pub fn update_joystick_axis(&mut self, index: usize, axis: usize, value: f32) {
        if let Err(e) = self.joysticks.set_axis(index, axis, value) {
            warn!("{}, ignored", e);
        }
    }

    pub fn update_joystick_button(&mut self, index: usize, button: usize, pressed: bool) {
        if let Err(e) = self.joysticks.set_button(index, button, pressed) {
            warn!("{}, ignored", e);
        }
    }

    pub fn update_joystick_pov_hat(&mut self, index: usize, hat: usize, angle: i16) {
        if let Err(e) = self.joysticks.set_hat(index, hat, angle) {
            warn!("{}, ignored", e);
        }
    }

    // ========================================================================
    // 控制意图
    // ========================================================================

    /// 请求使能/失能
    ///
    /// 急停期间的使能请求被拒绝；通信中断时请求被接受但被屏蔽，
    /// 且在通信恢复时作废（需要重新使能）。
    pub fn set_robot_enabled(&mut self, enabled: bool) {
        if enabled && self.emergency_stopped() {
            warn!("Enable request rejected: robot is emergency stopped");
            return;
        }
        if enabled && !self.robot_state().comms() {
            info!("Enable request accepted but masked until robot communications are established");
        }
        self.requested_enabled = enabled;
        self.refresh();
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) {
        if self.mode != mode {
            debug!("Control mode set to {}", mode);
        }
        self.mode = mode;
        self.refresh();
    }

    pub fn set_emergency_stopped(&mut self, emergency_stopped: bool) {
        self.local_emergency_stop = emergency_stopped;
        if emergency_stopped {
            warn!("Emergency stop engaged");
            self.requested_enabled = false;
        }
        self.refresh();
    }

    pub fn set_team_number(&mut self, team: u16) {
        if self.team != team {
            info!("Team number set to {}", team);
        }
        self.team = team;
    }

    pub fn set_alliance(&mut self, alliance: Alliance) {
        if self.alliance != alliance {
            self.alliance = alliance;
            self.push_station_changed();
        }
    }

    pub fn set_position(&mut self, position: Position) {
        if self.position != position {
            self.position = position;
            self.push_station_changed();
        }
    }

    /// 设置自定义机器人地址（`None` 或空字符串恢复为协议默认地址）
    pub fn set_custom_robot_address(&mut self, address: Option<String>) {
        self.custom_address = address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
    }

    pub fn reboot_robot(&mut self) {
        info!("Robot reboot requested");
        self.pending_request = RobotRequest::Reboot;
    }

    pub fn restart_robot_code(&mut self) {
        info!("Robot code restart requested");
        self.pending_request = RobotRequest::RestartCode;
    }

    // ========================================================================
    // 派生状态
    // ========================================================================

    pub fn team(&self) -> u16 {
        self.team
    }

    pub fn alliance(&self) -> Alliance {
        self.alliance
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn control_mode(&self) -> ControlMode {
        self.mode
    }

    pub fn enabled_requested(&self) -> bool {
        self.requested_enabled
    }

    pub fn pending_request(&self) -> RobotRequest {
        self.pending_request
    }

    /// 生效的急停状态（本地或机器人上报）
    pub fn emergency_stopped(&self) -> bool {
        self.local_emergency_stop || self.robot_state().emergency_stopped
    }

    /// 生效的使能状态
    pub fn robot_enabled(&self) -> bool {
        let robot = self.robot_state();
        self.requested_enabled && robot.comms() && robot.robot_code && !self.emergency_stopped()
    }

    pub fn operating_mode(&self) -> OperatingMode {
        OperatingMode::derive(self.mode, self.robot_enabled(), self.emergency_stopped())
    }

    pub fn status_string(&self) -> String {
        let robot = self.robot_state();
        status_string(
            robot.comms(),
            robot.robot_code,
            self.emergency_stopped(),
            self.robot_enabled(),
            self.mode,
        )
    }

    /// 当前使用的机器人地址
    pub fn applied_robot_address(&self) -> String {
        match &self.custom_address {
            Some(address) => address.clone(),
            None => self.session.protocol().robot_address(self.team),
        }
    }

    pub fn custom_robot_address(&self) -> Option<&str> {
        self.custom_address.as_deref()
    }

    /// 编码器输入
    pub fn control_intent(&self) -> ControlIntent {
        let robot = self.robot_state();
        ControlIntent {
            enabled: self.robot_enabled(),
            mode: self.mode,
            emergency_stopped: self.emergency_stopped(),
            fms_attached: false,
            robot_comms: robot.comms(),
            team: self.team,
            alliance: self.alliance,
            position: self.position,
            request: self.pending_request,
            time_sync: robot.request_time.then(TimeSync::now),
        }
    }

    // ========================================================================
    // 生命周期
    // ========================================================================

    /// 生成本 tick 的控制包
    pub fn create_control_packet(&mut self) -> Vec<u8> {
        self.session.begin_resolving();
        let intent = self.control_intent();
        self.session.encode(&intent, self.joysticks.joysticks())
    }

    /// 处理收到的状态包
    ///
    /// 解码失败时返回 `false`，已知状态保持不变。
    pub fn read_robot_data(&mut self, data: &[u8]) -> bool {
        let was_connected = self.robot_state().comms();
        let had_code = self.robot_state().robot_code;

        let packet = match self.session.decode(data) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Discarding malformed status packet ({} bytes): {}", data.len(), e);
                return false;
            },
        };

        if !was_connected {
            info!("Robot communications established");
            // 断线期间的使能请求作废
            self.requested_enabled = false;
            self.mode = ControlMode::Teleoperated;
        }
        if had_code && !packet.robot_code {
            warn!("Robot code lost");
            self.requested_enabled = false;
        }
        if packet.emergency_stopped {
            self.requested_enabled = false;
        }

        self.refresh();
        true
    }

    /// 看门狗超时：复位会话、强制失能并清除一次性请求
    pub fn watchdog_expired(&mut self) {
        if self.robot_state().comms() {
            warn!("Robot watchdog expired, communications lost");
        }
        self.session.expire();
        self.requested_enabled = false;
        self.pending_request = RobotRequest::None;
        self.refresh();
    }

    /// 投递机器人日志
    pub fn push_log_line(&self, line: impl Into<String>) {
        self.events.push(DsEvent::LogLine(line.into()));
    }

    pub fn snapshot(&self) -> DsSnapshot {
        let robot = self.robot_state();
        DsSnapshot {
            protocol: self.session.kind(),
            protocol_valid: self.is_protocol_valid(),
            connection: robot.connection,
            robot_comms: robot.comms(),
            robot_code: robot.robot_code,
            robot_enabled: self.robot_enabled(),
            enabled_requested: self.requested_enabled,
            emergency_stopped: self.emergency_stopped(),
            control_mode: self.mode,
            operating_mode: self.operating_mode(),
            voltage: robot.voltage,
            cpu_usage: robot.cpu_usage,
            ram_usage: robot.ram_usage,
            disk_usage: robot.disk_usage,
            can_utilization: robot.can_utilization,
            team: self.team,
            alliance: self.alliance,
            position: self.position,
            joysticks: self.joysticks.joysticks().to_vec(),
            applied_robot_address: self.applied_robot_address(),
            resolved_robot_ip: None,
            status_string: self.status_string(),
        }
    }

    // ========================================================================
    // 事件
    // ========================================================================

    fn observe(&self) -> Observed {
        let robot = self.robot_state();
        Observed {
            comms: robot.comms(),
            code: robot.robot_code,
            voltage: robot.voltage,
            cpu_usage: robot.cpu_usage,
            ram_usage: robot.ram_usage,
            disk_usage: robot.disk_usage,
            can_utilization: robot.can_utilization,
            emergency_stopped: self.emergency_stopped(),
            enabled: self.robot_enabled(),
            operating_mode: self.operating_mode(),
            status: self.status_string(),
        }
    }

    /// 与上次观测值比较并投递变化事件
    fn refresh(&mut self) {
        let now = self.observe();
        let old = &self.observed;
        let events = &self.events;

        if now.comms != old.comms {
            events.push(DsEvent::CommsChanged(now.comms));
        }
        if now.code != old.code {
            events.push(DsEvent::CodeChanged(now.code));
        }
        if now.voltage != old.voltage {
            events.push(DsEvent::VoltageChanged(now.voltage));
        }
        if now.can_utilization != old.can_utilization {
            events.push(DsEvent::CanUtilChanged(now.can_utilization));
        }
        if now.cpu_usage != old.cpu_usage {
            events.push(DsEvent::CpuInfoChanged(now.cpu_usage));
        }
        if now.ram_usage != old.ram_usage {
            events.push(DsEvent::RamInfoChanged(now.ram_usage));
        }
        if now.disk_usage != old.disk_usage {
            events.push(DsEvent::DiskInfoChanged(now.disk_usage));
        }
        if now.emergency_stopped != old.emergency_stopped {
            events.push(DsEvent::EmergencyStopChanged(now.emergency_stopped));
        }
        if now.enabled != old.enabled {
            events.push(DsEvent::EnabledChanged(now.enabled));
        }
        if now.operating_mode != old.operating_mode {
            events.push(DsEvent::ControlModeChanged(now.operating_mode));
        }
        if now.status != old.status {
            events.push(DsEvent::StatusStringChanged(now.status.clone()));
        }

        self.observed = now;
    }

    fn push_station_changed(&self) {
        self.events.push(DsEvent::StationChanged {
            alliance: self.alliance,
            position: self.position,
        });
    }
}
