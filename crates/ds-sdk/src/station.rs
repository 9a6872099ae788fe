//! Driver Station 门面
//!
//! 对应用暴露同步 API：写操作以命令形式入队，由 IO 线程应用；
//! 读操作先等待已入队的命令应用完毕，再读取快照（写后读一致）。

use crate::config::DsConfig;
use crate::error::Result;
use ds_driver::{DsCommand, DsDriver, DsEvent, DsSnapshot, MetricsSnapshot, Transport};
use ds_protocol::{Alliance, ControlMode, Joystick, OperatingMode, Position, ProtocolKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 读操作等待命令应用的最长时间
const SYNC_TIMEOUT: Duration = Duration::from_millis(100);

/// Driver Station Builder
///
/// # 示例
///
/// ```rust,no_run
/// use ds_sdk::prelude::*;
///
/// # fn main() -> ds_sdk::Result<()> {
/// let ds = DriverStation::builder()
///     .team_number(3794)
///     .protocol(ProtocolKind::Frc2016)
///     .build()?;
///
/// ds.joysticks_add(6, 1, 10)?;
/// ds.set_joystick_axis(0, 0, 0.5)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DriverStationBuilder {
    config: DsConfig,
}

impl DriverStationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用完整配置（覆盖之前的设置）
    pub fn config(mut self, config: DsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn team_number(mut self, team: u16) -> Self {
        self.config.team = team;
        self
    }

    pub fn protocol(mut self, protocol: ProtocolKind) -> Self {
        self.config.protocol = protocol;
        self
    }

    pub fn alliance(mut self, alliance: Alliance) -> Self {
        self.config.alliance = alliance;
        self
    }

    pub fn position(mut self, position: Position) -> Self {
        self.config.position = position;
        self
    }

    /// 自定义机器人地址（IP 或主机名）
    pub fn robot_address(mut self, address: impl Into<String>) -> Self {
        self.config.network.robot_address = Some(address.into());
        self
    }

    /// 覆盖协议默认端口
    pub fn robot_port(mut self, port: u16) -> Self {
        self.config.network.robot_port = Some(port);
        self
    }

    pub fn ds_port(mut self, port: u16) -> Self {
        self.config.network.ds_port = Some(port);
        self
    }

    /// 是否监听机器人日志（NetConsole）
    pub fn netconsole(mut self, enabled: bool) -> Self {
        self.config.network.netconsole = enabled;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.timing.tick_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn watchdog_ticks(mut self, ticks: u32) -> Self {
        self.config.timing.watchdog_ticks = Some(ticks);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.queues.events = capacity;
        self
    }

    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.config.queues.commands = capacity;
        self
    }

    /// 绑定 UDP socket 并启动 IO 线程
    ///
    /// # 错误
    /// - `SdkError::InvalidConfig`: 配置值无效
    /// - `SdkError::Driver(ResourceExhausted)`: socket 绑定失败、线程创建失败
    pub fn build(self) -> Result<DriverStation> {
        self.config.validate()?;
        let driver = self.config.driver_builder().build()?;
        info!(
            "Driver Station started (team {}, {})",
            self.config.team, self.config.protocol
        );
        Ok(DriverStation { driver })
    }

    /// 使用自定义传输层启动（测试、仿真）
    pub fn build_with_transport<T: Transport + 'static>(
        self,
        transport: T,
    ) -> Result<DriverStation> {
        self.config.validate()?;
        let driver = self.config.driver_builder().build_with_transport(transport)?;
        Ok(DriverStation { driver })
    }
}

impl DsConfig {
    /// 转换为 `DriverStationBuilder`
    pub fn builder(&self) -> DriverStationBuilder {
        DriverStationBuilder::new().config(self.clone())
    }
}

/// Driver Station 句柄
///
/// Drop 时自动停止 IO 线程；需要获取关闭错误时使用 [`close`](Self::close)。
#[derive(Debug)]
pub struct DriverStation {
    driver: DsDriver,
}

impl DriverStation {
    pub fn builder() -> DriverStationBuilder {
        DriverStationBuilder::new()
    }

    /// 按配置初始化
    pub fn init(config: &DsConfig) -> Result<Self> {
        config.builder().build()
    }

    /// 包装已有的驱动句柄
    pub fn from_driver(driver: DsDriver) -> Self {
        Self { driver }
    }

    /// 停止 IO 线程并释放 socket
    pub fn close(mut self) -> Result<()> {
        self.driver.shutdown()?;
        Ok(())
    }

    pub fn driver(&self) -> &DsDriver {
        &self.driver
    }

    // ------------------------------------------------------------------
    // 事件
    // ------------------------------------------------------------------

    /// 取出一个事件（队列为空时返回 `None`）
    pub fn poll_event(&self) -> Option<DsEvent> {
        self.driver.poll_event()
    }

    /// 取出所有已缓冲的事件
    pub fn drain_events(&self) -> Vec<DsEvent> {
        self.driver.events().drain()
    }

    // ------------------------------------------------------------------
    // 控制意图
    // ------------------------------------------------------------------

    /// 自定义机器人地址，`None` 或空字符串恢复协议默认地址
    pub fn set_custom_robot_address(&self, address: Option<&str>) -> Result<()> {
        let address = address
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        self.send(DsCommand::SetCustomRobotAddress(address))
    }

    /// 切换协议（摇杆配置超出新协议容量时由 IO 线程拒绝并记录日志）
    pub fn configure_protocol(&self, protocol: ProtocolKind) -> Result<()> {
        self.send(DsCommand::ConfigureProtocol(protocol))
    }

    /// 请求使能
    ///
    /// 没有通信时请求会被接受但不会生效，通信恢复时被丢弃；急停期间被拒绝。
    pub fn set_robot_enabled(&self, enabled: bool) -> Result<()> {
        self.send(DsCommand::SetRobotEnabled(enabled))
    }

    pub fn set_control_mode(&self, mode: ControlMode) -> Result<()> {
        self.send(DsCommand::SetControlMode(mode))
    }

    pub fn set_emergency_stopped(&self, stopped: bool) -> Result<()> {
        self.send(DsCommand::SetEmergencyStopped(stopped))
    }

    pub fn set_team_number(&self, team: u16) -> Result<()> {
        self.send(DsCommand::SetTeamNumber(team))
    }

    pub fn set_alliance(&self, alliance: Alliance) -> Result<()> {
        self.send(DsCommand::SetAlliance(alliance))
    }

    pub fn set_position(&self, position: Position) -> Result<()> {
        self.send(DsCommand::SetPosition(position))
    }

    pub fn reboot_robot(&self) -> Result<()> {
        self.send(DsCommand::RebootRobot)
    }

    pub fn restart_robot_code(&self) -> Result<()> {
        self.send(DsCommand::RestartRobotCode)
    }

    // ------------------------------------------------------------------
    // 摇杆
    // ------------------------------------------------------------------

    pub fn joysticks_reset(&self) -> Result<()> {
        self.send(DsCommand::JoysticksReset)
    }

    /// 追加一个摇杆（超出协议容量时被忽略并记录日志）
    pub fn joysticks_add(&self, axes: usize, hats: usize, buttons: usize) -> Result<()> {
        self.send(DsCommand::JoysticksAdd {
            axes,
            hats,
            buttons,
        })
    }

    /// 越界索引被忽略并记录日志
    pub fn set_joystick_axis(&self, index: usize, axis: usize, value: f32) -> Result<()> {
        self.send(DsCommand::SetJoystickAxis { index, axis, value })
    }

    pub fn set_joystick_hat(&self, index: usize, hat: usize, angle: i16) -> Result<()> {
        self.send(DsCommand::SetJoystickHat { index, hat, angle })
    }

    pub fn set_joystick_button(&self, index: usize, button: usize, pressed: bool) -> Result<()> {
        self.send(DsCommand::SetJoystickButton {
            index,
            button,
            pressed,
        })
    }

    // ------------------------------------------------------------------
    // 状态读取
    // ------------------------------------------------------------------

    pub fn joystick_count(&self) -> usize {
        self.synced().joystick_count()
    }

    pub fn joystick(&self, index: usize) -> Option<Joystick> {
        self.synced().joysticks.get(index).cloned()
    }

    pub fn robot_communications(&self) -> bool {
        self.synced().robot_comms
    }

    pub fn robot_code(&self) -> bool {
        self.synced().robot_code
    }

    /// 生效的使能状态
    pub fn robot_enabled(&self) -> bool {
        self.synced().robot_enabled
    }

    pub fn emergency_stopped(&self) -> bool {
        self.synced().emergency_stopped
    }

    pub fn robot_voltage(&self) -> f32 {
        self.synced().voltage
    }

    pub fn control_mode(&self) -> ControlMode {
        self.synced().control_mode
    }

    pub fn operating_mode(&self) -> OperatingMode {
        self.synced().operating_mode
    }

    pub fn protocol(&self) -> ProtocolKind {
        self.synced().protocol
    }

    pub fn applied_robot_address(&self) -> String {
        self.synced().applied_robot_address.clone()
    }

    pub fn status_string(&self) -> String {
        self.synced().status_string.clone()
    }

    /// 完整快照（写后读一致）
    pub fn snapshot(&self) -> Arc<DsSnapshot> {
        self.synced()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.driver.metrics()
    }

    /// 等待所有已入队的命令被应用
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.driver.flush(timeout)?;
        Ok(())
    }

    fn send(&self, command: DsCommand) -> Result<()> {
        self.driver.send_command(command)?;
        Ok(())
    }

    fn synced(&self) -> Arc<DsSnapshot> {
        self.driver.synced_snapshot(SYNC_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let builder = DriverStation::builder()
            .team_number(3794)
            .protocol(ProtocolKind::Frc2014)
            .alliance(Alliance::Blue)
            .position(Position::Two)
            .robot_address("127.0.0.1")
            .robot_port(4000)
            .ds_port(0)
            .netconsole(false)
            .tick_interval(Duration::from_millis(10))
            .watchdog_ticks(5);

        let config = &builder.config;
        assert_eq!(config.team, 3794);
        assert_eq!(config.protocol, ProtocolKind::Frc2014);
        assert_eq!(config.alliance, Alliance::Blue);
        assert_eq!(config.position, Position::Two);
        assert_eq!(config.network.robot_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.network.robot_port, Some(4000));
        assert!(!config.network.netconsole);
        assert_eq!(config.timing.tick_interval_ms, Some(10));
        assert_eq!(config.timing.watchdog_ticks, Some(5));
    }

    #[test]
    fn test_config_builder_roundtrip() {
        let config = DsConfig {
            team: 254,
            ..Default::default()
        };
        assert_eq!(config.builder().config, config);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let err = DriverStation::builder().event_capacity(0).build().unwrap_err();
        assert!(matches!(err, crate::SdkError::InvalidConfig(_)));
    }
}
