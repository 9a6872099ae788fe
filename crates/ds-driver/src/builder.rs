//! Builder 模式实现
//!
//! 提供链式构造 `DsDriver` 实例的便捷方式。

use crate::command::DEFAULT_COMMAND_CAPACITY;
use crate::driver::DsDriver;
use crate::error::DriverError;
use crate::events::{DEFAULT_EVENT_CAPACITY, EventQueue};
use crate::manager::ProtocolManager;
use crate::pipeline::PipelineConfig;
use crate::transport::{Transport, TransportConfig, UdpTransport};
use ds_protocol::{Alliance, Position, ProtocolKind};
use std::sync::Arc;
use std::time::Duration;

/// DsDriver Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use ds_driver::DsDriverBuilder;
/// use ds_protocol::ProtocolKind;
///
/// let driver = DsDriverBuilder::new()
///     .protocol(ProtocolKind::Frc2016)
///     .team_number(3794)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DsDriverBuilder {
    protocol: ProtocolKind,
    team: u16,
    alliance: Alliance,
    position: Position,
    /// 自定义机器人地址（覆盖协议默认地址）
    custom_address: Option<String>,
    pipeline_config: PipelineConfig,
    event_capacity: usize,
    command_capacity: usize,
}

impl Default for DsDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DsDriverBuilder {
    pub fn new() -> Self {
        Self {
            protocol: ProtocolKind::default(),
            team: 0,
            alliance: Alliance::default(),
            position: Position::default(),
            custom_address: None,
            pipeline_config: PipelineConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }

    pub fn protocol(mut self, protocol: ProtocolKind) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn team_number(mut self, team: u16) -> Self {
        self.team = team;
        self
    }

    pub fn alliance(mut self, alliance: Alliance) -> Self {
        self.alliance = alliance;
        self
    }

    pub fn position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn custom_robot_address(mut self, address: impl Into<String>) -> Self {
        self.custom_address = Some(address.into());
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = config;
        self
    }

    /// 覆盖发包间隔
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.pipeline_config.tick_interval = Some(interval);
        self
    }

    /// 覆盖看门狗阈值（tick 数）
    pub fn watchdog_threshold(mut self, ticks: u32) -> Self {
        self.pipeline_config.watchdog_threshold = Some(ticks);
        self
    }

    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.pipeline_config.transport = config;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    /// 使用 UDP 传输层构建
    ///
    /// # 错误
    /// - `DriverError::ResourceExhausted`: 队列容量为 0、socket 绑定失败或线程创建失败
    pub fn build(self) -> Result<DsDriver, DriverError> {
        let manager = self.manager()?;
        let ports = self.pipeline_config.ports_for(&manager);
        let transport = UdpTransport::bind(self.pipeline_config.transport.bind_ip, ports)
            .map_err(|e| {
                DriverError::ResourceExhausted(format!(
                    "cannot bind UDP port {}: {e}",
                    ports.ds_port
                ))
            })?;
        DsDriver::start(
            transport,
            manager,
            self.pipeline_config,
            self.command_capacity,
        )
    }

    /// 使用自定义传输层构建（测试与仿真）
    pub fn build_with_transport<T: Transport + 'static>(
        self,
        transport: T,
    ) -> Result<DsDriver, DriverError> {
        let manager = self.manager()?;
        DsDriver::start(
            transport,
            manager,
            self.pipeline_config,
            self.command_capacity,
        )
    }

    fn manager(&self) -> Result<ProtocolManager, DriverError> {
        let events = EventQueue::new(self.event_capacity).ok_or_else(|| {
            DriverError::ResourceExhausted("event queue capacity must be at least 1".to_string())
        })?;
        let events = Arc::new(events);

        let mut manager = ProtocolManager::new(self.protocol, events.clone());
        manager.set_team_number(self.team);
        manager.set_alliance(self.alliance);
        manager.set_position(self.position);
        manager.set_custom_robot_address(self.custom_address.clone());
        // 初始配置不产生事件
        events.drain();
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let builder = DsDriverBuilder::new()
            .protocol(ProtocolKind::Frc2014)
            .team_number(1234)
            .alliance(Alliance::Blue)
            .position(Position::Two)
            .tick_interval(Duration::from_millis(10))
            .watchdog_threshold(5);

        let manager = builder.manager().unwrap();
        assert_eq!(manager.protocol_kind(), ProtocolKind::Frc2014);
        assert_eq!(manager.applied_robot_address(), "10.12.34.2");
        assert_eq!(manager.alliance(), Alliance::Blue);
        assert!(manager.events().is_empty());
        assert_eq!(
            builder.pipeline_config.tick_interval,
            Some(Duration::from_millis(10))
        );
    }

    #[test]
    fn test_zero_event_capacity_rejected() {
        let err = DsDriverBuilder::new().event_capacity(0).manager().unwrap_err();
        assert!(matches!(err, DriverError::ResourceExhausted(_)));
    }
}
