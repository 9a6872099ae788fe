//! Driver Station 配置
//!
//! TOML 格式，所有字段都有默认值，只需写出需要覆盖的部分：
//!
//! ```toml
//! team = 3794
//! protocol = "frc2016"
//! alliance = "blue"
//! position = "2"
//!
//! [network]
//! robot_address = "10.37.94.2"
//!
//! [timing]
//! watchdog_ticks = 25
//! ```

use crate::error::{Result, SdkError};
use ds_driver::{
    DEFAULT_COMMAND_CAPACITY, DEFAULT_EVENT_CAPACITY, DsDriverBuilder, PipelineConfig,
    TransportConfig,
};
use ds_protocol::{Alliance, Position, ProtocolKind};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DsConfig {
    pub team: u16,
    pub protocol: ProtocolKind,
    pub alliance: Alliance,
    pub position: Position,
    pub network: NetworkConfig,
    pub timing: TimingConfig,
    pub queues: QueueConfig,
}

/// 网络配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// 自定义机器人地址（不设置时使用协议默认地址）
    pub robot_address: Option<String>,
    pub bind_ip: IpAddr,
    pub robot_port: Option<u16>,
    pub ds_port: Option<u16>,
    pub netconsole_port: Option<u16>,
    pub netconsole: bool,
}

/// 时序配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// 发包间隔（毫秒，不设置时使用协议默认值）
    pub tick_interval_ms: Option<u64>,
    /// 看门狗阈值（tick 数）
    pub watchdog_ticks: Option<u32>,
    /// 地址解析重试间隔（毫秒）
    pub resolve_retry_ms: u64,
}

/// 队列容量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    pub events: usize,
    pub commands: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            robot_address: None,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            robot_port: None,
            ds_port: None,
            netconsole_port: None,
            netconsole: true,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: None,
            watchdog_ticks: None,
            resolve_retry_ms: 1000,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            events: DEFAULT_EVENT_CAPACITY,
            commands: DEFAULT_COMMAND_CAPACITY,
        }
    }
}

impl DsConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: DsConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SdkError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml_string()?).map_err(|source| SdkError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.timing.tick_interval_ms == Some(0) {
            return Err(SdkError::InvalidConfig(
                "timing.tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.timing.watchdog_ticks == Some(0) {
            return Err(SdkError::InvalidConfig(
                "timing.watchdog_ticks must be positive".to_string(),
            ));
        }
        if self.queues.events == 0 || self.queues.commands == 0 {
            return Err(SdkError::InvalidConfig(
                "queue capacities must be at least 1".to_string(),
            ));
        }
        if let Some(address) = &self.network.robot_address
            && address.trim().is_empty()
        {
            return Err(SdkError::InvalidConfig(
                "network.robot_address must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            tick_interval: self.timing.tick_interval_ms.map(Duration::from_millis),
            watchdog_threshold: self.timing.watchdog_ticks,
            resolve_retry: Duration::from_millis(self.timing.resolve_retry_ms),
            transport: TransportConfig {
                bind_ip: self.network.bind_ip,
                robot_port: self.network.robot_port,
                ds_port: self.network.ds_port,
                netconsole_port: self.network.netconsole_port,
                netconsole: self.network.netconsole,
            },
            ..Default::default()
        }
    }

    /// 转换为驱动 Builder
    pub fn driver_builder(&self) -> DsDriverBuilder {
        let mut builder = DsDriverBuilder::new()
            .protocol(self.protocol)
            .team_number(self.team)
            .alliance(self.alliance)
            .position(self.position)
            .pipeline_config(self.pipeline_config())
            .event_capacity(self.queues.events)
            .command_capacity(self.queues.commands);
        if let Some(address) = &self.network.robot_address {
            builder = builder.custom_robot_address(address.clone());
        }
        builder
    }
}
