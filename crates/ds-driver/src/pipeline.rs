//! Pipeline IO 循环模块
//!
//! IO 线程独占 `ProtocolManager`、传输层与看门狗。每个 tick：
//!
//! 1. 应用命令队列中的命令
//! 2. 地址已解析时发送一个控制包（无论是否已连接）
//! 3. 非阻塞读取所有待处理的状态包
//! 4. 读取 NetConsole 日志
//! 5. 看门狗计数
//! 6. 发布状态快照
//!
//! 两个 tick 之间阻塞等待命令（截止到下一个 tick 前），命令到达后立即应用并发布快照。

use crate::command::DsCommand;
use crate::manager::ProtocolManager;
use crate::metrics::DriverMetrics;
use crate::resolver::{DEFAULT_RESOLVE_RETRY, Resolver};
use crate::state::DsContext;
use crate::transport::{MAX_DATAGRAM_LEN, Transport, TransportConfig, split_log_lines};
use crate::watchdog::Watchdog;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use ds_protocol::PortConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// 每个 tick 最多读取的数据报数
const MAX_DATAGRAMS_PER_TICK: usize = 64;

/// tick 截止前改用 spin_sleep 的时间
const SPIN_MARGIN: Duration = Duration::from_millis(1);

/// 连续 socket 错误时每隔多少次输出一次 warn
const SOCKET_ERROR_LOG_EVERY: u32 = 250;

/// Pipeline 配置
///
/// # Example
///
/// ```
/// use ds_driver::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig {
///     tick_interval: Some(Duration::from_millis(10)),
///     ..Default::default()
/// };
/// assert_eq!(config.max_commands_per_tick, 64);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// 发包间隔（`None` 使用协议默认值）
    pub tick_interval: Option<Duration>,
    /// 看门狗阈值（tick 数，`None` 由协议超时时间换算）
    pub watchdog_threshold: Option<u32>,
    /// 单次最多应用的命令数
    pub max_commands_per_tick: usize,
    /// 地址解析失败后的重试间隔
    pub resolve_retry: Duration,
    pub transport: TransportConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick_interval: None,
            watchdog_threshold: None,
            max_commands_per_tick: 64,
            resolve_retry: DEFAULT_RESOLVE_RETRY,
            transport: TransportConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn interval_for(&self, manager: &ProtocolManager) -> Duration {
        self.tick_interval
            .unwrap_or_else(|| manager.protocol().packet_interval())
    }

    pub fn watchdog_for(&self, manager: &ProtocolManager) -> Watchdog {
        match self.watchdog_threshold {
            Some(threshold) => Watchdog::new(threshold),
            None => Watchdog::from_timeout(
                self.interval_for(manager),
                manager.protocol().watchdog_timeout(),
            ),
        }
    }

    pub fn ports_for(&self, manager: &ProtocolManager) -> PortConfig {
        self.transport.apply(manager.protocol().ports())
    }
}

/// IO 线程循环
///
/// # 参数
/// - `transport`: 传输层（IO 线程独占）
/// - `manager`: 协议管理器
/// - `resolver`: 地址解析线程句柄
/// - `cmd_rx`: 命令接收通道（发送端全部 drop 后循环退出）
/// - `ctx`: 共享状态上下文
/// - `is_running`: 运行标志
/// - `config`: Pipeline 配置
pub fn io_loop<T: Transport>(
    transport: T,
    manager: ProtocolManager,
    resolver: Resolver,
    cmd_rx: Receiver<DsCommand>,
    ctx: Arc<DsContext>,
    is_running: Arc<AtomicBool>,
    config: PipelineConfig,
) {
    let mut io = IoLoop::new(transport, manager, resolver, ctx, config);
    io.run(&cmd_rx, &is_running);
    io.shutdown();
}

struct IoLoop<T: Transport> {
    transport: T,
    manager: ProtocolManager,
    resolver: Resolver,
    watchdog: Watchdog,
    ports: PortConfig,
    interval: Duration,
    ctx: Arc<DsContext>,
    config: PipelineConfig,
    socket_errors: u32,
    buf: Vec<u8>,
}

impl<T: Transport> IoLoop<T> {
    fn new(
        transport: T,
        manager: ProtocolManager,
        mut resolver: Resolver,
        ctx: Arc<DsContext>,
        config: PipelineConfig,
    ) -> Self {
        resolver.request(&manager.applied_robot_address());
        Self {
            watchdog: config.watchdog_for(&manager),
            ports: config.ports_for(&manager),
            interval: config.interval_for(&manager),
            transport,
            manager,
            resolver,
            ctx,
            config,
            socket_errors: 0,
            buf: vec![0u8; MAX_DATAGRAM_LEN],
        }
    }

    fn run(&mut self, cmd_rx: &Receiver<DsCommand>, is_running: &AtomicBool) {
        info!(
            "IO loop started: {} protocol, {:?} interval, watchdog {} ticks",
            self.manager.protocol_kind(),
            self.interval,
            self.watchdog.threshold()
        );
        let mut next_tick = Instant::now();

        while is_running.load(Ordering::Acquire) {
            // ============================================================
            // 1. 应用积压的命令
            // ============================================================
            if self.drain_commands(cmd_rx, None) {
                break;
            }

            // ============================================================
            // 2-5. 收发与看门狗
            // ============================================================
            self.tick();
            self.publish(0);

            // ============================================================
            // 6. 等待下一个 tick：期间到达的命令立即应用
            // ============================================================
            next_tick += self.interval;
            let now = Instant::now();
            if next_tick <= now {
                DriverMetrics::inc(&self.ctx.metrics.tick_overruns);
                trace!("Tick overrun by {:?}", now - next_tick);
                next_tick = now;
                continue;
            }
            if let Some(deadline) = next_tick.checked_sub(SPIN_MARGIN)
                && deadline > now
                && self.wait_commands(cmd_rx, deadline, is_running)
            {
                break;
            }
            let now = Instant::now();
            if next_tick > now {
                spin_sleep::sleep(next_tick - now);
            }
        }
    }

    /// 阻塞等待命令直到 `deadline`
    ///
    /// 返回 `true` 表示命令通道已断开。
    fn wait_commands(
        &mut self,
        cmd_rx: &Receiver<DsCommand>,
        deadline: Instant,
        is_running: &AtomicBool,
    ) -> bool {
        while is_running.load(Ordering::Acquire) {
            match cmd_rx.recv_deadline(deadline) {
                Ok(command) => {
                    if self.drain_commands(cmd_rx, Some(command)) {
                        return true;
                    }
                },
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => return true,
            }
        }
        false
    }

    /// 非阻塞应用命令队列中的命令（单次最多 `max_commands_per_tick` 个）
    ///
    /// 返回 `true` 表示命令通道已断开。
    fn drain_commands(&mut self, cmd_rx: &Receiver<DsCommand>, first: Option<DsCommand>) -> bool {
        let mut applied = 0u64;
        let mut disconnected = false;

        if let Some(command) = first {
            self.apply(command);
            applied += 1;
        }
        while applied < self.config.max_commands_per_tick as u64 {
            match cmd_rx.try_recv() {
                Ok(command) => {
                    self.apply(command);
                    applied += 1;
                },
                Err(crossbeam_channel::TryRecvError::Empty) => break,
                Err(crossbeam_channel::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                },
            }
        }

        if applied > 0 {
            self.publish(applied);
        }
        disconnected
    }

    fn apply(&mut self, command: DsCommand) {
        if command.is_joystick_update() {
            trace!("Applying {:?}", command);
        } else {
            debug!("Applying {:?}", command);
        }
        DriverMetrics::inc(&self.ctx.metrics.commands_applied);

        let manager = &mut self.manager;
        match command {
            DsCommand::SetRobotEnabled(enabled) => manager.set_robot_enabled(enabled),
            DsCommand::SetControlMode(mode) => manager.set_control_mode(mode),
            DsCommand::SetEmergencyStopped(stopped) => manager.set_emergency_stopped(stopped),
            DsCommand::SetTeamNumber(team) => {
                manager.set_team_number(team);
                self.resolver.request(&manager.applied_robot_address());
            },
            DsCommand::SetAlliance(alliance) => manager.set_alliance(alliance),
            DsCommand::SetPosition(position) => manager.set_position(position),
            DsCommand::SetCustomRobotAddress(address) => {
                manager.set_custom_robot_address(address);
                self.resolver.request(&manager.applied_robot_address());
            },
            DsCommand::ConfigureProtocol(kind) => match manager.set_protocol(kind) {
                Ok(true) => self.on_protocol_changed(),
                Ok(false) => debug!("Protocol {} already active", kind),
                Err(e) => warn!("{}", e),
            },
            DsCommand::RebootRobot => manager.reboot_robot(),
            DsCommand::RestartRobotCode => manager.restart_robot_code(),
            DsCommand::JoysticksReset => manager.clear_joysticks(),
            DsCommand::JoysticksAdd {
                axes,
                hats,
                buttons,
            } => {
                manager.add_joystick(axes, hats, buttons);
            },
            DsCommand::SetJoystickAxis { index, axis, value } => {
                manager.update_joystick_axis(index, axis, value)
            },
            DsCommand::SetJoystickHat { index, hat, angle } => {
                manager.update_joystick_pov_hat(index, hat, angle)
            },
            DsCommand::SetJoystickButton {
                index,
                button,
                pressed,
            } => manager.update_joystick_button(index, button, pressed),
        }
    }

    fn on_protocol_changed(&mut self) {
        self.interval = self.config.interval_for(&self.manager);
        self.watchdog = self.config.watchdog_for(&self.manager);

        let ports = self.config.ports_for(&self.manager);
        if ports != self.ports {
            self.ports = ports;
            if let Err(e) = self.transport.reconfigure(ports) {
                self.socket_error("rebind", &e);
            }
        }
        self.resolver
            .request(&self.manager.applied_robot_address());
    }

    fn tick(&mut self) {
        // 2. 发送控制包
        if let Some(ip) = self.resolver.resolved() {
            let target = SocketAddr::new(ip, self.ports.robot_port);
            let packet = self.manager.create_control_packet();
            match self.transport.send(&packet, target) {
                Ok(()) => {
                    DriverMetrics::inc(&self.ctx.metrics.packets_sent);
                    self.socket_ok();
                },
                Err(e) => self.socket_error("send", &e),
            }
        }

        // 3. 读取状态包
        let mut received = false;
        for _ in 0..MAX_DATAGRAMS_PER_TICK {
            match self.transport.try_recv(&mut self.buf) {
                Ok(Some((len, source))) => {
                    if self.manager.read_robot_data(&self.buf[..len]) {
                        DriverMetrics::inc(&self.ctx.metrics.packets_received);
                        received = true;
                    } else {
                        DriverMetrics::inc(&self.ctx.metrics.malformed_packets);
                        trace!("Malformed packet from {} ({} bytes)", source, len);
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    self.socket_error("receive", &e);
                    break;
                },
            }
        }

        // 4. NetConsole
        for _ in 0..MAX_DATAGRAMS_PER_TICK {
            match self.transport.try_recv_log(&mut self.buf) {
                Ok(Some(len)) => {
                    for line in split_log_lines(&self.buf[..len]) {
                        DriverMetrics::inc(&self.ctx.metrics.log_lines);
                        self.manager.push_log_line(line);
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    self.socket_error("netconsole receive", &e);
                    break;
                },
            }
        }

        // 5. 看门狗
        if received {
            self.watchdog.feed();
        } else if self.watchdog.tick() {
            DriverMetrics::inc(&self.ctx.metrics.watchdog_expirations);
            debug!(
                "Watchdog expired after {} missed ticks",
                self.watchdog.misses()
            );
            self.manager.watchdog_expired();
            // 机器人可能重启后获得新地址
            self.resolver.refresh();
        }
    }

    fn publish(&self, applied: u64) {
        let mut snapshot = self.manager.snapshot();
        snapshot.resolved_robot_ip = self.resolver.resolved();
        self.ctx.publish_applied(snapshot, applied);
    }

    fn socket_ok(&mut self) {
        if self.socket_errors > 0 {
            info!("Socket recovered after {} errors", self.socket_errors);
            self.socket_errors = 0;
        }
    }

    fn socket_error(&mut self, op: &str, e: &std::io::Error) {
        DriverMetrics::inc(&self.ctx.metrics.socket_errors);
        self.socket_errors = self.socket_errors.saturating_add(1);
        if self.socket_errors == 1 || self.socket_errors % SOCKET_ERROR_LOG_EVERY == 0 {
            warn!(
                "Socket {} failed ({} consecutive errors): {}, retrying",
                op, self.socket_errors, e
            );
        } else {
            debug!("Socket {} failed: {}", op, e);
        }
    }

    fn shutdown(&mut self) {
        self.resolver.shutdown(Duration::from_millis(500));
        debug!(
            "IO loop exited after {} packets sent",
            self.manager.session().sent_packets()
        );
    }
}
