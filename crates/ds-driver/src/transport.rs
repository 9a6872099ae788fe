//! 传输层
//!
//! 对 IO 线程暴露非阻塞的数据报收发接口：
//!
//! - 控制包 / 状态包：DS 端口上的同一个 UDP socket
//! - NetConsole：可选的独立监听 socket，按行拆分为日志事件
//!
//! socket 懒绑定：绑定失败不会终止驱动，下一次收发时重试。

use ds_protocol::PortConfig;
use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use tracing::{debug, info};

/// 单个数据报的最大长度
pub const MAX_DATAGRAM_LEN: usize = 2048;

/// 传输层接口
///
/// 所有接收方法都是非阻塞的：没有数据时返回 `Ok(None)`。
pub trait Transport: Send {
    /// 向机器人发送一个数据报
    fn send(&mut self, data: &[u8], target: SocketAddr) -> io::Result<()>;

    /// 接收一个状态包
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;

    /// 接收一个 NetConsole 数据报（未启用时始终返回 `Ok(None)`）
    fn try_recv_log(&mut self, _buf: &mut [u8]) -> io::Result<Option<usize>> {
        Ok(None)
    }

    /// 协议切换后按新端口重新绑定
    fn reconfigure(&mut self, _ports: PortConfig) -> io::Result<()> {
        Ok(())
    }
}

/// 端口覆盖配置
///
/// 默认使用协议端口；测试与仿真场景可以覆盖为任意端口（`ds_port = 0` 表示由系统分配）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub bind_ip: IpAddr,
    pub robot_port: Option<u16>,
    pub ds_port: Option<u16>,
    pub netconsole_port: Option<u16>,
    /// 是否监听 NetConsole
    pub netconsole: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            robot_port: None,
            ds_port: None,
            netconsole_port: None,
            netconsole: true,
        }
    }
}

impl TransportConfig {
    /// 协议端口与覆盖配置合并
    pub fn apply(&self, ports: PortConfig) -> PortConfig {
        PortConfig {
            robot_port: self.robot_port.unwrap_or(ports.robot_port),
            ds_port: self.ds_port.unwrap_or(ports.ds_port),
            netconsole_port: if self.netconsole {
                self.netconsole_port.or(ports.netconsole_port)
            } else {
                None
            },
        }
    }
}

/// 基于 `std::net::UdpSocket` 的传输层
#[derive(Debug)]
pub struct UdpTransport {
    bind_ip: IpAddr,
    ports: PortConfig,
    socket: Option<UdpSocket>,
    netconsole: Option<UdpSocket>,
}

impl UdpTransport {
    /// 创建传输层（不立即绑定）
    pub fn new(bind_ip: IpAddr, ports: PortConfig) -> Self {
        Self {
            bind_ip,
            ports,
            socket: None,
            netconsole: None,
        }
    }

    /// 创建并立即绑定
    pub fn bind(bind_ip: IpAddr, ports: PortConfig) -> io::Result<Self> {
        let mut transport = Self::new(bind_ip, ports);
        transport.ensure_bound()?;
        transport.ensure_netconsole()?;
        Ok(transport)
    }

    pub fn ports(&self) -> PortConfig {
        self.ports
    }

    /// 控制包 socket 的本地地址（未绑定时为 `None`）
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn netconsole_addr(&self) -> Option<SocketAddr> {
        self.netconsole.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn ensure_bound(&mut self) -> io::Result<&UdpSocket> {
        let socket = match self.socket.take() {
            Some(socket) => socket,
            None => {
                let socket = open_socket(SocketAddr::new(self.bind_ip, self.ports.ds_port))?;
                info!("Control socket bound to {:?}", socket.local_addr().ok());
                socket
            },
        };
        Ok(self.socket.insert(socket))
    }

    fn ensure_netconsole(&mut self) -> io::Result<Option<&UdpSocket>> {
        let Some(port) = self.ports.netconsole_port else {
            return Ok(None);
        };
        let socket = match self.netconsole.take() {
            Some(socket) => socket,
            None => {
                let socket = open_socket(SocketAddr::new(self.bind_ip, port))?;
                info!("NetConsole socket bound to {:?}", socket.local_addr().ok());
                socket
            },
        };
        Ok(Some(self.netconsole.insert(socket)))
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, data: &[u8], target: SocketAddr) -> io::Result<()> {
        let socket = self.ensure_bound()?;
        match socket.send_to(data, target) {
            Ok(_) => Ok(()),
            // 发送缓冲区满：本 tick 丢弃，下个 tick 重发最新状态
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let socket = self.ensure_bound()?;
        nonblocking(socket.recv_from(buf))
    }

    fn try_recv_log(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let Some(socket) = self.ensure_netconsole()? else {
            return Ok(None);
        };
        Ok(nonblocking(socket.recv_from(buf))?.map(|(len, _)| len))
    }

    fn reconfigure(&mut self, ports: PortConfig) -> io::Result<()> {
        if ports.ds_port != self.ports.ds_port {
            self.socket = None;
        }
        if ports.netconsole_port != self.ports.netconsole_port {
            self.netconsole = None;
        }
        debug!("Transport reconfigured: {:?}", ports);
        self.ports = ports;
        self.ensure_bound()?;
        self.ensure_netconsole()?;
        Ok(())
    }
}

fn open_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind(addr)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// 非阻塞接收：WouldBlock 视为无数据
fn nonblocking<T>(result: io::Result<T>) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
        // Windows 上对端不可达时 recv_from 返回 ConnectionReset，不是致命错误
        Err(e) if e.kind() == ErrorKind::ConnectionReset => Ok(None),
        Err(e) => Err(e),
    }
}

/// 将 NetConsole 数据报拆分为日志行（忽略空行，去除行尾 `\r`）
pub fn split_log_lines(data: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(data)
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
