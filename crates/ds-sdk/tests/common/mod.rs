//! 回环测试用的模拟机器人
//!
//! 在 127.0.0.1 上监听控制包，用机器人侧编解码函数解码，
//! 并在 `responding` 为真时回复状态包。

#![allow(dead_code)]

use ds_sdk::protocol::{ControlPacket, Protocol, ProtocolKind, StatusPacket, create_protocol};
use ds_sdk::{DriverStation, DriverStationBuilder};
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub struct FakeRobot {
    addr: SocketAddr,
    responding: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    status: Arc<Mutex<StatusPacket>>,
    last_control: Arc<Mutex<Option<ControlPacket>>>,
    received: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl FakeRobot {
    pub fn spawn(kind: ProtocolKind) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(5)))
            .unwrap();
        let addr = socket.local_addr().unwrap();

        let responding = Arc::new(AtomicBool::new(true));
        let running = Arc::new(AtomicBool::new(true));
        let status = Arc::new(Mutex::new(StatusPacket {
            robot_code: true,
            voltage: 12.3,
            ..Default::default()
        }));
        let last_control = Arc::new(Mutex::new(None));
        let received = Arc::new(AtomicU64::new(0));

        let handle = {
            let responding = responding.clone();
            let running = running.clone();
            let status = status.clone();
            let last_control = last_control.clone();
            let received = received.clone();
            std::thread::spawn(move || {
                let protocol = create_protocol(kind);
                let mut buf = [0u8; 2048];
                while running.load(Ordering::Acquire) {
                    let Ok((len, from)) = socket.recv_from(&mut buf) else {
                        continue;
                    };
                    let Ok(control) = protocol.decode_control_packet(&buf[..len]) else {
                        continue;
                    };
                    received.fetch_add(1, Ordering::Release);
                    let sequence = control.sequence;
                    *last_control.lock().unwrap() = Some(control);

                    if responding.load(Ordering::Acquire) {
                        let mut reply = status.lock().unwrap().clone();
                        reply.sequence = sequence;
                        let _ = socket.send_to(&protocol.encode_status_packet(&reply), from);
                    }
                }
            })
        };

        Self {
            addr,
            responding,
            running,
            status,
            last_control,
            received,
            handle: Some(handle),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// 停止 / 恢复回复状态包（模拟断线）
    pub fn set_responding(&self, responding: bool) {
        self.responding.store(responding, Ordering::Release);
    }

    pub fn set_status(&self, status: StatusPacket) {
        *self.status.lock().unwrap() = status;
    }

    pub fn last_control(&self) -> Option<ControlPacket> {
        self.last_control.lock().unwrap().clone()
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    /// 指向本机器人的 Builder（5ms 周期，不监听 NetConsole）
    pub fn builder(&self, kind: ProtocolKind) -> DriverStationBuilder {
        DriverStation::builder()
            .protocol(kind)
            .robot_address("127.0.0.1")
            .robot_port(self.port())
            .ds_port(0)
            .netconsole(false)
            .tick_interval(Duration::from_millis(5))
    }
}

impl Drop for FakeRobot {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}
