//! Driver Station 驱动句柄（对外 API）
//!
//! 应用线程通过命令通道修改意图、通过事件队列接收变化、通过快照读取状态；
//! IO 线程是 `ProtocolManager` 与 socket 的唯一所有者。

use crate::builder::DsDriverBuilder;
use crate::command::DsCommand;
use crate::error::DriverError;
use crate::events::{DsEvent, EventQueue};
use crate::manager::ProtocolManager;
use crate::metrics::MetricsSnapshot;
use crate::pipeline::{PipelineConfig, io_loop};
use crate::resolver::Resolver;
use crate::state::{DsContext, DsSnapshot};
use crate::thread::JoinTimeout;
use crate::transport::Transport;
use crossbeam_channel::{Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// 关闭时等待线程退出的最长时间
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct DsDriver {
    /// 命令发送通道
    ///
    /// Drop 时必须先于 join IO 线程关闭，否则 IO 线程收不到 `Disconnected`。
    cmd_tx: Option<Sender<DsCommand>>,
    command_capacity: usize,
    /// 已成功入队的命令数（与 `DsContext::applied_commands` 比较实现 flush）
    submitted: AtomicU64,
    ctx: Arc<DsContext>,
    io_thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
}

impl DsDriver {
    pub fn builder() -> DsDriverBuilder {
        DsDriverBuilder::new()
    }

    /// 启动 IO 线程（由 Builder 调用）
    pub(crate) fn start<T: Transport + 'static>(
        transport: T,
        manager: ProtocolManager,
        config: PipelineConfig,
        command_capacity: usize,
    ) -> Result<Self, DriverError> {
        if command_capacity == 0 {
            return Err(DriverError::ResourceExhausted(
                "command queue capacity must be at least 1".to_string(),
            ));
        }
        let resolver = Resolver::spawn(config.resolve_retry).map_err(|e| {
            DriverError::ResourceExhausted(format!("cannot spawn resolver thread: {e}"))
        })?;

        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(command_capacity);
        let events: Arc<EventQueue> = manager.events().clone();
        let ctx = Arc::new(DsContext::new(events, manager.snapshot()));
        let is_running = Arc::new(AtomicBool::new(true));

        let ctx_clone = ctx.clone();
        let running_clone = is_running.clone();
        let io_thread = std::thread::Builder::new()
            .name("ds-io".into())
            .spawn(move || {
                io_loop(
                    transport,
                    manager,
                    resolver,
                    cmd_rx,
                    ctx_clone,
                    running_clone,
                    config,
                );
            })
            .map_err(|e| DriverError::ResourceExhausted(format!("cannot spawn IO thread: {e}")))?;

        info!("Driver Station started");
        Ok(Self {
            cmd_tx: Some(cmd_tx),
            command_capacity,
            submitted: AtomicU64::new(0),
            ctx,
            io_thread: Some(io_thread),
            is_running,
        })
    }

    /// 发送命令（非阻塞）
    ///
    /// # 错误
    /// - `DriverError::ChannelFull`: 命令队列已满
    /// - `DriverError::ChannelClosed`: IO 线程已退出
    pub fn send_command(&self, command: DsCommand) -> Result<(), DriverError> {
        let cmd_tx = self.cmd_tx.as_ref().ok_or(DriverError::ChannelClosed)?;
        match cmd_tx.try_send(command) {
            Ok(()) => {
                self.submitted.fetch_add(1, Ordering::AcqRel);
                Ok(())
            },
            Err(TrySendError::Full(_)) => Err(DriverError::ChannelFull(self.command_capacity)),
            Err(TrySendError::Disconnected(_)) => Err(DriverError::ChannelClosed),
        }
    }

    /// 取出一个事件
    pub fn poll_event(&self) -> Option<DsEvent> {
        self.ctx.events.poll()
    }

    pub fn events(&self) -> &EventQueue {
        &self.ctx.events
    }

    /// 最新状态快照（不等待未应用的命令）
    pub fn snapshot(&self) -> Arc<DsSnapshot> {
        self.ctx.load()
    }

    /// 等待所有已入队的命令被 IO 线程应用
    pub fn flush(&self, timeout: Duration) -> Result<(), DriverError> {
        let target = self.submitted.load(Ordering::Acquire);
        let start = Instant::now();
        loop {
            if self.ctx.applied_commands() >= target {
                return Ok(());
            }
            if !self.is_io_alive() {
                return Err(DriverError::ChannelClosed);
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout(timeout));
            }
            std::thread::sleep(Duration::from_micros(200));
        }
    }

    /// 应用完已入队命令后的快照（超时时返回当前快照）
    pub fn synced_snapshot(&self, timeout: Duration) -> Arc<DsSnapshot> {
        if let Err(e) = self.flush(timeout) {
            debug!("Reading snapshot without flush: {}", e);
        }
        self.snapshot()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn context(&self) -> &Arc<DsContext> {
        &self.ctx
    }

    /// IO 线程是否仍在运行
    pub fn is_io_alive(&self) -> bool {
        self.io_thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 停止 IO 线程并等待其退出
    ///
    /// 幂等：重复调用直接返回 `Ok(())`。
    pub fn shutdown(&mut self) -> Result<(), DriverError> {
        self.is_running.store(false, Ordering::Release);
        self.cmd_tx.take();

        let result = match self.io_thread.take() {
            Some(handle) => handle.join_timeout(JOIN_TIMEOUT).map_err(|_| {
                DriverError::IoThread(format!(
                    "IO thread panicked or failed to shut down within {:?}",
                    JOIN_TIMEOUT
                ))
            }),
            None => return Ok(()),
        };

        self.ctx.events.close();
        info!("Driver Station stopped");
        result
    }
}

impl Drop for DsDriver {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("{}", e);
        }
    }
}

impl std::fmt::Debug for DsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DsDriver")
            .field("running", &self.is_running.load(Ordering::Relaxed))
            .field("submitted", &self.submitted.load(Ordering::Relaxed))
            .field("applied", &self.ctx.applied_commands())
            .finish()
    }
}
