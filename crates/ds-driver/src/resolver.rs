//! 机器人地址解析线程
//!
//! 主机名解析（DNS / mDNS）可能阻塞数秒，不能放在 IO 线程的 tick 中。
//! 解析线程接收目标主机名，解析成功后发布 IP；失败时按固定间隔重试，
//! 直到收到新的目标或通道关闭。

use crate::thread::JoinTimeout;
use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 默认重试间隔
pub const DEFAULT_RESOLVE_RETRY: Duration = Duration::from_secs(1);

/// 解析主机名（优先 IPv4）
pub fn resolve_host(host: &str) -> io::Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let addrs: Vec<_> = (host, 0).to_socket_addrs()?.map(|a| a.ip()).collect();
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no address for {host}")))
}

#[derive(Debug)]
pub struct Resolver {
    tx: Option<Sender<String>>,
    resolved: Arc<ArcSwapOption<IpAddr>>,
    target: Option<String>,
    handle: Option<JoinHandle<()>>,
}

impl Resolver {
    pub fn spawn(retry: Duration) -> io::Result<Self> {
        let (tx, rx) = unbounded();
        let resolved = Arc::new(ArcSwapOption::empty());
        let published = resolved.clone();
        let handle = thread::Builder::new()
            .name("ds-resolver".into())
            .spawn(move || resolve_loop(rx, published, retry))?;

        Ok(Self {
            tx: Some(tx),
            resolved,
            target: None,
            handle: Some(handle),
        })
    }

    /// 设置解析目标（与当前目标相同时无操作）
    ///
    /// 目标变化后立即清除旧地址，避免向旧机器人发包。
    pub fn request(&mut self, host: &str) {
        if self.target.as_deref() == Some(host) {
            return;
        }
        self.target = Some(host.to_string());
        self.resolved.store(None);
        if let Some(tx) = &self.tx
            && tx.send(host.to_string()).is_err()
        {
            error!("Resolver thread exited, cannot resolve {}", host);
        }
    }

    /// 重新解析当前目标（保留已发布的地址直到新结果到达）
    pub fn refresh(&self) {
        if let (Some(tx), Some(target)) = (&self.tx, &self.target) {
            let _ = tx.send(target.clone());
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// 最新解析结果
    pub fn resolved(&self) -> Option<IpAddr> {
        self.resolved.load().as_deref().copied()
    }

    /// 关闭通道并等待解析线程退出
    pub fn shutdown(&mut self, timeout: Duration) {
        self.tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join_timeout(timeout).is_err()
        {
            warn!("Resolver thread did not exit within {:?}", timeout);
        }
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.shutdown(Duration::from_millis(500));
    }
}

fn resolve_loop(rx: Receiver<String>, published: Arc<ArcSwapOption<IpAddr>>, retry: Duration) {
    let mut target: Option<String> = None;
    let mut failures = 0u32;

    loop {
        // 有未解析的目标时按重试间隔等待，否则一直等待新目标
        let next = if target.is_some() {
            rx.recv_timeout(retry)
        } else {
            rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        };
        match next {
            Ok(host) => {
                // 只处理最新的目标
                let host = rx.try_iter().last().unwrap_or(host);
                target = Some(host);
                failures = 0;
            },
            Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let Some(host) = target.as_deref() else {
            continue;
        };
        match resolve_host(host) {
            // 解析期间目标已变化，丢弃旧结果
            Ok(_) if !rx.is_empty() => {},
            Ok(ip) => {
                info!("Robot address {} resolved to {}", host, ip);
                published.store(Some(Arc::new(ip)));
                target = None;
            },
            Err(e) => {
                failures += 1;
                if failures == 1 {
                    warn!("Cannot resolve robot address {}: {}, retrying", host, e);
                } else {
                    debug!("Cannot resolve robot address {} (attempt {}): {}", host, failures, e);
                }
            },
        }
    }
    debug!("Resolver thread exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Instant;

    fn wait_resolved(resolver: &Resolver) -> Option<IpAddr> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Some(ip) = resolver.resolved() {
                return Some(ip);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_resolve_ip_literal() {
        assert_eq!(
            resolve_host("10.12.34.2").unwrap(),
            IpAddr::V4(Ipv4Addr::new(10, 12, 34, 2))
        );
    }

    #[test]
    fn test_resolve_localhost() {
        assert!(resolve_host("localhost").unwrap().is_loopback());
    }

    #[test]
    fn test_resolver_publishes() {
        let mut resolver = Resolver::spawn(Duration::from_millis(50)).unwrap();
        assert_eq!(resolver.resolved(), None);

        resolver.request("127.0.0.1");
        assert_eq!(
            wait_resolved(&resolver),
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
        assert_eq!(resolver.target(), Some("127.0.0.1"));

        // 目标变化时旧地址立即失效
        resolver.request("10.0.0.2");
        assert_ne!(resolver.resolved(), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert_eq!(
            wait_resolved(&resolver),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)))
        );

        resolver.shutdown(Duration::from_secs(1));
    }
}
