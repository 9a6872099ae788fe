//! 日志初始化
//!
//! 安装 `tracing-subscriber` fmt 层（`RUST_LOG` 优先，默认 `ds_*=info`），
//! 并通过 `LogTracer` 转发 `log` crate 的记录。重复调用无副作用。

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// 未设置 `RUST_LOG` 时的默认过滤规则
pub const DEFAULT_LOG_FILTER: &str = "ds_protocol=info,ds_driver=info,ds_sdk=info";

static INITIALIZED: OnceLock<bool> = OnceLock::new();

/// 初始化日志
///
/// 返回 `true` 表示本次进程中由本函数安装了全局订阅者；
/// 已有其他全局订阅者时返回 `false`。
pub fn init_logging() -> bool {
    init_logging_with(DEFAULT_LOG_FILTER)
}

/// 使用指定的默认过滤规则初始化日志（`RUST_LOG` 仍然优先）
pub fn init_logging_with(default_filter: &str) -> bool {
    *INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            return false;
        }
        // 订阅者已生效；`log` 桥接失败（已有 logger）不影响返回值
        let _ = tracing_log::LogTracer::init();
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_installs_subscriber() {
        assert!(init_logging());
        assert!(tracing::dispatcher::has_been_set());

        // 重复调用返回相同结果，不会 panic
        assert!(init_logging());
        assert!(init_logging_with("debug"));
        tracing::info!("logging initialized");
    }
}
