//! 日志初始化
//!
//! 基于 `tracing-subscriber`：`RUST_LOG` 优先，未设置时使用调用方给出的默认指令。
//! 同时安装 `tracing-log` 桥接，依赖 `log` crate 的第三方库日志也会进入同一个订阅者。

use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// `default_directive` 形如 `"steer_control=info"` 或 `"debug"`。
/// 重复调用是安全的：已安装订阅者时返回 `false`。
pub fn init_logging(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }

    // 已有 log 记录器时忽略
    let _ = tracing_log::LogTracer::init();
    true
}
