//! 可取消等待令牌
//!
//! 控制线程的休眠都通过令牌完成，`cancel()` 会立即唤醒所有等待者，
//! 停止请求不会被一段固定的 sleep 卡住。
//!
//! # 实现
//!
//! 令牌内部持有一个从不发送数据的 crossbeam 通道：
//! - 等待 = `recv_timeout()` / `recv_deadline()`
//! - 取消 = drop 掉唯一的 `Sender`，所有接收端立即得到 `Disconnected`
//!
//! # 示例
//!
//! ```rust
//! use steer_driver::CancellationToken;
//! use std::time::Duration;
//!
//! let token = CancellationToken::new();
//! let worker = token.clone();
//!
//! token.cancel();
//! // 已取消：等待立即返回 true
//! assert!(worker.wait_timeout(Duration::from_secs(10)));
//! ```

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct TokenInner {
    /// 取消触发器（drop 即取消）
    trigger: Mutex<Option<Sender<()>>>,
    /// 等待端
    signal: Receiver<()>,
}

/// 可取消等待令牌
///
/// Clone 共享同一个取消状态。取消是单向的，不能复位；
/// 需要重新开始时创建新令牌。
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// 创建未取消的令牌
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self {
            inner: Arc::new(TokenInner {
                trigger: Mutex::new(Some(tx)),
                signal: rx,
            }),
        }
    }

    /// 请求取消（幂等）
    pub fn cancel(&self) {
        self.inner.trigger.lock().take();
    }

    /// 是否已取消
    pub fn is_cancelled(&self) -> bool {
        matches!(self.inner.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// 最多等待 `timeout`
    ///
    /// # 返回
    ///
    /// - `true`: 等待期间（或之前）已取消
    /// - `false`: 等满了 `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.inner.signal.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// 等待到绝对时间点 `deadline`
    ///
    /// 返回值含义同 [`wait_timeout`](Self::wait_timeout)。
    pub fn wait_until(&self, deadline: Instant) -> bool {
        matches!(
            self.inner.signal.recv_deadline(deadline),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
