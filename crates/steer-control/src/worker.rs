//! 受监管的控制线程
//!
//! 每个控制会话一个 OS 线程，持有 `JoinHandle`，可以限时 join。
//! 线程在返回前把结果写入一个容量为 1 的通道，`join_timeout` 在通道上限时等待，
//! 不需要额外的看门狗线程。通道断开而没有结果说明线程 panic。

use crate::error::ControlError;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// join 失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinError {
    /// 线程在限定时间内没有退出（已分离）
    Timeout,
    /// 线程 panic
    Panicked,
}

pub(crate) struct Worker<T> {
    name: String,
    handle: JoinHandle<()>,
    result: Receiver<T>,
}

impl<T: Send + 'static> Worker<T> {
    /// 启动命名线程
    pub(crate) fn spawn<F>(name: &str, f: F) -> Result<Self, ControlError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let result = f();
                // 接收端可能已超时放弃
                let _ = tx.send(result);
            })
            .map_err(|e| ControlError::Spawn(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            handle,
            result: rx,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// 线程是否已经退出
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 阻塞等待线程退出
    pub(crate) fn join(self) -> Result<T, JoinError> {
        let result = self.result.recv().map_err(|_| JoinError::Panicked);
        let _ = self.handle.join();
        result
    }

    /// 最多等待 `timeout`
    ///
    /// 超时后线程被分离，继续运行直到自行退出。
    pub(crate) fn join_timeout(self, timeout: Duration) -> Result<T, JoinError> {
        match self.result.recv_timeout(timeout) {
            Ok(value) => {
                let _ = self.handle.join();
                Ok(value)
            },
            Err(RecvTimeoutError::Timeout) => Err(JoinError::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                let _ = self.handle.join();
                Err(JoinError::Panicked)
            },
        }
    }
}

impl JoinError {
    pub(crate) fn into_control_error(self, name: &str, timeout: Duration) -> ControlError {
        match self {
            JoinError::Timeout => ControlError::JoinTimeout {
                name: name.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            },
            JoinError::Panicked => ControlError::WorkerPanicked(name.to_string()),
        }
    }
}
