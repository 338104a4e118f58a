//! 控制层错误类型定义

use crate::angle::Deg;
use steer_driver::DriverError;
use thiserror::Error;

/// 控制层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// 无法读取当前角度（相对转向需要起始角度）
    #[error("Steering angle sensor unavailable")]
    SensorUnavailable,

    /// 已有旋转任务在运行，新请求被拒绝（不排队）
    #[error("Rotation rejected: another rotation towards {active_target} is active")]
    ConcurrentOperationRejected {
        /// 正在执行的任务目标
        active_target: Deg,
    },

    /// 旋转超时
    #[error("Rotation timed out after {elapsed_ms}ms")]
    TimedOut { elapsed_ms: u64 },

    /// 旋转被取消
    #[error("Rotation cancelled")]
    Cancelled,

    /// 传感器连续丢失
    #[error("Sensor lost: {misses} consecutive missed readings")]
    SensorLost { misses: u32 },

    /// 执行器故障超过容忍次数，会话已终止
    #[error("Actuator faults: {count}, last error: {last_error}")]
    Actuator {
        count: u32,
        #[source]
        last_error: Box<DriverError>,
    },

    /// 驱动层错误（如 `MotorBusy`）
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 配置参数无效
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// 控制线程创建失败
    #[error("Failed to spawn control thread: {0}")]
    Spawn(String),

    /// 控制线程未在限定时间内退出
    #[error("Control thread '{name}' did not exit within {timeout_ms}ms")]
    JoinTimeout { name: String, timeout_ms: u64 },

    /// 控制线程 panic
    #[error("Control thread '{0}' panicked")]
    WorkerPanicked(String),
}

impl ControlError {
    /// 是否为致命错误（需要操作员介入）
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Actuator { .. } | Self::WorkerPanicked(_) => true,
            Self::Driver(e) => e.is_fatal(),
            _ => false,
        }
    }

    /// 是否可以稍后重试
    ///
    /// 冲突和暂时性的传感器缺失可以重试；超时、取消不自动重试。
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SensorUnavailable | Self::ConcurrentOperationRejected { .. } => true,
            Self::Driver(e) => e.is_busy(),
            _ => false,
        }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
