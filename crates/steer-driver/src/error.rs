//! 驱动层错误类型定义

use std::fmt;
use thiserror::Error;

/// 执行器操作类型（用于错误上下文）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorOp {
    /// 设置通道占空比
    Set,
    /// 断开使能并清零占空比
    Cut,
    /// 释放硬件资源
    Release,
}

impl fmt::Display for ActuatorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorOp::Set => write!(f, "set"),
            ActuatorOp::Cut => write!(f, "cut"),
            ActuatorOp::Release => write!(f, "release"),
        }
    }
}

/// 执行器写入失败
///
/// 由 `ActuatorPort` 实现返回。对当前控制会话是致命的。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Actuator {op} failed: {message}")]
pub struct ActuatorFault {
    /// 失败的操作
    pub op: ActuatorOp,
    /// 失败原因
    pub message: String,
}

impl ActuatorFault {
    /// 创建新的执行器错误
    pub fn new(op: ActuatorOp, message: impl Into<String>) -> Self {
        Self {
            op,
            message: message.into(),
        }
    }
}

/// 驱动层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// 执行器写入失败
    #[error("Actuator fault: {0}")]
    Actuator(#[from] ActuatorFault),

    /// 电机已被其他控制会话占用
    #[error("Motor is already owned by '{holder}'")]
    MotorBusy {
        /// 当前持有者
        holder: String,
    },

    /// 电机已调用 `cleanup()`，不能再驱动
    #[error("Motor driver has been released")]
    Released,

    /// 无效输入（如对定时转向传入 Forward）
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DriverError {
    /// 是否为致命错误
    ///
    /// 致命错误需要操作员介入，不应自动重试。
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Actuator(_) | Self::Released)
    }

    /// 是否为所有权冲突
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::MotorBusy { .. })
    }
}
