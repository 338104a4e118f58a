//! 执行器端口抽象
//!
//! H 桥驱动板（如 BTS7960）有两路 PWM（RPWM / LPWM）和两路使能（R_EN / L_EN）。
//! `ActuatorPort` 只暴露两个动作：
//!
//! - `set(channel, duty)`: 拉高两路使能，`channel` 输出 `duty`，另一路输出 0
//! - `cut()`: 拉低两路使能，两路占空比清零
//!
//! 寄存器/GPIO 编程由具体实现负责，驱动层不关心。

use crate::error::ActuatorFault;
use std::fmt;

/// PWM 通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PwmChannel {
    /// RPWM（前进 / 右转）
    Right,
    /// LPWM（后退 / 左转）
    Left,
}

impl PwmChannel {
    /// 另一路通道
    pub fn opposite(self) -> Self {
        match self {
            PwmChannel::Right => PwmChannel::Left,
            PwmChannel::Left => PwmChannel::Right,
        }
    }
}

impl fmt::Display for PwmChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PwmChannel::Right => write!(f, "RPWM"),
            PwmChannel::Left => write!(f, "LPWM"),
        }
    }
}

/// 占空比（百分比，NewType）
///
/// 构造时钳位到 [0, 100]，NaN 视为 0。
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Duty(f64);

impl Duty {
    /// 0%
    pub const ZERO: Self = Duty(0.0);

    /// 100%
    pub const MAX: Self = Duty(100.0);

    /// 创建占空比（自动钳位）
    #[inline]
    pub fn new(percent: f64) -> Self {
        if percent.is_nan() {
            return Duty::ZERO;
        }
        Duty(percent.clamp(0.0, 100.0))
    }

    /// 获取百分比数值
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// 是否为 0
    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }

    /// 减去一个步长（不低于 0）
    #[inline]
    pub fn saturating_sub(self, step: f64) -> Self {
        Duty::new(self.0 - step)
    }
}

impl fmt::Display for Duty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

/// 执行器端口
///
/// 驱动层是端口的唯一所有者。实现者负责具体硬件访问。
///
/// # 线程安全
///
/// 端口会被移动到持有电机的线程中，因此要求 `Send`。
pub trait ActuatorPort: Send {
    /// 使能两路并以 `duty` 驱动 `channel`，另一路置 0
    fn set(&mut self, channel: PwmChannel, duty: Duty) -> Result<(), ActuatorFault>;

    /// 拉低两路使能，两路占空比清零
    fn cut(&mut self) -> Result<(), ActuatorFault>;

    /// 释放硬件资源（停止 PWM、释放 GPIO）
    ///
    /// 默认实现仅执行 `cut()`。
    fn release(&mut self) -> Result<(), ActuatorFault> {
        self.cut()
    }
}

impl<P: ActuatorPort + ?Sized> ActuatorPort for Box<P> {
    fn set(&mut self, channel: PwmChannel, duty: Duty) -> Result<(), ActuatorFault> {
        (**self).set(channel, duty)
    }

    fn cut(&mut self) -> Result<(), ActuatorFault> {
        (**self).cut()
    }

    fn release(&mut self) -> Result<(), ActuatorFault> {
        (**self).release()
    }
}
