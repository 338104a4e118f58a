//! 电机状态定义
//!
//! `MotorState` 只能由 `MotorDriver` 自身修改，其他组件只读。

use crate::port::{Duty, PwmChannel};
use std::fmt;

/// 电机方向
///
/// # 接线约定
///
/// 左/右转复用前进/后退的两路通道：
/// - `Forward` / `Right` → RPWM
/// - `Reverse` / `Left` → LPWM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// 停止（两路使能拉低）
    #[default]
    Stopped,
    /// 前进
    Forward,
    /// 后退
    Reverse,
    /// 左转
    Left,
    /// 右转
    Right,
}

impl Direction {
    /// 该方向对应的 PWM 通道（`Stopped` 返回 `None`）
    pub fn channel(self) -> Option<PwmChannel> {
        match self {
            Direction::Stopped => None,
            Direction::Forward | Direction::Right => Some(PwmChannel::Right),
            Direction::Reverse | Direction::Left => Some(PwmChannel::Left),
        }
    }

    /// 是否为转向方向（定时转向只接受 Left/Right）
    pub fn is_turn(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    /// 反方向
    pub fn opposite(self) -> Self {
        match self {
            Direction::Stopped => Direction::Stopped,
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Stopped => "stopped",
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        write!(f, "{}", name)
    }
}

/// 电机状态快照
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorState {
    /// 当前方向
    pub direction: Direction,
    /// 当前占空比
    pub duty: Duty,
}

impl MotorState {
    /// 停止状态
    pub const STOPPED: Self = MotorState {
        direction: Direction::Stopped,
        duty: Duty::ZERO,
    };

    /// 是否已停止
    pub fn is_stopped(&self) -> bool {
        self.direction == Direction::Stopped
    }
}

impl fmt::Display for MotorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_stopped() {
            write!(f, "stopped")
        } else {
            write!(f, "{} @ {}", self.direction, self.duty)
        }
    }
}
