//! 手柄映射
//!
//! 输入为归一化轴值 [-1, 1]（原始事件解码由输入源负责）：
//!
//! - 转向轴 → 目标角度：`center + value × max_delta`，死区内回中
//! - 驱动轴 → 驱动命令：死区内停车，否则 `min(|value|, 1) × max_duty`，正值前进
//!
//! `AxisFilter` 过滤微小抖动，只转发变化超过阈值的轴值。

use steer_control::Deg;
use steer_driver::{Direction, Duty};
use steer_tools::{DriveSettings, TeleopSettings};

/// 转向轴映射
#[derive(Debug, Clone, PartialEq)]
pub struct SteeringAxisMapper {
    center: Deg,
    max_delta: f64,
    deadzone: f64,
}

impl SteeringAxisMapper {
    pub fn new(center: Deg, max_delta: f64, deadzone: f64) -> Self {
        Self {
            center,
            max_delta,
            deadzone,
        }
    }

    pub fn from_settings(settings: &TeleopSettings) -> Self {
        Self::new(settings.center, settings.max_delta, settings.deadzone)
    }

    /// 中位角度
    pub fn center(&self) -> Deg {
        self.center
    }

    /// 轴值 → 目标角度（钳位到 [0, 300]）
    pub fn map(&self, value: f64) -> Deg {
        if !value.is_finite() || value.abs() < self.deadzone {
            return self.center;
        }
        Deg(self.center.0 + value.clamp(-1.0, 1.0) * self.max_delta).clamp_to_travel()
    }
}

impl Default for SteeringAxisMapper {
    fn default() -> Self {
        Self::from_settings(&TeleopSettings::default())
    }
}

/// 驱动轴映射结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveAction {
    /// 死区内，停车
    Stop,
    /// 以给定方向和占空比驱动
    Run { direction: Direction, duty: Duty },
}

/// 驱动轴映射
#[derive(Debug, Clone, PartialEq)]
pub struct DriveAxisMapper {
    max_duty: f64,
    deadzone: f64,
}

impl DriveAxisMapper {
    pub fn new(max_duty: f64, deadzone: f64) -> Self {
        Self { max_duty, deadzone }
    }

    pub fn from_settings(drive: &DriveSettings, teleop: &TeleopSettings) -> Self {
        Self::new(drive.max_duty, teleop.deadzone)
    }

    /// 轴值 → 驱动命令
    ///
    /// 占空比取整数百分比（截断）。
    pub fn map(&self, value: f64) -> DriveAction {
        if !value.is_finite() || value.abs() < self.deadzone {
            return DriveAction::Stop;
        }

        let duty = Duty::new((value.abs().min(1.0) * self.max_duty).trunc());
        let direction = if value > 0.0 {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        DriveAction::Run { direction, duty }
    }
}

impl Default for DriveAxisMapper {
    fn default() -> Self {
        Self::from_settings(&DriveSettings::default(), &TeleopSettings::default())
    }
}

/// 轴值变化过滤
///
/// 初始值为 0（摇杆居中）。只有 `|new - last| > threshold` 时才接受并更新。
#[derive(Debug, Clone, PartialEq)]
pub struct AxisFilter {
    threshold: f64,
    last: f64,
}

impl AxisFilter {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last: 0.0,
        }
    }

    /// 最近一次接受的值
    pub fn last(&self) -> f64 {
        self.last
    }

    /// 变化显著时返回新值
    pub fn accept(&mut self, value: f64) -> Option<f64> {
        if !value.is_finite() || (value - self.last).abs() <= self.threshold {
            return None;
        }
        self.last = value;
        Some(value)
    }
}
