//! 控制层配置
//!
//! 所有配置结构都实现 `Default`（现场整定值）和 `validate()`。
//! 开启 `serde` feature 后可序列化，时长字段以毫秒表示。

use crate::angle::Deg;
use crate::error::ControlError;
use std::time::Duration;
use steer_driver::{Direction, Duty};

/// PID 增益配置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// 输出下限
    pub output_min: f64,
    /// 输出上限
    pub output_max: f64,
    /// 积分钳位（`None` 表示不限制）
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub integral_limit: Option<f64>,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 0.8,
            ki: 0.001,
            kd: 0.05,
            output_min: -100.0,
            output_max: 100.0,
            integral_limit: None,
        }
    }
}

impl PidGains {
    pub fn validate(&self) -> Result<(), ControlError> {
        for (name, value) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            if !value.is_finite() {
                return Err(ControlError::invalid(name, format!("must be finite, got {}", value)));
            }
        }
        if !(self.output_min < self.output_max) {
            return Err(ControlError::invalid(
                "output_min",
                format!(
                    "must be < output_max ({} >= {})",
                    self.output_min, self.output_max
                ),
            ));
        }
        if let Some(limit) = self.integral_limit
            && !(limit >= 0.0)
        {
            return Err(ControlError::invalid(
                "integral_limit",
                format!("must be >= 0, got {}", limit),
            ));
        }
        Ok(())
    }
}

/// 控制信号符号约定
///
/// 不同车辆上电机接线/传感器安装方向不同，正误差对应的转向方向需要配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DirectionConvention {
    /// 正信号 → 左转
    #[default]
    PositiveIsLeft,
    /// 正信号 → 右转
    PositiveIsRight,
}

impl DirectionConvention {
    /// 正信号对应的方向
    pub fn positive(self) -> Direction {
        match self {
            DirectionConvention::PositiveIsLeft => Direction::Left,
            DirectionConvention::PositiveIsRight => Direction::Right,
        }
    }

    /// 把 PID 输出映射为驱动命令
    ///
    /// - 方向：`signal > 0` 取正方向，否则取反方向
    /// - 幅值：`min(|signal|, 100)`，`0 < 幅值 < min_duty` 时抬到 `min_duty`
    pub fn command(self, signal: f64, min_duty: f64) -> (Direction, Duty) {
        let direction = if signal > 0.0 {
            self.positive()
        } else {
            self.positive().opposite()
        };

        let mut magnitude = signal.abs().min(100.0);
        if magnitude > 0.0 && magnitude < min_duty {
            magnitude = min_duty;
        }
        (direction, Duty::new(magnitude))
    }
}

/// 连续转向配置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContinuousConfig {
    /// PID 增益
    pub pid: PidGains,
    /// 控制频率（Hz）
    pub frequency_hz: f64,
    /// 最小有效占空比（克服静摩擦）
    pub min_duty: f64,
    /// 符号约定
    pub convention: DirectionConvention,
    /// 启动时的目标角度
    pub initial_target: Deg,
    /// 允许的连续执行器故障次数（0 = 首次故障即终止）
    pub max_actuator_faults: u32,
    /// `stop()` 等待线程退出的上限
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub join_timeout: Duration,
}

impl Default for ContinuousConfig {
    fn default() -> Self {
        Self {
            pid: PidGains::default(),
            frequency_hz: 50.0,
            min_duty: 20.0,
            convention: DirectionConvention::default(),
            initial_target: Deg::CENTER,
            max_actuator_faults: 0,
            join_timeout: Duration::from_secs(2),
        }
    }
}

impl ContinuousConfig {
    /// 控制周期
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frequency_hz)
    }

    pub fn validate(&self) -> Result<(), ControlError> {
        self.pid.validate()?;
        validate_frequency(self.frequency_hz)?;
        validate_min_duty(self.min_duty)?;
        Ok(())
    }
}

/// 定点旋转配置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RotationConfig {
    /// PID 增益（每次旋转新建控制器）
    pub pid: PidGains,
    /// 控制频率（Hz）
    pub frequency_hz: f64,
    /// 最小有效占空比
    pub min_duty: f64,
    /// 符号约定
    pub convention: DirectionConvention,
    /// 允许的连续传感器丢失次数，超过则以 `SensorLost` 结束
    pub max_sensor_misses: u32,
    /// 允许的连续执行器故障次数
    pub max_actuator_faults: u32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            pid: PidGains::default(),
            frequency_hz: 50.0,
            min_duty: 20.0,
            convention: DirectionConvention::default(),
            max_sensor_misses: 50,
            max_actuator_faults: 0,
        }
    }
}

impl RotationConfig {
    /// 控制周期
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frequency_hz)
    }

    pub fn validate(&self) -> Result<(), ControlError> {
        self.pid.validate()?;
        validate_frequency(self.frequency_hz)?;
        validate_min_duty(self.min_duty)?;
        Ok(())
    }
}

/// 协调器配置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CoordinatorConfig {
    /// 减速比：电机角度 = 请求角度 / gear_ratio
    pub gear_ratio: f64,
    /// 中位角度
    pub neutral_angle: Deg,
    /// 到位容差（度）
    pub tolerance: f64,
    /// 单次旋转最长时间
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub max_duration: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            gear_ratio: 1.5,
            neutral_angle: Deg::CENTER,
            tolerance: 2.0,
            max_duration: Duration::from_secs(10),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), ControlError> {
        if !(self.gear_ratio > 0.0) || !self.gear_ratio.is_finite() {
            return Err(ControlError::invalid(
                "gear_ratio",
                format!("must be > 0, got {}", self.gear_ratio),
            ));
        }
        if !(self.tolerance >= 0.0) {
            return Err(ControlError::invalid(
                "tolerance",
                format!("must be >= 0, got {}", self.tolerance),
            ));
        }
        if self.max_duration.is_zero() {
            return Err(ControlError::invalid("max_duration", "must be > 0"));
        }
        if self.neutral_angle.clamp_to_travel() != self.neutral_angle {
            return Err(ControlError::invalid(
                "neutral_angle",
                format!("must be within [0, 300], got {}", self.neutral_angle),
            ));
        }
        Ok(())
    }
}

fn validate_frequency(frequency_hz: f64) -> Result<(), ControlError> {
    if !(frequency_hz > 0.0) || !frequency_hz.is_finite() {
        return Err(ControlError::invalid(
            "frequency_hz",
            format!("must be > 0, got {}", frequency_hz),
        ));
    }
    Ok(())
}

fn validate_min_duty(min_duty: f64) -> Result<(), ControlError> {
    if !(0.0..=100.0).contains(&min_duty) {
        return Err(ControlError::invalid(
            "min_duty",
            format!("must be within [0, 100], got {}", min_duty),
        ));
    }
    Ok(())
}

#[cfg(feature = "serde")]
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        ContinuousConfig::default().validate().unwrap();
        RotationConfig::default().validate().unwrap();
        CoordinatorConfig::default().validate().unwrap();
        assert_eq!(ContinuousConfig::default().period(), Duration::from_millis(20));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = ContinuousConfig {
            frequency_hz: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ControlError::InvalidParameter {
                name: "frequency_hz",
                ..
            })
        ));

        let config = CoordinatorConfig {
            gear_ratio: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CoordinatorConfig {
            tolerance: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let gains = PidGains {
            output_min: 10.0,
            output_max: -10.0,
            ..Default::default()
        };
        assert!(gains.validate().is_err());

        let config = RotationConfig {
            min_duty: 120.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_positive_is_left_convention() {
        let convention = DirectionConvention::PositiveIsLeft;

        let (dir, duty) = convention.command(45.0, 20.0);
        assert_eq!(dir, Direction::Left);
        assert_eq!(duty.value(), 45.0);

        let (dir, duty) = convention.command(-45.0, 20.0);
        assert_eq!(dir, Direction::Right);
        assert_eq!(duty.value(), 45.0);
    }

    #[test]
    fn test_positive_is_right_convention() {
        let convention = DirectionConvention::PositiveIsRight;
        assert_eq!(convention.command(10.0, 0.0).0, Direction::Right);
        assert_eq!(convention.command(-10.0, 0.0).0, Direction::Left);
    }

    #[test]
    fn test_min_duty_floor() {
        let convention = DirectionConvention::default();

        // 0 < 幅值 < 下限 → 抬到下限
        assert_eq!(convention.command(3.0, 20.0).1.value(), 20.0);
        // 0 保持为 0
        assert_eq!(convention.command(0.0, 20.0).1, Duty::ZERO);
        // 超过 100 钳位
        assert_eq!(convention.command(250.0, 20.0).1, Duty::MAX);
    }
}
