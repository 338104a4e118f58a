//! 电机驱动
//!
//! `MotorDriver` 是 `ActuatorPort` 的唯一所有者，维护方向与占空比状态。
//!
//! # 状态
//!
//! ```text
//! Stopped ──drive(dir, duty)──▶ Forward/Reverse/Left/Right(duty)
//!    ▲                                   │
//!    └──── stop_immediately / graceful_stop ─┘
//! ```
//!
//! `cleanup()` 之后驱动进入 Released，只允许读取状态和幂等停止。

use crate::error::DriverError;
use crate::port::{ActuatorPort, Duty};
use crate::state::{Direction, MotorState};
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// 减速停止配置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GracefulStopConfig {
    /// 每步降低的占空比（百分点）
    pub step: f64,
    /// 每步之间的间隔
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub step_delay: Duration,
}

impl Default for GracefulStopConfig {
    fn default() -> Self {
        Self {
            step: 5.0,
            step_delay: Duration::from_millis(200),
        }
    }
}

impl GracefulStopConfig {
    /// 从当前占空比斜坡到 0 的预计耗时
    pub fn estimated_duration(&self, duty: Duty) -> Duration {
        if self.step <= 0.0 {
            return Duration::ZERO;
        }
        let steps = (duty.value() / self.step).ceil();
        self.step_delay.mul_f64(steps)
    }
}

/// 电机驱动
pub struct MotorDriver {
    /// 电机名称（日志用）
    name: String,
    /// 执行器端口
    port: Box<dyn ActuatorPort>,
    /// 当前状态
    state: MotorState,
    /// 是否已释放端口
    released: bool,
}

impl MotorDriver {
    /// 创建电机驱动
    ///
    /// 端口应处于断电状态，初始状态为 `Stopped`。
    pub fn new(name: impl Into<String>, port: impl ActuatorPort + 'static) -> Self {
        Self {
            name: name.into(),
            port: Box::new(port),
            state: MotorState::STOPPED,
            released: false,
        }
    }

    /// 电机名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 当前状态
    pub fn state(&self) -> MotorState {
        self.state
    }

    /// 是否已释放
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// 以给定方向与占空比持续驱动
    ///
    /// 两路使能拉高，对应通道输出 `duty`，另一通道为 0。
    /// `Direction::Stopped` 等同于 `stop_immediately()`。
    pub fn drive(&mut self, direction: Direction, duty: Duty) -> Result<(), DriverError> {
        if self.released {
            return Err(DriverError::Released);
        }

        let Some(channel) = direction.channel() else {
            return self.stop_immediately();
        };

        self.port.set(channel, duty)?;

        if self.state.direction != direction {
            debug!("Motor '{}' now running {} at {}", self.name, direction, duty);
        } else {
            trace!("Motor '{}' {} at {}", self.name, direction, duty);
        }
        self.state = MotorState { direction, duty };
        Ok(())
    }

    /// 立即停止：两路使能拉低，占空比清零
    ///
    /// 任何时候调用都是安全且幂等的；释放后调用直接返回 `Ok`。
    pub fn stop_immediately(&mut self) -> Result<(), DriverError> {
        if self.released {
            return Ok(());
        }

        self.port.cut()?;

        if !self.state.is_stopped() {
            info!("Motor '{}' stopped (was {})", self.name, self.state);
        }
        self.state = MotorState::STOPPED;
        Ok(())
    }

    /// 减速停止
    ///
    /// 在当前方向对应的通道上按 `step` 逐步降低占空比，每步间隔 `step_delay`，
    /// 最后执行与 `stop_immediately()` 相同的断电。已停止时为空操作。
    ///
    /// ⚠️ **阻塞**：耗时约 `duty / step × step_delay`。
    /// 需要非阻塞停止的调用者应使用 `stop_immediately()`。
    pub fn graceful_stop(&mut self, config: &GracefulStopConfig) -> Result<(), DriverError> {
        if self.released || self.state.is_stopped() {
            return Ok(());
        }
        if config.step <= 0.0 {
            return Err(DriverError::InvalidInput(format!(
                "graceful stop step must be > 0, got {}",
                config.step
            )));
        }

        let direction = self.state.direction;
        let Some(channel) = direction.channel() else {
            return self.stop_immediately();
        };

        debug!(
            "Motor '{}' ramping down from {} (~{:?})",
            self.name,
            self.state.duty,
            config.estimated_duration(self.state.duty)
        );

        let mut duty = self.state.duty;
        while !duty.is_zero() {
            duty = duty.saturating_sub(config.step);
            if let Err(e) = self.port.set(channel, duty) {
                error!("Motor '{}' ramp step failed: {}", self.name, e);
                // 斜坡失败也要断电；断电失败时保留最后一次成功写入的状态
                if let Err(cut) = self.stop_immediately() {
                    error!("Motor '{}' cut after failed ramp also failed: {}", self.name, cut);
                }
                return Err(e.into());
            }
            self.state = MotorState { direction, duty };
            spin_sleep::sleep(config.step_delay);
        }

        self.stop_immediately()
    }

    /// 释放执行器端口
    ///
    /// 必须是驱动生命周期中的最后一次调用；之后驱动操作返回 `DriverError::Released`。
    /// 重复调用为空操作。
    pub fn cleanup(&mut self) -> Result<(), DriverError> {
        if self.released {
            return Ok(());
        }

        let cut = self.port.cut();
        self.state = MotorState::STOPPED;
        self.released = true;
        let release = self.port.release();
        info!("Motor '{}' released", self.name);

        cut?;
        release?;
        Ok(())
    }
}

impl Drop for MotorDriver {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.cleanup()
        {
            error!("Motor '{}' cleanup on drop failed: {}", self.name, e);
        }
    }
}

impl std::fmt::Debug for MotorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorDriver")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("released", &self.released)
            .finish()
    }
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
