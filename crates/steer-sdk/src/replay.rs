//! 轨迹回放
//!
//! 按录制时的节奏把每一帧的油门/转向轴值重新送入 `Vehicle`：
//! - 油门 → `apply_drive_axis`
//! - 转向 → `apply_steering_axis`（连续转向目标）
//!
//! 帧间等待通过 `CancellationToken` 完成，取消立即生效。
//! 无论正常结束、取消还是出错，退出前都会停止驱动电机和连续转向。

use crate::vehicle::Vehicle;
use std::fmt;
use std::time::{Duration, Instant};
use steer_control::{ContinuousSteeringLoop, ControlError};
use steer_driver::{CancellationToken, DriverError};
use steer_tools::Trajectory;
use tracing::{debug, info, warn};

/// 回放速度倍数上限
pub const MAX_SPEED_FACTOR: f64 = 5.0;

/// 回放参数
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    /// 速度倍数（1.0 = 原始速度）
    pub speed: f64,
    /// 相邻帧之间的最短等待
    pub min_frame_gap: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            min_frame_gap: Duration::from_millis(10),
        }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), ControlError> {
        if !(self.speed > 0.0 && self.speed <= MAX_SPEED_FACTOR) {
            return Err(ControlError::InvalidParameter {
                name: "speed",
                reason: format!("must be within (0, {}], got {}", MAX_SPEED_FACTOR, self.speed),
            });
        }
        Ok(())
    }

    /// 录制间隔换算为回放等待
    fn frame_wait(&self, gap: Duration) -> Duration {
        gap.div_f64(self.speed).max(self.min_frame_gap)
    }
}

/// 回放结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// 所有帧已回放
    Completed,
    /// 令牌被取消
    Cancelled,
}

impl fmt::Display for ReplayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayOutcome::Completed => write!(f, "completed"),
            ReplayOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// 回放报告
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub outcome: ReplayOutcome,
    /// 已送出的帧数
    pub frames_played: usize,
    pub total_frames: usize,
    pub elapsed: Duration,
}

/// 轨迹回放器
///
/// 需要附加了连续转向的 `Vehicle`；连续转向未运行时 `play()` 会先启动它。
pub struct TrajectoryReplayer<'a> {
    vehicle: &'a Vehicle,
    steering: &'a ContinuousSteeringLoop,
    config: ReplayConfig,
}

impl<'a> TrajectoryReplayer<'a> {
    /// # 错误
    ///
    /// - `ControlError::InvalidParameter`: 速度倍数无效，或整车未附加连续转向
    pub fn new(vehicle: &'a Vehicle, config: ReplayConfig) -> Result<Self, ControlError> {
        config.validate()?;
        let steering = vehicle.continuous().ok_or_else(|| ControlError::InvalidParameter {
            name: "vehicle",
            reason: "continuous steering must be attached for replay".to_string(),
        })?;
        Ok(Self {
            vehicle,
            steering,
            config,
        })
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// 回放轨迹（阻塞直到结束或取消）
    ///
    /// 退出前总是调用 `Vehicle::halt()`；回放本身出错时优先返回该错误。
    pub fn play(
        &self,
        trajectory: &Trajectory,
        token: &CancellationToken,
    ) -> Result<ReplayReport, ControlError> {
        trajectory
            .validate()
            .map_err(|e| ControlError::InvalidParameter {
                name: "trajectory",
                reason: e.to_string(),
            })?;

        if !self.steering.is_running() {
            self.steering.start()?;
        }

        info!(
            "Replaying {} frames ({:?} recorded) at {:.2}x",
            trajectory.len(),
            trajectory.duration().unwrap_or_default(),
            self.config.speed
        );
        let played = self.play_frames(trajectory, token);
        let halted = self.vehicle.halt();

        let report = played?;
        halted?;
        info!(
            "Replay {} after {}/{} frames in {:?}",
            report.outcome, report.frames_played, report.total_frames, report.elapsed
        );
        Ok(report)
    }

    fn play_frames(
        &self,
        trajectory: &Trajectory,
        token: &CancellationToken,
    ) -> Result<ReplayReport, ControlError> {
        let start = Instant::now();
        let mut outcome = ReplayOutcome::Completed;
        let mut frames_played = 0;

        for (index, frame) in trajectory.frames().iter().enumerate() {
            if token.is_cancelled() {
                outcome = ReplayOutcome::Cancelled;
                break;
            }

            let action = self.vehicle.apply_drive_axis(frame.joystick.throttle)?;
            let Some(target) = self.vehicle.apply_steering_axis(frame.joystick.steering) else {
                return Err(ControlError::Driver(DriverError::Released));
            };
            frames_played += 1;
            debug!("Frame {}: drive {:?}, steering target {}", index, action, target);

            if let Some(gap) = trajectory.gap_after(index)
                && token.wait_timeout(self.config.frame_wait(gap))
            {
                warn!("Replay cancelled at frame {}", index);
                outcome = ReplayOutcome::Cancelled;
                break;
            }
        }

        Ok(ReplayReport {
            outcome,
            frames_played,
            total_frames: trajectory.len(),
            elapsed: start.elapsed(),
        })
    }
}
