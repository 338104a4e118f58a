//! 转向协调器
//!
//! 面向上层（手柄映射、命令分发）的定点转向入口。所有角度都以输出角度给出，
//! 经过减速比换算为电机角度：`电机角度 = 请求角度 / gear_ratio`。
//!
//! 同一时刻最多一个旋转任务。任务运行期间的新请求直接拒绝，不排队，
//! 正在执行的任务不受影响。

use crate::angle::{AngleSource, Deg};
use crate::config::{CoordinatorConfig, RotationConfig};
use crate::error::ControlError;
use crate::rotation::{RotationReport, RotationRequest, run_rotation};
use crate::worker::Worker;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use steer_driver::{CancellationToken, SharedMotor};
use tracing::{error, info, warn};

/// 旋转任务在电机上登记的持有者名
pub const ROTATION_OWNER: &str = "bounded-rotation";

struct ActiveRotation {
    target: Deg,
    token: CancellationToken,
    worker: Worker<Result<RotationReport, ControlError>>,
}

/// 转向协调器
///
/// 通过 `&self` 操作，可以在多个线程间共享。
pub struct SteeringCoordinator {
    motor: SharedMotor,
    sensor: Arc<dyn AngleSource>,
    config: CoordinatorConfig,
    rotation: RotationConfig,
    active: Mutex<Option<ActiveRotation>>,
}

impl SteeringCoordinator {
    pub fn new(
        motor: SharedMotor,
        sensor: Arc<dyn AngleSource>,
        config: CoordinatorConfig,
        rotation: RotationConfig,
    ) -> Result<Self, ControlError> {
        config.validate()?;
        rotation.validate()?;
        Ok(Self {
            motor,
            sensor,
            config,
            rotation,
            active: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// 当前角度（无读数返回 `SensorUnavailable`）
    pub fn current_angle(&self) -> Result<Deg, ControlError> {
        self.sensor.read().ok_or(ControlError::SensorUnavailable)
    }

    /// 相对当前角度左转 `delta` 度（输出角度）
    ///
    /// 目标 = 当前 - delta / gear_ratio，钳位到 [0, 300]。返回实际目标。
    pub fn turn_left_by(&self, delta: f64) -> Result<Deg, ControlError> {
        let current = self.current_angle()?;
        let target = Deg(current.0 - self.motor_degrees(delta));
        self.start(target.clamp_to_travel())
    }

    /// 相对当前角度右转 `delta` 度（输出角度）
    ///
    /// 目标 = 当前 + delta / gear_ratio，钳位到 [0, 300]。返回实际目标。
    pub fn turn_right_by(&self, delta: f64) -> Result<Deg, ControlError> {
        let current = self.current_angle()?;
        let target = Deg(current.0 + self.motor_degrees(delta));
        self.start(target.clamp_to_travel())
    }

    /// 转到绝对角度
    pub fn turn_to(&self, angle: Deg) -> Result<Deg, ControlError> {
        self.start(angle.clamp_to_travel())
    }

    /// 回中
    pub fn center(&self) -> Result<Deg, ControlError> {
        self.turn_to(self.config.neutral_angle)
    }

    /// 取消当前任务并等待其退出
    ///
    /// 没有任务时返回 `Ok(None)`。
    pub fn stop(&self) -> Result<Option<RotationReport>, ControlError> {
        let Some(active) = self.active.lock().take() else {
            return Ok(None);
        };
        info!("Stopping rotation towards {}", active.target);
        active.token.cancel();
        Self::join(active).map(Some)
    }

    /// 等待当前任务结束
    ///
    /// 等待期间槽位已清空，新的启动请求会因电机租约被占用而返回 `MotorBusy`。
    pub fn wait(&self) -> Result<Option<RotationReport>, ControlError> {
        let Some(active) = self.active.lock().take() else {
            return Ok(None);
        };
        Self::join(active).map(Some)
    }

    /// 是否有任务在运行
    pub fn is_busy(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|a| !a.worker.is_finished())
    }

    /// 正在运行任务的目标
    pub fn active_target(&self) -> Option<Deg> {
        self.active
            .lock()
            .as_ref()
            .filter(|a| !a.worker.is_finished())
            .map(|a| a.target)
    }

    fn motor_degrees(&self, output_degrees: f64) -> f64 {
        output_degrees / self.config.gear_ratio
    }

    fn start(&self, target: Deg) -> Result<Deg, ControlError> {
        let mut slot = self.active.lock();

        if let Some(active) = slot.as_ref()
            && !active.worker.is_finished()
        {
            warn!(
                "Rotation to {} rejected: rotation towards {} still active",
                target, active.target
            );
            return Err(ControlError::ConcurrentOperationRejected {
                active_target: active.target,
            });
        }

        // 回收已结束的任务
        if let Some(finished) = slot.take()
            && let Err(e) = Self::join(finished)
        {
            warn!("Previous rotation ended with error: {}", e);
        }

        let lease = self.motor.try_acquire(ROTATION_OWNER)?;
        let token = CancellationToken::new();
        let request = RotationRequest::new(target, self.config.tolerance, self.config.max_duration);

        let sensor = self.sensor.clone();
        let config = self.rotation.clone();
        let worker_token = token.clone();
        let worker = Worker::spawn("steer-rotation", move || {
            run_rotation(&lease, sensor.as_ref(), &request, &config, &worker_token)
        })?;

        *slot = Some(ActiveRotation {
            target,
            token,
            worker,
        });
        Ok(target)
    }

    fn join(active: ActiveRotation) -> Result<RotationReport, ControlError> {
        let name = active.worker.name().to_string();
        match active.worker.join() {
            Ok(result) => result,
            Err(e) => {
                error!("Rotation thread panicked");
                Err(e.into_control_error(&name, Duration::ZERO))
            },
        }
    }
}

impl Drop for SteeringCoordinator {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.token.cancel();
            if let Err(e) = Self::join(active) {
                warn!("Rotation ended with error during shutdown: {}", e);
            }
        }
    }
}
