//! 整车组合
//!
//! `Vehicle` 显式持有所有组件（没有全局状态）：
//! - 驱动电机（常驻租约 `vehicle-drive`）
//! - 转向电机、`SteeringCoordinator`、可选的 `ContinuousSteeringLoop`
//!
//! 远程命令通过 `dispatch()` 分发，手柄输入通过 `apply_*_axis()` 应用。

use crate::teleop::{DriveAction, DriveAxisMapper, SteeringAxisMapper};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use steer_control::{AngleSource, ContinuousSteeringLoop, ControlError, Deg, SteeringCoordinator};
use steer_driver::{Direction, Duty, MotorLease, MotorState, SharedMotor};
use steer_tools::{CommandKind, DriveCommand, SteeringProfile};
use tracing::{error, info, warn};

/// 驱动电机租约持有者名
pub const DRIVE_OWNER: &str = "vehicle-drive";

/// 整车
pub struct Vehicle {
    drive: MotorLease,
    steering: SharedMotor,
    coordinator: SteeringCoordinator,
    continuous: Option<ContinuousSteeringLoop>,
    steering_mapper: SteeringAxisMapper,
    drive_mapper: DriveAxisMapper,
    default_speed: f64,
    shut_down: AtomicBool,
}

impl Vehicle {
    /// 组合整车（不启动连续转向）
    ///
    /// # 错误
    ///
    /// - `ControlError::InvalidParameter`: 配置无效
    /// - `ControlError::Driver(MotorBusy)`: 驱动电机已被占用
    pub fn new(
        drive: SharedMotor,
        steering: SharedMotor,
        sensor: Arc<dyn AngleSource>,
        profile: &SteeringProfile,
    ) -> Result<Self, ControlError> {
        let coordinator = SteeringCoordinator::new(
            steering.clone(),
            sensor,
            profile.coordinator.clone(),
            profile.rotation.clone(),
        )?;
        let drive = drive.try_acquire(DRIVE_OWNER)?;

        Ok(Self {
            drive,
            steering,
            coordinator,
            continuous: None,
            steering_mapper: SteeringAxisMapper::from_settings(&profile.teleop),
            drive_mapper: DriveAxisMapper::from_settings(&profile.drive, &profile.teleop),
            default_speed: profile.drive.default_speed,
            shut_down: AtomicBool::new(false),
        })
    }

    /// 附加连续转向（手柄模式）
    ///
    /// 只创建不启动；运行期间协调器的转向请求会返回 `MotorBusy`。
    pub fn with_continuous(
        mut self,
        sensor: Arc<dyn AngleSource>,
        profile: &SteeringProfile,
    ) -> Result<Self, ControlError> {
        self.continuous = Some(ContinuousSteeringLoop::new(
            self.steering.clone(),
            sensor,
            profile.continuous.clone(),
        )?);
        Ok(self)
    }

    pub fn coordinator(&self) -> &SteeringCoordinator {
        &self.coordinator
    }

    pub fn continuous(&self) -> Option<&ContinuousSteeringLoop> {
        self.continuous.as_ref()
    }

    /// 驱动电机状态
    pub fn drive_state(&self) -> MotorState {
        self.drive.motor().state()
    }

    /// 转向电机状态
    pub fn steering_state(&self) -> MotorState {
        self.steering.state()
    }

    /// 分发远程命令
    ///
    /// - forward / backward → 驱动电机前进 / 后退（`speed`，默认 50）
    /// - left / right → 相对转向（`turning_angle`，默认 15°）
    /// - center → 回中
    /// - stop → 驱动电机停止并取消转向任务
    pub fn dispatch(&self, command: &DriveCommand) -> Result<(), ControlError> {
        command
            .validate()
            .map_err(|e| ControlError::InvalidParameter {
                name: "command",
                reason: e.to_string(),
            })?;
        self.ensure_running()?;

        info!("Dispatching command: {}", command);
        match command.command {
            CommandKind::Forward => {
                let speed = command.speed.unwrap_or(self.default_speed);
                self.drive.drive(Direction::Forward, Duty::new(speed))?;
            },
            CommandKind::Backward => {
                let speed = command.speed.unwrap_or(self.default_speed);
                self.drive.drive(Direction::Reverse, Duty::new(speed))?;
            },
            CommandKind::Left => {
                let target = self.coordinator.turn_left_by(command.turning_angle_or_default())?;
                info!("Turning left towards {}", target);
            },
            CommandKind::Right => {
                let target = self.coordinator.turn_right_by(command.turning_angle_or_default())?;
                info!("Turning right towards {}", target);
            },
            CommandKind::Center => {
                self.coordinator.center()?;
            },
            CommandKind::Stop => {
                // 驱动电机断电失败时仍要取消转向任务
                let mut steps = StepErrors::new("stop");
                steps.record("drive", self.drive.stop_immediately().map_err(Into::into));
                if let Some(Some(report)) = steps.record("coordinator", self.coordinator.stop()) {
                    info!("Steering stopped: {}", report.outcome);
                }
                steps.finish()?;
            },
        }
        Ok(())
    }

    /// 手柄转向轴 → 连续转向目标
    ///
    /// 未附加连续转向或整车已关闭时返回 `None`。
    pub fn apply_steering_axis(&self, value: f64) -> Option<Deg> {
        if let Err(e) = self.ensure_running() {
            warn!("Steering axis ignored: {}", e);
            return None;
        }
        let Some(continuous) = self.continuous.as_ref() else {
            warn!("Steering axis ignored: continuous steering not attached");
            return None;
        };
        let target = continuous.set_target(self.steering_mapper.map(value));
        Some(target)
    }

    /// 手柄驱动轴 → 驱动电机
    pub fn apply_drive_axis(&self, value: f64) -> Result<DriveAction, ControlError> {
        self.ensure_running()?;
        let action = self.drive_mapper.map(value);
        match action {
            DriveAction::Stop => self.drive.stop_immediately()?,
            DriveAction::Run { direction, duty } => self.drive.drive(direction, duty)?,
        }
        Ok(action)
    }

    /// 停止所有运动：驱动电机、连续转向、定点旋转
    ///
    /// 不释放电机，之后仍可继续使用。尝试所有步骤后返回第一个错误。
    pub fn halt(&self) -> Result<(), ControlError> {
        let mut steps = StepErrors::new("halt");
        steps.record("drive stop", self.drive.stop_immediately().map_err(Into::into));
        if let Some(continuous) = self.continuous.as_ref() {
            steps.record("continuous steering", continuous.stop());
        }
        steps.record("coordinator", self.coordinator.stop());
        steps.finish()
    }

    /// 停止所有控制并释放两台电机
    ///
    /// 尝试所有步骤后返回第一个错误。重复调用为空操作。
    pub fn shutdown(&self) -> Result<(), ControlError> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Shutting down vehicle...");

        let mut steps = StepErrors::new("shutdown");
        if let Some(continuous) = self.continuous.as_ref() {
            steps.record("continuous steering", continuous.stop());
        }
        steps.record("coordinator", self.coordinator.stop());
        steps.record("drive stop", self.drive.stop_immediately().map_err(Into::into));
        steps.record("steering stop", self.steering.stop_immediately().map_err(Into::into));
        steps.record("drive cleanup", self.drive.motor().cleanup().map_err(Into::into));
        steps.record("steering cleanup", self.steering.cleanup().map_err(Into::into));

        info!("Shutdown complete");
        steps.finish()
    }

    /// 是否已关闭
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<(), ControlError> {
        if self.is_shut_down() {
            return Err(ControlError::Driver(steer_driver::DriverError::Released));
        }
        Ok(())
    }
}

/// 依次执行的停止步骤
///
/// 某一步失败不会跳过后续步骤，最后返回第一个错误。
struct StepErrors {
    phase: &'static str,
    first: Option<ControlError>,
}

impl StepErrors {
    fn new(phase: &'static str) -> Self {
        Self { phase, first: None }
    }

    fn record<T>(&mut self, step: &str, result: Result<T, ControlError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                error!("{} step '{}' failed: {}", self.phase, step, e);
                self.first.get_or_insert(e);
                None
            },
        }
    }

    fn finish(self) -> Result<(), ControlError> {
        match self.first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Vehicle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Vehicle shutdown on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steer_driver::mock::{PortCommand, RecordingPort};
    use steer_driver::PwmChannel;

    fn vehicle(angle: f64) -> (Vehicle, RecordingPort, RecordingPort) {
        let drive_port = RecordingPort::new();
        let steering_port = RecordingPort::new();
        let drive = SharedMotor::from_port("drive", drive_port.clone());
        let steering = SharedMotor::from_port("steering", steering_port.clone());
        let sensor: Arc<dyn AngleSource> = Arc::new(move || Some(Deg(angle)));
        let vehicle = Vehicle::new(drive, steering, sensor, &SteeringProfile::default()).unwrap();
        (vehicle, drive_port, steering_port)
    }

    #[test]
    fn test_forward_uses_default_speed() {
        let (vehicle, drive_port, _) = vehicle(150.0);

        vehicle.dispatch(&DriveCommand::new(CommandKind::Forward)).unwrap();
        assert_eq!(
            drive_port.last(),
            Some(PortCommand::Set {
                channel: PwmChannel::Right,
                duty: Duty::new(50.0)
            })
        );

        vehicle
            .dispatch(&DriveCommand::new(CommandKind::Backward).with_speed(30.0))
            .unwrap();
        assert_eq!(vehicle.drive_state().direction, Direction::Reverse);
        assert_eq!(vehicle.drive_state().duty, Duty::new(30.0));
    }

    #[test]
    fn test_stop_command_stops_drive() {
        let (vehicle, drive_port, _) = vehicle(150.0);
        vehicle.dispatch(&DriveCommand::new(CommandKind::Forward)).unwrap();
        vehicle.dispatch(&DriveCommand::default()).unwrap();

        assert!(vehicle.drive_state().is_stopped());
        assert_eq!(drive_port.last(), Some(PortCommand::Cut));
    }

    #[test]
    fn test_invalid_command_rejected() {
        let (vehicle, drive_port, _) = vehicle(150.0);
        let err = vehicle
            .dispatch(&DriveCommand::new(CommandKind::Forward).with_speed(150.0))
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidParameter { name: "command", .. }));
        assert!(drive_port.commands().is_empty());
    }

    #[test]
    fn test_steering_axis_requires_continuous() {
        let (vehicle, _, _) = vehicle(150.0);
        assert_eq!(vehicle.apply_steering_axis(0.5), None);
    }

    #[test]
    fn test_drive_axis() {
        let (vehicle, _, _) = vehicle(150.0);
        assert_eq!(
            vehicle.apply_drive_axis(-1.0).unwrap(),
            DriveAction::Run {
                direction: Direction::Reverse,
                duty: Duty::new(70.0)
            }
        );
        assert_eq!(vehicle.apply_drive_axis(0.0).unwrap(), DriveAction::Stop);
        assert!(vehicle.drive_state().is_stopped());
    }

    #[test]
    fn test_halt_stops_drive_without_release() {
        let (vehicle, drive_port, _) = vehicle(150.0);
        vehicle.dispatch(&DriveCommand::new(CommandKind::Forward)).unwrap();

        vehicle.halt().unwrap();
        assert!(vehicle.drive_state().is_stopped());
        assert_eq!(drive_port.last(), Some(PortCommand::Cut));

        // 停止后仍可继续驾驶
        vehicle.dispatch(&DriveCommand::new(CommandKind::Forward)).unwrap();
        assert!(!vehicle.drive_state().is_stopped());
    }

    #[test]
    fn test_shutdown_releases_motors() {
        let (vehicle, drive_port, steering_port) = vehicle(150.0);
        vehicle.dispatch(&DriveCommand::new(CommandKind::Forward)).unwrap();

        vehicle.shutdown().unwrap();
        assert!(vehicle.is_shut_down());
        assert_eq!(drive_port.last(), Some(PortCommand::Release));
        assert_eq!(steering_port.last(), Some(PortCommand::Release));

        // 关闭后拒绝命令，重复关闭是空操作
        assert!(vehicle.dispatch(&DriveCommand::new(CommandKind::Forward)).is_err());
        vehicle.shutdown().unwrap();
    }
}
